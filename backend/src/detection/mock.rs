use async_trait::async_trait;
use log::debug;
use rand::Rng;
use shared::{BoundingBox, DetectionResult};

use super::{DetectionError, Detector};

const MAX_BOXES: usize = 3;

/// Stand-in detector that returns random plates; used when no inference service runs.
#[derive(Clone, Default)]
pub struct MockDetector;

impl MockDetector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn detect(
        &self,
        image: &[u8],
        filename: &str,
        _content_type: &str,
    ) -> Result<DetectionResult, DetectionError> {
        let decoded = image::load_from_memory(image)
            .map_err(|e| DetectionError::Service(format!("invalid image data: {}", e)))?;
        let (width, height) = (decoded.width(), decoded.height());

        let mut rng = rand::rng();
        let count = if width < 2 || height < 2 {
            0
        } else {
            rng.random_range(0..=MAX_BOXES)
        };

        let detections = (0..count)
            .map(|_| {
                let x1 = rng.random_range(0..width - 1);
                let y1 = rng.random_range(0..height - 1);
                let x2 = rng.random_range(x1 + 1..=width);
                let y2 = rng.random_range(y1 + 1..=height);
                let confidence: f32 = rng.random_range(0.0..=1.0);
                BoundingBox {
                    x1: x1 as i32,
                    y1: y1 as i32,
                    x2: x2 as i32,
                    y2: y2 as i32,
                    confidence: (confidence * 100.0).round() / 100.0,
                    class_name: Some("license_plate".to_string()),
                }
            })
            .collect::<Vec<_>>();

        debug!("Mock detector produced {} box(es) for {}", detections.len(), filename);
        Ok(DetectionResult {
            success: true,
            detections,
            image_width: width,
            image_height: height,
        })
    }
}
