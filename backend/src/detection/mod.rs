pub mod http;
pub mod mock;
#[cfg(test)]
pub mod testing;

use async_trait::async_trait;
use shared::{BoundingBox, DetectionResult};
use thiserror::Error;

pub use http::HttpDetector;
pub use mock::MockDetector;

#[derive(Debug, Error)]
pub enum DetectionError {
    /// The inference service could not be reached or did not answer in time.
    #[error("Detection service unavailable: {0}")]
    Unavailable(String),
    /// The inference service answered, but not with a usable result.
    #[error("Detection service error: {0}")]
    Service(String),
}

/// Anything that can locate regions to redact in an image.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(
        &self,
        image: &[u8],
        filename: &str,
        content_type: &str,
    ) -> Result<DetectionResult, DetectionError>;
}

/// Keeps detections whose confidence is at least `threshold`, in detector order.
pub fn filter_by_confidence(detections: &[BoundingBox], threshold: f32) -> Vec<BoundingBox> {
    detections
        .iter()
        .filter(|d| d.passes(threshold))
        .cloned()
        .collect()
}
