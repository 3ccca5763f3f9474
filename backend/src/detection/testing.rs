use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use shared::DetectionResult;

use super::{DetectionError, Detector};

pub type Answer = fn() -> Result<DetectionResult, DetectionError>;

/// Detector double that replays a fixed answer and counts calls.
pub struct ScriptedDetector {
    answer: Answer,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn new(answer: Answer) -> Arc<Self> {
        Arc::new(Self {
            answer,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for ScriptedDetector {
    async fn detect(
        &self,
        _image: &[u8],
        _filename: &str,
        _content_type: &str,
    ) -> Result<DetectionResult, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.answer)()
    }
}
