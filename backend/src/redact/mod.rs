pub mod error;

use std::sync::Arc;

use actix_web::web;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::{error, info, warn};
use shared::{BoundingBox, RedactResponse, TaskLogResponse, TaskStatus};
use uuid::Uuid;

use crate::detection::{filter_by_confidence, DetectionError, Detector};
use crate::render::{self, RenderError};
use crate::tasks::{TaskStore, TaskStoreError};

pub use error::RedactError;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

/// An uploaded file as received at the HTTP boundary.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RedactOptions {
    pub confidence_threshold: f32,
    pub return_image: bool,
}

impl Default for RedactOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            return_image: true,
        }
    }
}

/// Why a request failed after its task was admitted.
#[derive(Debug)]
enum StageFailure {
    Detection(DetectionError),
    Render(String),
    Store(TaskStoreError),
}

impl StageFailure {
    fn details(&self) -> String {
        match self {
            StageFailure::Detection(
                DetectionError::Unavailable(message) | DetectionError::Service(message),
            ) => format!("Detection service unavailable: {}", message),
            StageFailure::Render(message) => format!("Processing failed: {}", message),
            StageFailure::Store(e) => format!("Processing failed: {}", e),
        }
    }

    fn into_error(self, task_id: String) -> RedactError {
        let message = self.details();
        match self {
            StageFailure::Detection(DetectionError::Unavailable(_)) => {
                RedactError::DetectionUnavailable { task_id, message }
            }
            StageFailure::Detection(DetectionError::Service(_)) => {
                RedactError::DetectionService { task_id, message }
            }
            StageFailure::Render(_) | StageFailure::Store(_) => {
                RedactError::Processing { task_id, message }
            }
        }
    }
}

struct Outcome {
    detections: Vec<BoundingBox>,
    redacted_image: Option<Vec<u8>>,
}

/// Runs one redaction request from validation through to a terminal task status.
#[derive(Clone)]
pub struct RedactionService {
    detector: Arc<dyn Detector>,
    tasks: Arc<dyn TaskStore>,
    max_upload_bytes: usize,
}

impl RedactionService {
    pub fn new(
        detector: Arc<dyn Detector>,
        tasks: Arc<dyn TaskStore>,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            detector,
            tasks,
            max_upload_bytes,
        }
    }

    pub async fn redact(
        &self,
        user_id: i64,
        upload: ImageUpload,
        options: RedactOptions,
    ) -> Result<RedactResponse, RedactError> {
        let content_type = self.validate(&upload, &options)?;

        let task_id = Uuid::new_v4().to_string();
        self.tasks
            .create(&task_id, user_id, TaskStatus::Processing, "Processing started")
            .await
            .map_err(|e| {
                error!("Failed to admit redaction task for user {}: {}", user_id, e);
                RedactError::Admission(e)
            })?;
        info!(
            "Task {} admitted for user {} ({}, {} bytes, threshold {})",
            task_id,
            user_id,
            upload.filename,
            upload.bytes.len(),
            options.confidence_threshold
        );

        let result = match self.run(&task_id, upload, &content_type, &options).await {
            Ok(outcome) => self.finalize(&task_id, &options, outcome).await,
            Err(failure) => Err(failure),
        };

        match result {
            Ok(response) => Ok(response),
            Err(failure) => {
                let details = failure.details();
                error!("Task {} failed: {}", task_id, details);
                if let Err(e) = self
                    .tasks
                    .update_status(&task_id, TaskStatus::Error, &details)
                    .await
                {
                    error!("Could not record failure for task {}: {}", task_id, e);
                }
                Err(failure.into_error(task_id))
            }
        }
    }

    pub async fn task_log(&self, user_id: i64, task_id: &str) -> Result<TaskLogResponse, RedactError> {
        let task = self.tasks.get(task_id).await.map_err(|e| match e {
            TaskStoreError::NotFound(id) => RedactError::TaskNotFound(id),
            other => RedactError::Store(other),
        })?;
        if task.user_id != user_id {
            warn!("User {} asked for task {} owned by another user", user_id, task_id);
            return Err(RedactError::TaskNotFound(task_id.to_string()));
        }
        Ok(task.to_log_response())
    }

    /// Returns the declared content type once the request is acceptable.
    fn validate(&self, upload: &ImageUpload, options: &RedactOptions) -> Result<String, RedactError> {
        let content_type = match upload.content_type.as_deref() {
            Some(ct) if ct.trim().to_ascii_lowercase().starts_with("image/") => ct.trim().to_string(),
            Some(ct) => {
                return Err(RedactError::InvalidInput(format!(
                    "File must be an image, got '{}'",
                    ct
                )));
            }
            None => {
                return Err(RedactError::InvalidInput(
                    "File must be an image".to_string(),
                ));
            }
        };
        if upload.bytes.is_empty() {
            return Err(RedactError::InvalidInput("Uploaded file is empty".to_string()));
        }
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(RedactError::InvalidInput(format!(
                "File exceeds the {} byte limit",
                self.max_upload_bytes
            )));
        }
        if !(0.0..=1.0).contains(&options.confidence_threshold) {
            return Err(RedactError::InvalidInput(
                "confidence_threshold must be between 0 and 1".to_string(),
            ));
        }
        Ok(content_type)
    }

    async fn run(
        &self,
        task_id: &str,
        upload: ImageUpload,
        content_type: &str,
        options: &RedactOptions,
    ) -> Result<Outcome, StageFailure> {
        let detection = self
            .detector
            .detect(&upload.bytes, &upload.filename, content_type)
            .await
            .map_err(StageFailure::Detection)?;

        let detections = filter_by_confidence(&detection.detections, options.confidence_threshold);
        info!(
            "Task {}: {} of {} detection(s) at or above {}",
            task_id,
            detections.len(),
            detection.detections.len(),
            options.confidence_threshold
        );

        if !options.return_image || detections.is_empty() {
            return Ok(Outcome {
                detections,
                redacted_image: None,
            });
        }

        let to_paint = detections.clone();
        let threshold = options.confidence_threshold;
        let image = upload.bytes;
        let rendered = web::block(move || render::redact(&image, &to_paint, threshold))
            .await
            .map_err(|e| StageFailure::Render(format!("render worker failed: {}", e)))?
            .map_err(|e: RenderError| StageFailure::Render(e.to_string()))?;

        Ok(Outcome {
            detections,
            redacted_image: Some(rendered),
        })
    }

    async fn finalize(
        &self,
        task_id: &str,
        options: &RedactOptions,
        outcome: Outcome,
    ) -> Result<RedactResponse, StageFailure> {
        let summary = format!(
            "Redacted {} region(s) at confidence threshold {}",
            outcome.detections.len(),
            options.confidence_threshold
        );
        self.tasks
            .update_status(task_id, TaskStatus::Success, &summary)
            .await
            .map_err(StageFailure::Store)?;
        info!("Task {} completed: {}", task_id, summary);

        Ok(RedactResponse {
            task_id: task_id.to_string(),
            status: TaskStatus::Success,
            detections_count: outcome.detections.len(),
            detections: outcome.detections,
            redacted_image_base64: outcome.redacted_image.map(|bytes| STANDARD.encode(bytes)),
        })
    }
}
