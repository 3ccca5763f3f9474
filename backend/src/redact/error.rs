use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::tasks::TaskStoreError;

#[derive(Debug, Error)]
pub enum RedactError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Failed to create task: {0}")]
    Admission(#[source] TaskStoreError),
    #[error("Task {task_id}: {message}")]
    DetectionUnavailable { task_id: String, message: String },
    #[error("Task {task_id}: {message}")]
    DetectionService { task_id: String, message: String },
    #[error("Task {task_id}: {message}")]
    Processing { task_id: String, message: String },
    #[error("Task not found: {0}")]
    TaskNotFound(String),
    #[error("Failed to load task: {0}")]
    Store(#[source] TaskStoreError),
}

#[derive(Serialize)]
struct ErrorResponse<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    task_id: Option<&'a str>,
}

impl RedactError {
    pub fn task_id(&self) -> Option<&str> {
        match self {
            RedactError::DetectionUnavailable { task_id, .. }
            | RedactError::DetectionService { task_id, .. }
            | RedactError::Processing { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    fn client_message(&self) -> String {
        match self {
            RedactError::InvalidInput(reason) => reason.clone(),
            RedactError::Admission(_) => "Failed to create task".to_string(),
            RedactError::DetectionUnavailable { .. } => "Detection service unavailable".to_string(),
            RedactError::DetectionService { .. } => {
                "Detection service returned an invalid response".to_string()
            }
            RedactError::Processing { .. } => "Failed to process image".to_string(),
            RedactError::TaskNotFound(_) => "Task not found".to_string(),
            RedactError::Store(_) => "Failed to load task".to_string(),
        }
    }
}

impl ResponseError for RedactError {
    fn status_code(&self) -> StatusCode {
        match self {
            RedactError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RedactError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            RedactError::DetectionUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            RedactError::DetectionService { .. } => StatusCode::BAD_GATEWAY,
            RedactError::Admission(_) | RedactError::Processing { .. } | RedactError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorResponse {
            error: self.client_message(),
            task_id: self.task_id(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let id = || "t".to_string();
        let cases = [
            (RedactError::InvalidInput("x".into()), 400),
            (RedactError::TaskNotFound("x".into()), 404),
            (
                RedactError::DetectionUnavailable { task_id: id(), message: "m".into() },
                503,
            ),
            (
                RedactError::DetectionService { task_id: id(), message: "m".into() },
                502,
            ),
            (RedactError::Processing { task_id: id(), message: "m".into() }, 500),
            (
                RedactError::Admission(TaskStoreError::Backend("down".into())),
                500,
            ),
        ];
        for (err, code) in cases {
            assert_eq!(err.status_code().as_u16(), code, "{:?}", err);
        }
    }

    #[test]
    fn post_admission_errors_carry_task_id() {
        let err = RedactError::Processing {
            task_id: "abc".into(),
            message: "boom".into(),
        };
        assert_eq!(err.task_id(), Some("abc"));
        assert_eq!(RedactError::InvalidInput("x".into()).task_id(), None);
    }
}
