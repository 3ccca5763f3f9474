use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{TaskLogResponse, TaskStatus};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Task {
    pub id: String,
    pub user_id: i64,
    pub status: TaskStatus,
    pub details: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: String, user_id: i64, status: TaskStatus, details: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            status,
            details,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_status(&mut self, status: TaskStatus, details: String) {
        self.status = status;
        self.details = details;
        self.updated_at = Utc::now();
    }

    pub fn to_log_response(&self) -> TaskLogResponse {
        TaskLogResponse {
            task_id: self.id.clone(),
            status: self.status,
            details: self.details.clone(),
        }
    }
}
