pub mod dynamodb;
pub mod memory;
pub mod model;

use async_trait::async_trait;
use shared::TaskStatus;
use thiserror::Error;

pub use dynamodb::DynamoDbTaskStore;
pub use memory::InMemoryTaskStore;
pub use model::Task;

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("Task not found: {0}")]
    NotFound(String),
    #[error("Task already exists: {0}")]
    AlreadyExists(String),
    #[error("Task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: TaskStatus,
        to: TaskStatus,
    },
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
}

/// Durable record of redaction tasks. Every method is a single atomic write or read.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(
        &self,
        task_id: &str,
        user_id: i64,
        status: TaskStatus,
        details: &str,
    ) -> Result<Task, TaskStoreError>;

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        details: &str,
    ) -> Result<Task, TaskStoreError>;

    async fn get(&self, task_id: &str) -> Result<Task, TaskStoreError>;
}
