use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use shared::TaskStatus;
use tokio::sync::RwLock;

use super::{Task, TaskStore, TaskStoreError};

/// Process-local store. Used when no table is configured, and in tests.
#[derive(Clone, Default)]
pub struct InMemoryTaskStore {
    tasks: Arc<RwLock<HashMap<String, Task>>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(
        &self,
        task_id: &str,
        user_id: i64,
        status: TaskStatus,
        details: &str,
    ) -> Result<Task, TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        if tasks.contains_key(task_id) {
            warn!("Refusing to overwrite existing task {}", task_id);
            return Err(TaskStoreError::AlreadyExists(task_id.to_string()));
        }
        let task = Task::new(task_id.to_string(), user_id, status, details.to_string());
        tasks.insert(task_id.to_string(), task.clone());
        info!("Task {} created with status {}", task_id, status);
        Ok(task)
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        details: &str,
    ) -> Result<Task, TaskStoreError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
        if !task.status.can_transition_to(status) {
            return Err(TaskStoreError::InvalidTransition {
                id: task_id.to_string(),
                from: task.status,
                to: status,
            });
        }
        task.set_status(status, details.to_string());
        info!("Task {} moved to {}", task_id, status);
        Ok(task.clone())
    }

    async fn get(&self, task_id: &str) -> Result<Task, TaskStoreError> {
        debug!("Looking up task {}", task_id);
        self.tasks
            .read()
            .await
            .get(task_id)
            .cloned()
            .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn create_then_get() {
        let store = InMemoryTaskStore::new();
        let created = store
            .create("t-1", 7, TaskStatus::Processing, "Processing started")
            .await
            .unwrap();
        let fetched = store.get("t-1").await.unwrap();
        assert_eq!(created, fetched);
        assert_eq!(fetched.user_id, 7);
        assert_eq!(fetched.status, TaskStatus::Processing);
    }

    #[actix_web::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryTaskStore::new();
        assert!(matches!(
            store.get("missing").await,
            Err(TaskStoreError::NotFound(_))
        ));
        assert!(matches!(
            store.update_status("missing", TaskStatus::Error, "x").await,
            Err(TaskStoreError::NotFound(_))
        ));
    }

    #[actix_web::test]
    async fn duplicate_create_is_rejected() {
        let store = InMemoryTaskStore::new();
        store.create("t-1", 1, TaskStatus::Processing, "").await.unwrap();
        assert!(matches!(
            store.create("t-1", 2, TaskStatus::Processing, "").await,
            Err(TaskStoreError::AlreadyExists(_))
        ));
        assert_eq!(store.get("t-1").await.unwrap().user_id, 1);
    }

    #[actix_web::test]
    async fn terminal_status_is_final() {
        let store = InMemoryTaskStore::new();
        store.create("t-1", 1, TaskStatus::Processing, "").await.unwrap();
        let done = store
            .update_status("t-1", TaskStatus::Success, "Redacted 2 region(s)")
            .await
            .unwrap();
        assert_eq!(done.details, "Redacted 2 region(s)");
        assert!(done.updated_at >= done.created_at);

        let err = store
            .update_status("t-1", TaskStatus::Error, "late failure")
            .await
            .unwrap_err();
        assert!(matches!(err, TaskStoreError::InvalidTransition { .. }));
        assert_eq!(store.get("t-1").await.unwrap().status, TaskStatus::Success);
    }

    #[actix_web::test]
    async fn concurrent_writers_on_distinct_ids() {
        let store = InMemoryTaskStore::new();
        let writers = (0..32).map(|i| {
            let store = store.clone();
            async move {
                let id = format!("t-{}", i);
                store.create(&id, i, TaskStatus::Processing, "").await.unwrap();
                store.update_status(&id, TaskStatus::Success, "done").await.unwrap();
            }
        });
        futures::future::join_all(writers).await;
        assert_eq!(store.len().await, 32);
        for i in 0..32 {
            let task = store.get(&format!("t-{}", i)).await.unwrap();
            assert_eq!(task.status, TaskStatus::Success);
        }
    }
}
