use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use shared::TaskStatus;

use super::{Task, TaskStore, TaskStoreError};

/// One item per task, keyed by `id`. Writes are conditional so that a status
/// never moves backwards even with concurrent writers.
#[derive(Clone)]
pub struct DynamoDbTaskStore {
    client: Client,
    table_name: String,
}

impl DynamoDbTaskStore {
    pub fn new(client: Client, table_name: String) -> Self {
        Self { client, table_name }
    }

    pub async fn from_env(table_name: String) -> Self {
        info!("Initializing DynamoDB task store with table: {}", table_name);
        let aws_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Self::new(Client::new(&aws_config), table_name)
    }

    fn task_to_attributes(task: &Task) -> HashMap<String, AttributeValue> {
        let mut attributes = HashMap::new();
        attributes.insert("id".to_string(), AttributeValue::S(task.id.clone()));
        attributes.insert("user_id".to_string(), AttributeValue::N(task.user_id.to_string()));
        attributes.insert("status".to_string(), AttributeValue::S(task.status.to_string()));
        attributes.insert("details".to_string(), AttributeValue::S(task.details.clone()));
        attributes.insert(
            "created_at".to_string(),
            AttributeValue::S(task.created_at.to_rfc3339()),
        );
        attributes.insert(
            "updated_at".to_string(),
            AttributeValue::S(task.updated_at.to_rfc3339()),
        );
        attributes
    }

    fn attributes_to_task(
        attributes: &HashMap<String, AttributeValue>,
    ) -> Result<Task, TaskStoreError> {
        let string_attr = |name: &str| -> Result<String, TaskStoreError> {
            attributes
                .get(name)
                .and_then(|av| av.as_s().ok())
                .map(|s| s.to_string())
                .ok_or_else(|| TaskStoreError::InvalidData(format!("missing {} attribute", name)))
        };
        let timestamp_attr = |name: &str| -> Result<DateTime<Utc>, TaskStoreError> {
            let raw = string_attr(name)?;
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| TaskStoreError::InvalidData(format!("bad {} '{}': {}", name, raw, e)))
        };

        let user_id = attributes
            .get("user_id")
            .and_then(|av| av.as_n().ok())
            .ok_or_else(|| TaskStoreError::InvalidData("missing user_id attribute".to_string()))?
            .parse::<i64>()
            .map_err(|e| TaskStoreError::InvalidData(format!("bad user_id: {}", e)))?;
        let raw_status = string_attr("status")?;
        let status = TaskStatus::from_str(&raw_status)
            .map_err(|_| TaskStoreError::InvalidData(format!("unknown status '{}'", raw_status)))?;

        Ok(Task {
            id: string_attr("id")?,
            user_id,
            status,
            details: attributes
                .get("details")
                .and_then(|av| av.as_s().ok())
                .cloned()
                .unwrap_or_default(),
            created_at: timestamp_attr("created_at")?,
            updated_at: timestamp_attr("updated_at")?,
        })
    }

    async fn fetch(&self, task_id: &str) -> Result<Option<Task>, TaskStoreError> {
        let response = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(task_id.to_string()))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| {
                error!("AWS SDK error during get_item for task {}: {:?}", task_id, e);
                TaskStoreError::Backend(e.to_string())
            })?;
        response
            .item
            .as_ref()
            .map(Self::attributes_to_task)
            .transpose()
    }
}

#[async_trait]
impl TaskStore for DynamoDbTaskStore {
    async fn create(
        &self,
        task_id: &str,
        user_id: i64,
        status: TaskStatus,
        details: &str,
    ) -> Result<Task, TaskStoreError> {
        let task = Task::new(task_id.to_string(), user_id, status, details.to_string());
        debug!("Putting task {} into {}", task_id, self.table_name);
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(Self::task_to_attributes(&task)))
            .condition_expression("attribute_not_exists(id)")
            .send()
            .await
            .map_err(|e| {
                let duplicate = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if duplicate {
                    warn!("Task {} already exists in DynamoDB", task_id);
                    TaskStoreError::AlreadyExists(task_id.to_string())
                } else {
                    error!("AWS SDK error during put_item for task {}: {:?}", task_id, e);
                    TaskStoreError::Backend(e.to_string())
                }
            })?;
        info!("Task {} successfully created in DynamoDB", task_id);
        Ok(task)
    }

    async fn update_status(
        &self,
        task_id: &str,
        status: TaskStatus,
        details: &str,
    ) -> Result<Task, TaskStoreError> {
        let predecessors = status.predecessors();
        if predecessors.is_empty() {
            // Nothing can move into this status; report what the task currently is.
            let current = self
                .fetch(task_id)
                .await?
                .ok_or_else(|| TaskStoreError::NotFound(task_id.to_string()))?;
            return Err(TaskStoreError::InvalidTransition {
                id: task_id.to_string(),
                from: current.status,
                to: status,
            });
        }

        let placeholders: Vec<String> =
            (0..predecessors.len()).map(|i| format!(":from{}", i)).collect();
        let mut request = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("id", AttributeValue::S(task_id.to_string()))
            .update_expression("SET #status = :status, details = :details, updated_at = :updated_at")
            .condition_expression(format!(
                "attribute_exists(id) AND #status IN ({})",
                placeholders.join(", ")
            ))
            .expression_attribute_names("#status", "status")
            .expression_attribute_values(":status", AttributeValue::S(status.to_string()))
            .expression_attribute_values(":details", AttributeValue::S(details.to_string()))
            .expression_attribute_values(
                ":updated_at",
                AttributeValue::S(Utc::now().to_rfc3339()),
            )
            .return_values(ReturnValue::AllNew);
        for (placeholder, from) in placeholders.iter().zip(&predecessors) {
            request = request
                .expression_attribute_values(placeholder.as_str(), AttributeValue::S(from.to_string()));
        }

        match request.send().await {
            Ok(output) => {
                info!("Task {} moved to {}", task_id, status);
                let attributes = output.attributes.ok_or_else(|| {
                    TaskStoreError::InvalidData("update returned no attributes".to_string())
                })?;
                Self::attributes_to_task(&attributes)
            }
            Err(e) => {
                let rejected = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if !rejected {
                    error!("AWS SDK error during update_item for task {}: {:?}", task_id, e);
                    return Err(TaskStoreError::Backend(e.to_string()));
                }
                match self.fetch(task_id).await? {
                    None => Err(TaskStoreError::NotFound(task_id.to_string())),
                    Some(current) => {
                        warn!(
                            "Rejected move of task {} from {} to {}",
                            task_id, current.status, status
                        );
                        Err(TaskStoreError::InvalidTransition {
                            id: task_id.to_string(),
                            from: current.status,
                            to: status,
                        })
                    }
                }
            }
        }
    }

    async fn get(&self, task_id: &str) -> Result<Task, TaskStoreError> {
        self.fetch(task_id).await?.ok_or_else(|| {
            warn!("Task {} not found in DynamoDB", task_id);
            TaskStoreError::NotFound(task_id.to_string())
        })
    }
}
