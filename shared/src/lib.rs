use serde::{Deserialize, Serialize};

/// Lifecycle of a redaction task. Transitions only move forward.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Success,
    Error,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Success | TaskStatus::Error)
    }

    fn rank(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Processing => 1,
            TaskStatus::Success | TaskStatus::Error => 2,
        }
    }

    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Statuses a task may be in for a move to `self` to be accepted.
    pub fn predecessors(&self) -> Vec<TaskStatus> {
        [TaskStatus::Pending, TaskStatus::Processing]
            .into_iter()
            .filter(|from| from.can_transition_to(*self))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
}

impl BoundingBox {
    pub fn passes(&self, threshold: f32) -> bool {
        self.confidence >= threshold
    }
}

/// Body returned by the inference service's `/detect` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub success: bool,
    pub detections: Vec<BoundingBox>,
    pub image_width: u32,
    pub image_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedactResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub detections_count: usize,
    pub detections: Vec<BoundingBox>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redacted_image_base64: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLogResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitiesResponse {
    pub entities: Vec<String>,
}
