use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current stage of a task's life. A task leaves `Pending` exactly once,
/// transitioning to `Done` on a successful handler result or `Failed` when
/// the handler raised — both are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Done,
    Failed,
}

/// A unit of work tracked by the Dispatcher from intake through completion.
///
/// `payload` and `result` are opaque JSON values — the Dispatcher never
/// interprets them, only the handler named by `type` does.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    #[serde(rename = "type")]
    pub task_type: String,
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub status: TaskStatus,
    pub timestamp_created: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_completed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_worker: Option<String>,
}

impl Task {
    /// Construct a freshly-accepted task: `pending`, no result, no assigned worker.
    pub fn new(id: u64, task_type: String, payload: Value, now: f64) -> Self {
        Self {
            id,
            task_type,
            payload,
            result: None,
            status: TaskStatus::Pending,
            timestamp_created: now,
            timestamp_completed: None,
            assigned_worker: None,
        }
    }

    /// Seconds elapsed between creation and completion, if the task is done.
    pub fn completion_duration_secs(&self) -> Option<f64> {
        self.timestamp_completed
            .map(|completed| completed - self.timestamp_created)
    }
}

/// Current wall-clock time in fractional seconds since the Unix epoch.
pub fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
