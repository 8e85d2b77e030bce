use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Dispatcher-maintained live statistics, updated incrementally on every
/// `POST_TASK` and `RESULT_RETURN`. Shared between the Dispatcher (which
/// owns it) and the Monitor (which only ever sees a cloned snapshot).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct LiveStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub open_tasks: u64,
    pub avg_completion_time: f64,
    pub avg_completion_by_type: HashMap<String, f64>,
}

/// One entry in a `LIST_WORKERS` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkerSummary {
    #[serde(rename = "type")]
    pub task_type: String,
    pub address: String,
}
