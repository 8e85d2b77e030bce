use std::net::SocketAddr;
use std::sync::Arc;

use fabric_common::protocol::{decode_message, encode_message, Opcode};
use serde_json::Value;
use tokio::net::UdpSocket;

use crate::dispatch::try_dispatch_tasks;
use crate::state::{DispatcherState, EnqueueOutcome};

/// Handle one inbound datagram: decode, dispatch by opcode, reply to `from`.
pub async fn handle_request(
    data: Vec<u8>,
    from: SocketAddr,
    socket: Arc<UdpSocket>,
    state: Arc<DispatcherState>,
) {
    let (opcode, content) = decode_message(&data);

    let response = match opcode {
        Some(Opcode::PostTask) => handle_post_task(&content, from, &state, &socket).await,
        Some(Opcode::GetResult) => handle_get_result(&content, &state).await,
        Some(Opcode::ResultReturn) => handle_result_return(&content, &state, &socket).await,
        Some(Opcode::GetAllTasks) => handle_get_all_tasks(&state).await,
        Some(Opcode::GetStats) => handle_get_stats(&state).await,
        Some(other) => {
            tracing::warn!(opcode = %other, from = %from, "Invalid message type received");
            serde_json::json!({ "error": "Invalid message type" })
        }
        None => {
            tracing::warn!(from = %from, error = %content, "Failed to decode message");
            serde_json::json!({ "error": "Invalid message type" })
        }
    };

    match encode_message(&Opcode::Response, response.clone(), state.max_datagram_bytes) {
        Ok(bytes) => {
            if let Err(e) = socket.send_to(&bytes, from).await {
                tracing::error!(from = %from, error = %e, "Failed to send response");
            }
        }
        Err(e) => {
            tracing::error!(from = %from, error = %e, "Failed to encode response");
        }
    }
}

async fn handle_post_task(
    content: &Value,
    from: SocketAddr,
    state: &Arc<DispatcherState>,
    socket: &Arc<UdpSocket>,
) -> Value {
    let task_type = content.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    let payload = content.get("payload").cloned().unwrap_or(Value::Null);

    let response = match state.enqueue_task(task_type.clone(), payload).await {
        EnqueueOutcome::Accepted(id) => {
            tracing::info!(task_id = id, task_type = %task_type, from = %from, "Task accepted");
            metrics::counter!("dispatcher.tasks.received").increment(1);
            serde_json::json!({ "message": format!("Task received, ID = {id}") })
        }
        EnqueueOutcome::QueueFull => {
            tracing::warn!(task_type = %task_type, from = %from, "Task queue full, rejecting");
            serde_json::json!({ "error": "Task queue full" })
        }
    };

    let state = Arc::clone(state);
    let socket = Arc::clone(socket);
    tokio::spawn(async move {
        try_dispatch_tasks(state, socket).await;
    });

    response
}

async fn handle_get_result(content: &Value, state: &DispatcherState) -> Value {
    let Some(task_id) = content.get("task_id").and_then(Value::as_u64) else {
        return serde_json::json!({ "error": "Task not found" });
    };

    if !state.task_exists(task_id).await {
        return serde_json::json!({ "error": "Task not found" });
    }

    match state.result_for(task_id).await {
        Some(result) if !is_empty_result(&result) => serde_json::json!({ "result": result }),
        _ => serde_json::json!({ "error": "Result not ready" }),
    }
}

/// True for JSON values that are falsy by the same rule a truthiness check
/// would apply: `null`, `false`, `0`, `""`, and empty arrays/objects.
fn is_empty_result(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

async fn handle_result_return(
    content: &Value,
    state: &Arc<DispatcherState>,
    socket: &Arc<UdpSocket>,
) -> Value {
    let Some(task_id) = content.get("task_id").and_then(Value::as_u64) else {
        return serde_json::json!({ "error": "Task ID not found" });
    };
    let result = content.get("result").cloned().unwrap_or(Value::Null);

    let assigned_worker = state.assigned_worker_of(task_id).await;

    let response = match state.record_result(task_id, result).await {
        Some(true) => {
            tracing::info!(task_id, "Result stored");
            metrics::counter!("dispatcher.tasks.completed").increment(1);
            if let Some(address) = assigned_worker {
                state.free_worker(&address).await;
            }
            serde_json::json!({ "message": "Result stored" })
        }
        // Duplicate RESULT_RETURN for an already-done task: reply the same
        // way without double-counting stats or re-freeing a worker slot
        // that may have already been reassigned to another task.
        Some(false) => serde_json::json!({ "message": "Result stored" }),
        None => {
            tracing::error!(task_id, "Task ID not found for RESULT_RETURN");
            serde_json::json!({ "error": "Task ID not found" })
        }
    };

    let state = Arc::clone(state);
    let socket = Arc::clone(socket);
    tokio::spawn(async move {
        try_dispatch_tasks(state, socket).await;
    });

    response
}

async fn handle_get_all_tasks(state: &DispatcherState) -> Value {
    let tasks = state.all_tasks_snapshot().await;
    let done = tasks.iter().filter(|t| t.status == fabric_common::TaskStatus::Done).count();
    let pending = tasks.iter().filter(|t| t.status == fabric_common::TaskStatus::Pending).count();
    let durations: Vec<f64> = tasks.iter().filter_map(|t| t.completion_duration_secs()).collect();
    let avg_completion_time = if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<f64>() / durations.len() as f64)
    };

    serde_json::json!({
        "stats": {
            "total": tasks.len(),
            "done": done,
            "pending": pending,
            "avg_completion_time": avg_completion_time,
        },
        "tasks": tasks,
    })
}

async fn handle_get_stats(state: &DispatcherState) -> Value {
    let stats = state.stats_snapshot().await;
    let pending = state.pending_snapshot(10).await;
    serde_json::json!({ "stats": stats, "pending": pending })
}
