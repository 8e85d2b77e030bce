//! The worker's name -> function handler table. Each handler is a pure
//! `payload -> result` transform; a worker process links in the handlers it
//! supports and looks them up by name rather than loading them from disk at
//! runtime.

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Payload must be a string")]
    NotAString,

    #[error("Invalid payload format. Expected a list of numbers or a comma-separated string of numbers")]
    InvalidNumericPayload,

    #[error("Payload must be a non-negative number representing seconds to wait")]
    InvalidWaitPayload,

    #[error("Invalid task type: {0}")]
    UnknownTaskType(String),
}

/// Dispatch `payload` to the handler named `task_type`. Returns the handler's
/// own error text on failure — the caller wraps it as `"Error processing
/// task: <message>"` per the shared failure-result convention.
pub async fn dispatch(task_type: &str, payload: Value) -> Result<Value, HandlerError> {
    match task_type {
        "reverse" => handle_reverse(payload),
        "upper" => handle_upper(payload),
        "hash" => handle_hash(payload),
        "sum" => handle_sum(payload),
        "wait" => handle_wait(payload).await,
        other => Err(HandlerError::UnknownTaskType(other.to_string())),
    }
}

/// The handler names this worker binary supports, in registration order.
pub const SUPPORTED_TASK_TYPES: &[&str] = &["reverse", "upper", "hash", "sum", "wait"];

fn as_str(payload: &Value) -> Result<&str, HandlerError> {
    payload.as_str().ok_or(HandlerError::NotAString)
}

fn handle_reverse(payload: Value) -> Result<Value, HandlerError> {
    let s = as_str(&payload)?;
    Ok(Value::String(s.chars().rev().collect()))
}

fn handle_upper(payload: Value) -> Result<Value, HandlerError> {
    let s = as_str(&payload)?;
    Ok(Value::String(s.to_uppercase()))
}

fn handle_hash(payload: Value) -> Result<Value, HandlerError> {
    let s = as_str(&payload)?;
    let digest = Sha256::digest(s.as_bytes());
    Ok(Value::String(hex_encode(&digest)))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Accepts either a JSON array of numbers or a comma-separated string of
/// numbers. An all-integer array sums as an integer (`[1,2,3]` -> `6`,
/// not `6.0`); the comma-separated string path always sums as a float.
fn handle_sum(payload: Value) -> Result<Value, HandlerError> {
    match &payload {
        Value::Array(items) => {
            if items.iter().all(|item| item.is_i64() || item.is_u64()) {
                let mut total: i64 = 0;
                for item in items {
                    total += item.as_i64().ok_or(HandlerError::InvalidNumericPayload)?;
                }
                return Ok(serde_json::json!(total));
            }
            let mut total = 0.0;
            for item in items {
                total += item.as_f64().ok_or(HandlerError::InvalidNumericPayload)?;
            }
            Ok(serde_json::json!(total))
        }
        Value::String(s) => {
            let mut total = 0.0;
            for part in s.split(',') {
                let n: f64 = part.trim().parse().map_err(|_| HandlerError::InvalidNumericPayload)?;
                total += n;
            }
            Ok(serde_json::json!(total))
        }
        _ => Err(HandlerError::InvalidNumericPayload),
    }
}

async fn handle_wait(payload: Value) -> Result<Value, HandlerError> {
    let delay = payload.as_f64().ok_or(HandlerError::InvalidWaitPayload)?;
    if delay < 0.0 {
        return Err(HandlerError::InvalidWaitPayload);
    }
    tokio::time::sleep(std::time::Duration::from_secs_f64(delay)).await;
    Ok(Value::String(format!("Waited for {delay} seconds")))
}
