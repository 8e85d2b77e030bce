//! The Client CLI's protocol-facing logic, kept free of argument parsing and
//! process exit codes so it can be driven directly from tests. `main.rs`
//! is the thin wrapper that maps these into subcommands and exit statuses.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use fabric_common::protocol::Opcode;
use fabric_common::udp::{self, RetryPolicy, RequestError};
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("dispatcher not reachable: {0}")]
    Unreachable(#[from] RequestError),

    #[error("failed to read simulation file {0}: {1}")]
    SimulationFile(String, std::io::Error),

    #[error("failed to parse simulation file {0}: {1}")]
    SimulationParse(String, serde_json::Error),
}

/// Submit one task and return the Dispatcher's raw response.
pub async fn send_task(
    dispatcher_addr: SocketAddr,
    task_type: &str,
    payload: Value,
    max_datagram_bytes: usize,
    policy: RetryPolicy,
) -> Result<Value, ClientError> {
    let response = udp::request(
        dispatcher_addr,
        Opcode::PostTask,
        serde_json::json!({ "type": task_type, "payload": payload }),
        max_datagram_bytes,
        policy,
    )
    .await?;
    tracing::info!(task_type, response = %response, "Sent task to dispatcher");
    Ok(response)
}

/// Query a task's result once.
pub async fn request_result(
    dispatcher_addr: SocketAddr,
    task_id: u64,
    max_datagram_bytes: usize,
    policy: RetryPolicy,
) -> Result<Value, ClientError> {
    let response = udp::request(
        dispatcher_addr,
        Opcode::GetResult,
        serde_json::json!({ "task_id": task_id }),
        max_datagram_bytes,
        policy,
    )
    .await?;
    tracing::info!(task_id, response = %response, "Received result from dispatcher");
    Ok(response)
}

/// Pull the numeric id out of a `"Task received, ID = N"` response message.
pub fn extract_task_id(response: &Value) -> Option<u64> {
    response
        .get("message")
        .and_then(Value::as_str)
        .and_then(|m| m.rsplit('=').next())
        .and_then(|tail| tail.trim().parse().ok())
}

#[derive(Debug)]
pub struct SimulatedTask {
    pub task_type: String,
    pub payload: Value,
}

// The simulation file is a JSON list of `[type, payload]` pairs.
pub fn load_simulation_file(path: &Path) -> Result<Vec<SimulatedTask>, ClientError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ClientError::SimulationFile(path.display().to_string(), e))?;
    let raw: Vec<(String, Value)> = serde_json::from_str(&content)
        .map_err(|e| ClientError::SimulationParse(path.display().to_string(), e))?;
    Ok(raw
        .into_iter()
        .map(|(task_type, payload)| SimulatedTask { task_type, payload })
        .collect())
}

/// Drive the system through a list of simulated tasks: submit every task
/// (pausing one second between each), wait five seconds for the fabric
/// to process them, then query each task's result.
/// Returns the printable lines in order, so both the REPL and tests can
/// inspect them without capturing stdout.
pub async fn run_simulation(
    dispatcher_addr: SocketAddr,
    tasks: Vec<SimulatedTask>,
    max_datagram_bytes: usize,
    policy: RetryPolicy,
) -> Vec<String> {
    let mut lines = Vec::new();
    let mut ids = Vec::new();

    for task in tasks {
        match send_task(dispatcher_addr, &task.task_type, task.payload.clone(), max_datagram_bytes, policy).await {
            Ok(response) => {
                lines.push(format!("task '{}' sent: {response}", task.task_type));
                if let Some(id) = extract_task_id(&response) {
                    ids.push(id);
                }
            }
            Err(e) => lines.push(format!("failed to send task '{}': {e}", task.task_type)),
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    lines.push("waiting for processing...".to_string());
    tokio::time::sleep(Duration::from_secs(5)).await;

    for id in ids {
        match request_result(dispatcher_addr, id, max_datagram_bytes, policy).await {
            Ok(response) => lines.push(format!("result for task {id}: {response}")),
            Err(e) => lines.push(format!("failed to query task {id}: {e}")),
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_trailing_task_id() {
        let response = serde_json::json!({"message": "Task received, ID = 42"});
        assert_eq!(extract_task_id(&response), Some(42));
    }

    #[test]
    fn returns_none_for_a_message_with_no_id() {
        let response = serde_json::json!({"message": "something else"});
        assert_eq!(extract_task_id(&response), None);
    }

    #[test]
    fn load_simulation_file_parses_type_payload_pairs() {
        let dir = std::env::temp_dir().join(format!("fabric-client-sim-{:?}", std::thread::current().id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tasks.json");
        std::fs::write(&path, r#"[["reverse", "hallo"], ["sum", [1,2,3]]]"#).unwrap();

        let tasks = load_simulation_file(&path).unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].task_type, "reverse");
        assert_eq!(tasks[1].payload, serde_json::json!([1, 2, 3]));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_simulation_file_reports_a_missing_file() {
        let err = load_simulation_file(Path::new("/nonexistent/tasks.json")).unwrap_err();
        assert!(matches!(err, ClientError::SimulationFile(_, _)));
    }
}
