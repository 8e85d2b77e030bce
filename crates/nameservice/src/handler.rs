use std::net::SocketAddr;
use std::sync::Arc;

use fabric_common::protocol::{decode_message, encode_message, Opcode};
use fabric_common::stats::WorkerSummary;
use serde_json::Value;
use tokio::net::UdpSocket;

use crate::registry::Registry;

/// Handle one inbound datagram: decode, dispatch by opcode, reply to `from`.
/// Runs as its own concurrent activity per the fabric's off-path dispatch
/// model — the accept loop never blocks on this.
pub async fn handle_request(
    data: Vec<u8>,
    from: SocketAddr,
    socket: Arc<UdpSocket>,
    registry: Arc<Registry>,
    worker_port: u16,
    max_datagram_bytes: usize,
) {
    let (opcode, content) = decode_message(&data);

    let response = match opcode {
        Some(Opcode::RegisterWorker) => handle_register(&content, from, &registry, worker_port),
        Some(Opcode::Heartbeat) => handle_heartbeat(from, &registry, worker_port),
        Some(Opcode::LookupWorker) => handle_lookup(&content, &registry),
        Some(Opcode::DeregisterWorker) => handle_deregister(from, &registry, worker_port),
        Some(Opcode::ListWorkers) => handle_list_workers(&registry),
        Some(other) => {
            tracing::warn!(opcode = %other, from = %from, "Received unknown message type");
            serde_json::json!({ "error": "Unknown message type" })
        }
        None => {
            tracing::warn!(from = %from, error = %content, "Failed to decode message");
            serde_json::json!({ "error": "Unknown message type" })
        }
    };

    match encode_message(&Opcode::Response, response.clone(), max_datagram_bytes) {
        Ok(bytes) => {
            if let Err(e) = socket.send_to(&bytes, from).await {
                tracing::error!(from = %from, error = %e, "Failed to send response");
            }
        }
        Err(e) => {
            tracing::error!(from = %from, error = %e, response = %response, "Failed to encode response");
        }
    }
}

fn worker_address(from: SocketAddr, worker_port: u16) -> String {
    format!("{}:{}", from.ip(), worker_port)
}

fn handle_register(content: &Value, from: SocketAddr, registry: &Registry, worker_port: u16) -> Value {
    let task_type = content.get("type").and_then(Value::as_str).unwrap_or_default();
    let address = worker_address(from, worker_port);
    registry.register(task_type, address.clone());
    tracing::info!(task_type, address = %address, "Registered worker");
    serde_json::json!({ "message": format!("Registered {task_type} at {address}") })
}

fn handle_heartbeat(from: SocketAddr, registry: &Registry, worker_port: u16) -> Value {
    let address = worker_address(from, worker_port);
    let updated = registry.heartbeat(&address);
    tracing::debug!(address = %address, updated, "Heartbeat received");
    serde_json::json!({ "message": format!("Heartbeat received, updated {updated} entries") })
}

fn handle_lookup(content: &Value, registry: &Registry) -> Value {
    let task_type = content.get("type").and_then(Value::as_str).unwrap_or_default();
    match registry.lookup(task_type) {
        Some(address) => serde_json::json!({ "address": address }),
        None => {
            serde_json::json!({ "error": format!("No active worker found for type '{task_type}'") })
        }
    }
}

fn handle_deregister(from: SocketAddr, registry: &Registry, worker_port: u16) -> Value {
    let address = worker_address(from, worker_port);
    let removed = registry.deregister(&address);
    tracing::info!(address = %address, removed, "Deregistered worker");
    serde_json::json!({ "message": format!("Deregistered {removed} entries") })
}

fn handle_list_workers(registry: &Registry) -> Value {
    let workers: Vec<WorkerSummary> = registry
        .list_live()
        .into_iter()
        .map(|(task_type, address)| WorkerSummary { task_type, address })
        .collect();
    serde_json::json!({ "workers": workers })
}
