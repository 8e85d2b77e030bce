//! Registration, heartbeat, and deregistration with the NameService, built
//! over `fabric_common::udp` so registration actually retries instead of
//! firing a bare best-effort datagram.

use std::net::SocketAddr;
use std::time::Duration;

use fabric_common::protocol::Opcode;
use fabric_common::udp::{self, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("failed to register with the nameservice after retrying: {0}")]
    Register(#[from] udp::RequestError),
}

/// Register this worker's `task_type` with the NameService, retrying per
/// `policy`. The NameService trusts only the datagram's source IP, so the
/// address we claim here is informational only.
pub async fn register(
    nameservice_addr: SocketAddr,
    task_type: &str,
    max_datagram_bytes: usize,
    policy: RetryPolicy,
) -> Result<(), RegistrationError> {
    let response = udp::request(
        nameservice_addr,
        Opcode::RegisterWorker,
        serde_json::json!({ "type": task_type }),
        max_datagram_bytes,
        policy,
    )
    .await?;

    tracing::info!(task_type, message = ?response.get("message"), "Registered with nameservice");
    Ok(())
}

/// Best-effort deregistration on shutdown — a dropped datagram here just
/// means the NameService expires the entry via heartbeat timeout instead.
pub async fn deregister(nameservice_addr: SocketAddr, task_type: &str, max_datagram_bytes: usize) {
    let result = udp::send_only(
        nameservice_addr,
        Opcode::DeregisterWorker,
        serde_json::json!({ "type": task_type }),
        max_datagram_bytes,
    )
    .await;

    match result {
        Ok(()) => tracing::info!(task_type, "Deregistered from nameservice"),
        Err(e) => tracing::warn!(task_type, error = %e, "Failed to send deregistration"),
    }
}

/// Send a `HEARTBEAT` every `interval` until `shutdown` fires. Runs as its
/// own concurrent activity for the lifetime of the worker process.
pub async fn heartbeat_loop(
    nameservice_addr: SocketAddr,
    task_type: String,
    max_datagram_bytes: usize,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let result = udp::send_only(
                    nameservice_addr,
                    Opcode::Heartbeat,
                    serde_json::json!({ "type": task_type }),
                    max_datagram_bytes,
                )
                .await;
                if let Err(e) = result {
                    tracing::warn!(task_type = %task_type, error = %e, "Failed to send heartbeat");
                } else {
                    tracing::debug!(task_type = %task_type, "Heartbeat sent");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
