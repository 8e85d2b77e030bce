pub mod handlers;
pub mod registration;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fabric_common::config::FabricConfig;
use fabric_common::protocol::{decode_message, encode_message, Opcode};
use fabric_common::udp::RetryPolicy;
use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Semaphore};

/// Run one worker process for `task_type`: register, start the heartbeat
/// loop, serve `TASK` datagrams until asked to shut down, then deregister.
pub async fn run(
    fabric_config: FabricConfig,
    task_type: String,
    socket: UdpSocket,
    dispatcher_addr: SocketAddr,
    nameservice_addr: SocketAddr,
    mut shutdown_signal: tokio::sync::oneshot::Receiver<()>,
) {
    let max_bytes = fabric_config.protocol.max_datagram_bytes;

    let registration_policy = RetryPolicy::new(
        fabric_config.worker.registration_retry_attempts,
        fabric_config.worker.registration_timeout_secs,
        fabric_config.worker.registration_retry_interval_secs,
    );

    if let Err(e) = registration::register(nameservice_addr, &task_type, max_bytes, registration_policy).await {
        tracing::error!(task_type = %task_type, error = %e, "Giving up on registration — exiting");
        return;
    }

    let (hb_shutdown_tx, hb_shutdown_rx) = watch::channel(false);
    let heartbeat_handle = tokio::spawn(registration::heartbeat_loop(
        nameservice_addr,
        task_type.clone(),
        max_bytes,
        Duration::from_secs(fabric_config.liveness.heartbeat_interval_secs),
        hb_shutdown_rx,
    ));

    let socket = Arc::new(socket);
    let permits = Arc::new(Semaphore::new(fabric_config.worker.pool_size.max(1)));
    let mut buf = vec![0u8; max_bytes];

    tracing::info!(task_type = %task_type, "Worker listening");

    loop {
        tokio::select! {
            recv = socket.recv_from(&mut buf) => {
                let (len, from) = match recv {
                    Ok(pair) => pair,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to receive datagram");
                        continue;
                    }
                };

                let (_opcode, content) = decode_message(&buf[..len]);
                tracing::info!(from = %from, "Received task");

                let permit = Arc::clone(&permits).acquire_owned().await.expect("semaphore never closes");
                let socket = Arc::clone(&socket);
                let dispatcher_addr = dispatcher_addr;

                tokio::spawn(async move {
                    let _permit = permit;
                    process_task(content, socket, dispatcher_addr, max_bytes).await;
                });
            }
            _ = &mut shutdown_signal => {
                tracing::info!(task_type = %task_type, "Shutdown requested, deregistering");
                break;
            }
        }
    }

    let _ = hb_shutdown_tx.send(true);
    let _ = heartbeat_handle.await;
    registration::deregister(nameservice_addr, &task_type, max_bytes).await;
}

/// Run a single task to completion and return its result to the dispatcher.
/// A handler error is captured, not propagated: the task is reported
/// `"Error processing task: <message>"` so the dispatcher always gets a
/// `RESULT_RETURN`.
async fn process_task(content: Value, socket: Arc<UdpSocket>, dispatcher_addr: SocketAddr, max_bytes: usize) {
    let Some(task_id) = content.get("id").and_then(Value::as_u64) else {
        tracing::error!(content = %content, "Received TASK with no id, dropping");
        return;
    };
    let task_type = content.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
    let payload = content.get("payload").cloned().unwrap_or(Value::Null);

    tracing::info!(task_id, task_type = %task_type, "Processing task");

    let result = match handlers::dispatch(&task_type, payload).await {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(task_id, error = %e, "Task handler failed");
            Value::String(format!("Error processing task: {e}"))
        }
    };

    metrics::counter!("worker.tasks.processed", "type" => task_type.clone()).increment(1);

    let message = match encode_message(
        &Opcode::ResultReturn,
        serde_json::json!({ "task_id": task_id, "result": result }),
        max_bytes,
    ) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(task_id, error = %e, "Failed to encode result");
            return;
        }
    };

    if let Err(e) = socket.send_to(&message, dispatcher_addr).await {
        tracing::error!(task_id, error = %e, "Failed to send result to dispatcher");
    } else {
        tracing::info!(task_id, "Sent result to dispatcher");
    }
}
