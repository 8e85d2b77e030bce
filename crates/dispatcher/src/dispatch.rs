//! The dispatch pass: for every queued task, look up a live worker for its
//! type and hand the task off if one is free. Computing what to dispatch and
//! marking a worker busy happens under the state's lock; the `LOOKUP_WORKER`
//! round trip to the NameService and the `TASK` send to the worker both
//! happen outside it, so a slow or unreachable peer never blocks task
//! intake. A send failure reverts the claim so the next pass retries.

use std::sync::Arc;

use fabric_common::protocol::{encode_message, Opcode};
use fabric_common::udp;
use tokio::net::UdpSocket;

use crate::state::DispatcherState;

/// Look up the live worker address for `task_type`, retrying against the
/// NameService per the dispatcher's configured policy.
pub async fn lookup_worker(state: &DispatcherState, task_type: &str) -> Option<String> {
    let response = udp::request(
        state.nameservice_addr,
        Opcode::LookupWorker,
        serde_json::json!({ "type": task_type }),
        state.max_datagram_bytes,
        state.lookup_policy,
    )
    .await
    .ok()?;

    response.get("address").and_then(|v| v.as_str()).map(str::to_string)
}

/// One dispatch pass over every currently-queued task.
pub async fn try_dispatch_tasks(state: Arc<DispatcherState>, socket: Arc<UdpSocket>) {
    for (task_id, task_type, payload) in state.queue_snapshot().await {
        let Some(address) = lookup_worker(&state, &task_type).await else {
            continue;
        };

        if state.is_worker_busy(&address).await {
            continue;
        }

        if !state.claim_for_dispatch(task_id, &address).await {
            continue;
        }

        let wire_task = serde_json::json!({
            "id": task_id,
            "type": task_type,
            "payload": payload,
        });

        let message = match encode_message(&Opcode::Task, wire_task, state.max_datagram_bytes) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(task_id, error = %e, "Failed to encode task for dispatch");
                state.revert_claim(task_id, &address).await;
                continue;
            }
        };

        match socket.send_to(&message, address.as_str()).await {
            Ok(_) => {
                tracing::info!(task_id, address = %address, "Task dispatched");
                metrics::counter!("dispatcher.tasks.dispatched").increment(1);
            }
            Err(e) => {
                tracing::error!(task_id, address = %address, error = %e, "Failed to dispatch task");
                state.revert_claim(task_id, &address).await;
            }
        }
    }
}
