//! Polls the Dispatcher and NameService over UDP on an interval and updates
//! the cached [`Snapshot`] plus the ambient Prometheus gauges. Each fabric
//! peer is queried independently — a slow or downed NameService never
//! blocks the Dispatcher stats from refreshing, and vice versa.

use std::sync::Arc;
use std::time::Duration;

use fabric_common::protocol::Opcode;
use fabric_common::{now_secs, udp};

use crate::state::{MonitorState, Snapshot};

/// Run one poll cycle against both peers and store the result.
pub async fn poll_once(state: &Arc<MonitorState>) {
    let stats_reply = udp::request(
        state.dispatcher_addr,
        Opcode::GetStats,
        serde_json::json!({}),
        state.max_datagram_bytes,
        state.poll_policy,
    )
    .await;

    let tasks_reply = udp::request(
        state.dispatcher_addr,
        Opcode::GetAllTasks,
        serde_json::json!({}),
        state.max_datagram_bytes,
        state.poll_policy,
    )
    .await;

    let workers_reply = udp::request(
        state.nameservice_addr,
        Opcode::ListWorkers,
        serde_json::json!({}),
        state.max_datagram_bytes,
        state.poll_policy,
    )
    .await;

    let dispatcher_reachable = stats_reply.is_ok() && tasks_reply.is_ok();
    let nameservice_reachable = workers_reply.is_ok();

    if let Ok(ref stats) = stats_reply {
        update_gauges(stats);
    } else if let Err(ref e) = stats_reply {
        tracing::warn!(error = %e, "Failed to poll dispatcher stats");
    }
    if let Err(ref e) = tasks_reply {
        tracing::warn!(error = %e, "Failed to poll dispatcher tasks");
    }
    if let Err(ref e) = workers_reply {
        tracing::warn!(error = %e, "Failed to poll nameservice workers");
    }

    let snapshot = Snapshot {
        stats: stats_reply.ok(),
        tasks: tasks_reply.ok(),
        workers: workers_reply.ok(),
        dispatcher_reachable,
        nameservice_reachable,
        last_polled_at: Some(now_secs()),
    };

    state.store(snapshot).await;
}

fn update_gauges(stats_reply: &serde_json::Value) {
    let Some(stats) = stats_reply.get("stats") else {
        return;
    };
    if let Some(total) = stats.get("total_tasks").and_then(serde_json::Value::as_u64) {
        metrics::gauge!("fabric_total_tasks").set(total as f64);
    }
    if let Some(completed) = stats.get("completed_tasks").and_then(serde_json::Value::as_u64) {
        metrics::gauge!("fabric_completed_tasks").set(completed as f64);
    }
    if let Some(open) = stats.get("open_tasks").and_then(serde_json::Value::as_u64) {
        metrics::gauge!("fabric_open_tasks").set(open as f64);
    }
}

/// Poll forever on `interval`, starting with an immediate poll so the first
/// HTTP request after startup doesn't see an empty snapshot any longer than
/// necessary.
pub async fn run_poll_loop(state: Arc<MonitorState>, interval: Duration) {
    loop {
        poll_once(&state).await;
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fabric_common::config::FabricConfig;
    use tokio::net::UdpSocket;

    async fn spawn_nameservice() -> std::net::SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            fabric_nameservice::serve(FabricConfig::default(), socket).await;
        });
        addr
    }

    async fn spawn_dispatcher(ns_addr: std::net::SocketAddr) -> std::net::SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let mut config = FabricConfig::default();
        config.dispatch.lookup_retry_attempts = 1;
        config.dispatch.lookup_retry_interval_secs = 0;
        tokio::spawn(async move {
            fabric_dispatcher::serve_with_nameservice(config, socket, ns_addr).await;
        });
        addr
    }

    fn test_state(dispatcher_addr: std::net::SocketAddr, ns_addr: std::net::SocketAddr) -> Arc<MonitorState> {
        let handle = metrics_exporter_prometheus::PrometheusBuilder::new()
            .build_recorder()
            .handle();
        MonitorState::new(
            dispatcher_addr,
            ns_addr,
            4096,
            udp::RetryPolicy::new(2, 1, 0),
            handle,
        )
    }

    #[tokio::test]
    async fn poll_once_populates_a_reachable_snapshot() {
        let ns_addr = spawn_nameservice().await;
        let dispatcher_addr = spawn_dispatcher(ns_addr).await;
        let state = test_state(dispatcher_addr, ns_addr);

        poll_once(&state).await;
        let snapshot = state.snapshot().await;
        assert!(snapshot.healthy());
        assert!(snapshot.stats.is_some());
        assert!(snapshot.workers.is_some());
    }

    #[tokio::test]
    async fn poll_once_reports_unreachable_dispatcher() {
        let ns_addr = spawn_nameservice().await;
        // Nobody listens at this ephemeral address's actual dispatcher port.
        let dead = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = dead.local_addr().unwrap();
        drop(dead);

        let state = test_state(dead_addr, ns_addr);
        poll_once(&state).await;
        let snapshot = state.snapshot().await;
        assert!(!snapshot.dispatcher_reachable);
        assert!(snapshot.nameservice_reachable);
        assert!(!snapshot.healthy());
    }
}
