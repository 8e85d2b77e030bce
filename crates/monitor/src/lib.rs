pub mod poll;
pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;

pub use state::MonitorState;

/// Build the Monitor's state and background poll loop, then serve the HTTP
/// surface on `listener` until the process is killed.
pub async fn serve(
    listener: TcpListener,
    dispatcher_addr: SocketAddr,
    nameservice_addr: SocketAddr,
    max_datagram_bytes: usize,
    poll_policy: fabric_common::udp::RetryPolicy,
    poll_interval: Duration,
    metrics_handle: PrometheusHandle,
) {
    let state = MonitorState::new(
        dispatcher_addr,
        nameservice_addr,
        max_datagram_bytes,
        poll_policy,
        metrics_handle,
    );

    let poll_state = Arc::clone(&state);
    tokio::spawn(async move {
        poll::run_poll_loop(poll_state, poll_interval).await;
    });

    let app = routes::build_router(state);
    tracing::info!(addr = ?listener.local_addr(), "Monitor listening");
    axum::serve(listener, app).await.expect("HTTP server error");
}
