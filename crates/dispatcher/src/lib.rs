pub mod dispatch;
pub mod handler;
pub mod state;

use std::sync::Arc;

use fabric_common::config::FabricConfig;
use fabric_common::udp::RetryPolicy;
use state::DispatcherState;
use tokio::net::UdpSocket;

/// Bind the Dispatcher socket and serve forever. Split out of `main` so
/// integration tests can run a real instance on an ephemeral port.
pub async fn serve(fabric_config: FabricConfig, socket: UdpSocket) {
    let host_port = format!(
        "{}:{}",
        fabric_config.ports.nameservice_host, fabric_config.ports.nameservice
    );
    let nameservice_addr = tokio::net::lookup_host(&host_port)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .unwrap_or_else(|| {
            tracing::warn!(host_port = %host_port, "Failed to resolve nameservice host, falling back to loopback");
            format!("127.0.0.1:{}", fabric_config.ports.nameservice).parse().unwrap()
        });

    serve_with_nameservice(fabric_config, socket, nameservice_addr).await;
}

/// As [`serve`], but lets the caller point at an arbitrary NameService
/// address — the real `main` always resolves it from the fabric's own
/// config, but tests need to point at an ephemeral-port instance.
pub async fn serve_with_nameservice(
    fabric_config: FabricConfig,
    socket: UdpSocket,
    nameservice_addr: std::net::SocketAddr,
) {
    let lookup_policy = RetryPolicy::new(
        fabric_config.dispatch.lookup_retry_attempts,
        fabric_config.dispatch.lookup_timeout_secs,
        fabric_config.dispatch.lookup_retry_interval_secs,
    );

    let state = Arc::new(DispatcherState::new(
        nameservice_addr,
        lookup_policy,
        fabric_config.protocol.max_datagram_bytes,
        fabric_config.dispatch.max_queue_len,
    ));
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; fabric_config.protocol.max_datagram_bytes];

    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(error = %e, "Failed to receive datagram");
                continue;
            }
        };

        let data = buf[..len].to_vec();
        let socket = Arc::clone(&socket);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            handler::handle_request(data, from, socket, state).await;
        });
    }
}
