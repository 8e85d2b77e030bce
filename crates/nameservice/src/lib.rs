pub mod handler;
pub mod registry;

use std::sync::Arc;

use fabric_common::config::FabricConfig;
use registry::Registry;
use tokio::net::UdpSocket;

/// Bind the NameService socket and serve forever. Split out of `main` so
/// integration tests can run a real instance on an ephemeral port.
pub async fn serve(fabric_config: FabricConfig, socket: UdpSocket) {
    let registry = Arc::new(Registry::new(fabric_config.liveness.heartbeat_timeout_secs));
    let socket = Arc::new(socket);
    let max_bytes = fabric_config.protocol.max_datagram_bytes;
    let worker_port = fabric_config.ports.worker;
    let mut buf = vec![0u8; max_bytes];

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
        let registry = Arc::clone(&registry);

        tokio::spawn(async move {
            handler::handle_request(data, from, socket, registry, worker_port, max_bytes).await;
        });
    }
}
