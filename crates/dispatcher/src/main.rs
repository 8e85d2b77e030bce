use fabric_common::config;
use tokio::net::UdpSocket;

#[tokio::main]
async fn main() {
    let _logging_guard = fabric_common::logging::init("dispatcher");

    let fabric_config = match config::load_config(&config::config_path_from_env()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration — refusing to start");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("0.0.0.0:{}", fabric_config.ports.dispatcher);
    let socket = match UdpSocket::bind(&bind_addr).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(addr = %bind_addr, error = %e, "Failed to bind Dispatcher socket");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %bind_addr, "Dispatcher listening");
    fabric_dispatcher::serve(fabric_config, socket).await;
}
