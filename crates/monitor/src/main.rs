use std::net::SocketAddr;
use std::time::Duration;

use fabric_common::config;
use fabric_common::udp::RetryPolicy;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    let _logging_guard = fabric_common::logging::init("monitor");

    let fabric_config = match config::load_config(&config::config_path_from_env()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration — refusing to start");
            std::process::exit(1);
        }
    };

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");

    let dispatcher_addr = match resolve(&fabric_config.ports.dispatcher_host, fabric_config.ports.dispatcher).await {
        Some(addr) => addr,
        None => {
            tracing::error!("Could not resolve dispatcher address");
            std::process::exit(1);
        }
    };
    let nameservice_addr = match resolve(&fabric_config.ports.nameservice_host, fabric_config.ports.nameservice).await
    {
        Some(addr) => addr,
        None => {
            tracing::error!("Could not resolve nameservice address");
            std::process::exit(1);
        }
    };

    let listener = match TcpListener::bind(format!("0.0.0.0:{}", fabric_config.monitor.http_port)).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(error = %e, "Failed to bind HTTP listener");
            std::process::exit(1);
        }
    };

    let poll_policy = RetryPolicy::new(
        fabric_config.monitor.poll_retry_attempts,
        fabric_config.monitor.poll_timeout_secs,
        0,
    );

    fabric_monitor::serve(
        listener,
        dispatcher_addr,
        nameservice_addr,
        fabric_config.protocol.max_datagram_bytes,
        poll_policy,
        Duration::from_secs(fabric_config.monitor.poll_interval_secs),
        metrics_handle,
    )
    .await;
}

async fn resolve(host: &str, port: u16) -> Option<SocketAddr> {
    tokio::net::lookup_host(format!("{host}:{port}")).await.ok()?.next()
}
