//! Drives the Monitor's real HTTP surface over a raw TCP connection (no
//! HTTP client dependency needed) against a real Dispatcher and NameService.

use std::net::SocketAddr;
use std::time::Duration;

use fabric_common::config::FabricConfig;
use fabric_common::udp::RetryPolicy;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

async fn spawn_nameservice() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        fabric_nameservice::serve(FabricConfig::default(), socket).await;
    });
    addr
}

async fn spawn_dispatcher(ns_addr: SocketAddr) -> SocketAddr {
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

async fn http_get(addr: SocketAddr, path: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn health_reports_unhealthy_then_healthy_once_peers_are_reachable() {
    let ns_addr = spawn_nameservice().await;
    let dispatcher_addr = spawn_dispatcher(ns_addr).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let monitor_addr = listener.local_addr().unwrap();
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder().handle();

    tokio::spawn(fabric_monitor::serve(
        listener,
        dispatcher_addr,
        ns_addr,
        4096,
        RetryPolicy::new(1, 1, 0),
        Duration::from_millis(50),
        metrics_handle,
    ));

    // Give the poll loop a moment to complete its first cycle.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = http_get(monitor_addr, "/health").await;
    assert!(response.starts_with("HTTP/1.1 200"), "unexpected response: {response}");
    assert!(response.contains("\"healthy\""));

    let stats_response = http_get(monitor_addr, "/stats").await;
    assert!(stats_response.starts_with("HTTP/1.1 200"));
    assert!(stats_response.contains("total_tasks"));

    let workers_response = http_get(monitor_addr, "/workers").await;
    assert!(workers_response.starts_with("HTTP/1.1 200"));
    assert!(workers_response.contains("workers"));
}
