//! Drives a real NameService instance over loopback UDP on an ephemeral
//! port, exercising the request/reply surface from outside the crate.

use std::net::SocketAddr;
use std::time::Duration;

use fabric_common::config::FabricConfig;
use fabric_common::protocol::{decode_message, encode_message, Opcode};
use tokio::net::UdpSocket;

async fn spawn_nameservice(heartbeat_timeout_secs: u64) -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    let mut config = FabricConfig::default();
    config.liveness.heartbeat_timeout_secs = heartbeat_timeout_secs;

    tokio::spawn(async move {
        fabric_nameservice::serve(config, socket).await;
    });

    addr
}

async fn roundtrip(client: &UdpSocket, ns_addr: SocketAddr, opcode: Opcode, data: serde_json::Value) -> serde_json::Value {
    let message = encode_message(&opcode, data, 4096).unwrap();
    client.send_to(&message, ns_addr).await.unwrap();
    let mut buf = vec![0u8; 4096];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
        .await
        .expect("timed out waiting for nameservice reply")
        .unwrap();
    decode_message(&buf[..len]).1
}

#[tokio::test]
async fn register_then_lookup_returns_the_client_source_address() {
    let ns_addr = spawn_nameservice(30).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let client_port = client.local_addr().unwrap().port();

    let register_reply = roundtrip(
        &client,
        ns_addr,
        Opcode::RegisterWorker,
        serde_json::json!({"type": "reverse"}),
    )
    .await;
    assert!(register_reply["message"].as_str().unwrap().contains("Registered"));

    let lookup_reply = roundtrip(
        &client,
        ns_addr,
        Opcode::LookupWorker,
        serde_json::json!({"type": "reverse"}),
    )
    .await;

    // The fixed WORKER_PORT (6000 by default) is appended to the client's
    // loopback source IP, not the client's own ephemeral port.
    assert_eq!(lookup_reply["address"], format!("127.0.0.1:6000"));
    assert_ne!(lookup_reply["address"], format!("127.0.0.1:{client_port}"));
}

#[tokio::test]
async fn lookup_for_unregistered_type_errors() {
    let ns_addr = spawn_nameservice(30).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let reply = roundtrip(
        &client,
        ns_addr,
        Opcode::LookupWorker,
        serde_json::json!({"type": "nonexistent"}),
    )
    .await;

    assert!(reply["error"].is_string());
}

#[tokio::test]
async fn deregister_removes_the_entry() {
    let ns_addr = spawn_nameservice(30).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    roundtrip(&client, ns_addr, Opcode::RegisterWorker, serde_json::json!({"type": "sum"})).await;
    roundtrip(&client, ns_addr, Opcode::DeregisterWorker, serde_json::json!({})).await;

    let reply = roundtrip(&client, ns_addr, Opcode::LookupWorker, serde_json::json!({"type": "sum"})).await;
    assert!(reply["error"].is_string());
}

#[tokio::test]
async fn heartbeat_refreshes_liveness_past_the_timeout() {
    // A 1-second timeout; heartbeat every 400ms should keep the entry alive
    // well past where it would otherwise expire.
    let ns_addr = spawn_nameservice(1).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    roundtrip(&client, ns_addr, Opcode::RegisterWorker, serde_json::json!({"type": "wait"})).await;

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_millis(400)).await;
        roundtrip(&client, ns_addr, Opcode::Heartbeat, serde_json::json!({"type": "wait"})).await;
    }

    let reply = roundtrip(&client, ns_addr, Opcode::LookupWorker, serde_json::json!({"type": "wait"})).await;
    assert!(reply["address"].is_string());
}

#[tokio::test]
async fn entry_expires_after_heartbeat_timeout_elapses() {
    let ns_addr = spawn_nameservice(1).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    roundtrip(&client, ns_addr, Opcode::RegisterWorker, serde_json::json!({"type": "hash"})).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let lookup = roundtrip(&client, ns_addr, Opcode::LookupWorker, serde_json::json!({"type": "hash"})).await;
    assert!(lookup["error"].is_string());

    let list = roundtrip(&client, ns_addr, Opcode::ListWorkers, serde_json::json!({})).await;
    assert!(list["workers"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unknown_opcode_gets_an_error_response() {
    let ns_addr = spawn_nameservice(30).await;
    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    let reply = roundtrip(&client, ns_addr, Opcode::Task, serde_json::json!({})).await;
    assert_eq!(reply["error"], "Unknown message type");
}
