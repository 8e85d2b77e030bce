use std::net::SocketAddr;
use std::time::Duration;

use fabric_common::config::FabricConfig;
use fabric_common::protocol::{decode_message, encode_message, Opcode};
use fabric_common::udp::RetryPolicy;
use tokio::net::UdpSocket;

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
    config.dispatch.lookup_retry_attempts = 3;
    config.dispatch.lookup_retry_interval_secs = 0;
    config.dispatch.lookup_timeout_secs = 1;
    tokio::spawn(async move {
        fabric_dispatcher::serve_with_nameservice(config, socket, ns_addr).await;
    });
    addr
}

#[tokio::test]
async fn send_then_result_round_trips_through_a_live_dispatcher() {
    let ns_addr = spawn_nameservice().await;
    let dispatcher_addr = spawn_dispatcher(ns_addr).await;

    // A dispatch pass only runs on task intake or result return, so the
    // worker needs to be registered before POST_TASK for this task to be
    // dispatched at all.
    let stub = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let register = encode_message(&Opcode::RegisterWorker, serde_json::json!({"type": "reverse"}), 4096).unwrap();
    stub.send_to(&register, ns_addr).await.unwrap();
    let mut buf = vec![0u8; 4096];
    stub.recv_from(&mut buf).await.unwrap();

    let policy = RetryPolicy::new(3, 1, 0);
    let response = fabric_client::send_task(
        dispatcher_addr,
        "reverse",
        serde_json::Value::String("hallo".into()),
        4096,
        policy,
    )
    .await
    .unwrap();
    let task_id = fabric_client::extract_task_id(&response).unwrap();

    let (len, dispatcher_from) = tokio::time::timeout(Duration::from_secs(2), stub.recv_from(&mut buf))
        .await
        .expect("dispatcher never dispatched the task")
        .unwrap();
    let (_opcode, task_content) = decode_message(&buf[..len]);
    assert_eq!(task_content["id"], task_id);

    // Before the worker replies, GET_RESULT reports not-ready.
    let not_ready = fabric_client::request_result(dispatcher_addr, task_id, 4096, policy).await.unwrap();
    assert_eq!(not_ready["error"], "Result not ready");

    let result_return = encode_message(
        &Opcode::ResultReturn,
        serde_json::json!({"task_id": task_id, "result": "olleh"}),
        4096,
    )
    .unwrap();
    stub.send_to(&result_return, dispatcher_from).await.unwrap();
    stub.recv_from(&mut buf).await.unwrap();

    let result = fabric_client::request_result(dispatcher_addr, task_id, 4096, policy).await.unwrap();
    assert_eq!(result["result"], "olleh");
}

#[tokio::test]
async fn request_result_for_an_unknown_task_reports_not_found() {
    let ns_addr = spawn_nameservice().await;
    let dispatcher_addr = spawn_dispatcher(ns_addr).await;
    let policy = RetryPolicy::new(3, 1, 0);

    let response = fabric_client::request_result(dispatcher_addr, 99999, 4096, policy).await.unwrap();
    assert_eq!(response["error"], "Task not found");
}
