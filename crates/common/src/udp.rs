//! Small UDP request/reply helper shared by every component that speaks the
//! wire protocol to a peer and expects a `RESPONSE` datagram back: the
//! Dispatcher's `LOOKUP_WORKER` calls, the Worker's registration/heartbeat
//! calls, and the Client's `POST_TASK`/`GET_RESULT` calls all retry the same
//! way — send, wait with a timeout, retry up to N times, give up.

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::Value;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::protocol::{decode_message, encode_message, Opcode};

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("failed to bind a local UDP socket: {0}")]
    Bind(std::io::Error),

    #[error("failed to send datagram to {0}: {1}")]
    Send(SocketAddr, std::io::Error),

    #[error("no response from {0} after {1} attempt(s)")]
    Unreachable(SocketAddr, u32),

    #[error(transparent)]
    Protocol(#[from] crate::error::FabricError),
}

/// Policy for a single request/reply exchange: how many times to try, how
/// long to wait for a reply each time, and how long to pause between tries.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub timeout: Duration,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, timeout_secs: u64, interval_secs: u64) -> Self {
        Self {
            attempts: attempts.max(1),
            timeout: Duration::from_secs(timeout_secs),
            interval: Duration::from_secs(interval_secs),
        }
    }
}

/// Send `(opcode, data)` to `target` and wait for a `RESPONSE`, retrying per
/// `policy`. Returns the decoded `data` payload of the first reply received,
/// regardless of whether that reply itself carries an `{"error": ...}`
/// field — callers interpret the payload.
pub async fn request(
    target: SocketAddr,
    opcode: Opcode,
    data: Value,
    max_datagram_bytes: usize,
    policy: RetryPolicy,
) -> Result<Value, RequestError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(RequestError::Bind)?;
    let message = encode_message(&opcode, data, max_datagram_bytes)?;

    let mut last_err = None;
    for attempt in 1..=policy.attempts {
        if let Err(e) = socket.send_to(&message, target).await {
            last_err = Some(RequestError::Send(target, e));
            tokio::time::sleep(policy.interval).await;
            continue;
        }

        let mut buf = vec![0u8; max_datagram_bytes];
        match timeout(policy.timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _from))) => {
                let (_type, value) = decode_message(&buf[..len]);
                return Ok(value);
            }
            Ok(Err(e)) => {
                last_err = Some(RequestError::Send(target, e));
            }
            Err(_elapsed) => {
                tracing::debug!(target = %target, attempt, "request timed out, retrying");
            }
        }

        if attempt < policy.attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(last_err.unwrap_or(RequestError::Unreachable(target, policy.attempts)))
}

/// Fire-and-forget send: used for heartbeats, where a dropped datagram is
/// logged and otherwise ignored rather than retried.
pub async fn send_only(
    target: SocketAddr,
    opcode: Opcode,
    data: Value,
    max_datagram_bytes: usize,
) -> Result<(), RequestError> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(RequestError::Bind)?;
    let message = encode_message(&opcode, data, max_datagram_bytes)?;
    socket
        .send_to(&message, target)
        .await
        .map_err(|e| RequestError::Send(target, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_round_trips_against_an_echo_responder() {
        let responder = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let responder_addr = responder.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let (len, from) = responder.recv_from(&mut buf).await.unwrap();
            let (_opcode, data) = decode_message(&buf[..len]);
            assert_eq!(data["ping"], "pong");
            let reply = encode_message(
                &Opcode::Response,
                serde_json::json!({"message": "ok"}),
                4096,
            )
            .unwrap();
            responder.send_to(&reply, from).await.unwrap();
        });

        let result = request(
            responder_addr,
            Opcode::LookupWorker,
            serde_json::json!({"ping": "pong"}),
            4096,
            RetryPolicy::new(3, 1, 1),
        )
        .await
        .unwrap();

        assert_eq!(result["message"], "ok");
    }

    #[tokio::test]
    async fn request_gives_up_after_exhausting_retries() {
        // Bind a socket nobody replies through.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let result = request(
            addr,
            Opcode::LookupWorker,
            serde_json::json!({}),
            4096,
            RetryPolicy::new(2, 1, 0),
        )
        .await;

        assert!(matches!(result, Err(RequestError::Unreachable(_, 2))));
    }
}
