//! Wire protocol: every datagram is UTF-8 JSON of `{"type": <opcode>, "data": <value>}`,
//! at most [`crate::config::ProtocolLimits::max_datagram_bytes`] bytes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FabricError, Result};

/// The fixed set of opcodes the fabric speaks, plus a catch-all for anything
/// else that arrives on the wire — callers decide whether an unrecognized
/// opcode is an error or simply ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    PostTask,
    GetResult,
    ResultReturn,
    RegisterWorker,
    DeregisterWorker,
    LookupWorker,
    Heartbeat,
    ListWorkers,
    GetStats,
    GetAllTasks,
    Task,
    Response,
    Other(String),
}

impl Opcode {
    pub fn as_str(&self) -> &str {
        match self {
            Opcode::PostTask => "POST_TASK",
            Opcode::GetResult => "GET_RESULT",
            Opcode::ResultReturn => "RESULT_RETURN",
            Opcode::RegisterWorker => "REGISTER_WORKER",
            Opcode::DeregisterWorker => "DEREGISTER_WORKER",
            Opcode::LookupWorker => "LOOKUP_WORKER",
            Opcode::Heartbeat => "HEARTBEAT",
            Opcode::ListWorkers => "LIST_WORKERS",
            Opcode::GetStats => "GET_STATS",
            Opcode::GetAllTasks => "GET_ALL_TASKS",
            Opcode::Task => "TASK",
            Opcode::Response => "RESPONSE",
            Opcode::Other(s) => s,
        }
    }
}

impl From<&str> for Opcode {
    fn from(s: &str) -> Self {
        match s {
            "POST_TASK" => Opcode::PostTask,
            "GET_RESULT" => Opcode::GetResult,
            "RESULT_RETURN" => Opcode::ResultReturn,
            "REGISTER_WORKER" => Opcode::RegisterWorker,
            "DEREGISTER_WORKER" => Opcode::DeregisterWorker,
            "LOOKUP_WORKER" => Opcode::LookupWorker,
            "HEARTBEAT" => Opcode::Heartbeat,
            "LIST_WORKERS" => Opcode::ListWorkers,
            "GET_STATS" => Opcode::GetStats,
            "GET_ALL_TASKS" => Opcode::GetAllTasks,
            "TASK" => Opcode::Task,
            "RESPONSE" => Opcode::Response,
            other => Opcode::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    #[serde(rename = "type")]
    msg_type: String,
    data: Value,
}

/// Encode a message as the framed JSON byte blob described in the wire protocol.
/// Fails if the encoded message would exceed `max_datagram_bytes`.
pub fn encode_message(msg_type: &Opcode, data: Value, max_datagram_bytes: usize) -> Result<Vec<u8>> {
    let bytes = serde_json::to_vec(&WireMessage {
        msg_type: msg_type.as_str().to_string(),
        data,
    })?;

    if bytes.len() > max_datagram_bytes {
        return Err(FabricError::TooLarge(bytes.len(), max_datagram_bytes));
    }

    Ok(bytes)
}

/// Decode a datagram into `(opcode, data)`. On malformed input, returns
/// `(None, {"error": <message>})` rather than propagating an error, so a
/// single bad datagram never takes down the receive loop.
pub fn decode_message(bytes: &[u8]) -> (Option<Opcode>, Value) {
    let text = match std::str::from_utf8(bytes) {
        Ok(t) => t,
        Err(e) => return (None, serde_json::json!({ "error": e.to_string() })),
    };

    match serde_json::from_str::<WireMessage>(text) {
        Ok(msg) => (Some(Opcode::from(msg.msg_type.as_str())), msg.data),
        Err(e) => (None, serde_json::json!({ "error": e.to_string() })),
    }
}
