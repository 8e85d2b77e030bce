//! Cached view of the fabric, refreshed on an interval by [`crate::poll`].
//! Handlers only ever read the cache — a slow or unreachable Dispatcher
//! never blocks an HTTP request.

use std::net::SocketAddr;
use std::sync::Arc;

use fabric_common::udp::RetryPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

/// The most recently polled view of the fabric, plus whether that poll
/// actually reached both peers.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Snapshot {
    pub stats: Option<Value>,
    pub tasks: Option<Value>,
    pub workers: Option<Value>,
    pub dispatcher_reachable: bool,
    pub nameservice_reachable: bool,
    pub last_polled_at: Option<f64>,
}

impl Snapshot {
    pub fn healthy(&self) -> bool {
        self.dispatcher_reachable && self.nameservice_reachable
    }
}

pub struct MonitorState {
    pub dispatcher_addr: SocketAddr,
    pub nameservice_addr: SocketAddr,
    pub max_datagram_bytes: usize,
    pub poll_policy: RetryPolicy,
    pub metrics_handle: PrometheusHandle,
    snapshot: RwLock<Snapshot>,
}

impl MonitorState {
    pub fn new(
        dispatcher_addr: SocketAddr,
        nameservice_addr: SocketAddr,
        max_datagram_bytes: usize,
        poll_policy: RetryPolicy,
        metrics_handle: PrometheusHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatcher_addr,
            nameservice_addr,
            max_datagram_bytes,
            poll_policy,
            metrics_handle,
            snapshot: RwLock::new(Snapshot::default()),
        })
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.snapshot.read().await.clone()
    }

    pub async fn store(&self, snapshot: Snapshot) {
        *self.snapshot.write().await = snapshot;
    }
}
