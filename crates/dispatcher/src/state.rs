//! Shared dispatcher state: the task table, the FIFO dispatch queue, the
//! per-worker busy table, and the live stats counters. A single
//! [`tokio::sync::Mutex`] guards all four together, keeping the claim and
//! release of a task atomic, while worker I/O (the `LOOKUP_WORKER` round
//! trip and the `TASK` send) happens outside the critical section.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;

use fabric_common::stats::LiveStats;
use fabric_common::task::{now_secs, Task, TaskStatus};
use serde_json::Value;
use tokio::sync::Mutex;

pub struct DispatcherState {
    inner: Mutex<Inner>,
    pub nameservice_addr: SocketAddr,
    pub lookup_policy: fabric_common::udp::RetryPolicy,
    pub max_datagram_bytes: usize,
    pub max_queue_len: Option<usize>,
}

struct Inner {
    queue: VecDeque<u64>,
    tasks: HashMap<u64, Task>,
    next_id: u64,
    busy: HashMap<String, bool>,
    stats: LiveStats,
}

/// Outcome of attempting to enqueue a task: either it was accepted and
/// assigned an id, or the queue was full.
pub enum EnqueueOutcome {
    Accepted(u64),
    QueueFull,
}

impl DispatcherState {
    pub fn new(
        nameservice_addr: SocketAddr,
        lookup_policy: fabric_common::udp::RetryPolicy,
        max_datagram_bytes: usize,
        max_queue_len: Option<usize>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                tasks: HashMap::new(),
                next_id: 1,
                busy: HashMap::new(),
                stats: LiveStats::default(),
            }),
            nameservice_addr,
            lookup_policy,
            max_datagram_bytes,
            max_queue_len,
        }
    }

    /// Accept a new task: assign it an id, record it pending, and enqueue it
    /// for dispatch. Rejects the task if `max_queue_len` is set and already
    /// at capacity.
    pub async fn enqueue_task(&self, task_type: String, payload: Value) -> EnqueueOutcome {
        let mut inner = self.inner.lock().await;

        if let Some(limit) = self.max_queue_len {
            if inner.queue.len() >= limit {
                return EnqueueOutcome::QueueFull;
            }
        }

        let id = inner.next_id;
        inner.next_id += 1;

        inner.stats.total_tasks += 1;
        inner.stats.open_tasks += 1;

        let task = Task::new(id, task_type, payload, now_secs());
        inner.queue.push_back(id);
        inner.tasks.insert(id, task);

        EnqueueOutcome::Accepted(id)
    }

    /// A read-only snapshot of every task still waiting to be dispatched,
    /// in FIFO order, for the dispatch pass to act on outside the lock.
    pub async fn queue_snapshot(&self) -> Vec<(u64, String, Value)> {
        let inner = self.inner.lock().await;
        inner
            .queue
            .iter()
            .filter_map(|id| inner.tasks.get(id))
            .map(|t| (t.id, t.task_type.clone(), t.payload.clone()))
            .collect()
    }

    pub async fn is_worker_busy(&self, address: &str) -> bool {
        let inner = self.inner.lock().await;
        inner.busy.get(address).copied().unwrap_or(false)
    }

    /// Mark `address` busy and remove `task_id` from the queue, recording
    /// the assignment. Returns `false` (a no-op) if the task was already
    /// removed by a concurrent dispatch pass or `RESULT_RETURN`.
    pub async fn claim_for_dispatch(&self, task_id: u64, address: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if !inner.tasks.contains_key(&task_id) {
            return false;
        }
        if inner.busy.get(address).copied().unwrap_or(false) {
            return false;
        }
        let still_queued = inner.queue.iter().any(|id| *id == task_id);
        if !still_queued {
            return false;
        }
        inner.queue.retain(|id| *id != task_id);
        if let Some(task) = inner.tasks.get_mut(&task_id) {
            task.assigned_worker = Some(address.to_string());
        }
        inner.busy.insert(address.to_string(), true);
        true
    }

    /// Undo a claim after the outbound `TASK` send failed: re-queue the task
    /// and free the worker slot so the next dispatch pass retries it.
    pub async fn revert_claim(&self, task_id: u64, address: &str) {
        let mut inner = self.inner.lock().await;
        inner.busy.insert(address.to_string(), false);
        if inner.tasks.contains_key(&task_id) && !inner.queue.iter().any(|id| *id == task_id) {
            inner.queue.push_front(task_id);
        }
    }

    pub async fn result_not_ready(&self, task_id: u64) -> Option<bool> {
        let inner = self.inner.lock().await;
        inner.tasks.get(&task_id).map(|t| t.result.is_none())
    }

    pub async fn result_for(&self, task_id: u64) -> Option<Value> {
        let inner = self.inner.lock().await;
        inner.tasks.get(&task_id).and_then(|t| t.result.clone())
    }

    pub async fn task_exists(&self, task_id: u64) -> bool {
        let inner = self.inner.lock().await;
        inner.tasks.contains_key(&task_id)
    }

    /// Record a worker's result for `task_id`. Returns `None` if the task is
    /// unknown, `Some(true)` if this is the first result recorded for it
    /// (stats should be updated and the worker freed), `Some(false)` if the
    /// task was already done — a duplicate `RESULT_RETURN` — in which case
    /// the caller should reply with the same success message but must not
    /// double-count stats or re-free a worker slot that is already free.
    pub async fn record_result(&self, task_id: u64, result: Value) -> Option<bool> {
        let mut inner = self.inner.lock().await;
        let Some(task) = inner.tasks.get_mut(&task_id) else {
            return None;
        };

        if task.status == TaskStatus::Done {
            return Some(false);
        }

        task.result = Some(result);
        task.status = TaskStatus::Done;
        task.timestamp_completed = Some(now_secs());
        inner.queue.retain(|id| *id != task_id);

        inner.stats.completed_tasks += 1;
        inner.stats.open_tasks = inner.stats.open_tasks.saturating_sub(1);

        let durations: Vec<f64> = inner
            .tasks
            .values()
            .filter_map(|t| t.completion_duration_secs())
            .collect();
        if !durations.is_empty() {
            inner.stats.avg_completion_time =
                round2(durations.iter().sum::<f64>() / durations.len() as f64);
        }

        let mut totals: HashMap<String, f64> = HashMap::new();
        let mut counts: HashMap<String, u64> = HashMap::new();
        for t in inner.tasks.values() {
            if let Some(duration) = t.completion_duration_secs() {
                *totals.entry(t.task_type.clone()).or_insert(0.0) += duration;
                *counts.entry(t.task_type.clone()).or_insert(0) += 1;
            }
        }
        inner.stats.avg_completion_by_type = totals
            .into_iter()
            .map(|(task_type, total)| {
                let count = counts[&task_type] as f64;
                (task_type, round2(total / count))
            })
            .collect();

        Some(true)
    }

    pub async fn assigned_worker_of(&self, task_id: u64) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.tasks.get(&task_id).and_then(|t| t.assigned_worker.clone())
    }

    pub async fn free_worker(&self, address: &str) {
        let mut inner = self.inner.lock().await;
        inner.busy.insert(address.to_string(), false);
    }

    pub async fn stats_snapshot(&self) -> LiveStats {
        self.inner.lock().await.stats.clone()
    }

    pub async fn pending_snapshot(&self, limit: usize) -> Vec<Task> {
        let inner = self.inner.lock().await;
        inner
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn all_tasks_snapshot(&self) -> Vec<Task> {
        let inner = self.inner.lock().await;
        let mut tasks: Vec<Task> = inner.tasks.values().cloned().collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
