//! The NameService's sole piece of shared state: a mapping from task-type to
//! the live worker endpoint that handles it. Guarded by a single mutex, per
//! the fabric-wide shared-state discipline — critical sections here never do
//! I/O, so the lock is never held across an `.await`.

use std::collections::HashMap;
use std::sync::Mutex;

use fabric_common::task::now_secs;

#[derive(Clone, Debug)]
struct Entry {
    address: String,
    last_seen: f64,
}

/// In-memory, type → worker-endpoint registry with heartbeat-based liveness.
pub struct Registry {
    entries: Mutex<HashMap<String, Entry>>,
    heartbeat_timeout_secs: f64,
}

impl Registry {
    pub fn new(heartbeat_timeout_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            heartbeat_timeout_secs: heartbeat_timeout_secs as f64,
        }
    }

    fn is_live(&self, entry: &Entry, now: f64) -> bool {
        now - entry.last_seen <= self.heartbeat_timeout_secs
    }

    /// Insert or replace the entry for `task_type`. A later registration for
    /// the same type always replaces the previous endpoint (invariant i).
    pub fn register(&self, task_type: &str, address: String) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            task_type.to_string(),
            Entry {
                address,
                last_seen: now_secs(),
            },
        );
    }

    /// Refresh `last_seen` for every entry whose address matches `address`
    /// (normally exactly one, but a replaced entry's old heartbeat arriving
    /// late is harmless — it simply updates whichever entry still matches).
    /// Returns the number of entries updated.
    pub fn heartbeat(&self, address: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let now = now_secs();
        let mut updated = 0;
        for entry in entries.values_mut() {
            if entry.address == address {
                entry.last_seen = now;
                updated += 1;
            }
        }
        updated
    }

    /// Return the live address registered for `task_type`, if any.
    pub fn lookup(&self, task_type: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap();
        let now = now_secs();
        entries
            .get(task_type)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.address.clone())
    }

    /// Remove every entry whose address matches `address`. Returns the count removed.
    pub fn deregister(&self, address: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.address != address);
        before - entries.len()
    }

    /// Enumerate all currently-live entries as `(task_type, address)` pairs.
    /// Stale entries are skipped but not evicted here — liveness is checked
    /// lazily at read time, with no background reaper (§9, Lazy liveness).
    pub fn list_live(&self) -> Vec<(String, String)> {
        let entries = self.entries.lock().unwrap();
        let now = now_secs();
        entries
            .iter()
            .filter(|(_, entry)| self.is_live(entry, now))
            .map(|(task_type, entry)| (task_type.clone(), entry.address.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_lookup_returns_the_address() {
        let registry = Registry::new(30);
        registry.register("reverse", "10.0.0.1:6000".into());
        assert_eq!(registry.lookup("reverse"), Some("10.0.0.1:6000".into()));
    }

    #[test]
    fn lookup_of_unknown_type_is_none() {
        let registry = Registry::new(30);
        assert_eq!(registry.lookup("nope"), None);
    }

    #[test]
    fn later_registration_replaces_the_endpoint() {
        let registry = Registry::new(30);
        registry.register("reverse", "10.0.0.1:6000".into());
        registry.register("reverse", "10.0.0.2:6000".into());
        assert_eq!(registry.lookup("reverse"), Some("10.0.0.2:6000".into()));
    }

    #[test]
    fn stale_entry_is_invisible_to_lookup_and_list() {
        let registry = Registry::new(0);
        registry.register("reverse", "10.0.0.1:6000".into());
        // heartbeat_timeout_secs = 0, so the entry is already stale the
        // instant time moves forward even a tiny amount; simulate via
        // a manual lookback by constructing an already-expired registry.
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(registry.lookup("reverse"), None);
        assert!(registry.list_live().is_empty());
    }

    #[test]
    fn heartbeat_updates_only_matching_address_entries() {
        let registry = Registry::new(30);
        registry.register("reverse", "10.0.0.1:6000".into());
        registry.register("upper", "10.0.0.2:6000".into());
        let updated = registry.heartbeat("10.0.0.1:6000");
        assert_eq!(updated, 1);
    }

    #[test]
    fn deregister_removes_all_entries_for_an_address() {
        let registry = Registry::new(30);
        registry.register("reverse", "10.0.0.1:6000".into());
        registry.register("upper", "10.0.0.1:6000".into());
        registry.register("hash", "10.0.0.2:6000".into());
        let removed = registry.deregister("10.0.0.1:6000");
        assert_eq!(removed, 2);
        assert_eq!(registry.lookup("hash"), Some("10.0.0.2:6000".into()));
    }

    #[test]
    fn list_live_reflects_multiple_registrations() {
        let registry = Registry::new(30);
        registry.register("reverse", "10.0.0.1:6000".into());
        registry.register("upper", "10.0.0.2:6000".into());
        let mut workers = registry.list_live();
        workers.sort();
        assert_eq!(
            workers,
            vec![
                ("reverse".to_string(), "10.0.0.1:6000".to_string()),
                ("upper".to_string(), "10.0.0.2:6000".to_string()),
            ]
        );
    }
}
