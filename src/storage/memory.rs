use super::MemorySession;
use super::statement::MAX_SERIES_ROWS;
use crate::connection::{SessionFactory, StorageSession};
use crate::core::{PersistError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{Level, event};

/// In-process backing store holding named monotonic counters.
///
/// Cloning yields another handle to the same store, so counters are shared by
/// every session opened from any clone.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
pub(crate) struct StoreInner {
    counters: Mutex<HashMap<String, Counter>>,
    unavailable: AtomicBool,
    next_session_id: AtomicU64,
    pub(crate) stats: StatCounters,
}

struct Counter {
    start: i64,
    /// Next value to hand out
    next: i64,
}

#[derive(Default)]
pub(crate) struct StatCounters {
    pub(crate) sessions_opened: AtomicU64,
    pub(crate) sessions_closed: AtomicU64,
    pub(crate) transactions_begun: AtomicU64,
    pub(crate) commits: AtomicU64,
    pub(crate) rollbacks: AtomicU64,
    pub(crate) statements_executed: AtomicU64,
}

/// Store activity counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub transactions_begun: u64,
    pub commits: u64,
    pub rollbacks: u64,
    pub statements_executed: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a counter whose first value is `start`.
    pub fn create_sequence(&self, name: &str, start: i64) -> Result<()> {
        let mut counters = self.inner.counters.lock()?;
        if counters.contains_key(name) {
            return Err(PersistError::StorageError(format!(
                "Sequence '{}' already exists",
                name
            )));
        }
        counters.insert(name.to_string(), Counter { start, next: start });
        event!(Level::INFO, sequence = name, start, "sequence created");
        Ok(())
    }

    pub fn drop_sequence(&self, name: &str) -> Result<()> {
        let mut counters = self.inner.counters.lock()?;
        counters
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PersistError::StorageError(format!("Sequence '{}' not found", name)))
    }

    /// Last value handed out, or `None` if the counter has not been drawn from.
    pub fn current_value(&self, name: &str) -> Result<Option<i64>> {
        let counters = self.inner.counters.lock()?;
        let counter = counters
            .get(name)
            .ok_or_else(|| PersistError::StorageError(format!("Sequence '{}' not found", name)))?;
        Ok((counter.next > counter.start).then(|| counter.next - 1))
    }

    /// Simulate losing (or regaining) the connection to the store.
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Open a session as its concrete type.
    pub fn session(&self) -> Arc<MemorySession> {
        let id = self.inner.next_session_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.stats.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Arc::new(MemorySession::new(id, Arc::clone(&self.inner)))
    }

    pub fn stats(&self) -> StoreStats {
        let stats = &self.inner.stats;
        StoreStats {
            sessions_opened: stats.sessions_opened.load(Ordering::SeqCst),
            sessions_closed: stats.sessions_closed.load(Ordering::SeqCst),
            transactions_begun: stats.transactions_begun.load(Ordering::SeqCst),
            commits: stats.commits.load(Ordering::SeqCst),
            rollbacks: stats.rollbacks.load(Ordering::SeqCst),
            statements_executed: stats.statements_executed.load(Ordering::SeqCst),
        }
    }
}

impl SessionFactory for MemoryStore {
    fn open_session(&self) -> Result<Arc<dyn StorageSession>> {
        Ok(self.session())
    }
}

impl StoreInner {
    pub(crate) fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    /// Draw `count` consecutive values from `name`, in ascending order.
    pub(crate) fn draw(&self, name: &str, count: u64) -> Result<Vec<i64>> {
        let mut counters = self.counters.lock()?;
        let counter = counters
            .get_mut(name)
            .ok_or_else(|| PersistError::StorageError(format!("Sequence '{}' not found", name)))?;

        if count > MAX_SERIES_ROWS {
            return Err(PersistError::StorageError(format!(
                "Cannot draw {} values at once, limit is {}",
                count, MAX_SERIES_ROWS
            )));
        }
        let count = i64::try_from(count)
            .map_err(|_| PersistError::StorageError("Series too large".into()))?;
        let end = counter
            .next
            .checked_add(count)
            .ok_or_else(|| PersistError::StorageError(format!("Sequence '{}' exhausted", name)))?;

        let values = (counter.next..end).collect();
        counter.next = end;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_is_consecutive_and_monotonic() {
        let store = MemoryStore::new();
        store.create_sequence("ids", 1).unwrap();

        assert_eq!(store.inner.draw("ids", 3).unwrap(), vec![1, 2, 3]);
        assert_eq!(store.inner.draw("ids", 2).unwrap(), vec![4, 5]);
        assert_eq!(store.current_value("ids").unwrap(), Some(5));
    }

    #[test]
    fn test_sequence_lifecycle() {
        let store = MemoryStore::new();
        store.create_sequence("ids", 100).unwrap();
        assert!(store.create_sequence("ids", 1).is_err());
        assert_eq!(store.current_value("ids").unwrap(), None);

        store.drop_sequence("ids").unwrap();
        assert!(store.drop_sequence("ids").is_err());
        assert!(store.inner.draw("ids", 1).is_err());
    }

    #[test]
    fn test_clones_share_counters() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.create_sequence("shared", 10).unwrap();

        assert_eq!(other.inner.draw("shared", 1).unwrap(), vec![10]);
        assert_eq!(store.inner.draw("shared", 1).unwrap(), vec![11]);
    }

    #[test]
    fn test_oversized_draw_is_rejected() {
        let store = MemoryStore::new();
        store.create_sequence("ids", 1).unwrap();
        assert!(matches!(
            store.inner.draw("ids", MAX_SERIES_ROWS + 1),
            Err(PersistError::StorageError(_))
        ));
        assert_eq!(store.current_value("ids").unwrap(), None);
    }

    #[test]
    fn test_exhaustion_is_an_error() {
        let store = MemoryStore::new();
        store.create_sequence("tiny", i64::MAX - 1).unwrap();
        assert!(store.inner.draw("tiny", 5).is_err());
        assert_eq!(store.inner.draw("tiny", 1).unwrap(), vec![i64::MAX - 1]);
    }
}
