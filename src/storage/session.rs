use super::memory::StoreInner;
use super::statement::{CounterStatement, parse_counter_statement};
use crate::connection::StorageSession;
use crate::core::{NativeArray, PersistError, Result, Value};
use crate::result::QueryResult;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

/// Session handle onto a [`MemoryStore`](super::MemoryStore).
///
/// Counter draws are not transactional: a rollback never hands values back.
pub struct MemorySession {
    /// Unique session ID
    id: u64,
    store: Arc<StoreInner>,
    state: Mutex<ConnectionState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Idle,
    InTransaction,
    Closed,
}

const TEXT_ELEMENT_TYPES: [&str; 3] = ["text", "varchar", "character varying"];

impl MemorySession {
    pub(crate) fn new(id: u64, store: Arc<StoreInner>) -> Self {
        Self {
            id,
            store,
            state: Mutex::new(ConnectionState::Idle),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.state().map(|s| s != ConnectionState::Closed).unwrap_or(false)
    }

    /// Close the session, rolling back an open transaction.
    pub fn close(&self) -> Result<()> {
        let mut state = self.state.lock()?;
        match *state {
            ConnectionState::Closed => return Ok(()),
            ConnectionState::InTransaction => {
                self.store.stats.rollbacks.fetch_add(1, Ordering::SeqCst);
            }
            ConnectionState::Idle => {}
        }
        *state = ConnectionState::Closed;
        self.store.stats.sessions_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn state(&self) -> Result<ConnectionState> {
        Ok(*self.state.lock()?)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state()? == ConnectionState::Closed {
            return Err(PersistError::StorageError("Session is closed".into()));
        }
        if !self.store.is_available() {
            return Err(PersistError::StorageError("Store is unavailable".into()));
        }
        Ok(())
    }

    /// Move from `from` to `to`, or explain why the transition is illegal.
    fn transition(&self, from: ConnectionState, to: ConnectionState, illegal: &str) -> Result<()> {
        let mut state = self.state.lock()?;
        match *state {
            ConnectionState::Closed => Err(PersistError::StorageError("Session is closed".into())),
            current if current == from => {
                *state = to;
                Ok(())
            }
            _ => Err(PersistError::TransactionStateError(illegal.into())),
        }
    }
}

impl StorageSession for MemorySession {
    fn begin_transaction(&self) -> Result<()> {
        self.ensure_open()?;
        self.transition(
            ConnectionState::Idle,
            ConnectionState::InTransaction,
            "Transaction already active",
        )?;
        self.store.stats.transactions_begun.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.ensure_open()?;
        self.transition(
            ConnectionState::InTransaction,
            ConnectionState::Idle,
            "No active transaction",
        )?;
        self.store.stats.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        // Rollback must work even while the store is unreachable.
        self.transition(
            ConnectionState::InTransaction,
            ConnectionState::Idle,
            "No active transaction",
        )?;
        self.store.stats.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_transaction_active(&self) -> bool {
        matches!(self.state(), Ok(ConnectionState::InTransaction))
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        self.store.stats.statements_executed.fetch_add(1, Ordering::SeqCst);

        match parse_counter_statement(sql, params)? {
            CounterStatement::NextValues { sequence, count } => {
                let rows = self
                    .store
                    .draw(&sequence, count)?
                    .into_iter()
                    .map(|v| vec![Value::Integer(v)])
                    .collect();
                Ok(QueryResult::new(vec!["nextval".to_string()], rows))
            }
        }
    }

    fn create_native_array(&self, element_type: &str, values: &[String]) -> Result<NativeArray> {
        self.ensure_open()?;
        let element_type = element_type.to_ascii_lowercase();
        if !TEXT_ELEMENT_TYPES.contains(&element_type.as_str()) {
            return Err(PersistError::StorageTypeError(format!(
                "Unsupported array element type: {}",
                element_type
            )));
        }
        Ok(NativeArray::new(element_type, values.to_vec()))
    }

    fn read_native_array(&self, array: &NativeArray) -> Result<Vec<String>> {
        if !TEXT_ELEMENT_TYPES.contains(&array.element_type()) {
            return Err(PersistError::StorageTypeError(format!(
                "Cannot read {}[] as text[]",
                array.element_type()
            )));
        }
        Ok(array.elements().to_vec())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        // Ensure session is closed and transaction rolled back
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_transaction_lifecycle() {
        let store = MemoryStore::new();
        let session = store.session();

        assert!(!session.is_transaction_active());
        session.begin_transaction().unwrap();
        assert!(session.is_transaction_active());
        session.commit().unwrap();
        assert!(!session.is_transaction_active());

        let stats = store.stats();
        assert_eq!(stats.transactions_begun, 1);
        assert_eq!(stats.commits, 1);
    }

    #[test]
    fn test_illegal_transitions() {
        let store = MemoryStore::new();
        let session = store.session();

        assert!(matches!(
            session.commit(),
            Err(PersistError::TransactionStateError(_))
        ));
        assert!(matches!(
            session.rollback(),
            Err(PersistError::TransactionStateError(_))
        ));

        session.begin_transaction().unwrap();
        assert!(matches!(
            session.begin_transaction(),
            Err(PersistError::TransactionStateError(_))
        ));
        session.rollback().unwrap();
    }

    #[test]
    fn test_execute_draws_series() {
        let store = MemoryStore::new();
        store.create_sequence("ids", 1).unwrap();
        let session = store.session();

        let result = session
            .execute(
                "SELECT nextval($1) FROM generate_series(1, $2)",
                &[Value::Text("ids".into()), Value::Integer(4)],
            )
            .unwrap();

        assert_eq!(result.columns, vec!["nextval".to_string()]);
        let values: Vec<i64> = result.first_column().filter_map(Value::as_i64).collect();
        assert_eq!(values, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_draws_survive_rollback() {
        let store = MemoryStore::new();
        store.create_sequence("ids", 1).unwrap();
        let session = store.session();

        session.begin_transaction().unwrap();
        session.execute("SELECT nextval('ids')", &[]).unwrap();
        session.rollback().unwrap();

        let result = session.execute("SELECT nextval('ids')", &[]).unwrap();
        assert_eq!(result.rows()[0][0], Value::Integer(2));
    }

    #[test]
    fn test_unavailable_store() {
        let store = MemoryStore::new();
        store.create_sequence("ids", 1).unwrap();
        let session = store.session();

        session.begin_transaction().unwrap();
        store.set_available(false);
        assert!(matches!(
            session.execute("SELECT nextval('ids')", &[]),
            Err(PersistError::StorageError(_))
        ));
        assert!(session.rollback().is_ok());

        store.set_available(true);
        assert!(session.execute("SELECT nextval('ids')", &[]).is_ok());
    }

    #[test]
    fn test_out_of_range_series_is_a_storage_error() {
        let store = MemoryStore::new();
        store.create_sequence("ids", 1).unwrap();
        let session = store.session();

        let result = session.execute(
            "SELECT nextval($1) FROM generate_series($2, $3)",
            &[
                Value::Text("ids".into()),
                Value::Integer(i64::MIN),
                Value::Integer(i64::MAX),
            ],
        );
        assert!(matches!(result, Err(PersistError::StorageError(_))));
        assert_eq!(store.current_value("ids").unwrap(), None);
    }

    #[test]
    fn test_unknown_sequence() {
        let store = MemoryStore::new();
        let session = store.session();
        assert!(session.execute("SELECT nextval('missing')", &[]).is_err());
    }

    #[test]
    fn test_native_arrays() {
        let store = MemoryStore::new();
        let session = store.session();

        let array = session
            .create_native_array("TEXT", &["x".to_string(), "y".to_string()])
            .unwrap();
        assert_eq!(array.element_type(), "text");
        assert_eq!(session.read_native_array(&array).unwrap(), vec!["x", "y"]);

        assert!(matches!(
            session.create_native_array("int4", &["1".to_string()]),
            Err(PersistError::StorageTypeError(_))
        ));
        let ints = NativeArray::new("int4", vec!["1".into()]);
        assert!(matches!(
            session.read_native_array(&ints),
            Err(PersistError::StorageTypeError(_))
        ));
    }

    #[test]
    fn test_close_rolls_back_and_blocks_use() {
        let store = MemoryStore::new();
        let session = store.session();

        session.begin_transaction().unwrap();
        session.close().unwrap();
        assert!(!session.is_open());
        assert!(!session.is_transaction_active());
        assert_eq!(store.stats().rollbacks, 1);
        assert!(session.begin_transaction().is_err());

        // Closing again, or dropping, counts nothing further.
        session.close().unwrap();
        drop(session);
        assert_eq!(store.stats().sessions_closed, 1);
        assert_eq!(store.stats().rollbacks, 1);
    }

    #[test]
    fn test_drop_rolls_back() {
        let store = MemoryStore::new();
        {
            let session = store.session();
            session.begin_transaction().unwrap();
        }
        assert_eq!(store.stats().rollbacks, 1);
    }
}
