pub mod config;
pub mod unit_of_work;

use crate::core::{NativeArray, Result, Value};
use crate::result::QueryResult;
use std::sync::Arc;

/// One connection/unit-of-work context with transaction control.
///
/// Sessions are shared handles: every method takes `&self` and the handle is
/// passed around as `Arc<dyn StorageSession>`. A session is still meant to be
/// driven from one thread at a time.
pub trait StorageSession: Send + Sync {
    /// Start a transaction. Fails if one is already active.
    fn begin_transaction(&self) -> Result<()>;

    /// Commit the active transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the active transaction.
    fn rollback(&self) -> Result<()>;

    fn is_transaction_active(&self) -> bool;

    /// Execute a parameterized statement (`$1`, `$2`, ...) and return its rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Build a driver array of `element_type` holding `values`.
    fn create_native_array(&self, element_type: &str, values: &[String]) -> Result<NativeArray>;

    /// Read the elements back out of a driver array.
    fn read_native_array(&self, array: &NativeArray) -> Result<Vec<String>>;
}

/// Opens fresh sessions against a backing store.
pub trait SessionFactory: Send + Sync {
    fn open_session(&self) -> Result<Arc<dyn StorageSession>>;
}

/// Resolves the session bound to the calling context.
pub trait SessionProvider: Send + Sync {
    fn current_session(&self) -> Result<Arc<dyn StorageSession>>;

    /// Drop whatever session this provider bound to the calling thread.
    ///
    /// Called when work that ran on a borrowed thread (tokio's blocking pool)
    /// is done with it. Providers without thread bindings do nothing.
    fn release_current(&self) {}
}

/// A lone session is its own provider.
impl<S: StorageSession + 'static> SessionProvider for Arc<S> {
    fn current_session(&self) -> Result<Arc<dyn StorageSession>> {
        Ok(self.clone() as Arc<dyn StorageSession>)
    }
}

/// Build a `text[]` statement parameter from `values`.
///
/// # Examples
///
/// ```ignore
/// let tags = text_array(session.as_ref(), ["red", "blue"])?;
/// session.execute("SELECT id FROM items WHERE tags && $1", &[tags])?;
/// ```
pub fn text_array<I, S>(session: &dyn StorageSession, values: I) -> Result<Value>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let values: Vec<String> = values.into_iter().map(Into::into).collect();
    Ok(Value::Array(session.create_native_array("text", &values)?))
}
