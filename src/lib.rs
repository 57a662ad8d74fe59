// ============================================================================
// persistglue Library
// ============================================================================
//
// Persistence glue over a storage-session abstraction:
// - codec: typed JSON value codec and column adapters
// - sequence: batched allocator over a backing counter
// - transaction: transaction boundary controller
// - storage: in-memory backing store implementing the session contract
//
// ============================================================================

pub mod codec;
pub mod connection;
pub mod core;
pub mod dialect;
pub mod result;
pub mod sequence;
pub mod storage;
pub mod transaction;

// Re-export main types for convenience
pub use codec::{
    ColumnType, JsonCodec, JsonColumn, JsonNodeColumn, MapColumn, SimpleStringColumn,
    StringListColumn, StringSetColumn, TextArrayColumn,
};
pub use connection::{
    SessionFactory, SessionProvider, StorageSession,
    config::{DatabaseConfig, IsolationLevel, PoolSettings, TemplateClone},
    text_array,
    unit_of_work::{UnitOfWork, UnitOfWorkScope},
};
pub use crate::core::{ColumnKind, NativeArray, PersistError, Result, Row, Value};
pub use dialect::{PostgresDialect, SimpleFullTextSearch, SqlFunction};
pub use result::QueryResult;
pub use sequence::Sequence;
pub use storage::{MemorySession, MemoryStore, StoreStats};
pub use transaction::{TransactionState, Transactions};
