pub mod error;
pub mod types;
pub mod value;

pub use error::{PersistError, Result};
pub use types::{ColumnKind, NativeArray, Row};
pub use value::Value;
