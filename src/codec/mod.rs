//! Value codec and column adapters
//!
//! - `json.rs` - typed JSON text codec (`JsonCodec<T>`)
//! - `column.rs` - `ColumnType` and the concrete column adapters

pub mod column;
mod json;

pub use column::{
    ColumnType, JsonColumn, JsonNodeColumn, MapColumn, SimpleStringColumn, StringListColumn,
    StringSetColumn, TextArrayColumn,
};
pub use json::JsonCodec;
