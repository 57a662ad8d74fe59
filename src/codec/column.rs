//! Column adapters
//!
//! Each adapter binds one logical value type to a storage column. JSON-backed
//! adapters go through [`JsonCodec`]; simple-string adapters keep the column
//! human readable; the text-array adapter hands the value to the driver's
//! native array type.

use super::JsonCodec;
use crate::connection::StorageSession;
use crate::core::{ColumnKind, NativeArray, PersistError, Result, Value};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

/// Binding between a value type and a storage column.
pub trait ColumnType: Send + Sync {
    type Value: Clone + PartialEq;

    fn column_kind(&self) -> ColumnKind;

    /// Mutable values are deep-copied on every read so callers never alias
    /// the copy a session holds on to.
    fn is_mutable(&self) -> bool;

    /// Convert a present value into its column form.
    fn encode(&self, value: &Self::Value, session: &dyn StorageSession) -> Result<Value>;

    /// Convert a non-null column cell back into a value.
    fn decode(&self, cell: &Value, session: &dyn StorageSession) -> Result<Self::Value>;

    fn deep_copy(&self, value: &Self::Value) -> Result<Self::Value>;

    /// Session-independent form kept in caches.
    fn disassemble(&self, value: &Self::Value) -> Result<Value>;

    fn assemble(&self, cached: &Value) -> Result<Self::Value>;

    /// Null-safe write: `None` becomes a storage NULL.
    fn to_column(&self, value: Option<&Self::Value>, session: &dyn StorageSession) -> Result<Value> {
        match value {
            Some(value) => self.encode(value, session),
            None => Ok(Value::Null),
        }
    }

    /// Null-safe read: a storage NULL becomes `None`.
    fn from_column(&self, cell: &Value, session: &dyn StorageSession) -> Result<Option<Self::Value>> {
        if cell.is_null() {
            return Ok(None);
        }
        self.decode(cell, session).map(Some)
    }

    fn equals(&self, a: &Self::Value, b: &Self::Value) -> bool {
        a == b
    }

    /// Value to store when merging `original` into a managed entity.
    fn replace(&self, original: &Self::Value) -> Result<Self::Value> {
        if self.is_mutable() {
            self.deep_copy(original)
        } else {
            Ok(original.clone())
        }
    }
}

fn expect_text<'a>(cell: &'a Value, kind: ColumnKind) -> Result<&'a str> {
    cell.as_str().ok_or_else(|| {
        PersistError::DecodingError(format!(
            "{} column expects TEXT, got {}",
            kind,
            cell.type_name()
        ))
    })
}

// ============================================================================
// JSON-backed columns
// ============================================================================

/// Stores any serde-compatible value as one JSON document.
pub struct JsonColumn<T> {
    codec: JsonCodec<T>,
}

/// Untyped JSON document
pub type JsonNodeColumn = JsonColumn<serde_json::Value>;

pub type StringListColumn = JsonColumn<Vec<String>>;

/// Sorted, de-duplicated strings
pub type StringSetColumn = JsonColumn<BTreeSet<String>>;

pub type MapColumn = JsonColumn<serde_json::Map<String, serde_json::Value>>;

impl<T> JsonColumn<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new() -> Self {
        Self {
            codec: JsonCodec::new(),
        }
    }

    pub fn codec(&self) -> &JsonCodec<T> {
        &self.codec
    }
}

impl<T> Default for JsonColumn<T>
where
    T: Serialize + DeserializeOwned,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ColumnType for JsonColumn<T>
where
    T: Serialize + DeserializeOwned + Clone + PartialEq,
{
    type Value = T;

    fn column_kind(&self) -> ColumnKind {
        ColumnKind::Json
    }

    fn is_mutable(&self) -> bool {
        true
    }

    fn encode(&self, value: &T, _session: &dyn StorageSession) -> Result<Value> {
        self.disassemble(value)
    }

    fn decode(&self, cell: &Value, _session: &dyn StorageSession) -> Result<T> {
        self.assemble(cell)
    }

    fn deep_copy(&self, value: &T) -> Result<T> {
        self.codec.copy(value)
    }

    fn disassemble(&self, value: &T) -> Result<Value> {
        self.codec.encode(value).map(Value::Text)
    }

    fn assemble(&self, cached: &Value) -> Result<T> {
        self.codec.decode(expect_text(cached, ColumnKind::Json)?)
    }
}

// ============================================================================
// Simple string columns
// ============================================================================

type Construct<T> = Arc<dyn Fn(&str) -> Result<T> + Send + Sync>;

/// Stores an immutable value as its plain string form.
///
/// Writing uses the value's `Display` output; reading hands the column text
/// to `construct`. The two must be inverse of each other.
pub struct SimpleStringColumn<T> {
    construct: Construct<T>,
}

impl<T> SimpleStringColumn<T> {
    pub fn new<F>(construct: F) -> Self
    where
        F: Fn(&str) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            construct: Arc::new(construct),
        }
    }
}

impl<T> SimpleStringColumn<T>
where
    T: FromStr,
    T::Err: Display,
{
    /// Column whose `construct` is `T::from_str`.
    pub fn parsed() -> Self {
        Self::new(|text| {
            text.parse::<T>().map_err(|e| {
                PersistError::DecodingError(format!(
                    "Unable to parse {} from '{}': {}",
                    std::any::type_name::<T>(),
                    text,
                    e
                ))
            })
        })
    }
}

impl<T> Clone for SimpleStringColumn<T> {
    fn clone(&self) -> Self {
        Self {
            construct: Arc::clone(&self.construct),
        }
    }
}

impl<T> ColumnType for SimpleStringColumn<T>
where
    T: Display + Clone + PartialEq + 'static,
{
    type Value = T;

    fn column_kind(&self) -> ColumnKind {
        ColumnKind::Varchar
    }

    fn is_mutable(&self) -> bool {
        false
    }

    fn encode(&self, value: &T, _session: &dyn StorageSession) -> Result<Value> {
        self.disassemble(value)
    }

    fn decode(&self, cell: &Value, _session: &dyn StorageSession) -> Result<T> {
        self.assemble(cell)
    }

    fn deep_copy(&self, value: &T) -> Result<T> {
        Ok(value.clone())
    }

    fn disassemble(&self, value: &T) -> Result<Value> {
        Ok(Value::Text(value.to_string()))
    }

    fn assemble(&self, cached: &Value) -> Result<T> {
        (self.construct)(expect_text(cached, ColumnKind::Varchar)?)
    }
}

// ============================================================================
// Native text[] column
// ============================================================================

/// Stores a list of strings in the driver's native `text[]` type.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextArrayColumn;

impl TextArrayColumn {
    pub const ELEMENT_TYPE: &'static str = "text";

    fn expect_array(cell: &Value) -> Result<&NativeArray> {
        cell.as_array().ok_or_else(|| {
            PersistError::StorageTypeError(format!(
                "text[] column expects ARRAY, got {}",
                cell.type_name()
            ))
        })
    }
}

fn storage_type_error(err: PersistError) -> PersistError {
    match err {
        PersistError::StorageTypeError(_) => err,
        other => PersistError::StorageTypeError(other.to_string()),
    }
}

impl ColumnType for TextArrayColumn {
    type Value = Vec<String>;

    fn column_kind(&self) -> ColumnKind {
        ColumnKind::Array
    }

    fn is_mutable(&self) -> bool {
        false
    }

    fn encode(&self, value: &Vec<String>, session: &dyn StorageSession) -> Result<Value> {
        session
            .create_native_array(Self::ELEMENT_TYPE, value)
            .map(Value::Array)
            .map_err(storage_type_error)
    }

    fn decode(&self, cell: &Value, session: &dyn StorageSession) -> Result<Vec<String>> {
        session
            .read_native_array(Self::expect_array(cell)?)
            .map_err(storage_type_error)
    }

    fn deep_copy(&self, value: &Vec<String>) -> Result<Vec<String>> {
        Ok(value.clone())
    }

    fn disassemble(&self, value: &Vec<String>) -> Result<Value> {
        Ok(Value::Array(NativeArray::new(Self::ELEMENT_TYPE, value.clone())))
    }

    fn assemble(&self, cached: &Value) -> Result<Vec<String>> {
        Ok(Self::expect_array(cached)?.elements().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[test]
    fn test_null_maps_to_storage_null() {
        let store = MemoryStore::new();
        let session = store.session();

        let list = StringListColumn::new();
        assert_eq!(list.to_column(None, session.as_ref()).unwrap(), Value::Null);
        assert_eq!(list.from_column(&Value::Null, session.as_ref()).unwrap(), None);

        let array = TextArrayColumn;
        assert_eq!(array.to_column(None, session.as_ref()).unwrap(), Value::Null);
        assert_eq!(array.from_column(&Value::Null, session.as_ref()).unwrap(), None);

        let uuid = SimpleStringColumn::<uuid::Uuid>::parsed();
        assert_eq!(uuid.to_column(None, session.as_ref()).unwrap(), Value::Null);
        assert_eq!(uuid.from_column(&Value::Null, session.as_ref()).unwrap(), None);
    }

    #[test]
    fn test_json_column_writes_text() {
        let store = MemoryStore::new();
        let session = store.session();
        let column = MapColumn::new();

        let map = json!({"b": 1, "a": [true, null]})
            .as_object()
            .cloned()
            .unwrap();
        let cell = column.to_column(Some(&map), session.as_ref()).unwrap();
        assert!(ColumnKind::Json.is_compatible(&cell));
        assert_eq!(
            column.from_column(&cell, session.as_ref()).unwrap(),
            Some(map)
        );
    }

    #[test]
    fn test_json_column_rejects_non_text_cell() {
        let store = MemoryStore::new();
        let session = store.session();
        let column = JsonNodeColumn::new();

        assert!(matches!(
            column.from_column(&Value::Integer(3), session.as_ref()),
            Err(PersistError::DecodingError(_))
        ));
    }

    #[test]
    fn test_string_set_is_ordered() {
        let store = MemoryStore::new();
        let session = store.session();
        let column = StringSetColumn::new();

        let cell = column
            .decode(&Value::Text(r#"["pear","apple","pear"]"#.into()), session.as_ref())
            .unwrap();
        assert_eq!(cell.into_iter().collect::<Vec<_>>(), vec!["apple", "pear"]);
    }

    #[test]
    fn test_mutability_flags() {
        assert!(StringListColumn::new().is_mutable());
        assert!(!TextArrayColumn.is_mutable());
        assert!(!SimpleStringColumn::<i64>::parsed().is_mutable());
        assert_eq!(TextArrayColumn.column_kind(), ColumnKind::Array);
        assert_eq!(SimpleStringColumn::<i64>::parsed().column_kind(), ColumnKind::Varchar);
    }

    #[test]
    fn test_simple_string_uses_construct() {
        #[derive(Debug, Clone, PartialEq)]
        struct Sku(String);

        impl Display for Sku {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "SKU-{}", self.0)
            }
        }

        let column = SimpleStringColumn::new(|text: &str| {
            text.strip_prefix("SKU-")
                .map(|code| Sku(code.to_string()))
                .ok_or_else(|| PersistError::DecodingError(format!("bad sku {}", text)))
        });

        let store = MemoryStore::new();
        let session = store.session();
        let sku = Sku("42".into());

        let cell = column.to_column(Some(&sku), session.as_ref()).unwrap();
        assert_eq!(cell, Value::Text("SKU-42".into()));
        assert_eq!(column.from_column(&cell, session.as_ref()).unwrap(), Some(sku));
        assert!(column
            .from_column(&Value::Text("42".into()), session.as_ref())
            .is_err());
    }

    #[test]
    fn test_simple_string_parse_failure() {
        let store = MemoryStore::new();
        let session = store.session();
        let column = SimpleStringColumn::<uuid::Uuid>::parsed();

        assert!(matches!(
            column.decode(&Value::Text("not-a-uuid".into()), session.as_ref()),
            Err(PersistError::DecodingError(_))
        ));
    }

    #[test]
    fn test_text_array_goes_through_session() {
        let store = MemoryStore::new();
        let session = store.session();
        let values = vec!["a".to_string(), "b c".to_string()];

        let cell = TextArrayColumn.to_column(Some(&values), session.as_ref()).unwrap();
        assert_eq!(cell.as_array().map(NativeArray::element_type), Some("text"));
        assert_eq!(
            TextArrayColumn.from_column(&cell, session.as_ref()).unwrap(),
            Some(values)
        );
    }

    #[test]
    fn test_text_array_failures_are_storage_type_errors() {
        let store = MemoryStore::new();
        let session = store.session();

        assert!(matches!(
            TextArrayColumn.decode(&Value::Text("{a}".into()), session.as_ref()),
            Err(PersistError::StorageTypeError(_))
        ));

        session.close().unwrap();
        assert!(matches!(
            TextArrayColumn.encode(&vec!["a".into()], session.as_ref()),
            Err(PersistError::StorageTypeError(_))
        ));
    }

    #[test]
    fn test_replace_copies_only_mutable_values() {
        let column = StringListColumn::new();
        let original = vec!["x".to_string()];
        assert_eq!(column.replace(&original).unwrap(), original);

        let cached = column.disassemble(&original).unwrap();
        assert_eq!(cached, Value::Text(r#"["x"]"#.into()));
        assert_eq!(column.assemble(&cached).unwrap(), original);

        let cached = TextArrayColumn.disassemble(&original).unwrap();
        assert_eq!(TextArrayColumn.assemble(&cached).unwrap(), original);
    }
}
