use std::fmt;
use super::Value;

pub type Row = Vec<Value>;

/// Driver-level array handle produced by a storage session.
///
/// Elements are kept as text; the element type tag records what the driver
/// was asked to build (`text`, `varchar`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeArray {
    element_type: String,
    elements: Vec<String>,
}

impl NativeArray {
    pub fn new(element_type: impl Into<String>, elements: Vec<String>) -> Self {
        Self {
            element_type: element_type.into(),
            elements,
        }
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn elements(&self) -> &[String] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_elements(self) -> Vec<String> {
        self.elements
    }
}

/// Renders the PostgreSQL array literal form, e.g. `{a,"b c"}`.
impl fmt::Display for NativeArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            let needs_quotes = element.is_empty()
                || element.eq_ignore_ascii_case("NULL")
                || element
                    .chars()
                    .any(|c| matches!(c, ',' | '{' | '}' | '"' | '\\') || c.is_whitespace());
            if needs_quotes {
                write!(f, "\"")?;
                for c in element.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, "\"")?;
            } else {
                write!(f, "{}", element)?;
            }
        }
        write!(f, "}}")
    }
}

/// Logical column size/representation declared by a column adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    /// Arbitrary-length text
    Text,
    /// Small human-readable text
    Varchar,
    /// Structured document stored as one JSON text value
    Json,
    /// Native driver array
    Array,
}

impl ColumnKind {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Text | Self::Varchar | Self::Json, Value::Text(_)) => true,
            (Self::Array, Value::Array(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "TEXT"),
            Self::Varchar => write!(f, "VARCHAR"),
            Self::Json => write!(f, "JSON"),
            Self::Array => write!(f, "ARRAY"),
        }
    }
}
