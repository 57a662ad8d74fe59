//! PostgreSQL dialect shim
//!
//! Column type names for DDL and the custom SQL functions the mapping layer
//! registers on top of the stock dialect.

use crate::core::{ColumnKind, PersistError, Result};

impl ColumnKind {
    /// PostgreSQL type used for columns of this kind.
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnKind::Json => "jsonb",
            ColumnKind::Varchar => "varchar",
            ColumnKind::Text => "text",
            ColumnKind::Array => "text[]",
        }
    }
}

/// A SQL function rendered by string templating.
pub trait SqlFunction: Send + Sync {
    /// Name the function is registered under in queries.
    fn name(&self) -> &str;

    fn render(&self, args: &[&str]) -> Result<String>;
}

/// `fts(field, query)` over PostgreSQL's `simple` text search configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleFullTextSearch;

impl SimpleFullTextSearch {
    pub const NAME: &'static str = "fts";
}

impl SqlFunction for SimpleFullTextSearch {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn render(&self, args: &[&str]) -> Result<String> {
        match args {
            [field, query] => Ok(format!(
                "to_tsvector('simple', {}) @@ to_tsquery('simple', {})",
                field, query
            )),
            _ => Err(PersistError::ConfigError(format!(
                "Function {} requires 2 arguments, got {}",
                Self::NAME,
                args.len()
            ))),
        }
    }
}

/// Registered SQL functions, looked up by name.
pub struct PostgresDialect {
    functions: Vec<Box<dyn SqlFunction>>,
}

impl PostgresDialect {
    pub fn new() -> Self {
        Self {
            functions: vec![Box::new(SimpleFullTextSearch)],
        }
    }

    pub fn register(&mut self, function: Box<dyn SqlFunction>) {
        self.functions.retain(|f| !f.name().eq_ignore_ascii_case(function.name()));
        self.functions.push(function);
    }

    pub fn function(&self, name: &str) -> Option<&dyn SqlFunction> {
        self.functions
            .iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
            .map(|f| f.as_ref())
    }

    /// Render a call to the registered function `name`.
    pub fn render_call(&self, name: &str, args: &[&str]) -> Result<String> {
        self.function(name)
            .ok_or_else(|| PersistError::ConfigError(format!("Unknown SQL function: {}", name)))?
            .render(args)
    }
}

impl Default for PostgresDialect {
    fn default() -> Self {
        Self::new()
    }
}
