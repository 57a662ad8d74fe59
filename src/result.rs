use crate::core::{Row, Value};

/// Rows returned by `StorageSession::execute`.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First cell of every row, in row order. Rows without cells yield `Null`.
    pub fn first_column(&self) -> impl Iterator<Item = &Value> {
        self.rows
            .iter()
            .map(|row| row.first().unwrap_or(&Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_column() {
        let result = QueryResult::new(
            vec!["nextval".into()],
            vec![vec![Value::Integer(1)], vec![], vec![Value::Integer(3)]],
        );
        let firsts: Vec<&Value> = result.first_column().collect();
        assert_eq!(firsts, vec![&Value::Integer(1), &Value::Null, &Value::Integer(3)]);
        assert_eq!(result.row_count(), 3);
        assert!(QueryResult::empty().is_empty());
    }
}
