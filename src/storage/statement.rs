// ============================================================================
// Counter statement recognition (sqlparser, PostgreSQL dialect)
// ============================================================================

use crate::core::{PersistError, Result, Value};
use sqlparser::ast as sql_ast;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

/// Largest series one statement may draw.
pub(crate) const MAX_SERIES_ROWS: u64 = 1 << 20;

/// Statements the in-memory store knows how to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CounterStatement {
    /// `SELECT nextval(name) [FROM generate_series(start, stop)]`
    NextValues { sequence: String, count: u64 },
}

pub(crate) fn parse_counter_statement(sql: &str, params: &[Value]) -> Result<CounterStatement> {
    let mut statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| PersistError::StorageError(format!("Parse error: {}", e)))?;

    if statements.len() != 1 {
        return Err(unsupported(sql));
    }

    let sql_ast::Statement::Query(query) = statements.remove(0) else {
        return Err(unsupported(sql));
    };
    let query = *query;
    let sql_ast::SetExpr::Select(select) = *query.body else {
        return Err(unsupported(sql));
    };

    let [sql_ast::SelectItem::UnnamedExpr(sql_ast::Expr::Function(func))] =
        select.projection.as_slice()
    else {
        return Err(unsupported(sql));
    };

    if !func.name.to_string().eq_ignore_ascii_case("nextval") {
        return Err(unsupported(sql));
    }

    let sequence = match function_args(&func.args)?.as_slice() {
        [arg] => resolve_text(arg, params)?,
        _ => {
            return Err(PersistError::StorageError(
                "nextval expects exactly one argument".into(),
            ));
        }
    };

    let count = match select.from.as_slice() {
        [] => 1,
        [table] if table.joins.is_empty() => series_length(&table.relation, params, sql)?,
        _ => return Err(unsupported(sql)),
    };

    Ok(CounterStatement::NextValues { sequence, count })
}

fn unsupported(sql: &str) -> PersistError {
    PersistError::StorageError(format!("Unsupported statement: {}", sql))
}

fn function_args(args: &sql_ast::FunctionArguments) -> Result<Vec<&sql_ast::Expr>> {
    match args {
        sql_ast::FunctionArguments::List(arg_list) => unnamed_exprs(&arg_list.args),
        _ => Ok(Vec::new()),
    }
}

fn unnamed_exprs(args: &[sql_ast::FunctionArg]) -> Result<Vec<&sql_ast::Expr>> {
    args.iter()
        .map(|arg| match arg {
            sql_ast::FunctionArg::Unnamed(sql_ast::FunctionArgExpr::Expr(e)) => Ok(e),
            _ => Err(PersistError::StorageError(
                "Only unnamed expression arguments supported in functions".into(),
            )),
        })
        .collect()
}

/// Number of rows produced by `generate_series(start, stop)`.
fn series_length(relation: &sql_ast::TableFactor, params: &[Value], sql: &str) -> Result<u64> {
    let (name, args) = match relation {
        sql_ast::TableFactor::Table {
            name,
            args: Some(table_args),
            ..
        } => (name, unnamed_exprs(&table_args.args)?),
        sql_ast::TableFactor::Function { name, args, .. } => (name, unnamed_exprs(args)?),
        _ => return Err(unsupported(sql)),
    };

    if !name.to_string().eq_ignore_ascii_case("generate_series") {
        return Err(unsupported(sql));
    }

    let [start, stop] = args.as_slice() else {
        return Err(PersistError::StorageError(
            "generate_series expects (start, stop)".into(),
        ));
    };

    let start = resolve_integer(start, params)?;
    let stop = resolve_integer(stop, params)?;
    if stop < start {
        return Ok(0);
    }

    let length = stop
        .checked_sub(start)
        .and_then(|d| d.checked_add(1))
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| {
            PersistError::StorageError(format!(
                "generate_series({}, {}) is out of range",
                start, stop
            ))
        })?;
    if length > MAX_SERIES_ROWS {
        return Err(PersistError::StorageError(format!(
            "generate_series produces {} rows, limit is {}",
            length, MAX_SERIES_ROWS
        )));
    }
    Ok(length)
}

fn resolve(expr: &sql_ast::Expr, params: &[Value]) -> Result<Value> {
    let sql_ast::Expr::Value(value_with_span) = expr else {
        return Err(PersistError::StorageError(format!(
            "Unsupported argument expression: {}",
            expr
        )));
    };

    match &value_with_span.value {
        sql_ast::Value::SingleQuotedString(s) => Ok(Value::Text(s.clone())),
        sql_ast::Value::Number(n, _) => n
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| PersistError::StorageError(format!("Invalid integer literal: {}", n))),
        sql_ast::Value::Placeholder(p) => {
            let index = p
                .strip_prefix('$')
                .and_then(|n| n.parse::<usize>().ok())
                .filter(|n| *n >= 1)
                .ok_or_else(|| PersistError::StorageError(format!("Invalid placeholder: {}", p)))?;
            params.get(index - 1).cloned().ok_or_else(|| {
                PersistError::StorageError(format!("No value bound for placeholder {}", p))
            })
        }
        other => Err(PersistError::StorageError(format!(
            "Unsupported literal: {}",
            other
        ))),
    }
}

fn resolve_text(expr: &sql_ast::Expr, params: &[Value]) -> Result<String> {
    match resolve(expr, params)? {
        Value::Text(s) => Ok(s),
        other => Err(PersistError::StorageError(format!(
            "Expected TEXT argument, got {}",
            other.type_name()
        ))),
    }
}

fn resolve_integer(expr: &sql_ast::Expr, params: &[Value]) -> Result<i64> {
    let value = resolve(expr, params)?;
    value.as_i64().ok_or_else(|| {
        PersistError::StorageError(format!(
            "Expected INTEGER argument, got {}",
            value.type_name()
        ))
    })
}
