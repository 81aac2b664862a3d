//! Query builder: the IR, the fluent surface, and the statement builders.
//!
//! A fluent [`Query`] chain mutates a [`body::QueryBody`]; the builders in
//! [`select`] and [`mutate`] compile snapshots of that IR into a
//! [`Statement`] through the expression resolver and the active dialect
//! adapter. Compilation is synchronous pure CPU work; the statement is
//! handed to the execution backend unchanged.

pub mod body;
pub mod mutate;
pub mod query;
pub mod select;

pub use body::{GroupClause, JoinKind, QueryBody, QueryJoin, QuerySelect, QuerySort, QueryWhere};
pub use mutate::{SetValue, build_delete, build_soft_delete, build_update};
pub use query::Query;
pub use select::{build_count, build_exists, build_first, build_list, build_page};

use crate::value::Value;

/// A compiled statement: SQL text plus its ordered named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<(String, Value)>,
}

/// Helper constructing a parameterized SET assignment.
pub fn set(column: impl Into<String>, value: impl Into<Value>) -> (String, SetValue) {
    (column.into(), SetValue::Value(value.into()))
}

/// Helper constructing a computed SET assignment, e.g. `Hits + 1`.
pub fn set_expr(column: impl Into<String>, expr: crate::expr::Expr) -> (String, SetValue) {
    (column.into(), SetValue::Expr(expr))
}

/// Helper constructing a raw SQL SET assignment.
pub fn set_raw(column: impl Into<String>, sql: impl Into<String>) -> (String, SetValue) {
    (column.into(), SetValue::Raw(sql.into()))
}
