//! UPDATE / DELETE / soft-DELETE statement builders.
//!
//! Mutations are single-table: they reuse the WHERE assembly of the SELECT
//! builders (automatic filters included) against the driving table. The
//! returned statement's affected-row count is the execution contract; the
//! repository layer exposes the `count > 0` convenience view.

use crate::adapter::DbAdapter;
use crate::context::TenantResolver;
use crate::error::{RelqError, RelqResult};
use crate::expr::Expr;
use crate::qb::Statement;
use crate::qb::body::QueryBody;
use crate::qb::select::where_clause;
use crate::resolver::Resolver;
use crate::value::Value;

/// One SET assignment.
#[derive(Debug, Clone)]
pub enum SetValue {
    /// Parameterized value.
    Value(Value),
    /// Computed expression, e.g. `Hits + 1`.
    Expr(Expr),
    /// Raw SQL fragment.
    Raw(String),
}

fn single_table(body: &QueryBody, what: &str) -> RelqResult<()> {
    if body.joins.len() > 1 {
        return Err(RelqError::unsupported(format!("{what} over a joined query")));
    }
    Ok(())
}

/// `UPDATE <table> SET … [WHERE …]`. Requires at least one assignment.
pub fn build_update(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
    sets: &[(String, SetValue)],
) -> RelqResult<Statement> {
    single_table(body, "UPDATE")?;
    if sets.is_empty() {
        return Err(RelqError::unsupported("UPDATE without SET assignments"));
    }
    let driving = body.driving();
    let mut resolver = Resolver::new(adapter, &body.joins, body.parameterize);

    let mut assignments = Vec::with_capacity(sets.len());
    for (column, set) in sets {
        let column_sql = resolver.column_sql(0, column)?;
        let value_sql = match set {
            SetValue::Value(v) => resolver.value_expr(&Expr::Literal(v.clone()))?,
            SetValue::Expr(e) => resolver.value_expr(e)?,
            SetValue::Raw(sql) => sql.clone(),
        };
        assignments.push(format!("{column_sql} = {value_sql}"));
    }

    let where_sql = where_clause(body, &mut resolver, adapter, tenant)?;
    let mut sql = format!(
        "UPDATE {} SET {}",
        adapter.quote(&driving.table),
        assignments.join(",")
    );
    if let Some(w) = &where_sql {
        sql.push_str(" WHERE ");
        sql.push_str(w);
    }
    tracing::debug!(kind = "update", sql = %sql, "compiled statement");
    Ok(Statement {
        sql,
        params: resolver.into_params(),
    })
}

/// `DELETE FROM <table> [WHERE …]`.
///
/// When nothing contributes a predicate the statement compiles to a safe
/// no-op (`WHERE 1=0`) unless `allow_delete_all` is set.
pub fn build_delete(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
    allow_delete_all: bool,
) -> RelqResult<Statement> {
    single_table(body, "DELETE")?;
    let driving = body.driving();
    let mut resolver = Resolver::new(adapter, &body.joins, body.parameterize);
    let where_sql = where_clause(body, &mut resolver, adapter, tenant)?;
    let mut sql = format!("DELETE FROM {}", adapter.quote(&driving.table));
    match &where_sql {
        Some(w) => {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }
        None if !allow_delete_all => sql.push_str(" WHERE 1=0"),
        None => {}
    }
    tracing::debug!(kind = "delete", sql = %sql, "compiled statement");
    Ok(Statement {
        sql,
        params: resolver.into_params(),
    })
}

/// Logical deletion: sets the flag plus deleted-by/deleted-at columns.
///
/// The bookkeeping columns are quoted directly rather than resolved, so an
/// entity need not declare them alongside its mapped columns.
pub fn build_soft_delete(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<Statement> {
    single_table(body, "soft DELETE")?;
    let driving = body.driving();
    let sd = driving.entity.soft_delete.clone().ok_or_else(|| {
        RelqError::unsupported(format!(
            "entity '{}' has no soft-delete columns",
            driving.entity.table
        ))
    })?;
    let mut resolver = Resolver::new(adapter, &body.joins, body.parameterize);
    let by = resolver.value_expr(&Expr::Literal(Value::Str(tenant.actor())))?;
    let at = resolver.value_expr(&Expr::Literal(Value::DateTime(
        chrono::Local::now().naive_local(),
    )))?;
    let where_sql = where_clause(body, &mut resolver, adapter, tenant)?;
    let mut sql = format!(
        "UPDATE {} SET {} = {},{} = {by},{} = {at}",
        adapter.quote(&driving.table),
        adapter.quote(&sd.flag),
        adapter.true_literal(),
        adapter.quote(&sd.by),
        adapter.quote(&sd.at),
    );
    if let Some(w) = &where_sql {
        sql.push_str(" WHERE ");
        sql.push_str(w);
    }
    tracing::debug!(kind = "soft_delete", sql = %sql, "compiled statement");
    Ok(Statement {
        sql,
        params: resolver.into_params(),
    })
}
