//! SELECT-family statement builders.
//!
//! Each builder is a stateless function of a [`QueryBody`] snapshot: it
//! resolves the clauses through one [`Resolver`] (so parameter sequence
//! numbers follow SQL emission order), folds in the automatic
//! soft-delete/tenant filters, and hands dialect-specific assembly to the
//! adapter.
//!
//! Filter placement: the driving table's automatic filters always land in
//! WHERE; a non-driving INNER join's filters are folded into that join's ON
//! clause so outer-join semantics stay intact; outer joins never
//! auto-filter.

use crate::adapter::{DbAdapter, StatementParts};
use crate::context::TenantResolver;
use crate::error::{RelqError, RelqResult};
use crate::qb::Statement;
use crate::qb::body::{JoinKind, QueryBody, QueryJoin, QuerySelect, QueryWhere};
use crate::resolver::Resolver;
use crate::value::quote_str;

/// Compiled clause fragments plus the collected parameters.
pub(crate) struct Compiled {
    pub select: String,
    pub from: String,
    pub where_sql: Option<String>,
    pub group_sql: Option<String>,
    pub having_sql: Option<String>,
    pub order_sql: Option<String>,
    pub params: Vec<(String, crate::value::Value)>,
}

impl Compiled {
    fn parts(&self) -> StatementParts<'_> {
        StatementParts {
            select: &self.select,
            from: &self.from,
            where_sql: self.where_sql.as_deref(),
            group_sql: self.group_sql.as_deref(),
            having_sql: self.having_sql.as_deref(),
            order_sql: self.order_sql.as_deref(),
        }
    }
}

/// The automatic soft-delete/tenant predicates for one join.
pub(crate) fn auto_filters(
    join: &QueryJoin,
    multi: bool,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
    filter_deleted: bool,
    filter_tenant: bool,
) -> Vec<String> {
    let qualify = |column: &str| {
        let quoted = adapter.quote(column);
        if multi {
            format!("{}.{quoted}", join.alias)
        } else {
            quoted
        }
    };
    let mut filters = Vec::new();
    if filter_deleted {
        if let Some(sd) = &join.entity.soft_delete {
            filters.push(format!("{} = {}", qualify(&sd.flag), adapter.false_literal()));
        }
    }
    if filter_tenant {
        if let Some(column) = &join.entity.tenant {
            match tenant.tenant_id() {
                Some(id) => filters.push(format!("{} = {}", qualify(column), quote_str(&id))),
                None => filters.push(format!("{} IS NULL", qualify(column))),
            }
        }
    }
    filters
}

/// FROM clause: driving table, then joins with their ON predicates and, for
/// inner joins, that entity's automatic filters folded in.
pub(crate) fn from_clause(
    body: &QueryBody,
    resolver: &mut Resolver<'_>,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<String> {
    let multi = body.joins.len() > 1;
    let driving = body.driving();
    let mut from = adapter.quote(&driving.table);
    if multi {
        from.push_str(" AS ");
        from.push_str(&driving.alias);
    }
    if driving.no_lock && !adapter.no_lock_hint().is_empty() {
        from.push(' ');
        from.push_str(adapter.no_lock_hint());
    }
    for join in body.joins.iter().skip(1) {
        let on = join.on.as_ref().ok_or_else(|| {
            RelqError::unsupported(format!("join on '{}' without an ON predicate", join.table))
        })?;
        let mut on_sql = resolver.predicate(on)?;
        if matches!(join.kind, JoinKind::Inner | JoinKind::None) {
            for filter in auto_filters(
                join,
                multi,
                adapter,
                tenant,
                body.filter_deleted,
                body.filter_tenant,
            ) {
                on_sql.push_str(" AND ");
                on_sql.push_str(&filter);
            }
        }
        from.push_str(&format!(
            " {} {} AS {}",
            join.kind.sql(),
            adapter.quote(&join.table),
            join.alias
        ));
        if join.no_lock && !adapter.no_lock_hint().is_empty() {
            from.push(' ');
            from.push_str(adapter.no_lock_hint());
        }
        from.push_str(" ON ");
        from.push_str(&on_sql);
    }
    Ok(from)
}

/// WHERE clause content (no keyword): registered predicates joined with AND,
/// then the driving table's automatic filters. `None` when nothing
/// contributed, so the keyword can be omitted rather than left dangling.
pub(crate) fn where_clause(
    body: &QueryBody,
    resolver: &mut Resolver<'_>,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<Option<String>> {
    let mut fragments = Vec::new();
    for where_ in &body.wheres {
        match where_ {
            QueryWhere::Predicate(expr) => {
                let sql = resolver.predicate(expr)?;
                if !sql.is_empty() {
                    fragments.push(sql);
                }
            }
            QueryWhere::Raw(sql) => fragments.push(sql.clone()),
            QueryWhere::SubQuery { column, op, sql } => {
                let column_sql = resolver.column_sql(0, column)?;
                fragments.push(format!("{column_sql} {op} ({sql})"));
            }
        }
    }
    fragments.extend(auto_filters(
        body.driving(),
        body.joins.len() > 1,
        adapter,
        tenant,
        body.filter_deleted,
        body.filter_tenant,
    ));
    if fragments.is_empty() {
        Ok(None)
    } else {
        Ok(Some(fragments.join(" AND ")))
    }
}

fn select_clause(body: &QueryBody, resolver: &mut Resolver<'_>) -> RelqResult<String> {
    match &body.select {
        QuerySelect::Entity => resolver.entity_columns(0, &body.exclude),
        QuerySelect::Projection(items) => resolver.projection(items, &body.exclude),
        QuerySelect::Raw(sql) => Ok(sql.clone()),
    }
}

fn order_clause(body: &QueryBody, resolver: &mut Resolver<'_>) -> RelqResult<Option<String>> {
    if body.sorts.is_empty() {
        return Ok(None);
    }
    let mut parts = Vec::with_capacity(body.sorts.len());
    for sort in &body.sorts {
        let sql = resolver.value_expr(&sort.expr)?;
        parts.push(if sort.descending {
            format!("{sql} DESC")
        } else {
            format!("{sql} ASC")
        });
    }
    Ok(Some(parts.join(", ")))
}

/// Compile every clause of a SELECT-shaped statement.
pub(crate) fn compile(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<Compiled> {
    let mut resolver = Resolver::new(adapter, &body.joins, body.parameterize);
    if let Some(group) = &body.group {
        resolver = resolver.with_group_key(&group.key);
    }

    let select = select_clause(body, &mut resolver)?;
    let from = from_clause(body, &mut resolver, adapter, tenant)?;
    let where_sql = where_clause(body, &mut resolver, adapter, tenant)?;

    let (group_sql, having_sql) = match &body.group {
        Some(group) => {
            let mut keys = Vec::with_capacity(group.key.len());
            for member in &group.key {
                keys.push(resolver.value_expr(&member.expr)?);
            }
            let mut havings = Vec::new();
            for having in &group.havings {
                let sql = resolver.predicate(having)?;
                if !sql.is_empty() {
                    havings.push(sql);
                }
            }
            (
                Some(keys.join(", ")),
                (!havings.is_empty()).then(|| havings.join(" AND ")),
            )
        }
        None => (None, None),
    };

    let order_sql = order_clause(body, &mut resolver)?;

    Ok(Compiled {
        select,
        from,
        where_sql,
        group_sql,
        having_sql,
        order_sql,
        params: resolver.into_params(),
    })
}

/// `SELECT … FROM …` returning every matching row.
pub fn build_list(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<Statement> {
    let compiled = compile(body, adapter, tenant)?;
    let sql = compiled.parts().assemble();
    tracing::debug!(kind = "list", sql = %sql, params = compiled.params.len(), "compiled statement");
    Ok(Statement {
        sql,
        params: compiled.params,
    })
}

/// The dialect's first-row form of the query.
pub fn build_first(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<Statement> {
    let compiled = compile(body, adapter, tenant)?;
    let take = body.take.unwrap_or(1);
    let sql = adapter.first_sql(&compiled.parts(), take)?;
    tracing::debug!(kind = "first", sql = %sql, params = compiled.params.len(), "compiled statement");
    Ok(Statement {
        sql,
        params: compiled.params,
    })
}

/// The dialect's paged form of the query. Requires `take`.
pub fn build_page(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<Statement> {
    let take = body
        .take
        .ok_or_else(|| RelqError::unsupported("pagination without a take count"))?;
    let skip = body.skip.unwrap_or(0);
    let compiled = compile(body, adapter, tenant)?;
    let sql = adapter.paging_sql(&compiled.parts(), skip, take)?;
    tracing::debug!(kind = "page", sql = %sql, params = compiled.params.len(), "compiled statement");
    Ok(Statement {
        sql,
        params: compiled.params,
    })
}

/// `SELECT COUNT(*)` over the query; grouped queries count their groups
/// through a wrapping subselect.
pub fn build_count(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<Statement> {
    // the projection is replaced wholesale, so compile without it to keep
    // the parameter list aligned with the emitted SQL
    let mut body = body.clone();
    body.select = QuerySelect::Raw("1".to_string());
    let compiled = compile(&body, adapter, tenant)?;
    let sql = if body.group.is_some() {
        let inner = StatementParts {
            order_sql: None,
            ..compiled.parts()
        };
        format!("SELECT COUNT(*) FROM ({}) AS T", inner.assemble())
    } else {
        let parts = StatementParts {
            select: "COUNT(*)",
            order_sql: None,
            ..compiled.parts()
        };
        parts.assemble()
    };
    tracing::debug!(kind = "count", sql = %sql, params = compiled.params.len(), "compiled statement");
    Ok(Statement {
        sql,
        params: compiled.params,
    })
}

/// Existence probe: the dialect's first-row form of `SELECT 1`.
pub fn build_exists(
    body: &QueryBody,
    adapter: &dyn DbAdapter,
    tenant: &dyn TenantResolver,
) -> RelqResult<Statement> {
    let mut body = body.clone();
    body.select = QuerySelect::Raw("1".to_string());
    let compiled = compile(&body, adapter, tenant)?;
    let parts = StatementParts {
        order_sql: None,
        ..compiled.parts()
    };
    let sql = adapter.first_sql(&parts, 1)?;
    tracing::debug!(kind = "exists", sql = %sql, params = compiled.params.len(), "compiled statement");
    Ok(Statement {
        sql,
        params: compiled.params,
    })
}
