//! The fluent query surface.
//!
//! [`Query<T>`] layers typed entry points over a [`QueryBody`]: each call
//! mutates the IR, and the `to_*_sql` methods compile snapshots of it. The
//! chain owns its body; `clone()` branches it safely.
//!
//! # Example
//!
//! ```ignore
//! let stmt = ctx
//!     .query::<Article>()
//!     .filter(col("Hits").gt(10))
//!     .order_by_desc(col("Id"))
//!     .skip(20)
//!     .take(10)
//!     .to_page_sql()?;
//! ```

use crate::adapter::DbAdapter;
use crate::context::TenantResolver;
use crate::entity::{Entity, descriptor_of};
use crate::error::RelqResult;
use crate::expr::{Aliased, Expr};
use crate::qb::Statement;
use crate::qb::body::{GroupClause, JoinKind, QueryBody, QueryJoin, QuerySelect, QuerySort, QueryWhere};
use crate::qb::mutate::{SetValue, build_delete, build_soft_delete, build_update};
use crate::qb::select::{build_count, build_exists, build_first, build_list, build_page};
use std::marker::PhantomData;
use std::sync::Arc;

/// A typed query under construction. `T` is the driving entity; joined
/// entities are addressed positionally through [`crate::expr::tcol`].
pub struct Query<T: Entity> {
    body: QueryBody,
    adapter: Arc<dyn DbAdapter>,
    tenant: Arc<dyn TenantResolver>,
    allow_delete_all: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            body: self.body.clone(),
            adapter: Arc::clone(&self.adapter),
            tenant: Arc::clone(&self.tenant),
            allow_delete_all: self.allow_delete_all,
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Query<T> {
    pub fn new(adapter: Arc<dyn DbAdapter>, tenant: Arc<dyn TenantResolver>) -> Self {
        Self {
            body: QueryBody::new::<T>(),
            adapter,
            tenant,
            allow_delete_all: false,
            _entity: PhantomData,
        }
    }

    /// The IR built so far.
    pub fn body(&self) -> &QueryBody {
        &self.body
    }

    pub fn into_body(self) -> QueryBody {
        self.body
    }

    // ==================== Joins ====================

    fn push_join<U: Entity>(mut self, kind: JoinKind, on: Expr) -> Self {
        let slot = self.body.joins.len();
        self.body
            .joins
            .push(QueryJoin::joined(descriptor_of::<U>(), slot, kind, on));
        self
    }

    /// INNER JOIN `U` on the given predicate.
    pub fn join<U: Entity>(self, on: Expr) -> Self {
        self.push_join::<U>(JoinKind::Inner, on)
    }

    /// LEFT JOIN `U` on the given predicate.
    pub fn left_join<U: Entity>(self, on: Expr) -> Self {
        self.push_join::<U>(JoinKind::Left, on)
    }

    /// RIGHT JOIN `U` on the given predicate.
    pub fn right_join<U: Entity>(self, on: Expr) -> Self {
        self.push_join::<U>(JoinKind::Right, on)
    }

    // ==================== Predicates ====================

    /// Add a typed predicate; predicates are ANDed together.
    pub fn filter(mut self, predicate: Expr) -> Self {
        self.body.wheres.push(QueryWhere::Predicate(predicate));
        self
    }

    /// Add a raw SQL predicate.
    pub fn filter_raw(mut self, sql: impl Into<String>) -> Self {
        self.body.wheres.push(QueryWhere::Raw(sql.into()));
        self
    }

    /// Compare a driving-table column against a subquery.
    pub fn filter_subquery(
        mut self,
        column: impl Into<String>,
        op: impl Into<String>,
        sql: impl Into<String>,
    ) -> Self {
        self.body.wheres.push(QueryWhere::SubQuery {
            column: column.into(),
            op: op.into(),
            sql: sql.into(),
        });
        self
    }

    // ==================== Projection ====================

    /// Project explicit aliased expressions instead of the whole entity.
    pub fn select(mut self, items: Vec<Aliased>) -> Self {
        self.body.select = QuerySelect::Projection(items);
        self
    }

    /// Raw SQL column list.
    pub fn select_raw(mut self, sql: impl Into<String>) -> Self {
        self.body.select = QuerySelect::Raw(sql.into());
        self
    }

    /// Exclude columns from whole-entity expansion.
    pub fn exclude<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body.exclude.extend(columns.into_iter().map(Into::into));
        self
    }

    // ==================== Sort & grouping ====================

    pub fn order_by(mut self, expr: Expr) -> Self {
        self.body.sorts.push(QuerySort {
            expr,
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, expr: Expr) -> Self {
        self.body.sorts.push(QuerySort {
            expr,
            descending: true,
        });
        self
    }

    /// Group by the given key members. Later clauses may reference a member
    /// through [`crate::expr::key_ref`] with its alias.
    pub fn group_by(mut self, key: Vec<Aliased>) -> Self {
        self.body.group = Some(GroupClause {
            key,
            havings: Vec::new(),
        });
        self
    }

    /// Add a HAVING predicate; requires a preceding `group_by`.
    pub fn having(mut self, predicate: Expr) -> Self {
        if let Some(group) = &mut self.body.group {
            group.havings.push(predicate);
        }
        self
    }

    // ==================== Limits ====================

    pub fn skip(mut self, n: u64) -> Self {
        self.body.skip = Some(n);
        self
    }

    pub fn take(mut self, n: u64) -> Self {
        self.body.take = Some(n);
        self
    }

    // ==================== Toggles ====================

    /// Stop filtering soft-deleted rows out.
    pub fn include_deleted(mut self) -> Self {
        self.body.filter_deleted = false;
        self
    }

    /// Stop scoping rows to the active tenant.
    pub fn across_tenants(mut self) -> Self {
        self.body.filter_tenant = false;
        self
    }

    /// Inline literals into the SQL text instead of parameterizing.
    pub fn inline_values(mut self) -> Self {
        self.body.parameterize = false;
        self
    }

    /// Read the driving table without row locks where the dialect has a hint.
    pub fn no_lock(mut self) -> Self {
        self.body.joins[0].no_lock = true;
        self
    }

    /// Redirect the driving table to a differently named physical table.
    pub fn from_table(mut self, table: impl Into<String>) -> Self {
        self.body.joins[0].table = table.into();
        self
    }

    /// Permit a DELETE whose WHERE resolved empty.
    pub fn allow_delete_all(mut self) -> Self {
        self.allow_delete_all = true;
        self
    }

    // ==================== Compilation ====================

    pub fn to_list_sql(&self) -> RelqResult<Statement> {
        build_list(&self.body, &*self.adapter, &*self.tenant)
    }

    pub fn to_first_sql(&self) -> RelqResult<Statement> {
        build_first(&self.body, &*self.adapter, &*self.tenant)
    }

    pub fn to_page_sql(&self) -> RelqResult<Statement> {
        build_page(&self.body, &*self.adapter, &*self.tenant)
    }

    pub fn to_count_sql(&self) -> RelqResult<Statement> {
        build_count(&self.body, &*self.adapter, &*self.tenant)
    }

    pub fn to_exists_sql(&self) -> RelqResult<Statement> {
        build_exists(&self.body, &*self.adapter, &*self.tenant)
    }

    pub fn to_update_sql(&self, sets: &[(String, SetValue)]) -> RelqResult<Statement> {
        build_update(&self.body, &*self.adapter, &*self.tenant, sets)
    }

    pub fn to_delete_sql(&self) -> RelqResult<Statement> {
        build_delete(&self.body, &*self.adapter, &*self.tenant, self.allow_delete_all)
    }

    pub fn to_soft_delete_sql(&self) -> RelqResult<Statement> {
        build_soft_delete(&self.body, &*self.adapter, &*self.tenant)
    }
}
