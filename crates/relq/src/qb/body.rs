//! Mutable query IR.
//!
//! A [`QueryBody`] is the builder state one fluent call chain accumulates:
//! joins, predicates, projection, sort, grouping, limits, and the automatic
//! filter toggles. Builders compile snapshots of it; `clone()` produces a
//! structurally independent copy so a chain can branch safely (descriptor
//! and adapter references are shared, not cloned).

use crate::entity::{Entity, EntityDescriptor, descriptor_of};
use crate::expr::{Aliased, Expr};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// The driving table: no join clause is emitted.
    None,
    Inner,
    Left,
    Right,
}

impl JoinKind {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            JoinKind::None | JoinKind::Inner => "INNER JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
        }
    }
}

/// One joined entity. Aliases are positional: slot `n` is `T{n+1}`.
#[derive(Debug, Clone)]
pub struct QueryJoin {
    pub entity: Arc<EntityDescriptor>,
    pub alias: String,
    pub kind: JoinKind,
    /// Absent for the driving table.
    pub on: Option<Expr>,
    pub no_lock: bool,
    /// Physical table; defaults to the descriptor's table name.
    pub table: String,
}

impl QueryJoin {
    pub(crate) fn driving(entity: Arc<EntityDescriptor>) -> Self {
        Self {
            alias: "T1".to_string(),
            table: entity.table.clone(),
            entity,
            kind: JoinKind::None,
            on: None,
            no_lock: false,
        }
    }

    pub(crate) fn joined(entity: Arc<EntityDescriptor>, slot: usize, kind: JoinKind, on: Expr) -> Self {
        Self {
            alias: format!("T{}", slot + 1),
            table: entity.table.clone(),
            entity,
            kind,
            on: Some(on),
            no_lock: false,
        }
    }
}

/// One WHERE contribution.
#[derive(Debug, Clone)]
pub enum QueryWhere {
    /// A typed predicate tree.
    Predicate(Expr),
    /// Raw SQL fragment.
    Raw(String),
    /// Comparison against a subquery: `column op (sql)`.
    SubQuery {
        column: String,
        op: String,
        sql: String,
    },
}

/// Projection selection.
#[derive(Debug, Clone, Default)]
pub enum QuerySelect {
    /// All columns of the driving entity (minus excludes).
    #[default]
    Entity,
    /// Explicit aliased expressions.
    Projection(Vec<Aliased>),
    /// Raw SQL column list.
    Raw(String),
}

/// One ORDER BY entry.
#[derive(Debug, Clone)]
pub struct QuerySort {
    pub expr: Expr,
    pub descending: bool,
}

/// Grouping state: the key members plus HAVING predicates.
#[derive(Debug, Clone)]
pub struct GroupClause {
    pub key: Vec<Aliased>,
    pub havings: Vec<Expr>,
}

/// The IR one query chain builds up.
///
/// Invariant: `joins` is never empty; index 0 is the driving table.
#[derive(Debug, Clone)]
pub struct QueryBody {
    pub joins: Vec<QueryJoin>,
    pub wheres: Vec<QueryWhere>,
    pub select: QuerySelect,
    pub exclude: BTreeSet<String>,
    pub sorts: Vec<QuerySort>,
    pub group: Option<GroupClause>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
    pub filter_deleted: bool,
    pub filter_tenant: bool,
    /// When false, literals are inlined instead of parameterized.
    pub parameterize: bool,
}

impl QueryBody {
    /// A body whose driving table is `T`'s descriptor.
    pub fn new<T: Entity>() -> Self {
        Self::for_descriptor(descriptor_of::<T>())
    }

    /// A body driving from an explicit descriptor.
    pub fn for_descriptor(entity: Arc<EntityDescriptor>) -> Self {
        Self {
            joins: vec![QueryJoin::driving(entity)],
            wheres: Vec::new(),
            select: QuerySelect::Entity,
            exclude: BTreeSet::new(),
            sorts: Vec::new(),
            group: None,
            skip: None,
            take: None,
            filter_deleted: true,
            filter_tenant: true,
            parameterize: true,
        }
    }

    /// The driving join.
    pub fn driving(&self) -> &QueryJoin {
        &self.joins[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{ColumnDescriptor, EntityMeta, KeyStrategy};
    use crate::expr::col;
    use crate::value::{Value, ValueKind};

    struct Widget;

    impl Entity for Widget {
        fn meta() -> EntityMeta {
            EntityMeta::new("Widget")
                .column(ColumnDescriptor::new("Id", ValueKind::Long))
                .column(ColumnDescriptor::new("Name", ValueKind::Str))
                .key(KeyStrategy::Long, "Id")
        }

        fn values(&self) -> Vec<(String, Value)> {
            vec![]
        }

        fn key(&self) -> Value {
            Value::Null
        }

        fn set_key(&mut self, _key: Value) {}
    }

    #[test]
    fn test_driving_join_is_slot_zero() {
        let body = QueryBody::new::<Widget>();
        assert_eq!(body.joins.len(), 1);
        assert_eq!(body.driving().alias, "T1");
        assert_eq!(body.driving().table, "Widget");
        assert!(body.driving().on.is_none());
    }

    #[test]
    fn test_clone_is_structurally_independent() {
        let mut body = QueryBody::new::<Widget>();
        let branch = body.clone();
        body.wheres.push(QueryWhere::Predicate(col("Id").gt(1i64)));
        body.sorts.push(QuerySort {
            expr: col("Id"),
            descending: true,
        });
        assert!(branch.wheres.is_empty());
        assert!(branch.sorts.is_empty());
        // the descriptor itself is shared
        assert!(Arc::ptr_eq(&branch.driving().entity, &body.driving().entity));
    }
}
