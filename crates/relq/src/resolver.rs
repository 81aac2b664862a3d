//! Expression resolver: compiles the typed AST into SQL fragments plus an
//! ordered parameter list.
//!
//! One resolver instance lives for one statement build, so parameter
//! sequence numbers (`P1, P2, …`) are continuous across SELECT, WHERE,
//! HAVING, and ORDER BY in their emission order. The visitor is exhaustive:
//! an AST shape with no compilation rule is an `UnsupportedExpression`
//! error, never silently dropped SQL.

use crate::adapter::DbAdapter;
use crate::error::{RelqError, RelqResult};
use crate::expr::{Aliased, BinOp, Expr, LikeKind};
use crate::qb::body::QueryJoin;
use crate::value::{Value, ValueKind};
use std::collections::BTreeSet;

pub struct Resolver<'a> {
    adapter: &'a dyn DbAdapter,
    joins: &'a [QueryJoin],
    group_key: Option<&'a [Aliased]>,
    parameterize: bool,
    params: Vec<(String, Value)>,
}

impl<'a> Resolver<'a> {
    pub fn new(adapter: &'a dyn DbAdapter, joins: &'a [QueryJoin], parameterize: bool) -> Self {
        Self {
            adapter,
            joins,
            group_key: None,
            parameterize,
            params: Vec::new(),
        }
    }

    /// Make grouping-key members resolvable by alias.
    pub fn with_group_key(mut self, key: &'a [Aliased]) -> Self {
        self.group_key = Some(key);
        self
    }

    /// The parameters collected so far, in emission order.
    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }

    pub fn into_params(self) -> Vec<(String, Value)> {
        self.params
    }

    /// Compile a predicate. An empty string means the predicate suppressed
    /// itself (empty IN list) and contributes nothing.
    pub fn predicate(&mut self, expr: &Expr) -> RelqResult<String> {
        match expr {
            Expr::Binary { op, left, right } if op.is_logical() => {
                let l = self.predicate_operand(left, *op)?;
                let r = self.predicate_operand(right, *op)?;
                // a side suppressed by an empty IN list drops out
                match (l.is_empty(), r.is_empty()) {
                    (true, true) => Ok(String::new()),
                    (true, false) => Ok(r),
                    (false, true) => Ok(l),
                    (false, false) => Ok(format!("{l} {} {r}", op.sql())),
                }
            }
            Expr::Binary { op, left, right } if op.is_comparison() => {
                // a null literal collapses the comparison into IS [NOT] NULL
                if matches!(**right, Expr::Literal(Value::Null)) {
                    let l = self.value_expr(left)?;
                    return match op {
                        BinOp::Eq => Ok(format!("{l} IS NULL")),
                        BinOp::Ne => Ok(format!("{l} IS NOT NULL")),
                        _ => Err(RelqError::unsupported(format!(
                            "operator '{}' against NULL",
                            op.sql()
                        ))),
                    };
                }
                let l = self.value_expr(left)?;
                let r = self.value_expr(right)?;
                Ok(format!("{l} {} {r}", op.sql()))
            }
            // boolean shorthand: a bare flag column compares against the
            // dialect's true literal, its negation against false
            Expr::Column { slot, name } => {
                self.boolean_column(*slot, name, self.adapter.true_literal())
            }
            Expr::Not(inner) => match &**inner {
                Expr::Column { slot, name } => {
                    self.boolean_column(*slot, name, self.adapter.false_literal())
                }
                _ => {
                    let sql = self.predicate(inner)?;
                    if sql.is_empty() {
                        Ok(String::new())
                    } else {
                        Ok(format!("NOT ({sql})"))
                    }
                }
            },
            Expr::InList {
                target,
                values,
                negated,
            } => {
                if values.is_empty() {
                    return Ok(String::new());
                }
                let target_sql = self.value_expr(target)?;
                let rendered: Vec<String> = values
                    .iter()
                    .map(|v| {
                        v.inline_sql(self.adapter.true_literal(), self.adapter.false_literal())
                    })
                    .collect();
                let op = if *negated { "NOT IN" } else { "IN" };
                Ok(format!("{target_sql} {op} ({})", rendered.join(",")))
            }
            Expr::Like {
                target,
                pattern,
                kind,
            } => {
                let target_sql = self.value_expr(target)?;
                let full = match kind {
                    LikeKind::Contains => format!("%{pattern}%"),
                    LikeKind::StartsWith => format!("{pattern}%"),
                    LikeKind::EndsWith => format!("%{pattern}"),
                };
                let rhs = self.literal(&Value::Str(full));
                Ok(format!("{target_sql} LIKE {rhs}"))
            }
            Expr::Call { name, target, args } if name == "Equals" => {
                let target_sql = self.value_expr(target)?;
                let arg = args
                    .first()
                    .ok_or_else(|| RelqError::unsupported("Equals without an argument"))?;
                let rhs = self.literal(arg);
                Ok(format!("{target_sql} = {rhs}"))
            }
            Expr::Raw(sql) => Ok(sql.clone()),
            other => Err(RelqError::unsupported(format!(
                "predicate shape {other:?}"
            ))),
        }
    }

    /// Compile a value expression.
    pub fn value_expr(&mut self, expr: &Expr) -> RelqResult<String> {
        match expr {
            Expr::Column { slot, name } => self.column_sql(*slot, name),
            Expr::Literal(Value::Null) => Ok("NULL".to_string()),
            Expr::Literal(v) => Ok(self.literal(v)),
            Expr::Binary { op, left, right } if op.is_arithmetic() => {
                let l = self.arith_operand(left)?;
                let r = self.arith_operand(right)?;
                Ok(format!("{l} {} {r}", op.sql()))
            }
            Expr::Call { name, target, args } => {
                if name == "Equals" {
                    return Err(RelqError::unsupported("Equals in value position"));
                }
                let operand = self.expr_kind(target);
                let target_sql = self.value_expr(target)?;
                self.adapter.map_function(name, &target_sql, operand, args)
            }
            Expr::KeyRef(alias) => {
                let key = self.group_key.ok_or_else(|| {
                    RelqError::unsupported("grouping-key reference outside a grouped query")
                })?;
                let member = key
                    .iter()
                    .find(|a| a.alias == *alias)
                    .ok_or_else(|| RelqError::column_not_found("<group key>", alias.clone()))?;
                // resolve through the key member to the original expression
                self.value_expr(&member.expr)
            }
            Expr::Raw(sql) => Ok(sql.clone()),
            other => Err(RelqError::unsupported(format!(
                "value expression shape {other:?}"
            ))),
        }
    }

    /// Compile a projection list. Whole-entity items expand to their
    /// descriptor's columns minus the exclude set.
    pub fn projection(
        &mut self,
        items: &[Aliased],
        exclude: &BTreeSet<String>,
    ) -> RelqResult<String> {
        let mut parts = Vec::with_capacity(items.len());
        for item in items {
            match &item.expr {
                Expr::EntityRef(slot) => parts.push(self.entity_columns(*slot, exclude)?),
                expr => {
                    let sql = self.value_expr(expr)?;
                    parts.push(format!("{sql} AS {}", self.adapter.quote(&item.alias)));
                }
            }
        }
        Ok(parts.join(","))
    }

    /// All columns of the entity at `slot`, minus excludes, alias-qualified
    /// when the query has more than one join.
    pub fn entity_columns(&self, slot: usize, exclude: &BTreeSet<String>) -> RelqResult<String> {
        let join = self.join_at(slot)?;
        let cols: Vec<String> = join
            .entity
            .columns
            .iter()
            .filter(|c| !exclude.contains(&c.name))
            .map(|c| self.qualify(join, &c.name))
            .collect();
        if cols.is_empty() {
            return Err(RelqError::unsupported(format!(
                "entity '{}' has no selectable columns",
                join.entity.table
            )));
        }
        Ok(cols.join(","))
    }

    /// Resolve `slot.name` to `<alias>.<quoted column>`, validating the
    /// column against the join's descriptor. The alias is omitted when the
    /// query has exactly one join.
    pub fn column_sql(&self, slot: usize, name: &str) -> RelqResult<String> {
        let join = self.join_at(slot)?;
        let column = join
            .entity
            .column(name)
            .ok_or_else(|| RelqError::column_not_found(join.entity.table.clone(), name))?;
        Ok(self.qualify(join, &column.name))
    }

    fn boolean_column(&self, slot: usize, name: &str, literal: &str) -> RelqResult<String> {
        let join = self.join_at(slot)?;
        let column = join
            .entity
            .column(name)
            .ok_or_else(|| RelqError::column_not_found(join.entity.table.clone(), name))?;
        if column.hints.kind != ValueKind::Bool {
            return Err(RelqError::unsupported(format!(
                "bare column '{name}' in predicate position is not boolean"
            )));
        }
        Ok(format!("{} = {literal}", self.qualify(join, &column.name)))
    }

    fn join_at(&self, slot: usize) -> RelqResult<&'a QueryJoin> {
        self.joins.get(slot).ok_or_else(|| {
            RelqError::unsupported(format!("join slot {slot} outside the join list"))
        })
    }

    fn qualify(&self, join: &QueryJoin, column: &str) -> String {
        let quoted = self.adapter.quote(column);
        if self.joins.len() > 1 {
            format!("{}.{quoted}", join.alias)
        } else {
            quoted
        }
    }

    fn arith_operand(&mut self, expr: &Expr) -> RelqResult<String> {
        let sql = self.value_expr(expr)?;
        match expr {
            Expr::Binary { op, .. } if op.is_arithmetic() => Ok(format!("({sql})")),
            _ => Ok(sql),
        }
    }

    fn predicate_operand(&mut self, expr: &Expr, parent: BinOp) -> RelqResult<String> {
        let sql = self.predicate(expr)?;
        match expr {
            Expr::Binary { op, .. } if op.is_logical() && *op != parent && !sql.is_empty() => {
                Ok(format!("({sql})"))
            }
            _ => Ok(sql),
        }
    }

    /// Emit a literal: a fresh sequence-named parameter when
    /// parameterization is on, a type-formatted inline literal otherwise.
    fn literal(&mut self, value: &Value) -> String {
        if self.parameterize {
            let name = format!("P{}", self.params.len() + 1);
            let placeholder = self.adapter.parameter(&name);
            self.params.push((name, value.clone()));
            placeholder
        } else {
            value.inline_sql(self.adapter.true_literal(), self.adapter.false_literal())
        }
    }

    fn expr_kind(&self, expr: &Expr) -> ValueKind {
        match expr {
            Expr::Column { slot, name } => self
                .join_at(*slot)
                .ok()
                .and_then(|j| j.entity.column(name))
                .map(|c| c.hints.kind)
                .unwrap_or(ValueKind::Str),
            Expr::Literal(v) => v.kind(),
            _ => ValueKind::Str,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MySqlAdapter;
    use crate::entity::{ColumnDescriptor, EntityMeta, KeyStrategy};
    use crate::expr::{col, tcol};
    use crate::entity::Entity;
    use crate::qb::body::{JoinKind, QueryBody, QueryJoin};
    use crate::value::Value;

    struct Article;

    impl Entity for Article {
        fn meta() -> EntityMeta {
            EntityMeta::new("Article")
                .column(ColumnDescriptor::new("Id", ValueKind::Long))
                .column(ColumnDescriptor::new("Title", ValueKind::Str).length(100))
                .column(ColumnDescriptor::new("CategoryId", ValueKind::Long))
                .column(ColumnDescriptor::new("Hits", ValueKind::Int))
                .column(ColumnDescriptor::new("Deleted", ValueKind::Bool))
                .key(KeyStrategy::Long, "Id")
                .soft_delete()
        }

        fn values(&self) -> Vec<(String, Value)> {
            vec![]
        }

        fn key(&self) -> Value {
            Value::Null
        }

        fn set_key(&mut self, _key: Value) {}
    }

    struct Category;

    impl Entity for Category {
        fn meta() -> EntityMeta {
            EntityMeta::new("Category")
                .column(ColumnDescriptor::new("Id", ValueKind::Long))
                .column(ColumnDescriptor::new("Name", ValueKind::Str).length(50))
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

    fn single_join() -> Vec<QueryJoin> {
        QueryBody::new::<Article>().joins
    }

    fn two_joins() -> Vec<QueryJoin> {
        let mut joins = QueryBody::new::<Article>().joins;
        joins.push(QueryJoin::joined(
            crate::entity::descriptor_of::<Category>(),
            1,
            JoinKind::Inner,
            col("CategoryId").eq(tcol(1, "Id")),
        ));
        joins
    }

    #[test]
    fn test_comparison_parameterized() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        let sql = r.predicate(&col("Hits").gt(10)).unwrap();
        assert_eq!(sql, "`Hits` > @P1");
        assert_eq!(r.params(), &[("P1".to_string(), Value::Int(10))]);
    }

    #[test]
    fn test_comparison_inlined_when_parameterization_off() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, false);
        let sql = r
            .predicate(&col("Title").eq("o'brien").and(col("Hits").gt(10)))
            .unwrap();
        assert_eq!(sql, "`Title` = 'o''brien' AND `Hits` > 10");
        assert!(r.params().is_empty());
    }

    #[test]
    fn test_null_comparison_collapses() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        assert_eq!(
            r.predicate(&col("Title").is_null()).unwrap(),
            "`Title` IS NULL"
        );
        assert_eq!(
            r.predicate(&col("Title").is_not_null()).unwrap(),
            "`Title` IS NOT NULL"
        );
        assert!(r.params().is_empty());
    }

    #[test]
    fn test_boolean_shorthand() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        assert_eq!(r.predicate(&col("Deleted")).unwrap(), "`Deleted` = 1");
        assert_eq!(r.predicate(&col("Deleted").not()).unwrap(), "`Deleted` = 0");
    }

    #[test]
    fn test_bare_non_boolean_column_is_rejected() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        assert!(r.predicate(&col("Title")).is_err());
    }

    #[test]
    fn test_in_list_dispatch() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        assert_eq!(
            r.predicate(&col("Id").in_list([1i64, 2, 3])).unwrap(),
            "`Id` IN (1,2,3)"
        );
        assert_eq!(
            r.predicate(&col("Title").in_list(["a", "b'c"])).unwrap(),
            "`Title` IN ('a','b''c')"
        );
    }

    #[test]
    fn test_empty_in_list_suppresses_clause() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        let empty: Vec<i64> = vec![];
        assert_eq!(r.predicate(&col("Id").in_list(empty)).unwrap(), "");
        // suppressed side of a conjunction drops out
        let empty: Vec<i64> = vec![];
        let sql = r
            .predicate(&col("Id").in_list(empty).and(col("Hits").gt(1)))
            .unwrap();
        assert_eq!(sql, "`Hits` > @P1");
    }

    #[test]
    fn test_like_is_parameterized() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        let sql = r.predicate(&col("Title").contains("ru%st")).unwrap();
        assert_eq!(sql, "`Title` LIKE @P1");
        assert_eq!(r.params()[0].1, Value::Str("%ru%st%".to_string()));
    }

    #[test]
    fn test_two_join_slots_resolve_to_aliases() {
        let joins = two_joins();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        let sql = r.predicate(&col("CategoryId").eq(tcol(1, "Id"))).unwrap();
        assert_eq!(sql, "T1.`CategoryId` = T2.`Id`");
    }

    #[test]
    fn test_unknown_column_is_an_error() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        let err = r.predicate(&col("Nope").eq(1)).unwrap_err();
        assert!(matches!(err, RelqError::ColumnNotFound { .. }));
    }

    #[test]
    fn test_or_inside_and_is_parenthesized() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, false);
        let sql = r
            .predicate(
                &col("Hits")
                    .gt(1)
                    .and(col("Title").eq("a").or(col("Title").eq("b"))),
            )
            .unwrap();
        assert_eq!(sql, "`Hits` > 1 AND (`Title` = 'a' OR `Title` = 'b')");
    }

    #[test]
    fn test_projection_with_aggregate_and_alias() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        let sql = r
            .projection(
                &[
                    col("Id").sum().alias("Sum"),
                    col("Title").alias("Title"),
                ],
                &BTreeSet::new(),
            )
            .unwrap();
        assert_eq!(sql, "SUM(`Id`) AS `Sum`,`Title` AS `Title`");
    }

    #[test]
    fn test_entity_ref_expands_columns_minus_excludes() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        let mut exclude = BTreeSet::new();
        exclude.insert("Deleted".to_string());
        let sql = r
            .projection(&[crate::expr::entity_ref(0).alias("")], &exclude)
            .unwrap();
        assert_eq!(sql, "`Id`,`Title`,`CategoryId`,`Hits`");
    }

    #[test]
    fn test_group_key_indirection() {
        let joins = single_join();
        let key = vec![col("Title").alias("Title")];
        let mut r = Resolver::new(&MySqlAdapter, &joins, true).with_group_key(&key);
        let sql = r.value_expr(&crate::expr::key_ref("Title")).unwrap();
        assert_eq!(sql, "`Title`");
        assert!(r
            .value_expr(&crate::expr::key_ref("Missing"))
            .is_err());
    }

    #[test]
    fn test_arithmetic_nesting_parenthesized() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, false);
        let sql = r
            .value_expr(&col("Hits").add(col("Id")).mul(2))
            .unwrap();
        assert_eq!(sql, "(`Hits` + `Id`) * 2");
    }

    #[test]
    fn test_function_delegation() {
        let joins = single_join();
        let mut r = Resolver::new(&MySqlAdapter, &joins, true);
        let sql = r.value_expr(&col("Title").substring(0, 5)).unwrap();
        assert_eq!(sql, "SUBSTRING(`Title`, 1, 5)");
        let sql = r.value_expr(&col("Title").length()).unwrap();
        assert_eq!(sql, "LENGTH(`Title`)");
    }
}
