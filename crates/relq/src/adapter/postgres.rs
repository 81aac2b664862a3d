//! PostgreSQL adapter.
//!
//! Quoting, typing, and function mapping are complete; the row-limiting
//! templates are not implemented yet and report `NotSupported`.

use super::{
    ColumnHints, ColumnType, DbAdapter, StatementParts, arg_i64, arg_str, bad_args,
    common_function, translate_datetime_format,
};
use crate::error::{RelqError, RelqResult};
use crate::value::{Value, ValueKind};

const DATETIME_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "YYYY"),
    ("MM", "MM"),
    ("DD", "DD"),
    ("HH", "HH24"),
    ("mm", "MI"),
    ("ss", "SS"),
];

/// Adapter for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresAdapter;

impl PostgresAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DbAdapter for PostgresAdapter {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn quote(&self, ident: &str) -> String {
        format!("\"{ident}\"")
    }

    fn true_literal(&self) -> &'static str {
        "TRUE"
    }

    fn false_literal(&self) -> &'static str {
        "FALSE"
    }

    fn row_lock_suffix(&self) -> &'static str {
        " FOR UPDATE"
    }

    fn resolve_column_type(&self, hints: &ColumnHints) -> RelqResult<ColumnType> {
        let resolved = match hints.kind {
            ValueKind::Enum => ColumnType::new("INT", Some("0")),
            ValueKind::Bool => ColumnType::new("BOOLEAN", Some("FALSE")),
            ValueKind::Int => ColumnType::new("INTEGER", Some("0")),
            ValueKind::Long => ColumnType::new("BIGINT", Some("0")),
            ValueKind::Float => ColumnType::new("DOUBLE PRECISION", Some("0")),
            ValueKind::Decimal => {
                let (p, s) = if hints.precision == 0 {
                    (18, 4)
                } else {
                    (hints.precision, hints.scale)
                };
                ColumnType::new(format!("NUMERIC({p},{s})"), Some("0"))
            }
            ValueKind::Str if hints.length == 0 => ColumnType::new("TEXT", None),
            ValueKind::Str => ColumnType::new(format!("VARCHAR({})", hints.length), Some("''")),
            ValueKind::Uuid => ColumnType::new("UUID", None),
            ValueKind::DateTime => ColumnType::new("TIMESTAMP", Some("CURRENT_TIMESTAMP")),
            ValueKind::Json => ColumnType::new("JSONB", None),
            ValueKind::Null => {
                return Err(RelqError::not_supported(self.name(), "untyped column"));
            }
        };
        if hints.nullable {
            Ok(ColumnType {
                default_sql: None,
                ..resolved
            })
        } else {
            Ok(resolved)
        }
    }

    fn map_function(
        &self,
        name: &str,
        column_sql: &str,
        operand: ValueKind,
        args: &[Value],
    ) -> RelqResult<String> {
        match name {
            "Substring" => {
                let start = arg_i64(args, 0).ok_or_else(|| bad_args(self.name(), name))?;
                let len = arg_i64(args, 1).ok_or_else(|| bad_args(self.name(), name))?;
                Ok(format!("SUBSTRING({column_sql}, {}, {len})", start + 1))
            }
            "ToString" if operand == ValueKind::DateTime => {
                let fmt = arg_str(args, 0).ok_or_else(|| bad_args(self.name(), name))?;
                let fmt = translate_datetime_format(&fmt, DATETIME_TOKENS);
                Ok(format!("TO_CHAR({column_sql}, '{fmt}')"))
            }
            "Length" => Ok(format!("LENGTH({column_sql})")),
            _ => common_function(name, column_sql, args).ok_or_else(|| {
                RelqError::unsupported(format!("{}: unknown function '{name}'", self.name()))
            }),
        }
    }

    fn paging_sql(&self, _parts: &StatementParts<'_>, _skip: u64, _take: u64) -> RelqResult<String> {
        Err(RelqError::not_supported(self.name(), "paging"))
    }

    fn first_sql(&self, _parts: &StatementParts<'_>, _take: u64) -> RelqResult<String> {
        Err(RelqError::not_supported(self.name(), "first-row limiting"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_reports_not_supported() {
        let parts = StatementParts {
            select: "*",
            from: "\"article\"",
            where_sql: None,
            group_sql: None,
            having_sql: None,
            order_sql: None,
        };
        let err = PostgresAdapter.paging_sql(&parts, 0, 10).unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_datetime_format_tokens() {
        let sql = PostgresAdapter
            .map_function("ToString", "\"create_time\"", ValueKind::DateTime, &[
                Value::Str("YYYY-MM-DD HH:mm:ss".into()),
            ])
            .unwrap();
        assert_eq!(sql, "TO_CHAR(\"create_time\", 'YYYY-MM-DD HH24:MI:SS')");
    }
}
