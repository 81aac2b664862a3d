//! MySQL-family adapter.

use super::{
    ColumnHints, ColumnType, DbAdapter, StatementParts, arg_i64, arg_str, bad_args,
    common_function, translate_datetime_format,
};
use crate::error::{RelqError, RelqResult};
use crate::value::{Value, ValueKind};

const DATETIME_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "%Y"),
    ("MM", "%m"),
    ("DD", "%d"),
    ("HH", "%H"),
    ("mm", "%i"),
    ("ss", "%s"),
];

/// Adapter for MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlAdapter;

impl MySqlAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl DbAdapter for MySqlAdapter {
    fn name(&self) -> &'static str {
        "MySQL"
    }

    fn quote(&self, ident: &str) -> String {
        format!("`{ident}`")
    }

    fn true_literal(&self) -> &'static str {
        "1"
    }

    fn false_literal(&self) -> &'static str {
        "0"
    }

    fn identity_sql(&self) -> &'static str {
        "SELECT LAST_INSERT_ID();"
    }

    fn row_lock_suffix(&self) -> &'static str {
        " FOR UPDATE"
    }

    fn resolve_column_type(&self, hints: &ColumnHints) -> RelqResult<ColumnType> {
        let resolved = match hints.kind {
            ValueKind::Enum => ColumnType::new("INT", Some("0")),
            ValueKind::Bool => ColumnType::new("TINYINT(1)", Some("0")),
            ValueKind::Int => ColumnType::new("INT", Some("0")),
            ValueKind::Long => ColumnType::new("BIGINT", Some("0")),
            ValueKind::Float => ColumnType::new("DOUBLE", Some("0")),
            ValueKind::Decimal => {
                let (p, s) = if hints.precision == 0 {
                    (18, 4)
                } else {
                    (hints.precision, hints.scale)
                };
                ColumnType::new(format!("DECIMAL({p},{s})"), Some("0"))
            }
            ValueKind::Str if hints.length == 0 => ColumnType::new("LONGTEXT", None),
            ValueKind::Str => ColumnType::new(format!("VARCHAR({})", hints.length), Some("''")),
            ValueKind::Uuid => ColumnType::new("CHAR(36)", Some("''")),
            ValueKind::DateTime => ColumnType::new("DATETIME", Some("CURRENT_TIMESTAMP")),
            ValueKind::Json => ColumnType::new("JSON", None),
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
                Ok(format!("DATE_FORMAT({column_sql}, '{fmt}')"))
            }
            "Length" => Ok(format!("LENGTH({column_sql})")),
            _ => common_function(name, column_sql, args).ok_or_else(|| {
                RelqError::unsupported(format!("{}: unknown function '{name}'", self.name()))
            }),
        }
    }

    fn paging_sql(&self, parts: &StatementParts<'_>, skip: u64, take: u64) -> RelqResult<String> {
        let base = parts.assemble();
        if skip == 0 {
            Ok(format!("{base} LIMIT {take}"))
        } else {
            Ok(format!("{base} LIMIT {skip},{take}"))
        }
    }

    fn first_sql(&self, parts: &StatementParts<'_>, take: u64) -> RelqResult<String> {
        Ok(format!("{} LIMIT {take}", parts.assemble()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts<'a>(where_sql: Option<&'a str>, order_sql: Option<&'a str>) -> StatementParts<'a> {
        StatementParts {
            select: "`Id`,`Title`",
            from: "`Article`",
            where_sql,
            group_sql: None,
            having_sql: None,
            order_sql,
        }
    }

    #[test]
    fn test_paging_without_skip_is_simple_limit() {
        let sql = MySqlAdapter
            .paging_sql(&parts(Some("`Deleted` = 0"), None), 0, 10)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT `Id`,`Title` FROM `Article` WHERE `Deleted` = 0 LIMIT 10"
        );
    }

    #[test]
    fn test_paging_with_skip_uses_offset_form() {
        let sql = MySqlAdapter
            .paging_sql(&parts(Some("`Deleted` = 0"), Some("`Id` DESC")), 20, 10)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT `Id`,`Title` FROM `Article` WHERE `Deleted` = 0 ORDER BY `Id` DESC LIMIT 20,10"
        );
    }

    #[test]
    fn test_substring_converts_to_one_based() {
        let sql = MySqlAdapter
            .map_function("Substring", "`Title`", ValueKind::Str, &[
                Value::Int(0),
                Value::Int(5),
            ])
            .unwrap();
        assert_eq!(sql, "SUBSTRING(`Title`, 1, 5)");
    }

    #[test]
    fn test_datetime_to_string_translates_tokens() {
        let sql = MySqlAdapter
            .map_function("ToString", "`CreateTime`", ValueKind::DateTime, &[
                Value::Str("YYYY-MM-DD HH:mm:ss".into()),
            ])
            .unwrap();
        assert_eq!(sql, "DATE_FORMAT(`CreateTime`, '%Y-%m-%d %H:%i:%s')");
    }

    #[test]
    fn test_unknown_function_is_an_error() {
        let err = MySqlAdapter
            .map_function("Reverse", "`Title`", ValueKind::Str, &[])
            .unwrap_err();
        assert!(matches!(err, RelqError::UnsupportedExpression(_)));
    }

    #[test]
    fn test_unbounded_string_maps_to_text() {
        let t = MySqlAdapter
            .resolve_column_type(&ColumnHints::new(ValueKind::Str))
            .unwrap();
        assert_eq!(t.native, "LONGTEXT");
        let t = MySqlAdapter
            .resolve_column_type(&ColumnHints {
                length: 50,
                ..ColumnHints::new(ValueKind::Str)
            })
            .unwrap();
        assert_eq!(t.native, "VARCHAR(50)");
        assert_eq!(t.default_sql.as_deref(), Some("''"));
    }
}
