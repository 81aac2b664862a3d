//! SQL Server adapter.
//!
//! Paging depends on the server version: 2012 and later use OFFSET/FETCH,
//! older versions fall back to a ROW_NUMBER-wrapped subselect.

use super::{
    ColumnHints, ColumnType, DbAdapter, StatementParts, arg_i64, arg_str, bad_args,
    common_function, translate_datetime_format,
};
use crate::error::{RelqError, RelqResult};
use crate::value::{Value, ValueKind};

const DATETIME_TOKENS: &[(&str, &str)] = &[
    ("YYYY", "yyyy"),
    ("MM", "MM"),
    ("DD", "dd"),
    ("HH", "HH"),
    ("mm", "mm"),
    ("ss", "ss"),
];

/// Adapter for Microsoft SQL Server.
#[derive(Debug, Clone)]
pub struct SqlServerAdapter {
    version: String,
    offset_fetch: bool,
}

impl SqlServerAdapter {
    /// Create an adapter for the given server version string (e.g. `"2008"`,
    /// `"2019"`). Versions from 2012 on use OFFSET/FETCH paging.
    pub fn new(version: impl Into<String>) -> Self {
        let version = version.into();
        let year: u32 = version
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>()
            .parse()
            .unwrap_or(0);
        Self {
            offset_fetch: year >= 2012,
            version,
        }
    }

    /// The version string this adapter was created with.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl Default for SqlServerAdapter {
    fn default() -> Self {
        Self::new("2019")
    }
}

impl DbAdapter for SqlServerAdapter {
    fn name(&self) -> &'static str {
        "SQLServer"
    }

    fn quote(&self, ident: &str) -> String {
        format!("[{ident}]")
    }

    fn true_literal(&self) -> &'static str {
        "1"
    }

    fn false_literal(&self) -> &'static str {
        "0"
    }

    fn identity_sql(&self) -> &'static str {
        "SELECT SCOPE_IDENTITY();"
    }

    fn no_lock_hint(&self) -> &'static str {
        "WITH (NOLOCK)"
    }

    fn row_lock_hint(&self) -> &'static str {
        "WITH (UPDLOCK)"
    }

    fn resolve_column_type(&self, hints: &ColumnHints) -> RelqResult<ColumnType> {
        let resolved = match hints.kind {
            ValueKind::Enum => ColumnType::new("INT", Some("0")),
            ValueKind::Bool => ColumnType::new("BIT", Some("0")),
            ValueKind::Int => ColumnType::new("INT", Some("0")),
            ValueKind::Long => ColumnType::new("BIGINT", Some("0")),
            ValueKind::Float => ColumnType::new("FLOAT", Some("0")),
            ValueKind::Decimal => {
                let (p, s) = if hints.precision == 0 {
                    (18, 4)
                } else {
                    (hints.precision, hints.scale)
                };
                ColumnType::new(format!("DECIMAL({p},{s})"), Some("0"))
            }
            ValueKind::Str if hints.length == 0 => ColumnType::new("NVARCHAR(MAX)", None),
            ValueKind::Str => ColumnType::new(format!("NVARCHAR({})", hints.length), Some("''")),
            ValueKind::Uuid => ColumnType::new(
                "UNIQUEIDENTIFIER",
                Some("'00000000-0000-0000-0000-000000000000'"),
            ),
            ValueKind::DateTime => ColumnType::new("DATETIME", Some("GETDATE()")),
            ValueKind::Json => ColumnType::new("NVARCHAR(MAX)", None),
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
                Ok(format!("FORMAT({column_sql}, '{fmt}')"))
            }
            "Length" => Ok(format!("LEN({column_sql})")),
            _ => common_function(name, column_sql, args).ok_or_else(|| {
                RelqError::unsupported(format!("{}: unknown function '{name}'", self.name()))
            }),
        }
    }

    fn paging_sql(&self, parts: &StatementParts<'_>, skip: u64, take: u64) -> RelqResult<String> {
        let order = parts
            .order_sql
            .ok_or_else(|| RelqError::not_supported(self.name(), "paging without ORDER BY"))?;
        if self.offset_fetch {
            Ok(format!(
                "{} OFFSET {skip} ROW FETCH NEXT {take} ROW ONLY",
                parts.assemble()
            ))
        } else {
            let inner = StatementParts {
                order_sql: None,
                ..*parts
            };
            Ok(format!(
                "SELECT * FROM (SELECT ROW_NUMBER() OVER(ORDER BY {order}) AS RowNum, {}{}) AS T \
                 WHERE T.RowNum BETWEEN {skip} AND {}",
                inner.select,
                inner.tail(),
                skip + take
            ))
        }
    }

    fn first_sql(&self, parts: &StatementParts<'_>, take: u64) -> RelqResult<String> {
        Ok(format!("SELECT TOP {take} {}{}", parts.select, parts.tail()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts<'a>() -> StatementParts<'a> {
        StatementParts {
            select: "[Id],[Title]",
            from: "[Article]",
            where_sql: Some("[Deleted] = 0"),
            group_sql: None,
            having_sql: None,
            order_sql: Some("[Id] DESC"),
        }
    }

    #[test]
    fn test_modern_paging_uses_offset_fetch() {
        let adapter = SqlServerAdapter::new("2012");
        let sql = adapter.paging_sql(&parts(), 20, 10).unwrap();
        assert_eq!(
            sql,
            "SELECT [Id],[Title] FROM [Article] WHERE [Deleted] = 0 ORDER BY [Id] DESC \
             OFFSET 20 ROW FETCH NEXT 10 ROW ONLY"
        );
    }

    #[test]
    fn test_legacy_paging_wraps_row_number() {
        let adapter = SqlServerAdapter::new("2008");
        let sql = adapter.paging_sql(&parts(), 20, 10).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT ROW_NUMBER() OVER(ORDER BY [Id] DESC) AS RowNum, [Id],[Title] \
             FROM [Article] WHERE [Deleted] = 0) AS T WHERE T.RowNum BETWEEN 20 AND 30"
        );
    }

    #[test]
    fn test_paging_requires_sort() {
        let adapter = SqlServerAdapter::default();
        let err = adapter
            .paging_sql(
                &StatementParts {
                    order_sql: None,
                    ..parts()
                },
                0,
                10,
            )
            .unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn test_first_uses_top() {
        let adapter = SqlServerAdapter::default();
        let sql = adapter.first_sql(&parts(), 1).unwrap();
        assert_eq!(
            sql,
            "SELECT TOP 1 [Id],[Title] FROM [Article] WHERE [Deleted] = 0 ORDER BY [Id] DESC"
        );
    }

    #[test]
    fn test_datetime_format_tokens() {
        let adapter = SqlServerAdapter::default();
        let sql = adapter
            .map_function("ToString", "[CreateTime]", ValueKind::DateTime, &[
                Value::Str("YYYY/MM/DD".into()),
            ])
            .unwrap();
        assert_eq!(sql, "FORMAT([CreateTime], 'yyyy/MM/dd')");
    }
}
