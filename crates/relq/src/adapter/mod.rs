//! Dialect adapters.
//!
//! A [`DbAdapter`] is a pure strategy object: identifier quoting, parameter
//! naming, boolean and identity literals, function-name mapping, column-type
//! resolution, and the dialect's row-limiting templates. Adapters hold no
//! per-query state; one instance is shared for the process lifetime.
//!
//! An adapter that lacks a capability must return
//! [`RelqError::NotSupported`], never malformed SQL.

mod mssql;
mod mysql;
mod postgres;

pub use mssql::SqlServerAdapter;
pub use mysql::MySqlAdapter;
pub use postgres::PostgresAdapter;

use crate::error::{RelqError, RelqResult};
use crate::value::{Value, ValueKind};

/// CLR-neutral column classification handed to [`DbAdapter::resolve_column_type`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnHints {
    pub kind: ValueKind,
    /// String length; 0 means unbounded text.
    pub length: u32,
    /// Decimal precision; 0 means the dialect default.
    pub precision: u8,
    pub scale: u8,
    pub nullable: bool,
}

impl ColumnHints {
    pub fn new(kind: ValueKind) -> Self {
        Self {
            kind,
            length: 0,
            precision: 0,
            scale: 0,
            nullable: false,
        }
    }
}

/// A resolved native column type plus the default-value clause for
/// non-nullable columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnType {
    pub native: String,
    pub default_sql: Option<String>,
}

impl ColumnType {
    pub(crate) fn new(native: impl Into<String>, default_sql: Option<&str>) -> Self {
        Self {
            native: native.into(),
            default_sql: default_sql.map(str::to_string),
        }
    }
}

/// Pre-resolved clause fragments handed to the paging/first templates.
///
/// `select` is the column list without the SELECT keyword; `from` is the
/// table (and joins) without FROM; the optional clauses carry no keywords.
#[derive(Debug, Clone, Copy)]
pub struct StatementParts<'a> {
    pub select: &'a str,
    pub from: &'a str,
    pub where_sql: Option<&'a str>,
    pub group_sql: Option<&'a str>,
    pub having_sql: Option<&'a str>,
    pub order_sql: Option<&'a str>,
}

impl StatementParts<'_> {
    /// Everything after the select list: ` FROM …[ WHERE …][ GROUP BY …][ HAVING …][ ORDER BY …]`.
    pub fn tail(&self) -> String {
        let mut sql = format!(" FROM {}", self.from);
        if let Some(w) = self.where_sql {
            sql.push_str(" WHERE ");
            sql.push_str(w);
        }
        if let Some(g) = self.group_sql {
            sql.push_str(" GROUP BY ");
            sql.push_str(g);
        }
        if let Some(h) = self.having_sql {
            sql.push_str(" HAVING ");
            sql.push_str(h);
        }
        if let Some(o) = self.order_sql {
            sql.push_str(" ORDER BY ");
            sql.push_str(o);
        }
        sql
    }

    /// The full `SELECT …` statement.
    pub fn assemble(&self) -> String {
        format!("SELECT {}{}", self.select, self.tail())
    }
}

/// Per-dialect SQL strategy.
pub trait DbAdapter: Send + Sync {
    /// Dialect name used in diagnostics and `NotSupported` errors.
    fn name(&self) -> &'static str;

    /// Quote an identifier.
    fn quote(&self, ident: &str) -> String;

    /// Render a named parameter placeholder.
    fn parameter(&self, name: &str) -> String {
        format!("@{name}")
    }

    fn true_literal(&self) -> &'static str;

    fn false_literal(&self) -> &'static str;

    /// Statement retrieving the last generated identity, appended to INSERTs
    /// for Int/Long keys. Empty when the dialect has none.
    fn identity_sql(&self) -> &'static str {
        ""
    }

    /// Table hint suppressing row locks on reads, e.g. `WITH (NOLOCK)`.
    fn no_lock_hint(&self) -> &'static str {
        ""
    }

    /// Table hint taking a row lock on reads, e.g. `WITH (UPDLOCK)`.
    fn row_lock_hint(&self) -> &'static str {
        ""
    }

    /// Statement suffix taking a row lock on reads, e.g. ` FOR UPDATE`.
    fn row_lock_suffix(&self) -> &'static str {
        ""
    }

    /// Resolve a native column type and default clause from neutral hints.
    fn resolve_column_type(&self, hints: &ColumnHints) -> RelqResult<ColumnType>;

    /// Map a recognized function name onto dialect SQL.
    ///
    /// `column_sql` is the already-resolved operand; `operand` its value
    /// kind; `args` the literal call arguments. Unrecognized names are an
    /// error, not a silent no-op.
    fn map_function(
        &self,
        name: &str,
        column_sql: &str,
        operand: ValueKind,
        args: &[Value],
    ) -> RelqResult<String>;

    /// Dialect row-limiting template for pagination.
    fn paging_sql(&self, parts: &StatementParts<'_>, skip: u64, take: u64) -> RelqResult<String>;

    /// Dialect row-limiting template for a single leading row.
    fn first_sql(&self, parts: &StatementParts<'_>, take: u64) -> RelqResult<String>;
}

/// Functions whose SQL spelling is shared by every supported dialect.
pub(crate) fn common_function(name: &str, column_sql: &str, args: &[Value]) -> Option<String> {
    match name {
        "Count" => Some(format!("COUNT({column_sql})")),
        "Sum" => Some(format!("SUM({column_sql})")),
        "Avg" => Some(format!("AVG({column_sql})")),
        "Max" => Some(format!("MAX({column_sql})")),
        "Min" => Some(format!("MIN({column_sql})")),
        "ToLower" => Some(format!("LOWER({column_sql})")),
        "ToUpper" => Some(format!("UPPER({column_sql})")),
        "Replace" => {
            let from = arg_str(args, 0)?;
            let to = arg_str(args, 1)?;
            Some(format!(
                "REPLACE({column_sql}, {}, {})",
                crate::value::quote_str(&from),
                crate::value::quote_str(&to),
            ))
        }
        _ => None,
    }
}

pub(crate) fn arg_i64(args: &[Value], index: usize) -> Option<i64> {
    match args.get(index) {
        Some(Value::Int(n)) => Some(i64::from(*n)),
        Some(Value::Long(n)) => Some(*n),
        _ => None,
    }
}

pub(crate) fn arg_str(args: &[Value], index: usize) -> Option<String> {
    match args.get(index) {
        Some(Value::Str(s)) => Some(s.clone()),
        _ => None,
    }
}

pub(crate) fn bad_args(adapter: &'static str, name: &str) -> RelqError {
    RelqError::unsupported(format!("{adapter}: malformed arguments for function '{name}'"))
}

/// Translate a `YYYY/MM/DD/HH/mm/ss` datetime format string using a
/// per-dialect token table.
pub(crate) fn translate_datetime_format(fmt: &str, tokens: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(fmt.len());
    let mut rest = fmt;
    'outer: while !rest.is_empty() {
        for (token, replacement) in tokens {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(replacement);
                rest = tail;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        out.push(chars.next().unwrap());
        rest = chars.as_str();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_assemble_order() {
        let parts = StatementParts {
            select: "`a`,`b`",
            from: "`t`",
            where_sql: Some("`a` = 1"),
            group_sql: Some("`b`"),
            having_sql: Some("COUNT(`a`) > 1"),
            order_sql: Some("`a` ASC"),
        };
        assert_eq!(
            parts.assemble(),
            "SELECT `a`,`b` FROM `t` WHERE `a` = 1 GROUP BY `b` HAVING COUNT(`a`) > 1 ORDER BY `a` ASC"
        );
    }

    #[test]
    fn test_datetime_token_translation() {
        let fmt = translate_datetime_format(
            "YYYY-MM-DD HH:mm:ss",
            &[
                ("YYYY", "%Y"),
                ("MM", "%m"),
                ("DD", "%d"),
                ("HH", "%H"),
                ("mm", "%i"),
                ("ss", "%s"),
            ],
        );
        assert_eq!(fmt, "%Y-%m-%d %H:%i:%s");
    }
}
