//! SQL value model shared by literals, parameters, and rows.
//!
//! [`Value`] is the single representation of anything that crosses the SQL
//! boundary: literals folded into the expression AST, collected statement
//! parameters, and cell values in rows coming back from the execution
//! backend. [`ValueKind`] is the CLR-neutral type classification the dialect
//! adapters use for column typing and IN-list dispatch.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use uuid::Uuid;

/// A SQL-compatible value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f64),
    Decimal(Decimal),
    Str(String),
    Uuid(Uuid),
    DateTime(NaiveDateTime),
    /// Enum member carried as its integer value
    Enum(i32),
    Json(serde_json::Value),
}

/// Type classification for values and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Null,
    Bool,
    Int,
    Long,
    Float,
    Decimal,
    Str,
    Uuid,
    DateTime,
    Enum,
    Json,
}

impl Value {
    /// The kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Float(_) => ValueKind::Float,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Str(_) => ValueKind::Str,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::DateTime(_) => ValueKind::DateTime,
            Value::Enum(_) => ValueKind::Enum,
            Value::Json(_) => ValueKind::Json,
        }
    }

    /// Check for SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render this value as an inline SQL literal.
    ///
    /// Used when parameterization is disabled and for IN-list members:
    /// enums as their integer value, booleans as the dialect's literal,
    /// datetimes as `'yyyy-MM-dd HH:mm:ss'`, strings and uuids quoted with
    /// embedded quotes doubled, everything else via its textual form.
    pub fn inline_sql(&self, true_literal: &str, false_literal: &str) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => {
                if *b {
                    true_literal.to_string()
                } else {
                    false_literal.to_string()
                }
            }
            Value::Int(n) => n.to_string(),
            Value::Long(n) => n.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::Str(s) => quote_str(s),
            Value::Uuid(u) => quote_str(&u.to_string()),
            Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S")),
            Value::Enum(n) => n.to_string(),
            Value::Json(j) => quote_str(&j.to_string()),
        }
    }
}

/// Single-quote a string, doubling embedded quotes.
pub(crate) fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        if c == '\'' {
            out.push_str("''");
        } else {
            out.push(c);
        }
    }
    out.push('\'');
    out
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_literal_escapes_quotes() {
        let v = Value::from("o'brien");
        assert_eq!(v.inline_sql("1", "0"), "'o''brien'");
    }

    #[test]
    fn test_bool_literal_uses_dialect_form() {
        assert_eq!(Value::from(true).inline_sql("1", "0"), "1");
        assert_eq!(Value::from(false).inline_sql("TRUE", "FALSE"), "FALSE");
    }

    #[test]
    fn test_datetime_literal_format() {
        let dt = NaiveDateTime::parse_from_str("2024-03-01 08:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(Value::from(dt).inline_sql("1", "0"), "'2024-03-01 08:30:00'");
    }

    #[test]
    fn test_option_folds_to_null() {
        let v: Value = Option::<i32>::None.into();
        assert!(v.is_null());
    }
}
