//! Typed expression AST for predicates, value expressions, and projections.
//!
//! The fluent constructors here build a tagged-union tree the resolver
//! compiles to SQL. Values are folded into [`Expr::Literal`] at construction
//! time, so the tree carries no late-bound state.
//!
//! # Example
//!
//! ```ignore
//! use relq::expr::{col, tcol};
//!
//! // WHERE `Title` LIKE @P1 AND `Hits` > @P2
//! let pred = col("Title").contains("rust").and(col("Hits").gt(10));
//!
//! // ON T1.`CategoryId` = T2.`Id`
//! let on = col("CategoryId").eq(tcol(1, "Id"));
//! ```

use crate::value::Value;

/// Binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl BinOp {
    /// SQL spelling.
    pub fn sql(self) -> &'static str {
        match self {
            BinOp::And => "AND",
            BinOp::Or => "OR",
            BinOp::Eq => "=",
            BinOp::Ne => "<>",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
        }
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod
        )
    }
}

/// LIKE pattern placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeKind {
    /// `%value%`
    Contains,
    /// `value%`
    StartsWith,
    /// `%value`
    EndsWith,
}

/// Expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// `left op right`
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Logical negation.
    Not(Box<Expr>),
    /// Column reference; `slot` indexes the query's join list.
    Column { slot: usize, name: String },
    /// Folded literal value.
    Literal(Value),
    /// Recognized function call over a target expression.
    Call {
        name: String,
        target: Box<Expr>,
        args: Vec<Value>,
    },
    /// `target IN (…)` / `target NOT IN (…)`.
    InList {
        target: Box<Expr>,
        values: Vec<Value>,
        negated: bool,
    },
    /// `target LIKE …` with `%` affixes per [`LikeKind`].
    Like {
        target: Box<Expr>,
        pattern: String,
        kind: LikeKind,
    },
    /// A whole entity in projection position; expands to its columns.
    EntityRef(usize),
    /// Reference to a grouping-key member by alias.
    KeyRef(String),
    /// Raw SQL fragment.
    Raw(String),
}

/// A projection item: `expr AS alias`.
#[derive(Debug, Clone)]
pub struct Aliased {
    pub alias: String,
    pub expr: Expr,
}

/// Column of the driving entity (join slot 0).
pub fn col(name: impl Into<String>) -> Expr {
    Expr::Column {
        slot: 0,
        name: name.into(),
    }
}

/// Column of the entity at the given join slot (0 = driving table).
pub fn tcol(slot: usize, name: impl Into<String>) -> Expr {
    Expr::Column {
        slot,
        name: name.into(),
    }
}

/// A literal value expression.
pub fn val(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

/// A grouping-key member, referenced by its alias in the group key.
pub fn key_ref(alias: impl Into<String>) -> Expr {
    Expr::KeyRef(alias.into())
}

/// A whole entity in projection position.
pub fn entity_ref(slot: usize) -> Expr {
    Expr::EntityRef(slot)
}

/// A raw SQL fragment.
pub fn raw(sql: impl Into<String>) -> Expr {
    Expr::Raw(sql.into())
}

/// Conversion into an expression operand.
///
/// Implemented for [`Expr`] itself and for everything that folds into a
/// [`Value`] literal.
pub trait IntoExpr {
    fn into_expr(self) -> Expr;
}

impl IntoExpr for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

macro_rules! literal_into_expr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoExpr for $ty {
                fn into_expr(self) -> Expr {
                    Expr::Literal(self.into())
                }
            }
        )*
    };
}

literal_into_expr!(
    Value,
    bool,
    i32,
    i64,
    f64,
    &str,
    String,
    uuid::Uuid,
    chrono::NaiveDateTime,
    rust_decimal::Decimal,
);

impl Expr {
    fn binary(op: BinOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(self, other: Expr) -> Expr {
        Expr::binary(BinOp::And, self, other)
    }

    pub fn or(self, other: Expr) -> Expr {
        Expr::binary(BinOp::Or, self, other)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn eq(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Eq, self, rhs.into_expr())
    }

    pub fn ne(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Ne, self, rhs.into_expr())
    }

    pub fn gt(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Gt, self, rhs.into_expr())
    }

    pub fn ge(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Ge, self, rhs.into_expr())
    }

    pub fn lt(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Lt, self, rhs.into_expr())
    }

    pub fn le(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Le, self, rhs.into_expr())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn add(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Add, self, rhs.into_expr())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn sub(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Sub, self, rhs.into_expr())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn mul(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Mul, self, rhs.into_expr())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn div(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Div, self, rhs.into_expr())
    }

    pub fn rem(self, rhs: impl IntoExpr) -> Expr {
        Expr::binary(BinOp::Mod, self, rhs.into_expr())
    }

    /// `expr = NULL`; the resolver collapses this to `IS NULL`.
    pub fn is_null(self) -> Expr {
        self.eq(Value::Null)
    }

    /// `expr <> NULL`; the resolver collapses this to `IS NOT NULL`.
    pub fn is_not_null(self) -> Expr {
        self.ne(Value::Null)
    }

    /// `expr IN (…)`. An empty list suppresses the whole clause.
    pub fn in_list<T: Into<Value>>(self, values: impl IntoIterator<Item = T>) -> Expr {
        Expr::InList {
            target: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// `expr NOT IN (…)`. An empty list suppresses the whole clause.
    pub fn not_in<T: Into<Value>>(self, values: impl IntoIterator<Item = T>) -> Expr {
        Expr::InList {
            target: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    /// `expr LIKE '%pattern%'`, pattern parameterized.
    pub fn contains(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            target: Box::new(self),
            pattern: pattern.into(),
            kind: LikeKind::Contains,
        }
    }

    /// `expr LIKE 'pattern%'`, pattern parameterized.
    pub fn starts_with(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            target: Box::new(self),
            pattern: pattern.into(),
            kind: LikeKind::StartsWith,
        }
    }

    /// `expr LIKE '%pattern'`, pattern parameterized.
    pub fn ends_with(self, pattern: impl Into<String>) -> Expr {
        Expr::Like {
            target: Box::new(self),
            pattern: pattern.into(),
            kind: LikeKind::EndsWith,
        }
    }

    fn call(self, name: &str, args: Vec<Value>) -> Expr {
        Expr::Call {
            name: name.to_string(),
            target: Box::new(self),
            args,
        }
    }

    /// Substring with a 0-based start offset; dialects convert as needed.
    pub fn substring(self, start: i64, len: i64) -> Expr {
        self.call("Substring", vec![Value::Long(start), Value::Long(len)])
    }

    pub fn to_lower(self) -> Expr {
        self.call("ToLower", vec![])
    }

    pub fn to_upper(self) -> Expr {
        self.call("ToUpper", vec![])
    }

    /// String length.
    pub fn length(self) -> Expr {
        self.call("Length", vec![])
    }

    pub fn replace(self, from: impl Into<String>, to: impl Into<String>) -> Expr {
        self.call("Replace", vec![
            Value::Str(from.into()),
            Value::Str(to.into()),
        ])
    }

    /// Format a datetime column with `YYYY/MM/DD/HH/mm/ss` tokens.
    pub fn format_as(self, format: impl Into<String>) -> Expr {
        self.call("ToString", vec![Value::Str(format.into())])
    }

    pub fn count(self) -> Expr {
        self.call("Count", vec![])
    }

    pub fn sum(self) -> Expr {
        self.call("Sum", vec![])
    }

    pub fn avg(self) -> Expr {
        self.call("Avg", vec![])
    }

    pub fn max(self) -> Expr {
        self.call("Max", vec![])
    }

    pub fn min(self) -> Expr {
        self.call("Min", vec![])
    }

    /// Alias this expression for projection or grouping.
    pub fn alias(self, alias: impl Into<String>) -> Aliased {
        Aliased {
            alias: alias.into(),
            expr: self,
        }
    }
}
