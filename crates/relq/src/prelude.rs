//! Convenient imports for typical `relq` usage.
//!
//! This module is intentionally small and focused on the most common APIs so
//! examples can start with:
//!
//! ```ignore
//! use relq::prelude::*;
//! ```

pub use crate::{
    ColumnDescriptor, DbContext, Entity, EntityMeta, FromRow, KeyStrategy, Query, RelqError,
    RelqResult, Row, RowExt, Statement, UnitOfWork, Value, ValueKind,
};

pub use crate::{col, entity_ref, key_ref, raw, set, set_expr, tcol, val};

pub use crate::{MySqlAdapter, PostgresAdapter, SqlServerAdapter};
