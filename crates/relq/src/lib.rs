//! # relq
//!
//! A dialect-aware relational query compiler: entities map to tables, a
//! fluent builder assembles typed queries, and stateless builders compile
//! them into parameterized SQL for the active dialect.
//!
//! ## Features
//!
//! - **Typed expression AST**: predicates and projections are tagged-union
//!   trees built by the fluent API, compiled by an exhaustive visitor — an
//!   unrecognized shape is a loud error, never silently dropped SQL
//! - **Dialect adapters**: quoting, parameters, function mapping, column
//!   typing, and row-limiting templates per dialect (MySQL, SQL Server with
//!   version-switched paging, PostgreSQL)
//! - **Automatic filters**: soft-delete and tenant predicates folded into
//!   WHERE (driving table) or inner-join ON clauses, individually togglable
//! - **Precompiled CRUD**: per-entity INSERT/UPDATE/DELETE/GET templates
//!   with a table-name hole for physical-table redirection
//! - **Execution seam**: compilation produces `(sql, ordered parameters)`;
//!   running them is the backend trait's concern
//!
//! ## Query builder
//!
//! ```ignore
//! use relq::prelude::*;
//!
//! let stmt = ctx
//!     .query::<Article>()
//!     .filter(col("Title").contains("rust").and(col("Hits").gt(10)))
//!     .order_by_desc(col("Id"))
//!     .skip(20)
//!     .take(10)
//!     .to_page_sql()?;
//!
//! // entity CRUD through a repository
//! let repo = ctx.repository::<Article>()?;
//! repo.add(&mut article).await?;
//! let found = repo.get(42i64).await?;
//! ```

pub mod adapter;
pub mod context;
pub mod crud;
pub mod entity;
pub mod error;
pub mod expr;
pub mod prelude;
pub mod qb;
pub mod resolver;
pub mod value;

pub use adapter::{
    ColumnHints, ColumnType, DbAdapter, MySqlAdapter, PostgresAdapter, SqlServerAdapter,
    StatementParts,
};
pub use context::{
    DbContext, ExecutionBackend, NoTenant, Repository, TenantResolver, TransactionBackend,
    UnitOfWork,
};
pub use crud::{CrudTemplates, TABLE_HOLE, build_templates, with_table};
pub use entity::{
    AddFilterContext, ColumnDescriptor, DeleteFilterContext, Entity, EntityDescriptor, EntityMeta,
    FilterEngine, FilterPhase, FromRow, KeyStrategy, PrimaryKey, Row, RowExt, SoftDeleteColumns,
    UpdateFilterContext, descriptor_of,
};
pub use error::{RelqError, RelqResult};
pub use expr::{Aliased, BinOp, Expr, IntoExpr, LikeKind, col, entity_ref, key_ref, raw, tcol, val};
pub use qb::{
    Query, QueryBody, QueryJoin, QuerySelect, QuerySort, QueryWhere, SetValue, Statement, set,
    set_expr, set_raw,
};
pub use resolver::Resolver;
pub use value::{Value, ValueKind};
