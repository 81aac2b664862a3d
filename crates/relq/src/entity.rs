//! Entity and column descriptors.
//!
//! Descriptors are static per-entity-type metadata: table name, ordered
//! columns, primary-key strategy, soft-delete/tenant opt-ins, and the
//! ordered filter hooks. They are built once per type on first use and
//! cached for the process lifetime, keyed by `TypeId`.

use crate::adapter::ColumnHints;
use crate::error::{RelqError, RelqResult};
use crate::value::{Value, ValueKind};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use uuid::Uuid;

/// Primary-key strategy; drives the shape of INSERT/UPDATE/GET templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// No usable key; key-dependent operations fail with `MissingPrimaryKey`.
    None,
    /// Auto-increment 32-bit integer.
    Int,
    /// Auto-increment 64-bit integer.
    Long,
    /// Client-generated UUID.
    Uuid,
    /// Caller-assigned string key.
    Str,
}

/// Primary-key descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKey {
    pub strategy: KeyStrategy,
    pub column: String,
}

impl PrimaryKey {
    /// Whether the database generates this key (identity retrieval applies).
    pub fn is_identity(&self) -> bool {
        matches!(self.strategy, KeyStrategy::Int | KeyStrategy::Long)
    }
}

/// Per-column metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub hints: ColumnHints,
    pub is_primary_key: bool,
}

impl ColumnDescriptor {
    /// A column named after its field, with the given value kind.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            hints: ColumnHints::new(kind),
            is_primary_key: false,
        }
    }

    /// Override the column name.
    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// String length hint; 0 keeps the column unbounded.
    pub fn length(mut self, length: u32) -> Self {
        self.hints.length = length;
        self
    }

    /// Decimal precision/scale hint.
    pub fn precision(mut self, precision: u8, scale: u8) -> Self {
        self.hints.precision = precision;
        self.hints.scale = scale;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.hints.nullable = true;
        self
    }
}

/// Column names backing soft deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftDeleteColumns {
    pub flag: String,
    pub by: String,
    pub at: String,
}

impl Default for SoftDeleteColumns {
    fn default() -> Self {
        Self {
            flag: "Deleted".to_string(),
            by: "DeletedBy".to_string(),
            at: "DeletedAt".to_string(),
        }
    }
}

/// Hook phase: before the statement runs, or after it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterPhase {
    Before,
    After,
}

/// Context handed to add hooks.
pub struct AddFilterContext<'a> {
    pub descriptor: &'a EntityDescriptor,
    pub key: &'a Value,
    pub sql: &'a str,
    pub phase: FilterPhase,
    /// Affected row count; present in the `After` phase.
    pub affected: Option<u64>,
}

/// Context handed to update hooks.
pub struct UpdateFilterContext<'a> {
    pub descriptor: &'a EntityDescriptor,
    pub key: &'a Value,
    pub sql: &'a str,
    pub phase: FilterPhase,
    pub affected: Option<u64>,
}

/// Context handed to delete hooks.
pub struct DeleteFilterContext<'a> {
    pub descriptor: &'a EntityDescriptor,
    pub key: &'a Value,
    pub sql: &'a str,
    pub phase: FilterPhase,
    pub affected: Option<u64>,
}

type AddHook = Arc<dyn Fn(&AddFilterContext<'_>) + Send + Sync>;
type UpdateHook = Arc<dyn Fn(&UpdateFilterContext<'_>) + Send + Sync>;
type DeleteHook = Arc<dyn Fn(&DeleteFilterContext<'_>) + Send + Sync>;

/// Ordered add/update/delete hooks run around entity writes.
#[derive(Clone, Default)]
pub struct FilterEngine {
    add: Vec<AddHook>,
    update: Vec<UpdateHook>,
    delete: Vec<DeleteHook>,
}

impl FilterEngine {
    pub(crate) fn run_add(&self, cx: &AddFilterContext<'_>) {
        for hook in &self.add {
            hook(cx);
        }
    }

    pub(crate) fn run_update(&self, cx: &UpdateFilterContext<'_>) {
        for hook in &self.update {
            hook(cx);
        }
    }

    pub(crate) fn run_delete(&self, cx: &DeleteFilterContext<'_>) {
        for hook in &self.delete {
            hook(cx);
        }
    }
}

impl std::fmt::Debug for FilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterEngine")
            .field("add", &self.add.len())
            .field("update", &self.update.len())
            .field("delete", &self.delete.len())
            .finish()
    }
}

/// Builder for an entity's descriptor, returned by [`Entity::meta`].
#[derive(Debug, Clone, Default)]
pub struct EntityMeta {
    table: String,
    columns: Vec<ColumnDescriptor>,
    key: Option<PrimaryKey>,
    soft_delete: Option<SoftDeleteColumns>,
    tenant: Option<String>,
    filters: FilterEngine,
}

impl EntityMeta {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Append a column. Columns keep their declaration order.
    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Declare the primary key. The named column is flagged as well.
    pub fn key(mut self, strategy: KeyStrategy, column: impl Into<String>) -> Self {
        let column = column.into();
        for c in &mut self.columns {
            if c.name == column {
                c.is_primary_key = true;
            }
        }
        self.key = Some(PrimaryKey { strategy, column });
        self
    }

    /// Opt into soft deletion with the default column names.
    pub fn soft_delete(mut self) -> Self {
        self.soft_delete = Some(SoftDeleteColumns::default());
        self
    }

    /// Opt into soft deletion with explicit column names.
    pub fn soft_delete_columns(
        mut self,
        flag: impl Into<String>,
        by: impl Into<String>,
        at: impl Into<String>,
    ) -> Self {
        self.soft_delete = Some(SoftDeleteColumns {
            flag: flag.into(),
            by: by.into(),
            at: at.into(),
        });
        self
    }

    /// Opt into tenant filtering on the given column.
    pub fn tenant(mut self, column: impl Into<String>) -> Self {
        self.tenant = Some(column.into());
        self
    }

    /// Register an add hook; hooks run in registration order.
    pub fn on_add(mut self, hook: impl Fn(&AddFilterContext<'_>) + Send + Sync + 'static) -> Self {
        self.filters.add.push(Arc::new(hook));
        self
    }

    /// Register an update hook.
    pub fn on_update(
        mut self,
        hook: impl Fn(&UpdateFilterContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.filters.update.push(Arc::new(hook));
        self
    }

    /// Register a delete hook.
    pub fn on_delete(
        mut self,
        hook: impl Fn(&DeleteFilterContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.filters.delete.push(Arc::new(hook));
        self
    }

    fn build(self) -> EntityDescriptor {
        EntityDescriptor {
            table: self.table,
            columns: self.columns,
            key: self.key.unwrap_or(PrimaryKey {
                strategy: KeyStrategy::None,
                column: String::new(),
            }),
            soft_delete: self.soft_delete,
            tenant: self.tenant,
            filters: self.filters,
        }
    }
}

/// Frozen per-entity-type metadata.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    pub table: String,
    pub columns: Vec<ColumnDescriptor>,
    pub key: PrimaryKey,
    pub soft_delete: Option<SoftDeleteColumns>,
    pub tenant: Option<String>,
    filters: FilterEngine,
}

impl EntityDescriptor {
    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The key column name, or `MissingPrimaryKey`.
    pub fn key_column(&self) -> RelqResult<&str> {
        match self.key.strategy {
            KeyStrategy::None => Err(RelqError::MissingPrimaryKey(self.table.clone())),
            _ => Ok(&self.key.column),
        }
    }

    pub fn filters(&self) -> &FilterEngine {
        &self.filters
    }

    /// Reject unusable key values before any SQL is built.
    pub fn validate_key(&self, key: &Value) -> RelqResult<()> {
        let ok = match (self.key.strategy, key) {
            (KeyStrategy::None, _) => {
                return Err(RelqError::MissingPrimaryKey(self.table.clone()));
            }
            (KeyStrategy::Int, Value::Int(n)) => *n > 0,
            (KeyStrategy::Int, Value::Long(n)) | (KeyStrategy::Long, Value::Long(n)) => *n > 0,
            (KeyStrategy::Long, Value::Int(n)) => *n > 0,
            (KeyStrategy::Uuid, Value::Uuid(u)) => !u.is_nil(),
            (KeyStrategy::Str, Value::Str(s)) => !s.is_empty(),
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(RelqError::InvalidKey(format!(
                "{}.{}: {key:?}",
                self.table, self.key.column
            )))
        }
    }
}

/// A mapped entity type.
pub trait Entity: Send + Sync + 'static {
    /// Describe the table this type maps to. Called once per process; the
    /// result is frozen and cached.
    fn meta() -> EntityMeta
    where
        Self: Sized;

    /// Current column values, in descriptor column order.
    fn values(&self) -> Vec<(String, Value)>;

    /// Current primary-key value.
    fn key(&self) -> Value;

    /// Write a generated key back onto the entity.
    fn set_key(&mut self, key: Value);
}

/// A row as returned by the execution backend: ordered `(column, value)`.
pub type Row = Vec<(String, Value)>;

/// Materialize an entity from a backend row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> RelqResult<Self>;
}

/// Typed accessors over a backend [`Row`].
pub trait RowExt {
    fn value(&self, name: &str) -> RelqResult<&Value>;
    fn long(&self, name: &str) -> RelqResult<i64>;
    fn string(&self, name: &str) -> RelqResult<String>;
    fn boolean(&self, name: &str) -> RelqResult<bool>;
    fn uuid(&self, name: &str) -> RelqResult<Uuid>;
}

impl RowExt for Row {
    fn value(&self, name: &str) -> RelqResult<&Value> {
        self.iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| RelqError::decode(name, "column missing from row"))
    }

    fn long(&self, name: &str) -> RelqResult<i64> {
        match self.value(name)? {
            Value::Int(n) => Ok(i64::from(*n)),
            Value::Long(n) => Ok(*n),
            other => Err(RelqError::decode(name, format!("expected integer, got {other:?}"))),
        }
    }

    fn string(&self, name: &str) -> RelqResult<String> {
        match self.value(name)? {
            Value::Str(s) => Ok(s.clone()),
            other => Err(RelqError::decode(name, format!("expected string, got {other:?}"))),
        }
    }

    fn boolean(&self, name: &str) -> RelqResult<bool> {
        match self.value(name)? {
            Value::Bool(b) => Ok(*b),
            Value::Int(n) => Ok(*n != 0),
            Value::Long(n) => Ok(*n != 0),
            other => Err(RelqError::decode(name, format!("expected boolean, got {other:?}"))),
        }
    }

    fn uuid(&self, name: &str) -> RelqResult<Uuid> {
        match self.value(name)? {
            Value::Uuid(u) => Ok(*u),
            Value::Str(s) => Uuid::parse_str(s).map_err(|e| RelqError::decode(name, e.to_string())),
            other => Err(RelqError::decode(name, format!("expected uuid, got {other:?}"))),
        }
    }
}

static REGISTRY: OnceLock<RwLock<HashMap<TypeId, Arc<EntityDescriptor>>>> = OnceLock::new();

/// The cached descriptor for `T`, building it on first use.
///
/// The write path double-checks under the lock so two threads racing on the
/// first build still observe a single shared descriptor.
pub fn descriptor_of<T: Entity>() -> Arc<EntityDescriptor> {
    let registry = REGISTRY.get_or_init(|| RwLock::new(HashMap::new()));
    if let Some(found) = registry.read().unwrap().get(&TypeId::of::<T>()) {
        return Arc::clone(found);
    }
    let mut map = registry.write().unwrap();
    Arc::clone(
        map.entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(T::meta().build())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gadget;

    impl Entity for Gadget {
        fn meta() -> EntityMeta {
            EntityMeta::new("Gadget")
                .column(ColumnDescriptor::new("Id", ValueKind::Long))
                .column(ColumnDescriptor::new("Name", ValueKind::Str).length(50))
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

    #[test]
    fn test_descriptor_cached_per_type() {
        let a = descriptor_of::<Gadget>();
        let b = descriptor_of::<Gadget>();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.table, "Gadget");
        assert!(a.column("Id").is_some_and(|c| c.is_primary_key));
    }

    #[test]
    fn test_key_validation() {
        let desc = descriptor_of::<Gadget>();
        assert!(desc.validate_key(&Value::Long(1)).is_ok());
        assert!(matches!(
            desc.validate_key(&Value::Long(0)),
            Err(RelqError::InvalidKey(_))
        ));
        assert!(matches!(
            desc.validate_key(&Value::Str("x".into())),
            Err(RelqError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_soft_delete_defaults() {
        let desc = descriptor_of::<Gadget>();
        let sd = desc.soft_delete.as_ref().unwrap();
        assert_eq!(sd.flag, "Deleted");
    }
}
