//! Context, repositories, and the unit-of-work contract.
//!
//! The compiler itself is synchronous; everything here is the seam to the
//! asynchronous execution backend. A [`DbContext`] binds one backend, one
//! dialect adapter, and one tenant resolver, hands out typed repositories,
//! and caches CRUD templates per entity type. A [`UnitOfWork`] is a context
//! over a transaction-scoped backend: every repository obtained from it
//! executes against that shared connection/transaction. No internal locking
//! is provided; callers must not issue concurrent statements on one
//! transaction.

use crate::adapter::DbAdapter;
use crate::crud::{CrudTemplates, build_templates, with_table};
use crate::entity::{
    AddFilterContext, DeleteFilterContext, Entity, EntityDescriptor, FilterPhase, FromRow,
    KeyStrategy, Row, UpdateFilterContext, descriptor_of,
};
use crate::error::{RelqError, RelqResult};
use crate::qb::{Query, Statement};
use crate::value::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// The execution backend this toolkit compiles for.
///
/// Implementations run the SQL and materialize rows; they must preserve
/// parameter order and treat each parameter's name as the binding key.
pub trait ExecutionBackend: Send + Sync {
    /// Run a write, returning the affected-row count.
    fn execute(
        &self,
        sql: &str,
        params: &[(String, Value)],
    ) -> impl Future<Output = RelqResult<u64>> + Send;

    /// Run a read, returning all rows.
    fn query(
        &self,
        sql: &str,
        params: &[(String, Value)],
    ) -> impl Future<Output = RelqResult<Vec<Row>>> + Send;

    /// Run a read, returning the first column of the first row.
    fn query_scalar(
        &self,
        sql: &str,
        params: &[(String, Value)],
    ) -> impl Future<Output = RelqResult<Option<Value>>> + Send;
}

/// A backend scoped to one transaction.
pub trait TransactionBackend: ExecutionBackend {
    fn commit(&self) -> impl Future<Output = RelqResult<()>> + Send;
    fn rollback(&self) -> impl Future<Output = RelqResult<()>> + Send;
}

/// Supplies the active tenant id and actor name, read once per
/// predicate resolution.
pub trait TenantResolver: Send + Sync {
    fn tenant_id(&self) -> Option<String>;
    fn actor(&self) -> String;
}

/// Default resolver: no active tenant, `system` actor.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTenant;

impl TenantResolver for NoTenant {
    fn tenant_id(&self) -> Option<String> {
        None
    }

    fn actor(&self) -> String {
        "system".to_string()
    }
}

/// One adapter + backend + tenant binding, with the per-entity template
/// cache.
pub struct DbContext<B> {
    adapter: Arc<dyn DbAdapter>,
    backend: B,
    tenant: Arc<dyn TenantResolver>,
    templates: RwLock<HashMap<TypeId, Arc<CrudTemplates>>>,
}

impl<B: ExecutionBackend> DbContext<B> {
    pub fn new(adapter: Arc<dyn DbAdapter>, backend: B) -> Self {
        Self::with_tenant(adapter, backend, Arc::new(NoTenant))
    }

    pub fn with_tenant(
        adapter: Arc<dyn DbAdapter>,
        backend: B,
        tenant: Arc<dyn TenantResolver>,
    ) -> Self {
        Self {
            adapter,
            backend,
            tenant,
            templates: RwLock::new(HashMap::new()),
        }
    }

    pub fn adapter(&self) -> &Arc<dyn DbAdapter> {
        &self.adapter
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Start a fluent query driving from `T`.
    pub fn query<T: Entity>(&self) -> Query<T> {
        Query::new(Arc::clone(&self.adapter), Arc::clone(&self.tenant))
    }

    /// A typed repository over this context.
    pub fn repository<T: Entity + FromRow>(&self) -> RelqResult<Repository<'_, T, B>> {
        let descriptor = descriptor_of::<T>();
        let templates = self.templates_for::<T>(&descriptor)?;
        Ok(Repository {
            ctx: self,
            descriptor,
            templates,
            _entity: PhantomData,
        })
    }

    /// Run a compiled statement, returning the affected-row count.
    pub async fn execute(&self, stmt: &Statement) -> RelqResult<u64> {
        self.backend.execute(&stmt.sql, &stmt.params).await
    }

    /// Convenience view of [`execute`](Self::execute): `count > 0`.
    pub async fn execute_ok(&self, stmt: &Statement) -> RelqResult<bool> {
        Ok(self.execute(stmt).await? > 0)
    }

    /// Run a compiled statement, returning raw rows.
    pub async fn fetch(&self, stmt: &Statement) -> RelqResult<Vec<Row>> {
        self.backend.query(&stmt.sql, &stmt.params).await
    }

    fn templates_for<T: Entity>(
        &self,
        descriptor: &EntityDescriptor,
    ) -> RelqResult<Arc<CrudTemplates>> {
        if let Some(found) = self.templates.read().unwrap().get(&TypeId::of::<T>()) {
            return Ok(Arc::clone(found));
        }
        let built = Arc::new(build_templates(descriptor, &*self.adapter)?);
        let mut map = self.templates.write().unwrap();
        Ok(Arc::clone(map.entry(TypeId::of::<T>()).or_insert(built)))
    }
}

/// Typed entity operations bound to one context.
pub struct Repository<'a, T, B> {
    ctx: &'a DbContext<B>,
    descriptor: Arc<EntityDescriptor>,
    templates: Arc<CrudTemplates>,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: Entity + FromRow, B: ExecutionBackend> Repository<'a, T, B> {
    pub fn descriptor(&self) -> &EntityDescriptor {
        &self.descriptor
    }

    /// Start a fluent query driving from `T`.
    pub fn query(&self) -> Query<T> {
        self.ctx.query::<T>()
    }

    /// Insert the entity.
    ///
    /// Uuid-keyed entities with an empty key get a client-side v4 key
    /// generated exactly once before the statement is built. Int/Long keys
    /// run the appended identity retrieval and write the scalar back onto
    /// the entity. Zero affected rows or a missing identity is a
    /// `WriteFailed`.
    pub async fn add(&self, entity: &mut T) -> RelqResult<()> {
        if self.descriptor.key.strategy == KeyStrategy::Uuid {
            let missing = match entity.key() {
                Value::Uuid(u) => u.is_nil(),
                Value::Null => true,
                _ => false,
            };
            if missing {
                entity.set_key(Value::Uuid(Uuid::new_v4()));
            }
        }

        let sql = with_table(&self.templates.insert, &*self.ctx.adapter, &self.descriptor.table);
        let values = entity.values();
        let mut params = Vec::with_capacity(self.templates.insert_columns.len());
        for column in &self.templates.insert_columns {
            let value = values
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null);
            params.push((column.clone(), value));
        }

        self.run_add_hooks(&entity.key(), &sql, FilterPhase::Before, None);
        if self.templates.has_identity {
            let scalar = self.ctx.backend.query_scalar(&sql, &params).await?;
            let id = scalar.ok_or_else(|| {
                RelqError::WriteFailed(format!("{}: identity not returned", self.descriptor.table))
            })?;
            entity.set_key(coerce_key(self.descriptor.key.strategy, id));
        } else {
            let affected = self.ctx.backend.execute(&sql, &params).await?;
            if affected == 0 {
                return Err(RelqError::WriteFailed(format!(
                    "{}: insert affected no rows",
                    self.descriptor.table
                )));
            }
        }
        self.run_add_hooks(&entity.key(), &sql, FilterPhase::After, Some(1));
        Ok(())
    }

    /// Update the entity by key. Zero affected rows is a `WriteFailed`.
    pub async fn update(&self, entity: &T) -> RelqResult<()> {
        let key = entity.key();
        self.descriptor.validate_key(&key)?;
        let template = self
            .templates
            .update
            .as_deref()
            .ok_or_else(|| RelqError::MissingPrimaryKey(self.descriptor.table.clone()))?;
        let sql = with_table(template, &*self.ctx.adapter, &self.descriptor.table);

        let values = entity.values();
        let mut params = Vec::with_capacity(self.templates.update_columns.len() + 1);
        for column in &self.templates.update_columns {
            let value = values
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, v)| v.clone())
                .unwrap_or(Value::Null);
            params.push((column.clone(), value));
        }
        params.push((self.descriptor.key.column.clone(), key.clone()));

        self.run_update_hooks(&key, &sql, FilterPhase::Before, None);
        let affected = self.ctx.backend.execute(&sql, &params).await?;
        if affected == 0 {
            return Err(RelqError::WriteFailed(format!(
                "{}: update matched no rows",
                self.descriptor.table
            )));
        }
        self.run_update_hooks(&key, &sql, FilterPhase::After, Some(affected));
        Ok(())
    }

    /// Delete by key. Zero affected rows is a `WriteFailed`.
    pub async fn remove(&self, key: impl Into<Value>) -> RelqResult<()> {
        let key = key.into();
        self.descriptor.validate_key(&key)?;
        let template = self
            .templates
            .delete
            .as_deref()
            .ok_or_else(|| RelqError::MissingPrimaryKey(self.descriptor.table.clone()))?;
        let sql = with_table(template, &*self.ctx.adapter, &self.descriptor.table);
        let params = vec![(self.descriptor.key.column.clone(), key.clone())];

        self.run_delete_hooks(&key, &sql, FilterPhase::Before, None);
        let affected = self.ctx.backend.execute(&sql, &params).await?;
        if affected == 0 {
            return Err(RelqError::WriteFailed(format!(
                "{}: delete matched no rows",
                self.descriptor.table
            )));
        }
        self.run_delete_hooks(&key, &sql, FilterPhase::After, Some(affected));
        Ok(())
    }

    /// Logically delete by key, stamping deleted-by/deleted-at.
    pub async fn soft_remove(&self, key: impl Into<Value>) -> RelqResult<()> {
        let key = key.into();
        self.descriptor.validate_key(&key)?;
        let sd = self.descriptor.soft_delete.clone().ok_or_else(|| {
            RelqError::unsupported(format!(
                "entity '{}' has no soft-delete columns",
                self.descriptor.table
            ))
        })?;
        let template = self
            .templates
            .soft_delete
            .as_deref()
            .ok_or_else(|| RelqError::MissingPrimaryKey(self.descriptor.table.clone()))?;
        let sql = with_table(template, &*self.ctx.adapter, &self.descriptor.table);
        let params = vec![
            (sd.by, Value::Str(self.ctx.tenant.actor())),
            (sd.at, Value::DateTime(chrono::Local::now().naive_local())),
            (self.descriptor.key.column.clone(), key.clone()),
        ];

        self.run_delete_hooks(&key, &sql, FilterPhase::Before, None);
        let affected = self.ctx.backend.execute(&sql, &params).await?;
        if affected == 0 {
            return Err(RelqError::WriteFailed(format!(
                "{}: soft delete matched no rows",
                self.descriptor.table
            )));
        }
        self.run_delete_hooks(&key, &sql, FilterPhase::After, Some(affected));
        Ok(())
    }

    /// Fetch by key. A missing row is `Ok(None)`, not an error.
    pub async fn get(&self, key: impl Into<Value>) -> RelqResult<Option<T>> {
        self.get_with(key, self.templates.get.as_deref()).await
    }

    /// Fetch by key holding a row lock.
    pub async fn get_locked(&self, key: impl Into<Value>) -> RelqResult<Option<T>> {
        self.get_with(key, self.templates.get_locked.as_deref()).await
    }

    /// Fetch by key without taking shared locks.
    pub async fn get_nolock(&self, key: impl Into<Value>) -> RelqResult<Option<T>> {
        self.get_with(key, self.templates.get_nolock.as_deref()).await
    }

    async fn get_with(
        &self,
        key: impl Into<Value>,
        template: Option<&str>,
    ) -> RelqResult<Option<T>> {
        let key = key.into();
        self.descriptor.validate_key(&key)?;
        let template =
            template.ok_or_else(|| RelqError::MissingPrimaryKey(self.descriptor.table.clone()))?;
        let sql = with_table(template, &*self.ctx.adapter, &self.descriptor.table);
        let params = vec![(self.descriptor.key.column.clone(), key)];
        let rows = self.ctx.backend.query(&sql, &params).await?;
        rows.first().map(T::from_row).transpose()
    }

    /// Probe existence by key.
    pub async fn exists(&self, key: impl Into<Value>) -> RelqResult<bool> {
        let key = key.into();
        self.descriptor.validate_key(&key)?;
        let template = self
            .templates
            .exists
            .as_deref()
            .ok_or_else(|| RelqError::MissingPrimaryKey(self.descriptor.table.clone()))?;
        let sql = with_table(template, &*self.ctx.adapter, &self.descriptor.table);
        let params = vec![(self.descriptor.key.column.clone(), key)];
        Ok(self.ctx.backend.query_scalar(&sql, &params).await?.is_some())
    }

    /// Run the query's list form and materialize entities.
    pub async fn find(&self, query: &Query<T>) -> RelqResult<Vec<T>> {
        let stmt = query.to_list_sql()?;
        let rows = self.ctx.fetch(&stmt).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Run the query's first-row form.
    pub async fn find_first(&self, query: &Query<T>) -> RelqResult<Option<T>> {
        let stmt = query.to_first_sql()?;
        let rows = self.ctx.fetch(&stmt).await?;
        rows.first().map(T::from_row).transpose()
    }

    /// Run the query's paged form.
    pub async fn find_page(&self, query: &Query<T>) -> RelqResult<Vec<T>> {
        let stmt = query.to_page_sql()?;
        let rows = self.ctx.fetch(&stmt).await?;
        rows.iter().map(T::from_row).collect()
    }

    /// Run the query's COUNT form.
    pub async fn count(&self, query: &Query<T>) -> RelqResult<i64> {
        let stmt = query.to_count_sql()?;
        match self.ctx.backend.query_scalar(&stmt.sql, &stmt.params).await? {
            Some(Value::Long(n)) => Ok(n),
            Some(Value::Int(n)) => Ok(i64::from(n)),
            Some(other) => Err(RelqError::decode("COUNT(*)", format!("{other:?}"))),
            None => Ok(0),
        }
    }

    fn run_add_hooks(&self, key: &Value, sql: &str, phase: FilterPhase, affected: Option<u64>) {
        self.descriptor.filters().run_add(&AddFilterContext {
            descriptor: &self.descriptor,
            key,
            sql,
            phase,
            affected,
        });
    }

    fn run_update_hooks(&self, key: &Value, sql: &str, phase: FilterPhase, affected: Option<u64>) {
        self.descriptor.filters().run_update(&UpdateFilterContext {
            descriptor: &self.descriptor,
            key,
            sql,
            phase,
            affected,
        });
    }

    fn run_delete_hooks(&self, key: &Value, sql: &str, phase: FilterPhase, affected: Option<u64>) {
        self.descriptor.filters().run_delete(&DeleteFilterContext {
            descriptor: &self.descriptor,
            key,
            sql,
            phase,
            affected,
        });
    }
}

fn coerce_key(strategy: KeyStrategy, value: Value) -> Value {
    match (strategy, value) {
        (KeyStrategy::Int, Value::Long(n)) => Value::Int(n as i32),
        (KeyStrategy::Long, Value::Int(n)) => Value::Long(i64::from(n)),
        (_, value) => value,
    }
}

/// One transaction-bound context.
///
/// Repositories obtained here share the wrapped backend's connection and
/// transaction.
pub struct UnitOfWork<B: TransactionBackend> {
    ctx: DbContext<B>,
}

impl<B: TransactionBackend> UnitOfWork<B> {
    pub fn new(adapter: Arc<dyn DbAdapter>, backend: B) -> Self {
        Self {
            ctx: DbContext::new(adapter, backend),
        }
    }

    pub fn with_tenant(
        adapter: Arc<dyn DbAdapter>,
        backend: B,
        tenant: Arc<dyn TenantResolver>,
    ) -> Self {
        Self {
            ctx: DbContext::with_tenant(adapter, backend, tenant),
        }
    }

    pub fn context(&self) -> &DbContext<B> {
        &self.ctx
    }

    pub fn repository<T: Entity + FromRow>(&self) -> RelqResult<Repository<'_, T, B>> {
        self.ctx.repository::<T>()
    }

    pub async fn commit(&self) -> RelqResult<()> {
        self.ctx.backend.commit().await
    }

    pub async fn rollback(&self) -> RelqResult<()> {
        self.ctx.backend.rollback().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MySqlAdapter;
    use crate::entity::{ColumnDescriptor, EntityMeta, RowExt};
    use crate::value::ValueKind;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeBackend {
        log: Mutex<Vec<(String, Vec<(String, Value)>)>>,
        execute_result: u64,
        scalar: Option<Value>,
        rows: Vec<Row>,
        committed: AtomicBool,
    }

    impl FakeBackend {
        fn returning_rows(rows: Vec<Row>) -> Self {
            Self {
                execute_result: 1,
                rows,
                ..Self::default()
            }
        }

        fn returning_scalar(scalar: Value) -> Self {
            Self {
                execute_result: 1,
                scalar: Some(scalar),
                ..Self::default()
            }
        }

        fn affecting(rows: u64) -> Self {
            Self {
                execute_result: rows,
                ..Self::default()
            }
        }

        fn logged(&self) -> Vec<(String, Vec<(String, Value)>)> {
            self.log.lock().unwrap().clone()
        }
    }

    impl ExecutionBackend for FakeBackend {
        fn execute(
            &self,
            sql: &str,
            params: &[(String, Value)],
        ) -> impl Future<Output = RelqResult<u64>> + Send {
            let entry = (sql.to_string(), params.to_vec());
            async move {
                self.log.lock().unwrap().push(entry);
                Ok(self.execute_result)
            }
        }

        fn query(
            &self,
            sql: &str,
            params: &[(String, Value)],
        ) -> impl Future<Output = RelqResult<Vec<Row>>> + Send {
            let entry = (sql.to_string(), params.to_vec());
            async move {
                self.log.lock().unwrap().push(entry);
                Ok(self.rows.clone())
            }
        }

        fn query_scalar(
            &self,
            sql: &str,
            params: &[(String, Value)],
        ) -> impl Future<Output = RelqResult<Option<Value>>> + Send {
            let entry = (sql.to_string(), params.to_vec());
            async move {
                self.log.lock().unwrap().push(entry);
                Ok(self.scalar.clone())
            }
        }
    }

    impl TransactionBackend for FakeBackend {
        fn commit(&self) -> impl Future<Output = RelqResult<()>> + Send {
            async {
                self.committed.store(true, Ordering::SeqCst);
                Ok(())
            }
        }

        fn rollback(&self) -> impl Future<Output = RelqResult<()>> + Send {
            async { Ok(()) }
        }
    }

    struct Note {
        id: i64,
        title: String,
    }

    impl Entity for Note {
        fn meta() -> EntityMeta {
            EntityMeta::new("Note")
                .column(ColumnDescriptor::new("Id", ValueKind::Long))
                .column(ColumnDescriptor::new("Title", ValueKind::Str).length(100))
                .key(KeyStrategy::Long, "Id")
        }

        fn values(&self) -> Vec<(String, Value)> {
            vec![
                ("Id".to_string(), Value::Long(self.id)),
                ("Title".to_string(), Value::Str(self.title.clone())),
            ]
        }

        fn key(&self) -> Value {
            Value::Long(self.id)
        }

        fn set_key(&mut self, key: Value) {
            if let Value::Long(n) = key {
                self.id = n;
            }
        }
    }

    impl FromRow for Note {
        fn from_row(row: &Row) -> RelqResult<Self> {
            Ok(Self {
                id: row.long("Id")?,
                title: row.string("Title")?,
            })
        }
    }

    struct Label {
        id: Uuid,
        name: String,
    }

    impl Entity for Label {
        fn meta() -> EntityMeta {
            EntityMeta::new("Label")
                .column(ColumnDescriptor::new("Id", ValueKind::Uuid))
                .column(ColumnDescriptor::new("Name", ValueKind::Str).length(50))
                .key(KeyStrategy::Uuid, "Id")
        }

        fn values(&self) -> Vec<(String, Value)> {
            vec![
                ("Id".to_string(), Value::Uuid(self.id)),
                ("Name".to_string(), Value::Str(self.name.clone())),
            ]
        }

        fn key(&self) -> Value {
            Value::Uuid(self.id)
        }

        fn set_key(&mut self, key: Value) {
            if let Value::Uuid(u) = key {
                self.id = u;
            }
        }
    }

    impl FromRow for Label {
        fn from_row(row: &Row) -> RelqResult<Self> {
            Ok(Self {
                id: row.uuid("Id")?,
                name: row.string("Name")?,
            })
        }
    }

    fn context(backend: FakeBackend) -> DbContext<FakeBackend> {
        DbContext::new(Arc::new(MySqlAdapter), backend)
    }

    #[tokio::test]
    async fn test_add_runs_identity_retrieval_and_writes_key_back() {
        let ctx = context(FakeBackend::returning_scalar(Value::Long(42)));
        let repo = ctx.repository::<Note>().unwrap();
        let mut note = Note {
            id: 0,
            title: "hello".to_string(),
        };
        repo.add(&mut note).await.unwrap();
        assert_eq!(note.id, 42);

        let log = ctx.backend().logged();
        assert_eq!(log.len(), 1);
        let (sql, params) = &log[0];
        assert_eq!(
            sql,
            "INSERT INTO `Note` (`Title`) VALUES (@Title);SELECT LAST_INSERT_ID();"
        );
        assert_eq!(params, &vec![("Title".to_string(), Value::Str("hello".to_string()))]);
    }

    struct Hooked {
        id: i64,
        tag: String,
    }

    impl Entity for Hooked {
        fn meta() -> EntityMeta {
            EntityMeta::new("Hooked")
                .column(ColumnDescriptor::new("Id", ValueKind::Long))
                .column(ColumnDescriptor::new("Tag", ValueKind::Str).length(20))
                .key(KeyStrategy::Long, "Id")
                .on_add(|cx| {
                    if cx.phase == FilterPhase::Before {
                        HOOKED_BEFORE.fetch_add(1, Ordering::SeqCst);
                    } else {
                        HOOKED_AFTER.fetch_add(1, Ordering::SeqCst);
                    }
                })
        }

        fn values(&self) -> Vec<(String, Value)> {
            vec![
                ("Id".to_string(), Value::Long(self.id)),
                ("Tag".to_string(), Value::Str(self.tag.clone())),
            ]
        }

        fn key(&self) -> Value {
            Value::Long(self.id)
        }

        fn set_key(&mut self, key: Value) {
            if let Value::Long(n) = key {
                self.id = n;
            }
        }
    }

    impl FromRow for Hooked {
        fn from_row(row: &Row) -> RelqResult<Self> {
            Ok(Self {
                id: row.long("Id")?,
                tag: row.string("Tag")?,
            })
        }
    }

    static HOOKED_BEFORE: AtomicUsize = AtomicUsize::new(0);
    static HOOKED_AFTER: AtomicUsize = AtomicUsize::new(0);

    #[tokio::test]
    async fn test_add_hooks_run_before_and_after() {
        let ctx = context(FakeBackend::returning_scalar(Value::Long(7)));
        let repo = ctx.repository::<Hooked>().unwrap();
        let mut entity = Hooked {
            id: 0,
            tag: "audit".to_string(),
        };
        repo.add(&mut entity).await.unwrap();
        assert_eq!(HOOKED_BEFORE.load(Ordering::SeqCst), 1);
        assert_eq!(HOOKED_AFTER.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_add_without_identity_is_write_failed() {
        let ctx = context(FakeBackend::affecting(1));
        let repo = ctx.repository::<Note>().unwrap();
        let mut note = Note {
            id: 0,
            title: "x".to_string(),
        };
        let err = repo.add(&mut note).await.unwrap_err();
        assert!(err.is_write_failed());
    }

    #[tokio::test]
    async fn test_add_generates_uuid_key_exactly_once() {
        let ctx = context(FakeBackend::affecting(1));
        let repo = ctx.repository::<Label>().unwrap();
        let mut label = Label {
            id: Uuid::nil(),
            name: "blue".to_string(),
        };
        repo.add(&mut label).await.unwrap();
        assert!(!label.id.is_nil());

        // the generated key was bound into the insert parameters
        let log = ctx.backend().logged();
        assert_eq!(log[0].1[0], ("Id".to_string(), Value::Uuid(label.id)));

        // a present key is kept, not regenerated
        let kept = label.id;
        repo.add(&mut label).await.unwrap();
        assert_eq!(label.id, kept);
    }

    #[tokio::test]
    async fn test_update_with_invalid_key_fails_before_sql() {
        let ctx = context(FakeBackend::affecting(1));
        let repo = ctx.repository::<Note>().unwrap();
        let note = Note {
            id: 0,
            title: "x".to_string(),
        };
        let err = repo.update(&note).await.unwrap_err();
        assert!(matches!(err, RelqError::InvalidKey(_)));
        assert!(ctx.backend().logged().is_empty());
    }

    #[tokio::test]
    async fn test_update_with_zero_rows_is_write_failed() {
        let ctx = context(FakeBackend::affecting(0));
        let repo = ctx.repository::<Note>().unwrap();
        let note = Note {
            id: 5,
            title: "x".to_string(),
        };
        let err = repo.update(&note).await.unwrap_err();
        assert!(err.is_write_failed());
    }

    #[tokio::test]
    async fn test_get_missing_row_is_none_not_an_error() {
        let ctx = context(FakeBackend::returning_rows(vec![]));
        let repo = ctx.repository::<Note>().unwrap();
        assert!(repo.get(5i64).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_materializes_through_from_row() {
        let row: Row = vec![
            ("Id".to_string(), Value::Long(5)),
            ("Title".to_string(), Value::Str("found".to_string())),
        ];
        let ctx = context(FakeBackend::returning_rows(vec![row]));
        let repo = ctx.repository::<Note>().unwrap();
        let note = repo.get(5i64).await.unwrap().unwrap();
        assert_eq!(note.id, 5);
        assert_eq!(note.title, "found");
    }

    #[tokio::test]
    async fn test_exists_probes_scalar() {
        let ctx = context(FakeBackend::returning_scalar(Value::Int(1)));
        let repo = ctx.repository::<Note>().unwrap();
        assert!(repo.exists(5i64).await.unwrap());

        let ctx = context(FakeBackend::affecting(0));
        let repo = ctx.repository::<Note>().unwrap();
        assert!(!repo.exists(5i64).await.unwrap());
    }

    #[tokio::test]
    async fn test_unit_of_work_shares_backend_and_commits() {
        let uow = UnitOfWork::new(Arc::new(MySqlAdapter), FakeBackend::affecting(1));
        let repo = uow.repository::<Note>().unwrap();
        repo.remove(9i64).await.unwrap();
        uow.commit().await.unwrap();
        assert!(uow.context().backend().committed.load(Ordering::SeqCst));
        let log = uow.context().backend().logged();
        assert_eq!(log[0].0, "DELETE FROM `Note` WHERE `Id` = @Id");
    }
}
