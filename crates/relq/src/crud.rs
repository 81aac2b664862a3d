//! Precompiled per-entity CRUD SQL templates.
//!
//! Built once per (entity, adapter) at first use and cached by the owning
//! context. Every template carries a `{0}` table-name hole so a caller can
//! redirect a statement to a differently named physical table without
//! rebuilding the whole template.

use crate::adapter::DbAdapter;
use crate::entity::EntityDescriptor;
use crate::error::RelqResult;

/// The table-name hole embedded in every template.
pub const TABLE_HOLE: &str = "{0}";

/// Precompiled statement templates for one entity.
///
/// Key-dependent templates are `None` on keyless entities; using one then
/// surfaces as `MissingPrimaryKey` at the repository layer.
#[derive(Debug, Clone)]
pub struct CrudTemplates {
    pub insert: String,
    /// Column order matching the insert placeholders.
    pub insert_columns: Vec<String>,
    /// Whether the insert carries an appended identity-retrieval statement.
    pub has_identity: bool,
    pub update: Option<String>,
    /// Non-key columns in SET order.
    pub update_columns: Vec<String>,
    pub delete: Option<String>,
    pub soft_delete: Option<String>,
    pub get: Option<String>,
    pub get_locked: Option<String>,
    pub get_nolock: Option<String>,
    pub exists: Option<String>,
}

/// Substitute the table hole, quoting the physical table name.
pub fn with_table(template: &str, adapter: &dyn DbAdapter, table: &str) -> String {
    template.replace(TABLE_HOLE, &adapter.quote(table))
}

/// Precompute all templates for an entity under one dialect.
pub fn build_templates(
    descriptor: &EntityDescriptor,
    adapter: &dyn DbAdapter,
) -> RelqResult<CrudTemplates> {
    let hole = TABLE_HOLE;
    let key = &descriptor.key;
    let identity = key.is_identity();

    // INSERT skips database-generated key columns
    let insert_columns: Vec<String> = descriptor
        .columns
        .iter()
        .filter(|c| !(identity && c.name == key.column))
        .map(|c| c.name.clone())
        .collect();
    let column_list: Vec<String> = insert_columns
        .iter()
        .map(|c| adapter.quote(c))
        .collect();
    let placeholders: Vec<String> = insert_columns
        .iter()
        .map(|c| adapter.parameter(c))
        .collect();
    let mut insert = format!(
        "INSERT INTO {hole} ({}) VALUES ({})",
        column_list.join(","),
        placeholders.join(",")
    );
    let has_identity = identity && !adapter.identity_sql().is_empty();
    if has_identity {
        insert.push(';');
        insert.push_str(adapter.identity_sql());
    }

    let keyed = descriptor.key_column().ok().map(str::to_string);
    let (update, update_columns, delete, soft_delete, get, get_locked, get_nolock, exists) =
        match keyed {
            Some(key_column) => {
                let key_where = format!(
                    "{} = {}",
                    adapter.quote(&key_column),
                    adapter.parameter(&key_column)
                );

                let update_columns: Vec<String> = descriptor
                    .columns
                    .iter()
                    .filter(|c| c.name != key_column)
                    .map(|c| c.name.clone())
                    .collect();
                let assignments: Vec<String> = update_columns
                    .iter()
                    .map(|c| format!("{} = {}", adapter.quote(c), adapter.parameter(c)))
                    .collect();
                let update = format!(
                    "UPDATE {hole} SET {} WHERE {key_where}",
                    assignments.join(",")
                );

                let delete = format!("DELETE FROM {hole} WHERE {key_where}");

                let soft_delete = descriptor.soft_delete.as_ref().map(|sd| {
                    format!(
                        "UPDATE {hole} SET {} = {},{} = {},{} = {} WHERE {key_where}",
                        adapter.quote(&sd.flag),
                        adapter.true_literal(),
                        adapter.quote(&sd.by),
                        adapter.parameter(&sd.by),
                        adapter.quote(&sd.at),
                        adapter.parameter(&sd.at),
                    )
                });

                let all_columns: Vec<String> = descriptor
                    .columns
                    .iter()
                    .map(|c| adapter.quote(&c.name))
                    .collect();
                let select_list = all_columns.join(",");
                let get_with = |hint: &str, suffix: &str| {
                    let mut sql = format!("SELECT {select_list} FROM {hole}");
                    if !hint.is_empty() {
                        sql.push(' ');
                        sql.push_str(hint);
                    }
                    sql.push_str(" WHERE ");
                    sql.push_str(&key_where);
                    sql.push_str(suffix);
                    sql
                };
                let get = get_with("", "");
                let get_locked = get_with(adapter.row_lock_hint(), adapter.row_lock_suffix());
                let get_nolock = get_with(adapter.no_lock_hint(), "");

                let exists = format!("SELECT 1 FROM {hole} WHERE {key_where}");

                (
                    Some(update),
                    update_columns,
                    Some(delete),
                    soft_delete,
                    Some(get),
                    Some(get_locked),
                    Some(get_nolock),
                    Some(exists),
                )
            }
            None => (None, Vec::new(), None, None, None, None, None, None),
        };

    Ok(CrudTemplates {
        insert,
        insert_columns,
        has_identity,
        update,
        update_columns,
        delete,
        soft_delete,
        get,
        get_locked,
        get_nolock,
        exists,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{MySqlAdapter, SqlServerAdapter};
    use crate::entity::{ColumnDescriptor, Entity, EntityMeta, KeyStrategy, descriptor_of};
    use crate::value::{Value, ValueKind};

    struct Post;

    impl Entity for Post {
        fn meta() -> EntityMeta {
            EntityMeta::new("Post")
                .column(ColumnDescriptor::new("Id", ValueKind::Long))
                .column(ColumnDescriptor::new("Title", ValueKind::Str).length(100))
                .column(ColumnDescriptor::new("Deleted", ValueKind::Bool))
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

    struct Tag;

    impl Entity for Tag {
        fn meta() -> EntityMeta {
            EntityMeta::new("Tag")
                .column(ColumnDescriptor::new("Id", ValueKind::Uuid))
                .column(ColumnDescriptor::new("Name", ValueKind::Str).length(50))
                .key(KeyStrategy::Uuid, "Id")
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
    fn test_insert_skips_identity_key_and_appends_retrieval() {
        let desc = descriptor_of::<Post>();
        let t = build_templates(&desc, &MySqlAdapter).unwrap();
        assert_eq!(
            t.insert,
            "INSERT INTO {0} (`Title`,`Deleted`) VALUES (@Title,@Deleted);SELECT LAST_INSERT_ID();"
        );
        assert!(t.has_identity);
        assert_eq!(t.insert_columns, vec!["Title", "Deleted"]);
    }

    #[test]
    fn test_uuid_key_is_inserted_without_identity() {
        let desc = descriptor_of::<Tag>();
        let t = build_templates(&desc, &MySqlAdapter).unwrap();
        assert_eq!(t.insert, "INSERT INTO {0} (`Id`,`Name`) VALUES (@Id,@Name)");
        assert!(!t.has_identity);
    }

    #[test]
    fn test_update_and_delete_by_key() {
        let desc = descriptor_of::<Post>();
        let t = build_templates(&desc, &MySqlAdapter).unwrap();
        assert_eq!(
            t.update.as_deref(),
            Some("UPDATE {0} SET `Title` = @Title,`Deleted` = @Deleted WHERE `Id` = @Id")
        );
        assert_eq!(
            t.delete.as_deref(),
            Some("DELETE FROM {0} WHERE `Id` = @Id")
        );
    }

    #[test]
    fn test_soft_delete_sets_bookkeeping_columns() {
        let desc = descriptor_of::<Post>();
        let t = build_templates(&desc, &MySqlAdapter).unwrap();
        assert_eq!(
            t.soft_delete.as_deref(),
            Some(
                "UPDATE {0} SET `Deleted` = 1,`DeletedBy` = @DeletedBy,`DeletedAt` = @DeletedAt \
                 WHERE `Id` = @Id"
            )
        );
    }

    #[test]
    fn test_lock_variants_per_dialect() {
        let desc = descriptor_of::<Post>();
        let mssql = SqlServerAdapter::default();
        let t = build_templates(&desc, &mssql).unwrap();
        assert_eq!(
            t.get_locked.as_deref(),
            Some("SELECT [Id],[Title],[Deleted] FROM {0} WITH (UPDLOCK) WHERE [Id] = @Id")
        );
        assert_eq!(
            t.get_nolock.as_deref(),
            Some("SELECT [Id],[Title],[Deleted] FROM {0} WITH (NOLOCK) WHERE [Id] = @Id")
        );

        let t = build_templates(&desc, &MySqlAdapter).unwrap();
        assert_eq!(
            t.get_locked.as_deref(),
            Some("SELECT `Id`,`Title`,`Deleted` FROM {0} WHERE `Id` = @Id FOR UPDATE")
        );
    }

    #[test]
    fn test_table_hole_substitution() {
        let desc = descriptor_of::<Post>();
        let t = build_templates(&desc, &MySqlAdapter).unwrap();
        let sql = with_table(t.delete.as_deref().unwrap(), &MySqlAdapter, "PostArchive");
        assert_eq!(sql, "DELETE FROM `PostArchive` WHERE `Id` = @Id");
    }
}
