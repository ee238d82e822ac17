//! Store handle for the catalog.
//!
//! Services hold an `Arc<dyn MetaStore>` built once at startup. `PgStore`
//! is the PostgreSQL implementation.

use async_trait::async_trait;

use crate::db::models::{
    ColumnRecord, DatabaseRecord, Level, NewCatalog, NewUser, SchemaRecord, TableRecord,
};
use crate::db::queries::{catalog, user};
use crate::db::{pool, DbPool};
use crate::error::{AppError, AppResult};

/// Persistence operations used by the ingest and read services.
#[async_trait]
pub trait MetaStore: Send + Sync {
    /// Whether the store answers at all.
    async fn ping(&self) -> bool;

    async fn insert_project(&self, name: &str) -> AppResult<i64>;

    async fn insert_user(&self, user: &NewUser) -> AppResult<i64>;

    async fn find_user_id(&self, email: &str) -> AppResult<Option<i64>>;

    async fn find_project_id(&self, name: &str) -> AppResult<Option<i64>>;

    /// Insert repository, database, default schema, tables and columns
    /// atomically. Fails with `Duplicate` if the database name is taken.
    async fn insert_catalog(&self, catalog: &NewCatalog) -> AppResult<i64>;

    async fn list_levels(&self) -> AppResult<Vec<String>>;

    async fn list_databases(&self, level: Level) -> AppResult<Vec<String>>;

    async fn get_database(&self, name: &str) -> AppResult<Option<DatabaseRecord>>;

    async fn list_schemas(&self, db_id: i64) -> AppResult<Vec<SchemaRecord>>;

    async fn list_tables(&self, schema_id: i64) -> AppResult<Vec<TableRecord>>;

    async fn get_table(&self, schema_id: i64, name: &str) -> AppResult<Option<TableRecord>>;

    async fn list_columns(&self, table_id: i64) -> AppResult<Vec<ColumnRecord>>;
}

/// `MetaStore` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl MetaStore for PgStore {
    async fn ping(&self) -> bool {
        pool::health_check(&self.pool).await
    }

    async fn insert_project(&self, name: &str) -> AppResult<i64> {
        user::insert_project(&self.pool, name).await.map_err(|e| match e {
            AppError::Duplicate(_) => AppError::Duplicate(format!("project '{}'", name)),
            other => other,
        })
    }

    async fn insert_user(&self, new_user: &NewUser) -> AppResult<i64> {
        user::insert_user(&self.pool, new_user).await.map_err(|e| match e {
            AppError::Duplicate(_) => AppError::Duplicate(format!("user '{}'", new_user.email)),
            other => other,
        })
    }

    async fn find_user_id(&self, email: &str) -> AppResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Ok(user::get_user_by_email(&mut conn, email).await?.map(|u| u.id))
    }

    async fn find_project_id(&self, name: &str) -> AppResult<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Ok(user::get_project_by_name(&mut conn, name).await?.map(|p| p.id))
    }

    async fn insert_catalog(&self, new: &NewCatalog) -> AppResult<i64> {
        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        if catalog::database_exists(&mut tx, &new.db_name).await? {
            return Err(AppError::Duplicate(format!("database '{}'", new.db_name)));
        }

        let repo_id = catalog::insert_repo(&mut tx, new).await?;
        let db_id = catalog::insert_database(&mut tx, repo_id, new).await?;
        let schema_id = catalog::insert_schema(&mut tx, db_id, &new.schema_name, true).await?;

        for table in &new.tables {
            let table_id = catalog::insert_table(&mut tx, schema_id, table).await?;
            for (ordinal, column) in table.columns.iter().enumerate() {
                catalog::insert_column(&mut tx, table_id, ordinal as i32, column).await?;
            }
        }

        tx.commit().await?;
        Ok(db_id)
    }

    async fn list_levels(&self) -> AppResult<Vec<String>> {
        catalog::list_levels(&self.pool).await
    }

    async fn list_databases(&self, level: Level) -> AppResult<Vec<String>> {
        catalog::list_databases(&self.pool, level).await
    }

    async fn get_database(&self, name: &str) -> AppResult<Option<DatabaseRecord>> {
        catalog::get_database_by_name(&self.pool, name).await
    }

    async fn list_schemas(&self, db_id: i64) -> AppResult<Vec<SchemaRecord>> {
        catalog::list_schemas(&self.pool, db_id).await
    }

    async fn list_tables(&self, schema_id: i64) -> AppResult<Vec<TableRecord>> {
        catalog::list_tables(&self.pool, schema_id).await
    }

    async fn get_table(&self, schema_id: i64, name: &str) -> AppResult<Option<TableRecord>> {
        catalog::get_table(&self.pool, schema_id, name).await
    }

    async fn list_columns(&self, table_id: i64) -> AppResult<Vec<ColumnRecord>> {
        catalog::list_columns(&self.pool, table_id).await
    }
}
