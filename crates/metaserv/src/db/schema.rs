//! Relational layout of the catalog store.
//!
//! Statements are idempotent so `init_schema` can run on every start.

use crate::db::DbPool;
use crate::error::AppResult;

/// DDL for the `metaserv` schema, in dependency order.
pub const SCHEMA_DDL: &[&str] = &[
    "CREATE SCHEMA IF NOT EXISTS metaserv",
    r#"
    CREATE TABLE IF NOT EXISTS metaserv.ms_user (
        id BIGSERIAL PRIMARY KEY,
        first_name VARCHAR(64) NOT NULL,
        last_name VARCHAR(64) NOT NULL,
        email VARCHAR(64) NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metaserv.ms_project (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(128) NOT NULL UNIQUE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metaserv.ms_repo (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(128) NOT NULL,
        description TEXT,
        user_id BIGINT NOT NULL REFERENCES metaserv.ms_user(id) ON DELETE CASCADE,
        project_id BIGINT REFERENCES metaserv.ms_project(id) ON DELETE SET NULL,
        create_time TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        level VARCHAR(8) NOT NULL CHECK (level IN ('DC', 'L1', 'L2', 'L3', 'dev')),
        data_release VARCHAR(64),
        accessibility VARCHAR(16) NOT NULL
            CHECK (accessibility IN ('released', 'unreleased', 'private'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metaserv.ms_database (
        id BIGSERIAL PRIMARY KEY,
        repo_id BIGINT REFERENCES metaserv.ms_repo(id) ON DELETE CASCADE,
        name VARCHAR(128) NOT NULL UNIQUE,
        description TEXT,
        conn_host VARCHAR(128),
        conn_port INTEGER
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metaserv.ms_database_schema (
        id BIGSERIAL PRIMARY KEY,
        db_id BIGINT NOT NULL REFERENCES metaserv.ms_database(id) ON DELETE CASCADE,
        name VARCHAR(128) NOT NULL,
        description TEXT,
        is_default_schema BOOLEAN NOT NULL DEFAULT FALSE,
        UNIQUE (db_id, name)
    )
    "#,
    // At most one default schema per database.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS ms_database_schema_one_default
        ON metaserv.ms_database_schema (db_id)
        WHERE is_default_schema
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metaserv.ms_database_table (
        id BIGSERIAL PRIMARY KEY,
        schema_id BIGINT NOT NULL REFERENCES metaserv.ms_database_schema(id) ON DELETE CASCADE,
        name VARCHAR(128) NOT NULL,
        description TEXT,
        UNIQUE (schema_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS metaserv.ms_database_column (
        id BIGSERIAL PRIMARY KEY,
        table_id BIGINT NOT NULL REFERENCES metaserv.ms_database_table(id) ON DELETE CASCADE,
        name VARCHAR(128) NOT NULL,
        description TEXT,
        ordinal INTEGER NOT NULL,
        ucd VARCHAR(1024),
        unit VARCHAR(128),
        datatype VARCHAR(64) NOT NULL,
        nullable BOOLEAN NOT NULL DEFAULT TRUE,
        arraysize INTEGER,
        UNIQUE (table_id, ordinal),
        UNIQUE (table_id, name)
    )
    "#,
];

/// Tables `init_schema` creates, used to report what exists.
pub const CATALOG_TABLES: &[&str] = &[
    "ms_user",
    "ms_project",
    "ms_repo",
    "ms_database",
    "ms_database_schema",
    "ms_database_table",
    "ms_database_column",
];

/// Create the catalog schema if it does not exist.
pub async fn init_schema(pool: &DbPool) -> AppResult<()> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA_DDL {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    tracing::info!(tables = CATALOG_TABLES.len(), "Catalog schema initialized");
    Ok(())
}

/// Catalog tables that are missing from the store.
pub async fn missing_tables(pool: &DbPool) -> AppResult<Vec<String>> {
    let existing: Vec<String> = sqlx::query_scalar(
        "SELECT table_name::text FROM information_schema.tables WHERE table_schema = 'metaserv'",
    )
    .fetch_all(pool)
    .await?;

    Ok(CATALOG_TABLES
        .iter()
        .filter(|t| !existing.iter().any(|e| e == *t))
        .map(|t| t.to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_catalog_table_has_ddl() {
        for table in CATALOG_TABLES {
            let needle = format!("metaserv.{} (", table);
            assert!(
                SCHEMA_DDL.iter().any(|s| s.contains(&needle)),
                "missing DDL for {}",
                table
            );
        }
    }

    #[test]
    fn test_foreign_keys_cascade() {
        let cascades = SCHEMA_DDL
            .iter()
            .filter(|s| s.contains("ON DELETE CASCADE"))
            .count();
        assert_eq!(cascades, 5);
    }
}
