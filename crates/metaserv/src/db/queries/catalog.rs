//! Catalog database queries.

use sqlx::PgConnection;

use crate::db::models::{ColumnRecord, DatabaseRecord, Level, NewCatalog, SchemaRecord, TableRecord};
use crate::db::DbPool;
use crate::description::{ColumnDescription, TableDescription};
use crate::error::AppResult;

const DATABASE_SELECT: &str = r#"
    SELECT d.id, d.name, d.description, d.conn_host, d.conn_port, d.repo_id,
           r.level, r.data_release, r.accessibility, r.create_time,
           u.email AS owner_email, p.name AS project,
           s.id AS default_schema_id, s.name AS default_schema
    FROM metaserv.ms_database d
    LEFT JOIN metaserv.ms_repo r ON r.id = d.repo_id
    LEFT JOIN metaserv.ms_user u ON u.id = r.user_id
    LEFT JOIN metaserv.ms_project p ON p.id = r.project_id
    LEFT JOIN metaserv.ms_database_schema s
           ON s.db_id = d.id AND s.is_default_schema
"#;

/// Whether a database with this name is already registered.
pub async fn database_exists(conn: &mut PgConnection, name: &str) -> AppResult<bool> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM metaserv.ms_database WHERE name = $1)",
    )
    .bind(name)
    .fetch_one(conn)
    .await?;

    Ok(exists)
}

/// Insert the repository row for a catalog.
pub async fn insert_repo(conn: &mut PgConnection, catalog: &NewCatalog) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO metaserv.ms_repo
            (name, description, user_id, project_id, level, data_release, accessibility)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id
        "#,
    )
    .bind(&catalog.db_name)
    .bind(&catalog.description)
    .bind(catalog.owner_id)
    .bind(catalog.project_id)
    .bind(catalog.level.as_str())
    .bind(&catalog.data_release)
    .bind(catalog.accessibility.as_str())
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Insert the database row.
pub async fn insert_database(
    conn: &mut PgConnection,
    repo_id: i64,
    catalog: &NewCatalog,
) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO metaserv.ms_database (repo_id, name, description, conn_host, conn_port)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(repo_id)
    .bind(&catalog.db_name)
    .bind(&catalog.description)
    .bind(&catalog.host)
    .bind(catalog.port)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

pub async fn insert_schema(
    conn: &mut PgConnection,
    db_id: i64,
    name: &str,
    is_default: bool,
) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO metaserv.ms_database_schema (db_id, name, is_default_schema)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(db_id)
    .bind(name)
    .bind(is_default)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

pub async fn insert_table(
    conn: &mut PgConnection,
    schema_id: i64,
    table: &TableDescription,
) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO metaserv.ms_database_table (schema_id, name, description)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(schema_id)
    .bind(&table.name)
    .bind(&table.description)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

pub async fn insert_column(
    conn: &mut PgConnection,
    table_id: i64,
    ordinal: i32,
    column: &ColumnDescription,
) -> AppResult<i64> {
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO metaserv.ms_database_column
            (table_id, name, description, ordinal, ucd, unit, datatype, nullable, arraysize)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(table_id)
    .bind(&column.name)
    .bind(&column.description)
    .bind(ordinal)
    .bind(&column.ucd)
    .bind(&column.unit)
    .bind(&column.datatype)
    .bind(column.nullable)
    .bind(column.arraysize)
    .fetch_one(conn)
    .await?;

    Ok(id)
}

/// Levels that have at least one database.
pub async fn list_levels(pool: &DbPool) -> AppResult<Vec<String>> {
    let levels: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT r.level
        FROM metaserv.ms_repo r
        JOIN metaserv.ms_database d ON d.repo_id = r.id
        ORDER BY r.level
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(levels)
}

/// Database names registered under a level.
pub async fn list_databases(pool: &DbPool, level: Level) -> AppResult<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT d.name
        FROM metaserv.ms_database d
        JOIN metaserv.ms_repo r ON r.id = d.repo_id
        WHERE r.level = $1
        ORDER BY d.name
        "#,
    )
    .bind(level.as_str())
    .fetch_all(pool)
    .await?;

    Ok(names)
}

pub async fn get_database_by_name(pool: &DbPool, name: &str) -> AppResult<Option<DatabaseRecord>> {
    let sql = format!("{} WHERE d.name = $1", DATABASE_SELECT);
    let record = sqlx::query_as::<_, DatabaseRecord>(&sql)
        .bind(name)
        .fetch_optional(pool)
        .await?;

    Ok(record)
}

pub async fn list_schemas(pool: &DbPool, db_id: i64) -> AppResult<Vec<SchemaRecord>> {
    let schemas = sqlx::query_as::<_, SchemaRecord>(
        r#"
        SELECT id, name, description, is_default_schema
        FROM metaserv.ms_database_schema
        WHERE db_id = $1
        ORDER BY is_default_schema DESC, name
        "#,
    )
    .bind(db_id)
    .fetch_all(pool)
    .await?;

    Ok(schemas)
}

/// Tables of a schema in insertion order.
pub async fn list_tables(pool: &DbPool, schema_id: i64) -> AppResult<Vec<TableRecord>> {
    let tables = sqlx::query_as::<_, TableRecord>(
        r#"
        SELECT id, schema_id, name, description
        FROM metaserv.ms_database_table
        WHERE schema_id = $1
        ORDER BY id
        "#,
    )
    .bind(schema_id)
    .fetch_all(pool)
    .await?;

    Ok(tables)
}

pub async fn get_table(pool: &DbPool, schema_id: i64, name: &str) -> AppResult<Option<TableRecord>> {
    let table = sqlx::query_as::<_, TableRecord>(
        r#"
        SELECT id, schema_id, name, description
        FROM metaserv.ms_database_table
        WHERE schema_id = $1 AND name = $2
        "#,
    )
    .bind(schema_id)
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(table)
}

/// Columns of a table ordered by ordinal.
pub async fn list_columns(pool: &DbPool, table_id: i64) -> AppResult<Vec<ColumnRecord>> {
    let columns = sqlx::query_as::<_, ColumnRecord>(
        r#"
        SELECT id, name, description, ordinal, ucd, unit, datatype, nullable, arraysize
        FROM metaserv.ms_database_column
        WHERE table_id = $1
        ORDER BY ordinal
        "#,
    )
    .bind(table_id)
    .fetch_all(pool)
    .await?;

    Ok(columns)
}
