//! Read side of the catalog: the level → database → table → column
//! hierarchy served under `/db`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{ColumnRecord, DatabaseRecord, Level, TableRecord};
use crate::db::MetaStore;
use crate::error::{AppError, AppResult};
use crate::introspect::{live_columns, render_create_table, LiveColumn, SchemaInspector};
use crate::result_ext::OptionResultExt;

/// A named link to a child resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseView {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub level: Option<String>,
    pub data_release: Option<String>,
    pub accessibility: Option<String>,
    pub owner: Option<String>,
    pub project: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub default_schema: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaView {
    pub name: String,
    pub description: Option<String>,
    pub is_default_schema: bool,
}

/// Table listing item; description and columns are present when expanded.
#[derive(Debug, Clone, Serialize)]
pub struct TableEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<ColumnRecord>>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableView {
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<ColumnRecord>,
    pub url: String,
}

/// Live structure of a table in the source database.
#[derive(Debug, Clone, Serialize)]
pub struct TableDefinition {
    pub name: String,
    pub schema: String,
    pub definition: String,
    pub columns: Vec<LiveColumn>,
    pub url: String,
}

/// Service for browsing catalog contents.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn MetaStore>,
    source: Arc<dyn SchemaInspector>,
    base_url: String,
}

impl CatalogService {
    /// `source` is introspected for `/schema`; `base_url` prefixes every link.
    pub fn new(
        store: Arc<dyn MetaStore>,
        source: Arc<dyn SchemaInspector>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            source,
            base_url: base_url.into(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Levels that hold at least one database.
    pub async fn levels(&self) -> AppResult<Vec<Entry>> {
        let levels = self.store.list_levels().await?;
        Ok(levels
            .into_iter()
            .map(|level| Entry {
                url: self.url(&format!("/db/{}", level)),
                name: level,
            })
            .collect())
    }

    pub async fn databases(&self, level: &str) -> AppResult<Vec<Entry>> {
        let parsed = parse_level(level)?;
        let names = self.store.list_databases(parsed).await?;
        if names.is_empty() {
            return Err(AppError::NotFound(format!("No database found for level '{}'", level)));
        }
        Ok(names
            .into_iter()
            .map(|name| Entry {
                url: self.url(&format!("/db/{}/{}", level, name)),
                name,
            })
            .collect())
    }

    pub async fn database(&self, level: &str, name: &str) -> AppResult<DatabaseView> {
        let record = self.find_database(level, name).await?;
        Ok(DatabaseView {
            url: self.url(&format!("/db/{}/{}", level, record.name)),
            id: record.id,
            name: record.name,
            description: record.description,
            host: record.conn_host,
            port: record.conn_port,
            level: record.level,
            data_release: record.data_release,
            accessibility: record.accessibility,
            owner: record.owner_email,
            project: record.project,
            create_time: record.create_time,
            default_schema: record.default_schema,
        })
    }

    pub async fn schemas(&self, level: &str, name: &str) -> AppResult<Vec<SchemaView>> {
        let record = self.find_database(level, name).await?;
        let schemas = self.store.list_schemas(record.id).await?;
        Ok(schemas
            .into_iter()
            .map(|s| SchemaView {
                name: s.name,
                description: s.description,
                is_default_schema: s.is_default_schema,
            })
            .collect())
    }

    /// Tables of the default schema. A known database without tables yields
    /// an empty list; an unknown one is `NotFound`.
    pub async fn tables(&self, level: &str, name: &str, expand: bool) -> AppResult<Vec<TableEntry>> {
        let record = self.find_database(level, name).await?;
        let Some(schema_id) = record
            .default_schema_id
            .log_none(format!("database {} has no default schema", record.name))
        else {
            return Ok(Vec::new());
        };

        let tables = self.store.list_tables(schema_id).await?;
        let mut entries = Vec::with_capacity(tables.len());
        for table in tables {
            let url = self.url(&format!("/db/{}/{}/tables/{}", level, record.name, table.name));
            let (description, columns) = if expand {
                let columns = self.store.list_columns(table.id).await?;
                (table.description, Some(columns))
            } else {
                (None, None)
            };
            entries.push(TableEntry {
                name: table.name,
                description,
                columns,
                url,
            });
        }
        Ok(entries)
    }

    /// One table with its columns ordered by ordinal.
    pub async fn table(&self, level: &str, db: &str, table: &str) -> AppResult<TableView> {
        let (record, table) = self.find_table(level, db, table).await?;
        let columns = self.store.list_columns(table.id).await?;
        Ok(TableView {
            url: self.url(&format!("/db/{}/{}/tables/{}", level, record.name, table.name)),
            name: table.name,
            description: table.description,
            columns,
        })
    }

    /// `CREATE TABLE` text built from the source database's live columns.
    pub async fn table_definition(
        &self,
        level: &str,
        db: &str,
        table: &str,
    ) -> AppResult<TableDefinition> {
        let (record, table) = self.find_table(level, db, table).await?;
        let schema = record.default_schema.clone().unwrap_or_else(|| record.name.clone());

        let (live_name, columns) = live_columns(self.source.as_ref(), &schema, &table.name).await?;
        if columns.is_empty() {
            return Err(AppError::NotFound(format!(
                "Table '{}.{}' not found in source database",
                schema, table.name
            )));
        }

        Ok(TableDefinition {
            definition: render_create_table(&schema, &live_name, &columns),
            url: self.url(&format!(
                "/db/{}/{}/tables/{}/schema",
                level, record.name, table.name
            )),
            name: table.name,
            schema,
            columns,
        })
    }

    async fn find_database(&self, level: &str, name: &str) -> AppResult<DatabaseRecord> {
        let parsed = parse_level(level)?;
        let not_found = || AppError::NotFound(format!("Database '{}' not found", name));
        let record = self.store.get_database(name).await?.ok_or_else(not_found)?;
        if record.level.as_deref() != Some(parsed.as_str()) {
            return Err(not_found());
        }
        Ok(record)
    }

    async fn find_table(
        &self,
        level: &str,
        db: &str,
        table: &str,
    ) -> AppResult<(DatabaseRecord, TableRecord)> {
        let record = self.find_database(level, db).await?;
        let not_found = || AppError::NotFound(format!("Table '{}.{}' not found", db, table));
        let schema_id = record.default_schema_id.ok_or_else(not_found)?;
        let table = self
            .store
            .get_table(schema_id, table)
            .await?
            .ok_or_else(not_found)?;
        Ok((record, table))
    }
}

/// Unknown levels read as "nothing there", not as a bad request.
fn parse_level(level: &str) -> AppResult<Level> {
    level
        .parse::<Level>()
        .map_err(|_| AppError::NotFound(format!("Unknown level '{}'", level)))
}
