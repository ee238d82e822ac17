//! In-memory store and inspector for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::db::models::{
    ColumnRecord, DatabaseRecord, Level, NewCatalog, NewUser, SchemaRecord, TableRecord,
};
use crate::db::MetaStore;
use crate::error::{AppError, AppResult};
use crate::introspect::{LiveColumn, SchemaInspector};

/// A nullable live column whose `udt_name` equals its `data_type`.
pub fn live_column(name: &str, data_type: &str, ordinal: i32) -> LiveColumn {
    LiveColumn {
        name: name.to_string(),
        data_type: data_type.to_string(),
        udt_name: data_type.to_string(),
        nullable: true,
        ordinal,
        char_length: None,
        numeric_precision: None,
        numeric_scale: None,
    }
}

/// Fixed `information_schema` content keyed by (schema, table).
#[derive(Default)]
pub struct StaticInspector {
    tables: Vec<(String, String, Vec<LiveColumn>)>,
}

impl StaticInspector {
    pub fn with_table(mut self, schema: &str, table: &str, columns: Vec<LiveColumn>) -> Self {
        self.tables
            .push((schema.to_string(), table.to_string(), columns));
        self
    }
}

#[async_trait]
impl SchemaInspector for StaticInspector {
    async fn schema_exists(&self, schema: &str) -> AppResult<bool> {
        Ok(self.tables.iter().any(|(s, _, _)| s == schema))
    }

    async fn tables(&self, schema: &str) -> AppResult<Vec<String>> {
        Ok(self
            .tables
            .iter()
            .filter(|(s, _, _)| s == schema)
            .map(|(_, t, _)| t.clone())
            .collect())
    }

    async fn columns(&self, schema: &str, table: &str) -> AppResult<Vec<LiveColumn>> {
        Ok(self
            .tables
            .iter()
            .find(|(s, t, _)| s == schema && t == table)
            .map(|(_, _, c)| c.clone())
            .unwrap_or_default())
    }
}

#[derive(Clone)]
struct RepoRow {
    id: i64,
    user_id: i64,
    project_id: Option<i64>,
    level: Level,
    data_release: String,
    accessibility: String,
}

#[derive(Clone)]
struct DatabaseRow {
    id: i64,
    repo_id: i64,
    name: String,
    description: Option<String>,
    host: String,
    port: i32,
}

#[derive(Clone, Default)]
struct State {
    next_id: i64,
    users: Vec<(i64, NewUser)>,
    projects: Vec<(i64, String)>,
    repos: Vec<RepoRow>,
    databases: Vec<DatabaseRow>,
    schemas: Vec<(i64, SchemaRecord)>,
    tables: Vec<TableRecord>,
    columns: HashMap<i64, Vec<ColumnRecord>>,
}

impl State {
    fn next(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Row counts per catalog table, for atomicity assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub repos: usize,
    pub databases: usize,
    pub schemas: usize,
    pub tables: usize,
    pub columns: usize,
}

/// `MetaStore` kept in memory.
///
/// `insert_catalog` works on a copy of the state and swaps it in only when
/// every row was written, so a failure leaves nothing behind.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    unavailable: AtomicBool,
    fail_on_column: Mutex<Option<String>>,
}

impl MemoryStore {
    /// Make every operation fail with `StoreUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail `insert_catalog` when it reaches a column with this name.
    pub fn fail_on_column(&self, name: &str) {
        *self.fail_on_column.lock().unwrap() = Some(name.to_string());
    }

    pub fn row_counts(&self) -> RowCounts {
        let state = self.state.lock().unwrap();
        RowCounts {
            repos: state.repos.len(),
            databases: state.databases.len(),
            schemas: state.schemas.len(),
            tables: state.tables.len(),
            columns: state.columns.values().map(Vec::len).sum(),
        }
    }

    /// Register an extra non-default schema for a database.
    pub fn add_schema(&self, db_name: &str, schema: &str) {
        let mut state = self.state.lock().unwrap();
        let db_id = state
            .databases
            .iter()
            .find(|d| d.name == db_name)
            .map(|d| d.id)
            .unwrap();
        let id = state.next();
        state.schemas.push((
            db_id,
            SchemaRecord {
                id,
                name: schema.to_string(),
                description: None,
                is_default_schema: false,
            },
        ));
    }

    fn check(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StoreUnavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetaStore for MemoryStore {
    async fn ping(&self) -> bool {
        self.check().is_ok()
    }

    async fn insert_project(&self, name: &str) -> AppResult<i64> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if state.projects.iter().any(|(_, n)| n == name) {
            return Err(AppError::Duplicate(format!("project '{}'", name)));
        }
        let id = state.next();
        state.projects.push((id, name.to_string()));
        Ok(id)
    }

    async fn insert_user(&self, user: &NewUser) -> AppResult<i64> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        if state.users.iter().any(|(_, u)| u.email == user.email) {
            return Err(AppError::Duplicate(format!("user '{}'", user.email)));
        }
        let id = state.next();
        state.users.push((id, user.clone()));
        Ok(id)
    }

    async fn find_user_id(&self, email: &str) -> AppResult<Option<i64>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|(_, u)| u.email == email)
            .map(|(id, _)| *id))
    }

    async fn find_project_id(&self, name: &str) -> AppResult<Option<i64>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .projects
            .iter()
            .find(|(_, n)| n == name)
            .map(|(id, _)| *id))
    }

    async fn insert_catalog(&self, new: &NewCatalog) -> AppResult<i64> {
        self.check()?;
        let fail_on = self.fail_on_column.lock().unwrap().clone();
        let mut guard = self.state.lock().unwrap();
        let mut state = guard.clone();

        if state.databases.iter().any(|d| d.name == new.db_name) {
            return Err(AppError::Duplicate(format!("database '{}'", new.db_name)));
        }

        let repo_id = state.next();
        state.repos.push(RepoRow {
            id: repo_id,
            user_id: new.owner_id,
            project_id: new.project_id,
            level: new.level,
            data_release: new.data_release.clone(),
            accessibility: new.accessibility.to_string(),
        });
        let db_id = state.next();
        state.databases.push(DatabaseRow {
            id: db_id,
            repo_id,
            name: new.db_name.clone(),
            description: new.description.clone(),
            host: new.host.clone(),
            port: new.port,
        });
        let schema_id = state.next();
        state.schemas.push((
            db_id,
            SchemaRecord {
                id: schema_id,
                name: new.schema_name.clone(),
                description: None,
                is_default_schema: true,
            },
        ));

        for table in &new.tables {
            let table_id = state.next();
            state.tables.push(TableRecord {
                id: table_id,
                schema_id,
                name: table.name.clone(),
                description: table.description.clone(),
            });
            let mut columns = Vec::new();
            for (ordinal, column) in table.columns.iter().enumerate() {
                if fail_on.as_deref() == Some(column.name.as_str()) {
                    return Err(AppError::Internal(format!(
                        "insert failed at column {}",
                        column.name
                    )));
                }
                let id = state.next();
                columns.push(ColumnRecord {
                    id,
                    name: column.name.clone(),
                    description: column.description.clone(),
                    ordinal: ordinal as i32,
                    ucd: column.ucd.clone(),
                    unit: column.unit.clone(),
                    datatype: column.datatype.clone(),
                    nullable: column.nullable,
                    arraysize: column.arraysize,
                });
            }
            state.columns.insert(table_id, columns);
        }

        *guard = state;
        Ok(db_id)
    }

    async fn list_levels(&self) -> AppResult<Vec<String>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        let mut levels: Vec<String> = state
            .databases
            .iter()
            .filter_map(|d| state.repos.iter().find(|r| r.id == d.repo_id))
            .map(|r| r.level.to_string())
            .collect();
        levels.sort();
        levels.dedup();
        Ok(levels)
    }

    async fn list_databases(&self, level: Level) -> AppResult<Vec<String>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        let mut names: Vec<String> = state
            .databases
            .iter()
            .filter(|d| {
                state
                    .repos
                    .iter()
                    .any(|r| r.id == d.repo_id && r.level == level)
            })
            .map(|d| d.name.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    async fn get_database(&self, name: &str) -> AppResult<Option<DatabaseRecord>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        let Some(db) = state.databases.iter().find(|d| d.name == name) else {
            return Ok(None);
        };
        let repo = state.repos.iter().find(|r| r.id == db.repo_id);
        let default_schema = state
            .schemas
            .iter()
            .find(|(db_id, s)| *db_id == db.id && s.is_default_schema)
            .map(|(_, s)| s);
        Ok(Some(DatabaseRecord {
            id: db.id,
            name: db.name.clone(),
            description: db.description.clone(),
            conn_host: Some(db.host.clone()),
            conn_port: Some(db.port),
            repo_id: Some(db.repo_id),
            level: repo.map(|r| r.level.to_string()),
            data_release: repo.map(|r| r.data_release.clone()),
            accessibility: repo.map(|r| r.accessibility.clone()),
            create_time: Some(Utc::now()),
            owner_email: repo.and_then(|r| {
                state
                    .users
                    .iter()
                    .find(|(id, _)| *id == r.user_id)
                    .map(|(_, u)| u.email.clone())
            }),
            project: repo.and_then(|r| r.project_id).and_then(|pid| {
                state
                    .projects
                    .iter()
                    .find(|(id, _)| *id == pid)
                    .map(|(_, n)| n.clone())
            }),
            default_schema_id: default_schema.map(|s| s.id),
            default_schema: default_schema.map(|s| s.name.clone()),
        }))
    }

    async fn list_schemas(&self, db_id: i64) -> AppResult<Vec<SchemaRecord>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        let mut schemas: Vec<SchemaRecord> = state
            .schemas
            .iter()
            .filter(|(id, _)| *id == db_id)
            .map(|(_, s)| s.clone())
            .collect();
        schemas.sort_by(|a, b| {
            b.is_default_schema
                .cmp(&a.is_default_schema)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(schemas)
    }

    async fn list_tables(&self, schema_id: i64) -> AppResult<Vec<TableRecord>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .tables
            .iter()
            .filter(|t| t.schema_id == schema_id)
            .cloned()
            .collect())
    }

    async fn get_table(&self, schema_id: i64, name: &str) -> AppResult<Option<TableRecord>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .tables
            .iter()
            .find(|t| t.schema_id == schema_id && t.name == name)
            .cloned())
    }

    async fn list_columns(&self, table_id: i64) -> AppResult<Vec<ColumnRecord>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        let mut columns = state.columns.get(&table_id).cloned().unwrap_or_default();
        columns.sort_by_key(|c| c.ordinal);
        Ok(columns)
    }
}
