//! Catalog browsing endpoints under `/db`.
//!
//! Every handler answers in the representation negotiated from `Accept`
//! and wraps lists as `{"results": [...]}` and single resources as
//! `{"result": {...}}`.

use std::sync::LazyLock;

use axum::extract::{Path, Query, State};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;

use super::negotiate::{Reply, Representation};
use crate::error::{AppError, AppResult};
use crate::services::CatalogService;

/// Identifiers accepted in paths.
static SAFE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid name regex"));

/// Reject path segments that are not plain identifiers.
pub fn check_names<S: AsRef<str>>(names: &[S]) -> AppResult<()> {
    for name in names {
        let name = name.as_ref();
        if !SAFE_NAME.is_match(name) {
            return Err(AppError::BadRequest(format!("Invalid name '{}'", name)));
        }
    }
    Ok(())
}

/// Query string for table listings.
#[derive(Debug, Default, Deserialize)]
pub struct TablesQuery {
    /// Include table descriptions and columns.
    #[serde(default)]
    pub description: bool,
}

/// Service banner.
///
/// `GET /`
pub async fn root(State(catalog): State<CatalogService>, repr: Representation) -> Reply {
    repr.result(Ok(json!({
        "name": "LSST Metadata Service",
        "version": env!("CARGO_PKG_VERSION"),
        "links": { "db": catalog.url("/db") },
    })))
}

/// List levels that have at least one database.
///
/// `GET /db`
///
/// ```json
/// {"results": [{"name": "L2", "url": "/db/L2"}]}
/// ```
pub async fn list_levels(State(catalog): State<CatalogService>, repr: Representation) -> Reply {
    repr.results(catalog.levels().await)
}

/// List databases of a level.
///
/// `GET /db/{level}`
pub async fn list_databases(
    State(catalog): State<CatalogService>,
    Path(level): Path<String>,
    repr: Representation,
) -> Reply {
    if let Err(e) = check_names(&[&level]) {
        return repr.error(e);
    }
    repr.results(catalog.databases(&level).await)
}

/// One database with its repository fields.
///
/// `GET /db/{level}/{dbName}`
///
/// ```json
/// {"result": {"name": "sdss_stripe82", "level": "L2", "default_schema": "sdss", "url": "..."}}
/// ```
pub async fn get_database(
    State(catalog): State<CatalogService>,
    Path((level, db)): Path<(String, String)>,
    repr: Representation,
) -> Reply {
    if let Err(e) = check_names(&[&level, &db]) {
        return repr.error(e);
    }
    repr.result(catalog.database(&level, &db).await)
}

/// Schemas of a database, default first.
///
/// `GET /db/{level}/{dbName}/schemas`
pub async fn list_schemas(
    State(catalog): State<CatalogService>,
    Path((level, db)): Path<(String, String)>,
    repr: Representation,
) -> Reply {
    if let Err(e) = check_names(&[&level, &db]) {
        return repr.error(e);
    }
    repr.results(catalog.schemas(&level, &db).await)
}

/// Tables of a database's default schema.
///
/// `GET /db/{level}/{dbName}/tables[?description=true]`
pub async fn list_tables(
    State(catalog): State<CatalogService>,
    Path((level, db)): Path<(String, String)>,
    Query(query): Query<TablesQuery>,
    repr: Representation,
) -> Reply {
    if let Err(e) = check_names(&[&level, &db]) {
        return repr.error(e);
    }
    repr.results(catalog.tables(&level, &db, query.description).await)
}

/// One table with columns ordered by ordinal.
///
/// `GET /db/{level}/{dbName}/tables/{tableName}`
pub async fn get_table(
    State(catalog): State<CatalogService>,
    Path((level, db, table)): Path<(String, String, String)>,
    repr: Representation,
) -> Reply {
    if let Err(e) = check_names(&[&level, &db, &table]) {
        return repr.error(e);
    }
    repr.result(catalog.table(&level, &db, &table).await)
}

/// Live `CREATE TABLE` text from the source database.
///
/// `GET /db/{level}/{dbName}/tables/{tableName}/schema`
pub async fn get_table_schema(
    State(catalog): State<CatalogService>,
    Path((level, db, table)): Path<(String, String, String)>,
    repr: Representation,
) -> Reply {
    if let Err(e) = check_names(&[&level, &db, &table]) {
        return repr.error(e);
    }
    repr.result(catalog.table_definition(&level, &db, &table).await)
}
