//! Live database introspection and description cross-checking.
//!
//! Ingestion can verify a schema description against the database it
//! describes, and the read API renders table definitions straight from the
//! source database. Both go through [`SchemaInspector`], which reads
//! PostgreSQL's `information_schema`.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::FromRow;

use crate::db::DbPool;
use crate::description::{ColumnDescription, SchemaDescription, TableDescription};
use crate::error::AppResult;

/// A column as reported by `information_schema.columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct LiveColumn {
    pub name: String,
    /// `data_type`; `ARRAY` for array columns.
    pub data_type: String,
    /// `udt_name`; for arrays the element type prefixed with `_`.
    pub udt_name: String,
    pub nullable: bool,
    pub ordinal: i32,
    pub char_length: Option<i32>,
    pub numeric_precision: Option<i32>,
    pub numeric_scale: Option<i32>,
}

impl LiveColumn {
    pub fn is_array(&self) -> bool {
        self.data_type.eq_ignore_ascii_case("ARRAY")
    }

    /// Element type name used for type-family comparison.
    pub fn element_type(&self) -> &str {
        if self.is_array() {
            self.udt_name.trim_start_matches('_')
        } else {
            &self.data_type
        }
    }

    /// SQL spelling of the column type, with length/precision when known.
    pub fn sql_type(&self) -> String {
        if self.is_array() {
            return format!("{}[]", self.element_type());
        }
        match (self.char_length, self.numeric_precision, self.numeric_scale) {
            (Some(len), _, _) => format!("{}({})", self.data_type, len),
            (None, Some(p), Some(s)) if self.data_type == "numeric" => {
                format!("{}({},{})", self.data_type, p, s)
            }
            _ => self.data_type.clone(),
        }
    }
}

/// Read access to a live database's catalog.
#[async_trait]
pub trait SchemaInspector: Send + Sync {
    /// Whether the namespace exists.
    async fn schema_exists(&self, schema: &str) -> AppResult<bool>;

    /// Table names in the namespace.
    async fn tables(&self, schema: &str) -> AppResult<Vec<String>>;

    /// Columns of one table ordered by ordinal; empty when the table is absent.
    async fn columns(&self, schema: &str, table: &str) -> AppResult<Vec<LiveColumn>>;
}

/// [`SchemaInspector`] over a PostgreSQL pool.
#[derive(Clone)]
pub struct PgInspector {
    pool: DbPool,
}

impl PgInspector {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SchemaInspector for PgInspector {
    async fn schema_exists(&self, schema: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM information_schema.schemata WHERE schema_name = $1)",
        )
        .bind(schema)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn tables(&self, schema: &str) -> AppResult<Vec<String>> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables WHERE table_schema = $1 ORDER BY table_name",
        )
        .bind(schema)
        .fetch_all(&self.pool)
        .await?;
        Ok(tables)
    }

    async fn columns(&self, schema: &str, table: &str) -> AppResult<Vec<LiveColumn>> {
        let columns = sqlx::query_as::<_, LiveColumn>(
            r#"
            SELECT column_name::text AS name,
                   data_type::text AS data_type,
                   udt_name::text AS udt_name,
                   (is_nullable = 'YES') AS nullable,
                   ordinal_position::int4 AS ordinal,
                   character_maximum_length::int4 AS char_length,
                   numeric_precision::int4 AS numeric_precision,
                   numeric_scale::int4 AS numeric_scale
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await?;
        Ok(columns)
    }
}

/// Coarse type classes used to decide whether a described type and a live
/// type are compatible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFamily {
    Integer,
    Float,
    Decimal,
    Boolean,
    String,
    Temporal,
    Binary,
    Other(String),
}

impl TypeFamily {
    /// Classify a MySQL- or PostgreSQL-style type name.
    pub fn of(datatype: &str) -> Self {
        let lower = datatype.trim().to_ascii_lowercase();
        let base = lower
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .trim_end_matches(" unsigned")
            .trim();
        match base {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2"
            | "int4" | "int8" | "serial" | "bigserial" | "smallserial" | "serial4"
            | "serial8" => TypeFamily::Integer,
            "float" | "double" | "double precision" | "real" | "float4" | "float8" => {
                TypeFamily::Float
            }
            "decimal" | "numeric" => TypeFamily::Decimal,
            "bool" | "boolean" | "bit" => TypeFamily::Boolean,
            "char" | "character" | "varchar" | "character varying" | "bpchar" | "text"
            | "tinytext" | "mediumtext" | "longtext" | "enum" | "name" => TypeFamily::String,
            "date" | "time" | "datetime" | "timestamp" | "timestamptz" | "timetz" | "year"
            | "interval" => TypeFamily::Temporal,
            t if t.starts_with("timestamp") || t.starts_with("time ") => TypeFamily::Temporal,
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary"
            | "bytea" => TypeFamily::Binary,
            other => TypeFamily::Other(other.to_string()),
        }
    }
}

/// One disagreement between a description and the live database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaMismatch {
    SchemaNotFound {
        schema: String,
    },
    TableNotInDatabase {
        table: String,
    },
    ColumnNotInTable {
        table: String,
        column: String,
    },
    ColumnNotInDescription {
        table: String,
        column: String,
    },
    TypeMismatch {
        table: String,
        column: String,
        described: String,
        live: String,
    },
}

impl fmt::Display for SchemaMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaMismatch::SchemaNotFound { schema } => {
                write!(f, "schema '{}' not found in target database", schema)
            }
            SchemaMismatch::TableNotInDatabase { table } => {
                write!(f, "table '{}' described but missing in database", table)
            }
            SchemaMismatch::ColumnNotInTable { table, column } => {
                write!(f, "column '{}.{}' described but missing in database", table, column)
            }
            SchemaMismatch::ColumnNotInDescription { table, column } => {
                write!(f, "column '{}.{}' exists in database but is not described", table, column)
            }
            SchemaMismatch::TypeMismatch {
                table,
                column,
                described,
                live,
            } => write!(
                f,
                "column '{}.{}' described as {} but database has {}",
                table, column, described, live
            ),
        }
    }
}

/// The live spelling of `name`. PostgreSQL folds unquoted identifiers to
/// lowercase, so an exact match wins and otherwise case is ignored.
pub fn match_table_name<'a>(live_tables: &'a [String], name: &str) -> Option<&'a str> {
    live_tables
        .iter()
        .find(|t| t.as_str() == name)
        .or_else(|| live_tables.iter().find(|t| t.eq_ignore_ascii_case(name)))
        .map(String::as_str)
}

/// Live columns of the table the catalog calls `name`; empty when the
/// table is absent from `schema`.
pub async fn live_columns(
    inspector: &dyn SchemaInspector,
    schema: &str,
    name: &str,
) -> AppResult<(String, Vec<LiveColumn>)> {
    let live_tables = inspector.tables(schema).await?;
    let Some(live_name) = match_table_name(&live_tables, name) else {
        return Ok((name.to_string(), Vec::new()));
    };
    let columns = inspector.columns(schema, live_name).await?;
    Ok((live_name.to_string(), columns))
}

/// Cross-check a parsed description against the live `schema`.
///
/// Returns every mismatch found; an empty list means the description is
/// consistent. Tables that exist only in the database are allowed.
pub async fn check_consistency(
    inspector: &dyn SchemaInspector,
    schema: &str,
    description: &SchemaDescription,
) -> AppResult<Vec<SchemaMismatch>> {
    if !inspector.schema_exists(schema).await? {
        return Ok(vec![SchemaMismatch::SchemaNotFound {
            schema: schema.to_string(),
        }]);
    }

    let live_tables = inspector.tables(schema).await?;
    let mut mismatches = Vec::new();
    for table in &description.tables {
        let Some(live_name) = match_table_name(&live_tables, &table.name) else {
            mismatches.push(SchemaMismatch::TableNotInDatabase {
                table: table.name.clone(),
            });
            continue;
        };
        let live_columns = inspector.columns(schema, live_name).await?;
        mismatches.extend(compare_table(table, &live_columns));
    }

    if !mismatches.is_empty() {
        tracing::warn!(schema, count = mismatches.len(), "Description does not match database");
    }
    Ok(mismatches)
}

/// Compare one described table with its live columns.
pub fn compare_table(table: &TableDescription, live: &[LiveColumn]) -> Vec<SchemaMismatch> {
    let mut mismatches = Vec::new();
    for column in &table.columns {
        match live.iter().find(|c| c.name.eq_ignore_ascii_case(&column.name)) {
            None => mismatches.push(SchemaMismatch::ColumnNotInTable {
                table: table.name.clone(),
                column: column.name.clone(),
            }),
            Some(live_column) => {
                if !compatible(column, live_column) {
                    mismatches.push(SchemaMismatch::TypeMismatch {
                        table: table.name.clone(),
                        column: column.name.clone(),
                        described: described_type(column),
                        live: live_column.sql_type(),
                    });
                }
            }
        }
    }
    for live_column in live {
        if table.column(&live_column.name).is_none() {
            mismatches.push(SchemaMismatch::ColumnNotInDescription {
                table: table.name.clone(),
                column: live_column.name.clone(),
            });
        }
    }
    mismatches
}

fn compatible(column: &ColumnDescription, live: &LiveColumn) -> bool {
    column.arraysize.is_some() == live.is_array()
        && TypeFamily::of(&column.datatype) == TypeFamily::of(live.element_type())
}

fn described_type(column: &ColumnDescription) -> String {
    match column.arraysize {
        Some(n) => format!("{}[{}]", column.datatype, n),
        None => column.datatype.clone(),
    }
}

/// Render a `CREATE TABLE` statement from live columns.
pub fn render_create_table(schema: &str, table: &str, columns: &[LiveColumn]) -> String {
    let body = columns
        .iter()
        .map(|c| {
            let null = if c.nullable { "" } else { " NOT NULL" };
            format!("    {} {}{}", quote_ident(&c.name), c.sql_type(), null)
        })
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "CREATE TABLE {}.{} (\n{}\n);",
        quote_ident(schema),
        quote_ident(table),
        body
    )
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
