//! Catalog database models.
//!
//! The catalog is a strict ownership tree: a repository groups one database,
//! which owns schemas, which own tables, which own ordered columns.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::description::TableDescription;
use crate::error::AppError;

/// Processing stage of a data product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Data Challenge
    DC,
    /// Alert Production
    L1,
    /// Data Release
    L2,
    /// User data
    L3,
    /// Unclassified development
    #[serde(rename = "dev")]
    Dev,
}

impl Level {
    pub const ALL: [Level; 5] = [Level::DC, Level::L1, Level::L2, Level::L3, Level::Dev];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::DC => "DC",
            Level::L1 => "L1",
            Level::L2 => "L2",
            Level::L3 => "L3",
            Level::Dev => "dev",
        }
    }
}

impl FromStr for Level {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| AppError::InvalidEnumValue {
                field: "level",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility tier of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accessibility {
    Released,
    Unreleased,
    Private,
}

impl Accessibility {
    pub const ALL: [Accessibility; 3] = [
        Accessibility::Released,
        Accessibility::Unreleased,
        Accessibility::Private,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Accessibility::Released => "released",
            Accessibility::Unreleased => "unreleased",
            Accessibility::Private => "private",
        }
    }
}

impl FromStr for Accessibility {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Accessibility::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| AppError::InvalidEnumValue {
                field: "accessibility",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for Accessibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully validated catalog, ready to be inserted in one transaction.
#[derive(Debug, Clone)]
pub struct NewCatalog {
    pub db_name: String,
    pub description: Option<String>,
    pub schema_name: String,
    pub host: String,
    pub port: i32,
    pub level: Level,
    pub data_release: String,
    pub accessibility: Accessibility,
    pub owner_id: i64,
    pub project_id: Option<i64>,
    /// Tables in file order; column position is the stored ordinal.
    pub tables: Vec<TableDescription>,
}

/// Database joined with its repository and default schema.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DatabaseRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub conn_host: Option<String>,
    pub conn_port: Option<i32>,
    pub repo_id: Option<i64>,
    pub level: Option<String>,
    pub data_release: Option<String>,
    pub accessibility: Option<String>,
    pub create_time: Option<DateTime<Utc>>,
    pub owner_email: Option<String>,
    pub project: Option<String>,
    pub default_schema_id: Option<i64>,
    pub default_schema: Option<String>,
}

/// One schema of a database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SchemaRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub is_default_schema: bool,
}

/// Table row without its columns.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TableRecord {
    pub id: i64,
    pub schema_id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// One column, ordered by `ordinal` within its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ColumnRecord {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub ordinal: i32,
    pub ucd: Option<String>,
    pub unit: Option<String>,
    pub datatype: String,
    pub nullable: bool,
    pub arraysize: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_round_trips_through_str() {
        for level in Level::ALL {
            assert_eq!(level.as_str().parse::<Level>().unwrap(), level);
        }
        assert_eq!(serde_json::to_string(&Level::Dev).unwrap(), "\"dev\"");
    }

    #[test]
    fn test_level_rejects_unknown_value() {
        let err = "l2".parse::<Level>().unwrap_err();
        assert!(matches!(err, AppError::InvalidEnumValue { field: "level", .. }));
    }

    #[test]
    fn test_accessibility_parse() {
        assert_eq!(
            "unreleased".parse::<Accessibility>().unwrap(),
            Accessibility::Unreleased
        );
        assert!("public".parse::<Accessibility>().is_err());
    }
}
