//! Error types for the metadata catalog service.
//!
//! `AppError` covers both the ingestion taxonomy (duplicates, malformed
//! descriptions, schema mismatches, unknown owners, bad enum values) and the
//! read surface (not found, store unavailable). It implements `IntoResponse`
//! so handlers can return it directly.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::introspect::SchemaMismatch;

/// SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Unique-constraint violation (user email, project name, database name).
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Syntax error in a schema-description file.
    #[error("Malformed description at line {line}: {message}")]
    MalformedDescription { line: usize, message: String },

    /// The description disagrees with the live database.
    #[error("Schema mismatch: {}", format_mismatches(.0))]
    SchemaMismatch(Vec<SchemaMismatch>),

    /// Owner email does not name a registered user.
    #[error("Unknown owner: {0}")]
    UnknownOwner(String),

    /// Project name is not registered.
    #[error("Unknown project: {0}")]
    UnknownProject(String),

    /// Value outside an enumerated set (level, accessibility).
    #[error("Invalid {field} value '{value}'")]
    InvalidEnumValue { field: &'static str, value: String },

    /// No matching row.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The underlying store cannot be reached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any other database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad request error
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (reading description or auth files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_mismatches(mismatches: &[SchemaMismatch]) -> String {
    mismatches
        .iter()
        .map(|m| m.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    /// HTTP status and client-facing message for this error.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::Duplicate(_) => (StatusCode::CONFLICT, self.to_string()),
            AppError::MalformedDescription { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::SchemaMismatch(_) => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::UnknownOwner(_) | AppError::UnknownProject(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::InvalidEnumValue { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::StoreUnavailable(msg) => {
                tracing::error!(error = %msg, "Store unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Config(msg) => {
                tracing::error!(error = %msg, "Configuration error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            AppError::Io(e) => {
                tracing::error!(error = %e, "I/O error");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        }
    }

    /// True for errors that mean "no such resource".
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Short variant name, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Duplicate(_) => "duplicate",
            AppError::MalformedDescription { .. } => "malformed_description",
            AppError::SchemaMismatch(_) => "schema_mismatch",
            AppError::UnknownOwner(_) => "unknown_owner",
            AppError::UnknownProject(_) => "unknown_project",
            AppError::InvalidEnumValue { .. } => "invalid_enum_value",
            AppError::NotFound(_) => "not_found",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::Database(_) => "database",
            AppError::Validation(_) => "validation",
            AppError::BadRequest(_) => "bad_request",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Internal(_) => "internal",
        }
    }

    /// True when the request or input was at fault rather than the service.
    pub fn is_caller_error(&self) -> bool {
        !matches!(
            self,
            AppError::StoreUnavailable(_)
                | AppError::Database(_)
                | AppError::Config(_)
                | AppError::Io(_)
                | AppError::Internal(_)
        )
    }

    /// SQLSTATE of an underlying database error, if any.
    pub fn sqlstate(&self) -> Option<String> {
        match self {
            AppError::Database(e) => e
                .as_database_error()
                .and_then(|db| db.code())
                .map(|code| code.into_owned()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError.
pub type AppResult<T> = Result<T, AppError>;

/// True if the error is a PostgreSQL unique violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            return AppError::Duplicate(err.to_string());
        }
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_) => AppError::StoreUnavailable(err.to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<envy::Error> for AppError {
    fn from(err: envy::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
