//! Call-site logging for catalog operations.
//!
//! `ResultExt::log` records a failed [`AppResult`] with the caller's source
//! location and the error's kind. Failures caused by the caller (unknown
//! owner, duplicate name, malformed description, ...) are logged at WARN;
//! store and internal failures at ERROR, with the SQLSTATE when there is one.

use std::panic::Location;

use tracing::Level;

use crate::error::{AppError, AppResult};

pub trait ResultExt<T> {
    /// Log the error with `context` and return the result unchanged.
    ///
    /// ```ignore
    /// use metaserv::result_ext::ResultExt;
    ///
    /// let id = store.insert_user(&user).await.log("adding user")?;
    /// ```
    fn log<S: ToString>(self, context: S) -> AppResult<T>;
}

/// Level a failure is logged at.
pub fn severity(err: &AppError) -> Level {
    if err.is_caller_error() {
        Level::WARN
    } else {
        Level::ERROR
    }
}

impl<T> ResultExt<T> for AppResult<T> {
    #[track_caller]
    fn log<S: ToString>(self, context: S) -> AppResult<T> {
        if let Err(ref e) = self {
            let location = Location::caller();
            let at = format!("{}:{}", location.file(), location.line());
            let context = context.to_string();
            if severity(e) == Level::WARN {
                tracing::warn!(
                    target: "metaserv",
                    kind = e.kind(),
                    error = %e,
                    at = %at,
                    context = %context,
                    "Request rejected"
                );
            } else {
                tracing::error!(
                    target: "metaserv",
                    kind = e.kind(),
                    sqlstate = e.sqlstate().as_deref(),
                    error = %e,
                    at = %at,
                    context = %context,
                    "Catalog operation failed"
                );
            }
        }
        self
    }
}

pub trait OptionResultExt<T> {
    /// Note a catalog row that should exist but does not.
    fn log_none<S: ToString>(self, context: S) -> Option<T>;
}

impl<T> OptionResultExt<T> for Option<T> {
    #[track_caller]
    fn log_none<S: ToString>(self, context: S) -> Option<T> {
        if self.is_none() {
            let location = Location::caller();
            tracing::warn!(
                target: "metaserv",
                at = %format!("{}:{}", location.file(), location.line()),
                missing = %context.to_string(),
                "Catalog row missing"
            );
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_passes_ok_through() {
        let result: AppResult<i64> = Ok(7);
        assert_eq!(result.log("adding project").unwrap(), 7);
    }

    #[test]
    fn test_log_keeps_error_variant() {
        let result: AppResult<i64> = Err(AppError::Duplicate("project 'LSST'".into()));
        let err = result.log("adding project").unwrap_err();
        assert!(matches!(err, AppError::Duplicate(_)));
    }

    #[test]
    fn test_caller_errors_are_warnings() {
        for err in [
            AppError::Duplicate("database 'sdss'".into()),
            AppError::UnknownOwner("jane@lsst.org".into()),
            AppError::NotFound("Database 'x' not found".into()),
            AppError::MalformedDescription {
                line: 3,
                message: "column 'id' has no datatype".into(),
            },
        ] {
            assert_eq!(severity(&err), Level::WARN, "{}", err.kind());
        }
    }

    #[test]
    fn test_service_errors_are_errors() {
        for err in [
            AppError::StoreUnavailable("pool timed out".into()),
            AppError::Internal("boom".into()),
            AppError::Config("POSTGRES_PORT".into()),
        ] {
            assert_eq!(severity(&err), Level::ERROR, "{}", err.kind());
        }
        assert_eq!(AppError::StoreUnavailable("x".into()).sqlstate(), None);
    }

    #[test]
    fn test_log_none_keeps_value() {
        assert_eq!(Some("sdss").log_none("default schema"), Some("sdss"));
        assert!(None::<i64>.log_none("default schema").is_none());
    }
}
