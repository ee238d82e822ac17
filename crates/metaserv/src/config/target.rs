//! Connection settings for a database whose schema is checked on ingest.
//!
//! Accepts either a `postgres://` URL or a client option file:
//!
//! ```text
//! [client]
//! host     = qserv-db
//! port     = 5432
//! user     = qsmaster
//! password = secret
//! database = sdss_stripe82
//! ```

use std::path::Path;
use std::str::FromStr;

use sqlx::postgres::PgConnectOptions;

use crate::error::{AppError, AppResult};

/// Where to reach a target database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetConfig {
    Url(String),
    Options {
        host: String,
        port: u16,
        user: Option<String>,
        password: Option<String>,
        database: Option<String>,
    },
}

impl TargetConfig {
    /// Read a target from a URL or an option file path.
    pub async fn load(spec: &str) -> AppResult<Self> {
        if is_url(spec) {
            return Ok(TargetConfig::Url(spec.to_string()));
        }
        let path = expand_home(spec);
        let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
            AppError::Config(format!("cannot read auth file {}: {}", path.display(), e))
        })?;
        Self::parse_option_file(&text)
    }

    /// Parse the `[client]` section of an option file.
    pub fn parse_option_file(text: &str) -> AppResult<Self> {
        let mut in_client = false;
        let mut host = None;
        let mut port = None;
        let mut user = None;
        let mut password = None;
        let mut database = None;

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                in_client = line[1..line.len() - 1].trim().eq_ignore_ascii_case("client");
                continue;
            }
            if !in_client {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                AppError::Config(format!("auth file line {}: expected key = value", idx + 1))
            })?;
            let value = unquote(value.trim()).to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "host" => host = Some(value),
                "port" => {
                    let parsed = value.parse::<u16>().map_err(|_| {
                        AppError::Config(format!("auth file line {}: invalid port '{}'", idx + 1, value))
                    })?;
                    port = Some(parsed);
                }
                "user" => user = Some(value),
                "password" => password = Some(value),
                "database" | "db" => database = Some(value),
                // socket, ssl options and friends do not apply here
                _ => {}
            }
        }

        let host = host.ok_or_else(|| AppError::Config("auth file has no [client] host".to_string()))?;
        Ok(TargetConfig::Options {
            host,
            port: port.unwrap_or(5432),
            user,
            password,
            database,
        })
    }

    pub fn connect_options(&self) -> AppResult<PgConnectOptions> {
        match self {
            TargetConfig::Url(url) => PgConnectOptions::from_str(url)
                .map_err(|e| AppError::Config(format!("invalid target URL: {}", e))),
            TargetConfig::Options {
                host,
                port,
                user,
                password,
                database,
            } => {
                let mut options = PgConnectOptions::new().host(host).port(*port);
                if let Some(user) = user {
                    options = options.username(user);
                }
                if let Some(password) = password {
                    options = options.password(password);
                }
                if let Some(database) = database {
                    options = options.database(database);
                }
                Ok(options)
            }
        }
    }
}

fn is_url(spec: &str) -> bool {
    spec.starts_with("postgres://") || spec.starts_with("postgresql://")
}

fn unquote(value: &str) -> &str {
    for q in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(q) && value.ends_with(q) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn expand_home(spec: &str) -> std::path::PathBuf {
    if let Some(rest) = spec.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return Path::new(&home).join(rest);
        }
    }
    Path::new(spec).to_path_buf()
}
