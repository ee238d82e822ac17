//! Application configuration for the metaserv server.

use serde::Deserialize;

/// Application configuration loaded from environment variables.
///
/// Environment variables are prefixed with `METASERV_`:
/// - `METASERV_HOST`: Server bind address (default: "0.0.0.0")
/// - `METASERV_PORT`: Server port (default: 5000)
/// - `METASERV_DEBUG`: Enable debug mode (default: false)
/// - `METASERV_SERVER_NAME`: Server name for identification
/// - `METASERV_PUBLIC_URL`: Prefix for resource links (default: empty, links are relative)
/// - `METASERV_INIT_SCHEMA`: Create the catalog tables on startup (default: false)
/// - `METASERV_LOG_JSON`: Emit logs as JSON lines (default: false)
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable debug mode
    #[serde(default)]
    pub debug: bool,

    /// Server name for identification
    #[serde(default = "default_server_name")]
    pub server_name: String,

    /// URL prefix used when rendering resource links
    #[serde(default)]
    pub public_url: String,

    /// Run the catalog DDL before serving
    #[serde(default)]
    pub init_schema: bool,

    #[serde(default)]
    pub log_json: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_server_name() -> String {
    "metaserv".to_string()
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables are prefixed with `METASERV_`.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::prefixed("METASERV_").from_env::<AppConfig>()
    }

    /// Get the server bind address as a string suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Link prefix without a trailing slash.
    pub fn base_url(&self) -> String {
        self.public_url.trim_end_matches('/').to_string()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            server_name: default_server_name(),
            public_url: String::new(),
            init_schema: false,
            log_json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert!(!config.debug);
        assert!(!config.init_schema);
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_base_url_strips_trailing_slash() {
        let config = AppConfig {
            public_url: "https://lsst.example.org/meta/v1/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.base_url(), "https://lsst.example.org/meta/v1");
    }

    #[test]
    fn test_parse_from_vars() {
        let vars = vec![
            ("METASERV_PORT".to_string(), "8080".to_string()),
            ("METASERV_INIT_SCHEMA".to_string(), "true".to_string()),
        ];
        let config: AppConfig = envy::prefixed("METASERV_").from_iter(vars).unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.init_schema);
        assert_eq!(config.server_name, "metaserv");
    }
}
