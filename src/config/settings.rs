//! Settings structures for product-search configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main settings structure, loaded from `settings.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub engine: EngineSettings,
    pub outgoing: OutgoingSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse settings from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Merge with environment variables (PRODUCT_SEARCH_* prefix)
    pub fn merge_env(&mut self) {
        self.merge_vars(|name| std::env::var(name).ok());
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("PRODUCT_SEARCH_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("PRODUCT_SEARCH_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Some(val) = var("PRODUCT_SEARCH_ENGINE") {
            match val.to_lowercase().as_str() {
                "memory" => self.engine.kind = EngineKind::Memory,
                "elasticsearch" => self.engine.kind = EngineKind::Elasticsearch,
                _ => {}
            }
        }
        if let Some(val) = var("PRODUCT_SEARCH_ENGINE_URL") {
            self.engine.url = val;
        }
        if let Some(val) = var("PRODUCT_SEARCH_INDEX") {
            self.engine.index = val;
        }
        if let Some(val) = var("PRODUCT_SEARCH_ENGINE_USERNAME") {
            self.outgoing.username = Some(val);
        }
        if let Some(val) = var("PRODUCT_SEARCH_ENGINE_PASSWORD") {
            self.outgoing.password = Some(val);
        }
        if let Some(val) = var("PRODUCT_SEARCH_LOG_LEVEL") {
            self.logging.level = val;
        }
    }
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Deadline applied to each API call, in seconds
    pub request_deadline: f64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "127.0.0.1".to_string(),
            request_deadline: 10.0,
        }
    }
}

/// Which engine binding to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    #[default]
    Elasticsearch,
    Memory,
}

/// Search engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub kind: EngineKind,
    /// Base URL of the Elasticsearch cluster
    pub url: String,
    /// Index holding the product documents
    pub index: String,
    /// Server-side search timeout in seconds
    pub search_timeout: u64,
    /// JSON array of documents loaded into the memory engine at startup
    pub seed_file: Option<PathBuf>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            url: "http://localhost:9200".to_string(),
            index: "products".to_string(),
            search_timeout: 30,
            seed_file: None,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Extra headers to send
    pub extra_headers: HashMap<String, String>,
    /// Basic auth user
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            pool_maxsize: 20,
            verify_ssl: true,
            proxies: ProxySettings::default(),
            extra_headers: HashMap::new(),
            username: None,
            password: None,
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.engine.kind, EngineKind::Elasticsearch);
        assert_eq!(settings.engine.index, "products");
        assert_eq!(settings.outgoing.request_timeout, 30.0);
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = Settings::from_yaml(
            r#"
engine:
  kind: memory
  index: catalog
server:
  port: 9000
"#,
        )
        .unwrap();

        assert_eq!(settings.engine.kind, EngineKind::Memory);
        assert_eq!(settings.engine.index, "catalog");
        assert_eq!(settings.engine.url, "http://localhost:9200");
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.bind_address, "127.0.0.1");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("PRODUCT_SEARCH_PORT", "9999"),
            ("PRODUCT_SEARCH_ENGINE", "Memory"),
            ("PRODUCT_SEARCH_INDEX", "products-v2"),
            ("PRODUCT_SEARCH_ENGINE_USERNAME", "elastic"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.merge_vars(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(settings.server.port, 9999);
        assert_eq!(settings.engine.kind, EngineKind::Memory);
        assert_eq!(settings.engine.index, "products-v2");
        assert_eq!(settings.outgoing.username.as_deref(), Some("elastic"));
        assert_eq!(settings.outgoing.password, None);
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut settings = Settings::default();
        settings.merge_vars(|name| (name == "PRODUCT_SEARCH_PORT").then(|| "nope".to_string()));
        assert_eq!(settings.server.port, 8080);
    }
}
