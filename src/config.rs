//! Server configuration loaded from TOML.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 8080
//! public = "./public"
//! log_requests = true
//!
//! [log]
//! env = "production"
//! level = "info"
//!
//! [session]
//! cookie_name = "sid"
//! lifetime_secs = 3600
//!
//! [templates]
//! root = "./templates"
//! ```

use crate::error::ConfigError;
use crate::logging::Environment;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub public: PathBuf,
    pub log_requests: bool,
    pub disable_load_and_save: bool,
    pub log: LogConfig,
    /// Sessions are enabled when this section is present.
    pub session: Option<SessionConfig>,
    /// Templates are enabled when this section is present.
    pub templates: Option<TemplatesConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public: PathBuf::from("./public"),
            log_requests: false,
            disable_load_and_save: false,
            log: LogConfig::default(),
            session: None,
            templates: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub env: Environment,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            env: Environment::Dev,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub lifetime_secs: u64,
    pub max_sessions: u64,
    pub secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            lifetime_secs: 24 * 60 * 60,
            max_sessions: 10_000,
            secure: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub root: PathBuf,
    pub ext: String,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./templates"),
            ext: ".html".to_string(),
        }
    }
}

pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();
    if config.port == 0 {
        errors.push("port must be non-zero".to_string());
    }
    if config.host.trim().is_empty() {
        errors.push("host must not be empty".to_string());
    }
    if let Some(session) = &config.session {
        if session.cookie_name.trim().is_empty() {
            errors.push("session.cookie_name must not be empty".to_string());
        }
        if session.lifetime_secs == 0 {
            errors.push("session.lifetime_secs must be non-zero".to_string());
        }
    }
    if let Some(templates) = &config.templates {
        if !templates.ext.starts_with('.') {
            errors.push(format!("templates.ext {:?} must start with '.'", templates.ext));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
