//! Global tracing subscriber setup.
//!
//! Production and staging log JSON lines to stdout with file and line of
//! every event. Test and dev log compact human readable lines to stderr.
//! `RUST_LOG` takes precedence over the configured level.

use crate::error::ServerError;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt as tfmt, EnvFilter};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    Staging,
    Test,
    #[default]
    Dev,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Staging => "staging",
            Environment::Test => "test",
            Environment::Dev => "dev",
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, Environment::Production | Environment::Staging)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "test" => Ok(Environment::Test),
            "dev" => Ok(Environment::Dev),
            other => Err(ServerError::LoggingError(format!("unknown environment {other:?}"))),
        }
    }
}

fn filter(level: &str) -> Result<EnvFilter, ServerError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| ServerError::LoggingError(e.to_string())),
    }
}

/// Installs the global subscriber. Fails if `level` is not a valid filter
/// directive or a subscriber is already installed.
pub fn init_logging(env: Environment, level: &str) -> Result<(), ServerError> {
    let filter = filter(level)?;

    let result = if env.is_structured() {
        let layer = tfmt::layer()
            .json()
            .with_current_span(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stdout);
        tracing_subscriber::registry().with(filter).with(layer).try_init()
    } else {
        let layer = tfmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        tracing_subscriber::registry().with(filter).with(layer).try_init()
    };

    result.map_err(|e| ServerError::LoggingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parsing() {
        assert_eq!("Production".parse::<Environment>().unwrap(), Environment::Production);
        assert!("qa".parse::<Environment>().is_err());
        assert!(Environment::Staging.is_structured());
        assert!(!Environment::default().is_structured());
    }

    #[test]
    fn second_init_fails() {
        let _ = init_logging(Environment::Test, "debug");
        assert!(init_logging(Environment::Test, "debug").is_err());
    }
}
