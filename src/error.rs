use crate::http::Method;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Not found")]
    NotFound,
    #[error("Method not allowed")]
    MethodNotAllowed(Vec<Method>),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("templates renderer not provided")]
    RendererNotConfigured,
    #[error("render error: {0}")]
    RenderError(String),
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Panic: {0}")]
    PanicError(String),
    #[error("request scope has no server attached")]
    MissingServer,
    #[error("routes not mounted")]
    RoutesNotMounted,
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("logging setup failed: {0}")]
    LoggingError(String),
    #[error(transparent)]
    ConfigError(#[from] ConfigError),
}

impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::BadRequest(_) => 400,
            ServerError::NotFound => 404,
            ServerError::MethodNotAllowed(_) => 405,
            ServerError::IoError(_)
            | ServerError::RendererNotConfigured
            | ServerError::RenderError(_)
            | ServerError::JsonError(_)
            | ServerError::PanicError(_)
            | ServerError::MissingServer
            | ServerError::RoutesNotMounted
            | ServerError::InternalError(_)
            | ServerError::LoggingError(_)
            | ServerError::ConfigError(_) => 500,
        }
    }
}

/// Errors raised while loading or validating a [`ServerConfig`](crate::config::ServerConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

pub type ServerResult<T> = Result<T, ServerError>;
