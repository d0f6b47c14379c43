use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Generator API error: {0}")]
    GeneratorApi(String),

    #[error("Generator returned unusable content: {0}")]
    InvalidContent(String),

    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Failures that only cost one generation attempt; the batch carries on.
    pub fn is_generation_failure(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Json(_)
                | Self::GeneratorApi(_)
                | Self::InvalidContent(_)
                | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
