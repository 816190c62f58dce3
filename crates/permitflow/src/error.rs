use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum PermitFlowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] crate::telemetry::TelemetryError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Invalid permit type '{name}': {reason}")]
    InvalidPermitType { name: String, reason: String },
}

/// Reasons an uploaded evidence file is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvidenceError {
    #[error("File type '{mime_type}' is not allowed (allowed: {allowed})")]
    UnsupportedMimeType { mime_type: String, allowed: String },

    #[error("File '{filename}' is {size} bytes, the maximum is {max} bytes")]
    TooLarge {
        filename: String,
        size: u64,
        max: u64,
    },

    #[error("File '{0}' is empty")]
    Empty(String),
}

/// Coarse classification of a [`LifecycleError`], for callers that render
/// user-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Forbidden,
    InvalidState,
    Internal,
}

/// Errors raised by the catalog, job and permit lifecycles.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Evidence rejected: {0}")]
    Evidence(#[from] EvidenceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl LifecycleError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LifecycleError::NotFound { .. } => ErrorKind::NotFound,
            LifecycleError::Validation(_) | LifecycleError::Evidence(_) => ErrorKind::Validation,
            LifecycleError::Forbidden(_) => ErrorKind::Forbidden,
            LifecycleError::InvalidState(_) => ErrorKind::InvalidState,
            LifecycleError::Database(_) => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for LifecycleError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Database(DatabaseError::Sqlite(value))
    }
}

pub type Result<T> = std::result::Result<T, PermitFlowError>;
