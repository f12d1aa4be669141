//! Error types for the EcoTrack import pipeline and record store.
//!
//! The hierarchy mirrors the stages of an import:
//!
//! - [`RowError`] - per-row parse failures (recoverable, row is skipped)
//! - [`StoreError`] - persistence failures (SQLite, missing records, key clashes)
//! - [`ImportError`] - terminal outcomes of a whole import
//! - [`ServerError`] - HTTP-level failures of the record endpoints
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::models::NaturalKey;

// =============================================================================
// Row Errors
// =============================================================================

/// Why a single data row could not be turned into a [`crate::models::ParsedRow`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// At least one required column is absent or blank.
    #[error("Missing required fields")]
    MissingFields,

    /// A numeric column did not parse.
    #[error("Invalid data format - invalid value '{value}' for '{field}'")]
    InvalidFormat { field: &'static str, value: String },
}

/// A [`RowError`] located in the source file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Row {row}: {error}")]
pub struct RowFailure {
    /// 1-based row number, the header being row 1.
    pub row: usize,
    pub error: RowError,
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by [`crate::db::Database`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No record with this id.
    #[error("Record {0} not found")]
    NotFound(i64),

    /// Another record already owns this natural key.
    #[error("A record for {0} already exists")]
    Duplicate(NaturalKey),

    /// Rejected input on direct create/update.
    #[error("Invalid record: {0}")]
    Invalid(String),

    /// The connection mutex was poisoned by a panicking holder.
    #[error("Database connection lock poisoned")]
    LockPoisoned,
}

// =============================================================================
// Import Errors (terminal)
// =============================================================================

/// Terminal outcomes of an import. Per-row problems are never reported here,
/// except collectively through [`ImportError::NoValidRows`].
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("No file provided")]
    NoFile,

    #[error("File must be a CSV")]
    WrongExtension,

    #[error("CSV file is empty or has no headers")]
    EmptyFile,

    /// Missing header names, in required-header order.
    #[error("Missing required CSV headers: {}", .0.join(", "))]
    MissingHeaders(Vec<String>),

    /// Nothing survived parsing and deduplication.
    #[error("No valid rows to process")]
    NoValidRows { errors: Vec<String> },

    /// The upload is not valid text.
    #[error("Failed to process CSV: {0}")]
    Decode(String),

    /// The CSV structure could not be read.
    #[error("Failed to process CSV: {0}")]
    Csv(String),

    /// The batch could not be persisted; nothing was written.
    #[error("Failed to process CSV: {0}")]
    Store(#[from] StoreError),

    /// The import worker died before reporting back.
    #[error("Failed to process CSV: {0}")]
    Task(String),

    /// Reading the upload from disk failed (CLI imports).
    #[error("Failed to process CSV: {0}")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    /// HTTP status equivalent of this outcome.
    pub fn status(&self) -> StatusCode {
        match self {
            ImportError::NoFile
            | ImportError::WrongExtension
            | ImportError::EmptyFile
            | ImportError::MissingHeaders(_)
            | ImportError::NoValidRows { .. } => StatusCode::BAD_REQUEST,
            ImportError::Decode(_)
            | ImportError::Csv(_)
            | ImportError::Store(_)
            | ImportError::Task(_)
            | ImportError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Accumulated per-row log, if the import got that far.
    pub fn row_errors(&self) -> Option<&[String]> {
        match self {
            ImportError::NoValidRows { errors } => Some(errors),
            _ => None,
        }
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Csv(err.to_string())
    }
}

impl IntoResponse for ImportError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self.row_errors() {
            Some(errors) => json!({ "error": self.to_string(), "errors": errors }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors for the record endpoints.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Store error.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Import endpoint failure; keeps its own body shape.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::Store(StoreError::Duplicate(_) | StoreError::Invalid(_)) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Store(_) | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Import(err) => err.status(),
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        if let ServerError::Import(err) = self {
            return err.into_response();
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type for HTTP handlers.
pub type ServerResult<T> = Result<T, ServerError>;
