//! Request and response bodies of the HTTP API.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::analytics::DEFAULT_TOP_EMITTERS;
use crate::import::{ImportOutcome, ImportStatus};

/// Body returned by `POST /api/emissions/import_csv/` on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub message: String,
    pub created: usize,
    pub updated: usize,
    /// Row errors and duplicate notices, in row order.
    pub errors: Vec<String>,
    pub total_processed: usize,
}

impl ImportResponse {
    /// 201 when anything was created, 200 otherwise.
    pub fn status_for(outcome: &ImportOutcome) -> StatusCode {
        match outcome.status() {
            ImportStatus::Created => StatusCode::CREATED,
            ImportStatus::Accepted => StatusCode::OK,
        }
    }
}

impl From<ImportOutcome> for ImportResponse {
    fn from(outcome: ImportOutcome) -> Self {
        Self {
            message: outcome.message(),
            created: outcome.created,
            updated: outcome.updated,
            total_processed: outcome.total_processed(),
            errors: outcome.errors,
        }
    }
}

/// Query string of `GET /api/emissions/stats/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsQuery {
    pub top: Option<usize>,
}

impl StatsQuery {
    pub fn top(&self) -> usize {
        self.top.unwrap_or(DEFAULT_TOP_EMITTERS)
    }
}
