//! # EcoTrack - emissions records and CSV import reconciliation
//!
//! EcoTrack stores yearly energy consumption and CO2 emissions per company and
//! sector, and keeps that store in sync with CSV uploads.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│    Dedup    │────▶│  Reconcile  │
//! │ (BOM/UTF-8) │     │ (rows+errs) │     │ (per key)   │     │(1 SQLite tx)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ecotrack::{db::Database, import::import_file};
//!
//! let db = Database::open("ecotrack.db")?;
//! let outcome = import_file(&db, "emissions.csv".as_ref())?;
//! println!("{}", outcome.message());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment configuration
//! - [`models`] - Domain models (EmissionRecord, NaturalKey, ParsedRow)
//! - [`parser`] - CSV decoding and header/row extraction
//! - [`import`] - Row parsing, deduplication, reconciliation, orchestration
//! - [`db`] - SQLite record store
//! - [`analytics`] - Dashboard aggregates
//! - [`api`] - HTTP API server

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Import
pub mod import;

// Storage
pub mod db;

// Reporting
pub mod analytics;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ImportError, ImportResult, RowError, RowFailure, ServerError, ServerResult, StoreError,
    StoreResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{EmissionRecord, NaturalKey, ParsedRow, RecordInput, RecordPatch};

// =============================================================================
// Re-exports - Import
// =============================================================================

pub use import::{import_bytes, import_file, import_upload, CsvUpload, ImportOutcome};

// =============================================================================
// Re-exports - Storage & API
// =============================================================================

pub use analytics::DashboardStats;
pub use config::Config;
pub use db::{Database, RecordQuery};
pub use api::{router, start_server, AppState};
