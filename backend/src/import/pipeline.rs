//! End-to-end CSV import.
//!
//! ```text
//! upload ─▶ extension ─▶ decode ─▶ headers ─▶ rows ─▶ dedup ─▶ reconcile ─▶ outcome
//!   │           │           │         │                  │          │
//! NoFile  WrongExtension  Decode  EmptyFile/       NoValidRows    Store
//!                                 MissingHeaders
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use ecotrack::{db::Database, import::import_file};
//!
//! let db = Database::open("ecotrack.db")?;
//! let outcome = import_file(&db, "emissions.csv".as_ref())?;
//! println!("{} created, {} updated", outcome.created, outcome.updated);
//! ```

use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

use super::dedup::deduplicate;
use super::reconcile::reconcile_and_persist;
use super::row::parse_row;
use crate::api::logs::ImportLog;
use crate::db::Database;
use crate::error::{ImportError, ImportResult};
use crate::parser::{decode_content, CsvDocument};

/// Suffix an uploaded file name must carry.
pub const CSV_EXTENSION: &str = ".csv";

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct CsvUpload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Whether the import created anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    /// At least one new record.
    Created,
    /// Only updates, or nothing to change.
    Accepted,
}

/// Result of a successful import.
#[derive(Debug, Clone, Serialize)]
pub struct ImportOutcome {
    pub import_id: Uuid,
    pub created: usize,
    pub updated: usize,
    /// Kept rows identical to what is already stored.
    pub unchanged: usize,
    /// Row errors and duplicate notices, in row order.
    pub errors: Vec<String>,
}

impl ImportOutcome {
    pub fn total_processed(&self) -> usize {
        self.created + self.updated
    }

    pub fn status(&self) -> ImportStatus {
        if self.created > 0 {
            ImportStatus::Created
        } else {
            ImportStatus::Accepted
        }
    }

    pub fn message(&self) -> String {
        if self.total_processed() == 0 {
            format!(
                "No changes: all {} records are already up to date",
                self.unchanged
            )
        } else {
            format!("Successfully processed {} records", self.total_processed())
        }
    }
}

/// Import an upload. `None` means the request carried no file.
pub fn import_upload(db: &Database, upload: Option<CsvUpload>) -> ImportResult<ImportOutcome> {
    let upload = upload.ok_or(ImportError::NoFile)?;
    check_extension(upload.file_name.as_deref())?;
    import_bytes(db, &upload.bytes)
}

/// Import a CSV file from disk.
pub fn import_file(db: &Database, path: &Path) -> ImportResult<ImportOutcome> {
    check_extension(path.file_name().and_then(|n| n.to_str()))?;
    let bytes = std::fs::read(path)?;
    import_bytes(db, &bytes)
}

fn check_extension(file_name: Option<&str>) -> ImportResult<()> {
    match file_name {
        Some(name) if name.ends_with(CSV_EXTENSION) => Ok(()),
        _ => Err(ImportError::WrongExtension),
    }
}

/// Import already-received bytes, skipping the file name check.
pub fn import_bytes(db: &Database, bytes: &[u8]) -> ImportResult<ImportOutcome> {
    let log = ImportLog::start();
    log.info(format!("📖 Reading CSV ({} bytes)...", bytes.len()));

    let result = run_import(db, bytes, &log);
    match &result {
        Ok(outcome) => log.success(format!(
            "✅ {} created, {} updated, {} unchanged, {} messages",
            outcome.created,
            outcome.updated,
            outcome.unchanged,
            outcome.errors.len()
        )),
        Err(err) => log.error(format!("❌ {}", err)),
    }
    result
}

fn run_import(db: &Database, bytes: &[u8], log: &ImportLog) -> ImportResult<ImportOutcome> {
    let content = decode_content(bytes)?;
    let document = CsvDocument::open(&content)?;

    let missing = document.missing_headers();
    if !missing.is_empty() {
        return Err(ImportError::MissingHeaders(missing));
    }
    log.success(format!(
        "Headers OK ({} columns, delimiter '{}')",
        document.headers().len(),
        format_delimiter(document.delimiter())
    ));

    // A structural CSV error stops the fold; per-row failures do not.
    let mut fatal: Option<ImportError> = None;
    let rows = document.into_rows().map_while(|raw| match raw {
        Ok(raw) => Some(parse_row(&raw)),
        Err(err) => {
            fatal = Some(err);
            None
        }
    });
    let dedup = deduplicate(rows);
    if let Some(err) = fatal {
        return Err(err);
    }

    for message in &dedup.messages {
        log.warning(message.as_str());
    }

    if dedup.kept.is_empty() {
        return Err(ImportError::NoValidRows {
            errors: dedup.messages,
        });
    }
    log.info(format!("🔄 Reconciling {} unique rows...", dedup.kept.len()));

    let summary = reconcile_and_persist(db, &dedup.kept)?;

    Ok(ImportOutcome {
        import_id: log.import_id(),
        created: summary.created,
        updated: summary.updated,
        unchanged: summary.unchanged,
        errors: dedup.messages,
    })
}

/// Format delimiter for display
fn format_delimiter(d: u8) -> &'static str {
    match d {
        b';' => ";",
        b',' => ",",
        b'\t' => "TAB",
        _ => "?",
    }
}
