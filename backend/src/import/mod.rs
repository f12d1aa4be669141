//! CSV import: row parsing, in-file deduplication, reconciliation with the store.
//!
//! [`pipeline`] drives the stages; the other modules are pure steps except
//! [`reconcile`], which owns the single write transaction.

pub mod dedup;
pub mod pipeline;
pub mod reconcile;
pub mod row;

pub use dedup::{deduplicate, DedupOutcome};
pub use pipeline::{
    import_bytes, import_file, import_upload, CsvUpload, ImportOutcome, ImportStatus,
    CSV_EXTENSION,
};
pub use reconcile::{reconcile_and_persist, ReconcilePlan, ReconcileSummary};
pub use row::parse_row;
