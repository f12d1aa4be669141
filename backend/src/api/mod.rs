//! HTTP API: record collection, CSV import endpoint and the SSE import log.

pub mod logs;
pub mod records;
pub mod server;
pub mod types;

pub use logs::{ImportLog, LogBroadcaster, LogEntry, LogLevel, LOG_BROADCASTER};
pub use server::{router, start_server, AppState};
pub use types::{ImportResponse, StatsQuery};
