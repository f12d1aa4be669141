//! Real-time import log streaming via Server-Sent Events (SSE).
//!
//! Import progress is published on a broadcast channel that `GET /api/logs`
//! streams to connected clients. Every entry is also emitted through `tracing`.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Log level for frontend display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Import this entry belongs to.
    pub import_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, import_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            import_id,
            timestamp: Utc::now(),
        }
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    /// Send a log entry to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let import_id = entry.import_id;
        match entry.level {
            LogLevel::Info | LogLevel::Success => {
                tracing::info!(%import_id, "{}", entry.message)
            }
            LogLevel::Warning => tracing::warn!(%import_id, "{}", entry.message),
            LogLevel::Error => tracing::error!(%import_id, "{}", entry.message),
        }

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-import logging handle that stamps every entry with the import id.
#[derive(Debug, Clone, Copy)]
pub struct ImportLog {
    import_id: Uuid,
}

impl ImportLog {
    pub fn start() -> Self {
        Self {
            import_id: Uuid::new_v4(),
        }
    }

    pub fn import_id(&self) -> Uuid {
        self.import_id
    }

    fn emit(&self, level: LogLevel, msg: impl Into<String>) {
        LOG_BROADCASTER.log(LogEntry::new(level, self.import_id, msg));
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.emit(LogLevel::Info, msg);
    }

    pub fn success(&self, msg: impl Into<String>) {
        self.emit(LogLevel::Success, msg);
    }

    pub fn warning(&self, msg: impl Into<String>) {
        self.emit(LogLevel::Warning, msg);
    }

    pub fn error(&self, msg: impl Into<String>) {
        self.emit(LogLevel::Error, msg);
    }
}
