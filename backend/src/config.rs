//! Runtime configuration read from the environment (and `.env`, when present).
//!
//! | Variable                  | Default       |
//! |---------------------------|---------------|
//! | `ECOTRACK_DB_PATH`        | `ecotrack.db` |
//! | `ECOTRACK_HOST`           | `0.0.0.0`     |
//! | `ECOTRACK_PORT`           | `7001`        |
//! | `ECOTRACK_MAX_UPLOAD_MB`  | `10`          |
//!
//! Unparseable values fall back to the default.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = "ecotrack.db";
pub const DEFAULT_PORT: u16 = 7001;
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: IpAddr,
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            db_path: get_env("ECOTRACK_DB_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            host: get_env("ECOTRACK_HOST")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.host),
            port: get_env("ECOTRACK_PORT")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.port),
            max_upload_bytes: get_env("ECOTRACK_MAX_UPLOAD_MB")
                .and_then(|v| v.trim().parse::<usize>().ok())
                .and_then(|mb| mb.checked_mul(1024 * 1024))
                .unwrap_or(defaults.max_upload_bytes),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
