mod config;
pub mod database;

pub use config::{Config, TimerSettings};
pub use database::{Database, SessionRecord, Stats};

use std::path::PathBuf;

/// Returns `~/.config/tracklog[-dev]/` based on TRACKLOG_ENV.
///
/// Set TRACKLOG_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the config directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("TRACKLOG_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("tracklog-dev")
    } else {
        base_dir.join("tracklog")
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
