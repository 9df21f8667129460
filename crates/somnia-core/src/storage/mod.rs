mod config;
pub mod database;
pub mod kv;

pub use config::{
    AlarmConfig, Config, JournalConfig, NotificationsConfig, SleepConfig, MAX_TICK_SECS,
    MAX_TRIGGER_WINDOW_SECS,
};
pub use database::Database;
pub use kv::{keys, load_json, save_json, KeyValueStore, MemoryStore};

use std::path::PathBuf;

/// Returns the data directory.
///
/// `SOMNIA_HOME` wins when set; otherwise `~/.config/somnia[-dev]/` based on
/// `SOMNIA_ENV` (set `SOMNIA_ENV=dev` for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, std::io::Error> {
    let dir = match std::env::var_os("SOMNIA_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("SOMNIA_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("somnia-dev")
            } else {
                base_dir.join("somnia")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
