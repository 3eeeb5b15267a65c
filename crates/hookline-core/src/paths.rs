//! Centralized path utilities
//!
//! All application paths in one place for consistency

use std::path::{Path, PathBuf};

const CONFIG_DIR_NAME: &str = ".hookline";
const SETTINGS_FILE_NAME: &str = "settings.json";

/// Get the hookline config directory (~/.hookline)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the logs directory (~/.hookline/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Get the sessions directory (~/.hookline/sessions)
pub fn sessions_dir() -> PathBuf {
    config_dir().join("sessions")
}

/// Ensure the sessions directory exists, creating it if necessary
pub fn ensure_sessions_dir() -> std::io::Result<PathBuf> {
    let dir = sessions_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// User-level settings (~/.hookline/settings.json)
pub fn user_settings_path() -> PathBuf {
    config_dir().join(SETTINGS_FILE_NAME)
}

/// Project-level settings (<project>/.hookline/settings.json)
pub fn project_settings_path(working_dir: &Path) -> PathBuf {
    working_dir.join(CONFIG_DIR_NAME).join(SETTINGS_FILE_NAME)
}

/// Transcript file handed to hooks (~/.hookline/sessions/<id>.jsonl)
pub fn transcript_path(session_id: &str) -> PathBuf {
    sessions_dir().join(format!("{}.jsonl", session_id))
}
