//! XDG directory helpers for config/log locations.

use std::path::PathBuf;

const APP_DIR: &str = "commit-reput";

/// `$XDG_CONFIG_HOME/commit-reput` or `~/.config/commit-reput`.
pub(crate) fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| home().join(".config"))
        .join(APP_DIR)
}

/// Default directory for rolling log files.
///
/// Uses `COMMIT_REPUT_LOG_DIR` if set, otherwise the XDG state directory
/// (falling back to the local data directory on platforms without one).
pub(crate) fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("COMMIT_REPUT_LOG_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| home().join(".local").join("state"))
        .join(APP_DIR)
        .join("logs")
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"))
}
