use std::fs;
use std::path::{Path, PathBuf};

use super::merge::apply_env_overrides;
use super::{Config, ConfigError};

pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("COMMIT_REPUT_CONFIG")
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }
    crate::paths::config_dir().join("config.toml")
}

/// Load the config file (defaults when it does not exist) plus env overrides.
pub fn load() -> Result<Config, ConfigError> {
    let mut config = load_from(&config_path())?;
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse `path`; a missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_owned(), e))?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_owned(), e))
}

pub fn write_config(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).map_err(|e| ConfigError::Write(dir.to_owned(), e))?;
    }
    let contents = toml::to_string_pretty(cfg)?;
    atomic_write(path, contents.as_bytes())
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let temp =
        tempfile::NamedTempFile::new_in(dir).map_err(|e| ConfigError::Write(dir.to_owned(), e))?;
    fs::write(temp.path(), data).map_err(|e| ConfigError::Write(temp.path().to_owned(), e))?;
    temp.persist(path)
        .map_err(|e| ConfigError::Write(path.to_owned(), e.error))?;
    Ok(())
}
