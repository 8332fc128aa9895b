use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("failed to write {0}: {1}")]
    Write(PathBuf, #[source] std::io::Error),

    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("threshold_min ({min}) is greater than threshold_max ({max})")]
    InvalidThresholds { min: u32, max: u32 },
}
