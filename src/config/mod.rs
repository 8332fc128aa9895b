//! Config loading and persistence.

mod error;
mod load;
mod merge;
mod schema;

pub use error::ConfigError;
pub use load::{config_path, load, load_from, write_config};
pub use merge::{apply_env_overrides, apply_overrides_from};
pub use schema::{
    AuthConfig, AuthorConfig, BatchConfig, Config, FileLoggingConfig, LogFormat, LogRotation,
    LoggingConfig, NetworkConfig, RemoteConfig, RepoConfig, ScheduleConfig, SparseCheckoutMode,
};
