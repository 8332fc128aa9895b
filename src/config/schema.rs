use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::batch::ThresholdRange;
use crate::git::{Author, DEFAULT_HOST, NetworkOptions, RemoteSpec};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sparse_checkout: SparseCheckoutMode,
    pub repo: RepoConfig,
    pub remote: RemoteConfig,
    pub auth: AuthConfig,
    pub batch: BatchConfig,
    pub author: AuthorConfig,
    pub network: NetworkConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

impl Config {
    pub fn repo_path(&self) -> Result<PathBuf, ConfigError> {
        self.repo.path.clone().ok_or(ConfigError::Missing("repo.path"))
    }

    pub fn key_path(&self) -> Result<PathBuf, ConfigError> {
        self.auth
            .key_path
            .clone()
            .ok_or(ConfigError::Missing("auth.key_path"))
    }

    /// An explicit `remote.url` wins over `host` + `identifier`.
    pub fn remote_spec(&self) -> Result<RemoteSpec, ConfigError> {
        if let Some(url) = self.remote.url.as_deref()
            && !url.trim().is_empty()
        {
            return Ok(RemoteSpec::Url(url.trim().to_owned()));
        }
        let identifier = self
            .remote
            .identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::Missing("remote.identifier"))?;
        Ok(RemoteSpec::ssh(self.remote.host.clone(), identifier))
    }

    pub fn threshold_range(&self) -> Result<ThresholdRange, ConfigError> {
        ThresholdRange::new(self.batch.threshold_min, self.batch.threshold_max)
    }

    pub fn network_options(&self) -> NetworkOptions {
        NetworkOptions {
            timeout: self
                .network
                .timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }

    pub fn author(&self) -> Author {
        Author::new(self.author.name.clone(), self.author.email.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    /// `owner/repo` on `host`.
    pub identifier: Option<String>,
    pub url: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            identifier: None,
            url: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub key_path: Option<PathBuf>,
    pub passphrase: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub threshold_min: u32,
    pub threshold_max: u32,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threshold_min: 3,
            threshold_max: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub name: String,
    pub email: String,
}

impl Default for AuthorConfig {
    fn default() -> Self {
        Self {
            name: "commit-reput".to_string(),
            email: "commit-reput@localhost".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Upper bound for a single pull or push; `0` or absent disables it.
    pub timeout_secs: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Some(120),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SparseCheckoutMode {
    #[default]
    Native,
    GitCli,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Tree,
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub stdout: bool,
    pub stdout_format: LogFormat,
    pub filter: Option<String>,
    pub file: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stdout_format: LogFormat::Compact,
            filter: None,
            file: FileLoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub rotation: LogRotation,
    pub retention_max_age_days: Option<u64>,
    pub retention_max_files: Option<usize>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            format: LogFormat::Json,
            rotation: LogRotation::Daily,
            retention_max_age_days: Some(7),
            retention_max_files: Some(10),
        }
    }
}
