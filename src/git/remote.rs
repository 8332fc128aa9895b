//! Remote addressing and network deadlines.

use std::time::{Duration, Instant};

/// Name of the single remote this agent manages.
pub const REMOTE_NAME: &str = "origin";

/// Host used when the configuration does not name one.
pub const DEFAULT_HOST: &str = "github.com";

/// Where the mirror is pushed.
///
/// `Ssh` renders the scp-like form `git@<host>:<identifier>.git`; `Url` is
/// taken verbatim (local paths, `file://` or `ssh://` URLs).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteSpec {
    Ssh { host: String, identifier: String },
    Url(String),
}

impl RemoteSpec {
    pub fn ssh(host: impl Into<String>, identifier: impl Into<String>) -> Self {
        RemoteSpec::Ssh {
            host: host.into(),
            identifier: identifier.into(),
        }
    }

    pub fn url(&self) -> String {
        match self {
            RemoteSpec::Ssh { host, identifier } => {
                let identifier = identifier.trim_matches('/');
                let identifier = identifier.strip_suffix(".git").unwrap_or(identifier);
                format!("git@{host}:{identifier}.git")
            }
            RemoteSpec::Url(url) => url.clone(),
        }
    }
}

/// Limits applied to operations that talk to the remote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkOptions {
    pub timeout: Option<Duration>,
}

impl NetworkOptions {
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.timeout)
    }
}

/// Point in time after which network callbacks abort the transfer.
#[derive(Clone, Copy, Debug)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn after(timeout: Option<Duration>) -> Self {
        Deadline(timeout.map(|t| Instant::now() + t))
    }

    pub fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }
}
