use thiserror::Error;

use crate::config::ConfigError;
use crate::git::{AuthError, SyncError};

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (transient contention/outage).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transience::Permanent => "permanent",
            Transience::Retryable => "retryable",
            Transience::Unknown => "unknown",
        }
    }
}

/// What we know about side effects when an error is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Effect {
    /// Definitely no side effects occurred.
    None,
    /// Side effects definitely occurred (locally or remotely).
    Some,
    /// We don't know if side effects occurred.
    Unknown,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Some => "some",
            Effect::Unknown => "unknown",
        }
    }
}

/// Crate-level convenience error.
///
/// Thin wrapper over the capability errors; each variant keeps its own
/// transience and effect classification.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Auth(e) => e.transience(),
            Error::Sync(e) => e.transience(),
            Error::Config(_) => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Error::Auth(_) | Error::Config(_) => Effect::None,
            Error::Sync(e) => e.effect(),
        }
    }
}
