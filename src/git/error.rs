//! Git sync error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::error::{Effect, Transience};

/// Errors that can occur while initializing, committing or pushing.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    #[error("failed to open repository at {0}: {1}")]
    OpenRepo(PathBuf, #[source] git2::Error),

    #[error("failed to initialize repository at {0}: {1}")]
    InitRepo(PathBuf, #[source] std::io::Error),

    #[error("failed to create repository at {0}: {1}")]
    CreateRepo(PathBuf, #[source] git2::Error),

    #[error("failed to register remote {name}: {source}")]
    CreateRemote {
        name: String,
        #[source]
        source: git2::Error,
    },

    #[error("remote {name} points at {found}, expected {expected}")]
    RemoteMismatch {
        name: String,
        expected: String,
        found: String,
    },

    #[error("repository at {0} has no working tree")]
    BareRepo(PathBuf),

    #[error("failed to read working tree status: {0}")]
    Status(#[source] git2::Error),

    #[error("failed to stage changes: {0}")]
    Stage(#[source] git2::Error),

    #[error("failed to create commit: {0}")]
    Commit(#[source] git2::Error),

    #[error("HEAD is detached; refusing to push")]
    DetachedHead,

    #[error("failed to push: {0}")]
    Push(#[source] git2::Error),

    #[error("push rejected by remote: {message}")]
    PushRejected { message: String },

    #[error("network deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}

impl SyncError {
    /// Whether retrying this operation may succeed.
    pub fn transience(&self) -> Transience {
        match self {
            SyncError::Push(_)
            | SyncError::PushRejected { .. }
            | SyncError::DeadlineExceeded(_) => Transience::Retryable,

            SyncError::OpenRepo(_, _)
            | SyncError::InitRepo(_, _)
            | SyncError::CreateRepo(_, _)
            | SyncError::CreateRemote { .. }
            | SyncError::RemoteMismatch { .. }
            | SyncError::BareRepo(_)
            | SyncError::DetachedHead => Transience::Permanent,

            SyncError::Status(_)
            | SyncError::Stage(_)
            | SyncError::Commit(_)
            | SyncError::Git(_) => Transience::Unknown,
        }
    }

    /// What we know about side effects when this error is returned.
    pub fn effect(&self) -> Effect {
        match self {
            // Push-phase errors occur after a local commit was created.
            SyncError::Push(_)
            | SyncError::PushRejected { .. }
            | SyncError::DetachedHead
            | SyncError::DeadlineExceeded(_) => Effect::Some,

            // The index may have been written before the commit failed.
            SyncError::Commit(_) | SyncError::Stage(_) => Effect::Unknown,

            // Low-level git2 errors can happen at any phase.
            SyncError::Git(_) => Effect::Unknown,

            _ => Effect::None,
        }
    }
}

/// Errors produced while turning key material into a credential.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AuthError {
    #[error("private key is not valid UTF-8")]
    NotUtf8,

    #[error("private key is malformed or unsupported: {0}")]
    InvalidKey(#[source] russh_keys::Error),

    #[error("failed to read private key from {0}: {1}")]
    ReadKey(PathBuf, #[source] std::io::Error),
}

impl AuthError {
    pub fn transience(&self) -> Transience {
        match self {
            AuthError::ReadKey(_, _) => Transience::Unknown,
            AuthError::NotUtf8 | AuthError::InvalidKey(_) => Transience::Permanent,
        }
    }
}
