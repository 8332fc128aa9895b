//! Working-tree capability seams.
//!
//! The workflow depends on these small traits instead of on
//! `RepositoryLifecycle` directly, so batching behavior can be exercised
//! against in-memory fakes.

use git2::Oid;

use super::error::SyncError;

/// Identity recorded on mirror commits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Author {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Capability: report whether the working tree has changes.
///
/// # Laws
/// - Untracked files count as changes; ignored files do not.
/// - Must not modify the index or the working tree.
pub trait ReadStatus {
    fn is_clean(&self) -> Result<bool, SyncError>;
}

/// Capability: stage the whole tree and record it as a commit.
///
/// # Laws
/// - `stage_all` stages additions, modifications and deletions and returns the
///   number of paths it staged.
/// - `commit` parents the new commit on HEAD (none when HEAD is unborn) and
///   advances the current branch.
pub trait CommitWorkTree {
    fn stage_all(&self) -> Result<usize, SyncError>;
    fn commit(&self, author: &Author, message: &str) -> Result<Oid, SyncError>;
}

/// Capability: publish the current branch to the remote.
///
/// # Laws
/// - Must not silently swallow rejected ref updates.
/// - `unpushed_head` returns the branch tip while it holds commits the remote
///   has not acknowledged, and `None` once a push of that tip succeeded.
pub trait PushRemote {
    fn push(&self) -> Result<(), SyncError>;
    fn unpushed_head(&self) -> Result<Option<Oid>, SyncError>;
}
