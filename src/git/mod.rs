//! Git integration module.
//!
//! Provides:
//! - SSH credentials with an accept-any host key policy
//! - Sparse-checkout configuration behind `LocalConfigurator`
//! - `RepositoryLifecycle`: create-or-open, best-effort pull, commit, push
//! - Capability traits the workflow is written against

pub mod auth;
pub mod backend;
pub mod error;
pub mod lifecycle;
pub mod remote;
pub mod sparse;

pub use auth::{HostKeyPolicy, SSH_USERNAME, SshCredential};
pub use backend::{Author, CommitWorkTree, PushRemote, ReadStatus};
pub use error::{AuthError, SyncError};
pub use lifecycle::{PullOutcome, PullSkipped, RepositoryLifecycle};
pub use remote::{DEFAULT_HOST, Deadline, NetworkOptions, REMOTE_NAME, RemoteSpec};
pub use sparse::{
    GitCliSparseCheckout, LocalConfigurator, NativeSparseCheckout, NoSparseCheckout,
    SparseCheckoutReport, SparseStep,
};
