//! Background agent that mirrors a local directory to a git remote over SSH,
//! batching changes into commits at randomized intervals.

#![forbid(unsafe_code)]

pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod git;
mod paths;
pub mod telemetry;
pub mod workflow;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

pub use batch::{BatchDecision, BatchState, CommitBatcher, ThresholdRange, ThresholdSource};
pub use config::{Config, ConfigError};
pub use git::{
    AuthError, Author, NetworkOptions, PullOutcome, PullSkipped, RemoteSpec, RepositoryLifecycle,
    SshCredential, SyncError,
};
pub use workflow::{InitOptions, InitReport, SyncAttempt, SyncWorkflow};
