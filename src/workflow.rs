//! Sync workflow: the two entry points the agent exposes.
//!
//! `init_repo` builds the credential, opens (or creates) the repository,
//! applies the sparse-checkout settings and attempts a best-effort pull.
//! `commit_and_push` is called once per tick and lets the batcher decide
//! whether this tick defers or commits.

use std::path::PathBuf;

use git2::Oid;
use time::OffsetDateTime;
use time::macros::format_description;

use crate::batch::{
    BatchDecision, BatchState, CommitBatcher, RngThresholds, ThresholdRange, ThresholdSource,
};
use crate::config::{Config, SparseCheckoutMode};
use crate::git::{
    AuthError, Author, CommitWorkTree, GitCliSparseCheckout, LocalConfigurator, NativeSparseCheckout,
    NetworkOptions, NoSparseCheckout, PullOutcome, PushRemote, ReadStatus, RemoteSpec,
    RepositoryLifecycle, SparseCheckoutReport, SshCredential,
};
use crate::Result;

const COMMIT_MESSAGE_PREFIX: &str = "New content from commit-reput";

/// Everything `init_repo` needs.
pub struct InitOptions {
    pub path: PathBuf,
    pub remote: RemoteSpec,
    pub key: Vec<u8>,
    pub passphrase: Option<String>,
    pub thresholds: ThresholdRange,
    pub network: NetworkOptions,
    pub configurator: Box<dyn LocalConfigurator>,
}

impl InitOptions {
    pub fn new(
        path: impl Into<PathBuf>,
        remote: RemoteSpec,
        key: impl Into<Vec<u8>>,
        thresholds: ThresholdRange,
    ) -> Self {
        InitOptions {
            path: path.into(),
            remote,
            key: key.into(),
            passphrase: None,
            thresholds,
            network: NetworkOptions::default(),
            configurator: Box::new(NativeSparseCheckout),
        }
    }

    /// Build options from the loaded config, reading the key file.
    pub fn from_config(config: &Config) -> Result<Self> {
        let key_path = config.key_path()?;
        let key = std::fs::read(&key_path)
            .map_err(|e| AuthError::ReadKey(key_path.clone(), e))?;
        let mut options = InitOptions::new(
            config.repo_path()?,
            config.remote_spec()?,
            key,
            config.threshold_range()?,
        );
        options.passphrase = config.auth.passphrase.clone();
        options.network = config.network_options();
        options.configurator = configurator_for(config.sparse_checkout);
        Ok(options)
    }
}

pub fn configurator_for(mode: SparseCheckoutMode) -> Box<dyn LocalConfigurator> {
    match mode {
        SparseCheckoutMode::Native => Box::new(NativeSparseCheckout),
        SparseCheckoutMode::GitCli => Box::new(GitCliSparseCheckout::default()),
        SparseCheckoutMode::Off => Box::new(NoSparseCheckout),
    }
}

/// What `init_repo` did besides returning the workflow.
#[derive(Clone, Debug)]
pub struct InitReport {
    pub created: bool,
    pub pull: PullOutcome,
    pub sparse: SparseCheckoutReport,
    pub threshold: u32,
}

/// Outcome of one `commit_and_push` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncAttempt {
    /// No working-tree changes.
    Clean,
    /// Changes exist but the threshold has not been reached.
    Deferred { pending: u32, threshold: u32 },
    /// Staged, committed and pushed.
    Committed {
        commit: Oid,
        files: usize,
        deferred_rounds: u32,
    },
    /// Tree was clean; a commit left behind by a failed push was pushed.
    Pushed { commit: Oid },
}

/// Long-lived sync state for one repository.
///
/// `commit_and_push` takes `&mut self`, so status read, decision, commit and
/// batch reset always run as one exclusive sequence. Share a workflow across
/// threads only behind a single mutex around that call.
pub struct SyncWorkflow<B = RepositoryLifecycle> {
    backend: B,
    batcher: CommitBatcher,
}

impl SyncWorkflow<RepositoryLifecycle> {
    pub fn init_repo(options: InitOptions) -> Result<(Self, InitReport)> {
        Self::init_repo_with(options, Box::new(RngThresholds::from_entropy()))
    }

    /// `init_repo` with an explicit threshold source.
    pub fn init_repo_with(
        options: InitOptions,
        source: Box<dyn ThresholdSource>,
    ) -> Result<(Self, InitReport)> {
        let InitOptions {
            path,
            remote,
            key,
            passphrase,
            thresholds,
            network,
            configurator,
        } = options;

        let credential = SshCredential::generate(&key, passphrase.as_deref())
            .inspect_err(|e| tracing::error!(error = %e, "failed to load ssh key"))?;

        let (lifecycle, created) =
            RepositoryLifecycle::initialize(&path, &remote, credential, network).inspect_err(
                |e| tracing::error!(error = %e, path = %path.display(), "repository init failed"),
            )?;

        let sparse = lifecycle.configure(configurator.as_ref());
        let pull = lifecycle.pull();
        let batcher = CommitBatcher::new(thresholds, source);
        let threshold = batcher.state().threshold;

        tracing::info!(
            path = %lifecycle.workdir().display(),
            remote = lifecycle.remote_url(),
            created,
            pulled = !pull.is_failed(),
            threshold,
            range = %thresholds,
            "sync agent initialized"
        );

        let report = InitReport {
            created,
            pull,
            sparse,
            threshold,
        };
        Ok((
            SyncWorkflow {
                backend: lifecycle,
                batcher,
            },
            report,
        ))
    }

    pub fn lifecycle(&self) -> &RepositoryLifecycle {
        &self.backend
    }
}

impl<B> SyncWorkflow<B>
where
    B: ReadStatus + CommitWorkTree + PushRemote,
{
    pub fn with_backend(backend: B, batcher: CommitBatcher) -> Self {
        SyncWorkflow { backend, batcher }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn batch_state(&self) -> BatchState {
        self.batcher.state()
    }

    /// One tick: defer, or stage + commit + push once the threshold is hit.
    ///
    /// Errors leave the batch state untouched so the next tick retries. A
    /// clean tree with an unpushed branch tip retries only the push.
    pub fn commit_and_push(&mut self, author: &Author) -> Result<SyncAttempt> {
        let clean = self
            .backend
            .is_clean()
            .inspect_err(|e| tracing::error!(error = %e, "failed to read working tree status"))?;

        if clean
            && let Some(commit) = self
                .backend
                .unpushed_head()
                .inspect_err(|e| tracing::error!(error = %e, "failed to compare with remote"))?
        {
            self.backend
                .push()
                .inspect_err(|e| tracing::error!(error = %e, %commit, "failed to push"))?;
            self.batcher.record_success();
            tracing::info!(
                %commit,
                next_threshold = self.batcher.state().threshold,
                "pushed pending commit"
            );
            return Ok(SyncAttempt::Pushed { commit });
        }

        match self.batcher.decide(clean) {
            BatchDecision::Clean => {
                tracing::debug!("working tree clean, nothing to commit");
                Ok(SyncAttempt::Clean)
            }
            BatchDecision::Deferred { pending, threshold } => {
                tracing::debug!(pending, threshold, "deferring commit");
                Ok(SyncAttempt::Deferred { pending, threshold })
            }
            BatchDecision::CommitDue { pending, threshold } => {
                let (commit, files) = self.commit_and_push_now(author)?;
                self.batcher.record_success();
                tracing::info!(
                    files,
                    deferred_rounds = pending,
                    threshold,
                    next_threshold = self.batcher.state().threshold,
                    %commit,
                    "pushed batched changes"
                );
                Ok(SyncAttempt::Committed {
                    commit,
                    files,
                    deferred_rounds: pending,
                })
            }
        }
    }

    fn commit_and_push_now(&self, author: &Author) -> Result<(Oid, usize)> {
        let files = self
            .backend
            .stage_all()
            .inspect_err(|e| tracing::error!(error = %e, "failed to stage changes"))?;
        let message = commit_message(local_now());
        let commit = self
            .backend
            .commit(author, &message)
            .inspect_err(|e| tracing::error!(error = %e, "failed to commit staged changes"))?;
        self.backend
            .push()
            .inspect_err(|e| tracing::error!(error = %e, %commit, "failed to push"))?;
        Ok((commit, files))
    }
}

fn local_now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// `New content from commit-reput - YYYY-MM-DD HH:MM:SS`
pub fn commit_message(at: OffsetDateTime) -> String {
    let stamp = at
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("{COMMIT_MESSAGE_PREFIX} - {stamp}")
}
