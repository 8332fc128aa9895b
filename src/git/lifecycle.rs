//! Repository lifecycle: create-or-open, remote wiring, pull, commit, push.
//!
//! `RepositoryLifecycle` owns the only `git2::Repository` handle for the
//! mirrored directory. It is created once and lives as long as the agent.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{
    ErrorCode, FetchOptions, IndexAddOption, Oid, PushOptions, Repository, Signature,
    StatusOptions,
};
use thiserror::Error;

use super::auth::SshCredential;
use super::backend::{Author, CommitWorkTree, PushRemote, ReadStatus};
use super::error::SyncError;
use super::remote::{NetworkOptions, REMOTE_NAME, RemoteSpec};
use super::sparse::{LocalConfigurator, SparseCheckoutReport};

/// Why a best-effort pull did not update the working tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PullSkipped {
    #[error("remote has no branches (empty repository?)")]
    EmptyRemote,

    #[error("remote has no branch {0}")]
    NoRemoteBranch(String),

    #[error("local branch {branch} has diverged from the remote")]
    Diverged { branch: String },

    #[error("network deadline exceeded during fetch")]
    DeadlineExceeded,

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("checkout failed: {0}")]
    Checkout(String),

    #[error("git operation failed: {0}")]
    Git(String),
}

impl From<git2::Error> for PullSkipped {
    fn from(err: git2::Error) -> Self {
        PullSkipped::Git(err.message().to_owned())
    }
}

/// Typed result of the best-effort pull.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PullOutcome {
    UpToDate { branch: String },
    FastForwarded { branch: String, commit: Oid },
    Failed(PullSkipped),
}

impl PullOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PullOutcome::Failed(_))
    }
}

pub struct RepositoryLifecycle {
    repo: Repository,
    workdir: PathBuf,
    remote_url: String,
    credential: SshCredential,
    network: NetworkOptions,
}

impl RepositoryLifecycle {
    /// Open the repository at `path`, creating it (and the directory) when
    /// missing, and make sure `origin` points at `remote`.
    ///
    /// Returns the lifecycle and whether the repository was newly created.
    pub fn initialize(
        path: &Path,
        remote: &RemoteSpec,
        credential: SshCredential,
        network: NetworkOptions,
    ) -> Result<(Self, bool), SyncError> {
        let (repo, created) = open_or_create(path)?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| SyncError::BareRepo(path.to_owned()))?
            .to_path_buf();

        let remote_url = remote.url();
        ensure_remote(&repo, &remote_url)?;

        tracing::debug!(
            path = %workdir.display(),
            remote = %remote_url,
            created,
            "repository ready"
        );

        Ok((
            RepositoryLifecycle {
                repo,
                workdir,
                remote_url,
                credential,
                network,
            },
            created,
        ))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn remote_url(&self) -> &str {
        &self.remote_url
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Apply local configuration (the sparse-checkout workaround).
    pub fn configure(&self, configurator: &dyn LocalConfigurator) -> SparseCheckoutReport {
        configurator.apply(&self.workdir, self.repo.path())
    }

    /// Fetch `origin` and fast-forward the current branch.
    ///
    /// Never fails: an empty remote, diverged history or transport error is
    /// reported as [`PullOutcome::Failed`] and the caller carries on with the
    /// local state.
    pub fn pull(&self) -> PullOutcome {
        match self.try_pull() {
            Ok(outcome) => outcome,
            Err(skipped) => {
                tracing::warn!(reason = %skipped, "pull skipped; continuing with local state");
                PullOutcome::Failed(skipped)
            }
        }
    }

    fn try_pull(&self) -> Result<PullOutcome, PullSkipped> {
        let deadline = self.network.deadline();
        if deadline.expired() {
            return Err(PullSkipped::DeadlineExceeded);
        }
        let mut remote = self.repo.find_remote(REMOTE_NAME)?;

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.credential.remote_callbacks(deadline));
        if let Err(err) = remote.fetch::<&str>(&[], Some(&mut fetch_options), None) {
            if deadline.expired() {
                return Err(PullSkipped::DeadlineExceeded);
            }
            return Err(PullSkipped::Fetch(err.message().to_owned()));
        }

        let advertised = remote
            .default_branch()
            .ok()
            .and_then(|buf| buf.as_str().map(str::to_owned))
            .and_then(|name| name.strip_prefix("refs/heads/").map(str::to_owned));
        drop(remote);

        let head_branch = current_branch(&self.repo)?;
        let born = head_branch.as_ref().is_some_and(|(_, born)| *born);
        let branch = match (head_branch, advertised) {
            (Some((name, true)), _) => name,
            (_, Some(name)) => name,
            (Some((name, false)), None) => name,
            (None, None) => return Err(PullSkipped::EmptyRemote),
        };

        let tracking = format!("refs/remotes/{REMOTE_NAME}/{branch}");
        let remote_oid = match self.repo.refname_to_id(&tracking) {
            Ok(oid) => oid,
            Err(err) if err.code() == ErrorCode::NotFound => {
                return Err(if self.has_remote_branches()? {
                    PullSkipped::NoRemoteBranch(branch)
                } else {
                    PullSkipped::EmptyRemote
                });
            }
            Err(err) => return Err(err.into()),
        };

        let local_ref = format!("refs/heads/{branch}");
        if !born {
            self.checkout(remote_oid)?;
            self.repo
                .reference(&local_ref, remote_oid, false, "pull: initial checkout")?;
            self.repo.set_head(&local_ref)?;
            tracing::info!(%branch, commit = %remote_oid, "checked out remote branch");
            return Ok(PullOutcome::FastForwarded {
                branch,
                commit: remote_oid,
            });
        }

        let fetched = self.repo.find_annotated_commit(remote_oid)?;
        let (analysis, _) = self.repo.merge_analysis(&[&fetched])?;
        if analysis.is_up_to_date() {
            tracing::debug!(%branch, "already up to date");
            return Ok(PullOutcome::UpToDate { branch });
        }
        if !analysis.is_fast_forward() {
            return Err(PullSkipped::Diverged { branch });
        }

        self.checkout(remote_oid)?;
        self.repo
            .find_reference(&local_ref)?
            .set_target(remote_oid, "pull: fast-forward")?;
        tracing::info!(%branch, commit = %remote_oid, "fast-forwarded");
        Ok(PullOutcome::FastForwarded {
            branch,
            commit: remote_oid,
        })
    }

    /// Safe checkout: refuses to overwrite local modifications.
    fn checkout(&self, oid: Oid) -> Result<(), PullSkipped> {
        let object = self.repo.find_object(oid, None)?;
        let mut builder = CheckoutBuilder::new();
        builder.safe().recreate_missing(true);
        self.repo
            .checkout_tree(&object, Some(&mut builder))
            .map_err(|e| PullSkipped::Checkout(e.message().to_owned()))
    }

    fn has_remote_branches(&self) -> Result<bool, PullSkipped> {
        let prefix = format!("refs/remotes/{REMOTE_NAME}/*");
        let mut refs = self.repo.references_glob(&prefix)?;
        Ok(refs.next().is_some())
    }
}

impl ReadStatus for RepositoryLifecycle {
    fn is_clean(&self) -> Result<bool, SyncError> {
        let statuses = self
            .repo
            .statuses(Some(&mut status_options()))
            .map_err(SyncError::Status)?;
        Ok(statuses.is_empty())
    }
}

impl CommitWorkTree for RepositoryLifecycle {
    fn stage_all(&self) -> Result<usize, SyncError> {
        let changed = self
            .repo
            .statuses(Some(&mut status_options()))
            .map_err(SyncError::Stage)?
            .len();

        let mut index = self.repo.index().map_err(SyncError::Stage)?;
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .map_err(SyncError::Stage)?;
        // add_all does not drop entries for files deleted from disk
        index
            .update_all(["*"].iter(), None)
            .map_err(SyncError::Stage)?;
        index.write().map_err(SyncError::Stage)?;
        Ok(changed)
    }

    fn commit(&self, author: &Author, message: &str) -> Result<Oid, SyncError> {
        let mut index = self.repo.index().map_err(SyncError::Commit)?;
        let tree_oid = index.write_tree().map_err(SyncError::Commit)?;
        let tree = self.repo.find_tree(tree_oid).map_err(SyncError::Commit)?;
        let sig = Signature::now(&author.name, &author.email).map_err(SyncError::Commit)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(SyncError::Commit)?),
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                None
            }
            Err(err) => return Err(SyncError::Commit(err)),
        };
        let parents: Vec<_> = parent.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .map_err(SyncError::Commit)
    }
}

impl PushRemote for RepositoryLifecycle {
    fn push(&self) -> Result<(), SyncError> {
        let head = self.repo.head().map_err(SyncError::Push)?;
        if !head.is_branch() {
            return Err(SyncError::DetachedHead);
        }
        let refname = head.name().ok_or(SyncError::DetachedHead)?.to_owned();
        let tip = head.target().ok_or(SyncError::DetachedHead)?;
        drop(head);

        let deadline = self.network.deadline();
        if deadline.expired() {
            return Err(SyncError::DeadlineExceeded("push"));
        }
        let mut remote = self.repo.find_remote(REMOTE_NAME).map_err(SyncError::Push)?;
        let refspec = format!("{refname}:{refname}");
        let rejected: RefCell<Option<String>> = RefCell::new(None);

        {
            let mut callbacks = self.credential.remote_callbacks(deadline);
            callbacks.push_update_reference(|_ref_name, status| {
                if let Some(msg) = status {
                    *rejected.borrow_mut() = Some(msg.to_string());
                }
                Ok(())
            });

            let mut push_options = PushOptions::new();
            push_options.remote_callbacks(callbacks);

            if let Err(err) = remote.push(&[refspec.as_str()], Some(&mut push_options)) {
                if deadline.expired() {
                    return Err(SyncError::DeadlineExceeded("push"));
                }
                return Err(SyncError::Push(err));
            }
        }

        if let Some(message) = rejected.into_inner() {
            return Err(SyncError::PushRejected { message });
        }

        if let Some(branch) = refname.strip_prefix("refs/heads/") {
            let tracking = format!("refs/remotes/{REMOTE_NAME}/{branch}");
            if let Err(err) = self
                .repo
                .reference(&tracking, tip, true, "push: update tracking ref")
            {
                tracing::warn!(%tracking, error = %err, "failed to record pushed tip");
            }
        }
        Ok(())
    }

    fn unpushed_head(&self) -> Result<Option<Oid>, SyncError> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                return Ok(None);
            }
            Err(err) => return Err(SyncError::Git(err)),
        };
        if !head.is_branch() {
            return Ok(None);
        }
        let (Some(branch), Some(local)) = (head.shorthand(), head.target()) else {
            return Ok(None);
        };

        let tracking = format!("refs/remotes/{REMOTE_NAME}/{branch}");
        let remote = match self.repo.refname_to_id(&tracking) {
            Ok(oid) => oid,
            // never pushed or fetched: everything on the branch is unpushed
            Err(err) if err.code() == ErrorCode::NotFound => return Ok(Some(local)),
            Err(err) => return Err(SyncError::Git(err)),
        };
        if remote == local {
            return Ok(None);
        }
        let (ahead, _behind) = self.repo.graph_ahead_behind(local, remote)?;
        Ok((ahead > 0).then_some(local))
    }
}

fn open_or_create(path: &Path) -> Result<(Repository, bool), SyncError> {
    match Repository::open(path) {
        Ok(repo) => Ok((repo, false)),
        Err(err) if err.code() == ErrorCode::NotFound => {
            fs::create_dir_all(path).map_err(|e| SyncError::InitRepo(path.to_owned(), e))?;
            let repo =
                Repository::init(path).map_err(|e| SyncError::CreateRepo(path.to_owned(), e))?;
            tracing::info!(path = %path.display(), "created repository");
            Ok((repo, true))
        }
        Err(err) => Err(SyncError::OpenRepo(path.to_owned(), err)),
    }
}

/// Register `origin` when absent; refuse to continue when it points elsewhere.
fn ensure_remote(repo: &Repository, url: &str) -> Result<(), SyncError> {
    match repo.find_remote(REMOTE_NAME) {
        Ok(existing) => {
            let found = existing.url().unwrap_or_default();
            if found != url {
                return Err(SyncError::RemoteMismatch {
                    name: REMOTE_NAME.to_owned(),
                    expected: url.to_owned(),
                    found: found.to_owned(),
                });
            }
            Ok(())
        }
        Err(err) if err.code() == ErrorCode::NotFound => {
            repo.remote(REMOTE_NAME, url)
                .map_err(|source| SyncError::CreateRemote {
                    name: REMOTE_NAME.to_owned(),
                    source,
                })?;
            tracing::info!(remote = REMOTE_NAME, %url, "registered remote");
            Ok(())
        }
        Err(err) => Err(SyncError::Git(err)),
    }
}

/// Branch HEAD points at, and whether it has any commits yet.
fn current_branch(repo: &Repository) -> Result<Option<(String, bool)>, git2::Error> {
    let head = repo.find_reference("HEAD")?;
    let Some(target) = head.symbolic_target() else {
        return Ok(None);
    };
    let Some(name) = target.strip_prefix("refs/heads/") else {
        return Ok(None);
    };
    let born = match repo.refname_to_id(target) {
        Ok(_) => true,
        Err(err) if err.code() == ErrorCode::NotFound => false,
        Err(err) => return Err(err),
    };
    Ok(Some((name.to_owned(), born)))
}

fn status_options() -> StatusOptions {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .exclude_submodules(true);
    opts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::auth::tests::TEST_KEY;

    fn credential() -> SshCredential {
        SshCredential::generate(TEST_KEY.as_bytes(), None).expect("test key")
    }

    fn bare_remote() -> (tempfile::TempDir, RemoteSpec) {
        let dir = tempfile::tempdir().expect("tempdir");
        Repository::init_bare(dir.path()).expect("init bare");
        let spec = RemoteSpec::Url(dir.path().display().to_string());
        (dir, spec)
    }

    #[test]
    fn initialize_creates_repo_and_origin() {
        let (_remote_dir, spec) = bare_remote();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mirror");

        let (lifecycle, created) =
            RepositoryLifecycle::initialize(&path, &spec, credential(), NetworkOptions::default())
                .expect("initialize");
        assert!(created);
        assert!(path.join(".git").exists());
        let origin = lifecycle.repository().find_remote("origin").expect("origin");
        assert_eq!(origin.url(), Some(spec.url().as_str()));
    }

    #[test]
    fn initialize_reopens_existing_repo() {
        let (_remote_dir, spec) = bare_remote();
        let dir = tempfile::tempdir().expect("tempdir");

        let (first, created) = RepositoryLifecycle::initialize(
            dir.path(),
            &spec,
            credential(),
            NetworkOptions::default(),
        )
        .expect("first");
        assert!(created);
        drop(first);

        let (_second, created) = RepositoryLifecycle::initialize(
            dir.path(),
            &spec,
            credential(),
            NetworkOptions::default(),
        )
        .expect("second");
        assert!(!created);
    }

    #[test]
    fn initialize_rejects_mismatched_origin() {
        let (_remote_dir, spec) = bare_remote();
        let dir = tempfile::tempdir().expect("tempdir");
        let repo = Repository::init(dir.path()).expect("init");
        repo.remote("origin", "git@github.com:someone/else.git")
            .expect("remote");

        let err = RepositoryLifecycle::initialize(
            dir.path(),
            &spec,
            credential(),
            NetworkOptions::default(),
        )
        .err()
        .expect("mismatch");
        assert!(matches!(err, SyncError::RemoteMismatch { .. }));
    }

    #[test]
    fn pull_from_empty_remote_is_not_fatal() {
        let (_remote_dir, spec) = bare_remote();
        let dir = tempfile::tempdir().expect("tempdir");
        let (lifecycle, _) = RepositoryLifecycle::initialize(
            dir.path(),
            &spec,
            credential(),
            NetworkOptions::default(),
        )
        .expect("initialize");

        let outcome = lifecycle.pull();
        assert_eq!(outcome, PullOutcome::Failed(PullSkipped::EmptyRemote));
    }

    #[test]
    fn status_stage_commit_cycle() {
        let (_remote_dir, spec) = bare_remote();
        let dir = tempfile::tempdir().expect("tempdir");
        let (lifecycle, _) = RepositoryLifecycle::initialize(
            dir.path(),
            &spec,
            credential(),
            NetworkOptions::default(),
        )
        .expect("initialize");

        assert!(lifecycle.is_clean().expect("status"));
        fs::write(dir.path().join("a.txt"), "a").expect("write");
        fs::create_dir_all(dir.path().join("nested/deeper")).expect("mkdir");
        fs::write(dir.path().join("nested/deeper/b.txt"), "b").expect("write");
        assert!(!lifecycle.is_clean().expect("status"));

        assert_eq!(lifecycle.stage_all().expect("stage"), 2);
        let author = Author::new("Mirror", "mirror@example.com");
        let oid = lifecycle.commit(&author, "first").expect("commit");
        assert!(lifecycle.is_clean().expect("status"));

        let commit = lifecycle.repository().find_commit(oid).expect("commit");
        assert_eq!(commit.author().name(), Some("Mirror"));
        assert_eq!(commit.parent_count(), 0);

        fs::remove_file(dir.path().join("a.txt")).expect("remove");
        assert!(!lifecycle.is_clean().expect("status"));
        assert_eq!(lifecycle.stage_all().expect("stage"), 1);
        let second = lifecycle.commit(&author, "second").expect("commit");
        let commit = lifecycle.repository().find_commit(second).expect("commit");
        assert_eq!(commit.parent_id(0).expect("parent"), oid);
        assert!(commit.tree().expect("tree").get_name("a.txt").is_none());
        assert!(lifecycle.is_clean().expect("status"));
    }

    fn expired() -> NetworkOptions {
        NetworkOptions {
            timeout: Some(std::time::Duration::ZERO),
        }
    }

    fn commit_file(lifecycle: &RepositoryLifecycle, name: &str) -> Oid {
        fs::write(lifecycle.workdir().join(name), name).expect("write");
        lifecycle.stage_all().expect("stage");
        lifecycle
            .commit(&Author::new("Mirror", "mirror@example.com"), name)
            .expect("commit")
    }

    #[test]
    fn expired_deadline_skips_pull() {
        let (_remote_dir, spec) = bare_remote();
        let dir = tempfile::tempdir().expect("tempdir");
        let (lifecycle, _) =
            RepositoryLifecycle::initialize(dir.path(), &spec, credential(), expired())
                .expect("initialize");

        assert_eq!(
            lifecycle.pull(),
            PullOutcome::Failed(PullSkipped::DeadlineExceeded)
        );
    }

    #[test]
    fn expired_deadline_aborts_push_and_keeps_commit_unpushed() {
        let (remote_dir, spec) = bare_remote();
        let dir = tempfile::tempdir().expect("tempdir");
        let (lifecycle, _) =
            RepositoryLifecycle::initialize(dir.path(), &spec, credential(), expired())
                .expect("initialize");
        let oid = commit_file(&lifecycle, "a.txt");

        let err = lifecycle.push().unwrap_err();
        assert!(matches!(err, SyncError::DeadlineExceeded("push")));
        assert!(err.transience().is_retryable());
        assert_eq!(lifecycle.unpushed_head().expect("unpushed"), Some(oid));

        let remote = Repository::open_bare(remote_dir.path()).expect("open remote");
        assert!(remote.references().expect("refs").next().is_none());
    }

    #[test]
    fn push_clears_unpushed_head() {
        let (_remote_dir, spec) = bare_remote();
        let dir = tempfile::tempdir().expect("tempdir");
        let (lifecycle, _) = RepositoryLifecycle::initialize(
            dir.path(),
            &spec,
            credential(),
            NetworkOptions::default(),
        )
        .expect("initialize");
        assert_eq!(lifecycle.unpushed_head().expect("unborn"), None);

        let first = commit_file(&lifecycle, "a.txt");
        assert_eq!(lifecycle.unpushed_head().expect("ahead"), Some(first));
        lifecycle.push().expect("push");
        assert_eq!(lifecycle.unpushed_head().expect("pushed"), None);

        let second = commit_file(&lifecycle, "b.txt");
        assert_eq!(lifecycle.unpushed_head().expect("ahead"), Some(second));
        lifecycle.push().expect("push");
        assert_eq!(lifecycle.unpushed_head().expect("pushed"), None);
    }
}
