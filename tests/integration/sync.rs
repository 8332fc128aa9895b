//! Library-level sync against a local bare remote.

use std::fs;
use std::path::Path;
use std::time::Duration;

use commit_reput::batch::RngThresholds;
use commit_reput::git::{NetworkOptions, NoSparseCheckout};
use commit_reput::{
    Author, Error, InitOptions, PullOutcome, PullSkipped, RemoteSpec, SyncAttempt, SyncError,
    SyncWorkflow, ThresholdRange,
};
use tempfile::TempDir;

use crate::fixtures::TEST_KEY;
use crate::fixtures::git::{head_branch, init_bare_repo, remote_has_branch, with_remote_tip};

struct Rig {
    _root: TempDir,
    remote_dir: std::path::PathBuf,
    remote: RemoteSpec,
    mirror: std::path::PathBuf,
}

impl Rig {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        let remote_dir = root.path().join("remote.git");
        init_bare_repo(&remote_dir).expect("bare remote");
        let remote = RemoteSpec::Url(remote_dir.display().to_string());
        let mirror = root.path().join("mirror");
        Rig {
            _root: root,
            remote_dir,
            remote,
            mirror,
        }
    }

    fn options(&self, path: &Path, threshold: u32) -> InitOptions {
        let mut options = InitOptions::new(
            path,
            self.remote.clone(),
            TEST_KEY,
            ThresholdRange::fixed(threshold),
        );
        options.configurator = Box::new(NoSparseCheckout);
        options
    }

    fn init(&self, path: &Path, threshold: u32) -> (SyncWorkflow, commit_reput::InitReport) {
        SyncWorkflow::init_repo_with(
            self.options(path, threshold),
            Box::new(RngThresholds::seeded(7)),
        )
        .expect("init_repo")
    }
}

fn author() -> Author {
    Author::new("Site Mirror", "mirror@example.com")
}

#[test]
fn init_against_empty_remote_registers_origin() {
    let rig = Rig::new();
    let (workflow, report) = rig.init(&rig.mirror, 3);

    assert!(report.created);
    assert_eq!(report.threshold, 3);
    assert_eq!(report.pull, PullOutcome::Failed(PullSkipped::EmptyRemote));
    let origin = workflow
        .lifecycle()
        .repository()
        .find_remote("origin")
        .expect("origin");
    assert_eq!(origin.url(), Some(rig.remote.url().as_str()));
}

#[test]
fn changes_are_pushed_once_threshold_is_reached() {
    let rig = Rig::new();
    let (mut workflow, _) = rig.init(&rig.mirror, 2);
    let author = author();

    assert_eq!(
        workflow.commit_and_push(&author).expect("tick"),
        SyncAttempt::Clean
    );

    fs::write(rig.mirror.join("index.html"), "<h1>hi</h1>").expect("write");
    fs::create_dir_all(rig.mirror.join("posts")).expect("mkdir");
    fs::write(rig.mirror.join("posts/first.md"), "# first").expect("write");

    for pending in 1..=2 {
        assert_eq!(
            workflow.commit_and_push(&author).expect("tick"),
            SyncAttempt::Deferred {
                pending,
                threshold: 2
            }
        );
    }

    let SyncAttempt::Committed {
        commit,
        files,
        deferred_rounds,
    } = workflow.commit_and_push(&author).expect("tick")
    else {
        panic!("expected a commit on the third dirty tick");
    };
    assert_eq!(files, 2);
    assert_eq!(deferred_rounds, 2);

    let branch = head_branch(&rig.mirror).expect("branch");
    let (tip, message, name, has_post) = with_remote_tip(&rig.remote_dir, &branch, |c| {
        let tree = c.tree().expect("tree");
        (
            c.id(),
            c.message().unwrap_or_default().to_owned(),
            c.author().name().unwrap_or_default().to_owned(),
            tree.get_path(Path::new("posts/first.md")).is_ok(),
        )
    })
    .expect("remote tip");
    assert_eq!(tip, commit);
    assert!(message.starts_with("New content from commit-reput - "));
    assert_eq!(name, "Site Mirror");
    assert!(has_post);

    assert_eq!(
        workflow.commit_and_push(&author).expect("tick"),
        SyncAttempt::Clean
    );
    assert_eq!(workflow.batch_state().pending, 0);
}

#[test]
fn second_mirror_pulls_pushed_content() {
    let rig = Rig::new();
    let (mut first, _) = rig.init(&rig.mirror, 0);
    fs::write(rig.mirror.join("notes.txt"), "shared").expect("write");
    assert!(matches!(
        first.commit_and_push(&author()).expect("tick"),
        SyncAttempt::Committed { .. }
    ));

    let other = rig.mirror.with_file_name("other");
    let (second, report) = rig.init(&other, 0);
    assert!(report.created);
    assert!(
        matches!(report.pull, PullOutcome::FastForwarded { .. }),
        "unexpected pull outcome: {:?}",
        report.pull
    );
    assert_eq!(
        fs::read_to_string(other.join("notes.txt")).expect("pulled file"),
        "shared"
    );

    // reopening with nothing new upstream is a no-op pull
    drop(second);
    let (_again, report) = rig.init(&other, 0);
    assert!(!report.created);
    assert!(matches!(report.pull, PullOutcome::UpToDate { .. }));
}

#[test]
fn invalid_key_fails_before_touching_disk() {
    let rig = Rig::new();
    let mut options = rig.options(&rig.mirror, 1);
    options.key = b"definitely not a key".to_vec();

    let err = SyncWorkflow::init_repo(options).err().expect("auth error");
    assert!(matches!(err, Error::Auth(_)));
    assert!(!rig.mirror.exists());
}

#[test]
fn mismatched_origin_is_rejected() {
    let rig = Rig::new();
    let repo = git2::Repository::init(&rig.mirror).expect("init");
    repo.remote("origin", "git@github.com:someone/else.git")
        .expect("remote");
    drop(repo);

    let err = SyncWorkflow::init_repo(rig.options(&rig.mirror, 1))
        .err()
        .expect("mismatch");
    assert!(matches!(
        err,
        Error::Sync(SyncError::RemoteMismatch { .. })
    ));
}

#[test]
fn failed_push_is_retried_once_the_remote_is_back() {
    let rig = Rig::new();
    let (mut workflow, _) = rig.init(&rig.mirror, 0);
    let author = author();
    fs::write(rig.mirror.join("draft.md"), "draft").expect("write");

    let parked = rig.remote_dir.with_extension("parked");
    fs::rename(&rig.remote_dir, &parked).expect("park remote");
    let err = workflow.commit_and_push(&author).err().expect("push fails");
    assert!(matches!(err, Error::Sync(_)), "unexpected error: {err}");
    assert_eq!(workflow.batch_state().pending, 0);
    fs::rename(&parked, &rig.remote_dir).expect("restore remote");

    let attempt = workflow.commit_and_push(&author).expect("retry");
    let SyncAttempt::Pushed { commit } = attempt else {
        panic!("expected the stranded commit to be pushed, got {attempt:?}");
    };
    let branch = head_branch(&rig.mirror).expect("branch");
    let tip = with_remote_tip(&rig.remote_dir, &branch, |c| c.id()).expect("remote tip");
    assert_eq!(tip, commit);

    assert_eq!(
        workflow.commit_and_push(&author).expect("tick"),
        SyncAttempt::Clean
    );
}

#[test]
fn expired_deadline_fails_push_and_pull() {
    let rig = Rig::new();
    let mut options = rig.options(&rig.mirror, 0);
    options.network = NetworkOptions {
        timeout: Some(Duration::ZERO),
    };
    let (mut workflow, report) = SyncWorkflow::init_repo_with(
        options,
        Box::new(RngThresholds::seeded(7)),
    )
    .expect("init_repo");
    assert_eq!(
        report.pull,
        PullOutcome::Failed(PullSkipped::DeadlineExceeded)
    );

    fs::write(rig.mirror.join("late.txt"), "late").expect("write");
    let before = workflow.batch_state();
    let err = workflow.commit_and_push(&author()).err().expect("deadline");
    assert!(matches!(
        err,
        Error::Sync(SyncError::DeadlineExceeded("push"))
    ));
    assert_eq!(workflow.batch_state(), before);

    let branch = head_branch(&rig.mirror).expect("branch");
    assert!(!remote_has_branch(&rig.remote_dir, &branch).expect("remote"));
}

