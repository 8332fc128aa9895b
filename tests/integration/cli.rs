//! Runs the `commit-reput` binary against temp dirs and a local bare remote.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

use crate::fixtures::TEST_KEY;
use crate::fixtures::git::{head_branch, init_bare_repo, remote_has_branch};

struct CliRig {
    root: TempDir,
}

impl CliRig {
    fn new() -> Self {
        let root = TempDir::new().expect("tempdir");
        init_bare_repo(&root.path().join("remote.git")).expect("bare remote");
        fs::write(root.path().join("id_test"), TEST_KEY).expect("write key");
        CliRig { root }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    fn mirror(&self) -> PathBuf {
        self.path("mirror")
    }

    fn write_config(&self, threshold: u32) -> PathBuf {
        let config = self.path("config.toml");
        let body = format!(
            "sparse_checkout = \"off\"\n\n\
             [repo]\npath = '{}'\n\n\
             [remote]\nurl = '{}'\n\n\
             [auth]\nkey_path = '{}'\n\n\
             [batch]\nthreshold_min = {threshold}\nthreshold_max = {threshold}\n\n\
             [author]\nname = \"CLI Mirror\"\nemail = \"cli@example.com\"\n\n\
             [logging]\nstdout = false\n",
            self.mirror().display(),
            self.path("remote.git").display(),
            self.path("id_test").display(),
        );
        fs::write(&config, body).expect("write config");
        config
    }

    fn cmd(&self, config: &Path) -> Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("commit-reput");
        cmd.env_remove("COMMIT_REPUT_LOG");
        cmd.env("COMMIT_REPUT_CONFIG", config);
        cmd.env("COMMIT_REPUT_LOG_DIR", self.path("logs"));
        cmd.env("XDG_CONFIG_HOME", self.path("xdg"));
        cmd
    }
}

#[test]
fn help_lists_subcommands() {
    assert_cmd::cargo::cargo_bin_cmd!("commit-reput")
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("once"))
                .and(predicate::str::contains("run")),
        );
}

#[test]
fn init_then_once_pushes_changes() {
    let rig = CliRig::new();
    let config = rig.write_config(0);

    rig.cmd(&config)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("repository created"));
    assert!(rig.mirror().join(".git").exists());

    fs::write(rig.mirror().join("page.md"), "hello").expect("write");
    rig.cmd(&config)
        .arg("once")
        .assert()
        .success()
        .stdout(predicate::str::contains("committed").and(predicate::str::contains("pushed")));

    let branch = head_branch(&rig.mirror()).expect("branch");
    assert!(remote_has_branch(&rig.path("remote.git"), &branch).expect("remote"));
}

#[test]
fn bounded_run_reports_tally() {
    let rig = CliRig::new();
    let config = rig.write_config(1);

    rig.cmd(&config)
        .args(["run", "--interval-secs", "1", "--rounds", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 ticks"));
}

#[test]
fn missing_settings_fail_with_error() {
    let rig = CliRig::new();
    let config = rig.path("empty.toml");
    fs::write(&config, "").expect("write config");

    rig.cmd(&config)
        .arg("once")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing required setting"));
}

#[test]
fn unparsable_config_exits_with_config_error() {
    let rig = CliRig::new();
    let config = rig.path("broken.toml");
    fs::write(&config, "[batch\nthreshold_min = ").expect("write config");

    rig.cmd(&config)
        .arg("init")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("failed to parse"));
}

#[test]
fn write_config_refuses_to_overwrite_without_force() {
    let rig = CliRig::new();
    let config = rig.path("fresh/config.toml");

    rig.cmd(&config)
        .arg("write-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));
    let written = fs::read_to_string(&config).expect("config written");
    assert!(written.contains("[batch]"));

    rig.cmd(&config)
        .arg("write-config")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    rig.cmd(&config)
        .args(["write-config", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));
}
