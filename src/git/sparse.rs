//! Sparse-checkout configuration.
//!
//! libgit2 has no sparse-checkout support, so the agent writes the settings
//! that `git` itself reads: `core.sparseCheckout` and an `info/sparse-checkout`
//! pattern file. The pattern `/*` includes everything, so the checkout is never
//! narrowed; the settings only exist for tooling that inspects them.
//!
//! Every step is best-effort. Failures are collected into a
//! [`SparseCheckoutReport`] and logged, never propagated.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Pattern that matches every path in the tree.
pub const MATCH_EVERYTHING: &str = "/*";

/// One of the three configuration steps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SparseStep {
    EnableFlag,
    InfoDir,
    PatternFile,
}

impl fmt::Display for SparseStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SparseStep::EnableFlag => "enable core.sparseCheckout",
            SparseStep::InfoDir => "create info directory",
            SparseStep::PatternFile => "write sparse-checkout patterns",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StepFailure {
    pub step: SparseStep,
    pub reason: String,
}

/// Outcome of a configuration pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SparseCheckoutReport {
    pub skipped: bool,
    pub failures: Vec<StepFailure>,
}

impl SparseCheckoutReport {
    pub fn skipped() -> Self {
        SparseCheckoutReport {
            skipped: true,
            failures: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.skipped && self.failures.is_empty()
    }

    fn record(&mut self, step: SparseStep, result: Result<(), String>) {
        if let Err(reason) = result {
            tracing::warn!(%step, %reason, "sparse-checkout step failed");
            self.failures.push(StepFailure { step, reason });
        }
    }
}

/// Local repository configuration applied after open/create.
///
/// # Laws
/// - Must be idempotent: applying twice leaves the same configuration.
/// - Must not fail the caller; problems are reported, not returned as errors.
pub trait LocalConfigurator {
    fn apply(&self, workdir: &Path, git_dir: &Path) -> SparseCheckoutReport;
}

/// Writes the settings directly through git2 and the filesystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct NativeSparseCheckout;

impl LocalConfigurator for NativeSparseCheckout {
    fn apply(&self, workdir: &Path, git_dir: &Path) -> SparseCheckoutReport {
        let mut report = SparseCheckoutReport::default();

        let flag = git2::Repository::open(workdir)
            .and_then(|repo| repo.config())
            .and_then(|cfg| cfg.open_level(git2::ConfigLevel::Local))
            .and_then(|mut cfg| cfg.set_bool("core.sparseCheckout", true))
            .map_err(|e| e.to_string());
        report.record(SparseStep::EnableFlag, flag);

        let info = info_dir(git_dir);
        report.record(
            SparseStep::InfoDir,
            fs::create_dir_all(&info).map_err(|e| e.to_string()),
        );
        report.record(
            SparseStep::PatternFile,
            fs::write(info.join("sparse-checkout"), format!("{MATCH_EVERYTHING}\n"))
                .map_err(|e| e.to_string()),
        );

        report
    }
}

/// Runs the `git` binary inside the working tree.
#[derive(Clone, Debug)]
pub struct GitCliSparseCheckout {
    git: PathBuf,
}

impl Default for GitCliSparseCheckout {
    fn default() -> Self {
        GitCliSparseCheckout {
            git: PathBuf::from("git"),
        }
    }
}

impl GitCliSparseCheckout {
    #[cfg(test)]
    fn with_binary(git: impl Into<PathBuf>) -> Self {
        GitCliSparseCheckout { git: git.into() }
    }

    fn run(&self, workdir: &Path, args: &[&str]) -> Result<(), String> {
        let output = Command::new(&self.git)
            .args(args)
            .current_dir(workdir)
            .output()
            .map_err(|e| format!("failed to spawn {}: {e}", self.git.display()))?;
        if output.status.success() {
            return Ok(());
        }
        Err(format!(
            "{} {} exited with {}: {}",
            self.git.display(),
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ))
    }
}

impl LocalConfigurator for GitCliSparseCheckout {
    fn apply(&self, workdir: &Path, git_dir: &Path) -> SparseCheckoutReport {
        let mut report = SparseCheckoutReport::default();
        report.record(
            SparseStep::EnableFlag,
            self.run(workdir, &["config", "core.sparsecheckout", "true"]),
        );
        let info = info_dir(git_dir);
        report.record(
            SparseStep::InfoDir,
            fs::create_dir_all(&info).map_err(|e| e.to_string()),
        );
        report.record(
            SparseStep::PatternFile,
            fs::write(info.join("sparse-checkout"), format!("{MATCH_EVERYTHING}\n"))
                .map_err(|e| e.to_string()),
        );
        report
    }
}

/// Leaves the repository configuration untouched.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSparseCheckout;

impl LocalConfigurator for NoSparseCheckout {
    fn apply(&self, _workdir: &Path, _git_dir: &Path) -> SparseCheckoutReport {
        SparseCheckoutReport::skipped()
    }
}

fn info_dir(git_dir: &Path) -> PathBuf {
    git_dir.join("info")
}
