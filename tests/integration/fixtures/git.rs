use std::path::Path;

use git2::{Commit, Repository};

pub fn init_bare_repo(path: &Path) -> Result<(), String> {
    Repository::init_bare(path)
        .map_err(|err| format!("git init --bare failed for {path:?}: {err}"))?;
    Ok(())
}

/// Short name of the branch HEAD points at (born or not).
pub fn head_branch(repo_dir: &Path) -> Result<String, String> {
    let repo = Repository::open(repo_dir)
        .map_err(|err| format!("open repo failed for {repo_dir:?}: {err}"))?;
    let head = repo
        .find_reference("HEAD")
        .map_err(|err| format!("read HEAD failed: {err}"))?;
    head.symbolic_target()
        .and_then(|target| target.strip_prefix("refs/heads/"))
        .map(str::to_owned)
        .ok_or_else(|| "HEAD is detached".to_string())
}

/// Run `check` against the tip of `branch` in the bare repo at `remote_dir`.
pub fn with_remote_tip<T>(
    remote_dir: &Path,
    branch: &str,
    check: impl FnOnce(&Commit<'_>) -> T,
) -> Result<T, String> {
    let repo = Repository::open_bare(remote_dir)
        .map_err(|err| format!("open bare repo failed for {remote_dir:?}: {err}"))?;
    let reference = repo
        .find_reference(&format!("refs/heads/{branch}"))
        .map_err(|err| format!("remote has no branch {branch}: {err}"))?;
    let commit = reference
        .peel_to_commit()
        .map_err(|err| format!("peel {branch} failed: {err}"))?;
    Ok(check(&commit))
}

pub fn remote_has_branch(remote_dir: &Path, branch: &str) -> Result<bool, String> {
    let repo = Repository::open_bare(remote_dir)
        .map_err(|err| format!("open bare repo failed for {remote_dir:?}: {err}"))?;
    Ok(repo.find_reference(&format!("refs/heads/{branch}")).is_ok())
}
