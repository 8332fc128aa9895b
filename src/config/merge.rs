use std::path::PathBuf;

use super::Config;

/// Apply `COMMIT_REPUT_*` environment variables on top of `config`.
pub fn apply_env_overrides(config: &mut Config) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Same as [`apply_env_overrides`] with an explicit variable lookup.
///
/// Blank values are ignored; unparsable numbers are ignored with a warning.
pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| {
        lookup(key)
            .map(|raw| raw.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    if let Some(path) = get("COMMIT_REPUT_REPO_PATH") {
        config.repo.path = Some(PathBuf::from(path));
    }
    if let Some(identifier) = get("COMMIT_REPUT_REMOTE") {
        config.remote.identifier = Some(identifier);
    }
    if let Some(url) = get("COMMIT_REPUT_REMOTE_URL") {
        config.remote.url = Some(url);
    }
    if let Some(path) = get("COMMIT_REPUT_KEY_PATH") {
        config.auth.key_path = Some(PathBuf::from(path));
    }
    if let Some(name) = get("COMMIT_REPUT_AUTHOR_NAME") {
        config.author.name = name;
    }
    if let Some(email) = get("COMMIT_REPUT_AUTHOR_EMAIL") {
        config.author.email = email;
    }

    if let Some(raw) = get("COMMIT_REPUT_THRESHOLD_MIN") {
        match raw.parse::<u32>() {
            Ok(value) => config.batch.threshold_min = value,
            Err(err) => tracing::warn!("invalid COMMIT_REPUT_THRESHOLD_MIN, ignoring: {err}"),
        }
    }
    if let Some(raw) = get("COMMIT_REPUT_THRESHOLD_MAX") {
        match raw.parse::<u32>() {
            Ok(value) => config.batch.threshold_max = value,
            Err(err) => tracing::warn!("invalid COMMIT_REPUT_THRESHOLD_MAX, ignoring: {err}"),
        }
    }
}
