pub mod git;

/// Throwaway ed25519 key; only ever used against local file remotes.
pub const TEST_KEY: &str = include_str!("id_ed25519_test");
