//! SSH credentials for fetch and push.
//!
//! Keys are parsed once up front so a malformed key fails initialization
//! instead of the first network round-trip. Host keys are not verified: the
//! agent talks to one fixed remote and carries no known-hosts state.

use std::fmt;

use git2::{CertificateCheckStatus, Cred, RemoteCallbacks};

use super::error::AuthError;
use super::remote::Deadline;

/// Principal every SSH git host expects.
pub const SSH_USERNAME: &str = "git";

/// libgit2 re-invokes the credentials callback after each rejection.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept whatever host key the server presents.
    AcceptAny,
}

/// Parsed SSH identity shared by every pull and push.
#[derive(Clone)]
pub struct SshCredential {
    username: &'static str,
    private_key: String,
    passphrase: Option<String>,
    host_keys: HostKeyPolicy,
}

impl fmt::Debug for SshCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshCredential")
            .field("username", &self.username)
            .field("private_key", &"<redacted>")
            .field("host_keys", &self.host_keys)
            .finish()
    }
}

impl SshCredential {
    /// Parse `key` (OpenSSH or PEM encoded) into a credential for user `git`.
    pub fn generate(key: &[u8], passphrase: Option<&str>) -> Result<Self, AuthError> {
        let text = std::str::from_utf8(key).map_err(|_| AuthError::NotUtf8)?;
        russh_keys::decode_secret_key(text, passphrase).map_err(AuthError::InvalidKey)?;
        Ok(SshCredential {
            username: SSH_USERNAME,
            private_key: text.to_owned(),
            passphrase: passphrase.map(str::to_owned),
            host_keys: HostKeyPolicy::AcceptAny,
        })
    }

    pub fn username(&self) -> &str {
        self.username
    }

    pub fn host_key_policy(&self) -> HostKeyPolicy {
        self.host_keys
    }

    /// Callbacks wiring this credential into a fetch or push.
    ///
    /// Every callback checks `deadline`; returning an error or `false` from
    /// any of them makes libgit2 abort the transfer.
    pub fn remote_callbacks(&self, deadline: Deadline) -> RemoteCallbacks<'_> {
        let mut callbacks = RemoteCallbacks::new();

        let mut attempts = 0usize;
        callbacks.credentials(move |_url, _username_from_url, allowed| {
            if deadline.expired() {
                return Err(git2::Error::from_str("network deadline exceeded"));
            }
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS {
                return Err(git2::Error::from_str("ssh key rejected by remote"));
            }
            if allowed.is_username() {
                return Cred::username(self.username);
            }
            if !allowed.is_ssh_key() && !allowed.is_ssh_memory() {
                return Err(git2::Error::from_str(
                    "remote does not accept ssh key authentication",
                ));
            }
            Cred::ssh_key_from_memory(
                self.username,
                None,
                &self.private_key,
                self.passphrase.as_deref(),
            )
        });

        match self.host_keys {
            HostKeyPolicy::AcceptAny => {
                callbacks.certificate_check(move |_cert, host| {
                    if deadline.expired() {
                        return Err(git2::Error::from_str("network deadline exceeded"));
                    }
                    tracing::trace!(host, "accepting host key without verification");
                    Ok(CertificateCheckStatus::CertificateOk)
                });
            }
        }

        callbacks.push_negotiation(move |_updates| {
            if deadline.expired() {
                return Err(git2::Error::from_str("network deadline exceeded"));
            }
            Ok(())
        });
        callbacks.transfer_progress(move |_| !deadline.expired());
        callbacks.sideband_progress(move |_| !deadline.expired());
        callbacks
    }
}
