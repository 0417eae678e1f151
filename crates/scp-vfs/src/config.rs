//! Hand-built configuration for the disk-backed backend (`spec.md` §4.8).
//!
//! There is deliberately no `serde`/TOML layer here, matching
//! `crates/core::server::config::ServerConfig`: the reference binary builds
//! these structs directly from parsed CLI flags.

use std::path::PathBuf;

/// Top-level configuration for one `scp-server` process.
#[derive(Debug, Clone)]
pub struct ScpServerConfig {
    /// Whether an overwritten file is pre-renamed to a backup name before
    /// the new content is opened for writing (`spec.md` §4.3.2, §9,
    /// GLOSSARY "Atomic upload").
    pub atomic_uploads: bool,
    /// The maximum number of concurrently registered connections, or `None`
    /// for unbounded (`spec.md` §4.5, §9).
    pub max_connections: Option<usize>,
    /// The known users this server will accept connections for.
    pub users: Vec<UserConfig>,
}

impl ScpServerConfig {
    /// Looks up a configured user by name.
    #[must_use]
    pub fn user(&self, username: &str) -> Option<&UserConfig> {
        self.users.iter().find(|u| u.username == username)
    }
}

/// Per-user settings: home directory, ownership, quota, and file-pattern
/// policy (`spec.md` §6.3's "User/authorization" and "Quota/transfer").
#[derive(Debug, Clone)]
pub struct UserConfig {
    /// The authenticated username.
    pub username: String,
    /// The uid propagated onto files and directories this user creates.
    pub uid: u32,
    /// The gid propagated onto files and directories this user creates.
    pub gid: u32,
    /// The real filesystem directory this user's virtual root `/` maps to.
    pub home: PathBuf,
    /// If `true`, uploads and directory creation are always denied.
    pub read_only: bool,
    /// Case-sensitive filename suffixes that are allowed; empty means "all
    /// files allowed" unless overridden by `denied_suffixes`.
    pub allowed_suffixes: Vec<String>,
    /// Case-sensitive filename suffixes that are always denied, checked
    /// before `allowed_suffixes`.
    pub denied_suffixes: Vec<String>,
    /// Total on-disk byte quota for this user, or `None` for unbounded.
    pub max_disk_bytes: Option<u64>,
    /// Per-transfer byte quota, or `None` for unbounded.
    pub max_transfer_bytes: Option<u64>,
    /// Maximum number of concurrent transfers, or `None` for unbounded.
    pub max_concurrent_transfers: Option<usize>,
}

impl UserConfig {
    /// A user with no quota, pattern, or concurrency restrictions, rooted at
    /// `home`.
    #[must_use]
    pub fn unrestricted(username: impl Into<String>, home: PathBuf, uid: u32, gid: u32) -> Self {
        UserConfig {
            username: username.into(),
            uid,
            gid,
            home,
            read_only: false,
            allowed_suffixes: Vec::new(),
            denied_suffixes: Vec::new(),
            max_disk_bytes: None,
            max_transfer_bytes: None,
            max_concurrent_transfers: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_lookup_finds_configured_name() {
        let config = ScpServerConfig {
            atomic_uploads: true,
            max_connections: None,
            users: vec![UserConfig::unrestricted("alice", PathBuf::from("/srv/alice"), 1000, 1000)],
        };
        assert!(config.user("alice").is_some());
        assert!(config.user("bob").is_none());
    }
}
