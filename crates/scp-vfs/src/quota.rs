//! An in-memory [`QuotaProvider`] backed by per-user counters (`spec.md`
//! §6.3's "Quota/transfer").
//!
//! Disk usage, active transfer counts, and folder usage all live in
//! `dashmap::DashMap`s keyed by username (and, for folders, by
//! `(username, virtual_folder)`), matching the concurrent-registry pattern
//! `scp_core::registry::InProcessConnectionRegistry` already uses.

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use dashmap::DashMap;

use scp_core::quota::{QuotaProvider, SpaceCheck};

use crate::config::ScpServerConfig;

#[derive(Default)]
struct UserUsage {
    disk_bytes: AtomicI64,
    active_transfers: AtomicUsize,
}

/// An in-memory quota store driven by [`crate::config::UserConfig`] limits.
///
/// Usage counters start at zero regardless of what is already on disk; a
/// real deployment would seed them from a persisted accounting store at
/// startup. This backend is meant for the reference binary and for tests,
/// not as a durable quota ledger.
pub struct InMemoryQuotaStore {
    config: ScpServerConfig,
    usage: DashMap<String, UserUsage>,
    folder_usage: DashMap<(String, String), AtomicI64>,
}

impl InMemoryQuotaStore {
    /// Builds a quota store that enforces the limits in `config`.
    #[must_use]
    pub fn new(config: ScpServerConfig) -> Self {
        InMemoryQuotaStore {
            config,
            usage: DashMap::new(),
            folder_usage: DashMap::new(),
        }
    }

    fn usage_for(&self, username: &str) -> dashmap::mapref::one::RefMut<'_, String, UserUsage> {
        self.usage.entry(username.to_owned()).or_default()
    }
}

impl QuotaProvider for InMemoryQuotaStore {
    fn is_new_transfer_allowed(&self, username: &str) -> Result<(), scp_core::error::CoreError> {
        let Some(user) = self.config.user(username) else {
            return Ok(());
        };
        let Some(limit) = user.max_concurrent_transfers else {
            return Ok(());
        };
        let usage = self.usage_for(username);
        let active = usage.active_transfers.load(Ordering::SeqCst);
        if active >= limit {
            return Err(scp_core::error::CoreError::QuotaExceeded(format!(
                "{username} already has {active} concurrent transfers (limit {limit})"
            )));
        }
        usage.active_transfers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn has_space(&self, username: &str, _is_new: bool, _is_dir: bool, _virtual_path: &str) -> SpaceCheck {
        let Some(user) = self.config.user(username) else {
            return SpaceCheck::unlimited();
        };
        let disk_ok = match user.max_disk_bytes {
            None => true,
            Some(limit) => {
                let used = self.usage_for(username).disk_bytes.load(Ordering::SeqCst).max(0) as u64;
                used < limit
            }
        };
        SpaceCheck {
            disk_ok,
            transfer_ok: true,
        }
    }

    fn transfer_quota(&self, username: &str) -> Option<u64> {
        self.config.user(username).and_then(|u| u.max_transfer_bytes)
    }

    fn max_write_size(&self, username: &str) -> Option<u64> {
        self.config.user(username).and_then(|u| u.max_transfer_bytes)
    }

    fn release_transfer_slot(&self, username: &str) {
        self.usage_for(username)
            .active_transfers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| Some(v.saturating_sub(1)))
            .ok();
    }

    fn update_user_quota(&self, username: &str, size_delta: i64, _files_delta: i64) {
        // Concurrent-transfer accounting is handled separately by
        // `is_new_transfer_allowed`/`release_transfer_slot`; this only
        // tracks disk usage.
        self.usage_for(username).disk_bytes.fetch_add(size_delta, Ordering::SeqCst);
    }

    fn update_user_folder_quota(&self, username: &str, virtual_folder: &str, size_delta: i64, _files_delta: i64) {
        let key = (username.to_owned(), virtual_folder.to_owned());
        self.folder_usage.entry(key).or_default().fetch_add(size_delta, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::config::UserConfig;

    fn store_with_limit(max_disk_bytes: Option<u64>, max_concurrent_transfers: Option<usize>) -> InMemoryQuotaStore {
        let mut user = UserConfig::unrestricted("alice", PathBuf::from("/srv/alice"), 1000, 1000);
        user.max_disk_bytes = max_disk_bytes;
        user.max_concurrent_transfers = max_concurrent_transfers;
        InMemoryQuotaStore::new(ScpServerConfig {
            atomic_uploads: true,
            max_connections: None,
            users: vec![user],
        })
    }

    #[test]
    fn unconfigured_user_is_unlimited() {
        let store = InMemoryQuotaStore::new(ScpServerConfig {
            atomic_uploads: true,
            max_connections: None,
            users: vec![],
        });
        assert!(store.is_new_transfer_allowed("ghost").is_ok());
        assert!(store.has_space("ghost", true, false, "/x").is_ok());
    }

    #[test]
    fn disk_quota_blocks_once_exhausted() {
        let store = store_with_limit(Some(100), None);
        assert!(store.has_space("alice", true, false, "/f").is_ok());
        store.update_user_quota("alice", 100, 1);
        assert!(!store.has_space("alice", true, false, "/f").is_ok());
    }

    #[test]
    fn transfer_count_limit_enforced() {
        let store = store_with_limit(None, Some(1));
        assert!(store.is_new_transfer_allowed("alice").is_ok());
        assert!(store.is_new_transfer_allowed("alice").is_err());
        store.release_transfer_slot("alice");
        assert!(store.is_new_transfer_allowed("alice").is_ok());
    }

    #[test]
    fn sequential_transfers_never_exhaust_the_concurrency_limit() {
        // A run of one-at-a-time transfers, each released before the next
        // starts, must never trip the concurrency limit no matter how many
        // complete in sequence.
        let store = store_with_limit(None, Some(2));
        for _ in 0..5 {
            assert!(store.is_new_transfer_allowed("alice").is_ok());
            store.update_user_quota("alice", 10, 1);
            store.release_transfer_slot("alice");
        }
    }
}
