//! The Authorization & Quota Gate's quota-side interface (`spec.md` §4,
//! §6.3's "Quota/transfer").

/// The result of a [`QuotaProvider::has_space`] check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceCheck {
    /// `false` if the disk quota has no room for this write.
    pub disk_ok: bool,
    /// `false` if the per-transfer byte quota has no room for this write.
    pub transfer_ok: bool,
}

impl SpaceCheck {
    /// Unconditional pass, for backends with no quota enforcement.
    #[must_use]
    pub const fn unlimited() -> Self {
        SpaceCheck {
            disk_ok: true,
            transfer_ok: true,
        }
    }

    /// `true` only if both checks passed.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.disk_ok && self.transfer_ok
    }
}

/// Quota and transfer-count enforcement, injected per `spec.md` §6.3.
pub trait QuotaProvider: Send + Sync {
    /// Checks the per-user concurrent-transfer-count limit and, if the
    /// check passes, reserves a slot for the transfer that is about to
    /// start. The reserved slot must be released exactly once, via
    /// [`QuotaProvider::release_transfer_slot`], when that transfer ends
    /// (whether it succeeds or fails).
    fn is_new_transfer_allowed(&self, username: &str) -> Result<(), crate::error::CoreError>;

    /// Checks whether `virtual_path` has room for a new write.
    fn has_space(
        &self,
        username: &str,
        is_new: bool,
        is_dir: bool,
        virtual_path: &str,
    ) -> SpaceCheck;

    /// The remaining transfer-byte quota, if bounded.
    fn transfer_quota(&self, username: &str) -> Option<u64>;

    /// The maximum number of bytes a single write may contain, if bounded.
    fn max_write_size(&self, username: &str) -> Option<u64>;

    /// Releases a concurrent-transfer slot previously reserved by a
    /// successful call to [`QuotaProvider::is_new_transfer_allowed`].
    fn release_transfer_slot(&self, username: &str);

    /// Adjusts the user's overall disk-usage accounting.
    fn update_user_quota(&self, username: &str, size_delta: i64, files_delta: i64);

    /// Adjusts a specific virtual folder's disk-usage accounting.
    fn update_user_folder_quota(
        &self,
        username: &str,
        virtual_folder: &str,
        size_delta: i64,
        files_delta: i64,
    );
}
