//! A [`TransferFactory`] that logs each transfer's lifecycle via `tracing`
//! and commits the net quota delta on close (`spec.md` §3's
//! `TransferContext`, §6.3's "Transfer factory").

use std::path::PathBuf;
use std::sync::Arc;

use scp_core::auth::UserContext;
use scp_core::error::CoreError;
use scp_core::quota::QuotaProvider;
use scp_core::transfer::{Direction, Transfer, TransferFactory, TransferParams};
use scp_core::vfs::Filesystem;

/// Builds [`LoggingTransfer`]s, committing quota updates against a shared
/// [`QuotaProvider`].
///
/// `new_transfer` is handed a borrowed `&dyn QuotaProvider`, but the
/// returned `Transfer` must outlive that borrow, so the factory keeps its
/// own owning handle to the same store instead of reusing the borrowed
/// one.
pub struct LoggingTransferFactory {
    quota: Arc<dyn QuotaProvider>,
}

impl LoggingTransferFactory {
    /// Builds a factory that commits quota updates to `quota`. The caller
    /// is expected to pass this same store as the `quota` argument to
    /// `scp-core`'s engines, so pre-transfer checks and post-transfer
    /// commits stay consistent.
    #[must_use]
    pub fn new(quota: Arc<dyn QuotaProvider>) -> Self {
        LoggingTransferFactory { quota }
    }
}

impl TransferFactory for LoggingTransferFactory {
    fn new_transfer(
        &self,
        user: &dyn UserContext,
        _fs: &dyn Filesystem,
        _quota: &dyn QuotaProvider,
        params: TransferParams,
    ) -> Box<dyn Transfer> {
        Box::new(LoggingTransfer {
            quota: Arc::clone(&self.quota),
            username: user.username().to_owned(),
            virtual_path: params.virtual_path,
            real_path: params.real_path,
            direction: params.direction,
            truncated_size: params.truncated_size,
            is_new: params.is_new,
            bytes_transferred: 0,
            failed: false,
            slot_released: false,
        })
    }
}

struct LoggingTransfer {
    quota: Arc<dyn QuotaProvider>,
    username: String,
    virtual_path: String,
    real_path: PathBuf,
    direction: Direction,
    truncated_size: u64,
    is_new: bool,
    bytes_transferred: u64,
    failed: bool,
    /// Guards the one-time release of the concurrent-transfer slot
    /// reserved by `QuotaProvider::is_new_transfer_allowed`, since exactly
    /// one of `error`/`close` runs per transfer but never both.
    slot_released: bool,
}

impl LoggingTransfer {
    fn release_slot(&mut self) {
        if !self.slot_released {
            self.slot_released = true;
            self.quota.release_transfer_slot(&self.username);
        }
    }
}

impl Transfer for LoggingTransfer {
    fn record_bytes(&mut self, n: u64) {
        self.bytes_transferred += n;
    }

    fn error(&mut self, cause: &CoreError) {
        self.failed = true;
        self.release_slot();
        #[cfg(feature = "tracing")]
        tracing::warn!(
            user = %self.username,
            path = %self.virtual_path,
            bytes = self.bytes_transferred,
            error = %cause,
            "transfer failed"
        );
        #[cfg(not(feature = "tracing"))]
        let _ = cause;
    }

    fn close(&mut self) -> Result<(), CoreError> {
        self.release_slot();
        if self.failed {
            return Ok(());
        }

        if self.direction == Direction::Upload {
            let bytes = i64::try_from(self.bytes_transferred).unwrap_or(i64::MAX);
            let truncated = i64::try_from(self.truncated_size).unwrap_or(i64::MAX);
            let size_delta = bytes - truncated;
            let files_delta = if self.is_new { 1 } else { 0 };
            self.quota.update_user_quota(&self.username, size_delta, files_delta);
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            user = %self.username,
            path = %self.virtual_path,
            real_path = %self.real_path.display(),
            bytes = self.bytes_transferred,
            direction = ?self.direction,
            "transfer complete"
        );

        Ok(())
    }
}
