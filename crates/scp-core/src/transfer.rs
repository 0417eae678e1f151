//! Transfer Handle Bridge: translates between the streaming engines and the
//! externally injected `Transfer` lifecycle, so quota accounting and audit
//! happen uniformly regardless of direction (`spec.md` §2, §3's
//! `TransferContext`).

use std::path::PathBuf;

use crate::auth::UserContext;
use crate::error::CoreError;
use crate::quota::QuotaProvider;
use crate::vfs::{Filesystem, FileReader, FileWriter};

/// The direction of one file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Bytes flow from peer to server.
    Upload,
    /// Bytes flow from server to peer.
    Download,
}

/// The fields needed to construct a [`Transfer`] (`spec.md` §6.3's
/// "Transfer factory").
#[derive(Debug, Clone)]
pub struct TransferParams {
    /// The user-visible virtual path being transferred.
    pub virtual_path: String,
    /// The resolved, backend-specific real path.
    pub real_path: PathBuf,
    /// Upload or download.
    pub direction: Direction,
    /// The byte offset the transfer starts at (always `0` here; `spec.md`
    /// does not use partial-resume offsets beyond what the backend itself
    /// may later support).
    pub offset: u64,
    /// The size already on disk before this transfer began, or `0` when
    /// the backend pre-credited it via truncate support.
    pub initial_size: u64,
    /// The maximum number of bytes this transfer may write, if bounded.
    pub max_write: Option<u64>,
    /// The overwritten file's prior size, to be credited back at close if
    /// the backend lacks truncate support (`spec.md` §4.3.2).
    pub truncated_size: u64,
    /// Whether this transfer creates a new file rather than overwriting one.
    pub is_new: bool,
}

/// The external transfer lifecycle consumed by the bridge (`spec.md` §3's
/// `TransferContext`, §6.3's "Transfer factory"). Implementations own quota
/// accounting and audit logging; the bridge only calls these methods in the
/// prescribed order.
pub trait Transfer: Send {
    /// Records that `n` more bytes have flowed.
    fn record_bytes(&mut self, n: u64);

    /// Marks the transfer failed. Called at most once, before
    /// [`Transfer::close`], on any error path (`spec.md` §3 invariants).
    fn error(&mut self, cause: &CoreError);

    /// Commits quota and finalizes the transfer. Called exactly once
    /// (`spec.md` §8). If [`Transfer::error`] was called first, quota must
    /// not be credited.
    fn close(&mut self) -> Result<(), CoreError>;
}

/// Constructs a [`Transfer`] for one file (`spec.md` §6.3).
pub trait TransferFactory: Send + Sync {
    /// Builds the transfer that will back `params`.
    fn new_transfer(
        &self,
        user: &dyn UserContext,
        fs: &dyn Filesystem,
        quota: &dyn QuotaProvider,
        params: TransferParams,
    ) -> Box<dyn Transfer>;
}

/// Bridges a [`FileWriter`] or [`FileReader`] to a [`Transfer`], forwarding
/// byte counts, errors, and the final close in the order `spec.md` §3 and
/// §8 require.
pub struct TransferHandle {
    writer: Option<Box<dyn FileWriter>>,
    reader: Option<Box<dyn FileReader>>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
    transfer: Box<dyn Transfer>,
    failed: bool,
    /// The cap on cumulative bytes this transfer may write (`spec.md` §3's
    /// `TransferContext`), or `None` if unbounded.
    max_write: Option<u64>,
    bytes_written: u64,
}

impl TransferHandle {
    /// Wraps an upload-side writer. `max_write` bounds the cumulative
    /// bytes [`TransferHandle::write_chunk`] will accept before aborting
    /// with [`CoreError::QuotaExceeded`].
    #[must_use]
    pub fn for_upload(
        writer: Box<dyn FileWriter>,
        cancel: Box<dyn FnOnce() + Send>,
        transfer: Box<dyn Transfer>,
        max_write: Option<u64>,
    ) -> Self {
        TransferHandle {
            writer: Some(writer),
            reader: None,
            cancel: Some(cancel),
            transfer,
            failed: false,
            max_write,
            bytes_written: 0,
        }
    }

    /// Wraps a download-side reader.
    #[must_use]
    pub fn for_download(
        reader: Box<dyn FileReader>,
        cancel: Box<dyn FnOnce() + Send>,
        transfer: Box<dyn Transfer>,
    ) -> Self {
        TransferHandle {
            writer: None,
            reader: Some(reader),
            cancel: Some(cancel),
            transfer,
            failed: false,
            max_write: None,
            bytes_written: 0,
        }
    }

    /// Writes one chunk at `offset` (upload side only), aborting with
    /// [`CoreError::QuotaExceeded`] once cumulative bytes written exceed
    /// the cap passed to [`TransferHandle::for_upload`].
    ///
    /// # Panics
    ///
    /// Panics if called on a handle built with [`TransferHandle::for_download`].
    pub fn write_chunk(&mut self, buf: &[u8], offset: u64) -> Result<(), CoreError> {
        let writer = self.writer.as_mut().expect("write_chunk on a download handle");
        if let Err(e) = writer.write_at(buf, offset) {
            self.fail(&e);
            return Err(e);
        }
        self.bytes_written += buf.len() as u64;
        self.transfer.record_bytes(buf.len() as u64);
        if let Some(max) = self.max_write {
            if self.bytes_written > max {
                let err = CoreError::QuotaExceeded(format!(
                    "upload exceeded the maximum transfer size of {max} bytes"
                ));
                self.fail(&err);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Reads one chunk at `offset` (download side only), returning the
    /// number of bytes read (`0` at EOF).
    ///
    /// # Panics
    ///
    /// Panics if called on a handle built with [`TransferHandle::for_upload`].
    pub fn read_chunk(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, CoreError> {
        let reader = self.reader.as_mut().expect("read_chunk on an upload handle");
        match reader.read_at(buf, offset) {
            Ok(n) => {
                self.transfer.record_bytes(n as u64);
                Ok(n)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    fn fail(&mut self, cause: &CoreError) {
        if !self.failed {
            self.failed = true;
            self.transfer.error(cause);
        }
    }

    /// Marks the transfer failed and invokes the cancel hook, discarding
    /// any partial write (`spec.md` §5 "Cancellation").
    pub fn abort(&mut self, cause: &CoreError) {
        self.fail(cause);
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Closes the underlying I/O handle and the transfer, in that order.
    pub fn close(&mut self) -> Result<(), CoreError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.close()?;
        }
        if let Some(reader) = self.reader.as_mut() {
            reader.close()?;
        }
        self.transfer.close()
    }
}
