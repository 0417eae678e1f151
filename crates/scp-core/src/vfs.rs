//! The Filesystem Adapter interface (`spec.md` §4, §6.3).
//!
//! This module defines the boundary the core consumes; it does not
//! implement a backend. `scp-vfs` provides a disk-backed implementation for
//! the reference binary and integration tests.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Metadata returned by [`Filesystem::stat`]/[`Filesystem::lstat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Whether the entry is a symlink (only meaningful from `lstat`).
    pub is_symlink: bool,
    /// Size in bytes.
    pub size: u64,
    /// Raw permission bits, as the backend reports them; `0` means the
    /// backend has no native notion of permission bits (`spec.md` §4.2).
    pub mode: u32,
    /// Modification time, seconds since the epoch.
    pub mtime: i64,
    /// Access time, seconds since the epoch.
    pub atime: i64,
}

/// One entry yielded by a [`DirLister`] batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// The entry's virtual path (not just its base name).
    pub virtual_path: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Whether the entry is a symlink.
    pub is_symlink: bool,
    /// Permission bits as reported by the backend.
    pub mode: u32,
    /// Size in bytes (files only; directories carry `0`).
    pub size: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: i64,
    /// Access time, seconds since the epoch.
    pub atime: i64,
}

/// Consumed by the Download Engine to page through a directory's children.
///
/// `spec.md` §4.4.1 calls for batched listing (e.g. 256 entries at a time)
/// so a very large directory does not have to be materialized all at once.
/// The final batch, once the directory is exhausted, is empty.
pub trait DirLister: Send {
    /// Returns the next batch, or an empty `Vec` once exhausted.
    fn next_batch(&mut self) -> Result<Vec<DirEntry>, CoreError>;
}

/// A writer obtained from [`Filesystem::create`].
pub trait FileWriter: Send {
    /// Writes `buf` at `offset`.
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<(), CoreError>;
    /// Finalizes the write (e.g. promotes a temp file, per `spec.md` §4.3.2).
    fn close(&mut self) -> Result<(), CoreError>;
}

/// A reader obtained from [`Filesystem::open`].
pub trait FileReader: Send {
    /// Reads into `buf` starting at `offset`, returning bytes read (`0` at EOF).
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, CoreError>;
    /// Releases any resources held by the reader.
    fn close(&mut self) -> Result<(), CoreError>;
}

/// The `(handle, writer, cancel)` triple from `spec.md` §6.3's `create`.
pub struct CreateOutcome {
    /// The writer the Upload Engine streams bytes into.
    pub writer: Box<dyn FileWriter>,
    /// Invoked to discard a partial write (e.g. remove a temp file) if the
    /// transfer is aborted before [`FileWriter::close`] succeeds.
    pub cancel: Box<dyn FnOnce() + Send>,
}

/// The `(handle, reader, cancel)` triple from `spec.md` §6.3's `open`.
pub struct OpenOutcome {
    /// The reader the Download Engine streams bytes from.
    pub reader: Box<dyn FileReader>,
    /// Invoked to release resources if the transfer is aborted.
    pub cancel: Box<dyn FnOnce() + Send>,
}

/// The virtual filesystem interface consumed by the engines (`spec.md`
/// §6.3). One real backend may serve several virtual paths; a user's
/// virtual folders can each resolve through a different `Filesystem`
/// (see [`crate::auth::UserContext::filesystem_for_path`]).
pub trait Filesystem: Send + Sync {
    /// Resolves a virtual path to a backend-specific real path.
    fn resolve_path(&self, virtual_path: &str) -> Result<PathBuf, CoreError>;

    /// Follows symlinks.
    fn stat(&self, real_path: &Path) -> Result<FileStat, CoreError>;

    /// Does not follow symlinks.
    fn lstat(&self, real_path: &Path) -> Result<FileStat, CoreError>;

    /// Whether `err` represents "no such file or directory".
    fn is_not_exist(&self, err: &CoreError) -> bool;

    /// Creates a directory (non-recursively; the parent is assumed to exist).
    fn mkdir(&self, real_path: &Path) -> Result<(), CoreError>;

    /// Opens `real_path` for writing. `truncate` requests the backend debit
    /// the old size immediately rather than at close, per
    /// [`Filesystem::has_truncate_support`] and `spec.md` §4.3.2.
    fn create(&self, real_path: &Path, truncate: bool) -> Result<CreateOutcome, CoreError>;

    /// Opens `real_path` for reading starting at `offset`.
    fn open(&self, real_path: &Path, offset: u64) -> Result<OpenOutcome, CoreError>;

    /// Lists the children of `real_path` in batches.
    fn read_dir(&self, real_path: &Path) -> Result<Box<dyn DirLister>, CoreError>;

    /// Atomically replaces `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), CoreError>;

    /// `true` if [`Filesystem::create`] can honor an atomic rename-on-close
    /// strategy (`spec.md` §4.3.2, §9).
    fn is_atomic_upload_supported(&self) -> bool;

    /// `true` if the backend can resume a partially uploaded file.
    fn is_upload_resume_supported(&self) -> bool;

    /// `true` if `create(.., truncate: true)` reliably reclaims the old
    /// file's size so quota can be debited before the write completes.
    fn has_truncate_support(&self) -> bool;
}
