//! A disk-backed [`Filesystem`] rooted at a real directory and exposed under
//! one virtual-path prefix (`spec.md` §6.3). One instance serves either a
//! user's main home directory (prefix `"/"`) or a single virtual folder
//! mount (prefix e.g. `"/mnt/archive"`); `StaticUserContext` picks the
//! right instance per path.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use scp_core::error::CoreError;
use scp_core::vfs::{CreateOutcome, DirEntry, DirLister, FileReader, FileStat, FileWriter, Filesystem, OpenOutcome};

#[cfg(unix)]
use std::os::unix::fs::{FileExt, MetadataExt, PermissionsExt};

const BATCH_SIZE: usize = 256;
const NOT_EXIST_PREFIX: &str = "NotFound: ";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A disk-backed [`Filesystem`] implementation.
pub struct DiskFilesystem {
    root: PathBuf,
    virtual_prefix: String,
    atomic_uploads: bool,
    owner: Option<(u32, u32)>,
}

impl DiskFilesystem {
    /// Creates a backend rooted at `root`, serving the virtual namespace
    /// under `virtual_prefix` (use `"/"` for a user's main filesystem).
    #[must_use]
    pub fn new(root: PathBuf, virtual_prefix: impl Into<String>, atomic_uploads: bool) -> Self {
        DiskFilesystem {
            root,
            virtual_prefix: normalize_prefix(virtual_prefix.into()),
            atomic_uploads,
            owner: None,
        }
    }

    /// Propagates `uid`/`gid` onto every file and directory this backend
    /// creates (`spec.md` §2 "permission propagation", §4.3.3).
    #[must_use]
    pub fn with_owner(mut self, uid: u32, gid: u32) -> Self {
        self.owner = Some((uid, gid));
        self
    }

    fn propagate_owner(&self, path: &Path) {
        if let Some((uid, gid)) = self.owner {
            if let Err(_err) = chown(path, uid, gid) {
                #[cfg(feature = "tracing")]
                tracing::warn!(path = %path.display(), error = %_err, "failed to propagate ownership");
            }
        }
    }

    fn relative_virtual(&self, virtual_path: &str) -> Result<String, CoreError> {
        let stripped = if self.virtual_prefix == "/" {
            Some(virtual_path)
        } else {
            virtual_path.strip_prefix(&self.virtual_prefix).filter(|rest| {
                rest.is_empty() || rest.starts_with('/')
            })
        };
        let stripped = stripped.ok_or_else(|| {
            CoreError::Fs(format!(
                "{virtual_path} is not under this backend's mount {}",
                self.virtual_prefix
            ))
        })?;
        Ok(stripped.trim_start_matches('/').to_owned())
    }

    /// The virtual path of a real path known to live under `self.root`.
    fn virtual_path_of(&self, real_path: &Path) -> String {
        let rel = real_path.strip_prefix(&self.root).unwrap_or(real_path);
        let rel_str = rel.to_string_lossy().replace('\\', "/");
        if self.virtual_prefix == "/" {
            format!("/{rel_str}")
        } else if rel_str.is_empty() {
            self.virtual_prefix.clone()
        } else {
            format!("{}/{rel_str}", self.virtual_prefix)
        }
    }
}

/// Trims a trailing slash from a mount prefix, except for the root `"/"`.
fn normalize_prefix(prefix: String) -> String {
    if prefix.len() > 1 && prefix.ends_with('/') {
        prefix.trim_end_matches('/').to_owned()
    } else if prefix.is_empty() {
        "/".to_owned()
    } else {
        prefix
    }
}

#[cfg(unix)]
fn chown(path: &Path, uid: u32, gid: u32) -> io::Result<()> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains interior NUL"))?;
    // SAFETY: `c_path` is a valid, NUL-terminated representation of `path`.
    let result = unsafe { libc::chown(c_path.as_ptr(), uid, gid) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn chown(_path: &Path, _uid: u32, _gid: u32) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "chown is only available on Unix"))
}

fn io_not_found(context: &str, err: &io::Error) -> CoreError {
    if err.kind() == io::ErrorKind::NotFound {
        CoreError::Fs(format!("{NOT_EXIST_PREFIX}{context}"))
    } else {
        CoreError::Fs(format!("{context}: {err}"))
    }
}

#[cfg(unix)]
fn stat_to_filestat(meta: &fs::Metadata, is_symlink: bool) -> FileStat {
    FileStat {
        is_dir: meta.is_dir(),
        is_symlink,
        size: meta.len(),
        mode: meta.permissions().mode() & 0o7777,
        mtime: meta.mtime(),
        atime: meta.atime(),
    }
}

#[cfg(not(unix))]
fn stat_to_filestat(meta: &fs::Metadata, is_symlink: bool) -> FileStat {
    let secs = |t: io::Result<std::time::SystemTime>| {
        t.ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs() as i64)
    };
    FileStat {
        is_dir: meta.is_dir(),
        is_symlink,
        size: meta.len(),
        mode: 0,
        mtime: secs(meta.modified()),
        atime: secs(meta.accessed()),
    }
}

impl Filesystem for DiskFilesystem {
    fn resolve_path(&self, virtual_path: &str) -> Result<PathBuf, CoreError> {
        let relative = self.relative_virtual(virtual_path)?;
        let mut resolved = self.root.clone();
        for component in Path::new(&relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(CoreError::Fs(format!(
                        "{virtual_path} escapes the backend root"
                    )));
                }
            }
        }
        Ok(resolved)
    }

    fn stat(&self, real_path: &Path) -> Result<FileStat, CoreError> {
        let meta = fs::metadata(real_path).map_err(|e| io_not_found("stat", &e))?;
        Ok(stat_to_filestat(&meta, false))
    }

    fn lstat(&self, real_path: &Path) -> Result<FileStat, CoreError> {
        let meta = fs::symlink_metadata(real_path).map_err(|e| io_not_found("lstat", &e))?;
        let is_symlink = meta.file_type().is_symlink();
        Ok(stat_to_filestat(&meta, is_symlink))
    }

    fn is_not_exist(&self, err: &CoreError) -> bool {
        matches!(err, CoreError::Fs(msg) if msg.starts_with(NOT_EXIST_PREFIX))
    }

    fn mkdir(&self, real_path: &Path) -> Result<(), CoreError> {
        fs::create_dir(real_path).map_err(|e| io_not_found("mkdir", &e))?;
        self.propagate_owner(real_path);
        Ok(())
    }

    fn create(&self, real_path: &Path, truncate: bool) -> Result<CreateOutcome, CoreError> {
        if self.atomic_uploads {
            // `spec.md` §4.3.2/§9: the pre-existing file, if any, is renamed
            // out of the way *before* the new handle is opened, so the old
            // content survives under a backup name until the new write
            // commits. The new content is written directly at `real_path`,
            // not through a separately-named temp file.
            let id = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
            let file_name = real_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let backup_path = real_path.with_file_name(format!(".scp-upload-{file_name}.{id}.bak"));

            let had_existing = real_path.exists();
            if had_existing {
                fs::rename(real_path, &backup_path).map_err(|e| io_not_found("pre-rename", &e))?;
            }

            let file = match OpenOptions::new().write(true).create(true).truncate(true).open(real_path) {
                Ok(file) => file,
                Err(e) => {
                    if had_existing {
                        let _ = fs::rename(&backup_path, real_path);
                    }
                    return Err(io_not_found("create", &e));
                }
            };

            let backup_for_close = had_existing.then(|| backup_path.clone());
            let backup_for_cancel = had_existing.then_some(backup_path);
            let real_for_cancel = real_path.to_path_buf();

            let writer = Box::new(DiskWriter {
                file,
                direct_target: real_path.to_path_buf(),
                backup: backup_for_close,
                owner: self.owner,
            });
            let cancel = Box::new(move || {
                let _ = fs::remove_file(&real_for_cancel);
                if let Some(backup) = backup_for_cancel {
                    let _ = fs::rename(&backup, &real_for_cancel);
                }
            });
            Ok(CreateOutcome { writer, cancel })
        } else {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(truncate)
                .open(real_path)
                .map_err(|e| io_not_found("create", &e))?;
            let writer = Box::new(DiskWriter {
                file,
                direct_target: real_path.to_path_buf(),
                backup: None,
                owner: self.owner,
            });
            // No atomic rename available; an aborted non-atomic overwrite
            // cannot be rolled back, matching `spec.md` §9's note that
            // atomicity is a backend capability, not a universal guarantee.
            let cancel = Box::new(|| {});
            Ok(CreateOutcome { writer, cancel })
        }
    }

    fn open(&self, real_path: &Path, offset: u64) -> Result<OpenOutcome, CoreError> {
        let file = fs::File::open(real_path).map_err(|e| io_not_found("open", &e))?;
        let reader = Box::new(DiskReader { file, _offset: offset });
        let cancel = Box::new(|| {});
        Ok(OpenOutcome { reader, cancel })
    }

    fn read_dir(&self, real_path: &Path) -> Result<Box<dyn DirLister>, CoreError> {
        let mut entries = Vec::new();
        for item in fs::read_dir(real_path).map_err(|e| io_not_found("read_dir", &e))? {
            let item = item.map_err(|e| io_not_found("read_dir", &e))?;
            let meta = item.metadata().map_err(|e| io_not_found("read_dir", &e))?;
            let is_symlink = meta.file_type().is_symlink();
            let stat = stat_to_filestat(&meta, is_symlink);
            entries.push(DirEntry {
                virtual_path: self.virtual_path_of(&item.path()),
                is_dir: stat.is_dir,
                is_symlink: stat.is_symlink,
                mode: stat.mode,
                size: stat.size,
                mtime: stat.mtime,
                atime: stat.atime,
            });
        }
        entries.sort_by(|a, b| a.virtual_path.cmp(&b.virtual_path));
        Ok(Box::new(DiskLister { entries, next: 0 }))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), CoreError> {
        fs::rename(from, to).map_err(|e| io_not_found("rename", &e))
    }

    fn is_atomic_upload_supported(&self) -> bool {
        self.atomic_uploads
    }

    fn is_upload_resume_supported(&self) -> bool {
        false
    }

    fn has_truncate_support(&self) -> bool {
        true
    }
}

struct DiskWriter {
    file: fs::File,
    direct_target: PathBuf,
    /// The pre-renamed old file, if any, kept under a backup name until
    /// close commits the new content (`spec.md` §4.3.2, §9).
    backup: Option<PathBuf>,
    owner: Option<(u32, u32)>,
}

impl FileWriter for DiskWriter {
    fn write_at(&mut self, buf: &[u8], offset: u64) -> Result<(), CoreError> {
        #[cfg(unix)]
        {
            self.file.write_all_at(buf, offset).map_err(|e| io_not_found("write", &e))
        }
        #[cfg(not(unix))]
        {
            use std::io::{Seek, SeekFrom, Write};
            self.file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| self.file.write_all(buf))
                .map_err(|e| io_not_found("write", &e))
        }
    }

    fn close(&mut self) -> Result<(), CoreError> {
        self.file.sync_all().map_err(|e| io_not_found("close", &e))?;
        if let Some(backup) = self.backup.take() {
            let _ = fs::remove_file(&backup);
        }
        if let Some((uid, gid)) = self.owner {
            let _ = chown(&self.direct_target, uid, gid);
        }
        Ok(())
    }
}

struct DiskReader {
    file: fs::File,
    _offset: u64,
}

impl FileReader for DiskReader {
    fn read_at(&mut self, buf: &mut [u8], offset: u64) -> Result<usize, CoreError> {
        #[cfg(unix)]
        {
            self.file.read_at(buf, offset).map_err(|e| io_not_found("read", &e))
        }
        #[cfg(not(unix))]
        {
            use std::io::{Read, Seek, SeekFrom};
            self.file
                .seek(SeekFrom::Start(offset))
                .map_err(|e| io_not_found("read", &e))?;
            self.file.read(buf).map_err(|e| io_not_found("read", &e))
        }
    }

    fn close(&mut self) -> Result<(), CoreError> {
        Ok(())
    }
}

struct DiskLister {
    entries: Vec<DirEntry>,
    next: usize,
}

impl DirLister for DiskLister {
    fn next_batch(&mut self) -> Result<Vec<DirEntry>, CoreError> {
        if self.next >= self.entries.len() {
            return Ok(Vec::new());
        }
        let end = (self.next + BATCH_SIZE).min(self.entries.len());
        let batch = self.entries[self.next..end].to_vec();
        self.next = end;
        Ok(batch)
    }
}
