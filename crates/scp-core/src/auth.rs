//! The Authorization Gate's user-side interface (`spec.md` §4, §6.3).

use std::sync::Arc;

use crate::vfs::{DirEntry, Filesystem};

/// One of the permission checks consulted by the engines (`spec.md` §4.3.2,
/// §4.3.3, §4.4.1, §4.4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Create a new file under a directory.
    Upload,
    /// Replace the contents of an existing file.
    Overwrite,
    /// Read a file or list a directory.
    Download,
    /// Create a new directory.
    CreateDirs,
}

/// The outcome of a file-pattern allow/deny policy check
/// (`spec.md` §6.3's `is_file_allowed`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAllowDecision {
    /// The file may be transferred.
    Allowed,
    /// The file is denied, with a caller-facing reason.
    Denied(String),
}

/// A mount point inside the user's virtual namespace, backed by a separate
/// [`Filesystem`] (`spec.md` GLOSSARY "Virtual folder").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFolderInfo {
    /// The virtual path at which this folder is mounted.
    pub mount_virtual_path: String,
    /// The virtual path of the directory the mount is injected into.
    pub parent_virtual_path: String,
    /// The name under which the mount appears in its parent's listing.
    pub name: String,
}

/// The authenticated, immutable-within-the-command user view (`spec.md`
/// §3's `UserContext`, §6.3's "User/authorization" and "Quota/transfer").
///
/// Concrete implementations are external (a user/permission/quota data
/// store); `scp-vfs` ships an in-memory one for tests and the reference
/// binary.
pub trait UserContext: Send + Sync {
    /// The authenticated username, used as the quota/registry key.
    fn username(&self) -> &str;

    /// The uid to propagate onto newly created files/directories.
    fn uid(&self) -> u32;

    /// The gid to propagate onto newly created files/directories.
    fn gid(&self) -> u32;

    /// Checks `permission` against `virtual_path`.
    fn has_perm(&self, permission: Permission, virtual_path: &str) -> bool;

    /// Applies the file-pattern allow/deny policy to `virtual_path`.
    fn is_file_allowed(&self, virtual_path: &str) -> FileAllowDecision;

    /// Resolves the backend that serves `virtual_path`; may differ per
    /// virtual folder mount.
    fn filesystem_for_path(&self, virtual_path: &str) -> Arc<dyn Filesystem>;

    /// The virtual folder mounted exactly at `virtual_path`, if any.
    fn virtual_folder_for_path(&self, virtual_path: &str) -> Option<VirtualFolderInfo>;

    /// All virtual folders in the user's namespace, for mount injection
    /// during directory download (`spec.md` §4.4.1).
    fn virtual_folders_info(&self) -> Vec<VirtualFolderInfo>;

    /// Applies any user-specific listing filter (e.g. hidden-file policy)
    /// before entries are sent to the peer.
    fn filter_list_dir(&self, virtual_path: &str, entries: Vec<DirEntry>) -> Vec<DirEntry>;
}
