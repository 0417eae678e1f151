//! A [`UserContext`] built directly from a [`UserConfig`], with one
//! [`DiskFilesystem`] for the user's home directory and one more per
//! virtual folder mount (`spec.md` §4.3.2, §4.3.3, §4.4.1, §4.4.2, §6.3).

use std::sync::Arc;

use scp_core::auth::{FileAllowDecision, Permission, UserContext, VirtualFolderInfo};
use scp_core::vfs::{DirEntry, Filesystem};

use crate::config::UserConfig;
use crate::disk_fs::DiskFilesystem;

/// One virtual folder mounted into a user's namespace, alongside its own
/// backing [`DiskFilesystem`].
pub struct VirtualFolder {
    info: VirtualFolderInfo,
    filesystem: Arc<dyn Filesystem>,
}

impl VirtualFolder {
    /// Mounts `filesystem` at `mount_virtual_path`, appearing under
    /// `parent_virtual_path` in directory listings as `name`.
    #[must_use]
    pub fn new(
        mount_virtual_path: impl Into<String>,
        parent_virtual_path: impl Into<String>,
        name: impl Into<String>,
        filesystem: Arc<dyn Filesystem>,
    ) -> Self {
        VirtualFolder {
            info: VirtualFolderInfo {
                mount_virtual_path: mount_virtual_path.into(),
                parent_virtual_path: parent_virtual_path.into(),
                name: name.into(),
            },
            filesystem,
        }
    }
}

/// A [`UserContext`] built from one [`UserConfig`] plus its home and
/// virtual folder [`Filesystem`]s.
///
/// Permission checks (`spec.md` §4.3.2's Upload/Overwrite, §4.3.3's
/// CreateDirs, §4.4.1/§4.4.2's Download) collapse to a single `read_only`
/// flag: anything other than Download is denied when the user is
/// read-only, and every check passes otherwise. A deployment wanting
/// finer-grained per-directory ACLs would implement [`UserContext`]
/// directly rather than configuring this type.
pub struct StaticUserContext {
    config: UserConfig,
    home: Arc<dyn Filesystem>,
    virtual_folders: Vec<VirtualFolder>,
}

impl StaticUserContext {
    /// Builds a context for `config`, serving its home directory through
    /// `home` and, optionally, additional mounts.
    #[must_use]
    pub fn new(config: UserConfig, home: Arc<dyn Filesystem>, virtual_folders: Vec<VirtualFolder>) -> Self {
        StaticUserContext {
            config,
            home,
            virtual_folders,
        }
    }

    fn mount_for(&self, virtual_path: &str) -> Option<&VirtualFolder> {
        self.virtual_folders
            .iter()
            .filter(|m| {
                let mount = &m.info.mount_virtual_path;
                virtual_path == mount || virtual_path.starts_with(&format!("{mount}/"))
            })
            .max_by_key(|m| m.info.mount_virtual_path.len())
    }
}

impl UserContext for StaticUserContext {
    fn username(&self) -> &str {
        &self.config.username
    }

    fn uid(&self) -> u32 {
        self.config.uid
    }

    fn gid(&self) -> u32 {
        self.config.gid
    }

    fn has_perm(&self, permission: Permission, _virtual_path: &str) -> bool {
        match permission {
            Permission::Download => true,
            Permission::Upload | Permission::Overwrite | Permission::CreateDirs => !self.config.read_only,
        }
    }

    fn is_file_allowed(&self, virtual_path: &str) -> FileAllowDecision {
        let name = scp_core_vpath_name(virtual_path);
        if let Some(suffix) = self.config.denied_suffixes.iter().find(|s| name.ends_with(s.as_str())) {
            return FileAllowDecision::Denied(format!("{name} matches denied suffix {suffix}"));
        }
        if self.config.allowed_suffixes.is_empty() {
            return FileAllowDecision::Allowed;
        }
        if self.config.allowed_suffixes.iter().any(|s| name.ends_with(s.as_str())) {
            FileAllowDecision::Allowed
        } else {
            FileAllowDecision::Denied(format!("{name} does not match any allowed suffix"))
        }
    }

    fn filesystem_for_path(&self, virtual_path: &str) -> Arc<dyn Filesystem> {
        match self.mount_for(virtual_path) {
            Some(mount) => Arc::clone(&mount.filesystem),
            None => Arc::clone(&self.home),
        }
    }

    fn virtual_folder_for_path(&self, virtual_path: &str) -> Option<VirtualFolderInfo> {
        self.virtual_folders
            .iter()
            .find(|m| m.info.mount_virtual_path == virtual_path)
            .map(|m| m.info.clone())
    }

    fn virtual_folders_info(&self) -> Vec<VirtualFolderInfo> {
        self.virtual_folders.iter().map(|m| m.info.clone()).collect()
    }

    fn filter_list_dir(&self, _virtual_path: &str, entries: Vec<DirEntry>) -> Vec<DirEntry> {
        entries
    }
}

/// The base name of a `/`-separated virtual path, without pulling in
/// `scp-core`'s private `vpath` module.
fn scp_core_vpath_name(virtual_path: &str) -> String {
    virtual_path.rsplit('/').next().unwrap_or(virtual_path).to_owned()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::disk_fs::DiskFilesystem;

    fn home() -> Arc<dyn Filesystem> {
        Arc::new(DiskFilesystem::new(PathBuf::from("/srv/alice"), "/", true))
    }

    #[test]
    fn read_only_user_cannot_upload_but_can_download() {
        let mut config = UserConfig::unrestricted("alice", PathBuf::from("/srv/alice"), 1000, 1000);
        config.read_only = true;
        let ctx = StaticUserContext::new(config, home(), vec![]);
        assert!(!ctx.has_perm(Permission::Upload, "/"));
        assert!(ctx.has_perm(Permission::Download, "/"));
    }

    #[test]
    fn denied_suffix_beats_allowed_suffix() {
        let mut config = UserConfig::unrestricted("alice", PathBuf::from("/srv/alice"), 1000, 1000);
        config.allowed_suffixes = vec![".txt".to_owned()];
        config.denied_suffixes = vec![".txt.tmp".to_owned()];
        let ctx = StaticUserContext::new(config, home(), vec![]);
        assert_eq!(ctx.is_file_allowed("/a/report.txt"), FileAllowDecision::Allowed);
        assert!(matches!(ctx.is_file_allowed("/a/report.txt.tmp"), FileAllowDecision::Denied(_)));
        assert!(matches!(ctx.is_file_allowed("/a/report.bin"), FileAllowDecision::Denied(_)));
    }

    #[test]
    fn mount_routes_paths_under_its_prefix_to_its_own_filesystem() {
        let config = UserConfig::unrestricted("alice", PathBuf::from("/srv/alice"), 1000, 1000);
        let archive: Arc<dyn Filesystem> = Arc::new(DiskFilesystem::new(PathBuf::from("/srv/archive"), "/mnt/archive", true));
        let mount = VirtualFolder::new("/mnt/archive", "/", "archive", Arc::clone(&archive));
        let ctx = StaticUserContext::new(config, home(), vec![mount]);

        let resolved = ctx.filesystem_for_path("/mnt/archive/x").resolve_path("/mnt/archive/x").unwrap();
        assert_eq!(resolved, PathBuf::from("/srv/archive/x"));

        let home_resolved = ctx.filesystem_for_path("/elsewhere").resolve_path("/elsewhere").unwrap();
        assert_eq!(home_resolved, PathBuf::from("/srv/alice/elsewhere"));
    }

    #[test]
    fn virtual_folders_info_reports_mount_metadata() {
        let config = UserConfig::unrestricted("alice", PathBuf::from("/srv/alice"), 1000, 1000);
        let archive: Arc<dyn Filesystem> = Arc::new(DiskFilesystem::new(PathBuf::from("/srv/archive"), "/mnt/archive", true));
        let mount = VirtualFolder::new("/mnt/archive", "/", "archive", archive);
        let ctx = StaticUserContext::new(config, home(), vec![mount]);

        let mounts = ctx.virtual_folders_info();
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mount_virtual_path, "/mnt/archive");
        assert!(ctx.virtual_folder_for_path("/mnt/archive").is_some());
        assert!(ctx.virtual_folder_for_path("/mnt/other").is_none());
    }
}
