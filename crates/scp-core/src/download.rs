//! The Download Engine: server-driven recursive traversal (`spec.md`
//! §4.4).

use scp_protocol::{format_dir_header, format_end_dir, format_file_header, format_times, mode::render_mode};

use crate::auth::{FileAllowDecision, Permission, UserContext};
use crate::error::CoreError;
use crate::framer::ChannelFramer;
use crate::hooks::{Operation, PreActionHook};
use crate::quota::QuotaProvider;
use crate::session::ScpCommand;
use crate::transfer::{Direction, TransferFactory, TransferHandle, TransferParams};
use crate::vfs::{DirEntry, FileStat};
use crate::vpath;

const CHUNK_SIZE: usize = 32 * 1024;

/// Read-only dependencies the Download Engine needs beyond the channel.
pub struct DownloadContext<'a> {
    /// The authenticated, immutable user view for this command.
    pub user: &'a dyn UserContext,
    /// Quota and transfer-count enforcement.
    pub quota: &'a dyn QuotaProvider,
    /// Pre-download hook.
    pub hooks: &'a dyn PreActionHook,
    /// Constructs a [`crate::transfer::Transfer`] per file.
    pub transfer_factory: &'a dyn TransferFactory,
}

/// Drives server-side traversal and streaming for `cmd` (`spec.md` §4.4).
pub fn run_download(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    cmd: &ScpCommand,
    ctx: &DownloadContext<'_>,
) -> Result<(), CoreError> {
    let start = framer.read_ack()?;
    if !start.is_ok() {
        return Err(CoreError::Peer(start.message().unwrap_or_default().to_owned()));
    }

    let fs = ctx.user.filesystem_for_path(&cmd.destination);
    let real = fs.resolve_path(&cmd.destination)?;
    let stat = fs.stat(&real)?;

    if stat.is_dir {
        if !cmd.recursive {
            return abort(
                framer,
                CoreError::Fs("unable to send directory for non recursive copy".to_owned()),
            );
        }
        let parent = vpath::parent(&cmd.destination);
        if !ctx.user.has_perm(Permission::Download, &parent) {
            return abort(framer, CoreError::permission_denied());
        }
        download_directory(framer, &cmd.destination, cmd, ctx, true)
    } else {
        download_file(framer, &cmd.destination, &stat, cmd, ctx)
    }
}

/// Writes an ERR ack (unless suppressed) and returns `err`, for failures
/// detected before any bytes have been committed to the wire for the
/// current file/directory.
fn abort(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    err: CoreError,
) -> Result<(), CoreError> {
    if !err.suppress_ack() {
        let _ = framer.send_err(&err.ack_text());
    }
    Err(err)
}

fn await_ok(framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>) -> Result<(), CoreError> {
    let ack = framer.read_ack()?;
    if ack.is_ok() {
        Ok(())
    } else {
        Err(CoreError::Peer(ack.message().unwrap_or_default().to_owned()))
    }
}

fn send_times(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    mtime: i64,
    atime: i64,
) -> Result<(), CoreError> {
    framer.write_line(&format_times(mtime, atime))?;
    await_ok(framer)
}

fn directory_display_name(virtual_path: &str, is_root: bool, username: &str) -> String {
    let base = vpath::name(virtual_path);
    if is_root && (base.is_empty() || base == ".") {
        username.to_owned()
    } else {
        base
    }
}

fn mount_as_entry(mount: &crate::auth::VirtualFolderInfo) -> DirEntry {
    DirEntry {
        virtual_path: mount.mount_virtual_path.clone(),
        is_dir: true,
        is_symlink: false,
        mode: 0,
        size: 0,
        mtime: 0,
        atime: 0,
    }
}

fn download_directory(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    virtual_dir: &str,
    cmd: &ScpCommand,
    ctx: &DownloadContext<'_>,
    is_root: bool,
) -> Result<(), CoreError> {
    let fs = ctx.user.filesystem_for_path(virtual_dir);
    let real = match fs.resolve_path(virtual_dir) {
        Ok(real) => real,
        Err(e) => return abort(framer, e),
    };
    let stat = match fs.stat(&real) {
        Ok(stat) => stat,
        Err(e) => return abort(framer, e),
    };

    if cmd.preserve_times {
        send_times(framer, stat.mtime, stat.atime)?;
    }

    let display_name = directory_display_name(virtual_dir, is_root, ctx.user.username());
    let rendered_mode = render_mode(stat.mode, true);
    framer.write_line(&format_dir_header(&rendered_mode, &display_name))?;
    await_ok(framer)?;

    let mut lister = match fs.read_dir(&real) {
        Ok(lister) => lister,
        Err(e) => return abort(framer, e),
    };

    let mounts = ctx.user.virtual_folders_info();
    let mut first_batch = true;
    let mut deferred_dirs: Vec<DirEntry> = Vec::new();

    loop {
        let mut batch = match lister.next_batch() {
            Ok(batch) => batch,
            Err(e) => return abort(framer, e),
        };
        if first_batch {
            for mount in &mounts {
                if mount.parent_virtual_path == virtual_dir {
                    batch.push(mount_as_entry(mount));
                }
            }
            first_batch = false;
        }
        if batch.is_empty() {
            break;
        }
        let filtered = ctx.user.filter_list_dir(virtual_dir, batch);
        for entry in filtered {
            if entry.is_dir {
                deferred_dirs.push(entry);
            } else {
                download_entry_file(framer, &entry, cmd, ctx)?;
            }
        }
    }

    for dir_entry in deferred_dirs {
        download_directory(framer, &dir_entry.virtual_path, cmd, ctx, false)?;
    }

    framer.write_line(format_end_dir())?;
    await_ok(framer)
}

fn download_entry_file(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    entry: &DirEntry,
    cmd: &ScpCommand,
    ctx: &DownloadContext<'_>,
) -> Result<(), CoreError> {
    let stat = FileStat {
        is_dir: false,
        is_symlink: entry.is_symlink,
        size: entry.size,
        mode: entry.mode,
        mtime: entry.mtime,
        atime: entry.atime,
    };
    download_file(framer, &entry.virtual_path, &stat, cmd, ctx)
}

#[allow(clippy::too_many_lines)]
fn download_file(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    virtual_path: &str,
    stat: &FileStat,
    cmd: &ScpCommand,
    ctx: &DownloadContext<'_>,
) -> Result<(), CoreError> {
    let username = ctx.user.username();

    if let Err(e) = ctx.quota.is_new_transfer_allowed(username) {
        return abort(framer, e);
    }
    let space = ctx.quota.has_space(username, false, false, virtual_path);
    if !space.transfer_ok {
        return abort(
            framer,
            CoreError::QuotaExceeded(format!("transfer quota exhausted for {virtual_path}")),
        );
    }

    let parent = vpath::parent(virtual_path);
    if !ctx.user.has_perm(Permission::Download, &parent) {
        return abort(framer, CoreError::permission_denied());
    }
    if let FileAllowDecision::Denied(reason) = ctx.user.is_file_allowed(virtual_path) {
        return abort(framer, CoreError::PermissionDenied(reason));
    }

    let fs = ctx.user.filesystem_for_path(virtual_path);
    let real = match fs.resolve_path(virtual_path) {
        Ok(real) => real,
        Err(e) => return abort(framer, e),
    };

    if let Err(e) = ctx
        .hooks
        .execute_pre_action(Operation::PreDownload, &real, virtual_path, stat.size)
    {
        return abort(framer, e);
    }

    let outcome = match fs.open(&real, 0) {
        Ok(outcome) => outcome,
        Err(e) => return abort(framer, e),
    };

    let params = TransferParams {
        virtual_path: virtual_path.to_owned(),
        real_path: real,
        direction: Direction::Download,
        offset: 0,
        initial_size: stat.size,
        max_write: ctx.quota.max_write_size(username),
        truncated_size: 0,
        is_new: false,
    };
    let transfer = ctx
        .transfer_factory
        .new_transfer(ctx.user, fs.as_ref(), ctx.quota, params);
    let mut handle = TransferHandle::for_download(outcome.reader, outcome.cancel, transfer);

    if cmd.preserve_times {
        if let Err(e) = send_times(framer, stat.mtime, stat.atime) {
            handle.abort(&e);
            return Err(e);
        }
    }

    let name = vpath::name(virtual_path);
    let rendered_mode = render_mode(stat.mode, false);
    if let Err(e) = framer.write_line(&format_file_header(&rendered_mode, stat.size, &name)) {
        handle.abort(&e);
        return Err(e);
    }
    if let Err(e) = await_ok(framer) {
        handle.abort(&e);
        return Err(e);
    }

    let mut offset = 0u64;
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match handle.read_chunk(&mut buf, offset) {
            Ok(n) => n,
            Err(e) => {
                handle.abort(&e);
                return Err(e);
            }
        };
        if n == 0 {
            break;
        }
        if let Err(e) = framer.write_all_bytes(&buf[..n]) {
            handle.abort(&e);
            return Err(e);
        }
        offset += n as u64;
    }

    if let Err(e) = framer.send_ok() {
        handle.abort(&e);
        return Err(e);
    }
    if let Err(e) = await_ok(framer) {
        handle.abort(&e);
        return Err(e);
    }

    handle.close()
}
