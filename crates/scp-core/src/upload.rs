//! The Upload Engine: the recursive receive loop driven by the peer
//! (`spec.md` §4.3).

use scp_protocol::{parse_line, ProtocolMessage};

use crate::auth::{Permission, UserContext};
use crate::error::CoreError;
use crate::framer::ChannelFramer;
use crate::hooks::{Operation, PreActionHook};
use crate::quota::QuotaProvider;
use crate::session::{DirectoryStack, ScpCommand};
use crate::transfer::{Direction, TransferFactory, TransferHandle, TransferParams};
use crate::vpath;

/// One chunk size for streaming file payloads, chosen to match `spec.md`
/// §4.3.2/§4.4.2's `min(32768, remaining)`.
const CHUNK_SIZE: usize = 32 * 1024;

/// Read-only dependencies the Upload Engine needs beyond the channel.
pub struct UploadContext<'a> {
    /// The authenticated, immutable user view for this command.
    pub user: &'a dyn UserContext,
    /// Quota and transfer-count enforcement.
    pub quota: &'a dyn QuotaProvider,
    /// Pre-upload hook.
    pub hooks: &'a dyn PreActionHook,
    /// Constructs a [`crate::transfer::Transfer`] per file.
    pub transfer_factory: &'a dyn TransferFactory,
}

/// Drives the upload receive loop for `cmd` (`spec.md` §4.3).
pub fn run_upload(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    cmd: &ScpCommand,
    ctx: &UploadContext<'_>,
) -> Result<(), CoreError> {
    framer.send_ok()?;

    let mut stack = DirectoryStack::new(cmd.destination.clone());

    loop {
        match process_next(framer, &mut stack, cmd, ctx) {
            Ok(true) => continue,
            Ok(false) => return Ok(()),
            Err(e) => {
                if !e.suppress_ack() {
                    let _ = framer.send_err(&e.ack_text());
                }
                return Err(e);
            }
        }
    }
}

/// Processes one protocol message. Returns `Ok(true)` to keep looping,
/// `Ok(false)` on clean EOF.
fn process_next(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    stack: &mut DirectoryStack,
    cmd: &ScpCommand,
    ctx: &UploadContext<'_>,
) -> Result<bool, CoreError> {
    let Some(line) = framer.read_line()? else {
        return Ok(false);
    };
    let message = parse_line(&line)?;

    match message {
        ProtocolMessage::Empty => Ok(true),
        ProtocolMessage::Times { .. } => {
            // Acked but discarded; see `spec.md` §9 "T command semantics".
            framer.send_ok()?;
            Ok(true)
        }
        ProtocolMessage::EndDir => {
            stack.pop()?;
            framer.send_ok()?;
            Ok(true)
        }
        ProtocolMessage::DirHeader { mode, name } => {
            stack.push(&name);
            create_directory(stack.current(), mode, ctx)?;
            framer.send_ok()?;
            Ok(true)
        }
        ProtocolMessage::FileHeader { mode, size, name } => {
            receive_file(framer, stack.current(), mode, size, &name, cmd, ctx)?;
            Ok(true)
        }
    }
}

fn create_directory(virtual_path: &str, _mode: u32, ctx: &UploadContext<'_>) -> Result<(), CoreError> {
    let fs = ctx.user.filesystem_for_path(virtual_path);
    let real = fs.resolve_path(virtual_path)?;

    match fs.stat(&real) {
        Ok(stat) if stat.is_dir => return Ok(()),
        Ok(_) => return Err(CoreError::Fs(format!("{virtual_path} exists and is not a directory"))),
        Err(e) if fs.is_not_exist(&e) => {}
        Err(e) => return Err(e),
    }

    let parent = vpath::parent(virtual_path);
    if !ctx.user.has_perm(Permission::CreateDirs, &parent) {
        return Err(CoreError::permission_denied());
    }

    fs.mkdir(&real)
}

/// Resolves the destination-placement rule for a `C` header (`spec.md`
/// §4.3.1).
fn resolve_upload_target(dest_dir: &str, name: &str, cmd: &ScpCommand, ctx: &UploadContext<'_>) -> String {
    let literal_mode = !cmd.recursive && !cmd.destination.ends_with('/');
    if !literal_mode {
        return vpath::join(dest_dir, name);
    }

    let fs = ctx.user.filesystem_for_path(&cmd.destination);
    let stat_result = fs
        .resolve_path(&cmd.destination)
        .and_then(|real| fs.stat(&real));

    match stat_result {
        Ok(stat) if stat.is_dir => vpath::join(dest_dir, name),
        Ok(_) => cmd.destination.clone(),
        Err(_err) => {
            // Preserve the open-question behavior: a stat failure for any
            // reason other than "not found" still falls back to treating
            // `dest` as the literal filename (`spec.md` §9).
            #[cfg(feature = "tracing")]
            tracing::warn!(
                destination = %cmd.destination,
                error = %_err,
                "stat of non-recursive upload destination failed; using destination verbatim"
            );
            cmd.destination.clone()
        }
    }
}

#[allow(clippy::too_many_lines)]
fn receive_file(
    framer: &mut ChannelFramer<'_, impl std::io::Read + std::io::Write>,
    dest_dir: &str,
    _mode: u32,
    size: u64,
    name: &str,
    cmd: &ScpCommand,
    ctx: &UploadContext<'_>,
) -> Result<(), CoreError> {
    let target_virtual = resolve_upload_target(dest_dir, name, cmd, ctx);
    let username = ctx.user.username();

    ctx.quota.is_new_transfer_allowed(username)?;

    let fs = ctx.user.filesystem_for_path(&target_virtual);
    let real = fs.resolve_path(&target_virtual)?;

    let existing = match fs.lstat(&real) {
        Ok(stat) => Some(stat),
        Err(e) if fs.is_not_exist(&e) => None,
        Err(e) => return Err(e),
    };
    let is_new = match &existing {
        None => true,
        Some(stat) if stat.is_symlink => true,
        Some(stat) if stat.is_dir => {
            return Err(CoreError::Fs(format!("{target_virtual} is a directory")));
        }
        Some(_) => false,
    };

    let space = ctx.quota.has_space(username, is_new, false, &target_virtual);
    if !space.is_ok() {
        return Err(CoreError::QuotaExceeded(format!(
            "insufficient space to upload {target_virtual}"
        )));
    }

    ctx.hooks
        .execute_pre_action(Operation::PreUpload, &real, &target_virtual, size)?;

    let parent = vpath::parent(&target_virtual);
    let required = if is_new { Permission::Upload } else { Permission::Overwrite };
    if !ctx.user.has_perm(required, &parent) {
        return Err(CoreError::permission_denied());
    }

    let truncate_supported = fs.has_truncate_support();
    let old_size = existing.map(|s| s.size).unwrap_or(0);
    let (initial_size, truncated_size) = if truncate_supported {
        if !is_new {
            let delta = i64::try_from(old_size).unwrap_or(i64::MAX);
            ctx.quota.update_user_quota(username, -delta, 0);
        }
        (0, 0)
    } else {
        (old_size, old_size)
    };

    let outcome = fs.create(&real, truncate_supported)?;
    let max_write = ctx.quota.max_write_size(username);
    let params = TransferParams {
        virtual_path: target_virtual.clone(),
        real_path: real,
        direction: Direction::Upload,
        offset: 0,
        initial_size,
        max_write,
        truncated_size,
        is_new,
    };
    let transfer = ctx
        .transfer_factory
        .new_transfer(ctx.user, fs.as_ref(), ctx.quota, params);
    let mut handle = TransferHandle::for_upload(outcome.writer, outcome.cancel, transfer, max_write);

    framer.send_ok()?;

    let mut remaining = size;
    let mut offset = 0u64;
    let mut buf = [0u8; CHUNK_SIZE];
    while remaining > 0 {
        let take = usize::try_from(remaining.min(CHUNK_SIZE as u64)).unwrap_or(CHUNK_SIZE);
        let chunk = &mut buf[..take];
        if let Err(e) = framer.read_exact_into(chunk) {
            handle.abort(&e);
            return Err(e);
        }
        if let Err(e) = handle.write_chunk(chunk, offset) {
            handle.abort(&e);
            return Err(e);
        }
        offset += take as u64;
        remaining -= take as u64;
    }

    let trailer = framer.read_ack()?;
    if !trailer.is_ok() {
        let cause = CoreError::Peer(trailer.message().unwrap_or_default().to_owned());
        handle.abort(&cause);
        return Err(cause);
    }

    handle.close()?;
    framer.send_ok()
}
