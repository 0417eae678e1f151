//! The Command Dispatcher: argv flag parsing, direction selection,
//! connection lifecycle, and the final SSH exit status (`spec.md` §4.5).

use std::any::Any;
use std::io::{Read, Write};
use std::panic::{self, AssertUnwindSafe};

use crate::auth::UserContext;
use crate::download::{run_download, DownloadContext};
use crate::error::CoreError;
use crate::framer::ChannelFramer;
use crate::hooks::PreActionHook;
use crate::quota::QuotaProvider;
use crate::registry::ConnectionRegistry;
use crate::session::ScpCommand;
use crate::transfer::TransferFactory;
use crate::upload::{run_upload, UploadContext};

/// The lax clustered single-dash flags recognized on the `scp` argv
/// (`spec.md` §4.5, §6.4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParsedFlags {
    /// `-t`: receive (upload).
    pub receive: bool,
    /// `-f`: send (download).
    pub send: bool,
    /// `-r`: recursive.
    pub recursive: bool,
    /// `-p`: preserve times.
    pub preserve_times: bool,
    /// `-d`: destination asserted to be a directory.
    pub destination_is_directory: bool,
}

/// Parses `argv` for clustered single-dash flags, matching the openssh
/// client's lax style (`-logDtpre.iLsfxC` is one token containing several
/// flag letters). Unknown flags and `--`-prefixed tokens are ignored.
#[must_use]
pub fn parse_flags(argv: &[String]) -> ParsedFlags {
    let mut flags = ParsedFlags::default();
    for arg in argv {
        let Some(rest) = arg.strip_prefix('-') else {
            continue;
        };
        if rest.is_empty() || rest.starts_with('-') {
            continue;
        }
        if !rest.chars().all(|c| c.is_ascii_alphabetic()) {
            continue;
        }
        for letter in rest.chars() {
            match letter {
                't' => flags.receive = true,
                'f' => flags.send = true,
                'r' => flags.recursive = true,
                'p' => flags.preserve_times = true,
                'd' => flags.destination_is_directory = true,
                _ => {}
            }
        }
    }
    flags
}

/// The external services a dispatched command needs beyond the user view
/// and the channel (`spec.md` §6.3, §9).
pub struct CoreDependencies<'a> {
    /// The global connection registry.
    pub registry: &'a dyn ConnectionRegistry,
    /// Quota and transfer-count enforcement.
    pub quota: &'a dyn QuotaProvider,
    /// Pre-upload/pre-download hook.
    pub hooks: &'a dyn PreActionHook,
    /// Constructs a [`crate::transfer::Transfer`] per file.
    pub transfer_factory: &'a dyn TransferFactory,
}

/// Handles one `scp` invocation end to end and returns the SSH exit status
/// (`spec.md` §6.2): `0` on success, non-zero otherwise.
///
/// Registers/deregisters the connection unconditionally, and converts any
/// panic inside the handler into a logged generic failure rather than
/// letting it unwind past this boundary (`spec.md` §4.5, §9).
pub fn handle<C: Read + Write>(
    argv: &[String],
    user: &dyn UserContext,
    channel: &mut C,
    deps: &CoreDependencies<'_>,
) -> u8 {
    let connection_id = match deps.registry.register(user.username()) {
        Ok(id) => id,
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_e, user = user.username(), "connection rejected");
            return 1;
        }
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| run_command(argv, user, channel, deps)));

    deps.registry.deregister(connection_id);

    match outcome {
        Ok(Ok(())) => {
            #[cfg(feature = "tracing")]
            tracing::info!("scp command completed");
            0
        }
        Ok(Err(_e)) => {
            #[cfg(feature = "tracing")]
            tracing::error!(error = %_e, "scp command failed");
            1
        }
        Err(payload) => {
            #[cfg(feature = "tracing")]
            tracing::error!(panic = %panic_message(&payload), "scp command panicked");
            #[cfg(not(feature = "tracing"))]
            let _ = payload;
            1
        }
    }
}

fn run_command<C: Read + Write>(
    argv: &[String],
    user: &dyn UserContext,
    channel: &mut C,
    deps: &CoreDependencies<'_>,
) -> Result<(), CoreError> {
    let flags = parse_flags(argv);
    let destination = argv.last().cloned().unwrap_or_default();
    let cmd = ScpCommand {
        argv: argv.to_vec(),
        destination,
        recursive: flags.recursive,
        preserve_times: flags.preserve_times,
        destination_is_directory: flags.destination_is_directory,
    };

    #[cfg(feature = "tracing")]
    tracing::info!(
        destination = %cmd.destination,
        recursive = cmd.recursive,
        upload = flags.receive,
        download = flags.send,
        "dispatching scp command"
    );

    let mut framer = ChannelFramer::new(channel);

    if flags.receive {
        let ctx = UploadContext {
            user,
            quota: deps.quota,
            hooks: deps.hooks,
            transfer_factory: deps.transfer_factory,
        };
        run_upload(&mut framer, &cmd, &ctx)
    } else if flags.send {
        let ctx = DownloadContext {
            user,
            quota: deps.quota,
            hooks: deps.hooks,
            transfer_factory: deps.transfer_factory,
        };
        run_download(&mut framer, &cmd, &ctx)
    } else {
        Err(CoreError::Generic("scp command not supported".to_owned()))
    }
}

fn panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
