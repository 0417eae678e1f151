use std::io;

use scp_protocol::ProtocolError;
use thiserror::Error;

/// The canonical diagnostic text sent to the peer for any permission
/// failure, regardless of which check rejected the operation (`spec.md`
/// §7). Specifics are logged via `tracing`, not leaked to the wire.
pub const PERMISSION_DENIED_MESSAGE: &str = "Permission denied";

/// Single error type returned by every fallible function in this crate.
///
/// Each variant corresponds to one category from `spec.md` §7. The
/// dispatcher converts any `CoreError` reaching it into SSH exit status 1;
/// engines additionally translate most variants into an ERR ack before
/// propagating (see [`CoreError::ack_text`] and [`CoreError::suppress_ack`]).
#[derive(Debug, Error)]
pub enum CoreError {
    /// A malformed or unexpected SCP control line.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// An authorization or file-pattern policy check failed.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A transfer-count, disk, or transfer-byte quota was exhausted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The filesystem backend reported a failure.
    #[error("filesystem error: {0}")]
    Fs(String),

    /// A transfer failed mid-stream (after bytes had begun to flow).
    #[error("transfer error: {0}")]
    Transfer(String),

    /// The peer sent a WARN or ERR ack during a handshake.
    #[error("peer reported an error: {0}")]
    Peer(String),

    /// The underlying channel read or write failed; the channel is already
    /// broken and no further writes should be attempted.
    #[error("transport error: {0}")]
    Transport(#[source] io::Error),

    /// A caught panic, converted to a structured error (`spec.md` §4.5, §9).
    #[error("internal error: {0}")]
    Generic(String),
}

impl CoreError {
    /// Constructs a [`CoreError::PermissionDenied`] with the canonical text.
    #[must_use]
    pub fn permission_denied() -> Self {
        CoreError::PermissionDenied(PERMISSION_DENIED_MESSAGE.to_owned())
    }

    /// The text to send to the peer as the ERR diagnostic, without the
    /// category prefix `Display` adds for logs.
    #[must_use]
    pub fn ack_text(&self) -> String {
        match self {
            CoreError::Protocol(e) => e.to_string(),
            CoreError::PermissionDenied(msg)
            | CoreError::QuotaExceeded(msg)
            | CoreError::Fs(msg)
            | CoreError::Transfer(msg)
            | CoreError::Peer(msg)
            | CoreError::Generic(msg) => msg.clone(),
            CoreError::Transport(e) => e.to_string(),
        }
    }

    /// `true` when an ERR ack should not be (re-)written for this error:
    /// the channel is already broken ([`CoreError::Transport`]), or the
    /// peer itself is the one who reported failure ([`CoreError::Peer`]).
    #[must_use]
    pub const fn suppress_ack(&self) -> bool {
        matches!(self, CoreError::Transport(_) | CoreError::Peer(_))
    }
}
