//! The per-command data model (`spec.md` §3's `SCPCommand` and
//! `DirectoryStack`).

use crate::error::CoreError;
use crate::vpath;

/// The parsed, transient state of one `scp` invocation. Created when the
/// dispatcher receives the command; destroyed on handler return.
#[derive(Debug, Clone)]
pub struct ScpCommand {
    /// The raw argv tokens, as received from the SSH "exec" string.
    pub argv: Vec<String>,
    /// The destination virtual path: the last positional argv token.
    pub destination: String,
    /// `-r`: recursive directory transfer.
    pub recursive: bool,
    /// `-p`: preserve modification/access times.
    pub preserve_times: bool,
    /// `-d`: the destination is asserted to be a directory.
    pub destination_is_directory: bool,
}

/// Tracks nested `D`/`E` pairs during an upload (`spec.md` §3
/// `DirectoryStack`). Underflow (more `E` than `D`) is a protocol
/// violation.
#[derive(Debug, Clone)]
pub struct DirectoryStack {
    depth: i64,
    current: String,
}

impl DirectoryStack {
    /// Starts the stack at `root` with depth `0`.
    #[must_use]
    pub fn new(root: String) -> Self {
        DirectoryStack {
            depth: 0,
            current: root,
        }
    }

    /// The current destination virtual path.
    #[must_use]
    pub fn current(&self) -> &str {
        &self.current
    }

    /// The current nesting depth; always `>= 0` between calls.
    #[must_use]
    pub const fn depth(&self) -> i64 {
        self.depth
    }

    /// Handles a `D<mode> 0 <name>` header: descends into `name`.
    pub fn push(&mut self, name: &str) {
        self.depth += 1;
        self.current = vpath::join(&self.current, name);
    }

    /// Handles an `E` header: ascends to the parent.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Protocol`] if depth would go negative.
    pub fn pop(&mut self) -> Result<(), CoreError> {
        self.depth -= 1;
        if self.depth < 0 {
            return Err(CoreError::Protocol(
                scp_protocol::ProtocolError::Unrecognized("unacceptable end dir".to_owned()),
            ));
        }
        self.current = vpath::parent(&self.current);
        Ok(())
    }
}
