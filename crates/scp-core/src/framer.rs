//! Channel framing: the I/O layer that sits under [`scp_protocol`]'s value
//! types (`spec.md` §4.1).

use std::io::{BufRead, BufReader, Read, Write};

use scp_protocol::{Ack, ERR_BYTE, OK_BYTE, WARN_BYTE};

use crate::error::CoreError;

/// The byte-stream abstraction the framer reads from and writes to.
///
/// In production this is the stdio pair of an already-established,
/// already-authenticated SSH session (`spec.md` §1); tests use an in-memory
/// duplex pipe instead. The framer never assumes anything about what is on
/// the other end beyond "bytes in, bytes out".
pub trait ScpChannel: Read + Write {}

impl<T: Read + Write + ?Sized> ScpChannel for T {}

/// Reads and writes acks and control lines over a [`ScpChannel`].
///
/// Owns a `BufReader` over a borrowed channel so line reads do not re-issue
/// a syscall per byte; writes go straight to the underlying channel and are
/// not buffered, matching SCP's lockstep request/ack rhythm (`spec.md`
/// §4.1, §5).
pub struct ChannelFramer<'a, C: ?Sized> {
    reader: BufReader<&'a mut C>,
}

impl<'a, C: Read + Write + ?Sized> ChannelFramer<'a, C> {
    /// Wraps a channel reference. The caller retains ownership of `channel`;
    /// this framer borrows it for as long as the framer is alive.
    pub fn new(channel: &'a mut C) -> Self {
        ChannelFramer {
            reader: BufReader::new(channel),
        }
    }

    /// Reads one ack byte, and its trailing diagnostic line for WARN/ERR.
    pub fn read_ack(&mut self) -> Result<Ack, CoreError> {
        let mut byte = [0u8; 1];
        self.reader
            .read_exact(&mut byte)
            .map_err(CoreError::Transport)?;

        match byte[0] {
            OK_BYTE => Ok(Ack::Ok),
            WARN_BYTE => Ok(Ack::Warn(self.read_diagnostic_line()?)),
            ERR_BYTE => Ok(Ack::Err(self.read_diagnostic_line()?)),
            other => Err(CoreError::Protocol(scp_protocol::ProtocolError::Unrecognized(
                format!("unexpected ack byte 0x{other:02x}"),
            ))),
        }
    }

    fn read_diagnostic_line(&mut self) -> Result<String, CoreError> {
        let mut line = Vec::new();
        self.reader
            .read_until(b'\n', &mut line)
            .map_err(CoreError::Transport)?;
        if line.last() == Some(&b'\n') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    /// Writes the single `0x00` OK byte.
    pub fn send_ok(&mut self) -> Result<(), CoreError> {
        self.reader
            .get_mut()
            .write_all(&[OK_BYTE])
            .map_err(CoreError::Transport)
    }

    /// Writes an ack matching `ack`'s control byte, plus diagnostic line.
    pub fn send_ack(&mut self, ack: &Ack) -> Result<(), CoreError> {
        match ack {
            Ack::Ok => self.send_ok(),
            Ack::Warn(text) => self.send_diagnostic(WARN_BYTE, text),
            Ack::Err(text) => self.send_diagnostic(ERR_BYTE, text),
        }
    }

    /// Writes an `0x02` ERR byte followed by `text` and a newline.
    ///
    /// Called by the engines at a failure site, except where
    /// [`CoreError::suppress_ack`] says the channel is already broken or the
    /// peer already reported the failure itself (`spec.md` §7).
    pub fn send_err(&mut self, text: &str) -> Result<(), CoreError> {
        self.send_diagnostic(ERR_BYTE, text)
    }

    fn send_diagnostic(&mut self, control: u8, text: &str) -> Result<(), CoreError> {
        let channel = self.reader.get_mut();
        channel.write_all(&[control]).map_err(CoreError::Transport)?;
        channel
            .write_all(text.as_bytes())
            .map_err(CoreError::Transport)?;
        channel.write_all(b"\n").map_err(CoreError::Transport)
    }

    /// Reads one `\n`-terminated control line, with the terminator stripped.
    ///
    /// Returns `Ok(None)` on a clean EOF with no bytes read (the peer closed
    /// the channel between commands); any other short read is a
    /// [`CoreError::Transport`].
    pub fn read_line(&mut self) -> Result<Option<String>, CoreError> {
        let mut raw = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut raw)
            .map_err(CoreError::Transport)?;
        if n == 0 {
            return Ok(None);
        }
        if raw.last() == Some(&b'\n') {
            raw.pop();
        }
        Ok(Some(String::from_utf8_lossy(&raw).into_owned()))
    }

    /// Writes `line` followed by a single `\n`.
    pub fn write_line(&mut self, line: &str) -> Result<(), CoreError> {
        let channel = self.reader.get_mut();
        channel
            .write_all(line.as_bytes())
            .map_err(CoreError::Transport)?;
        channel.write_all(b"\n").map_err(CoreError::Transport)
    }

    /// Reads exactly `buf.len()` bytes of file payload.
    pub fn read_exact_into(&mut self, buf: &mut [u8]) -> Result<(), CoreError> {
        self.reader.read_exact(buf).map_err(CoreError::Transport)
    }

    /// Writes `buf` verbatim (one chunk of file payload).
    pub fn write_all_bytes(&mut self, buf: &[u8]) -> Result<(), CoreError> {
        self.reader
            .get_mut()
            .write_all(buf)
            .map_err(CoreError::Transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_ok_ack() {
        let mut channel = Cursor::new(vec![OK_BYTE]);
        let mut framer = ChannelFramer::new(&mut channel);
        assert_eq!(framer.read_ack().unwrap(), Ack::Ok);
    }

    #[test]
    fn reads_err_ack_with_message() {
        let mut input = vec![ERR_BYTE];
        input.extend_from_slice(b"no such file\n");
        let mut channel = Cursor::new(input);
        let mut framer = ChannelFramer::new(&mut channel);
        assert_eq!(
            framer.read_ack().unwrap(),
            Ack::Err("no such file".to_owned())
        );
    }

    #[test]
    fn read_line_returns_none_at_clean_eof() {
        let mut channel = Cursor::new(Vec::new());
        let mut framer = ChannelFramer::new(&mut channel);
        assert_eq!(framer.read_line().unwrap(), None);
    }

    #[test]
    fn read_line_strips_terminator() {
        let mut channel = Cursor::new(b"C0644 5 a.txt\n".to_vec());
        let mut framer = ChannelFramer::new(&mut channel);
        assert_eq!(
            framer.read_line().unwrap(),
            Some("C0644 5 a.txt".to_owned())
        );
    }

    #[test]
    fn send_err_writes_control_byte_text_and_newline() {
        let mut channel = Cursor::new(Vec::new());
        {
            let mut framer = ChannelFramer::new(&mut channel);
            framer.send_err("denied").unwrap();
        }
        assert_eq!(channel.into_inner(), b"\x02denied\n");
    }
}
