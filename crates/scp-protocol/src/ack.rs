use std::fmt;

/// The `OK` / continue control byte.
pub const OK_BYTE: u8 = 0x00;
/// The `WARN` control byte; a newline-terminated diagnostic follows.
pub const WARN_BYTE: u8 = 0x01;
/// The `ERR` control byte; a newline-terminated diagnostic follows.
pub const ERR_BYTE: u8 = 0x02;

/// One of the three SCP acknowledgement levels (`spec.md` §3, §6.1).
///
/// `Warn` and `Err` carry the diagnostic text that followed the control byte
/// up to (but not including) the terminating `0x0A`. The protocol treats
/// `Warn` and `Err` identically for handshake purposes (`spec.md` §7,
/// `PeerError`); callers that care about the distinction can match on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// Continue; the byte `0x00`.
    Ok,
    /// A non-fatal diagnostic; the byte `0x01` plus text.
    Warn(String),
    /// A fatal diagnostic; the byte `0x02` plus text.
    Err(String),
}

impl Ack {
    /// Returns `true` for [`Ack::Ok`].
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Ack::Ok)
    }

    /// Returns the diagnostic text carried by `Warn`/`Err`, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Ack::Ok => None,
            Ack::Warn(text) | Ack::Err(text) => Some(text.as_str()),
        }
    }

    /// The control byte that introduces this ack on the wire.
    #[must_use]
    pub const fn control_byte(&self) -> u8 {
        match self {
            Ack::Ok => OK_BYTE,
            Ack::Warn(_) => WARN_BYTE,
            Ack::Err(_) => ERR_BYTE,
        }
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ack::Ok => f.write_str("OK"),
            Ack::Warn(text) => write!(f, "WARN: {text}"),
            Ack::Err(text) => write!(f, "ERR: {text}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_has_no_message() {
        assert!(Ack::Ok.is_ok());
        assert_eq!(Ack::Ok.message(), None);
        assert_eq!(Ack::Ok.control_byte(), OK_BYTE);
    }

    #[test]
    fn warn_and_err_carry_text() {
        let warn = Ack::Warn("partial".to_owned());
        let err = Ack::Err("denied".to_owned());
        assert!(!warn.is_ok());
        assert_eq!(warn.message(), Some("partial"));
        assert_eq!(warn.control_byte(), WARN_BYTE);
        assert_eq!(err.control_byte(), ERR_BYTE);
    }
}
