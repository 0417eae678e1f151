use thiserror::Error;

/// Failures produced while decoding a single SCP control line.
///
/// These never carry I/O context — they are pure value-level parse failures.
/// The caller (the channel framer, in `scp-core`) is responsible for turning
/// one of these into an ERR ack and closing the channel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The line did not start with one of `C`, `D`, `E`, `T`, or an empty line.
    #[error("unrecognized SCP control line: {0:?}")]
    Unrecognized(String),

    /// A `C` header was missing its filename, or the filename was empty.
    #[error("file header is missing a filename")]
    EmptyFileName,

    /// A `D` header was missing its directory name, or the name was empty.
    #[error("directory header is missing a name")]
    EmptyDirName,

    /// The octal mode field could not be parsed.
    #[error("invalid octal mode: {0:?}")]
    InvalidMode(String),

    /// The decimal size field could not be parsed as a non-negative integer.
    #[error("invalid file size: {0:?}")]
    InvalidSize(String),

    /// A `T` command's timestamp fields did not parse as decimal integers.
    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),
}
