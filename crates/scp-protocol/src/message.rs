//! Parsing and formatting of SCP control lines (`spec.md` §4.2, §6.1).

use crate::error::ProtocolError;
use crate::mode::parse_octal_mode;

/// A single parsed SCP control line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// `C<mode> <size> <name>` — a regular file header.
    FileHeader {
        /// Octal permission bits as parsed from the wire.
        mode: u32,
        /// Declared payload size in bytes.
        size: u64,
        /// File name (not a path; one path component).
        name: String,
    },
    /// `D<mode> 0 <name>` — a directory start.
    DirHeader {
        /// Octal permission bits as parsed from the wire.
        mode: u32,
        /// Directory name (not a path; one path component).
        name: String,
    },
    /// `E` — a directory end.
    EndDir,
    /// `T<mtime> 0 <atime> 0` — an optional timestamp preface.
    Times {
        /// Modification time, seconds since the epoch.
        mtime: i64,
        /// Access time, seconds since the epoch.
        atime: i64,
    },
    /// A blank line, tolerated as a no-op rather than a protocol error.
    Empty,
}

/// Parses one line (without its trailing `0x0A`) into a [`ProtocolMessage`].
///
/// Anything that is not `C`, `D`, `E`, `T`, or blank is rejected with
/// [`ProtocolError::Unrecognized`], matching `spec.md` §4.2's "anything else
/// fails" rule.
pub fn parse_line(line: &str) -> Result<ProtocolMessage, ProtocolError> {
    if line.is_empty() {
        return Ok(ProtocolMessage::Empty);
    }

    let mut chars = line.char_indices();
    let (_, tag) = chars.next().expect("line is non-empty");
    let rest = &line[tag.len_utf8()..];

    match tag {
        'C' => parse_file_header(rest),
        'D' => parse_dir_header(rest),
        'E' => {
            if rest.is_empty() {
                Ok(ProtocolMessage::EndDir)
            } else {
                Err(ProtocolError::Unrecognized(line.to_owned()))
            }
        }
        'T' => parse_times(rest, line),
        _ => Err(ProtocolError::Unrecognized(line.to_owned())),
    }
}

fn parse_file_header(rest: &str) -> Result<ProtocolMessage, ProtocolError> {
    let mut parts = rest.splitn(3, ' ');
    let mode_field = parts
        .next()
        .ok_or_else(|| ProtocolError::Unrecognized(format!("C{rest}")))?;
    let size_field = parts
        .next()
        .ok_or_else(|| ProtocolError::Unrecognized(format!("C{rest}")))?;
    let name = parts
        .next()
        .ok_or_else(|| ProtocolError::Unrecognized(format!("C{rest}")))?;

    if name.is_empty() {
        return Err(ProtocolError::EmptyFileName);
    }

    let mode = parse_octal_mode(mode_field)?;
    let size = size_field
        .parse::<u64>()
        .map_err(|_| ProtocolError::InvalidSize(size_field.to_owned()))?;

    Ok(ProtocolMessage::FileHeader {
        mode,
        size,
        name: name.to_owned(),
    })
}

fn parse_dir_header(rest: &str) -> Result<ProtocolMessage, ProtocolError> {
    let mut parts = rest.splitn(3, ' ');
    let mode_field = parts
        .next()
        .ok_or_else(|| ProtocolError::Unrecognized(format!("D{rest}")))?;
    let zero_field = parts
        .next()
        .ok_or_else(|| ProtocolError::Unrecognized(format!("D{rest}")))?;
    let name = parts
        .next()
        .ok_or_else(|| ProtocolError::Unrecognized(format!("D{rest}")))?;

    if zero_field != "0" {
        return Err(ProtocolError::Unrecognized(format!("D{rest}")));
    }
    if name.is_empty() {
        return Err(ProtocolError::EmptyDirName);
    }

    let mode = parse_octal_mode(mode_field)?;

    Ok(ProtocolMessage::DirHeader {
        mode,
        name: name.to_owned(),
    })
}

fn parse_times(rest: &str, original: &str) -> Result<ProtocolMessage, ProtocolError> {
    let tokens: Vec<&str> = rest.split(' ').collect();
    let (mtime_field, zero1, atime_field, zero2) = match tokens.as_slice() {
        [a, b, c, d] => (*a, *b, *c, *d),
        _ => return Err(ProtocolError::Unrecognized(original.to_owned())),
    };

    if zero1 != "0" || zero2 != "0" {
        return Err(ProtocolError::Unrecognized(original.to_owned()));
    }

    let mtime = mtime_field
        .parse::<i64>()
        .map_err(|_| ProtocolError::InvalidTimestamp(mtime_field.to_owned()))?;
    let atime = atime_field
        .parse::<i64>()
        .map_err(|_| ProtocolError::InvalidTimestamp(atime_field.to_owned()))?;

    Ok(ProtocolMessage::Times { mtime, atime })
}

/// Formats a `C` file header line (no trailing newline).
#[must_use]
pub fn format_file_header(rendered_mode: &str, size: u64, name: &str) -> String {
    format!("C{rendered_mode} {size} {name}")
}

/// Formats a `D` directory header line (no trailing newline).
#[must_use]
pub fn format_dir_header(rendered_mode: &str, name: &str) -> String {
    format!("D{rendered_mode} 0 {name}")
}

/// Formats the `E` directory-end line.
#[must_use]
pub const fn format_end_dir() -> &'static str {
    "E"
}

/// Formats a `T` timestamp preface line (no trailing newline).
#[must_use]
pub fn format_times(mtime: i64, atime: i64) -> String {
    format!("T{mtime} 0 {atime} 0")
}
