//! Octal mode parsing and rendering for `C`/`D` control lines.

use crate::error::ProtocolError;

/// Parses the up-to-4-digit octal mode field of a `C`/`D` header.
pub fn parse_octal_mode(field: &str) -> Result<u32, ProtocolError> {
    if field.is_empty() || field.len() > 4 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ProtocolError::InvalidMode(field.to_owned()));
    }
    u32::from_str_radix(field, 8).map_err(|_| ProtocolError::InvalidMode(field.to_owned()))
}

/// Renders a mode for the `C`/`D` header emitted during download.
///
/// The nine rwx bits plus setuid/setgid/sticky are folded into a 4-digit
/// octal string (`mode & 0o7777`). Backends that report a zero mode (no
/// native permission bits, e.g. some object-storage overlays) fall back to
/// `0755` for directories and `0644` for files, per `spec.md` §4.2 and §9.
#[must_use]
pub fn render_mode(raw_mode: u32, is_dir: bool) -> String {
    let bits = raw_mode & 0o7777;
    if bits == 0 {
        return if is_dir { "0755".to_owned() } else { "0644".to_owned() };
    }
    format!("{bits:04o}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_modes() {
        assert_eq!(parse_octal_mode("0644").unwrap(), 0o644);
        assert_eq!(parse_octal_mode("755").unwrap(), 0o755);
        assert_eq!(parse_octal_mode("0").unwrap(), 0);
    }

    #[test]
    fn rejects_non_octal_or_overlong() {
        assert!(parse_octal_mode("").is_err());
        assert!(parse_octal_mode("089").is_err());
        assert!(parse_octal_mode("1abc").is_err());
        assert!(parse_octal_mode("07777").is_err());
    }

    #[test]
    fn renders_known_modes() {
        assert_eq!(render_mode(0o644, false), "0644");
        assert_eq!(render_mode(0o755, true), "0755");
        assert_eq!(render_mode(0o4755, true), "4755");
    }

    #[test]
    fn falls_back_on_zero_mode() {
        assert_eq!(render_mode(0, true), "0755");
        assert_eq!(render_mode(0, false), "0644");
    }
}
