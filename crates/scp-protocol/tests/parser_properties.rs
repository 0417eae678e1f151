//! Property tests for the control-line parser and mode renderer.

use proptest::prelude::*;
use scp_protocol::mode::{parse_octal_mode, render_mode};
use scp_protocol::{ProtocolMessage, format_file_header, parse_line};

proptest! {
    /// Any 4-digit octal string round-trips through parsing without panicking.
    #[test]
    fn octal_mode_parses_any_four_digit_field(mode in 0u32..=0o7777) {
        let field = format!("{mode:04o}");
        let parsed = parse_octal_mode(&field).unwrap();
        prop_assert_eq!(parsed, mode);
    }

    /// A formatted file header always parses back to the same fields, for any
    /// mode/size and any name without embedded newlines.
    #[test]
    fn file_header_round_trips(
        mode in 0u32..=0o7777,
        size in 0u64..=u64::MAX,
        name in "[^\\n\\r]{1,40}",
    ) {
        let rendered_mode = render_mode(mode, false);
        let line = format_file_header(&rendered_mode, size, &name);
        let parsed = parse_line(&line).unwrap();
        match parsed {
            ProtocolMessage::FileHeader { size: parsed_size, name: parsed_name, .. } => {
                prop_assert_eq!(parsed_size, size);
                prop_assert_eq!(parsed_name, name);
            }
            other => prop_assert!(false, "expected FileHeader, got {other:?}"),
        }
    }

    /// The renderer never produces anything but a 4-digit octal string.
    #[test]
    fn render_mode_is_always_four_octal_digits(mode in 0u32..=0xFFFF_FFFFu32, is_dir in any::<bool>()) {
        let rendered = render_mode(mode, is_dir);
        prop_assert_eq!(rendered.len(), 4);
        prop_assert!(rendered.bytes().all(|b| b.is_ascii_digit()));
    }
}
