#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `scp-protocol` implements the value layer of the SCP control protocol: the
//! acknowledgement byte codec ([`Ack`]) and the `C`/`D`/`E`/`T` control line
//! parser/formatter ([`ProtocolMessage`], [`parse_line`]). It performs no
//! I/O; everything here operates on already-read lines and bytes. The
//! channel-level reads/writes that frame these values on the wire live in
//! `scp-core::framer`.
//!
//! # Design
//!
//! The grammar recognised by [`parse_line`] is intentionally narrow and
//! matches `spec.md` §4.2 exactly: `C<mode> <size> <name>`, `D<mode> 0
//! <name>`, `E`, `T<mtime> 0 <atime> 0`. Anything else is rejected. Mode
//! rendering for download output lives in [`mode`].
//!
//! # Invariants
//!
//! - [`parse_line`] never panics on arbitrary UTF-8 input.
//! - `C`/`D` names may contain embedded spaces (the line is split on
//!   whitespace into at most three fields); only a fully empty name is
//!   rejected.
//!
//! # See also
//!
//! - `scp-core::framer` for the channel I/O that produces the lines fed to
//!   [`parse_line`].

mod ack;
mod error;
mod message;
pub mod mode;

pub use ack::{Ack, ERR_BYTE, OK_BYTE, WARN_BYTE};
pub use error::ProtocolError;
pub use message::{
    ProtocolMessage, format_dir_header, format_end_dir, format_file_header, format_times,
    parse_line,
};
