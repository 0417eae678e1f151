#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `scp-core` implements the server-side SCP protocol state machine: the
//! Channel Framer, the Authorization & Quota Gate boundary, the Filesystem
//! Adapter boundary, the Upload and Download Engines, the Transfer Handle
//! Bridge, the connection registry, and the Command Dispatcher.
//!
//! Everything this crate needs from the outside world — the concrete
//! filesystem, the user/permission/quota store, pre-action hooks, and the
//! transfer lifecycle — is consumed through the traits in [`vfs`],
//! [`auth`], [`quota`], [`hooks`], and [`transfer`]. `scp-vfs` provides a
//! disk-backed implementation of all five for the reference binary and for
//! integration tests.
//!
//! # Design
//!
//! One SSH channel maps to one call to [`dispatcher::handle`], run on a
//! single task with no internal parallelism. The channel is a plain
//! `Read + Write` pair; [`framer::ChannelFramer`] frames acks and control
//! lines on top of it. Everything downstream is synchronous — there is no
//! async runtime dependency in this crate, matching the rest of this
//! workspace's protocol-handling code, which stays synchronous even where
//! an optional async feature exists at the transport layer.
//!
//! # Invariants
//!
//! - [`dispatcher::handle`] always registers and deregisters the
//!   connection, even on a panic.
//! - No file bytes are read into user-visible storage before authorization,
//!   quota, and pre-action checks pass.
//! - [`transfer::Transfer::close`] is called exactly once per transfer.
//!
//! # Errors
//!
//! Every fallible function returns [`error::CoreError`]. See its
//! documentation for the category-to-ack mapping.
//!
//! # See also
//!
//! - `scp_protocol` for the value-level ack codec and control-line parser.
//! - `scp-vfs` for a concrete backend implementing this crate's traits.

pub mod auth;
pub mod dispatcher;
pub mod download;
pub mod error;
pub mod framer;
pub mod hooks;
pub mod quota;
pub mod registry;
pub mod session;
pub mod transfer;
pub mod upload;
pub mod vfs;
mod vpath;

pub use error::{CoreError, PERMISSION_DENIED_MESSAGE};
