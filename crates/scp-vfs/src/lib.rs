#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! A disk-backed implementation of the `scp-core` boundary traits
//! (`Filesystem`, `UserContext`, `QuotaProvider`, `PreActionHook`,
//! `TransferFactory`), used by the `scp-server` reference binary and by
//! `scp-core`'s own end-to-end integration tests.
//!
//! `scp-core` deliberately takes none of this as a concrete dependency —
//! everything here is a backend plugged in through the traits in
//! `scp_core::{vfs, auth, quota, hooks, transfer}`. A real deployment would
//! swap this crate for object storage, an encrypted overlay, or a shared
//! network filesystem without touching the core.

mod config;
mod disk_fs;
mod quota;
mod transfer;
mod user;

pub use config::{ScpServerConfig, UserConfig};
pub use disk_fs::DiskFilesystem;
pub use quota::InMemoryQuotaStore;
pub use transfer::LoggingTransferFactory;
pub use user::StaticUserContext;
