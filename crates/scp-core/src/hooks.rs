//! Pre-action hooks (`spec.md` §4.3.2, §4.4.2, §6.3).

use std::path::Path;

use crate::error::CoreError;

/// The operation a pre-action hook is being asked to approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// A file is about to be uploaded (created or overwritten).
    PreUpload,
    /// A file is about to be downloaded.
    PreDownload,
}

/// A user-supplied callback consulted before upload/download. A denial is
/// surfaced to the engine as [`CoreError::PermissionDenied`] (`spec.md`
/// §6.3).
pub trait PreActionHook: Send + Sync {
    /// Returns `Err` to deny the operation.
    fn execute_pre_action(
        &self,
        operation: Operation,
        real_path: &Path,
        virtual_path: &str,
        size: u64,
    ) -> Result<(), CoreError>;
}

/// A hook that never denies anything, for backends with no policy layer.
pub struct AllowAll;

impl PreActionHook for AllowAll {
    fn execute_pre_action(
        &self,
        _operation: Operation,
        _real_path: &Path,
        _virtual_path: &str,
        _size: u64,
    ) -> Result<(), CoreError> {
        Ok(())
    }
}
