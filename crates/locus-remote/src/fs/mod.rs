//! Filesystem existence checks.
//!
//! The orchestrator only needs to ask whether a file or directory exists and
//! to remove a failed cache entry. Keeping that behind a trait lets tests run
//! against an in-memory tree.

pub mod memory;
pub mod os;

pub use memory::MemoryFs;
pub use os::OsFs;

use std::io::Result;
use std::path::Path;

/// Filesystem collaborator used by [`Remote`](crate::Remote).
///
/// # Contract
///
/// - **`file_exists_at(path)`**: `true` only for a regular file (after
///   following symlinks).
/// - **`directory_exists_at(path)`**: `true` only for a directory.
/// - **`remove_all(path)`**: removes a file or a directory tree. Removing a
///   path that does not exist succeeds.
pub trait FileSystem: Send + Sync {
    /// Check whether a regular file exists at `path`.
    fn file_exists_at(&self, path: &Path) -> bool;

    /// Check whether a directory exists at `path`.
    fn directory_exists_at(&self, path: &Path) -> bool;

    /// Recursively remove whatever is at `path`.
    fn remove_all(&self, path: &Path) -> Result<()>;
}
