//! VirtualFileSystem trait definition

use crate::error::VfsResult;
use crate::handle::{FileHandle, Timestamp};
use std::path::Path;

/// File access used by the script cache.
///
/// Besides whole-file reads and writes, implementations hand out
/// [`FileHandle`]s that report the modification timestamp of the file they
/// opened and must be closed explicitly.
///
/// # Implementations
/// - `MemoryFileSystem`: In-memory file system with a logical clock
/// - `NativeFileSystem`: Native OS file system
pub trait VirtualFileSystem: Send + Sync {
    /// Read a whole file without keeping a handle open
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>>;

    /// Write file contents
    ///
    /// Creates the file if it doesn't exist, truncates it if it does.
    /// The file's modification timestamp advances.
    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()>;

    /// Check if a file exists at path
    fn exists(&self, path: &Path) -> bool;

    /// Modification timestamp of a file
    fn modified(&self, path: &Path) -> VfsResult<Timestamp>;

    /// Open a file for reading
    ///
    /// The returned handle must be released with `close()`.
    fn open(&self, path: &Path) -> VfsResult<Box<dyn FileHandle>>;
}
