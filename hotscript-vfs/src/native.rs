//! Native file system implementation

use crate::error::{VfsError, VfsResult};
use crate::handle::{FileHandle, Timestamp};
use crate::VirtualFileSystem;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};

/// A native OS file system implementation.
///
/// This wraps `std::fs` operations and provides the `VirtualFileSystem`
/// interface for local file access. With a base directory, every path is
/// interpreted relative to it and may not escape it through `..`.
///
/// # Example
/// ```
/// use hotscript_vfs::{NativeFileSystem, VirtualFileSystem};
/// use std::path::Path;
///
/// let fs = NativeFileSystem::with_base(Path::new("/srv/scripts"));
/// assert!(!fs.exists(Path::new("definitely/missing.hs")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct NativeFileSystem {
    base: Option<PathBuf>,
}

impl NativeFileSystem {
    /// Create a new native file system.
    pub fn new() -> Self {
        Self { base: None }
    }

    /// Create a new native file system with a base directory.
    ///
    /// All paths will be relative to this base directory.
    ///
    /// # Arguments
    /// * `base` - The base directory for all file operations
    pub fn with_base(base: &Path) -> Self {
        Self {
            base: Some(base.to_path_buf()),
        }
    }

    /// The base directory, if any
    pub fn base(&self) -> Option<&Path> {
        self.base.as_deref()
    }

    fn resolve(&self, path: &Path) -> VfsResult<PathBuf> {
        let Some(base) = &self.base else {
            return Ok(path.to_path_buf());
        };

        let mut resolved = base.clone();
        for component in path.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
                Component::ParentDir => {
                    return Err(VfsError::InvalidPath {
                        path: path.to_string_lossy().to_string(),
                        reason: "parent components are not allowed below a base directory"
                            .to_string(),
                    })
                }
            }
        }
        Ok(resolved)
    }
}

impl VirtualFileSystem for NativeFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let real = self.resolve(path)?;
        std::fs::read(&real).map_err(|e| VfsError::from_io(e, &real))
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        let real = self.resolve(path)?;
        std::fs::write(&real, content).map_err(|e| VfsError::from_io(e, &real))
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve(path).map(|p| p.exists()).unwrap_or(false)
    }

    fn modified(&self, path: &Path) -> VfsResult<Timestamp> {
        let real = self.resolve(path)?;
        let metadata = std::fs::metadata(&real).map_err(|e| VfsError::from_io(e, &real))?;
        let modified = metadata.modified()?;
        Ok(Timestamp::from_system_time(modified))
    }

    fn open(&self, path: &Path) -> VfsResult<Box<dyn FileHandle>> {
        let real = self.resolve(path)?;
        let file = File::open(&real).map_err(|e| VfsError::from_io(e, &real))?;
        if !file.metadata()?.is_file() {
            return Err(VfsError::InvalidPath {
                path: real.to_string_lossy().to_string(),
                reason: "not a regular file".to_string(),
            });
        }
        Ok(Box::new(NativeFileHandle { file, path: real }))
    }
}

/// Handle over an open OS file
struct NativeFileHandle {
    file: File,
    path: PathBuf,
}

impl FileHandle for NativeFileHandle {
    fn modified(&self) -> VfsResult<Timestamp> {
        let metadata = self
            .file
            .metadata()
            .map_err(|e| VfsError::from_io(e, &self.path))?;
        Ok(Timestamp::from_system_time(metadata.modified()?))
    }

    fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        let mut content = Vec::new();
        self.file
            .read_to_end(&mut content)
            .map_err(|e| VfsError::from_io(e, &self.path))?;
        Ok(content)
    }

    fn close(self: Box<Self>) -> VfsResult<()> {
        // Dropping the file releases the descriptor
        drop(self.file);
        Ok(())
    }
}
