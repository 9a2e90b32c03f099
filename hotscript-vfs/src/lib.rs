//! Hotscript Virtual File System
//!
//! A virtual file system abstraction with multiple backend implementations.
//! Besides plain reads and writes it exposes modification timestamps and
//! explicitly released file handles, which the script cache uses to decide
//! when a compiled script is out of date.
//!
//! # Usage
//! ```rust,ignore
//! use hotscript_vfs::{VirtualFileSystem, MemoryFileSystem};
//! use std::path::Path;
//!
//! let fs = MemoryFileSystem::new();
//! fs.write_file(Path::new("/test.hs"), b"return 1;").unwrap();
//! let handle = fs.open(Path::new("/test.hs")).unwrap();
//! let modified = handle.modified().unwrap();
//! handle.close().unwrap();
//! ```

mod error;
mod handle;
mod memory;
mod native;
mod r#trait;

pub use error::{VfsError, VfsResult};
pub use handle::{FileHandle, Timestamp};
pub use memory::{Fault, MemoryFileSystem};
pub use native::NativeFileSystem;
pub use r#trait::VirtualFileSystem;

/// Create a new memory-based file system.
pub fn memory_fs() -> MemoryFileSystem {
    MemoryFileSystem::new()
}

/// Create a new native file system.
pub fn native_fs() -> NativeFileSystem {
    NativeFileSystem::new()
}
