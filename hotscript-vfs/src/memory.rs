//! In-memory file system implementation

use crate::error::{VfsError, VfsResult};
use crate::handle::{FileHandle, Timestamp};
use crate::VirtualFileSystem;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Failure that can be injected for a path, for exercising error paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Fault {
    /// `open()` fails
    Open,
    /// `FileHandle::modified()` fails
    Metadata,
    /// `FileHandle::read_to_end()` fails
    Read,
    /// `FileHandle::close()` fails (the handle is still released)
    Close,
}

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    modified: Timestamp,
}

#[derive(Debug, Default)]
struct State {
    files: BTreeMap<String, MemoryFile>,
    faults: BTreeMap<String, BTreeSet<Fault>>,
    /// Logical clock, advanced on every write or touch
    clock: u64,
}

impl State {
    fn tick(&mut self) -> Timestamp {
        self.clock += 1;
        Timestamp::from_millis(self.clock)
    }

    fn has_fault(&self, path: &str, fault: Fault) -> bool {
        self.faults
            .get(path)
            .is_some_and(|set| set.contains(&fault))
    }
}

#[derive(Debug, Default)]
struct HandleStats {
    opened: AtomicUsize,
    closed: AtomicUsize,
    leaked: AtomicUsize,
}

/// An in-memory file system implementation.
///
/// All files are stored in memory using a `BTreeMap`, making it suitable
/// for testing and scenarios where disk access is not desired. Every write
/// advances a logical clock which becomes the file's modification timestamp.
///
/// Open handles are counted: a handle dropped without `close()` is reported
/// by [`MemoryFileSystem::leaked_handles`].
///
/// # Example
/// ```
/// use hotscript_vfs::{MemoryFileSystem, VirtualFileSystem};
/// use std::path::Path;
///
/// let fs = MemoryFileSystem::new();
/// fs.write_file(Path::new("/main.hs"), b"hello").unwrap();
/// let content = fs.read_file(Path::new("/main.hs")).unwrap();
/// assert_eq!(content, b"hello");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    state: Arc<RwLock<State>>,
    stats: Arc<HandleStats>,
}

impl MemoryFileSystem {
    /// Create a new empty memory file system.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new memory file system pre-populated with files.
    ///
    /// # Arguments
    /// * `files` - Iterator of (path, content) tuples
    pub fn with_files<I, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<u8>)>,
        S: AsRef<str>,
    {
        let fs = Self::new();
        {
            let mut state = fs.write_state();
            for (path, content) in files {
                let modified = state.tick();
                state.files.insert(
                    normalize_path(Path::new(path.as_ref())),
                    MemoryFile { content, modified },
                );
            }
        }
        fs
    }

    /// Advance a file's modification timestamp without changing its content.
    pub fn touch(&self, path: &Path) -> VfsResult<Timestamp> {
        let normalized = normalize_path(path);
        let mut state = self.write_state();
        if !state.files.contains_key(&normalized) {
            return Err(VfsError::NotFound { path: normalized });
        }
        let modified = state.tick();
        if let Some(file) = state.files.get_mut(&normalized) {
            file.modified = modified;
        }
        Ok(modified)
    }

    /// Set a file's modification timestamp explicitly.
    pub fn set_modified(&self, path: &Path, modified: Timestamp) -> VfsResult<()> {
        let normalized = normalize_path(path);
        let mut state = self.write_state();
        match state.files.get_mut(&normalized) {
            Some(file) => {
                file.modified = modified;
                Ok(())
            }
            None => Err(VfsError::NotFound { path: normalized }),
        }
    }

    /// Remove a file.
    pub fn remove_file(&self, path: &Path) -> VfsResult<()> {
        let normalized = normalize_path(path);
        match self.write_state().files.remove(&normalized) {
            Some(_) => Ok(()),
            None => Err(VfsError::NotFound { path: normalized }),
        }
    }

    /// Make subsequent operations on `path` fail with `fault`.
    pub fn inject_fault(&self, path: &Path, fault: Fault) {
        self.write_state()
            .faults
            .entry(normalize_path(path))
            .or_default()
            .insert(fault);
    }

    /// Remove every injected fault.
    pub fn clear_faults(&self) {
        self.write_state().faults.clear();
    }

    /// Handles opened and not yet released.
    pub fn open_handles(&self) -> usize {
        let opened = self.stats.opened.load(Ordering::SeqCst);
        let released =
            self.stats.closed.load(Ordering::SeqCst) + self.stats.leaked.load(Ordering::SeqCst);
        opened.saturating_sub(released)
    }

    /// Total number of handles ever opened.
    pub fn opened_handles(&self) -> usize {
        self.stats.opened.load(Ordering::SeqCst)
    }

    /// Handles dropped without `close()`.
    pub fn leaked_handles(&self) -> usize {
        self.stats.leaked.load(Ordering::SeqCst)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Normalize a path string for internal storage.
/// Uses forward slashes consistently for cross-platform compatibility.
fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn injected(path: &str, fault: Fault) -> VfsError {
    VfsError::Custom {
        message: format!("injected {:?} fault: {}", fault, path),
    }
}

impl VirtualFileSystem for MemoryFileSystem {
    fn read_file(&self, path: &Path) -> VfsResult<Vec<u8>> {
        let normalized = normalize_path(path);
        let state = self.read_state();
        if state.has_fault(&normalized, Fault::Read) {
            return Err(injected(&normalized, Fault::Read));
        }
        state
            .files
            .get(&normalized)
            .map(|file| file.content.clone())
            .ok_or(VfsError::NotFound { path: normalized })
    }

    fn write_file(&self, path: &Path, content: &[u8]) -> VfsResult<()> {
        let normalized = normalize_path(path);
        let mut state = self.write_state();
        let modified = state.tick();
        state.files.insert(
            normalized,
            MemoryFile {
                content: content.to_vec(),
                modified,
            },
        );
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.read_state().files.contains_key(&normalize_path(path))
    }

    fn modified(&self, path: &Path) -> VfsResult<Timestamp> {
        let normalized = normalize_path(path);
        let state = self.read_state();
        if state.has_fault(&normalized, Fault::Metadata) {
            return Err(injected(&normalized, Fault::Metadata));
        }
        state
            .files
            .get(&normalized)
            .map(|file| file.modified)
            .ok_or(VfsError::NotFound { path: normalized })
    }

    fn open(&self, path: &Path) -> VfsResult<Box<dyn FileHandle>> {
        let normalized = normalize_path(path);
        let state = self.read_state();
        if state.has_fault(&normalized, Fault::Open) {
            return Err(injected(&normalized, Fault::Open));
        }
        let file = state
            .files
            .get(&normalized)
            .cloned()
            .ok_or_else(|| VfsError::NotFound {
                path: normalized.clone(),
            })?;
        let faults = state.faults.get(&normalized).cloned().unwrap_or_default();
        drop(state);

        self.stats.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryFileHandle {
            path: normalized,
            file,
            faults,
            stats: Arc::clone(&self.stats),
            released: false,
        }))
    }
}

/// Handle over a snapshot of an in-memory file
struct MemoryFileHandle {
    path: String,
    file: MemoryFile,
    faults: BTreeSet<Fault>,
    stats: Arc<HandleStats>,
    released: bool,
}

impl FileHandle for MemoryFileHandle {
    fn modified(&self) -> VfsResult<Timestamp> {
        if self.faults.contains(&Fault::Metadata) {
            return Err(injected(&self.path, Fault::Metadata));
        }
        Ok(self.file.modified)
    }

    fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        if self.faults.contains(&Fault::Read) {
            return Err(injected(&self.path, Fault::Read));
        }
        Ok(std::mem::take(&mut self.file.content))
    }

    fn close(mut self: Box<Self>) -> VfsResult<()> {
        self.released = true;
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        if self.faults.contains(&Fault::Close) {
            return Err(injected(&self.path, Fault::Close));
        }
        Ok(())
    }
}

impl Drop for MemoryFileHandle {
    fn drop(&mut self) {
        if !self.released {
            self.stats.leaked.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_new_fs_is_empty() {
        let fs = MemoryFileSystem::new();
        assert!(!fs.exists(Path::new("/anything.hs")));
    }

    #[test]
    fn test_write_and_read() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/main.hs");

        fs.write_file(path, b"hello world").unwrap();

        let content = fs.read_file(path).unwrap();
        assert_eq!(content, b"hello world");
    }

    #[test]
    fn test_read_nonexistent() {
        let fs = MemoryFileSystem::new();
        let result = fs.read_file(Path::new("/missing.hs"));

        assert!(matches!(result.unwrap_err(), VfsError::NotFound { .. }));
    }

    #[test]
    fn test_writes_advance_modified() {
        let fs = MemoryFileSystem::new();
        let path = Path::new("/clock.hs");

        fs.write_file(path, b"a").unwrap();
        let first = fs.modified(path).unwrap();
        fs.write_file(path, b"b").unwrap();
        let second = fs.modified(path).unwrap();
        assert!(second > first);

        let touched = fs.touch(path).unwrap();
        assert!(touched > second);
        assert_eq!(fs.read_file(path).unwrap(), b"b");
    }

    #[test]
    fn test_set_modified_and_remove() {
        let fs = MemoryFileSystem::with_files([("/a.hs", b"x".to_vec())]);
        let path = Path::new("/a.hs");

        fs.set_modified(path, Timestamp::from_millis(99)).unwrap();
        assert_eq!(fs.modified(path).unwrap(), Timestamp::from_millis(99));

        fs.remove_file(path).unwrap();
        assert!(!fs.exists(path));
        assert!(fs.touch(path).is_err());
    }

    #[test]
    fn test_open_close_counts_handles() {
        let fs = MemoryFileSystem::with_files([("/a.hs", b"content".to_vec())]);

        let mut handle = fs.open(Path::new("/a.hs")).unwrap();
        assert_eq!(fs.open_handles(), 1);
        assert_eq!(handle.read_to_end().unwrap(), b"content");
        handle.close().unwrap();

        assert_eq!(fs.open_handles(), 0);
        assert_eq!(fs.opened_handles(), 1);
        assert_eq!(fs.leaked_handles(), 0);
    }

    #[test]
    fn test_dropped_handle_is_leaked() {
        let fs = MemoryFileSystem::with_files([("/a.hs", b"content".to_vec())]);

        let handle = fs.open(Path::new("/a.hs")).unwrap();
        drop(handle);

        assert_eq!(fs.open_handles(), 0);
        assert_eq!(fs.leaked_handles(), 1);
    }

    #[test]
    fn test_injected_faults() {
        let fs = MemoryFileSystem::with_files([("/a.hs", b"content".to_vec())]);
        let path = Path::new("/a.hs");

        fs.inject_fault(path, Fault::Metadata);
        fs.inject_fault(path, Fault::Close);
        let handle = fs.open(path).unwrap();
        assert!(handle.modified().is_err());
        assert!(handle.close().is_err());
        assert_eq!(fs.open_handles(), 0);

        fs.inject_fault(path, Fault::Open);
        assert!(fs.open(path).is_err());

        fs.clear_faults();
        assert!(fs.open(path).unwrap().close().is_ok());
    }

    #[test]
    fn test_clone_shares_data() {
        let fs1 = MemoryFileSystem::new();
        let path = Path::new("/shared.hs");

        fs1.write_file(path, b"shared").unwrap();

        let fs2 = fs1.clone();
        assert_eq!(fs2.read_file(path).unwrap(), b"shared");

        // writes through fs2 are visible in fs1
        fs2.write_file(path, b"modified").unwrap();
        assert_eq!(fs1.read_file(path).unwrap(), b"modified");
    }

    #[test]
    fn test_concurrent_reads() {
        let fs = MemoryFileSystem::with_files([("/main.hs", b"concurrent".to_vec())]);
        let mut handles = vec![];

        for _ in 0..10 {
            let fs_clone = fs.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    let content = fs_clone.read_file(Path::new("/main.hs")).unwrap();
                    assert_eq!(content, b"concurrent");
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_with_files() {
        let fs = MemoryFileSystem::with_files([
            ("/a.hs", b"return 1;".to_vec()),
            ("/b.hs", b"return 2;".to_vec()),
        ]);

        assert_eq!(fs.read_file(Path::new("/a.hs")).unwrap(), b"return 1;");
        assert_eq!(fs.read_file(Path::new("/b.hs")).unwrap(), b"return 2;");
        assert!(fs.modified(Path::new("/b.hs")).unwrap() > fs.modified(Path::new("/a.hs")).unwrap());
    }
}
