//! Resource location over ordered search roots
//!
//! A [`ResourceLocator`] maps a logical script name to an [`OpenResource`]:
//! an open content handle together with the resource's identity and its
//! modification timestamp. [`SearchPathLocator`] is the standard
//! implementation, trying each configured root in order.

use crate::error::{ResourceError, ResourceResult, RootAttempt};
use hotscript_vfs::{FileHandle, Timestamp, VfsError, VirtualFileSystem};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, trace, warn};

const TARGET: &str = "hotscript::resource";

/// Identity of a located resource: the search root that produced it and the
/// full path inside that root's file system.
///
/// Primary scripts are re-resolved by name on every fetch, so a script that
/// appears in a higher-priority root replaces the cached one. Dependencies
/// are recorded by id and only that id is probed: a dependency shadowed by a
/// new file in an earlier root leaves the entry fresh until something else
/// makes it stale.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    root: usize,
    path: PathBuf,
}

impl ResourceId {
    pub fn new(root: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            root,
            path: path.into(),
        }
    }

    /// Index of the search root
    pub fn root(&self) -> usize {
        self.root
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}:{}", self.root, self.path.display())
    }
}

/// An opened resource.
///
/// Owns the underlying [`FileHandle`] and releases it exactly once: through
/// [`OpenResource::release`] or, failing that, when dropped. Release failures
/// are logged and otherwise ignored.
pub struct OpenResource {
    id: ResourceId,
    last_modified: Timestamp,
    handle: Option<Box<dyn FileHandle>>,
}

impl OpenResource {
    /// Wrap a freshly opened handle, reading its modification timestamp.
    ///
    /// If the timestamp cannot be read the handle is released before the
    /// error is returned.
    pub fn open(id: ResourceId, handle: Box<dyn FileHandle>) -> ResourceResult<Self> {
        match handle.modified() {
            Ok(last_modified) => Ok(Self {
                id,
                last_modified,
                handle: Some(handle),
            }),
            Err(source) => {
                release_handle(&id, handle);
                Err(ResourceError::Probe { id, source })
            }
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Modification timestamp observed when the resource was opened
    pub fn last_modified(&self) -> Timestamp {
        self.last_modified
    }

    /// Read the remaining content as bytes
    pub fn read_bytes(&mut self) -> ResourceResult<Vec<u8>> {
        let Some(handle) = self.handle.as_mut() else {
            return Err(ResourceError::Read {
                id: self.id.clone(),
                source: VfsError::Custom {
                    message: "resource already released".to_string(),
                },
            });
        };
        handle.read_to_end().map_err(|source| ResourceError::Read {
            id: self.id.clone(),
            source,
        })
    }

    /// Read the remaining content as UTF-8 text
    pub fn read_to_string(&mut self) -> ResourceResult<String> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|source| ResourceError::Decode {
            id: self.id.clone(),
            source,
        })
    }

    /// Release the handle now
    pub fn release(mut self) {
        if let Some(handle) = self.handle.take() {
            release_handle(&self.id, handle);
        }
    }
}

impl Drop for OpenResource {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            release_handle(&self.id, handle);
        }
    }
}

impl fmt::Debug for OpenResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenResource")
            .field("id", &self.id)
            .field("last_modified", &self.last_modified)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

fn release_handle(id: &ResourceId, handle: Box<dyn FileHandle>) {
    if let Err(err) = handle.close() {
        warn!(target: TARGET, resource = %id, error = %err, "failed to release resource");
    }
}

/// Maps script names to open resources.
pub trait ResourceLocator: Send + Sync {
    /// Locate and open the resource for `name`
    fn resolve(&self, name: &str) -> ResourceResult<OpenResource>;

    /// Re-open a resource previously returned by `resolve`
    fn open(&self, id: &ResourceId) -> ResourceResult<OpenResource>;

    /// Human-readable description of where resources are looked up
    fn describe(&self) -> Vec<String> {
        Vec::new()
    }
}

/// One search root: a file system and a base path inside it.
#[derive(Clone)]
pub struct SearchRoot {
    label: String,
    fs: Arc<dyn VirtualFileSystem>,
    base: PathBuf,
}

impl SearchRoot {
    /// A root at the top of `fs`
    pub fn new(label: impl Into<String>, fs: Arc<dyn VirtualFileSystem>) -> Self {
        Self::with_base(label, fs, PathBuf::new())
    }

    /// A root at `base` inside `fs`
    pub fn with_base(
        label: impl Into<String>,
        fs: Arc<dyn VirtualFileSystem>,
        base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            label: label.into(),
            fs,
            base: base.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Path of `name` below this root
    fn path_for(&self, name: &str) -> PathBuf {
        self.base.join(name.trim_start_matches('/'))
    }
}

impl fmt::Debug for SearchRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchRoot")
            .field("label", &self.label)
            .field("base", &self.base)
            .finish()
    }
}

/// Locator trying an ordered list of search roots, first match wins.
#[derive(Debug, Clone, Default)]
pub struct SearchPathLocator {
    roots: Vec<SearchRoot>,
}

impl SearchPathLocator {
    pub fn new(roots: Vec<SearchRoot>) -> Self {
        Self { roots }
    }

    /// Append a lower-priority root
    pub fn with_root(mut self, root: SearchRoot) -> Self {
        self.roots.push(root);
        self
    }

    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }
}

fn validate_name(name: &str) -> Result<(), VfsError> {
    let invalid = |reason: &str| VfsError::InvalidPath {
        path: name.to_string(),
        reason: reason.to_string(),
    };
    if name.trim().is_empty() {
        return Err(invalid("empty script name"));
    }
    if Path::new(name)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(invalid("script names may not contain '..'"));
    }
    Ok(())
}

impl ResourceLocator for SearchPathLocator {
    fn resolve(&self, name: &str) -> ResourceResult<OpenResource> {
        let mut attempts = Vec::with_capacity(self.roots.len());

        for (index, root) in self.roots.iter().enumerate() {
            let path = root.path_for(name);
            let opened = validate_name(name).and_then(|()| root.fs.open(&path));
            match opened {
                Ok(handle) => {
                    trace!(target: TARGET, name, root = %root.label, path = %path.display(), "resolved");
                    return OpenResource::open(ResourceId::new(index, path), handle);
                }
                Err(reason) => {
                    trace!(target: TARGET, name, root = %root.label, %reason, "not in root");
                    attempts.push(RootAttempt {
                        root: root.label.clone(),
                        path,
                        reason,
                    });
                }
            }
        }

        debug!(target: TARGET, name, roots = self.roots.len(), "resource not found");
        Err(ResourceError::NotFound {
            name: name.to_string(),
            attempts,
        })
    }

    fn open(&self, id: &ResourceId) -> ResourceResult<OpenResource> {
        let root = self
            .roots
            .get(id.root())
            .ok_or_else(|| ResourceError::UnknownRoot { id: id.clone() })?;
        let handle = root
            .fs
            .open(id.path())
            .map_err(|source| ResourceError::Probe {
                id: id.clone(),
                source,
            })?;
        OpenResource::open(id.clone(), handle)
    }

    fn describe(&self) -> Vec<String> {
        self.roots
            .iter()
            .map(|root| format!("{} ({})", root.label, root.base.display()))
            .collect()
    }
}
