//! Error types for resource access and the cache

use crate::resource::ResourceId;
use hotscript_vfs::VfsError;
use std::fmt::Write as _;
use std::path::PathBuf;

/// Boxed error used at the compiler and executor seams
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// One failed attempt to find a resource below a search root
#[derive(Debug, Clone, PartialEq)]
pub struct RootAttempt {
    /// Label of the search root
    pub root: String,
    /// Path tried inside that root
    pub path: PathBuf,
    /// Why it failed
    pub reason: VfsError,
}

impl std::fmt::Display for RootAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.root, self.path.display(), self.reason)
    }
}

/// Errors raised while locating, reading or probing a resource
#[derive(Debug, thiserror::Error)]
pub enum ResourceError {
    /// No search root produced the resource
    #[error("no resource for '{name}' was found{}", render_attempts(.attempts))]
    NotFound {
        name: String,
        attempts: Vec<RootAttempt>,
    },

    /// The resource was found but could not be read
    #[error("cannot read {id}: {source}")]
    Read {
        id: ResourceId,
        #[source]
        source: VfsError,
    },

    /// The resource content is not valid UTF-8
    #[error("{id} is not valid UTF-8: {source}")]
    Decode {
        id: ResourceId,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// A known resource could not be opened or its timestamp read
    #[error("cannot probe {id}: {source}")]
    Probe {
        id: ResourceId,
        #[source]
        source: VfsError,
    },

    /// The resource refers to a search root this locator does not have
    #[error("{id} refers to an unknown search root")]
    UnknownRoot { id: ResourceId },
}

fn render_attempts(attempts: &[RootAttempt]) -> String {
    let mut rendered = String::new();
    for attempt in attempts {
        let _ = write!(rendered, "\n  - {}", attempt);
    }
    rendered
}

impl ResourceError {
    /// Per-root failure reasons, if the resource was not found at all
    pub fn attempts(&self) -> &[RootAttempt] {
        match self {
            ResourceError::NotFound { attempts, .. } => attempts,
            _ => &[],
        }
    }
}

/// Errors surfaced by [`ScriptCache`](crate::ScriptCache)
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// No root produced the script, or reading it failed
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(#[from] ResourceError),

    /// The compiler rejected the script
    #[error("could not compile script '{name}': {source}")]
    Compile {
        name: String,
        #[source]
        source: BoxError,
    },

    /// The compiled unit failed while executing
    #[error("script '{name}' failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: BoxError,
    },
}

impl CacheError {
    pub fn is_resource_unavailable(&self) -> bool {
        matches!(self, CacheError::ResourceUnavailable(_))
    }

    pub fn is_compile(&self) -> bool {
        matches!(self, CacheError::Compile { .. })
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, CacheError::Execution { .. })
    }

    /// Downcast the compiler's or executor's cause
    pub fn cause<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            CacheError::Compile { source, .. } | CacheError::Execution { source, .. } => {
                source.downcast_ref::<E>()
            }
            CacheError::ResourceUnavailable(_) => None,
        }
    }
}
