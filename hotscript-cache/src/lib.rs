//! Hotscript Cache
//!
//! On-demand script compilation with dependency-aware reloading.
//!
//! A [`ScriptCache`] maps script names to compiled units. Names are turned
//! into resources by a [`ResourceLocator`], compiled by a [`Compiler`], and
//! every nested resource the compiler loads through its [`CompileContext`]
//! is recorded with the timestamp it had at the time. A later request reuses
//! the compiled unit only while neither the script nor any recorded
//! dependency has changed.
//!
//! # Usage
//! ```rust,ignore
//! use hotscript_cache::{ScriptCache, SearchPathLocator, SearchRoot};
//! use std::sync::Arc;
//!
//! let locator = SearchPathLocator::new(vec![SearchRoot::new("mem", Arc::new(fs))]);
//! let cache = ScriptCache::new(Arc::new(locator), my_compiler);
//! let unit = cache.fetch("main.hs")?;
//! ```

mod cache;
mod compiler;
mod context;
mod error;
mod lock;
mod recorder;
mod resource;
mod store;

pub use cache::{CacheOptions, CacheStats, ScriptCache};
pub use compiler::{Compiler, Executable};
pub use context::{module_resource_name, CompileContext, LoadedDependency};
pub use error::{BoxError, CacheError, CacheResult, ResourceError, ResourceResult, RootAttempt};
pub use lock::{NameGuard, NameLocks};
pub use recorder::{Dependencies, DependencyRecorder};
pub use resource::{OpenResource, ResourceId, ResourceLocator, SearchPathLocator, SearchRoot};
pub use store::{CacheEntry, EntryStore};

pub use hotscript_vfs::Timestamp;
