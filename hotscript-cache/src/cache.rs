//! The script cache: compile on demand, reuse while fresh, recompile on change

use crate::compiler::{Compiler, Executable};
use crate::context::{module_resource_name, CompileContext};
use crate::error::{CacheError, CacheResult};
use crate::lock::NameLocks;
use crate::resource::{OpenResource, ResourceLocator};
use crate::store::{CacheEntry, EntryStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};

const TARGET: &str = "hotscript::cache";

/// Construction-time options of a [`ScriptCache`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Extension used by [`ScriptCache::load_script_by_name`] and module imports
    pub extension: String,
    /// Number of shards in the name lock table
    pub lock_shards: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            extension: "hs".to_string(),
            lock_shards: 16,
        }
    }
}

/// Counters describing cache activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Requests answered from a fresh entry
    pub hits: u64,
    /// Successful compilations
    pub compilations: u64,
    /// Requests that failed to locate, read or compile
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    compilations: AtomicU64,
    failures: AtomicU64,
}

/// On-demand compilation cache with dependency-aware reloading.
///
/// Every request for a name runs under that name's lock: concurrent
/// requests for the same cold script compile it once, requests for other
/// names proceed in parallel. An entry is reused until the script, or any
/// resource recorded while compiling it, reports a newer timestamp.
pub struct ScriptCache<C: Compiler> {
    locator: Arc<dyn ResourceLocator>,
    compiler: C,
    options: CacheOptions,
    entries: EntryStore<C::Unit>,
    locks: NameLocks,
    counters: Counters,
}

impl<C: Compiler> ScriptCache<C> {
    pub fn new(locator: Arc<dyn ResourceLocator>, compiler: C) -> Self {
        Self::with_options(locator, compiler, CacheOptions::default())
    }

    pub fn with_options(
        locator: Arc<dyn ResourceLocator>,
        compiler: C,
        options: CacheOptions,
    ) -> Self {
        Self {
            locks: NameLocks::new(options.lock_shards),
            locator,
            compiler,
            options,
            entries: EntryStore::new(),
            counters: Counters::default(),
        }
    }

    /// Return a ready-to-run unit for `name`, compiling it if needed.
    pub fn fetch(&self, name: &str) -> CacheResult<Arc<C::Unit>> {
        let _guard = self.locks.lock(name);

        let cached = self.entries.lookup(name);
        let primary = self.locator.resolve(name);

        if let (Some(entry), Ok(current)) = (&cached, &primary) {
            if !self.is_stale(name, entry, current) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                trace!(target: TARGET, name, "cache hit");
                return Ok(Arc::clone(entry.unit()));
            }
        }

        match primary {
            Ok(primary) => self.compile(name, primary),
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(target: TARGET, name, error = %err, "script unavailable");
                Err(err.into())
            }
        }
    }

    /// Fetch by dotted module name: `pkg.util` → `pkg/util.<extension>`
    pub fn load_script_by_name(&self, module: &str) -> CacheResult<Arc<C::Unit>> {
        self.fetch(&module_resource_name(module, &self.options.extension))
    }

    /// Whether `name` has an entry that would be served without recompiling
    pub fn is_fresh(&self, name: &str) -> bool {
        let _guard = self.locks.lock(name);
        let Some(entry) = self.entries.lookup(name) else {
            return false;
        };
        match self.locator.resolve(name) {
            Ok(current) => !self.is_stale(name, &entry, &current),
            Err(_) => false,
        }
    }

    /// Current entry for `name`, without checking freshness
    pub fn entry(&self, name: &str) -> Option<Arc<CacheEntry<C::Unit>>> {
        self.entries.lookup(name)
    }

    /// Drop the entry for `name`; the next fetch recompiles
    pub fn evict(&self, name: &str) -> bool {
        let _guard = self.locks.lock(name);
        self.entries.remove(name).is_some()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached script names, sorted
    pub fn names(&self) -> Vec<String> {
        self.entries.names()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            compilations: self.counters.compilations.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    pub fn locator(&self) -> &Arc<dyn ResourceLocator> {
        &self.locator
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Number of names currently locked or waited on
    pub fn active_locks(&self) -> usize {
        self.locks.active()
    }

    /// Compile `primary` and publish the result. Caller holds the name lock.
    fn compile(&self, name: &str, mut primary: OpenResource) -> CacheResult<Arc<C::Unit>> {
        let resource = primary.id().clone();
        let primary_timestamp = primary.last_modified();
        let source = primary.read_to_string();
        primary.release();

        let source = match source {
            Ok(source) => source,
            Err(err) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(target: TARGET, name, error = %err, "cannot read script");
                return Err(err.into());
            }
        };

        let started = Instant::now();
        let mut ctx = CompileContext::new(name, self.locator.as_ref(), &self.options.extension);
        let unit = match self.compiler.compile(&mut ctx, &source) {
            Ok(unit) => Arc::new(unit),
            Err(source) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(target: TARGET, name, error = %source, "compilation failed");
                return Err(CacheError::Compile {
                    name: name.to_string(),
                    source,
                });
            }
        };
        let dependencies = ctx.into_dependencies();

        info!(
            target: TARGET,
            name,
            resource = %resource,
            dependencies = dependencies.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compiled script"
        );

        let entry = CacheEntry::new(Arc::clone(&unit), resource, primary_timestamp, dependencies);
        self.entries.publish(name, Arc::new(entry));
        self.counters.compilations.fetch_add(1, Ordering::Relaxed);
        Ok(unit)
    }

    /// Staleness check against the freshly resolved primary resource.
    ///
    /// Dependencies are probed one level deep; a probe that fails counts as
    /// a change.
    fn is_stale(&self, name: &str, entry: &CacheEntry<C::Unit>, current: &OpenResource) -> bool {
        if current.id() != entry.resource() {
            debug!(
                target: TARGET,
                name,
                was = %entry.resource(),
                now = %current.id(),
                "script now resolves elsewhere"
            );
            return true;
        }
        if current.last_modified() > entry.primary_timestamp() {
            debug!(target: TARGET, name, "script modified");
            return true;
        }

        entry
            .dependencies()
            .iter()
            .any(|(id, recorded)| match self.locator.open(id) {
                Ok(probe) => {
                    let newer = probe.last_modified() > *recorded;
                    probe.release();
                    if newer {
                        debug!(target: TARGET, name, dependency = %id, "dependency modified");
                    }
                    newer
                }
                Err(err) => {
                    debug!(
                        target: TARGET,
                        name,
                        dependency = %id,
                        error = %err,
                        "dependency probe failed, assuming stale"
                    );
                    true
                }
            })
    }
}

impl<C> ScriptCache<C>
where
    C: Compiler,
    C::Unit: Executable,
{
    /// Fetch `name` and execute it with `bindings`
    pub fn run(
        &self,
        name: &str,
        bindings: &mut <C::Unit as Executable>::Bindings,
    ) -> CacheResult<<C::Unit as Executable>::Output> {
        let unit = self.fetch(name)?;
        unit.execute(bindings).map_err(|source| CacheError::Execution {
            name: name.to_string(),
            source,
        })
    }
}

impl<C: Compiler> std::fmt::Debug for ScriptCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptCache")
            .field("options", &self.options)
            .field("entries", &self.entries.len())
            .field("stats", &self.stats())
            .finish()
    }
}
