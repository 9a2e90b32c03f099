//! Compilation-scoped context handed to compilers

use crate::error::ResourceResult;
use crate::recorder::{Dependencies, DependencyRecorder};
use crate::resource::{ResourceId, ResourceLocator};
use hotscript_vfs::Timestamp;
use tracing::debug;

const TARGET: &str = "hotscript::compiler";

/// A nested resource loaded during compilation
#[derive(Debug, Clone)]
pub struct LoadedDependency {
    pub id: ResourceId,
    pub modified: Timestamp,
    pub source: String,
}

/// Everything a compiler may consult while compiling one script.
///
/// Created by the cache for a single compile call. Nested resources loaded
/// through it are recorded as dependencies of the script being compiled;
/// they are read fresh every time and never cached on their own.
pub struct CompileContext<'a> {
    name: &'a str,
    locator: &'a dyn ResourceLocator,
    extension: &'a str,
    recorder: DependencyRecorder,
}

impl<'a> CompileContext<'a> {
    pub fn new(name: &'a str, locator: &'a dyn ResourceLocator, extension: &'a str) -> Self {
        Self {
            name,
            locator,
            extension,
            recorder: DependencyRecorder::new(),
        }
    }

    /// Name of the script being compiled
    pub fn script_name(&self) -> &str {
        self.name
    }

    /// Extension used to map module names to resources
    pub fn extension(&self) -> &str {
        self.extension
    }

    /// Load a nested resource by resource name and record it.
    pub fn load_dependency(&mut self, resource: &str) -> ResourceResult<LoadedDependency> {
        let mut opened = self.locator.resolve(resource)?;
        let id = opened.id().clone();
        let modified = opened.last_modified();
        self.recorder.record(id.clone(), modified);

        let source = opened.read_to_string();
        opened.release();

        debug!(target: TARGET, script = self.name, dependency = %id, "loaded dependency");
        Ok(LoadedDependency {
            id,
            modified,
            source: source?,
        })
    }

    /// Load a nested resource by dotted module name (`a.b` → `a/b.<ext>`).
    pub fn load_module(&mut self, module: &str) -> ResourceResult<LoadedDependency> {
        let resource = module_resource_name(module, self.extension);
        self.load_dependency(&resource)
    }

    /// Record a dependency observed by other means
    pub fn record(&mut self, id: ResourceId, timestamp: Timestamp) {
        self.recorder.record(id, timestamp);
    }

    pub fn recorder(&self) -> &DependencyRecorder {
        &self.recorder
    }

    pub fn into_dependencies(self) -> Dependencies {
        self.recorder.into_dependencies()
    }
}

/// Map a dotted module name to a resource name: `pkg.util` → `pkg/util.hs`
pub fn module_resource_name(module: &str, extension: &str) -> String {
    let path = module.replace('.', "/");
    if extension.is_empty() {
        path
    } else {
        format!("{}.{}", path, extension)
    }
}
