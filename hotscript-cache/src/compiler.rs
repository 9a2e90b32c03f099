//! Collaborator interfaces: compilers and executable units

use crate::context::CompileContext;
use crate::error::BoxError;

/// Turns script text into an immutable executable unit.
///
/// Nested resources must be loaded through the [`CompileContext`] so that
/// the cache can tell when the unit goes stale.
pub trait Compiler: Send + Sync {
    /// The compiled artifact
    type Unit: Send + Sync + 'static;

    fn compile(&self, ctx: &mut CompileContext<'_>, source: &str) -> Result<Self::Unit, BoxError>;
}

/// A compiled unit that can be run against caller-supplied bindings.
pub trait Executable {
    /// Inputs (and writable outputs) of one run
    type Bindings;
    /// Result of one run
    type Output;

    fn execute(&self, bindings: &mut Self::Bindings) -> Result<Self::Output, BoxError>;
}
