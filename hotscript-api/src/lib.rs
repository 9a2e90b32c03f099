//! Hotscript API - engine facade
//!
//! Wires configuration, search roots, the language compiler and the script
//! cache together behind one [`Engine`], and turns the errors of every
//! layer into a single [`EngineError`] with a structured [`ErrorReport`].
//!
//! Configuration is passed explicitly; there is no global engine. Build a
//! new [`Engine`] to change roots, limits or the extension.
//!
//! # Example
//! ```ignore
//! use hotscript_api::{Engine, EngineConfig};
//!
//! let engine = Engine::new(EngineConfig::with_roots(["scripts"]))?;
//! let greeting = engine.run_with_arg("greet.hs", "world")?;
//! ```

pub mod engine;
pub mod error;
pub mod types;

pub use engine::{Engine, ARG_BINDING};
pub use error::{ErrorDetails, ErrorReport, EngineError};
pub use types::PreparedScript;

pub use hotscript_cache::{CacheStats, ResourceError, ResourceLocator};
pub use hotscript_config::{ConfigError, EngineConfig, LimitConfig, LogLevel, LoggingConfig, Phase};
pub use hotscript_lang::{Binding, CompileError, ExecuteOutput, RuntimeError, Script, Value};
