//! Hotscript Config - Pure configuration data structures
//!
//! This crate contains only data structures, no global state.
//! It serves as the shared configuration vocabulary across all Hotscript crates.
//! Everything here is consumed once at construction time; changing the
//! configuration means building a new engine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable holding extra search roots (`:`-separated)
pub const PATH_ENV: &str = "HOTSCRIPT_PATH";

/// Default script file extension
pub const DEFAULT_EXTENSION: &str = "hs";

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ordered search roots, highest priority first.
    ///
    /// Entries are directory paths or `file://` URLs.
    pub roots: Vec<String>,
    /// Extension appended when scripts are loaded by dotted module name
    pub extension: String,
    /// Number of shards in the per-name lock table
    pub lock_shards: usize,
    /// Execution limits
    pub limits: LimitConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Configuration for execution limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitConfig {
    /// Maximum operand stack size
    pub max_stack_size: usize,
    /// Maximum number of executed instructions per run (0 = unlimited)
    pub max_instructions: u64,
}

/// Log level names accepted in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Logging configuration, with optional per-phase overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub cache: Option<LogLevel>,
    pub resource: Option<LogLevel>,
    pub compiler: Option<LogLevel>,
    pub vm: Option<LogLevel>,
}

/// Execution phase enum for phase-specific configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Cache,
    Resource,
    Compiler,
    Vm,
}

impl Phase {
    /// All phases, in pipeline order
    pub const ALL: [Phase; 4] = [Phase::Resource, Phase::Cache, Phase::Compiler, Phase::Vm];

    /// Get the string name of the phase
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Cache => "cache",
            Phase::Resource => "resource",
            Phase::Compiler => "compiler",
            Phase::Vm => "vm",
        }
    }

    /// Get the log target name for this phase
    pub fn target(&self) -> String {
        format!("hotscript::{}", self.as_str())
    }
}

impl LoggingConfig {
    /// Effective level for a phase
    pub fn level_for(&self, phase: Phase) -> LogLevel {
        let specific = match phase {
            Phase::Cache => self.cache,
            Phase::Resource => self.resource,
            Phase::Compiler => self.compiler,
            Phase::Vm => self.vm,
        };
        specific.unwrap_or(self.level)
    }
}

impl EngineConfig {
    /// Create a config with the given roots and defaults for everything else
    pub fn with_roots<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Parse a JSON config document
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Append roots listed in `HOTSCRIPT_PATH`
    pub fn with_env_paths(mut self) -> Self {
        if let Ok(value) = std::env::var(PATH_ENV) {
            self.roots.extend(split_path_list(&value));
        }
        self
    }

    /// Check invariants that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_shards == 0 {
            return Err(ConfigError::Invalid("lock_shards must be at least 1".into()));
        }
        if self.extension.starts_with('.') {
            return Err(ConfigError::Invalid(format!(
                "extension '{}' must not start with '.'",
                self.extension
            )));
        }
        if self.limits.max_stack_size == 0 {
            return Err(ConfigError::Invalid("max_stack_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Root directories with `file://` prefixes stripped
    pub fn root_paths(&self) -> Vec<PathBuf> {
        self.roots.iter().map(|root| root_to_path(root)).collect()
    }
}

/// Convert a root entry (path or `file://` URL) into a directory path
pub fn root_to_path(root: &str) -> PathBuf {
    match root.strip_prefix("file://") {
        Some(rest) => PathBuf::from(rest),
        None => PathBuf::from(root),
    }
}

fn split_path_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(':')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            extension: DEFAULT_EXTENSION.to_string(),
            lock_shards: 16,
            limits: LimitConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LimitConfig {
    fn default() -> Self {
        Self {
            max_stack_size: 1024,
            max_instructions: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            cache: None,
            resource: None,
            compiler: None,
            vm: None,
        }
    }
}
