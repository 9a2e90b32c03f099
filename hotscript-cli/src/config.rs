//! CLI 配置
//!
//! 配置文件的日志部分与命令行参数合并成 tracing 的级别过滤。

use hotscript_config::{LogLevel, LoggingConfig, Phase};
use tracing_subscriber::filter::LevelFilter;

/// CLI 日志配置
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub global: LevelFilter,
    pub cache: Option<LevelFilter>,
    pub resource: Option<LevelFilter>,
    pub compiler: Option<LevelFilter>,
    pub vm: Option<LevelFilter>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_logging(&LoggingConfig::default())
    }
}

impl LogConfig {
    /// 从配置文件的 `logging` 部分构建
    pub fn from_logging(logging: &LoggingConfig) -> Self {
        Self {
            global: level_filter(logging.level),
            cache: logging.cache.map(level_filter),
            resource: logging.resource.map(level_filter),
            compiler: logging.compiler.map(level_filter),
            vm: logging.vm.map(level_filter),
        }
    }

    /// 命令行指定的级别覆盖全局级别，各阶段的单独设置仍然有效
    pub fn with_global(mut self, level: Option<LogLevel>) -> Self {
        if let Some(level) = level {
            self.global = level_filter(level);
        }
        self
    }

    /// Get log level for a specific phase
    pub fn level_for(&self, phase: Phase) -> LevelFilter {
        let specific = match phase {
            Phase::Cache => self.cache,
            Phase::Resource => self.resource,
            Phase::Compiler => self.compiler,
            Phase::Vm => self.vm,
        };
        specific.unwrap_or(self.global)
    }
}

/// silent 关闭全部输出
pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Silent => LevelFilter::OFF,
        LogLevel::Error => LevelFilter::ERROR,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Trace => LevelFilter::TRACE,
    }
}

/// Parse log level string
pub fn parse_log_level(s: &str) -> Result<LogLevel, String> {
    match s.to_lowercase().as_str() {
        "silent" | "off" => Ok(LogLevel::Silent),
        "error" => Ok(LogLevel::Error),
        "warn" => Ok(LogLevel::Warn),
        "info" => Ok(LogLevel::Info),
        "debug" => Ok(LogLevel::Debug),
        "trace" => Ok(LogLevel::Trace),
        other => Err(format!(
            "unknown log level '{}' (expected silent, error, warn, info, debug or trace)",
            other
        )),
    }
}
