//! CLI 日志系统初始化
//!
//! 基于 `tracing-subscriber` 实现分阶段日志控制。日志写到 stderr，
//! stdout 留给脚本输出。

use crate::config::LogConfig;
use hotscript_config::Phase;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing::Subscriber;
use tracing_subscriber::{
    filter::Targets,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    Layer,
};

/// 日志输出格式
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// 彩色格式化（开发使用）
    Pretty,
    /// 紧凑格式
    Compact,
    /// JSON 格式（工具集成）
    Json,
}

/// 每个阶段一个 target
pub fn targets(log_config: &LogConfig) -> Targets {
    Phase::ALL.iter().fold(
        Targets::new()
            .with_default(log_config.global)
            .with_target("hotscript::cli", log_config.global),
        |targets, phase| targets.with_target(phase.target(), log_config.level_for(*phase)),
    )
}

/// 使用指定格式和日志配置初始化日志系统
///
/// 指定 `file` 时同时输出到 stderr 和该文件（追加写入）。
pub fn init(log_config: &LogConfig, format: LogFormat, file: Option<&Path>) -> io::Result<()> {
    let targets = targets(log_config);

    let console = create_format_layer(format, io::stderr).with_filter(targets.clone());
    let file_layer = match file {
        Some(path) => {
            let handle = OpenOptions::new().create(true).append(true).open(path)?;
            Some(create_format_layer(format, Mutex::new(handle)).with_filter(targets))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)
}

/// Create formatter layer based on format
fn create_format_layer<S, W>(format: LogFormat, make_writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(fmt::time::time())
            .with_writer(make_writer)
            .boxed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hotscript_config::{LogLevel, LoggingConfig};
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_targets_follow_phase_levels() {
        let logging = LoggingConfig {
            level: LogLevel::Warn,
            cache: Some(LogLevel::Debug),
            ..LoggingConfig::default()
        };
        let targets = targets(&LogConfig::from_logging(&logging));
        let levels: Vec<_> = targets.iter().collect();
        assert!(levels.contains(&("hotscript::cache", LevelFilter::DEBUG)));
        assert!(levels.contains(&("hotscript::vm", LevelFilter::WARN)));
        assert_eq!(targets.default_level(), Some(LevelFilter::WARN));
    }
}
