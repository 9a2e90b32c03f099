//! API 错误类型
//!
//! 提供统一的错误类型和结构化错误报告。

use hotscript_cache::{BoxError, CacheError, ResourceError};
use hotscript_config::ConfigError;
use hotscript_lang::{CompileError, RuntimeError};
use serde::Serialize;
use thiserror::Error;

/// Hotscript 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    /// 配置无效或无法读取
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// 脚本找不到或无法读取
    #[error("{0}")]
    Resource(#[from] ResourceError),

    /// 编译错误（含被导入模块中的错误）
    #[error("{script}: {source}")]
    Compile {
        script: String,
        #[source]
        source: CompileError,
    },

    /// 运行时错误
    #[error("{script}: {source}")]
    Runtime {
        script: String,
        #[source]
        source: RuntimeError,
    },

    /// 编译器或执行器返回了未知类型的错误
    #[error("{script}: {source}")]
    Other {
        script: String,
        #[source]
        source: BoxError,
    },
}

impl From<CacheError> for EngineError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::ResourceUnavailable(source) => EngineError::Resource(source),
            CacheError::Compile { name, source } => match source.downcast::<CompileError>() {
                Ok(source) => EngineError::Compile {
                    script: name,
                    source: *source,
                },
                Err(source) => EngineError::Other {
                    script: name,
                    source,
                },
            },
            CacheError::Execution { name, source } => match source.downcast::<RuntimeError>() {
                Ok(source) => EngineError::Runtime {
                    script: name,
                    source: *source,
                },
                Err(source) => EngineError::Other {
                    script: name,
                    source,
                },
            },
        }
    }
}

impl EngineError {
    /// 获取错误阶段名称
    pub fn phase(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "config",
            EngineError::Resource(_) => "resource",
            EngineError::Compile { .. } => "compiler",
            EngineError::Runtime { .. } => "runtime",
            EngineError::Other { .. } => "engine",
        }
    }

    /// 获取错误行号（如果有）
    pub fn line(&self) -> Option<usize> {
        match self {
            EngineError::Compile { source, .. } => source.coordinate().map(|c| c.line),
            EngineError::Runtime { source, .. } => source.line(),
            _ => None,
        }
    }

    /// 获取错误列号（如果有）
    pub fn column(&self) -> Option<usize> {
        match self {
            EngineError::Compile { source, .. } => source.coordinate().map(|c| c.column),
            _ => None,
        }
    }

    /// 出错的入口脚本名
    pub fn script(&self) -> Option<&str> {
        match self {
            EngineError::Compile { script, .. }
            | EngineError::Runtime { script, .. }
            | EngineError::Other { script, .. } => Some(script),
            EngineError::Config(_) | EngineError::Resource(_) => None,
        }
    }

    /// 编译错误发生在被导入模块中时，返回该模块名
    pub fn module(&self) -> Option<&str> {
        match self {
            EngineError::Compile { source, .. } => source.module(),
            _ => None,
        }
    }

    /// 转换为结构化错误报告
    ///
    /// CLI 直接打印，工具可以序列化为 JSON。
    pub fn to_report(&self) -> ErrorReport {
        let details = match self {
            EngineError::Resource(err) if !err.attempts().is_empty() => {
                Some(ErrorDetails::Attempts {
                    attempts: err.attempts().iter().map(ToString::to_string).collect(),
                })
            }
            EngineError::Compile { source, .. } => import_chain(source)
                .map(|chain| ErrorDetails::ImportChain { chain: chain.to_vec() }),
            _ => None,
        };

        ErrorReport {
            phase: self.phase(),
            script: self.script().map(str::to_string),
            module: self.module().map(str::to_string),
            line: self.line(),
            column: self.column(),
            error_kind: self.kind().to_string(),
            message: self.message(),
            details,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            EngineError::Config(_) => "ConfigError",
            EngineError::Resource(err) => match err {
                ResourceError::NotFound { .. } => "NotFound",
                ResourceError::Read { .. } => "ReadError",
                ResourceError::Decode { .. } => "DecodeError",
                ResourceError::Probe { .. } => "ProbeError",
                ResourceError::UnknownRoot { .. } => "UnknownRoot",
            },
            EngineError::Compile { source, .. } => compile_kind(source),
            EngineError::Runtime { source, .. } => match source {
                RuntimeError::TypeError { .. } => "TypeError",
                RuntimeError::UndefinedVariable { .. } => "UndefinedVariable",
                RuntimeError::UnknownMember { .. } => "UnknownMember",
                RuntimeError::DivisionByZero { .. } => "DivisionByZero",
                RuntimeError::StackOverflow { .. } => "StackOverflow",
                RuntimeError::InstructionLimit { .. } => "InstructionLimit",
                RuntimeError::MalformedBytecode { .. } => "MalformedBytecode",
            },
            EngineError::Other { .. } => "Other",
        }
    }

    /// 不带脚本名和位置前缀的消息，位置由报告单独给出
    fn message(&self) -> String {
        match self {
            EngineError::Compile { source, .. } => compile_message(innermost(source)),
            EngineError::Runtime { source, .. } => runtime_message(source),
            EngineError::Other { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}

fn compile_message(err: &CompileError) -> String {
    match err {
        CompileError::Lexer { kind, .. } => kind.to_string(),
        CompileError::Parser { kind, .. } => kind.to_string(),
        CompileError::Import { module, source, .. } => {
            format!("cannot import '{}': {}", module, source)
        }
        CompileError::TooLarge { what, .. } => format!("{} limit exceeded", what),
        other => other.to_string(),
    }
}

fn runtime_message(err: &RuntimeError) -> String {
    match err {
        RuntimeError::TypeError { message, .. } => format!("type error: {}", message),
        RuntimeError::UndefinedVariable { name, .. } => format!("undefined variable '{}'", name),
        RuntimeError::UnknownMember { module, member, .. } => {
            format!("module '{}' has no exported member '{}'", module, member)
        }
        RuntimeError::DivisionByZero { .. } => "division by zero".to_string(),
        other => other.to_string(),
    }
}

fn innermost(err: &CompileError) -> &CompileError {
    match err {
        CompileError::InModule { source, .. } => innermost(source),
        other => other,
    }
}

fn compile_kind(err: &CompileError) -> &'static str {
    match innermost(err) {
        CompileError::Lexer { .. } => "LexerError",
        CompileError::Parser { .. } => "ParserError",
        CompileError::Import { .. } => "ImportError",
        CompileError::CircularImport { .. } => "CircularImport",
        CompileError::TooLarge { .. } => "TooLarge",
        CompileError::InModule { .. } => "CompileError",
    }
}

fn import_chain(err: &CompileError) -> Option<&[String]> {
    match innermost(err) {
        CompileError::CircularImport { chain } => Some(chain),
        _ => None,
    }
}

/// 结构化错误报告
///
/// 上层应用（CLI、工具）可以根据自己的需求格式化。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    /// 错误阶段: config, resource, compiler, runtime
    pub phase: &'static str,
    /// 入口脚本名
    pub script: Option<String>,
    /// 出错位置所在的被导入模块（点分名）
    pub module: Option<String>,
    /// 错误行号（1-based，如果有）
    pub line: Option<usize>,
    /// 错误列号（1-based，如果有）
    pub column: Option<usize>,
    /// 错误类型（可用于程序化处理）
    pub error_kind: String,
    /// 人类可读的错误消息
    pub message: String,
    /// 额外详情
    pub details: Option<ErrorDetails>,
}

/// 错误额外详情
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorDetails {
    /// 每个搜索根的查找失败原因
    Attempts { attempts: Vec<String> },
    /// 循环导入链
    ImportChain { chain: Vec<String> },
}

impl std::fmt::Display for ErrorReport {
    /// 默认的 CLI 友好格式
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let place = match (&self.script, &self.module) {
            (_, Some(module)) => format!("{} ", module),
            (Some(script), None) => format!("{} ", script),
            (None, None) => String::new(),
        };
        match (self.line, self.column) {
            (Some(line), Some(col)) => write!(
                f,
                "[{}{}:{}] {} error: {}",
                place, line, col, self.phase, self.message
            ),
            (Some(line), None) => {
                write!(f, "[{}{}] {} error: {}", place, line, self.phase, self.message)
            }
            _ => write!(f, "{} error: {}", self.phase, self.message),
        }
    }
}
