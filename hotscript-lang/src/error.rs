//! 错误类型
//!
//! 编译期错误带有源代码坐标，运行期错误由 VM 产生。

use hotscript_cache::ResourceError;
use std::fmt;

/// 源代码坐标（从 1 开始）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Coordinate {
    pub line: usize,
    pub column: usize,
}

impl Coordinate {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Default for Coordinate {
    fn default() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// 词法错误类型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LexerErrorKind {
    #[error("unexpected character '{0}'")]
    UnexpectedChar(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
}

/// 语法错误类型
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParserErrorKind {
    /// 意外的 token
    #[error("unexpected {found}, expected {expected}")]
    UnexpectedToken { found: String, expected: String },
    /// 意外的输入结束
    #[error("unexpected end of input, expected {expected}")]
    UnexpectedEndOfInput { expected: String },
    /// 赋值目标无效
    #[error("invalid assignment target")]
    InvalidAssignmentTarget,
    /// import 只能出现在顶层
    #[error("import is only allowed at the top level")]
    NestedImport,
    /// return 只能出现在入口脚本
    #[error("return is not allowed in an imported module")]
    ReturnInModule,
    /// 嵌套层数超过上限
    #[error("nesting exceeds {limit} levels")]
    NestingTooDeep { limit: usize },
}

/// 编译错误
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// 词法错误
    #[error("{coordinate}: {kind}")]
    Lexer {
        kind: LexerErrorKind,
        coordinate: Coordinate,
    },

    /// 语法错误
    #[error("{coordinate}: {kind}")]
    Parser {
        kind: ParserErrorKind,
        coordinate: Coordinate,
    },

    /// 导入的模块无法加载
    #[error("{coordinate}: cannot import '{module}': {source}")]
    Import {
        module: String,
        coordinate: Coordinate,
        #[source]
        source: ResourceError,
    },

    /// 循环导入
    #[error("circular import: {}", .chain.join(" -> "))]
    CircularImport { chain: Vec<String> },

    /// 被导入模块内部的编译错误
    #[error("in module '{module}': {source}")]
    InModule {
        module: String,
        #[source]
        source: Box<CompileError>,
    },

    /// 单个代码块超出容量（常量、名字或跳转距离）
    #[error("{coordinate}: {what} limit exceeded")]
    TooLarge {
        what: &'static str,
        coordinate: Coordinate,
    },
}

impl CompileError {
    /// 错误位置（对被导入模块中的错误，返回模块内的位置）
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            CompileError::Lexer { coordinate, .. }
            | CompileError::Parser { coordinate, .. }
            | CompileError::Import { coordinate, .. }
            | CompileError::TooLarge { coordinate, .. } => Some(*coordinate),
            CompileError::CircularImport { .. } => None,
            CompileError::InModule { source, .. } => source.coordinate(),
        }
    }

    /// 出错的模块名（入口脚本本身出错时为 None）
    pub fn module(&self) -> Option<&str> {
        match self {
            CompileError::InModule { module, source } => {
                Some(source.module().unwrap_or(module.as_str()))
            }
            _ => None,
        }
    }
}

/// 运行时错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    /// 类型错误
    #[error("line {line}: type error: {message}")]
    TypeError { message: String, line: usize },
    /// 未定义变量
    #[error("line {line}: undefined variable '{name}'")]
    UndefinedVariable { name: String, line: usize },
    /// 模块没有导出该成员
    #[error("line {line}: module '{module}' has no exported member '{member}'")]
    UnknownMember {
        module: String,
        member: String,
        line: usize,
    },
    /// 除零错误
    #[error("line {line}: division by zero")]
    DivisionByZero { line: usize },
    /// 栈溢出
    #[error("stack overflow (limit {limit})")]
    StackOverflow { limit: usize },
    /// 超出指令数限制
    #[error("instruction limit of {limit} exceeded")]
    InstructionLimit { limit: u64 },
    /// 字节码损坏
    #[error("malformed bytecode at offset {offset}")]
    MalformedBytecode { offset: usize },
}

impl RuntimeError {
    /// 出错的源代码行（若可用）
    pub fn line(&self) -> Option<usize> {
        match self {
            RuntimeError::TypeError { line, .. }
            | RuntimeError::UndefinedVariable { line, .. }
            | RuntimeError::UnknownMember { line, .. }
            | RuntimeError::DivisionByZero { line } => Some(*line),
            RuntimeError::StackOverflow { .. }
            | RuntimeError::InstructionLimit { .. }
            | RuntimeError::MalformedBytecode { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_module_error_reports_innermost() {
        let inner = CompileError::Parser {
            kind: ParserErrorKind::InvalidAssignmentTarget,
            coordinate: Coordinate::new(3, 7),
        };
        let middle = CompileError::InModule {
            module: "b".into(),
            source: Box::new(inner),
        };
        let outer = CompileError::InModule {
            module: "a".into(),
            source: Box::new(middle),
        };

        assert_eq!(outer.module(), Some("b"));
        assert_eq!(outer.coordinate(), Some(Coordinate::new(3, 7)));
        assert!(outer.to_string().contains("in module 'a'"));
    }

    #[test]
    fn test_circular_display() {
        let err = CompileError::CircularImport {
            chain: vec!["main.hs".into(), "a".into(), "main".into()],
        };
        assert_eq!(err.to_string(), "circular import: main.hs -> a -> main");
        assert_eq!(err.coordinate(), None);
    }

    #[test]
    fn test_runtime_error_line() {
        assert_eq!(RuntimeError::DivisionByZero { line: 4 }.line(), Some(4));
        assert_eq!(RuntimeError::StackOverflow { limit: 8 }.line(), None);
    }
}
