//! Hotscript Lang - reference script language for the cache
//!
//! Lexer, parser, bytecode compiler and stack VM. The crate performs no file
//! IO of its own: imported modules are loaded through the cache's
//! `CompileContext`, so they are recorded as dependencies of the script that
//! imports them.
//!
//! Configuration is passed explicitly via parameters, not via global state.

pub mod ast;
pub mod chunk;
pub mod codegen;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod script;
pub mod value;
pub mod vm;

pub use chunk::{Chunk, OpCode, Program};
pub use error::{CompileError, Coordinate, LexerErrorKind, ParserErrorKind, RuntimeError};
pub use script::{LangCompiler, Script};
pub use value::{Namespace, Value};
pub use vm::{Binding, ExecuteOutput, Vm};

pub use hotscript_config::LimitConfig;
