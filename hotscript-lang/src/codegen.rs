//! 语法树到字节码的编译
//!
//! 所有变量都是脚本级全局变量；代码块不引入新作用域。import 在编译前
//! 已由调用方解析为模块索引。

use crate::ast::{BinaryOp, Expr, ExprKind, LogicalOp, Module, Stmt, StmtKind, UnaryOp};
use crate::chunk::{Chunk, OpCode};
use crate::error::{CompileError, Coordinate};
use crate::value::Value;
use std::collections::HashMap;

type EmitResult = Result<(), CompileError>;

/// DefineGlobal 的 pub 标志位
pub const FLAG_PUBLIC: u8 = 1;

/// 编译一个源文件的语法树
///
/// `imports` 把点分模块名映射到 [`Program::modules`](crate::chunk::Program) 中的索引。
pub fn compile_chunk(module: &Module, imports: &HashMap<String, u8>) -> Result<Chunk, CompileError> {
    let mut emitter = Emitter {
        chunk: Chunk::new(),
        imports,
        line: 1,
    };
    for stmt in &module.statements {
        emitter.statement(stmt)?;
    }
    let last_line = emitter.line;
    emitter.chunk.write_op(OpCode::Null, last_line);
    emitter.chunk.write_op(OpCode::Return, last_line);
    Ok(emitter.chunk)
}

struct Emitter<'i> {
    chunk: Chunk,
    imports: &'i HashMap<String, u8>,
    /// 当前语句的行号，字面量沿用它
    line: usize,
}

fn too_large(what: &'static str, line: usize) -> CompileError {
    CompileError::TooLarge {
        what,
        coordinate: Coordinate::new(line, 1),
    }
}

impl Emitter<'_> {
    fn name(&mut self, name: &str, line: usize) -> Result<u8, CompileError> {
        self.chunk
            .add_name(name)
            .ok_or_else(|| too_large("name table", line))
    }

    fn constant(&mut self, value: Value, line: usize) -> EmitResult {
        let index = self
            .chunk
            .add_constant(value)
            .ok_or_else(|| too_large("constant pool", line))?;
        self.chunk.write_op_u8(OpCode::Constant, index, line);
        Ok(())
    }

    fn patch(&mut self, offset: usize, line: usize) -> EmitResult {
        self.chunk
            .patch_jump(offset)
            .ok_or_else(|| too_large("jump distance", line))
    }

    fn block(&mut self, statements: &[Stmt]) -> EmitResult {
        for stmt in statements {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, stmt: &Stmt) -> EmitResult {
        self.line = stmt.line();
        match stmt.as_ref() {
            StmtKind::Import(import) => {
                let line = import.coordinate.line;
                // 调用方保证每个 import 都已解析
                let index = self.imports.get(&import.module).copied().ok_or_else(|| {
                    CompileError::Import {
                        module: import.module.clone(),
                        coordinate: import.coordinate,
                        source: hotscript_cache::ResourceError::NotFound {
                            name: import.module.clone(),
                            attempts: Vec::new(),
                        },
                    }
                })?;
                let name = self.name(&import.binding, line)?;
                self.chunk.write_op_u8(OpCode::Import, index, line);
                self.chunk.write_op_u8_u8(OpCode::DefineGlobal, name, 0, line);
            }
            StmtKind::VarDecl {
                name,
                initializer,
                is_public,
                line,
            } => {
                self.expression(initializer)?;
                let index = self.name(name, *line)?;
                let flags = if *is_public { FLAG_PUBLIC } else { 0 };
                self.chunk
                    .write_op_u8_u8(OpCode::DefineGlobal, index, flags, *line);
            }
            StmtKind::Assign { name, value, line } => {
                self.expression(value)?;
                let index = self.name(name, *line)?;
                self.chunk.write_op_u8(OpCode::SetGlobal, index, *line);
            }
            StmtKind::Expr { expression, line } => {
                self.expression(expression)?;
                self.chunk.write_op(OpCode::Pop, *line);
            }
            StmtKind::Print { value, line } => {
                self.expression(value)?;
                self.chunk.write_op(OpCode::Print, *line);
            }
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
                line,
            } => {
                self.expression(condition)?;
                let to_else = self.chunk.write_jump(OpCode::JumpIfFalse, *line);
                self.block(then_branch)?;
                match else_branch {
                    Some(else_branch) => {
                        let to_end = self.chunk.write_jump(OpCode::Jump, *line);
                        self.patch(to_else, *line)?;
                        self.block(else_branch)?;
                        self.patch(to_end, *line)?;
                    }
                    None => self.patch(to_else, *line)?,
                }
            }
            StmtKind::While {
                condition,
                body,
                line,
            } => {
                let loop_start = self.chunk.code.len();
                self.expression(condition)?;
                let exit = self.chunk.write_jump(OpCode::JumpIfFalse, *line);
                self.block(body)?;
                self.chunk
                    .write_loop(loop_start, *line)
                    .ok_or_else(|| too_large("loop body", *line))?;
                self.patch(exit, *line)?;
            }
            StmtKind::Return { value, line } => {
                match value {
                    Some(value) => self.expression(value)?,
                    None => self.chunk.write_op(OpCode::Null, *line),
                }
                self.chunk.write_op(OpCode::Return, *line);
            }
        }
        Ok(())
    }

    fn expression(&mut self, expr: &Expr) -> EmitResult {
        match expr.as_ref() {
            ExprKind::LiteralInt(v) => self.constant(Value::Int(*v), self.line)?,
            ExprKind::LiteralFloat(v) => self.constant(Value::Float(*v), self.line)?,
            ExprKind::LiteralString(s) => {
                self.constant(Value::from(s.as_str()), self.line)?
            }
            ExprKind::LiteralBool(true) => self.chunk.write_op(OpCode::True, self.line),
            ExprKind::LiteralBool(false) => {
                self.chunk.write_op(OpCode::False, self.line)
            }
            ExprKind::LiteralNull => self.chunk.write_op(OpCode::Null, self.line),
            ExprKind::VarRef { name, line } => {
                let index = self.name(name, *line)?;
                self.chunk.write_op_u8(OpCode::GetGlobal, index, *line);
            }
            ExprKind::MemberAccess {
                object,
                member,
                line,
            } => {
                self.expression(object)?;
                let index = self.name(member, *line)?;
                self.chunk.write_op_u8(OpCode::GetMember, index, *line);
            }
            ExprKind::Unary { op, operand, line } => {
                self.expression(operand)?;
                let op = match op {
                    UnaryOp::Neg => OpCode::Neg,
                    UnaryOp::Not => OpCode::Not,
                };
                self.chunk.write_op(op, *line);
            }
            ExprKind::Binary {
                op,
                left,
                right,
                line,
            } => {
                self.expression(left)?;
                self.expression(right)?;
                self.chunk.write_op(binary_opcode(*op), *line);
            }
            ExprKind::Logical {
                op,
                left,
                right,
                line,
            } => {
                self.expression(left)?;
                self.chunk.write_op(OpCode::Dup, *line);
                match op {
                    // a and b: a 为假时保留 a
                    LogicalOp::And => {
                        let to_end = self.chunk.write_jump(OpCode::JumpIfFalse, *line);
                        self.chunk.write_op(OpCode::Pop, *line);
                        self.expression(right)?;
                        self.patch(to_end, *line)?;
                    }
                    // a or b: a 为真时保留 a
                    LogicalOp::Or => {
                        let to_right = self.chunk.write_jump(OpCode::JumpIfFalse, *line);
                        let to_end = self.chunk.write_jump(OpCode::Jump, *line);
                        self.patch(to_right, *line)?;
                        self.chunk.write_op(OpCode::Pop, *line);
                        self.expression(right)?;
                        self.patch(to_end, *line)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn binary_opcode(op: BinaryOp) -> OpCode {
    match op {
        BinaryOp::Add => OpCode::Add,
        BinaryOp::Sub => OpCode::Sub,
        BinaryOp::Mul => OpCode::Mul,
        BinaryOp::Div => OpCode::Div,
        BinaryOp::Mod => OpCode::Mod,
        BinaryOp::Equal => OpCode::Equal,
        BinaryOp::NotEqual => OpCode::NotEqual,
        BinaryOp::Less => OpCode::Less,
        BinaryOp::LessEqual => OpCode::LessEqual,
        BinaryOp::Greater => OpCode::Greater,
        BinaryOp::GreaterEqual => OpCode::GreaterEqual,
    }
}
