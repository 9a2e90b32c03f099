//! 栈式虚拟机
//!
//! 一次执行对应一个 [`Vm`]：入口代码块在调用方提供的 [`Binding`] 上运行，
//! 被导入模块在首次 `Import` 时各自执行一次，导出的 pub 变量组成命名空间。

use crate::chunk::{Chunk, OpCode, Program};
use crate::codegen::FLAG_PUBLIC;
use crate::error::RuntimeError;
use crate::value::{Namespace, Value};
use hotscript_config::LimitConfig;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, trace};

const TARGET: &str = "hotscript::vm";

type VmResult<T> = Result<T, RuntimeError>;

/// 调用方提供的输入变量
///
/// 入口脚本读取未声明的变量时从这里查找，对这些变量赋值会写回这里。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Binding {
    variables: BTreeMap<String, Value>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.variables.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// 一次执行的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteOutput {
    /// `return` 的值，没有 return 时为 null
    pub value: Value,
    /// `print` 输出的行
    pub stdout: Vec<String>,
    /// 执行的指令数
    pub instructions: u64,
}

/// 单个代码块的执行状态
struct Frame<'b> {
    globals: HashMap<String, Value>,
    exports: BTreeSet<String>,
    /// 只有入口脚本可以访问 Binding
    binding: Option<&'b mut Binding>,
}

impl<'b> Frame<'b> {
    fn new(binding: Option<&'b mut Binding>) -> Self {
        Self {
            globals: HashMap::new(),
            exports: BTreeSet::new(),
            binding,
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        self.globals
            .get(name)
            .or_else(|| self.binding.as_ref().and_then(|b| b.get(name)))
            .cloned()
    }

    fn assign(&mut self, name: &str, value: Value) -> bool {
        if let Some(slot) = self.globals.get_mut(name) {
            *slot = value;
            return true;
        }
        match self.binding.as_mut() {
            Some(binding) if binding.contains(name) => {
                binding.set(name, value);
                true
            }
            _ => false,
        }
    }
}

/// 虚拟机
pub struct Vm<'p> {
    program: &'p Program,
    limits: &'p LimitConfig,
    stack: Vec<Value>,
    namespaces: Vec<Option<Arc<Namespace>>>,
    stdout: Vec<String>,
    executed: u64,
}

impl<'p> Vm<'p> {
    pub fn new(program: &'p Program, limits: &'p LimitConfig) -> Self {
        Self {
            program,
            limits,
            stack: Vec::with_capacity(limits.max_stack_size.min(256)),
            namespaces: vec![None; program.modules.len()],
            stdout: Vec::new(),
            executed: 0,
        }
    }

    /// 执行入口代码块
    pub fn run(mut self, binding: &mut Binding) -> VmResult<ExecuteOutput> {
        let program = self.program;
        let mut frame = Frame::new(Some(binding));
        let value = self.execute(&program.entry, &mut frame)?;
        debug!(
            target: TARGET,
            instructions = self.executed,
            lines = self.stdout.len(),
            "execution finished"
        );
        Ok(ExecuteOutput {
            value,
            stdout: self.stdout,
            instructions: self.executed,
        })
    }

    fn push(&mut self, value: Value) -> VmResult<()> {
        if self.stack.len() >= self.limits.max_stack_size {
            return Err(RuntimeError::StackOverflow {
                limit: self.limits.max_stack_size,
            });
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self, offset: usize) -> VmResult<Value> {
        self.stack
            .pop()
            .ok_or(RuntimeError::MalformedBytecode { offset })
    }

    fn import(&mut self, index: usize, offset: usize) -> VmResult<Arc<Namespace>> {
        if let Some(Some(namespace)) = self.namespaces.get(index) {
            return Ok(Arc::clone(namespace));
        }
        let program = self.program;
        let module = program
            .modules
            .get(index)
            .ok_or(RuntimeError::MalformedBytecode { offset })?;

        debug!(target: TARGET, module = %module.name, "initializing module");
        let mut frame = Frame::new(None);
        self.execute(&module.chunk, &mut frame)?;

        let members = frame
            .exports
            .iter()
            .filter_map(|name| frame.globals.get(name).map(|v| (name.clone(), v.clone())))
            .collect();
        let namespace = Arc::new(Namespace::new(module.name.clone(), members));
        self.namespaces[index] = Some(Arc::clone(&namespace));
        Ok(namespace)
    }

    fn execute(&mut self, chunk: &Chunk, frame: &mut Frame<'_>) -> VmResult<Value> {
        let base = self.stack.len();
        let mut ip = 0usize;

        macro_rules! read_u8 {
            () => {{
                let byte = *chunk
                    .code
                    .get(ip)
                    .ok_or(RuntimeError::MalformedBytecode { offset: ip })?;
                ip += 1;
                byte
            }};
        }
        macro_rules! read_i16 {
            () => {{
                let lo = read_u8!();
                let hi = read_u8!();
                i16::from_le_bytes([lo, hi])
            }};
        }
        macro_rules! name {
            ($index:expr, $offset:expr) => {
                chunk
                    .names
                    .get($index as usize)
                    .ok_or(RuntimeError::MalformedBytecode { offset: $offset })?
            };
        }

        loop {
            let offset = ip;
            let line = chunk.line_at(offset);
            let op = OpCode::try_from(read_u8!())
                .map_err(|_| RuntimeError::MalformedBytecode { offset })?;

            self.executed += 1;
            let limit = self.limits.max_instructions;
            if limit > 0 && self.executed > limit {
                return Err(RuntimeError::InstructionLimit { limit });
            }

            #[cfg(feature = "trace_execution")]
            trace!(target: TARGET, offset, line, ?op, depth = self.stack.len(), "exec");

            match op {
                OpCode::Constant => {
                    let index = read_u8!();
                    let value = chunk
                        .constants
                        .get(index as usize)
                        .cloned()
                        .ok_or(RuntimeError::MalformedBytecode { offset })?;
                    self.push(value)?;
                }
                OpCode::Null => self.push(Value::Null)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop(offset)?;
                }
                OpCode::Dup => {
                    let top = self
                        .stack
                        .last()
                        .cloned()
                        .ok_or(RuntimeError::MalformedBytecode { offset })?;
                    self.push(top)?;
                }

                OpCode::DefineGlobal => {
                    let index = read_u8!();
                    let flags = read_u8!();
                    let name = name!(index, offset);
                    let value = self.pop(offset)?;
                    if flags & FLAG_PUBLIC != 0 {
                        frame.exports.insert(name.clone());
                    }
                    frame.globals.insert(name.clone(), value);
                }
                OpCode::GetGlobal => {
                    let index = read_u8!();
                    let name = name!(index, offset);
                    let value = frame
                        .lookup(name)
                        .ok_or_else(|| RuntimeError::UndefinedVariable {
                            name: name.clone(),
                            line,
                        })?;
                    self.push(value)?;
                }
                OpCode::SetGlobal => {
                    let index = read_u8!();
                    let name = name!(index, offset);
                    let value = self.pop(offset)?;
                    if !frame.assign(name, value) {
                        return Err(RuntimeError::UndefinedVariable {
                            name: name.clone(),
                            line,
                        });
                    }
                }
                OpCode::GetMember => {
                    let index = read_u8!();
                    let member = name!(index, offset);
                    let namespace = match self.pop(offset)? {
                        Value::Module(namespace) => namespace,
                        other => {
                            return Err(RuntimeError::TypeError {
                                message: format!(
                                    "cannot read member '{}' of {}",
                                    member,
                                    other.type_name()
                                ),
                                line,
                            })
                        }
                    };
                    let value = namespace.get(member).cloned().ok_or_else(|| {
                        RuntimeError::UnknownMember {
                            module: namespace.name().to_string(),
                            member: member.clone(),
                            line,
                        }
                    })?;
                    self.push(value)?;
                }
                OpCode::Import => {
                    let index = read_u8!();
                    let namespace = self.import(index as usize, offset)?;
                    self.push(Value::Module(namespace))?;
                }

                OpCode::Add
                | OpCode::Sub
                | OpCode::Mul
                | OpCode::Div
                | OpCode::Mod
                | OpCode::Less
                | OpCode::LessEqual
                | OpCode::Greater
                | OpCode::GreaterEqual => {
                    let right = self.pop(offset)?;
                    let left = self.pop(offset)?;
                    let result = binary(op, left, right, line)?;
                    self.push(result)?;
                }
                OpCode::Equal | OpCode::NotEqual => {
                    let right = self.pop(offset)?;
                    let left = self.pop(offset)?;
                    let equal = left == right;
                    self.push(Value::Bool(if op == OpCode::Equal { equal } else { !equal }))?;
                }
                OpCode::Neg => {
                    let value = match self.pop(offset)? {
                        Value::Int(n) => Value::Int(n.checked_neg().ok_or_else(|| overflow(line))?),
                        Value::Float(n) => Value::Float(-n),
                        other => {
                            return Err(RuntimeError::TypeError {
                                message: format!("cannot negate {}", other.type_name()),
                                line,
                            })
                        }
                    };
                    self.push(value)?;
                }
                OpCode::Not => {
                    let value = self.pop(offset)?;
                    self.push(Value::Bool(!value.is_truthy()))?;
                }

                OpCode::Jump => {
                    let jump = read_i16!();
                    ip = jump_target(ip, jump, chunk, offset)?;
                }
                OpCode::JumpIfFalse => {
                    let jump = read_i16!();
                    let condition = self.pop(offset)?;
                    if !condition.is_truthy() {
                        ip = jump_target(ip, jump, chunk, offset)?;
                    }
                }
                OpCode::JumpBack => {
                    let jump = read_i16!();
                    ip = jump_target(ip, jump, chunk, offset)?;
                }

                OpCode::Print => {
                    let value = self.pop(offset)?;
                    let text = value.to_string();
                    trace!(target: TARGET, line, output = %text, "print");
                    self.stdout.push(text);
                }
                OpCode::Return => {
                    let value = self.pop(offset)?;
                    self.stack.truncate(base);
                    return Ok(value);
                }
            }
        }
    }
}

fn jump_target(ip: usize, jump: i16, chunk: &Chunk, offset: usize) -> VmResult<usize> {
    ip.checked_add_signed(jump as isize)
        .filter(|target| *target <= chunk.code.len())
        .ok_or(RuntimeError::MalformedBytecode { offset })
}

fn overflow(line: usize) -> RuntimeError {
    RuntimeError::TypeError {
        message: "integer overflow".to_string(),
        line,
    }
}

fn binary(op: OpCode, left: Value, right: Value, line: usize) -> VmResult<Value> {
    use Value::{Float, Int, Str};

    let mismatch = |left: &Value, right: &Value| RuntimeError::TypeError {
        message: format!(
            "unsupported operands for {:?}: {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ),
        line,
    };

    let value = match (op, &left, &right) {
        // 字符串拼接：任一侧为字符串即可
        (OpCode::Add, Str(_), _) | (OpCode::Add, _, Str(_)) => Value::from(format!("{left}{right}")),

        (OpCode::Add, Int(a), Int(b)) => Int(a.checked_add(*b).ok_or_else(|| overflow(line))?),
        (OpCode::Sub, Int(a), Int(b)) => Int(a.checked_sub(*b).ok_or_else(|| overflow(line))?),
        (OpCode::Mul, Int(a), Int(b)) => Int(a.checked_mul(*b).ok_or_else(|| overflow(line))?),
        (OpCode::Div | OpCode::Mod, Int(_), Int(0)) => {
            return Err(RuntimeError::DivisionByZero { line })
        }
        (OpCode::Div, Int(a), Int(b)) => Int(a.checked_div(*b).ok_or_else(|| overflow(line))?),
        (OpCode::Mod, Int(a), Int(b)) => Int(a.checked_rem(*b).ok_or_else(|| overflow(line))?),

        (OpCode::Less, Str(a), Str(b)) => Value::Bool(a < b),
        (OpCode::LessEqual, Str(a), Str(b)) => Value::Bool(a <= b),
        (OpCode::Greater, Str(a), Str(b)) => Value::Bool(a > b),
        (OpCode::GreaterEqual, Str(a), Str(b)) => Value::Bool(a >= b),

        _ => {
            let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
                return Err(mismatch(&left, &right));
            };
            match op {
                OpCode::Add => Float(a + b),
                OpCode::Sub => Float(a - b),
                OpCode::Mul => Float(a * b),
                OpCode::Div | OpCode::Mod if b == 0.0 => {
                    return Err(RuntimeError::DivisionByZero { line })
                }
                OpCode::Div => Float(a / b),
                OpCode::Mod => Float(a % b),
                OpCode::Less => Value::Bool(a < b),
                OpCode::LessEqual => Value::Bool(a <= b),
                OpCode::Greater => Value::Bool(a > b),
                OpCode::GreaterEqual => Value::Bool(a >= b),
                _ => return Err(mismatch(&left, &right)),
            }
        }
    };
    Ok(value)
}
