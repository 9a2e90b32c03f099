//! 字节码定义

use crate::value::Value;
use std::fmt::Write as _;

/// 指令集
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    /// u8 常量索引
    Constant = 0,
    Null,
    True,
    False,
    Pop,
    Dup,

    /// u8 名字索引 + u8 标志（1 = pub）
    DefineGlobal,
    /// u8 名字索引
    GetGlobal,
    /// u8 名字索引
    SetGlobal,
    /// u8 名字索引
    GetMember,
    /// u8 模块索引
    Import,

    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Not,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,

    /// i16 前向偏移
    Jump,
    /// i16 前向偏移，弹出条件
    JumpIfFalse,
    /// i16 负向偏移
    JumpBack,

    Print,
    Return,
}

impl OpCode {
    const ALL: [OpCode; 29] = [
        OpCode::Constant,
        OpCode::Null,
        OpCode::True,
        OpCode::False,
        OpCode::Pop,
        OpCode::Dup,
        OpCode::DefineGlobal,
        OpCode::GetGlobal,
        OpCode::SetGlobal,
        OpCode::GetMember,
        OpCode::Import,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Neg,
        OpCode::Not,
        OpCode::Equal,
        OpCode::NotEqual,
        OpCode::Less,
        OpCode::LessEqual,
        OpCode::Greater,
        OpCode::GreaterEqual,
        OpCode::Jump,
        OpCode::JumpIfFalse,
        OpCode::JumpBack,
        OpCode::Print,
        OpCode::Return,
    ];

    /// 操作数字节数
    pub fn operand_len(self) -> usize {
        match self {
            OpCode::Constant
            | OpCode::GetGlobal
            | OpCode::SetGlobal
            | OpCode::GetMember
            | OpCode::Import => 1,
            OpCode::DefineGlobal | OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpBack => 2,
            _ => 0,
        }
    }
}

impl TryFrom<u8> for OpCode {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        OpCode::ALL
            .get(byte as usize)
            .copied()
            .filter(|op| *op as u8 == byte)
            .ok_or(byte)
    }
}

/// 字节码块
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    /// 指令字节码
    pub code: Vec<u8>,
    /// 常量池
    pub constants: Vec<Value>,
    /// 名字表（变量名、成员名）
    pub names: Vec<String>,
    /// 行号信息（与 code 一一对应）
    pub lines: Vec<usize>,
}

impl Chunk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_op(&mut self, op: OpCode, line: usize) {
        self.code.push(op as u8);
        self.lines.push(line);
    }

    pub fn write_op_u8(&mut self, op: OpCode, operand: u8, line: usize) {
        self.write_op(op, line);
        self.code.push(operand);
        self.lines.push(line);
    }

    pub fn write_op_u8_u8(&mut self, op: OpCode, a: u8, b: u8, line: usize) {
        self.write_op_u8(op, a, line);
        self.code.push(b);
        self.lines.push(line);
    }

    fn write_i16(&mut self, value: i16, line: usize) {
        let bytes = value.to_le_bytes();
        self.code.extend_from_slice(&bytes);
        self.lines.push(line);
        self.lines.push(line);
    }

    /// 写入跳转指令（占位，稍后 patch），返回操作数位置
    pub fn write_jump(&mut self, op: OpCode, line: usize) -> usize {
        self.write_op(op, line);
        let offset = self.code.len();
        self.write_i16(-1, line);
        offset
    }

    /// 让 `offset` 处的跳转指向当前位置；距离超出 i16 时返回 None
    pub fn patch_jump(&mut self, offset: usize) -> Option<()> {
        // 执行跳转时 ip 已指向操作数之后
        let jump = i16::try_from(self.code.len() - (offset + 2)).ok()?;
        let bytes = jump.to_le_bytes();
        self.code[offset] = bytes[0];
        self.code[offset + 1] = bytes[1];
        Some(())
    }

    /// 写入回跳到 `loop_start` 的指令
    pub fn write_loop(&mut self, loop_start: usize, line: usize) -> Option<()> {
        self.write_op(OpCode::JumpBack, line);
        let distance = self.code.len() + 2 - loop_start;
        let jump = i16::try_from(distance).ok()?;
        self.write_i16(-jump, line);
        Some(())
    }

    /// 添加常量，返回索引
    pub fn add_constant(&mut self, value: Value) -> Option<u8> {
        let index = u8::try_from(self.constants.len()).ok()?;
        self.constants.push(value);
        Some(index)
    }

    /// 添加名字（去重），返回索引
    pub fn add_name(&mut self, name: &str) -> Option<u8> {
        if let Some(index) = self.names.iter().position(|n| n == name) {
            return u8::try_from(index).ok();
        }
        let index = u8::try_from(self.names.len()).ok()?;
        self.names.push(name.to_string());
        Some(index)
    }

    pub fn line_at(&self, offset: usize) -> usize {
        self.lines.get(offset).copied().unwrap_or(0)
    }

    /// 反汇编，用于调试输出
    pub fn disassemble(&self, title: &str) -> String {
        let mut out = format!("== {title} ==\n");
        let mut offset = 0;
        while offset < self.code.len() {
            let byte = self.code[offset];
            let Ok(op) = OpCode::try_from(byte) else {
                let _ = writeln!(out, "{offset:04} ???? {byte}");
                offset += 1;
                continue;
            };
            let operands = &self.code[(offset + 1).min(self.code.len())
                ..(offset + 1 + op.operand_len()).min(self.code.len())];
            let detail = match (op, operands) {
                (OpCode::Constant, [i]) => format!(" {}", self.constant_repr(*i)),
                (OpCode::GetGlobal | OpCode::SetGlobal | OpCode::GetMember, [i]) => {
                    format!(" {}", self.name_repr(*i))
                }
                (OpCode::DefineGlobal, [i, flags]) => {
                    format!(" {}{}", self.name_repr(*i), if *flags & 1 == 1 { " pub" } else { "" })
                }
                (OpCode::Import, [i]) => format!(" #{i}"),
                (OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpBack, [a, b]) => {
                    format!(" {}", i16::from_le_bytes([*a, *b]))
                }
                _ => String::new(),
            };
            let _ = writeln!(out, "{offset:04} {:>4} {op:?}{detail}", self.line_at(offset));
            offset += 1 + op.operand_len();
        }
        out
    }

    fn constant_repr(&self, index: u8) -> String {
        match self.constants.get(index as usize) {
            Some(Value::Str(s)) => format!("{s:?}"),
            Some(value) => value.to_string(),
            None => format!("<const {index}?>"),
        }
    }

    fn name_repr(&self, index: u8) -> String {
        self.names
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| format!("<name {index}?>"))
    }
}

/// 被导入模块编译后的代码
#[derive(Debug, Clone)]
pub struct ModuleChunk {
    /// 点分模块名
    pub name: String,
    pub chunk: Chunk,
}

/// 一个脚本及其全部导入模块的字节码
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub entry: Chunk,
    /// 按依赖顺序排列，`Import` 指令按索引引用
    pub modules: Vec<ModuleChunk>,
}

impl Program {
    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|m| m.name.as_str())
    }
}
