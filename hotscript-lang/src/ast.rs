//! 语法树定义

use crate::error::Coordinate;

pub type Expr = Box<ExprKind>;

/// 表达式
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    LiteralInt(i64),
    LiteralFloat(f64),
    LiteralString(String),
    LiteralBool(bool),
    LiteralNull,
    /// 变量引用
    VarRef { name: String, line: usize },
    /// 成员访问（如 `math.pi`）
    MemberAccess {
        object: Expr,
        member: String,
        line: usize,
    },
    Unary {
        op: UnaryOp,
        operand: Expr,
        line: usize,
    },
    Binary {
        op: BinaryOp,
        left: Expr,
        right: Expr,
        line: usize,
    },
    /// 短路逻辑运算
    Logical {
        op: LogicalOp,
        left: Expr,
        right: Expr,
        line: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

pub type Stmt = Box<StmtKind>;

/// 语句
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `import a.b [as x];`
    Import(ImportStmt),
    /// `[pub] var x = expr;`
    VarDecl {
        name: String,
        initializer: Expr,
        is_public: bool,
        line: usize,
    },
    /// `x = expr;`
    Assign {
        name: String,
        value: Expr,
        line: usize,
    },
    /// 表达式语句
    Expr { expression: Expr, line: usize },
    Print { value: Expr, line: usize },
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Option<Vec<Stmt>>,
        line: usize,
    },
    While {
        condition: Expr,
        body: Vec<Stmt>,
        line: usize,
    },
    Return { value: Option<Expr>, line: usize },
}

impl StmtKind {
    /// 语句起始行
    pub fn line(&self) -> usize {
        match self {
            StmtKind::Import(import) => import.coordinate.line,
            StmtKind::VarDecl { line, .. }
            | StmtKind::Assign { line, .. }
            | StmtKind::Expr { line, .. }
            | StmtKind::Print { line, .. }
            | StmtKind::If { line, .. }
            | StmtKind::While { line, .. }
            | StmtKind::Return { line, .. } => *line,
        }
    }
}

/// 导入语句
#[derive(Debug, Clone, PartialEq)]
pub struct ImportStmt {
    /// 点分模块路径，如 `pkg.util`
    pub module: String,
    /// 绑定到当前作用域的名字：别名或路径最后一段
    pub binding: String,
    pub coordinate: Coordinate,
}

/// 一个源文件的语法树
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Module {
    pub statements: Vec<Stmt>,
}

impl Module {
    /// 顶层 import 语句
    pub fn imports(&self) -> impl Iterator<Item = &ImportStmt> {
        self.statements.iter().filter_map(|stmt| match stmt.as_ref() {
            StmtKind::Import(import) => Some(import),
            _ => None,
        })
    }
}
