//! 递归下降语法分析器
//!
//! 优先级（从低到高）：or, and, 相等, 比较, 加减, 乘除模, 一元, 成员访问, 基本表达式

use crate::ast::{
    BinaryOp, Expr, ExprKind, ImportStmt, LogicalOp, Module, Stmt, StmtKind, UnaryOp,
};
use crate::error::{CompileError, Coordinate, ParserErrorKind};
use crate::lexer::{tokenize, Token, TokenKind};

type ParseResult<T> = Result<T, CompileError>;

/// 括号、一元运算、代码块和运算符链的总嵌套上限
pub const MAX_NESTING: usize = 256;

/// 解析入口脚本或被导入模块
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    /// 被导入模块不允许 return
    is_module: bool,
    depth: usize,
}

impl Parser {
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let coordinate = tokens.last().map(|t| t.coordinate).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                coordinate,
            });
        }
        Self {
            tokens,
            current: 0,
            is_module: false,
            depth: 0,
        }
    }

    /// 按被导入模块的规则解析
    pub fn for_module(tokens: Vec<Token>) -> Self {
        Self {
            is_module: true,
            ..Self::new(tokens)
        }
    }

    pub fn parse(mut self) -> ParseResult<Module> {
        let mut statements = Vec::new();
        while !self.check(&TokenKind::Eof) {
            statements.push(self.statement(true)?);
        }
        Ok(Module { statements })
    }

    // ==================== token 工具 ====================

    fn peek(&self) -> &Token {
        // new() 保证以 Eof 结尾
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.current += 1;
        }
        token
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn matches(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn error_here(&self, expected: &str) -> CompileError {
        let token = self.peek();
        let kind = if token.kind == TokenKind::Eof {
            ParserErrorKind::UnexpectedEndOfInput {
                expected: expected.to_string(),
            }
        } else {
            ParserErrorKind::UnexpectedToken {
                found: token.kind.describe(),
                expected: expected.to_string(),
            }
        };
        CompileError::Parser {
            kind,
            coordinate: token.coordinate,
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> ParseResult<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error_here(expected))
        }
    }

    fn identifier(&mut self, expected: &str) -> ParseResult<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.error_here(expected)),
        }
    }

    /// 进入一层嵌套，超过上限时报错
    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(CompileError::Parser {
                kind: ParserErrorKind::NestingTooDeep { limit: MAX_NESTING },
                coordinate: self.peek().coordinate,
            });
        }
        Ok(())
    }

    fn leave(&mut self, levels: usize) {
        self.depth = self.depth.saturating_sub(levels);
    }

    fn semicolon(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Semicolon, "';'").map(|_| ())
    }

    // ==================== 语句 ====================

    fn statement(&mut self, top_level: bool) -> ParseResult<Stmt> {
        let token = self.peek().clone();
        let line = token.coordinate.line;

        match token.kind {
            TokenKind::Import => {
                if !top_level {
                    return Err(CompileError::Parser {
                        kind: ParserErrorKind::NestedImport,
                        coordinate: token.coordinate,
                    });
                }
                self.advance();
                self.import(token.coordinate)
            }
            TokenKind::Pub => {
                self.advance();
                self.expect(&TokenKind::Var, "'var' after 'pub'")?;
                self.var_decl(true, line)
            }
            TokenKind::Var => {
                self.advance();
                self.var_decl(false, line)
            }
            TokenKind::Print => {
                self.advance();
                let value = self.expression()?;
                self.semicolon()?;
                Ok(Box::new(StmtKind::Print { value, line }))
            }
            TokenKind::If => {
                self.advance();
                self.if_stmt(line)
            }
            TokenKind::While => {
                self.advance();
                let condition = self.condition()?;
                let body = self.block()?;
                Ok(Box::new(StmtKind::While {
                    condition,
                    body,
                    line,
                }))
            }
            TokenKind::Return => {
                if self.is_module {
                    return Err(CompileError::Parser {
                        kind: ParserErrorKind::ReturnInModule,
                        coordinate: token.coordinate,
                    });
                }
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) {
                    None
                } else {
                    Some(self.expression()?)
                };
                self.semicolon()?;
                Ok(Box::new(StmtKind::Return { value, line }))
            }
            _ => self.expression_statement(token.coordinate),
        }
    }

    fn import(&mut self, coordinate: Coordinate) -> ParseResult<Stmt> {
        let mut segments = vec![self.identifier("module name")?];
        while self.matches(&TokenKind::Dot) {
            segments.push(self.identifier("module name after '.'")?);
        }
        let binding = if self.matches(&TokenKind::As) {
            self.identifier("alias after 'as'")?
        } else {
            segments.last().cloned().unwrap_or_default()
        };
        self.semicolon()?;

        Ok(Box::new(StmtKind::Import(ImportStmt {
            module: segments.join("."),
            binding,
            coordinate,
        })))
    }

    fn var_decl(&mut self, is_public: bool, line: usize) -> ParseResult<Stmt> {
        let name = self.identifier("variable name")?;
        let initializer = if self.matches(&TokenKind::Equal) {
            self.expression()?
        } else {
            Box::new(ExprKind::LiteralNull)
        };
        self.semicolon()?;
        Ok(Box::new(StmtKind::VarDecl {
            name,
            initializer,
            is_public,
            line,
        }))
    }

    fn if_stmt(&mut self, line: usize) -> ParseResult<Stmt> {
        let condition = self.condition()?;
        let then_branch = self.block()?;
        let else_branch = if self.matches(&TokenKind::Else) {
            if self.check(&TokenKind::If) {
                let nested_line = self.advance().coordinate.line;
                self.enter()?;
                let nested = self.if_stmt(nested_line)?;
                self.leave(1);
                Some(vec![nested])
            } else {
                Some(self.block()?)
            }
        } else {
            None
        };
        Ok(Box::new(StmtKind::If {
            condition,
            then_branch,
            else_branch,
            line,
        }))
    }

    /// `( expr )`
    fn condition(&mut self) -> ParseResult<Expr> {
        self.expect(&TokenKind::LeftParenthesis, "'('")?;
        let condition = self.expression()?;
        self.expect(&TokenKind::RightParenthesis, "')'")?;
        Ok(condition)
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect(&TokenKind::LeftCurlyBrace, "'{'")?;
        self.enter()?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RightCurlyBrace) {
            if self.check(&TokenKind::Eof) {
                return Err(self.error_here("'}'"));
            }
            statements.push(self.statement(false)?);
        }
        self.advance();
        self.leave(1);
        Ok(statements)
    }

    fn expression_statement(&mut self, start: Coordinate) -> ParseResult<Stmt> {
        let expression = self.expression()?;
        let line = start.line;

        if self.matches(&TokenKind::Equal) {
            let ExprKind::VarRef { name, .. } = *expression else {
                return Err(CompileError::Parser {
                    kind: ParserErrorKind::InvalidAssignmentTarget,
                    coordinate: start,
                });
            };
            let value = self.expression()?;
            self.semicolon()?;
            return Ok(Box::new(StmtKind::Assign { name, value, line }));
        }

        self.semicolon()?;
        Ok(Box::new(StmtKind::Expr { expression, line }))
    }

    // ==================== 表达式 ====================

    pub fn expression(&mut self) -> ParseResult<Expr> {
        self.or()
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut left = self.and()?;
        let mut levels = 0;
        while self.check(&TokenKind::Or) {
            let line = self.advance().coordinate.line;
            self.enter()?;
            levels += 1;
            let right = self.and()?;
            left = Box::new(ExprKind::Logical {
                op: LogicalOp::Or,
                left,
                right,
                line,
            });
        }
        self.leave(levels);
        Ok(left)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut left = self.equality()?;
        let mut levels = 0;
        while self.check(&TokenKind::And) {
            let line = self.advance().coordinate.line;
            self.enter()?;
            levels += 1;
            let right = self.equality()?;
            left = Box::new(ExprKind::Logical {
                op: LogicalOp::And,
                left,
                right,
                line,
            });
        }
        self.leave(levels);
        Ok(left)
    }

    /// 左结合的二元运算层
    fn binary_level(
        &mut self,
        operators: &[(TokenKind, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let mut left = next(self)?;
        let mut levels = 0;
        'outer: loop {
            for (kind, op) in operators {
                if self.check(kind) {
                    let line = self.advance().coordinate.line;
                    self.enter()?;
                    levels += 1;
                    let right = next(self)?;
                    left = Box::new(ExprKind::Binary {
                        op: *op,
                        left,
                        right,
                        line,
                    });
                    continue 'outer;
                }
            }
            self.leave(levels);
            return Ok(left);
        }
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::DoubleEqual, BinaryOp::Equal),
                (TokenKind::ExclamationEqual, BinaryOp::NotEqual),
            ],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::LessThan, BinaryOp::Less),
                (TokenKind::LessThanEqual, BinaryOp::LessEqual),
                (TokenKind::GreaterThan, BinaryOp::Greater),
                (TokenKind::GreaterThanEqual, BinaryOp::GreaterEqual),
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Plus, BinaryOp::Add),
                (TokenKind::Minus, BinaryOp::Sub),
            ],
            Self::factor,
        )
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        self.binary_level(
            &[
                (TokenKind::Asterisk, BinaryOp::Mul),
                (TokenKind::Slash, BinaryOp::Div),
                (TokenKind::Percent, BinaryOp::Mod),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Not => UnaryOp::Not,
            _ => return self.member(),
        };
        let line = self.advance().coordinate.line;
        self.enter()?;
        let operand = self.unary()?;
        self.leave(1);
        Ok(Box::new(ExprKind::Unary { op, operand, line }))
    }

    fn member(&mut self) -> ParseResult<Expr> {
        let mut object = self.primary()?;
        let mut levels = 0;
        while self.check(&TokenKind::Dot) {
            let line = self.advance().coordinate.line;
            self.enter()?;
            levels += 1;
            let member = self.identifier("member name after '.'")?;
            object = Box::new(ExprKind::MemberAccess {
                object,
                member,
                line,
            });
        }
        self.leave(levels);
        Ok(object)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let expr = match token.kind {
            TokenKind::Integer(value) => ExprKind::LiteralInt(value),
            TokenKind::Float(value) => ExprKind::LiteralFloat(value),
            TokenKind::Str(value) => ExprKind::LiteralString(value),
            TokenKind::True => ExprKind::LiteralBool(true),
            TokenKind::False => ExprKind::LiteralBool(false),
            TokenKind::Null => ExprKind::LiteralNull,
            TokenKind::Identifier(name) => ExprKind::VarRef {
                name,
                line: token.coordinate.line,
            },
            TokenKind::LeftParenthesis => {
                self.advance();
                self.enter()?;
                let inner = self.expression()?;
                self.expect(&TokenKind::RightParenthesis, "')'")?;
                self.leave(1);
                return Ok(inner);
            }
            _ => return Err(self.error_here("expression")),
        };
        self.advance();
        Ok(Box::new(expr))
    }
}

/// 解析入口脚本
pub fn parse(source: &str) -> ParseResult<Module> {
    Parser::new(tokenize(source)?).parse()
}

/// 解析被导入的模块
pub fn parse_module(source: &str) -> ParseResult<Module> {
    Parser::for_module(tokenize(source)?).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(source: &str) -> Module {
        parse(source).unwrap()
    }

    fn parse_err(source: &str) -> CompileError {
        parse(source).unwrap_err()
    }

    #[test]
    fn test_precedence() {
        let module = parse_ok("return 1 + 2 * 3;");
        let StmtKind::Return { value: Some(expr), .. } = module.statements[0].as_ref() else {
            panic!("expected return");
        };
        match expr.as_ref() {
            ExprKind::Binary {
                op: BinaryOp::Add,
                right,
                ..
            } => assert!(matches!(
                right.as_ref(),
                ExprKind::Binary {
                    op: BinaryOp::Mul,
                    ..
                }
            )),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_import_forms() {
        let module = parse_ok("import util; import pkg.math as m;");
        let imports: Vec<_> = module.imports().collect();
        assert_eq!(imports.len(), 2);
        assert_eq!(imports[0].module, "util");
        assert_eq!(imports[0].binding, "util");
        assert_eq!(imports[1].module, "pkg.math");
        assert_eq!(imports[1].binding, "m");
        assert_eq!(imports[1].coordinate, Coordinate::new(1, 14));
    }

    #[test]
    fn test_member_chain_and_logic() {
        let module = parse_ok("print a.b.c or not x and y;");
        let StmtKind::Print { value, .. } = module.statements[0].as_ref() else {
            panic!("expected print");
        };
        assert!(matches!(
            value.as_ref(),
            ExprKind::Logical {
                op: LogicalOp::Or,
                ..
            }
        ));
    }

    #[test]
    fn test_if_else_if_chain() {
        let module = parse_ok("if (a) { x = 1; } else if (b) { x = 2; } else { x = 3; }");
        let StmtKind::If { else_branch, .. } = module.statements[0].as_ref() else {
            panic!("expected if");
        };
        let nested = else_branch.as_ref().unwrap();
        assert!(matches!(
            nested[0].as_ref(),
            StmtKind::If {
                else_branch: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_var_without_initializer() {
        let module = parse_ok("var x;");
        assert!(matches!(
            module.statements[0].as_ref(),
            StmtKind::VarDecl { initializer, is_public: false, .. }
                if **initializer == ExprKind::LiteralNull
        ));
    }

    #[test]
    fn test_missing_semicolon() {
        let err = parse_err("var x = 1\nvar y = 2;");
        match err {
            CompileError::Parser {
                kind: ParserErrorKind::UnexpectedToken { expected, .. },
                coordinate,
            } => {
                assert_eq!(expected, "';'");
                assert_eq!(coordinate, Coordinate::new(2, 1));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_invalid_assignment_target() {
        let err = parse_err("a.b = 3;");
        assert!(matches!(
            err,
            CompileError::Parser {
                kind: ParserErrorKind::InvalidAssignmentTarget,
                ..
            }
        ));
    }

    #[test]
    fn test_nested_import_rejected() {
        let err = parse_err("if (true) { import util; }");
        assert!(matches!(
            err,
            CompileError::Parser {
                kind: ParserErrorKind::NestedImport,
                ..
            }
        ));
    }

    #[test]
    fn test_module_rejects_return() {
        let err = parse_module("pub var x = 1; return x;").unwrap_err();
        assert!(matches!(
            err,
            CompileError::Parser {
                kind: ParserErrorKind::ReturnInModule,
                ..
            }
        ));
    }

    #[test]
    fn test_deep_parentheses_rejected() {
        let source = format!("return {}1{};", "(".repeat(50_000), ")".repeat(50_000));
        let err = parse_err(&source);
        assert!(matches!(
            err,
            CompileError::Parser {
                kind: ParserErrorKind::NestingTooDeep { limit: MAX_NESTING },
                ..
            }
        ));
    }

    #[test]
    fn test_deep_unary_blocks_and_chains_rejected() {
        let unary = format!("return {}1;", "-".repeat(50_000));
        let blocks = format!("{}{}", "while (true) {".repeat(50_000), "}".repeat(50_000));
        let chain = format!("return 1{};", " + 1".repeat(50_000));
        for source in [unary, blocks, chain] {
            assert!(matches!(
                parse_err(&source),
                CompileError::Parser {
                    kind: ParserErrorKind::NestingTooDeep { .. },
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_nesting_within_limit_parses() {
        let depth = MAX_NESTING / 2;
        parse_ok(&format!("return {}1{};", "(".repeat(depth), ")".repeat(depth)));
        parse_ok(&format!("return 1{};", " + 1".repeat(100)));
        parse_ok("var a = 1; a = ((a)); if (a) { if (a) { print -a; } }");
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse_err("while (true) { print 1;");
        assert!(matches!(
            err,
            CompileError::Parser {
                kind: ParserErrorKind::UnexpectedEndOfInput { .. },
                ..
            }
        ));
    }
}
