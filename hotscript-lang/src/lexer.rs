//! 词法分析器
//!
//! 逐字符扫描源代码，产生带坐标的 token 序列。空白与 `//` 注释被丢弃。

use crate::error::{CompileError, Coordinate, LexerErrorKind};

/// Token 类型
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // 关键字
    Var,
    Pub,
    Import,
    As,
    If,
    Else,
    While,
    Return,
    Print,
    True,
    False,
    Null,
    And,
    Or,
    Not,

    // 字面量
    Integer(i64),
    Float(f64),
    Str(String),
    Identifier(String),

    // 双字符符号
    DoubleEqual,
    ExclamationEqual,
    GreaterThanEqual,
    LessThanEqual,

    // 单字符符号
    GreaterThan,
    LessThan,
    Plus,
    Minus,
    Asterisk,
    Slash,
    Percent,
    Equal,
    Semicolon,
    Dot,
    LeftParenthesis,
    RightParenthesis,
    LeftCurlyBrace,
    RightCurlyBrace,

    Eof,
}

impl TokenKind {
    /// 用于错误消息的描述
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Integer(v) => format!("integer {v}"),
            TokenKind::Float(v) => format!("float {v}"),
            TokenKind::Str(_) => "string literal".to_string(),
            TokenKind::Identifier(name) => format!("identifier '{name}'"),
            TokenKind::Eof => "end of input".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            TokenKind::Var => "var",
            TokenKind::Pub => "pub",
            TokenKind::Import => "import",
            TokenKind::As => "as",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Return => "return",
            TokenKind::Print => "print",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Null => "null",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Not => "not",
            TokenKind::DoubleEqual => "==",
            TokenKind::ExclamationEqual => "!=",
            TokenKind::GreaterThanEqual => ">=",
            TokenKind::LessThanEqual => "<=",
            TokenKind::GreaterThan => ">",
            TokenKind::LessThan => "<",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Asterisk => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Equal => "=",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::LeftParenthesis => "(",
            TokenKind::RightParenthesis => ")",
            TokenKind::LeftCurlyBrace => "{",
            TokenKind::RightCurlyBrace => "}",
            TokenKind::Integer(_)
            | TokenKind::Float(_)
            | TokenKind::Str(_)
            | TokenKind::Identifier(_)
            | TokenKind::Eof => "",
        }
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "var" => TokenKind::Var,
        "pub" => TokenKind::Pub,
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "return" => TokenKind::Return,
        "print" => TokenKind::Print,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        _ => return None,
    };
    Some(kind)
}

/// 带位置的 token
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub coordinate: Coordinate,
}

/// 词法分析器
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    /// 扫描全部输入，末尾追加 `Eof`
    pub fn tokenize(mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.line, self.column)
    }

    fn skip_trivia(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else if c == '/' && self.lookahead_is('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            } else {
                break;
            }
        }
    }

    /// 当前字符之后的一个字符是否为 `expected`
    fn lookahead_is(&self, expected: char) -> bool {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next() == Some(expected)
    }

    fn next_token(&mut self) -> Result<Token, CompileError> {
        self.skip_trivia();
        let coordinate = self.coordinate();
        let Some(c) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                coordinate,
            });
        };

        let kind = match c {
            '(' => TokenKind::LeftParenthesis,
            ')' => TokenKind::RightParenthesis,
            '{' => TokenKind::LeftCurlyBrace,
            '}' => TokenKind::RightCurlyBrace,
            ';' => TokenKind::Semicolon,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Asterisk,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => self.either('=', TokenKind::DoubleEqual, TokenKind::Equal),
            '>' => self.either('=', TokenKind::GreaterThanEqual, TokenKind::GreaterThan),
            '<' => self.either('=', TokenKind::LessThanEqual, TokenKind::LessThan),
            '!' if self.peek() == Some('=') => {
                self.bump();
                TokenKind::ExclamationEqual
            }
            '"' => self.string(coordinate)?,
            c if c.is_ascii_digit() => self.number(c, coordinate)?,
            c if c.is_alphabetic() || c == '_' => self.word(c),
            other => {
                return Err(CompileError::Lexer {
                    kind: LexerErrorKind::UnexpectedChar(other),
                    coordinate,
                })
            }
        };

        Ok(Token { kind, coordinate })
    }

    fn either(&mut self, next: char, matched: TokenKind, single: TokenKind) -> TokenKind {
        if self.peek() == Some(next) {
            self.bump();
            matched
        } else {
            single
        }
    }

    fn string(&mut self, start: Coordinate) -> Result<TokenKind, CompileError> {
        let mut value = String::new();
        loop {
            let escape_at = self.coordinate();
            match self.bump() {
                None | Some('\n') => {
                    return Err(CompileError::Lexer {
                        kind: LexerErrorKind::UnterminatedString,
                        coordinate: start,
                    })
                }
                Some('"') => return Ok(TokenKind::Str(value)),
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some('"') => '"',
                        Some('\\') => '\\',
                        Some(other) => {
                            return Err(CompileError::Lexer {
                                kind: LexerErrorKind::InvalidEscape(other),
                                coordinate: escape_at,
                            })
                        }
                        None => {
                            return Err(CompileError::Lexer {
                                kind: LexerErrorKind::UnterminatedString,
                                coordinate: start,
                            })
                        }
                    };
                    value.push(escaped);
                }
                Some(c) => value.push(c),
            }
        }
    }

    fn number(&mut self, first: char, start: Coordinate) -> Result<TokenKind, CompileError> {
        let mut text = String::from(first);
        while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
            text.push(c);
            self.bump();
        }

        // 小数点后必须跟数字，否则是成员访问
        let is_float = self.peek() == Some('.')
            && self
                .chars
                .clone()
                .nth(1)
                .is_some_and(|c| c.is_ascii_digit());
        if is_float {
            text.push('.');
            self.bump();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_digit()) {
                text.push(c);
                self.bump();
            }
        }

        let invalid = |text: String| CompileError::Lexer {
            kind: LexerErrorKind::InvalidNumber(text),
            coordinate: start,
        };
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| invalid(text.clone()))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Integer)
                .map_err(|_| invalid(text.clone()))
        }
    }

    fn word(&mut self, first: char) -> TokenKind {
        let mut text = String::from(first);
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            text.push(c);
            self.bump();
        }
        keyword(&text).unwrap_or(TokenKind::Identifier(text))
    }
}

/// 便捷函数：对整段源代码做词法分析
pub fn tokenize(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).tokenize()
}
