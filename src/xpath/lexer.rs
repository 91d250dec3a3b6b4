//! XPath tokenizer.
//!
//! Applies the XPath 1.0 lexical disambiguation rule: when the previous
//! token can end an operand, `*` is multiplication and `and`/`or`/`div`/`mod`
//! are operators; otherwise they are a wildcard and element names.

use crate::xpath::errors::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Slash,
    DoubleSlash,
    Dot,
    DoubleDot,
    At,
    Pipe,
    Plus,
    Minus,
    Multiply,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Mod,
    Div,
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    DoubleColon,
    Dollar,
    Number(f64),
    Literal(String),
    /// NCName or `prefix:local`, as written
    Name(String),
    /// `*` (None) or `prefix:*`
    Wildcard(Option<String>),
    /// `node`, `text`, `comment`, `processing-instruction` before `(`
    NodeType(String),
    FunctionName(String),
    AxisName(String),
}

impl Token {
    /// Whether a token in this position means the next `*` or keyword-like
    /// name is an operator.
    fn ends_operand(&self) -> bool {
        !matches!(
            self,
            Token::At
                | Token::DoubleColon
                | Token::LeftParen
                | Token::LeftBracket
                | Token::Comma
                | Token::And
                | Token::Or
                | Token::Mod
                | Token::Div
                | Token::Multiply
                | Token::Slash
                | Token::DoubleSlash
                | Token::Pipe
                | Token::Plus
                | Token::Minus
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::LtEq
                | Token::Gt
                | Token::GtEq
                | Token::Dollar
        )
    }
}

pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, XPathError> {
        loop {
            self.skip_whitespace();
            let Some(c) = self.peek() else {
                break;
            };
            let token = self.next_token(c)?;
            self.tokens.push(token);
        }
        Ok(self.tokens)
    }

    fn next_token(&mut self, c: char) -> Result<Token, XPathError> {
        let token = match c {
            '/' => {
                self.advance(1);
                if self.eat('/') {
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '.' => {
                if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
                    return Ok(self.read_number());
                }
                self.advance(1);
                if self.eat('.') {
                    Token::DoubleDot
                } else {
                    Token::Dot
                }
            }
            '@' => self.single(Token::At),
            '|' => self.single(Token::Pipe),
            '+' => self.single(Token::Plus),
            '-' => self.single(Token::Minus),
            '=' => self.single(Token::Eq),
            '(' => self.single(Token::LeftParen),
            ')' => self.single(Token::RightParen),
            '[' => self.single(Token::LeftBracket),
            ']' => self.single(Token::RightBracket),
            ',' => self.single(Token::Comma),
            '$' => self.single(Token::Dollar),
            '*' => {
                self.advance(1);
                if self.operator_position() {
                    Token::Multiply
                } else {
                    Token::Wildcard(None)
                }
            }
            '!' => {
                self.advance(1);
                if !self.eat('=') {
                    return Err(self.error("expected '=' after '!'"));
                }
                Token::NotEq
            }
            '<' => {
                self.advance(1);
                if self.eat('=') {
                    Token::LtEq
                } else {
                    Token::Lt
                }
            }
            '>' => {
                self.advance(1);
                if self.eat('=') {
                    Token::GtEq
                } else {
                    Token::Gt
                }
            }
            ':' => {
                self.advance(1);
                if !self.eat(':') {
                    return Err(self.error("unexpected ':'"));
                }
                Token::DoubleColon
            }
            '"' | '\'' => self.read_literal(c)?,
            '0'..='9' => self.read_number(),
            _ if is_name_start_char(c) => self.read_name(),
            _ => return Err(self.error(&format!("unexpected character '{c}'"))),
        };
        Ok(token)
    }

    fn operator_position(&self) -> bool {
        self.tokens.last().is_some_and(Token::ends_operand)
    }

    fn read_name(&mut self) -> Token {
        let name = self.read_ncname();

        if self.operator_position() {
            match name {
                "and" => return Token::And,
                "or" => return Token::Or,
                "mod" => return Token::Mod,
                "div" => return Token::Div,
                _ => {}
            }
        }

        // prefix:local or prefix:*, but not axis::
        if self.peek() == Some(':') && self.peek_at(1) != Some(':') {
            if self.peek_at(1) == Some('*') {
                self.advance(2);
                return Token::Wildcard(Some(name.to_string()));
            }
            if self.peek_at(1).is_some_and(is_name_start_char) {
                self.advance(1);
                let local = self.read_ncname();
                let qname = format!("{name}:{local}");
                return if self.next_non_space() == Some('(') {
                    Token::FunctionName(qname)
                } else {
                    Token::Name(qname)
                };
            }
        }

        let rest = self.input[self.pos..].trim_start();
        if rest.starts_with("::") {
            return Token::AxisName(name.to_string());
        }
        if rest.starts_with('(') {
            return match name {
                "node" | "text" | "comment" | "processing-instruction" => {
                    Token::NodeType(name.to_string())
                }
                _ => Token::FunctionName(name.to_string()),
            };
        }
        Token::Name(name.to_string())
    }

    fn read_ncname(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_name_char(c) {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
        &self.input[start..self.pos]
    }

    fn read_number(&mut self) -> Token {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance(1);
        }
        if self.peek() == Some('.') {
            self.advance(1);
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance(1);
            }
        }
        Token::Number(self.input[start..self.pos].parse().unwrap_or(f64::NAN))
    }

    fn read_literal(&mut self, quote: char) -> Result<Token, XPathError> {
        self.advance(1);
        let start = self.pos;
        let len = self.input[start..]
            .find(quote)
            .ok_or_else(|| self.error("unterminated string literal"))?;
        self.pos = start + len + 1;
        Ok(Token::Literal(self.input[start..start + len].to_string()))
    }

    fn single(&mut self, token: Token) -> Token {
        self.advance(1);
        token
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(n)
    }

    fn next_non_space(&self) -> Option<char> {
        self.input[self.pos..].trim_start().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.advance(c.len_utf8());
            true
        } else {
            false
        }
    }

    fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.advance(c.len_utf8());
            } else {
                break;
            }
        }
    }

    fn error(&self, message: &str) -> XPathError {
        XPathError::Syntax {
            expr: self.input.to_string(),
            message: format!("{message} at offset {}", self.pos),
        }
    }
}

fn is_name_start_char(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

pub fn tokenize(input: &str) -> Result<Vec<Token>, XPathError> {
    Lexer::new(input).tokenize()
}
