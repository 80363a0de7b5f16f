//! Decoder for ground-truth call expressions.
//!
//! Recognises a single call of a bare identifier whose arguments are
//! literals:
//!
//! ```text
//! call     := IDENT '(' [arg (',' arg)* [',']] ')' EOF
//! arg      := IDENT '=' literal | literal
//! literal  := None | True | False | ['-'|'+'] NUMBER | STRING+
//!           | '[' items ']' | '(' tuple ')' | '{' dict-or-set '}'
//! ```
//!
//! Offsets in errors are byte offsets into the source text.

use std::collections::BTreeMap;

use super::literal::Literal;
use super::FunctionCall;
use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Ident(String),
    /// Unsigned magnitude; the sign is applied by the parser.
    Int(u64),
    Float(f64),
    Str(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Equals,
    Minus,
    Plus,
    Dot,
    Eof,
}

impl TokenKind {
    fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier '{}'", name),
            TokenKind::Int(i) => format!("number {}", i),
            TokenKind::Float(f) => format!("number {}", f),
            TokenKind::Str(_) => "string".to_string(),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::LBracket => "'['".to_string(),
            TokenKind::RBracket => "']'".to_string(),
            TokenKind::LBrace => "'{'".to_string(),
            TokenKind::RBrace => "'}'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Colon => "':'".to_string(),
            TokenKind::Equals => "'='".to_string(),
            TokenKind::Minus => "'-'".to_string(),
            TokenKind::Plus => "'+'".to_string(),
            TokenKind::Dot => "'.'".to_string(),
            TokenKind::Eof => "end of input".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    offset: usize,
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).map(|(_, c)| *c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.src.len())
    }

    fn tokenize(mut self) -> Result<Vec<Token>, DecodeError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek() {
            let offset = self.offset();
            let kind = match ch {
                c if c.is_whitespace() => {
                    self.pos += 1;
                    continue;
                }
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                '=' => self.single(TokenKind::Equals),
                '-' => self.single(TokenKind::Minus),
                '+' => self.single(TokenKind::Plus),
                '.' if !self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.single(TokenKind::Dot)
                }
                '\'' | '"' => self.string(ch)?,
                c if c.is_ascii_digit() || c == '.' => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.ident(),
                other => return Err(DecodeError::UnexpectedChar { ch: other, offset }),
            };
            tokens.push(Token { kind, offset });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            offset: self.src.len(),
        });
        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.pos += 1;
        kind
    }

    fn ident(&mut self) -> TokenKind {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                name.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        TokenKind::Ident(name)
    }

    fn number(&mut self) -> Result<TokenKind, DecodeError> {
        let offset = self.offset();

        if self.peek() == Some('0') {
            let radix = match self.peek_at(1) {
                Some('x') | Some('X') => Some(16),
                Some('o') | Some('O') => Some(8),
                Some('b') | Some('B') => Some(2),
                _ => None,
            };
            if let Some(radix) = radix {
                self.pos += 2;
                let mut digits = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        if c != '_' {
                            digits.push(c);
                        }
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                return u64::from_str_radix(&digits, radix)
                    .map(TokenKind::Int)
                    .map_err(|_| DecodeError::InvalidNumber {
                        text: digits,
                        offset,
                    });
            }
        }

        let mut text = String::new();
        let mut is_float = false;

        self.digits(&mut text);
        if self.peek() == Some('.') {
            is_float = true;
            text.push('.');
            self.pos += 1;
            self.digits(&mut text);
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push('e');
            self.pos += 1;
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.pos += 1;
            }
            self.digits(&mut text);
        }
        // Identifier characters glued to a number ("1j", "12abc") are not literals.
        if self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
                if let Some(c) = self.peek() {
                    text.push(c);
                }
                self.pos += 1;
            }
            return Err(DecodeError::InvalidNumber { text, offset });
        }

        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| DecodeError::InvalidNumber { text, offset })
        } else {
            text.parse::<u64>()
                .map(TokenKind::Int)
                .map_err(|_| DecodeError::InvalidNumber { text, offset })
        }
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.pos += 1;
            } else if c == '_' && self.peek_at(1).is_some_and(|n| n.is_ascii_digit()) {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<TokenKind, DecodeError> {
        let start = self.offset();
        self.pos += 1;
        let mut value = String::new();

        loop {
            let Some(c) = self.peek() else {
                return Err(DecodeError::UnterminatedString { offset: start });
            };
            self.pos += 1;
            match c {
                c if c == quote => return Ok(TokenKind::Str(value)),
                '\n' => return Err(DecodeError::UnterminatedString { offset: start }),
                '\\' => self.escape(&mut value, start)?,
                other => value.push(other),
            }
        }
    }

    fn escape(&mut self, value: &mut String, start: usize) -> Result<(), DecodeError> {
        let offset = self.offset().saturating_sub(1);
        let Some(c) = self.peek() else {
            return Err(DecodeError::UnterminatedString { offset: start });
        };
        self.pos += 1;

        match c {
            '\n' => {}
            '\\' => value.push('\\'),
            '\'' => value.push('\''),
            '"' => value.push('"'),
            'n' => value.push('\n'),
            't' => value.push('\t'),
            'r' => value.push('\r'),
            '0'..='7' => value.push(self.octal_escape(c, offset)?),
            'a' => value.push('\u{07}'),
            'b' => value.push('\u{08}'),
            'f' => value.push('\u{0C}'),
            'v' => value.push('\u{0B}'),
            'x' => value.push(self.hex_escape(2, 'x', offset)?),
            'u' => value.push(self.hex_escape(4, 'u', offset)?),
            'U' => value.push(self.hex_escape(8, 'U', offset)?),
            // Unknown escapes keep their backslash.
            other => {
                value.push('\\');
                value.push(other);
            }
        }
        Ok(())
    }

    /// Decodes `\o`, `\oo` or `\ooo` as one code point.
    fn octal_escape(&mut self, first: char, offset: usize) -> Result<char, DecodeError> {
        let mut octal = String::from(first);
        while octal.len() < 3 {
            match self.peek() {
                Some(c @ '0'..='7') => {
                    octal.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        u32::from_str_radix(&octal, 8)
            .ok()
            .and_then(char::from_u32)
            .ok_or(DecodeError::InvalidEscape {
                sequence: octal,
                offset,
            })
    }

    fn hex_escape(&mut self, len: usize, prefix: char, offset: usize) -> Result<char, DecodeError> {
        let mut hex = String::new();
        for _ in 0..len {
            match self.peek() {
                Some(c) if c.is_ascii_hexdigit() => {
                    hex.push(c);
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let invalid = || DecodeError::InvalidEscape {
            sequence: format!("{}{}", prefix, hex),
            offset,
        };
        if hex.len() != len {
            return Err(invalid());
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(invalid)
    }
}

/// Applies a sign to an integer magnitude, rejecting values outside `i64`.
fn signed_int(magnitude: u64, negative: bool, offset: usize) -> Result<Literal, DecodeError> {
    let value = if negative {
        -i128::from(magnitude)
    } else {
        i128::from(magnitude)
    };
    i64::try_from(value)
        .map(Literal::Int)
        .map_err(|_| DecodeError::InvalidNumber {
            text: format!("{}{}", if negative { "-" } else { "" }, magnitude),
            offset,
        })
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, ahead: usize) -> &TokenKind {
        let idx = (self.pos + ahead).min(self.tokens.len() - 1);
        &self.tokens[idx].kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &str) -> DecodeError {
        let token = self.peek();
        DecodeError::UnexpectedToken {
            expected: expected.to_string(),
            found: token.kind.describe(),
            offset: token.offset,
        }
    }

    fn call(&mut self) -> Result<FunctionCall, DecodeError> {
        let name = match self.advance().kind {
            TokenKind::Ident(name) => name,
            _ => return Err(DecodeError::NotACall),
        };

        match self.peek().kind {
            TokenKind::LParen => {
                self.advance();
            }
            TokenKind::Dot => return Err(DecodeError::UnnamedCallee),
            _ => return Err(DecodeError::NotACall),
        }

        let mut keywords: BTreeMap<String, Literal> = BTreeMap::new();
        let mut positional: Vec<Literal> = Vec::new();

        loop {
            if self.peek().kind == TokenKind::RParen {
                self.advance();
                break;
            }

            let is_keyword = matches!(self.peek().kind, TokenKind::Ident(_))
                && *self.peek_kind_at(1) == TokenKind::Equals;

            if is_keyword {
                let TokenKind::Ident(key) = self.advance().kind else {
                    unreachable!("keyword argument starts with an identifier");
                };
                self.advance();
                let value = self.literal()?;
                if keywords.contains_key(&key) {
                    return Err(DecodeError::DuplicateKeyword(key));
                }
                keywords.insert(key, value);
            } else {
                if !keywords.is_empty() {
                    return Err(DecodeError::PositionalAfterKeyword {
                        offset: self.peek().offset,
                    });
                }
                positional.push(self.literal()?);
            }

            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RParen => {}
                _ => return Err(self.unexpected("',' or ')'")),
            }
        }

        if self.peek().kind != TokenKind::Eof {
            return Err(DecodeError::TrailingInput {
                offset: self.peek().offset,
            });
        }

        let mut args = keywords;
        for (idx, value) in positional.into_iter().enumerate() {
            args.insert(format!("arg{}", idx + 1), value);
        }

        Ok(FunctionCall { name, args })
    }

    fn literal(&mut self) -> Result<Literal, DecodeError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Ident(name) => match name.as_str() {
                "None" => Ok(Literal::None),
                "True" => Ok(Literal::Bool(true)),
                "False" => Ok(Literal::Bool(false)),
                _ => Err(DecodeError::NonLiteralArgument {
                    offset: token.offset,
                }),
            },
            TokenKind::Int(magnitude) => signed_int(magnitude, false, token.offset),
            TokenKind::Float(f) => Ok(Literal::Float(f)),
            TokenKind::Minus | TokenKind::Plus => {
                let negate = token.kind == TokenKind::Minus;
                match self.advance().kind {
                    TokenKind::Int(magnitude) => signed_int(magnitude, negate, token.offset),
                    TokenKind::Float(f) if negate => Ok(Literal::Float(-f)),
                    TokenKind::Float(f) => Ok(Literal::Float(f)),
                    _ => Err(DecodeError::NonLiteralArgument {
                        offset: token.offset,
                    }),
                }
            }
            TokenKind::Str(mut s) => {
                while let TokenKind::Str(next) = &self.peek().kind {
                    s.push_str(next);
                    self.advance();
                }
                Ok(Literal::Str(s))
            }
            TokenKind::LBracket => Ok(Literal::List(self.items(TokenKind::RBracket, "']'")?)),
            TokenKind::LParen => self.tuple_or_group(),
            TokenKind::LBrace => self.dict_or_set(),
            _ => Err(DecodeError::NonLiteralArgument {
                offset: token.offset,
            }),
        }
    }

    fn items(&mut self, close: TokenKind, close_desc: &str) -> Result<Vec<Literal>, DecodeError> {
        let mut items = Vec::new();
        loop {
            if self.peek().kind == close {
                self.advance();
                return Ok(items);
            }
            items.push(self.literal()?);
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else if self.peek().kind != close {
                return Err(self.unexpected(&format!("',' or {}", close_desc)));
            }
        }
    }

    fn tuple_or_group(&mut self) -> Result<Literal, DecodeError> {
        if self.peek().kind == TokenKind::RParen {
            self.advance();
            return Ok(Literal::Tuple(Vec::new()));
        }

        let first = self.literal()?;
        match self.peek().kind {
            TokenKind::RParen => {
                self.advance();
                Ok(first)
            }
            TokenKind::Comma => {
                self.advance();
                let mut items = vec![first];
                items.extend(self.items(TokenKind::RParen, "')'")?);
                Ok(Literal::Tuple(items))
            }
            _ => Err(self.unexpected("',' or ')'")),
        }
    }

    fn dict_or_set(&mut self) -> Result<Literal, DecodeError> {
        if self.peek().kind == TokenKind::RBrace {
            self.advance();
            return Ok(Literal::Dict(Vec::new()));
        }

        let first = self.literal()?;
        if self.peek().kind != TokenKind::Colon {
            let mut items = vec![first];
            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                    items.extend(self.items(TokenKind::RBrace, "'}'")?);
                }
                TokenKind::RBrace => {
                    self.advance();
                }
                _ => return Err(self.unexpected("',' or '}'")),
            }
            return Ok(Literal::Set(items));
        }

        self.advance();
        let mut pairs = vec![(first, self.literal()?)];
        loop {
            match self.peek().kind {
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::RBrace => {
                    self.advance();
                    return Ok(Literal::Dict(pairs));
                }
                _ => return Err(self.unexpected("',' or '}'")),
            }
            if self.peek().kind == TokenKind::RBrace {
                self.advance();
                return Ok(Literal::Dict(pairs));
            }
            let key = self.literal()?;
            if self.peek().kind != TokenKind::Colon {
                return Err(self.unexpected("':'"));
            }
            self.advance();
            pairs.push((key, self.literal()?));
        }
    }
}

/// Decodes a ground-truth call expression such as `foo(a=1, b=[1, 2])`.
///
/// Keyword arguments keep their names; positional arguments are stored as
/// `arg1`, `arg2`, ... in position order.
pub fn parse_function_call(source: &str) -> Result<FunctionCall, DecodeError> {
    let source = source.trim();
    if source.is_empty() {
        return Err(DecodeError::Empty);
    }

    let tokens = Lexer::new(source).tokenize()?;
    Parser { tokens, pos: 0 }.call()
}
