//! HOCON lexer
//!
//! Splits input into tokens, tracking line numbers for origins. `#` and
//! `//` comments run to end of line. Whitespace inside a line is a token
//! of its own because value concatenation preserves it; newlines are
//! significant separators.

use crate::error::{Error, Result};
use crate::origin::Origin;

use super::tokens::{Token, TokenKind};

pub(crate) fn tokenize(input: &str, origin: &Origin) -> Result<Vec<Token>> {
    Lexer::new(input, origin).tokenize()
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    origin: &'a Origin,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str, origin: &'a Origin) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            origin,
        }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.current() {
            self.pos += c.len_utf8();
        }
    }

    fn here(&self) -> Origin {
        self.origin.at_line(self.line)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::parse(message).with_origin(self.here())
    }

    fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();

        while !self.is_eof() {
            let origin = self.here();
            let c = self.current().unwrap();
            match c {
                '\n' => {
                    self.advance();
                    self.line += 1;
                    tokens.push(Token::new(TokenKind::Newline, origin));
                }
                '#' => self.skip_comment(),
                '/' if self.peek() == Some('/') => self.skip_comment(),
                '{' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::OpenCurly, origin));
                }
                '}' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::CloseCurly, origin));
                }
                '[' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::OpenSquare, origin));
                }
                ']' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::CloseSquare, origin));
                }
                ',' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Comma, origin));
                }
                '=' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Equals, origin));
                }
                ':' => {
                    self.advance();
                    tokens.push(Token::new(TokenKind::Colon, origin));
                }
                '+' if self.peek() == Some('=') => {
                    self.advance();
                    self.advance();
                    tokens.push(Token::new(TokenKind::PlusEquals, origin));
                }
                '"' => {
                    let text = self.lex_quoted_string()?;
                    tokens.push(Token::new(TokenKind::QuotedString(text), origin));
                }
                '$' if self.peek() == Some('{') => {
                    let kind = self.lex_substitution()?;
                    tokens.push(Token::new(kind, origin));
                }
                c if c.is_whitespace() => {
                    let text = self.lex_whitespace();
                    tokens.push(Token::new(TokenKind::Whitespace(text), origin));
                }
                c if is_unquoted_char(c) => {
                    let text = self.lex_unquoted();
                    tokens.push(Token::new(TokenKind::Unquoted(text), origin));
                }
                c => {
                    return Err(self.error(format!("reserved character '{}' outside quotes", c)));
                }
            }
        }

        tokens.push(Token::new(TokenKind::Eof, self.here()));
        Ok(tokens)
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.current() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn lex_whitespace(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.current() {
            if c == '\n' || !c.is_whitespace() {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn lex_unquoted(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.current() {
            if c == '/' && self.peek() == Some('/') {
                break;
            }
            if c.is_whitespace() || !is_unquoted_char(c) {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn lex_quoted_string(&mut self) -> Result<String> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.current() {
                None | Some('\n') => {
                    return Err(self.error("unterminated string literal"));
                }
                Some('"') => {
                    self.advance();
                    return Ok(text);
                }
                Some('\\') => {
                    self.advance();
                    text.push(self.lex_escape()?);
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }
    }

    fn lex_escape(&mut self) -> Result<char> {
        let c = self
            .current()
            .ok_or_else(|| self.error("unterminated escape sequence"))?;
        self.advance();
        match c {
            '"' => Ok('"'),
            '\\' => Ok('\\'),
            '/' => Ok('/'),
            'b' => Ok('\u{0008}'),
            'f' => Ok('\u{000C}'),
            'n' => Ok('\n'),
            'r' => Ok('\r'),
            't' => Ok('\t'),
            'u' => {
                let mut code = 0u32;
                for _ in 0..4 {
                    let digit = self
                        .current()
                        .and_then(|c| c.to_digit(16))
                        .ok_or_else(|| self.error("invalid \\u escape, expected 4 hex digits"))?;
                    code = code * 16 + digit;
                    self.advance();
                }
                char::from_u32(code)
                    .ok_or_else(|| self.error("\\u escape is not a valid character"))
            }
            other => Err(self.error(format!("unknown escape sequence '\\{}'", other))),
        }
    }

    fn lex_substitution(&mut self) -> Result<TokenKind> {
        self.advance(); // $
        self.advance(); // {

        let optional = self.current() == Some('?');
        if optional {
            self.advance();
        }

        let mut path = String::new();
        loop {
            match self.current() {
                None | Some('\n') => {
                    return Err(self.error("unterminated substitution, expected '}'"));
                }
                Some('}') => {
                    self.advance();
                    break;
                }
                Some(c) => {
                    path.push(c);
                    self.advance();
                }
            }
        }

        let path = path.trim().to_string();
        if path.is_empty() {
            return Err(self.error("empty substitution expression"));
        }
        Ok(TokenKind::Substitution { path, optional })
    }
}

fn is_unquoted_char(c: char) -> bool {
    !matches!(
        c,
        '$' | '"' | '{' | '}' | '[' | ']' | ':' | '=' | ',' | '+' | '#' | '`' | '^' | '?' | '!'
            | '@' | '*' | '&' | '\\'
    )
}
