//! HOCON parser
//!
//! Builds the [`ConfigValue`] tree from tokens. Root braces are optional,
//! keys are path expressions, duplicate keys merge (eagerly for plain
//! objects, into a delayed merge when anything is unresolved), adjacent
//! values on one line concatenate, and `a += v` desugars to
//! `a = ${?a} [v]` so appends compose with earlier definitions.

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::origin::Origin;
use crate::path::Path;
use crate::subst::SubstitutionExpression;
use crate::value::{
    ConfigConcat, ConfigList, ConfigObject, ConfigReference, ConfigValue, Number, ResolveStatus,
};

use super::lexer;
use super::tokens::{Token, TokenKind};

/// Nesting deeper than this is rejected rather than risking the stack
const MAX_NESTING_DEPTH: usize = 100;

pub(crate) fn parse(input: &str, origin_description: &str) -> Result<ConfigObject> {
    let origin = Origin::new(origin_description);
    let tokens = lexer::tokenize(input, &origin)?;
    Parser::new(tokens).parse_root()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_here(&self, message: impl Into<String>) -> Error {
        Error::parse(message).with_origin(self.peek().origin().clone())
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek().kind(), TokenKind::Whitespace(_)) {
            self.advance();
        }
    }

    fn skip_separators(&mut self) {
        while matches!(
            self.peek().kind(),
            TokenKind::Whitespace(_) | TokenKind::Newline | TokenKind::Comma
        ) {
            self.advance();
        }
    }

    fn enter_nesting(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.error_here("input nested too deeply"));
        }
        Ok(())
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    fn parse_root(mut self) -> Result<ConfigObject> {
        self.skip_separators();
        let obj = if matches!(self.peek().kind(), TokenKind::OpenCurly) {
            let obj = self.parse_object(&[])?;
            self.skip_separators();
            if !matches!(self.peek().kind(), TokenKind::Eof) {
                return Err(self.error_here(format!(
                    "expected end of input after root object, found {}",
                    self.peek()
                )));
            }
            obj
        } else {
            self.parse_object_body(&[], true)?
        };
        Ok(obj)
    }

    /// Parse a braced object; `prefix` is the object's path from the root
    fn parse_object(&mut self, prefix: &[String]) -> Result<ConfigObject> {
        self.enter_nesting()?;
        debug_assert!(matches!(self.peek().kind(), TokenKind::OpenCurly));
        self.advance();
        let obj = self.parse_object_body(prefix, false)?;
        debug_assert!(matches!(self.peek().kind(), TokenKind::CloseCurly));
        self.advance();
        self.exit_nesting();
        Ok(obj)
    }

    /// Parse entries until the closing brace (or end of input at the root)
    fn parse_object_body(&mut self, prefix: &[String], at_root: bool) -> Result<ConfigObject> {
        let origin = self.peek().origin().clone();
        let mut entries: IndexMap<String, ConfigValue> = IndexMap::new();

        loop {
            self.skip_separators();
            match self.peek().kind() {
                TokenKind::Eof => {
                    if at_root {
                        break;
                    }
                    return Err(self.error_here("expected '}' before end of input"));
                }
                TokenKind::CloseCurly => {
                    if at_root {
                        return Err(self.error_here("unbalanced '}'"));
                    }
                    break;
                }
                _ => self.parse_entry(&mut entries, prefix)?,
            }
        }

        Ok(ConfigObject::new(origin, entries))
    }

    fn parse_entry(
        &mut self,
        entries: &mut IndexMap<String, ConfigValue>,
        prefix: &[String],
    ) -> Result<()> {
        let path = self.parse_key()?;
        let mut child_prefix = prefix.to_vec();
        child_prefix.extend(path.segments().iter().cloned());

        self.skip_whitespace();

        let value = match self.peek().kind() {
            TokenKind::Equals | TokenKind::Colon => {
                self.advance();
                self.skip_whitespace();
                self.parse_value(&child_prefix)?
            }
            TokenKind::PlusEquals => {
                self.advance();
                self.skip_whitespace();
                let element = self.parse_value(&child_prefix)?;
                self.desugar_append(&child_prefix, element)?
            }
            // `a { ... }` merges like `a = { ... }`
            TokenKind::OpenCurly => {
                ConfigValue::Object(self.parse_object(&child_prefix)?)
            }
            other => {
                return Err(self.error_here(format!(
                    "expected '=', ':', '+=', or '{{' after key, found {}",
                    other
                )))
            }
        };

        // expand a dotted key into nested single-key objects
        let mut value = value;
        for segment in path.segments()[1..].iter().rev() {
            let mut inner = IndexMap::new();
            let origin = value.origin().clone();
            inner.insert(segment.clone(), value);
            value = ConfigValue::Object(ConfigObject::new(origin, inner));
        }

        merge_entry(entries, path.first().to_string(), value);
        Ok(())
    }

    /// `path += v` is `path = ${?path} [v]`: the optional self-reference
    /// picks up any earlier value for the key
    fn desugar_append(&mut self, full_path: &[String], element: ConfigValue) -> Result<ConfigValue> {
        let origin = element.origin().clone();
        let expr = SubstitutionExpression::new(Path::new(full_path.to_vec())?, true);
        let reference = ConfigValue::Reference(ConfigReference::new(origin.clone(), expr));
        let singleton = ConfigValue::List(ConfigList::new(origin.clone(), vec![element]));
        Ok(ConfigValue::Concat(ConfigConcat::new(
            origin,
            vec![reference, singleton],
        )))
    }

    /// Parse a key: quoted and unquoted pieces up to the separator
    fn parse_key(&mut self) -> Result<Path> {
        let origin = self.peek().origin().clone();
        let mut text = String::new();

        loop {
            match self.peek().kind() {
                TokenKind::Unquoted(s) => {
                    text.push_str(s);
                    self.advance();
                }
                TokenKind::QuotedString(s) => {
                    // re-quote so dots inside stay one segment
                    text.push('"');
                    for c in s.chars() {
                        if c == '"' || c == '\\' {
                            text.push('\\');
                        }
                        text.push(c);
                    }
                    text.push('"');
                    self.advance();
                }
                TokenKind::Whitespace(s) => {
                    text.push_str(s);
                    self.advance();
                }
                _ => break,
            }
        }

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::parse(format!("expected a key, found {}", self.peek()))
                .with_origin(origin));
        }
        Path::parse(text).map_err(|e| e.with_origin(origin))
    }

    /// Parse a value expression: one or more pieces up to the end of the
    /// line (or a comma or closing bracket)
    fn parse_value(&mut self, prefix: &[String]) -> Result<ConfigValue> {
        let origin = self.peek().origin().clone();
        let mut pieces: Vec<ConfigValue> = Vec::new();
        // whitespace between pieces is content, leading/trailing is not
        let mut pending_space: Option<(String, Origin)> = None;

        loop {
            let token_origin = self.peek().origin().clone();
            match self.peek().kind() {
                TokenKind::Newline
                | TokenKind::Comma
                | TokenKind::CloseCurly
                | TokenKind::CloseSquare
                | TokenKind::Eof => break,
                TokenKind::Whitespace(s) => {
                    if !pieces.is_empty() {
                        pending_space = Some((s.clone(), token_origin));
                    }
                    self.advance();
                }
                TokenKind::QuotedString(s) => {
                    let piece = ConfigValue::String(token_origin, s.clone());
                    self.advance();
                    push_piece(&mut pieces, &mut pending_space, piece);
                }
                TokenKind::Unquoted(s) => {
                    let piece = classify_unquoted(s, token_origin);
                    self.advance();
                    push_piece(&mut pieces, &mut pending_space, piece);
                }
                TokenKind::Substitution { path, optional } => {
                    let expr = SubstitutionExpression::new(
                        Path::parse(path).map_err(|e| e.with_origin(token_origin.clone()))?,
                        *optional,
                    );
                    let piece =
                        ConfigValue::Reference(ConfigReference::new(token_origin, expr));
                    self.advance();
                    push_piece(&mut pieces, &mut pending_space, piece);
                }
                TokenKind::OpenCurly => {
                    let piece = ConfigValue::Object(self.parse_object(prefix)?);
                    push_piece(&mut pieces, &mut pending_space, piece);
                }
                TokenKind::OpenSquare => {
                    let piece = ConfigValue::List(self.parse_list(prefix)?);
                    push_piece(&mut pieces, &mut pending_space, piece);
                }
                other => {
                    return Err(self.error_here(format!("unexpected {} in value", other)));
                }
            }
        }

        match pieces.len() {
            0 => Err(Error::parse("expected a value").with_origin(origin)),
            1 => Ok(pieces.into_iter().next().unwrap()),
            _ => {
                if pieces
                    .iter()
                    .all(|p| p.resolve_status() == ResolveStatus::Resolved)
                {
                    // nothing to wait for; join right away
                    ConfigConcat::join(pieces, &origin)
                } else {
                    Ok(ConfigValue::Concat(ConfigConcat::new(origin, pieces)))
                }
            }
        }
    }

    fn parse_list(&mut self, prefix: &[String]) -> Result<ConfigList> {
        self.enter_nesting()?;
        let origin = self.peek().origin().clone();
        debug_assert!(matches!(self.peek().kind(), TokenKind::OpenSquare));
        self.advance();

        let mut items = Vec::new();
        loop {
            self.skip_separators();
            match self.peek().kind() {
                TokenKind::CloseSquare => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => {
                    return Err(self.error_here("expected ']' before end of input"));
                }
                _ => items.push(self.parse_value(prefix)?),
            }
        }

        self.exit_nesting();
        Ok(ConfigList::new(origin, items))
    }
}

fn push_piece(
    pieces: &mut Vec<ConfigValue>,
    pending_space: &mut Option<(String, Origin)>,
    piece: ConfigValue,
) {
    if let Some((space, origin)) = pending_space.take() {
        pieces.push(ConfigValue::String(origin, space));
    }
    pieces.push(piece);
}

/// Decide what an unquoted token means: keyword, number, or string
fn classify_unquoted(text: &str, origin: Origin) -> ConfigValue {
    match text {
        "true" => return ConfigValue::Bool(origin, true),
        "false" => return ConfigValue::Bool(origin, false),
        "null" => return ConfigValue::Null(origin),
        _ => {}
    }

    if let Ok(i) = text.parse::<i64>() {
        return ConfigValue::Number(origin, Number::Int(i));
    }

    let numeric_chars = text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | 'e' | 'E'));
    if numeric_chars && text.chars().any(|c| c.is_ascii_digit()) {
        if let Ok(f) = text.parse::<f64>() {
            return ConfigValue::Number(origin, Number::Float(f));
        }
    }

    ConfigValue::String(origin, text.to_string())
}

/// A later entry for the same key merges over the earlier one
fn merge_entry(entries: &mut IndexMap<String, ConfigValue>, key: String, value: ConfigValue) {
    match entries.get(&key).cloned() {
        Some(old) => {
            entries.insert(key, value.with_fallback(old));
        }
        None => {
            entries.insert(key, value);
        }
    }
}
