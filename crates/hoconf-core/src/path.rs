//! Dotted key paths
//!
//! A [`Path`] is a non-empty, immutable sequence of key segments, the
//! subject of substitution expressions (`${a.b.c}`) and of restricted
//! resolution. Parsing supports double-quoted segments so keys containing
//! dots can be addressed (`a."b.c".d`).

use std::fmt;

use crate::error::{Error, Result};

/// An immutable dotted key path with at least one segment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Create a path from segments
    ///
    /// Returns an error if `segments` is empty or contains an empty segment.
    pub fn new(segments: Vec<String>) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::parse("path must have at least one segment"));
        }
        if segments.iter().any(|s| s.is_empty()) {
            return Err(Error::parse("path segments must be non-empty"));
        }
        Ok(Self { segments })
    }

    /// Create a single-segment path
    pub fn from_key(key: impl Into<String>) -> Self {
        Self {
            segments: vec![key.into()],
        }
    }

    /// Parse a dotted path expression like `a.b.c` or `a."b.c".d`
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::parse("empty path expression"));
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if current.is_empty() {
                        return Err(Error::parse(format!(
                            "path '{}' has a leading, trailing, or double dot",
                            text
                        )));
                    }
                    segments.push(std::mem::take(&mut current));
                }
                '"' => {
                    // quoted segment, may contain dots
                    loop {
                        match chars.next() {
                            Some('"') => break,
                            Some('\\') => {
                                if let Some(escaped) = chars.next() {
                                    current.push(escaped);
                                }
                            }
                            Some(c) => current.push(c),
                            None => {
                                return Err(Error::parse(format!(
                                    "unterminated quoted segment in path '{}'",
                                    text
                                )))
                            }
                        }
                    }
                }
                _ => current.push(c),
            }
        }

        if current.is_empty() {
            return Err(Error::parse(format!(
                "path '{}' has a leading, trailing, or double dot",
                text
            )));
        }
        segments.push(current);

        Path::new(segments)
    }

    /// The first segment
    pub fn first(&self) -> &str {
        &self.segments[0]
    }

    /// Everything after the first segment, or `None` for a one-segment path
    pub fn remainder(&self) -> Option<Path> {
        if self.segments.len() <= 1 {
            None
        } else {
            Some(Path {
                segments: self.segments[1..].to_vec(),
            })
        }
    }

    /// A new path with `prefix` prepended
    pub fn prepend(&self, prefix: &Path) -> Path {
        let mut segments = prefix.segments.clone();
        segments.extend(self.segments.iter().cloned());
        Path { segments }
    }

    /// Drop the first `n` segments, or `None` if that consumes the path
    pub fn sub_path(&self, n: usize) -> Option<Path> {
        if n == 0 {
            Some(self.clone())
        } else if n >= self.segments.len() {
            None
        } else {
            Some(Path {
                segments: self.segments[n..].to_vec(),
            })
        }
    }

    /// Whether this path starts with all of `prefix`'s segments
    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; paths have at least one segment
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The segments in order
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Render to path-expression text, quoting segments that need it
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            if needs_quotes(segment) {
                out.push('"');
                for c in segment.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push('"');
            } else {
                out.push_str(segment);
            }
        }
        out
    }
}

fn needs_quotes(segment: &str) -> bool {
    segment
        .chars()
        .any(|c| c == '.' || c == '"' || c == '$' || c.is_whitespace())
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
