//! Source origins for values and diagnostics
//!
//! Every configuration value remembers where it came from so errors can
//! point at the original text. An origin is a description (usually a file
//! name, or "string" for in-memory input) plus an optional line number.

use std::fmt;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    description: String,
    line: Option<usize>,
}

impl Origin {
    /// Create an origin with a description only
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            line: None,
        }
    }

    /// Create an origin with a description and line number
    pub fn with_line(description: impl Into<String>, line: usize) -> Self {
        Self {
            description: description.into(),
            line: Some(line),
        }
    }

    /// The origin description (file name or input label)
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The line number, if known
    pub fn line(&self) -> Option<usize> {
        self.line
    }

    /// A copy of this origin pointing at a different line
    pub fn at_line(&self, line: usize) -> Self {
        Self {
            description: self.description.clone(),
            line: Some(line),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}: {}", self.description, line),
            None => write!(f, "{}", self.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_display_with_line() {
        let origin = Origin::with_line("app.conf", 12);
        assert_eq!(format!("{}", origin), "app.conf: 12");
    }

    #[test]
    fn test_origin_display_without_line() {
        let origin = Origin::new("string");
        assert_eq!(format!("{}", origin), "string");
    }

    #[test]
    fn test_origin_at_line() {
        let origin = Origin::new("app.conf").at_line(3);
        assert_eq!(origin.line(), Some(3));
        assert_eq!(origin.description(), "app.conf");
    }
}
