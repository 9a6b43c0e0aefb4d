//! Error types for hoconf
//!
//! Structured errors carrying the origin of the offending value and an
//! actionable help message where one exists. Resolution failures surface
//! as [`ErrorKind::UnresolvedSubstitution`] with the chain of references
//! that led to the failure.

use std::fmt;

use crate::origin::Origin;

/// Result type alias for hoconf operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for hoconf operations
#[derive(Debug, Clone)]
pub struct Error {
    /// The kind of error that occurred
    pub kind: ErrorKind,
    /// Source origin of the offending value, if known
    pub origin: Option<Origin>,
    /// Actionable help message
    pub help: Option<String>,
}

/// Categories of errors that can occur
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error lexing or parsing HOCON text
    Parse { message: String },
    /// A required `${...}` substitution could not be resolved
    UnresolvedSubstitution {
        /// The substitution path, rendered
        path: String,
        /// The chain of substitutions involved, when the failure was a cycle
        trace: Option<String>,
    },
    /// Incompatible value kinds, e.g. mixing objects and lists in a
    /// concatenation
    WrongType { expected: String, actual: String },
    /// A path that does not exist in the configuration
    Missing { path: String },
    /// Internal invariant violation (a bug in hoconf)
    BugOrBroken { message: String },
    /// I/O error reading a configuration file
    Io { message: String },
}

impl Error {
    /// Create a new parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Parse {
                message: message.into(),
            },
            origin: None,
            help: None,
        }
    }

    /// Create an unresolved substitution error for a missing target
    pub fn unresolved_substitution(path: impl Into<String>) -> Self {
        let p = path.into();
        Self {
            kind: ErrorKind::UnresolvedSubstitution {
                path: p.clone(),
                trace: None,
            },
            origin: None,
            help: Some(format!(
                "Define '{}' somewhere in the configuration, or make the reference optional with ${{?{}}}",
                p, p
            )),
        }
    }

    /// Create an unresolved substitution error for a substitution cycle
    pub fn substitution_cycle(path: impl Into<String>, trace: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::UnresolvedSubstitution {
                path: path.into(),
                trace: Some(trace.into()),
            },
            origin: None,
            help: Some("Break the cycle by removing one of the references".into()),
        }
    }

    /// Create a wrong type error
    pub fn wrong_type(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::WrongType {
                expected: expected.into(),
                actual: actual.into(),
            },
            origin: None,
            help: None,
        }
    }

    /// Create a missing path error
    pub fn missing(path: impl Into<String>) -> Self {
        let p = path.into();
        Self {
            kind: ErrorKind::Missing { path: p.clone() },
            origin: None,
            help: Some(format!("Check that '{}' exists in the configuration", p)),
        }
    }

    /// Create an internal error
    pub fn bug_or_broken(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::BugOrBroken {
                message: message.into(),
            },
            origin: None,
            help: Some("This is a bug in hoconf; please report it".into()),
        }
    }

    /// Create an I/O error
    pub fn io(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Io {
                message: message.into(),
            },
            origin: None,
            help: None,
        }
    }

    /// Add origin context to the error
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Add a help message to the error
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Parse { message } => write!(f, "Parse error: {}", message)?,
            ErrorKind::UnresolvedSubstitution { path, trace } => {
                write!(f, "Could not resolve substitution to a value: ${{{}}}", path)?;
                if let Some(trace) = trace {
                    write!(
                        f,
                        "\n  The substitution was part of a cycle involving: {}",
                        trace
                    )?;
                }
            }
            ErrorKind::WrongType { expected, actual } => {
                write!(f, "Wrong value type: expected {}, got {}", expected, actual)?
            }
            ErrorKind::Missing { path } => write!(f, "No configuration value at '{}'", path)?,
            ErrorKind::BugOrBroken { message } => write!(f, "Internal error: {}", message)?,
            ErrorKind::Io { message } => write!(f, "I/O error: {}", message)?,
        }

        if let Some(origin) = &self.origin {
            write!(f, "\n  Origin: {}", origin)?;
        }

        if let Some(help) = &self.help {
            write!(f, "\n  Help: {}", help)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_substitution_display() {
        let err = Error::unresolved_substitution("database.host")
            .with_origin(Origin::with_line("app.conf", 4));
        let display = format!("{}", err);

        assert!(display.contains("Could not resolve substitution to a value: ${database.host}"));
        assert!(display.contains("Origin: app.conf: 4"));
        assert!(display.contains("Help:"));
        assert!(display.contains("${?database.host}"));
    }

    #[test]
    fn test_cycle_display_names_the_chain() {
        let err = Error::substitution_cycle("a", "${b}, ${a}");
        let display = format!("{}", err);

        assert!(display.contains("part of a cycle"));
        assert!(display.contains("${b}, ${a}"));
    }

    #[test]
    fn test_wrong_type_display() {
        let err = Error::wrong_type("list", "object");
        assert!(format!("{}", err).contains("expected list, got object"));
    }

    #[test]
    fn test_bug_or_broken_has_report_help() {
        let err = Error::bug_or_broken("resolve getting too deep");
        let display = format!("{}", err);
        assert!(display.contains("Internal error"));
        assert!(display.contains("report"));
    }
}
