//! The Config facade
//!
//! A thin wrapper pairing a parsed tree with parse and resolve entry
//! points. Resolution returns a new `Config`; nothing is mutated or
//! cached across calls.

use std::path::Path as FsPath;

use crate::error::{Error, Result};
use crate::parser;
use crate::path::Path;
use crate::resolve::{self, ResolveOptions};
use crate::value::{ConfigObject, ConfigValue, ResolveStatus};

/// A parsed (and possibly resolved) configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    root: ConfigObject,
}

impl Config {
    /// Wrap an existing tree
    pub fn new(root: ConfigObject) -> Self {
        Self { root }
    }

    /// Parse HOCON text
    pub fn parse_str(input: &str) -> Result<Self> {
        Ok(Self {
            root: parser::parse(input, "string")?,
        })
    }

    /// Read and parse a HOCON file
    pub fn parse_file(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::io(format!("failed to read '{}': {}", path.display(), e)))?;
        let description = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        Ok(Self {
            root: parser::parse(&content, &description)?,
        })
    }

    /// The root object
    pub fn root(&self) -> &ConfigObject {
        &self.root
    }

    /// Whether every substitution has been resolved
    pub fn is_resolved(&self) -> bool {
        self.root.resolve_status() == ResolveStatus::Resolved
    }

    /// Resolve all substitutions, returning a new configuration
    pub fn resolve(&self, options: ResolveOptions) -> Result<Config> {
        Ok(Config {
            root: resolve::resolve(&self.root, options)?,
        })
    }

    /// Look up a value by dotted path, without resolving anything
    pub fn get(&self, path: &str) -> Result<&ConfigValue> {
        let path = Path::parse(path)?;
        let mut current = &self.root;
        let mut remaining = path.clone();
        loop {
            let value = current
                .get(remaining.first())
                .ok_or_else(|| Error::missing(path.render()))?;
            match remaining.remainder() {
                None => return Ok(value),
                Some(rest) => {
                    current = value
                        .as_object()
                        .ok_or_else(|| Error::missing(path.render()))?;
                    remaining = rest;
                }
            }
        }
    }

    /// Merge `other` over this configuration, as if its text came later
    pub fn with_fallback_from(&self, other: &Config) -> Config {
        let merged = ConfigValue::Object(other.root.clone())
            .with_fallback(ConfigValue::Object(self.root.clone()));
        match merged {
            ConfigValue::Object(root) => Config { root },
            // object over object always merges to an object
            _ => Config {
                root: other.root.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_get() {
        let config = Config::parse_str("db { host = \"localhost\" }").unwrap();
        assert_eq!(config.get("db.host").unwrap().as_str(), Some("localhost"));
    }

    #[test]
    fn test_get_missing_path() {
        let config = Config::parse_str("a = 1").unwrap();
        let err = config.get("a.b.c").unwrap_err();
        assert!(matches!(err.kind, crate::error::ErrorKind::Missing { .. }));
        assert!(config.get("nope").is_err());
    }

    #[test]
    fn test_resolve_round_trip() {
        let config = Config::parse_str("a = 1\nb = ${a}").unwrap();
        assert!(!config.is_resolved());
        let resolved = config.resolve(ResolveOptions::new()).unwrap();
        assert!(resolved.is_resolved());
        assert_eq!(resolved.get("b").unwrap().as_i64(), Some(1));
        // the original is untouched
        assert!(!config.is_resolved());
    }

    #[test]
    fn test_parse_file() {
        let dir = std::env::temp_dir();
        let file = dir.join("hoconf_config_test.conf");
        std::fs::write(&file, "answer = 42\n").unwrap();

        let config = Config::parse_file(&file).unwrap();
        assert_eq!(config.get("answer").unwrap().as_i64(), Some(42));
        assert_eq!(
            config.get("answer").unwrap().origin().description(),
            "hoconf_config_test.conf"
        );

        std::fs::remove_file(file).ok();
    }

    #[test]
    fn test_parse_file_missing() {
        let err = Config::parse_file("/no/such/file.conf").unwrap_err();
        assert!(matches!(err.kind, crate::error::ErrorKind::Io { .. }));
    }

    #[test]
    fn test_with_fallback_from() {
        let base = Config::parse_str("a = 1\nshared = 1").unwrap();
        let overlay = Config::parse_str("b = 2\nshared = 2").unwrap();
        let merged = base.with_fallback_from(&overlay);
        assert_eq!(merged.get("a").unwrap().as_i64(), Some(1));
        assert_eq!(merged.get("b").unwrap().as_i64(), Some(2));
        assert_eq!(merged.get("shared").unwrap().as_i64(), Some(2));
    }
}
