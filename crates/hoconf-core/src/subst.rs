//! Substitution expressions
//!
//! A parsed `${path}` or `${?path}`. The optional form resolves to nothing
//! when its target is missing instead of failing.

use std::fmt;

use crate::path::Path;

/// A parsed substitution expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstitutionExpression {
    path: Path,
    optional: bool,
}

impl SubstitutionExpression {
    /// Create a substitution expression
    pub fn new(path: Path, optional: bool) -> Self {
        Self { path, optional }
    }

    /// The referenced path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this is a `${?path}` optional reference
    pub fn optional(&self) -> bool {
        self.optional
    }

    /// A copy of this expression with `prefix` prepended to the path
    ///
    /// Used when a reference is inherited across an object boundary, e.g.
    /// from an included file mounted at a path.
    pub fn prepend_path(&self, prefix: &Path) -> Self {
        Self {
            path: self.path.prepend(prefix),
            optional: self.optional,
        }
    }
}

impl fmt::Display for SubstitutionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            write!(f, "${{?{}}}", self.path.render())
        } else {
            write!(f, "${{{}}}", self.path.render())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_required() {
        let expr = SubstitutionExpression::new(Path::parse("a.b").unwrap(), false);
        assert_eq!(format!("{}", expr), "${a.b}");
    }

    #[test]
    fn test_display_optional() {
        let expr = SubstitutionExpression::new(Path::parse("a.b").unwrap(), true);
        assert_eq!(format!("{}", expr), "${?a.b}");
    }

    #[test]
    fn test_equality_includes_optional_flag() {
        let path = Path::parse("x").unwrap();
        let required = SubstitutionExpression::new(path.clone(), false);
        let optional = SubstitutionExpression::new(path, true);
        assert_ne!(required, optional);
        assert_eq!(required, required.clone());
    }

    #[test]
    fn test_prepend_path() {
        let expr = SubstitutionExpression::new(Path::parse("x").unwrap(), false);
        let prefixed = expr.prepend_path(&Path::parse("outer").unwrap());
        assert_eq!(prefixed.path().segments(), ["outer", "x"]);
        assert!(!prefixed.optional());
    }
}
