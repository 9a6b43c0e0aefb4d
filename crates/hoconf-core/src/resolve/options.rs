//! Resolution options

/// Knobs consumed by the substitution resolver
///
/// Both options default to off: resolution fails on any unresolvable
/// required reference and never consults the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    use_system_environment: bool,
    allow_unresolved: bool,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fall back to environment variables for substitution paths missing
    /// from the tree
    ///
    /// The variable name is the path's segments joined with `_`, so a
    /// single-segment path like `${HOME}` is the plain variable name and
    /// `${database.host}` consults `database_host`.
    pub fn with_use_system_environment(mut self, value: bool) -> Self {
        self.use_system_environment = value;
        self
    }

    /// Keep unresolvable substitutions in the output instead of failing
    ///
    /// Type errors and cycles between required references still fail.
    pub fn with_allow_unresolved(mut self, value: bool) -> Self {
        self.allow_unresolved = value;
        self
    }

    pub fn use_system_environment(&self) -> bool {
        self.use_system_environment
    }

    pub fn allow_unresolved(&self) -> bool {
        self.allow_unresolved
    }
}
