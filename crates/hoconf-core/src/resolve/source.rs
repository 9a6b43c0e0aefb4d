//! Substitution lookup
//!
//! [`ResolveSource`] is the "where do I look up a path" side of
//! substitutions: the root of the tree, the chain of objects we descended
//! through, and id-keyed replacement overrides. The overrides make
//! self-referential merge stacks work: while a delayed merge resolves one
//! of its layers, its own id maps to the merge of the layers below, so a
//! reference to its path sees the earlier value instead of re-entering
//! the node.

use std::sync::Arc;

use tracing::trace;

use crate::origin::Origin;
use crate::path::Path;
use crate::subst::SubstitutionExpression;
use crate::value::{ConfigDelayedMerge, ConfigObject, ConfigValue, NodeId, ResolveStatus};

use super::context::{ResolveContext, ResolveError};

/// View of the root tree that can look up substitution paths
#[derive(Debug, Clone)]
pub(crate) struct ResolveSource {
    root: Arc<ConfigObject>,
    // enclosing objects, outermost first
    parents: Vec<NodeId>,
    replacements: Vec<(NodeId, ConfigValue)>,
}

/// Outcome of peeking a key in a delayed merge stack
enum Peek {
    /// A value no lower layer can affect
    Final(ConfigValue),
    /// The key exists but the merge must resolve before lookup can continue
    NeedsResolve,
    /// No layer can supply the key
    Absent,
}

impl ResolveSource {
    pub(crate) fn new(root: ConfigObject) -> Self {
        Self {
            root: Arc::new(root),
            parents: Vec::new(),
            replacements: Vec::new(),
        }
    }

    /// A source that remembers `obj` as the current enclosing object
    pub(crate) fn push_parent(&self, obj: &ConfigObject) -> ResolveSource {
        let mut source = self.clone();
        source.parents.push(obj.id());
        source
    }

    /// A source with the innermost enclosing object forgotten
    pub(crate) fn pop_parent(&self) -> ResolveSource {
        let mut source = self.clone();
        source.parents.pop();
        source
    }

    /// Unwind the enclosing-object chain before an absolute-path lookup
    fn reset_parents(&self) -> ResolveSource {
        let mut source = self.clone();
        while source.parent_depth() > 0 {
            source = source.pop_parent();
        }
        source
    }

    /// Depth of the enclosing-object chain
    pub(crate) fn parent_depth(&self) -> usize {
        self.parents.len()
    }

    /// A source where lookups see `replacement` wherever the node
    /// `original` appears
    pub(crate) fn replace(&self, original: NodeId, replacement: ConfigValue) -> ResolveSource {
        let mut source = self.clone();
        source.replacements.push((original, replacement));
        source
    }

    fn replacement_for(&self, id: Option<NodeId>) -> Option<&ConfigValue> {
        let id = id?;
        // the newest override wins
        self.replacements
            .iter()
            .rev()
            .find(|(original, _)| *original == id)
            .map(|(_, replacement)| replacement)
    }

    /// Look up a substitution expression
    ///
    /// A reference inherited from an included file carries a prefixed path
    /// and `prefix_length`; the path as written (prefix stripped) is tried
    /// first, then the full prefixed path. A miss falls back to the
    /// process environment when the options ask for it.
    pub(crate) fn lookup_subst(
        &self,
        context: ResolveContext,
        expr: &SubstitutionExpression,
        prefix_length: usize,
    ) -> Result<(ResolveContext, Option<ConfigValue>), ResolveError> {
        trace!(
            depth = context.depth(),
            parents = self.parent_depth(),
            "looking up {}",
            expr
        );

        let stripped = expr.path().sub_path(prefix_length);

        let (context, found) = match &stripped {
            Some(path) => self.find_in_root(context, path)?,
            None => (context, None),
        };

        let (context, found) = if found.is_none() && prefix_length > 0 {
            self.find_in_root(context, expr.path())?
        } else {
            (context, found)
        };

        if found.is_none() && context.options().use_system_environment() {
            let path = stripped.as_ref().unwrap_or_else(|| expr.path());
            if let Some(value) = env_lookup(path) {
                return Ok((context, Some(value)));
            }
        }

        Ok((context, found))
    }

    /// Walk the tree along `path`, resolving just enough to keep going
    ///
    /// The value at the final position is returned as-is, unresolved if it
    /// is unresolved; the caller decides how to resolve it.
    fn find_in_root(
        &self,
        context: ResolveContext,
        path: &Path,
    ) -> Result<(ResolveContext, Option<ConfigValue>), ResolveError> {
        let original_restrict = context.restrict_to_child().cloned();
        let mut context = context;
        // substitution paths are absolute
        let mut source = self.reset_parents();
        let mut current = ConfigValue::Object((*self.root).clone());
        let mut remaining = Some(path.clone());

        loop {
            if let Some(replacement) = source.replacement_for(current.id()) {
                current = replacement.clone();
            }

            let Some(rem) = remaining.clone() else {
                return Ok((context, Some(current)));
            };

            match &current {
                ConfigValue::Object(obj) => match obj.get(rem.first()) {
                    None => return Ok((context, None)),
                    Some(child) => {
                        source = source.push_parent(obj);
                        let child = child.clone();
                        remaining = rem.remainder();
                        current = child;
                    }
                },
                ConfigValue::DelayedMergeObject(dm) => match peek_in_stack(dm, rem.first()) {
                    Peek::Final(value) => {
                        remaining = rem.remainder();
                        current = value;
                    }
                    Peek::Absent => return Ok((context, None)),
                    Peek::NeedsResolve => {
                        let result = context
                            .restrict(Some(rem.clone()))
                            .resolve(&current, &source)?;
                        context = result.context.restrict(original_restrict.clone());
                        match continue_through(result.value) {
                            Some(value) => current = value,
                            None => return Ok((context, None)),
                        }
                    }
                },
                ConfigValue::Reference(_)
                | ConfigValue::Concat(_)
                | ConfigValue::DelayedMerge(_) => {
                    // an unresolved value in the middle of the path must
                    // resolve before we can descend
                    let result = context
                        .restrict(Some(rem.clone()))
                        .resolve(&current, &source)?;
                    context = result.context.restrict(original_restrict.clone());
                    match continue_through(result.value) {
                        Some(value) => current = value,
                        None => return Ok((context, None)),
                    }
                }
                // the path goes through a scalar or a list
                _ => return Ok((context, None)),
            }
        }
    }
}

/// An intermediate that resolved to something we still cannot descend
/// into (possible under allow_unresolved) ends the lookup
fn continue_through(resolved: Option<ConfigValue>) -> Option<ConfigValue> {
    let value = resolved?;
    if value.resolve_status() == ResolveStatus::Unresolved
        && !matches!(value, ConfigValue::Object(_))
    {
        return None;
    }
    Some(value)
}

/// Peek a key through a delayed merge stack without resolving it
///
/// A hit that ignores fallbacks cannot be affected by lower layers, so it
/// is final. An object hit could still be filled in from below, and an
/// unresolved layer hides everything under it; both force a resolve.
fn peek_in_stack(dm: &ConfigDelayedMerge, key: &str) -> Peek {
    for layer in dm.stack() {
        match layer {
            ConfigValue::Object(obj) => match obj.get(key) {
                Some(child) if child.ignores_fallbacks() => return Peek::Final(child.clone()),
                Some(_) => return Peek::NeedsResolve,
                None => continue,
            },
            _ => return Peek::NeedsResolve,
        }
    }
    Peek::Absent
}

/// Environment fallback: path segments joined with `_`
fn env_lookup(path: &Path) -> Option<ConfigValue> {
    let name = path.segments().join("_");
    let value = std::env::var(&name).ok()?;
    let origin = Origin::new(format!("env variable {}", name));
    Some(ConfigValue::String(origin, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use crate::value::{ConfigList, Number};

    fn origin() -> Origin {
        Origin::new("test")
    }

    fn object(entries: Vec<(&str, ConfigValue)>) -> ConfigObject {
        let map: IndexMap<String, ConfigValue> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        ConfigObject::new(origin(), map)
    }

    fn int(i: i64) -> ConfigValue {
        ConfigValue::Number(origin(), Number::Int(i))
    }

    #[test]
    fn test_push_and_pop_parent_round_trip() {
        let obj = object(vec![("a", int(1))]);
        let source = ResolveSource::new(obj.clone());
        assert_eq!(source.parent_depth(), 0);

        let pushed = source.push_parent(&obj);
        assert_eq!(pushed.parent_depth(), 1);
        assert_eq!(pushed.pop_parent().parent_depth(), 0);
        // the original source is untouched
        assert_eq!(source.parent_depth(), 0);
    }

    #[test]
    fn test_replacement_overrides_node_by_id() {
        let list = ConfigValue::List(ConfigList::new(origin(), vec![int(1)]));
        let id = list.id().unwrap();
        let source = ResolveSource::new(object(vec![("a", list.clone())]));

        assert!(source.replacement_for(Some(id)).is_none());
        let replaced = source.replace(id, int(9));
        assert_eq!(replaced.replacement_for(Some(id)), Some(&int(9)));
    }

    #[test]
    fn test_newest_replacement_wins() {
        let list = ConfigValue::List(ConfigList::new(origin(), vec![]));
        let id = list.id().unwrap();
        let source = ResolveSource::new(object(vec![]))
            .replace(id, int(1))
            .replace(id, int(2));
        assert_eq!(source.replacement_for(Some(id)), Some(&int(2)));
    }

    #[test]
    fn test_env_lookup_joins_segments_with_underscores() {
        std::env::set_var("HOCONF_TEST_ENV_database_host", "db.internal");
        let path = Path::parse("HOCONF_TEST_ENV.database.host").unwrap();
        let value = env_lookup(&path).unwrap();
        assert_eq!(value.as_str(), Some("db.internal"));
        std::env::remove_var("HOCONF_TEST_ENV_database_host");
    }

    #[test]
    fn test_env_lookup_single_segment_is_plain_name() {
        std::env::set_var("HOCONF_TEST_PLAIN", "value");
        let path = Path::parse("HOCONF_TEST_PLAIN").unwrap();
        assert_eq!(env_lookup(&path).unwrap().as_str(), Some("value"));
        std::env::remove_var("HOCONF_TEST_PLAIN");
    }

    #[test]
    fn test_env_lookup_missing_is_none() {
        std::env::remove_var("HOCONF_TEST_MISSING");
        let path = Path::parse("HOCONF_TEST_MISSING").unwrap();
        assert!(env_lookup(&path).is_none());
    }
}
