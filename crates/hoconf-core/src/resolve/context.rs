//! The resolver engine
//!
//! [`ResolveContext`] drives one resolution: it threads memos, the
//! restriction path, the diagnostic trace, and the cycle markers through
//! every step, functionally. Each step returns a [`ResolveResult`] pairing
//! the possibly-enlarged context with the resolved value; an absent value
//! means a dropped optional substitution.
//!
//! Cycle detection raises the internal [`NotPossibleToResolve`] signal,
//! which only reference resolution catches: an optional reference becomes
//! absent, a required one becomes a fatal unresolved-substitution error.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::trace;

use crate::error::Error;
use crate::path::Path;
use crate::subst::SubstitutionExpression;
use crate::value::{
    ConfigConcat, ConfigDelayedMerge, ConfigList, ConfigObject, ConfigReference, ConfigValue,
    NodeId, ResolveStatus,
};

use super::memos::{MemoKey, ResolveMemos};
use super::options::ResolveOptions;
use super::source::ResolveSource;

/// Pathological nesting beyond this depth is an internal error rather
/// than a stack overflow.
const MAX_RESOLVE_DEPTH: usize = 30;

/// Recoverable "this node is currently being resolved" signal
#[derive(Debug)]
pub(crate) struct NotPossibleToResolve {
    trace: String,
}

impl NotPossibleToResolve {
    fn new(trace: String) -> Self {
        Self { trace }
    }

    /// The substitution chain active when the cycle was detected
    pub(crate) fn trace(&self) -> &str {
        &self.trace
    }
}

/// Internal error channel of the engine
///
/// Fatal errors propagate to the caller unchanged. `NotPossible` is caught
/// by the nearest enclosing reference; if it reaches the entry point, that
/// is a bug.
#[derive(Debug)]
pub(crate) enum ResolveError {
    NotPossible(NotPossibleToResolve),
    Fatal(Error),
}

impl From<Error> for ResolveError {
    fn from(error: Error) -> Self {
        ResolveError::Fatal(error)
    }
}

/// The (new context, new value) pair returned by every resolve step
pub(crate) struct ResolveResult {
    pub(crate) context: ResolveContext,
    pub(crate) value: Option<ConfigValue>,
}

impl ResolveResult {
    fn new(context: ResolveContext, value: Option<ConfigValue>) -> Self {
        Self { context, value }
    }
}

/// One entry of the diagnostic trace stack
#[derive(Debug, Clone)]
enum TraceFrame {
    Reference(SubstitutionExpression),
    Other(&'static str),
}

/// Functionally threaded resolver state
#[derive(Debug, Clone)]
pub(crate) struct ResolveContext {
    memos: ResolveMemos,
    options: ResolveOptions,
    // the current path restriction, used to keep resolution lazy and to
    // avoid gratuitous cycles through siblings of the value we need
    restrict_to_child: Option<Path>,
    // every node we are inside resolving, for error messages
    resolve_stack: Vec<TraceFrame>,
    cycle_markers: HashSet<NodeId>,
}

impl ResolveContext {
    pub(crate) fn new(options: ResolveOptions, restrict_to_child: Option<Path>) -> Self {
        Self {
            memos: ResolveMemos::new(),
            options,
            restrict_to_child,
            resolve_stack: Vec::new(),
            cycle_markers: HashSet::new(),
        }
    }

    pub(crate) fn options(&self) -> &ResolveOptions {
        &self.options
    }

    pub(crate) fn is_restricted(&self) -> bool {
        self.restrict_to_child.is_some()
    }

    pub(crate) fn restrict_to_child(&self) -> Option<&Path> {
        self.restrict_to_child.as_ref()
    }

    pub(crate) fn restrict(mut self, restrict_to_child: Option<Path>) -> Self {
        self.restrict_to_child = restrict_to_child;
        self
    }

    pub(crate) fn unrestricted(self) -> Self {
        self.restrict(None)
    }

    pub(crate) fn depth(&self) -> usize {
        self.resolve_stack.len()
    }

    /// The substitution expressions currently being resolved, rendered
    /// for error messages
    pub(crate) fn trace_string(&self) -> String {
        let refs: Vec<String> = self
            .resolve_stack
            .iter()
            .filter_map(|frame| match frame {
                TraceFrame::Reference(expr) => Some(expr.to_string()),
                TraceFrame::Other(_) => None,
            })
            .collect();
        refs.join(", ")
    }

    fn push_trace(mut self, value: &ConfigValue) -> Result<Self, ResolveError> {
        if self.resolve_stack.len() > MAX_RESOLVE_DEPTH {
            return Err(Error::bug_or_broken("resolve getting too deep").into());
        }
        let frame = match value {
            ConfigValue::Reference(r) => TraceFrame::Reference(r.expr().clone()),
            other => TraceFrame::Other(other.type_name()),
        };
        self.resolve_stack.push(frame);
        Ok(self)
    }

    fn pop_trace(mut self) -> Self {
        self.resolve_stack.pop();
        self
    }

    fn add_cycle_marker(mut self, id: NodeId) -> Result<Self, ResolveError> {
        if !self.cycle_markers.insert(id) {
            return Err(Error::bug_or_broken("cycle marker added twice").into());
        }
        Ok(self)
    }

    fn remove_cycle_marker(mut self, id: NodeId) -> Self {
        self.cycle_markers.remove(&id);
        self
    }

    fn memoize(mut self, key: MemoKey, value: ConfigValue) -> Self {
        self.memos = self.memos.put(key, value);
        self
    }

    /// Resolve one node, consulting and enlarging the memo table
    pub(crate) fn resolve(
        self,
        original: &ConfigValue,
        source: &ResolveSource,
    ) -> Result<ResolveResult, ResolveError> {
        trace!(
            depth = self.depth(),
            restrict = ?self.restrict_to_child,
            "resolving {}",
            original.type_name()
        );
        let context = self.push_trace(original)?;
        let result = context.real_resolve(original, source)?;
        Ok(ResolveResult::new(result.context.pop_trace(), result.value))
    }

    fn real_resolve(
        self,
        original: &ConfigValue,
        source: &ResolveSource,
    ) -> Result<ResolveResult, ResolveError> {
        // a fully resolved value cached under the unrestricted key
        // satisfies a restricted request too, so always check that first
        let node = original.id();
        let full_key = node.map(|id| MemoKey::new(id, None));
        let mut restricted_key = None;

        if let Some(full) = &full_key {
            if let Some(cached) = self.memos.get(full) {
                let cached = cached.clone();
                trace!(depth = self.depth(), "using cached resolution");
                return Ok(ResolveResult::new(self, Some(cached)));
            }
            if self.is_restricted() {
                // no full resolution cached; we will only compute the
                // restricted child, so use the narrower key
                let key = MemoKey::new(node.unwrap(), self.restrict_to_child.clone());
                if let Some(cached) = self.memos.get(&key) {
                    let cached = cached.clone();
                    return Ok(ResolveResult::new(self, Some(cached)));
                }
                restricted_key = Some(key);
            }
        }

        if let Some(id) = node {
            if self.cycle_markers.contains(&id) {
                trace!(depth = self.depth(), "cycle detected");
                return Err(ResolveError::NotPossible(NotPossibleToResolve::new(
                    self.trace_string(),
                )));
            }
        }

        let allow_unresolved = self.options.allow_unresolved();
        let result = resolve_step(original, self, source)?;
        let mut context = result.context;
        let resolved = result.value;

        if let (Some(value), Some(full)) = (&resolved, full_key) {
            if value.resolve_status() == ResolveStatus::Resolved {
                // resolving the restricted child may have been enough to
                // finish the whole value, in which case everyone can use it
                context = context.memoize(full, value.clone());
            } else if let Some(restricted) = restricted_key {
                context = context.memoize(restricted, value.clone());
            } else if allow_unresolved {
                context = context.memoize(full, value.clone());
            } else {
                return Err(Error::bug_or_broken(
                    "resolution step returned an unresolved value without permission",
                )
                .into());
            }
        }

        Ok(ResolveResult::new(context, resolved))
    }
}

/// One resolution step, dispatched on the variant of `original`
fn resolve_step(
    original: &ConfigValue,
    context: ResolveContext,
    source: &ResolveSource,
) -> Result<ResolveResult, ResolveError> {
    if original.resolve_status() == ResolveStatus::Resolved {
        return Ok(ResolveResult::new(context, Some(original.clone())));
    }
    match original {
        ConfigValue::Object(obj) => resolve_object(obj, context, source),
        ConfigValue::List(list) => resolve_list(list, context, source),
        ConfigValue::Concat(concat) => resolve_concat(concat, context, source),
        ConfigValue::Reference(reference) => resolve_reference(reference, context, source),
        ConfigValue::DelayedMerge(dm) | ConfigValue::DelayedMergeObject(dm) => {
            resolve_delayed_merge(dm, context, source)
        }
        // scalars are always resolved and handled by the fast path
        other => Ok(ResolveResult::new(context, Some(other.clone()))),
    }
}

fn resolve_object(
    obj: &ConfigObject,
    context: ResolveContext,
    source: &ResolveSource,
) -> Result<ResolveResult, ResolveError> {
    let original_restrict = context.restrict_to_child.clone();
    let source = source.push_parent(obj);
    let mut context = context;
    let mut entries: IndexMap<String, ConfigValue> = IndexMap::with_capacity(obj.len());

    for (key, value) in obj.entries() {
        if let Some(restrict) = original_restrict.clone() {
            if restrict.first() == key {
                if let Some(remainder) = restrict.remainder() {
                    let result = context.restrict(Some(remainder)).resolve(value, &source)?;
                    context = result.context.restrict(original_restrict.clone());
                    if let Some(v) = result.value {
                        entries.insert(key.clone(), v);
                    }
                } else {
                    // restricted exactly to this child: the lookup that
                    // restricted us resolves the leaf itself
                    entries.insert(key.clone(), value.clone());
                }
            } else {
                // siblings off the restriction path stay untouched
                entries.insert(key.clone(), value.clone());
            }
        } else {
            let result = context.unrestricted().resolve(value, &source)?;
            context = result.context.restrict(original_restrict.clone());
            if let Some(v) = result.value {
                entries.insert(key.clone(), v);
            }
            // an absent entry value drops the entry entirely
        }
    }

    Ok(ResolveResult::new(
        context,
        Some(ConfigValue::Object(obj.rebuild(entries))),
    ))
}

fn resolve_list(
    list: &ConfigList,
    context: ResolveContext,
    source: &ResolveSource,
) -> Result<ResolveResult, ResolveError> {
    let original_restrict = context.restrict_to_child.clone();
    let mut context = context;
    let mut items = Vec::with_capacity(list.len());

    for item in list.items() {
        let result = context.unrestricted().resolve(item, source)?;
        context = result.context.restrict(original_restrict.clone());
        if let Some(v) = result.value {
            items.push(v);
        }
    }

    Ok(ResolveResult::new(
        context,
        Some(ConfigValue::List(list.rebuild(items))),
    ))
}

fn resolve_concat(
    concat: &ConfigConcat,
    context: ResolveContext,
    source: &ResolveSource,
) -> Result<ResolveResult, ResolveError> {
    let original_restrict = context.restrict_to_child.clone();
    let mut context = context;
    let mut pieces = Vec::with_capacity(concat.pieces().len());

    for piece in concat.pieces() {
        let result = context.unrestricted().resolve(piece, source)?;
        context = result.context.restrict(original_restrict.clone());
        if let Some(v) = result.value {
            pieces.push(v);
        }
        // dropped optional substitutions vanish from the pieces
    }

    if pieces.is_empty() {
        return Ok(ResolveResult::new(context, None));
    }

    if pieces
        .iter()
        .any(|p| p.resolve_status() == ResolveStatus::Unresolved)
    {
        // allow_unresolved left a piece in place; keep the concatenation
        return Ok(ResolveResult::new(
            context,
            Some(ConfigValue::Concat(concat.rebuild(pieces))),
        ));
    }

    let joined = ConfigConcat::join(pieces, concat.origin())?;
    Ok(ResolveResult::new(context, Some(joined)))
}

fn resolve_reference(
    reference: &ConfigReference,
    context: ResolveContext,
    source: &ResolveSource,
) -> Result<ResolveResult, ResolveError> {
    let id = reference.id();
    let expr = reference.expr();
    let context = context.add_cycle_marker(id)?;
    // on a failed attempt we continue from here, discarding whatever the
    // attempt accumulated
    let before_attempt = context.clone();

    let (context, value) = match lookup_reference(reference, context, source) {
        Ok(pair) => pair,
        Err(ResolveError::NotPossible(e)) => {
            trace!("not possible to resolve {}, cycle involved: {}", expr, e.trace());
            if expr.optional() {
                (before_attempt, None)
            } else {
                return Err(Error::substitution_cycle(
                    expr.path().render(),
                    e.trace().to_string(),
                )
                .with_origin(reference.origin().clone())
                .into());
            }
        }
        Err(fatal) => return Err(fatal),
    };

    if value.is_none() && !expr.optional() {
        if context.options.allow_unresolved() {
            Ok(ResolveResult::new(
                context.remove_cycle_marker(id),
                Some(ConfigValue::Reference(reference.clone())),
            ))
        } else {
            Err(Error::unresolved_substitution(expr.path().render())
                .with_origin(reference.origin().clone())
                .into())
        }
    } else {
        Ok(ResolveResult::new(context.remove_cycle_marker(id), value))
    }
}

fn lookup_reference(
    reference: &ConfigReference,
    context: ResolveContext,
    source: &ResolveSource,
) -> Result<(ResolveContext, Option<ConfigValue>), ResolveError> {
    let (context, found) =
        source.lookup_subst(context, reference.expr(), reference.prefix_length())?;
    match found {
        None => Ok((context, None)),
        Some(value) => {
            // a lookup that lands back on the node being resolved is a bare
            // self-reference with no earlier value to fall back to
            if value.id() == Some(reference.id()) {
                return Ok((context, None));
            }
            // the reference is satisfied only by a fully resolved target
            let original_restrict = context.restrict_to_child.clone();
            let result = context.unrestricted().resolve(&value, source)?;
            Ok((result.context.restrict(original_restrict), result.value))
        }
    }
}

fn resolve_delayed_merge(
    dm: &ConfigDelayedMerge,
    context: ResolveContext,
    source: &ResolveSource,
) -> Result<ResolveResult, ResolveError> {
    let id = dm.id();
    let stack = dm.stack();
    let mut context = context.add_cycle_marker(id)?;

    let mut merged: Option<ConfigValue> = None;
    let mut resolved_layers: Vec<ConfigValue> = Vec::new();
    let mut kept_delayed: Option<ConfigValue> = None;

    for (index, layer) in stack.iter().enumerate() {
        // a self-reference inside this layer must see the merge of the
        // layers below it, not re-enter this node
        let layer_source = match remainder_of_stack(stack, index + 1) {
            Some(remainder) => source.replace(id, remainder),
            None => source.clone(),
        };

        let result = context.resolve(layer, &layer_source)?;
        context = result.context;
        let Some(value) = result.value else {
            // a dropped optional layer falls through to the next one
            continue;
        };

        let is_object = matches!(value, ConfigValue::Object(_));

        if value.resolve_status() == ResolveStatus::Unresolved && !is_object {
            // allow_unresolved left a layer in place; the merge cannot be
            // decided, so keep the rest of the stack delayed
            let mut new_stack = resolved_layers.clone();
            new_stack.push(value);
            new_stack.extend(stack[index + 1..].iter().cloned());
            kept_delayed = Some(rebuild_delayed(dm, new_stack));
            break;
        }

        resolved_layers.push(value.clone());

        match merged.take() {
            None => {
                merged = Some(value);
                if !is_object {
                    // a non-object value shadows everything below it
                    break;
                }
            }
            Some(acc) => {
                if is_object {
                    merged = Some(acc.with_fallback(value));
                } else {
                    // a non-object layer under the accumulated object ends
                    // the merge chain
                    merged = Some(acc);
                    break;
                }
            }
        }
    }

    let context = context.remove_cycle_marker(id);

    if let Some(delayed) = kept_delayed {
        return Ok(ResolveResult::new(context, Some(delayed)));
    }

    Ok(ResolveResult::new(context, merged))
}

fn remainder_of_stack(stack: &[ConfigValue], from: usize) -> Option<ConfigValue> {
    let mut layers = stack.get(from..)?.iter().cloned();
    let first = layers.next()?;
    Some(layers.fold(first, |acc, lower| acc.with_fallback(lower)))
}

fn rebuild_delayed(dm: &ConfigDelayedMerge, stack: Vec<ConfigValue>) -> ConfigValue {
    let object_topped = matches!(stack.first(), Some(ConfigValue::Object(_)));
    let rebuilt = dm.rebuild(stack);
    if object_topped {
        ConfigValue::DelayedMergeObject(rebuilt)
    } else {
        ConfigValue::DelayedMerge(rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use crate::value::Number;

    fn origin() -> Origin {
        Origin::new("test")
    }

    fn int(i: i64) -> ConfigValue {
        ConfigValue::Number(origin(), Number::Int(i))
    }

    fn string(s: &str) -> ConfigValue {
        ConfigValue::String(origin(), s.to_string())
    }

    fn reference_with_prefix(path: &str, prefix_length: usize) -> ConfigValue {
        ConfigValue::Reference(ConfigReference::with_prefix_length(
            origin(),
            SubstitutionExpression::new(Path::parse(path).unwrap(), false),
            prefix_length,
        ))
    }

    fn object(entries: Vec<(&str, ConfigValue)>) -> ConfigObject {
        let map: IndexMap<String, ConfigValue> = entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        ConfigObject::new(origin(), map)
    }

    fn run(root: ConfigObject, options: ResolveOptions) -> Result<ConfigObject, Error> {
        crate::resolve::resolve(&root, options)
    }

    #[test]
    fn test_prefixed_reference_strips_prefix_first() {
        // a reference written as ${x} inside a file included at `outer`
        // carries the prefixed path outer.x and prefix_length 1; with no
        // outer.x present, the lookup falls back to plain x at the root
        let root = object(vec![
            ("x", int(42)),
            ("outer", ConfigValue::Object(object(vec![
                ("y", reference_with_prefix("outer.x", 1)),
            ]))),
        ]);
        // stripped path `x` is tried first and hits the root-level value
        let resolved = run(root, ResolveOptions::new()).unwrap();
        let outer = resolved.get("outer").unwrap().as_object().unwrap();
        assert_eq!(outer.get("y").unwrap().as_i64(), Some(42));
    }

    #[test]
    fn test_prefixed_reference_retries_full_path() {
        // the stripped path misses, so the prefixed path is consulted
        let root = object(vec![(
            "outer",
            ConfigValue::Object(object(vec![
                ("x", string("from include scope")),
                ("y", reference_with_prefix("outer.x", 1)),
            ])),
        )]);
        let resolved = run(root, ResolveOptions::new()).unwrap();
        let outer = resolved.get("outer").unwrap().as_object().unwrap();
        assert_eq!(
            outer.get("y").unwrap().as_str(),
            Some("from include scope")
        );
    }

    #[test]
    fn test_depth_guard_is_an_internal_error() {
        // 40 nested objects force the trace stack past the bound even
        // though nothing is circular
        let mut value = reference_with_prefix("missing", 0);
        for i in 0..40 {
            value = ConfigValue::Object(object(vec![(&format!("k{}", i), value)]));
        }
        let root = match value {
            ConfigValue::Object(obj) => obj,
            _ => unreachable!(),
        };
        let err = run(root, ResolveOptions::new()).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::ErrorKind::BugOrBroken { .. }
        ));
    }

    #[test]
    fn test_restricted_resolve_leaves_siblings_unresolved() {
        let root = object(vec![
            ("wanted", reference_with_prefix("value", 0)),
            ("ignored", reference_with_prefix("does.not.exist", 0)),
            ("value", int(7)),
        ]);

        let source = ResolveSource::new(root.clone());
        let context = ResolveContext::new(
            ResolveOptions::new(),
            Some(Path::parse("wanted").unwrap()),
        );
        let result = context
            .resolve(&ConfigValue::Object(root), &source)
            .unwrap_or_else(|_| panic!("restricted resolve failed"));

        let obj = match result.value.unwrap() {
            ConfigValue::Object(obj) => obj,
            other => panic!("expected object, got {:?}", other),
        };
        // the sibling with a dangling reference was never touched
        assert!(matches!(
            obj.get("ignored"),
            Some(ConfigValue::Reference(_))
        ));
        assert_eq!(obj.resolve_status(), ResolveStatus::Unresolved);
    }

    #[test]
    fn test_trace_string_renders_only_references() {
        let context = ResolveContext::new(ResolveOptions::new(), None);
        let context = context.push_trace(&int(1)).unwrap();
        let context = context
            .push_trace(&reference_with_prefix("a.b", 0))
            .unwrap();
        assert_eq!(context.trace_string(), "${a.b}");
    }

    #[test]
    fn test_cycle_marker_twice_is_a_bug() {
        let id = match reference_with_prefix("a", 0) {
            ConfigValue::Reference(r) => r.id(),
            _ => unreachable!(),
        };
        let context = ResolveContext::new(ResolveOptions::new(), None);
        let context = context.add_cycle_marker(id).unwrap();
        let err = context.add_cycle_marker(id).unwrap_err();
        assert!(matches!(err, ResolveError::Fatal(_)));
    }
}
