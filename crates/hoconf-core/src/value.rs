//! Configuration value trees
//!
//! [`ConfigValue`] is the parsed-and-merged configuration tree, before and
//! after substitution resolution. Scalar variants are always resolved;
//! `Reference`, `Concat` and the delayed merges are the unresolved forms
//! the resolver rewrites. Composites cache their [`ResolveStatus`] at
//! construction and carry a [`NodeId`] that survives cloning, so the
//! resolver can memoize and cycle-detect by node identity rather than by
//! structure.

use indexmap::IndexMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};
use crate::origin::Origin;
use crate::subst::SubstitutionExpression;

/// Stable identity of a tree node, preserved by `Clone`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn fresh() -> NodeId {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NodeId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Whether a value transitively contains any substitutions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStatus {
    Resolved,
    Unresolved,
}

impl ResolveStatus {
    fn from_children<'a>(children: impl IntoIterator<Item = &'a ConfigValue>) -> ResolveStatus {
        for child in children {
            if child.resolve_status() == ResolveStatus::Unresolved {
                return ResolveStatus::Unresolved;
            }
        }
        ResolveStatus::Resolved
    }
}

/// A numeric value, integer or floating point
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(i) => *i as f64,
            Number::Float(f) => *f,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int(i) => Some(*i),
            Number::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Number::Float(_) => None,
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{}", x),
        }
    }
}

/// A configuration value
///
/// Equality compares values structurally and ignores origins and node ids.
#[derive(Debug, Clone)]
pub enum ConfigValue {
    Null(Origin),
    Bool(Origin, bool),
    Number(Origin, Number),
    String(Origin, String),
    List(ConfigList),
    Object(ConfigObject),
    /// An unresolved `${path}` or `${?path}`
    Reference(ConfigReference),
    /// An unresolved value concatenation, e.g. `a ${b} c`
    Concat(ConfigConcat),
    /// An unresolved override stack, highest priority first
    DelayedMerge(ConfigDelayedMerge),
    /// An unresolved override stack whose top layer is an object
    DelayedMergeObject(ConfigDelayedMerge),
}

/// An ordered list of values
#[derive(Debug, Clone)]
pub struct ConfigList {
    id: NodeId,
    origin: Origin,
    items: Vec<ConfigValue>,
    status: ResolveStatus,
}

impl ConfigList {
    pub fn new(origin: Origin, items: Vec<ConfigValue>) -> Self {
        let status = ResolveStatus::from_children(&items);
        Self {
            id: NodeId::fresh(),
            origin,
            items,
            status,
        }
    }

    /// Same node, new items: resolution rewrites a list in place
    pub(crate) fn rebuild(&self, items: Vec<ConfigValue>) -> Self {
        let status = ResolveStatus::from_children(&items);
        Self {
            id: self.id,
            origin: self.origin.clone(),
            items,
            status,
        }
    }

    pub fn items(&self) -> &[ConfigValue] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A key-to-value mapping with insertion-ordered iteration
#[derive(Debug, Clone)]
pub struct ConfigObject {
    id: NodeId,
    origin: Origin,
    entries: IndexMap<String, ConfigValue>,
    ignores_fallbacks: bool,
    status: ResolveStatus,
}

impl ConfigObject {
    pub fn new(origin: Origin, entries: IndexMap<String, ConfigValue>) -> Self {
        let status = ResolveStatus::from_children(entries.values());
        Self {
            id: NodeId::fresh(),
            origin,
            entries,
            ignores_fallbacks: false,
            status,
        }
    }

    /// An empty object
    pub fn empty(origin: Origin) -> Self {
        Self::new(origin, IndexMap::new())
    }

    /// Same node, new entries: resolution rewrites an object in place
    pub(crate) fn rebuild(&self, entries: IndexMap<String, ConfigValue>) -> Self {
        let status = ResolveStatus::from_children(entries.values());
        Self {
            id: self.id,
            origin: self.origin.clone(),
            entries,
            ignores_fallbacks: self.ignores_fallbacks,
            status,
        }
    }

    /// A copy that no longer merges with fallback values
    pub(crate) fn with_fallbacks_ignored(mut self) -> Self {
        self.ignores_fallbacks = true;
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> &IndexMap<String, ConfigValue> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolve_status(&self) -> ResolveStatus {
        self.status
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Merge `fallback` underneath this object: our keys win, recursively
    fn merged_with_object(self, fallback: ConfigObject) -> ConfigObject {
        let origin = self.origin.clone();
        let mut entries = fallback.entries;
        for (key, new_value) in self.entries {
            match entries.shift_remove_full(&key) {
                Some((index, _, old_value)) => {
                    let merged = new_value.with_fallback(old_value);
                    entries.shift_insert(index, key, merged);
                }
                None => {
                    entries.insert(key, new_value);
                }
            }
        }
        ConfigObject::new(origin, entries)
    }
}

/// An unresolved substitution
#[derive(Debug, Clone)]
pub struct ConfigReference {
    id: NodeId,
    origin: Origin,
    expr: SubstitutionExpression,
    prefix_length: usize,
}

impl ConfigReference {
    pub fn new(origin: Origin, expr: SubstitutionExpression) -> Self {
        Self {
            id: NodeId::fresh(),
            origin,
            expr,
            prefix_length: 0,
        }
    }

    /// A reference inherited from an included file: `prefix_length` segments
    /// were prepended to the path, and lookup falls back across them.
    pub fn with_prefix_length(origin: Origin, expr: SubstitutionExpression, prefix_length: usize) -> Self {
        Self {
            id: NodeId::fresh(),
            origin,
            expr,
            prefix_length,
        }
    }

    pub fn expr(&self) -> &SubstitutionExpression {
        &self.expr
    }

    pub fn prefix_length(&self) -> usize {
        self.prefix_length
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }
}

/// An unresolved value concatenation
#[derive(Debug, Clone)]
pub struct ConfigConcat {
    id: NodeId,
    origin: Origin,
    pieces: Vec<ConfigValue>,
}

impl ConfigConcat {
    pub fn new(origin: Origin, pieces: Vec<ConfigValue>) -> Self {
        Self {
            id: NodeId::fresh(),
            origin,
            pieces,
        }
    }

    pub(crate) fn rebuild(&self, pieces: Vec<ConfigValue>) -> Self {
        Self {
            id: self.id,
            origin: self.origin.clone(),
            pieces,
        }
    }

    pub fn pieces(&self) -> &[ConfigValue] {
        &self.pieces
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    /// Join fully resolved pieces into a single value
    ///
    /// All-object pieces merge left to right with later pieces winning;
    /// all-list pieces concatenate; otherwise every piece stringifies and
    /// the texts join. Whitespace pieces between objects or lists are
    /// separators, not content. Mixing categories is a type error.
    pub(crate) fn join(pieces: Vec<ConfigValue>, origin: &Origin) -> Result<ConfigValue> {
        let any_object = pieces.iter().any(|p| matches!(p, ConfigValue::Object(_)));
        let any_list = pieces.iter().any(|p| matches!(p, ConfigValue::List(_)));

        let pieces: Vec<ConfigValue> = if any_object || any_list {
            pieces
                .into_iter()
                .filter(|p| !is_whitespace_string(p))
                .collect()
        } else {
            pieces
        };

        if pieces.len() == 1 {
            return Ok(pieces.into_iter().next().unwrap());
        }

        if any_object {
            let mut merged: Option<ConfigValue> = None;
            for piece in pieces {
                if !matches!(piece, ConfigValue::Object(_)) {
                    return Err(Error::wrong_type("object", piece.type_name())
                        .with_origin(piece.origin().clone())
                        .with_help(
                            "Objects can only be concatenated with other objects".to_string(),
                        ));
                }
                merged = Some(match merged {
                    None => piece,
                    Some(acc) => piece.with_fallback(acc),
                });
            }
            Ok(merged.expect("join called with empty pieces"))
        } else if any_list {
            let mut items = Vec::new();
            for piece in pieces {
                match piece {
                    ConfigValue::List(list) => items.extend(list.items.iter().cloned()),
                    other => {
                        return Err(Error::wrong_type("list", other.type_name())
                            .with_origin(other.origin().clone())
                            .with_help(
                                "Lists can only be concatenated with other lists".to_string(),
                            ))
                    }
                }
            }
            Ok(ConfigValue::List(ConfigList::new(origin.clone(), items)))
        } else {
            let mut out = String::new();
            for piece in &pieces {
                match piece.transform_to_string() {
                    Some(text) => out.push_str(&text),
                    None => {
                        return Err(Error::wrong_type("string", piece.type_name())
                            .with_origin(piece.origin().clone()))
                    }
                }
            }
            Ok(ConfigValue::String(origin.clone(), out))
        }
    }
}

fn is_whitespace_string(value: &ConfigValue) -> bool {
    matches!(value, ConfigValue::String(_, s) if !s.is_empty() && s.chars().all(char::is_whitespace))
}

/// An unresolved override stack, highest priority first
#[derive(Debug, Clone)]
pub struct ConfigDelayedMerge {
    id: NodeId,
    origin: Origin,
    stack: Vec<ConfigValue>,
}

impl ConfigDelayedMerge {
    pub fn new(origin: Origin, stack: Vec<ConfigValue>) -> Self {
        Self {
            id: NodeId::fresh(),
            origin,
            stack,
        }
    }

    pub(crate) fn rebuild(&self, stack: Vec<ConfigValue>) -> Self {
        Self {
            id: self.id,
            origin: self.origin.clone(),
            stack,
        }
    }

    pub fn stack(&self) -> &[ConfigValue] {
        &self.stack
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }
}

impl ConfigValue {
    /// The origin attached to this value
    pub fn origin(&self) -> &Origin {
        match self {
            ConfigValue::Null(o)
            | ConfigValue::Bool(o, _)
            | ConfigValue::Number(o, _)
            | ConfigValue::String(o, _) => o,
            ConfigValue::List(l) => &l.origin,
            ConfigValue::Object(obj) => &obj.origin,
            ConfigValue::Reference(r) => &r.origin,
            ConfigValue::Concat(c) => &c.origin,
            ConfigValue::DelayedMerge(dm) | ConfigValue::DelayedMergeObject(dm) => &dm.origin,
        }
    }

    /// Node identity, for composites
    pub(crate) fn id(&self) -> Option<NodeId> {
        match self {
            ConfigValue::Null(_)
            | ConfigValue::Bool(_, _)
            | ConfigValue::Number(_, _)
            | ConfigValue::String(_, _) => None,
            ConfigValue::List(l) => Some(l.id),
            ConfigValue::Object(obj) => Some(obj.id),
            ConfigValue::Reference(r) => Some(r.id),
            ConfigValue::Concat(c) => Some(c.id),
            ConfigValue::DelayedMerge(dm) | ConfigValue::DelayedMergeObject(dm) => Some(dm.id),
        }
    }

    /// Whether this value transitively contains any substitutions
    pub fn resolve_status(&self) -> ResolveStatus {
        match self {
            ConfigValue::Null(_)
            | ConfigValue::Bool(_, _)
            | ConfigValue::Number(_, _)
            | ConfigValue::String(_, _) => ResolveStatus::Resolved,
            ConfigValue::List(l) => l.status,
            ConfigValue::Object(obj) => obj.status,
            ConfigValue::Reference(_)
            | ConfigValue::Concat(_)
            | ConfigValue::DelayedMerge(_)
            | ConfigValue::DelayedMergeObject(_) => ResolveStatus::Unresolved,
        }
    }

    /// Whether merging a fallback underneath this value can change it
    pub fn ignores_fallbacks(&self) -> bool {
        match self {
            ConfigValue::Null(_)
            | ConfigValue::Bool(_, _)
            | ConfigValue::Number(_, _)
            | ConfigValue::String(_, _)
            | ConfigValue::List(_) => true,
            ConfigValue::Object(obj) => obj.ignores_fallbacks,
            ConfigValue::Reference(_)
            | ConfigValue::Concat(_)
            | ConfigValue::DelayedMerge(_)
            | ConfigValue::DelayedMergeObject(_) => false,
        }
    }

    /// The kind of this value, for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null(_) => "null",
            ConfigValue::Bool(_, _) => "boolean",
            ConfigValue::Number(_, _) => "number",
            ConfigValue::String(_, _) => "string",
            ConfigValue::List(_) => "list",
            ConfigValue::Object(_) => "object",
            ConfigValue::Reference(_) => "substitution",
            ConfigValue::Concat(_) => "concatenation",
            ConfigValue::DelayedMerge(_) | ConfigValue::DelayedMergeObject(_) => "delayed merge",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(_, b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Number(_, n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(_, n) => Some(n.as_f64()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(_, s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ConfigList> {
        match self {
            ConfigValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ConfigObject> {
        match self {
            ConfigValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Stringify for use inside a string concatenation
    ///
    /// Null renders as the empty string here; objects, lists, and
    /// unresolved values have no string form.
    pub(crate) fn transform_to_string(&self) -> Option<String> {
        match self {
            ConfigValue::Null(_) => Some(String::new()),
            ConfigValue::Bool(_, b) => Some(b.to_string()),
            ConfigValue::Number(_, n) => Some(n.to_string()),
            ConfigValue::String(_, s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Merge `fallback` underneath this value
    ///
    /// This is the parse-time merge for duplicate keys: the newer value
    /// (self) wins. Objects merge deeply; values that ignore fallbacks
    /// shadow; any unresolved participant defers the decision into a
    /// delayed merge, flattening nested stacks.
    pub fn with_fallback(self, fallback: ConfigValue) -> ConfigValue {
        if self.ignores_fallbacks() {
            return self;
        }
        match self {
            ConfigValue::Object(obj) => match fallback {
                ConfigValue::Object(old) => ConfigValue::Object(obj.merged_with_object(old)),
                other if other.resolve_status() == ResolveStatus::Unresolved => {
                    let origin = obj.origin.clone();
                    let mut stack = vec![ConfigValue::Object(obj)];
                    stack.extend(flatten_merge_stack(other));
                    ConfigValue::DelayedMergeObject(ConfigDelayedMerge::new(origin, stack))
                }
                // the non-object fallback shadows anything further down,
                // so this object is done merging
                _ => ConfigValue::Object(obj.with_fallbacks_ignored()),
            },
            ConfigValue::Reference(_) | ConfigValue::Concat(_) => {
                let origin = self.origin().clone();
                let mut stack = vec![self];
                stack.extend(flatten_merge_stack(fallback));
                ConfigValue::DelayedMerge(ConfigDelayedMerge::new(origin, stack))
            }
            ConfigValue::DelayedMerge(dm) => {
                let mut stack = dm.stack.clone();
                stack.extend(flatten_merge_stack(fallback));
                ConfigValue::DelayedMerge(ConfigDelayedMerge::new(dm.origin.clone(), stack))
            }
            ConfigValue::DelayedMergeObject(dm) => {
                let mut stack = dm.stack.clone();
                stack.extend(flatten_merge_stack(fallback));
                ConfigValue::DelayedMergeObject(ConfigDelayedMerge::new(dm.origin.clone(), stack))
            }
            // scalars and lists ignore fallbacks, handled above
            other => other,
        }
    }
}

fn flatten_merge_stack(value: ConfigValue) -> Vec<ConfigValue> {
    match value {
        ConfigValue::DelayedMerge(dm) | ConfigValue::DelayedMergeObject(dm) => dm.stack,
        other => vec![other],
    }
}

impl PartialEq for ConfigObject {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl PartialEq for ConfigList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl PartialEq for ConfigValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ConfigValue::Null(_), ConfigValue::Null(_)) => true,
            (ConfigValue::Bool(_, a), ConfigValue::Bool(_, b)) => a == b,
            (ConfigValue::Number(_, a), ConfigValue::Number(_, b)) => a == b,
            (ConfigValue::String(_, a), ConfigValue::String(_, b)) => a == b,
            (ConfigValue::List(a), ConfigValue::List(b)) => a == b,
            (ConfigValue::Object(a), ConfigValue::Object(b)) => a == b,
            (ConfigValue::Reference(a), ConfigValue::Reference(b)) => {
                a.expr == b.expr && a.prefix_length == b.prefix_length
            }
            (ConfigValue::Concat(a), ConfigValue::Concat(b)) => a.pieces == b.pieces,
            (ConfigValue::DelayedMerge(a), ConfigValue::DelayedMerge(b)) => a.stack == b.stack,
            (ConfigValue::DelayedMergeObject(a), ConfigValue::DelayedMergeObject(b)) => {
                a.stack == b.stack
            }
            _ => false,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Null(_) => write!(f, "null"),
            ConfigValue::Bool(_, b) => write!(f, "{}", b),
            ConfigValue::Number(_, n) => write!(f, "{}", n),
            ConfigValue::String(_, s) => write!(f, "{}", s),
            ConfigValue::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            ConfigValue::Object(obj) => {
                write!(f, "{{")?;
                for (i, (k, v)) in obj.entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            ConfigValue::Reference(r) => write!(f, "{}", r.expr),
            ConfigValue::Concat(c) => {
                for piece in &c.pieces {
                    write!(f, "{}", piece)?;
                }
                Ok(())
            }
            ConfigValue::DelayedMerge(dm) | ConfigValue::DelayedMergeObject(dm) => {
                write!(f, "merge(")?;
                for (i, layer) in dm.stack.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", layer)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;

    fn origin() -> Origin {
        Origin::new("test")
    }

    fn string(s: &str) -> ConfigValue {
        ConfigValue::String(origin(), s.to_string())
    }

    fn int(i: i64) -> ConfigValue {
        ConfigValue::Number(origin(), Number::Int(i))
    }

    fn object(entries: Vec<(&str, ConfigValue)>) -> ConfigValue {
        let map: IndexMap<String, ConfigValue> =
            entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        ConfigValue::Object(ConfigObject::new(origin(), map))
    }

    fn reference(path: &str) -> ConfigValue {
        ConfigValue::Reference(ConfigReference::new(
            origin(),
            SubstitutionExpression::new(Path::parse(path).unwrap(), false),
        ))
    }

    #[test]
    fn test_scalars_are_resolved() {
        assert_eq!(
            ConfigValue::Null(origin()).resolve_status(),
            ResolveStatus::Resolved
        );
        assert_eq!(int(1).resolve_status(), ResolveStatus::Resolved);
        assert_eq!(string("x").resolve_status(), ResolveStatus::Resolved);
    }

    #[test]
    fn test_status_propagates_through_composites() {
        let resolved = object(vec![("a", int(1))]);
        assert_eq!(resolved.resolve_status(), ResolveStatus::Resolved);

        let unresolved = object(vec![("a", reference("b"))]);
        assert_eq!(unresolved.resolve_status(), ResolveStatus::Unresolved);

        let nested = object(vec![("outer", unresolved)]);
        assert_eq!(nested.resolve_status(), ResolveStatus::Unresolved);
    }

    #[test]
    fn test_node_id_survives_clone() {
        let value = object(vec![("a", int(1))]);
        let clone = value.clone();
        assert_eq!(value.id(), clone.id());
    }

    #[test]
    fn test_distinct_nodes_have_distinct_ids() {
        let a = object(vec![("a", int(1))]);
        let b = object(vec![("a", int(1))]);
        assert_eq!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_number_cross_equality() {
        assert_eq!(Number::Int(2), Number::Float(2.0));
        assert_ne!(Number::Int(2), Number::Float(2.5));
        assert_eq!(Number::Float(1.5), Number::Float(1.5));
    }

    #[test]
    fn test_equality_ignores_origin() {
        let a = ConfigValue::String(Origin::new("one"), "v".into());
        let b = ConfigValue::String(Origin::with_line("two", 9), "v".into());
        assert_eq!(a, b);
    }

    #[test]
    fn test_with_fallback_scalar_shadows() {
        let merged = int(2).with_fallback(reference("a"));
        assert_eq!(merged, int(2));
    }

    #[test]
    fn test_with_fallback_objects_merge_deeply() {
        let newer = object(vec![("db", object(vec![("host", string("prod"))]))]);
        let older = object(vec![(
            "db",
            object(vec![("host", string("local")), ("port", int(5432))]),
        )]);

        let merged = newer.with_fallback(older);
        let obj = merged.as_object().unwrap();
        let db = obj.get("db").unwrap().as_object().unwrap();
        assert_eq!(db.get("host").unwrap().as_str(), Some("prod"));
        assert_eq!(db.get("port").unwrap().as_i64(), Some(5432));
    }

    #[test]
    fn test_with_fallback_object_shadows_scalar() {
        let merged = object(vec![("x", int(1))]).with_fallback(int(9));
        assert_eq!(merged, object(vec![("x", int(1))]));
    }

    #[test]
    fn test_object_over_scalar_stops_merging() {
        // the scalar shadows everything below, so a later fallback
        // cannot add keys anymore
        let merged = object(vec![("x", int(1))])
            .with_fallback(int(9))
            .with_fallback(object(vec![("y", int(2))]));
        let obj = merged.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert!(obj.get("y").is_none());
    }

    #[test]
    fn test_with_fallback_reference_builds_delayed_merge() {
        let merged = reference("r").with_fallback(object(vec![("x", int(1))]));
        match &merged {
            ConfigValue::DelayedMerge(dm) => {
                assert_eq!(dm.stack().len(), 2);
                assert!(matches!(dm.stack()[0], ConfigValue::Reference(_)));
            }
            other => panic!("expected DelayedMerge, got {:?}", other),
        }
    }

    #[test]
    fn test_with_fallback_object_over_unresolved_builds_delayed_merge_object() {
        let merged = object(vec![("y", int(2))]).with_fallback(reference("r"));
        match &merged {
            ConfigValue::DelayedMergeObject(dm) => {
                assert_eq!(dm.stack().len(), 2);
                assert!(matches!(dm.stack()[0], ConfigValue::Object(_)));
            }
            other => panic!("expected DelayedMergeObject, got {:?}", other),
        }
    }

    #[test]
    fn test_with_fallback_flattens_stacks() {
        let first = reference("a").with_fallback(reference("b"));
        let flattened = reference("c").with_fallback(first);
        match &flattened {
            ConfigValue::DelayedMerge(dm) => assert_eq!(dm.stack().len(), 3),
            other => panic!("expected DelayedMerge, got {:?}", other),
        }
    }

    #[test]
    fn test_join_strings() {
        let pieces = vec![string("a"), string(" "), int(1)];
        let joined = ConfigConcat::join(pieces, &origin()).unwrap();
        assert_eq!(joined.as_str(), Some("a 1"));
    }

    #[test]
    fn test_join_null_renders_empty() {
        let pieces = vec![string("x"), ConfigValue::Null(origin()), string("y")];
        let joined = ConfigConcat::join(pieces, &origin()).unwrap();
        assert_eq!(joined.as_str(), Some("xy"));
    }

    #[test]
    fn test_join_lists_concatenate() {
        let a = ConfigValue::List(ConfigList::new(origin(), vec![int(1)]));
        let b = ConfigValue::List(ConfigList::new(origin(), vec![int(2)]));
        let joined = ConfigConcat::join(vec![a, string(" "), b], &origin()).unwrap();
        let list = joined.as_list().unwrap();
        assert_eq!(list.items(), [int(1), int(2)]);
    }

    #[test]
    fn test_join_objects_merge_later_wins() {
        let a = object(vec![("x", int(1)), ("shared", int(1))]);
        let b = object(vec![("y", int(2)), ("shared", int(2))]);
        let joined = ConfigConcat::join(vec![a, string(" "), b], &origin()).unwrap();
        let obj = joined.as_object().unwrap();
        assert_eq!(obj.get("x").unwrap().as_i64(), Some(1));
        assert_eq!(obj.get("y").unwrap().as_i64(), Some(2));
        assert_eq!(obj.get("shared").unwrap().as_i64(), Some(2));
    }

    #[test]
    fn test_join_mixed_categories_is_wrong_type() {
        let obj = object(vec![("x", int(1))]);
        let list = ConfigValue::List(ConfigList::new(origin(), vec![int(1)]));
        let err = ConfigConcat::join(vec![obj, list], &origin()).unwrap_err();
        assert!(matches!(
            err.kind,
            crate::error::ErrorKind::WrongType { .. }
        ));
    }

    #[test]
    fn test_display_rendering() {
        let value = object(vec![("a", int(1)), ("b", string("x"))]);
        assert_eq!(format!("{}", value), "{a: 1, b: x}");
        assert_eq!(format!("{}", reference("a.b")), "${a.b}");
    }
}
