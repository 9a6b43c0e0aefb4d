//! Substitution resolution
//!
//! Rewrites every `${...}` reference in a parsed-and-merged tree into a
//! concrete value: lazily (only what is consulted gets resolved when
//! restricted), memoized by node identity, with cycle detection and
//! optional-reference dropping. Resolution is a pure function of the
//! input tree and the options; the input is never mutated.

mod context;
mod memos;
mod options;
mod source;

pub use options::ResolveOptions;

pub(crate) use context::{ResolveContext, ResolveError};
pub(crate) use source::ResolveSource;

use crate::error::{Error, Result};
use crate::path::Path;
use crate::value::{ConfigObject, ConfigValue};

/// Resolve every substitution in `root`
///
/// With `allow_unresolved` the result may still contain references;
/// otherwise any unresolvable required reference is an error.
pub fn resolve(root: &ConfigObject, options: ResolveOptions) -> Result<ConfigObject> {
    resolve_value(root, options, None)
}

/// Resolve only the descendant chain leading to `path`
///
/// Siblings off the path are left unresolved. Restriction never changes
/// the value found at `path`, only how much of the rest of the tree gets
/// resolved along the way.
pub fn resolve_restricted(
    root: &ConfigObject,
    options: ResolveOptions,
    path: &Path,
) -> Result<ConfigObject> {
    resolve_value(root, options, Some(path.clone()))
}

fn resolve_value(
    root: &ConfigObject,
    options: ResolveOptions,
    restrict: Option<Path>,
) -> Result<ConfigObject> {
    let source = ResolveSource::new(root.clone());
    let context = ResolveContext::new(options, restrict.clone());

    let result = finish(context.resolve(&ConfigValue::Object(root.clone()), &source))?;
    let obj = match result.value {
        Some(ConfigValue::Object(obj)) => obj,
        Some(other) => {
            return Err(Error::bug_or_broken(format!(
                "root resolved to a non-object: {}",
                other.type_name()
            )))
        }
        None => return Err(Error::bug_or_broken("root object vanished during resolve")),
    };

    match restrict {
        None => Ok(obj),
        // the restricted pass leaves the target leaf itself for the
        // consulting reference; here we are the consumer, so finish it
        Some(path) => resolve_leaf_at(obj, &path, result.context, &source),
    }
}

fn resolve_leaf_at(
    obj: ConfigObject,
    path: &Path,
    context: ResolveContext,
    source: &ResolveSource,
) -> Result<ConfigObject> {
    let Some(leaf) = value_at(&obj, path) else {
        return Ok(obj);
    };
    if leaf.resolve_status() == crate::value::ResolveStatus::Resolved {
        return Ok(obj);
    }
    let leaf = leaf.clone();
    let result = finish(context.unrestricted().resolve(&leaf, source))?;
    Ok(splice(obj, path, result.value))
}

fn finish(
    result: std::result::Result<context::ResolveResult, ResolveError>,
) -> Result<context::ResolveResult> {
    match result {
        Ok(result) => Ok(result),
        Err(ResolveError::Fatal(error)) => Err(error),
        // references are supposed to catch this
        Err(ResolveError::NotPossible(_)) => Err(Error::bug_or_broken(
            "NotPossibleToResolve escaped the outermost resolve",
        )),
    }
}

fn value_at<'a>(obj: &'a ConfigObject, path: &Path) -> Option<&'a ConfigValue> {
    let value = obj.get(path.first())?;
    match path.remainder() {
        None => Some(value),
        Some(rest) => value_at(value.as_object()?, &rest),
    }
}

/// Rebuild `obj` with `value` in place at `path`; `None` removes the entry
fn splice(obj: ConfigObject, path: &Path, value: Option<ConfigValue>) -> ConfigObject {
    let mut entries = obj.entries().clone();
    let key = path.first();
    match path.remainder() {
        None => {
            match value {
                Some(v) => entries.insert(key.to_string(), v),
                None => entries.shift_remove(key),
            };
        }
        Some(rest) => {
            if let Some(ConfigValue::Object(child)) = entries.get(key).cloned() {
                entries.insert(key.to_string(), ConfigValue::Object(splice(child, &rest, value)));
            }
        }
    }
    obj.rebuild(entries)
}
