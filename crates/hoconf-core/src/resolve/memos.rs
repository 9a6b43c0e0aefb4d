//! Memoization of partial resolutions
//!
//! Results are keyed by node identity plus the restriction in effect, so
//! the same node reached twice under the same restriction is never
//! resolved twice. A fully resolved value is cached under the
//! unrestricted key and satisfies any restricted query.

use std::collections::HashMap;

use crate::path::Path;
use crate::value::{ConfigValue, NodeId};

/// Key for a memoized resolution: node identity plus restriction
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct MemoKey {
    node: NodeId,
    restrict_to_child: Option<Path>,
}

impl MemoKey {
    pub(crate) fn new(node: NodeId, restrict_to_child: Option<Path>) -> Self {
        Self {
            node,
            restrict_to_child,
        }
    }
}

/// Functional map of memoized resolutions
///
/// `put` returns an enlarged copy; a context holding the old memos is
/// never invalidated.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResolveMemos {
    entries: HashMap<MemoKey, ConfigValue>,
}

impl ResolveMemos {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &MemoKey) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub(crate) fn put(&self, key: MemoKey, value: ConfigValue) -> ResolveMemos {
        let mut entries = self.entries.clone();
        entries.insert(key, value);
        ResolveMemos { entries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::origin::Origin;
    use crate::value::{ConfigList, ConfigValue};

    #[test]
    fn test_put_is_functional() {
        let memos = ResolveMemos::new();
        let value = ConfigValue::List(ConfigList::new(Origin::new("test"), vec![]));
        let key = MemoKey::new(node_of(&value), None);
        let updated = memos.put(key.clone(), value.clone());

        assert!(memos.get(&key).is_none());
        assert_eq!(updated.get(&key), Some(&value));
    }

    #[test]
    fn test_restricted_and_full_keys_are_distinct() {
        let value = ConfigValue::List(ConfigList::new(Origin::new("test"), vec![]));
        let full = MemoKey::new(node_of(&value), None);
        let restricted = MemoKey::new(
            node_of(&value),
            Some(Path::parse("a.b").unwrap()),
        );
        assert_ne!(full, restricted);

        let memos = ResolveMemos::new().put(restricted.clone(), value.clone());
        assert!(memos.get(&full).is_none());
        assert_eq!(memos.get(&restricted), Some(&value));
    }

    fn node_of(value: &ConfigValue) -> NodeId {
        value.id().expect("composite value has an id")
    }
}
