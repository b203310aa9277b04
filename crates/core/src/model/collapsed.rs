use std::collections::HashSet;

use tracelens_protocol::SharedStr;

use super::tree::ObservationTree;

/// Ids of observations whose subtrees are hidden. Absence means expanded.
///
/// The host owns this value; the helpers here compute the *next* state
/// without touching the current one. Ids that match no node are harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollapsedSet(HashSet<SharedStr>);

impl CollapsedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedStr> {
        self.0.iter()
    }

    /// A copy with `id`'s membership flipped.
    pub fn toggled(&self, id: &SharedStr) -> Self {
        let mut next = self.clone();
        if !next.0.remove(id.as_str()) {
            next.0.insert(id.clone());
        }
        next
    }

    /// Every node with children collapsed.
    pub fn collapse_all(tree: &ObservationTree) -> Self {
        tree.ids_with_children().cloned().collect()
    }

    pub fn expand_all() -> Self {
        Self::default()
    }
}

impl FromIterator<SharedStr> for CollapsedSet {
    fn from_iter<I: IntoIterator<Item = SharedStr>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for CollapsedSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(SharedStr::from).collect())
    }
}
