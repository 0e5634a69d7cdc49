//! Work queue for iterative DAG walks.

use std::collections::BTreeSet;

/// The set of units still to be visited by a walk, plus everything already visited.
///
/// Walks pop the highest-ordered key first; callers pick the key so that this means
/// "closest to the start" (for example `(level, id)` when walking towards genesis).
#[derive(Debug, Clone)]
pub(crate) struct Frontier<Id> {
    pub(crate) ids: BTreeSet<Id>,
    visited: BTreeSet<Id>,
}

impl<Id: Ord + Clone> Frontier<Id> {
    pub(crate) fn new(ids: impl IntoIterator<Item = Id>) -> Self {
        let mut frontier = Self { ids: BTreeSet::new(), visited: BTreeSet::new() };
        frontier.extend(ids);
        frontier
    }

    pub(crate) fn is_empty(&self) -> bool { self.ids.is_empty() }

    pub(crate) fn pop(&mut self) -> Option<Id> { self.ids.pop_last() }

    /// Queue ids that have not been queued before.
    pub(crate) fn extend(&mut self, ids: impl IntoIterator<Item = Id>) {
        for id in ids {
            if self.visited.insert(id.clone()) {
                self.ids.insert(id);
            }
        }
    }
}
