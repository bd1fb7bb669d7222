use std::collections::HashSet;

use crate::record::SourceId;

/// Source ids the watcher has already handled during this run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenSources {
    seen: HashSet<SourceId>,
}

impl SeenSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.seen.contains(id)
    }

    /// Keeps the items whose id was not seen before, in listing order, and marks them seen.
    ///
    /// Duplicates within one listing are reported once.
    pub fn retain_new<T>(&mut self, items: Vec<T>, id_of: impl Fn(&T) -> &SourceId) -> Vec<T> {
        items
            .into_iter()
            .filter(|item| self.seen.insert(id_of(item).clone()))
            .collect()
    }
}
