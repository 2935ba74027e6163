//! Deterministic hit-list fixtures.
//!
//! A [`SimpleResult`] is a plain ascending doc-id list with an exact
//! iterator over it. Used as the smallest possible posting fixture in
//! unit tests and as the backing of [`SimpleBlueprint`].
//!
//! [`SimpleBlueprint`]: crate::leaf_blueprints::SimpleBlueprint

use marlin_types::{DocId, Trinary};

use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};

/// Sorted, duplicate-free list of matching doc ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimpleResult {
    hits: Vec<DocId>,
}

impl SimpleResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_hits(mut hits: Vec<DocId>) -> Self {
        hits.sort_unstable();
        hits.dedup();
        Self { hits }
    }

    /// Append a hit; doc ids must be added in ascending order.
    pub fn add_hit(&mut self, doc_id: DocId) -> &mut Self {
        debug_assert!(self.hits.last().is_none_or(|&last| last < doc_id));
        self.hits.push(doc_id);
        self
    }

    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.hits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[must_use]
    pub fn hit(&self, idx: usize) -> DocId {
        self.hits[idx]
    }

    #[must_use]
    pub fn hits(&self) -> &[DocId] {
        &self.hits
    }

    #[must_use]
    pub fn contains(&self, doc_id: DocId) -> bool {
        self.hits.binary_search(&doc_id).is_ok()
    }
}

/// Build an exact iterator over a result.
#[must_use]
pub fn create_search(result: SimpleResult, strict: bool) -> SearchIteratorBox {
    Box::new(SimpleSearch {
        state: IteratorState::default(),
        hits: result.hits,
        index: 0,
        strict,
    })
}

#[derive(Debug)]
pub struct SimpleSearch {
    state: IteratorState,
    hits: Vec<DocId>,
    index: usize,
    strict: bool,
}

impl SearchIterator for SimpleSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        self.index = 0;
        if self.strict {
            self.do_seek(begin_id);
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        while self.index < self.hits.len() && self.hits[self.index] < doc_id {
            self.index += 1;
        }
        match self.hits.get(self.index) {
            Some(&hit) if !self.state.is_past_end(hit) => {
                if self.strict || hit == doc_id {
                    self.state.set_doc_id(hit);
                }
            }
            _ => {
                if self.strict {
                    self.state.set_at_end();
                }
            }
        }
    }

    fn do_unpack(&mut self, _doc_id: DocId) {}

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn name(&self) -> &'static str {
        "SimpleSearch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_hits_sorts_and_dedups() {
        let result = SimpleResult::from_hits(vec![5, 1, 3, 3]);
        assert_eq!(result.hits(), &[1, 3, 5]);
        assert!(result.contains(3));
        assert!(!result.contains(4));
    }

    #[test]
    fn strict_search_walks_hits() {
        let mut it = create_search(SimpleResult::from_hits(vec![2, 9]), true);
        it.init_range(1, 100);
        assert_eq!(it.doc_id(), 2);
        assert!(it.seek(2));
        assert!(!it.seek(3));
        assert_eq!(it.doc_id(), 9);
        assert!(it.seek(9));
        assert!(!it.seek(10));
        assert!(it.is_at_end());
    }

    #[test]
    fn non_strict_search_answers_membership() {
        let mut it = create_search(SimpleResult::from_hits(vec![2, 9]), false);
        it.init_range(1, 100);
        assert!(!it.seek(1));
        assert!(it.seek(2));
        assert!(!it.seek(3));
        assert!(it.seek(9));
    }

    #[test]
    fn range_end_cuts_hits() {
        let mut it = create_search(SimpleResult::from_hits(vec![2, 9]), true);
        it.init_range(1, 5);
        assert!(it.seek(2));
        assert!(!it.seek(3));
        assert!(it.is_at_end());
    }
}
