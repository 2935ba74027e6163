//! The iterator that matches everything.

use marlin_bitvec::BitVector;
use marlin_types::{DocId, Trinary};

use crate::search_iterator::{IteratorState, SearchIterator};

/// Matches every document in the active range. Used as the upper-bound
/// default filter.
#[derive(Debug, Default)]
pub struct FullSearch {
    state: IteratorState,
}

impl FullSearch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchIterator for FullSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        if begin_id < end_id {
            self.state.set_doc_id(begin_id);
        } else {
            self.state.set_at_end();
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        if self.state.is_past_end(doc_id) {
            self.state.set_at_end();
        } else {
            self.state.set_doc_id(doc_id);
        }
    }

    fn do_unpack(&mut self, _doc_id: DocId) {}

    fn is_strict(&self) -> Trinary {
        Trinary::True
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        let mut result = BitVector::new(begin_id, self.end_id());
        result.not_self();
        result
    }

    fn matches_any(&self) -> Trinary {
        Trinary::True
    }

    fn name(&self) -> &'static str {
        "FullSearch"
    }
}
