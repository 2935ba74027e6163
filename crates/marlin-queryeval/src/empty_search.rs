//! The iterator that matches nothing.

use marlin_bitvec::BitVector;
use marlin_types::{DocId, Trinary};

use crate::search_iterator::{IteratorState, SearchIterator};

/// Matches no documents. Used wherever plan construction degrades an
/// impossible subtree, and as the lower-bound default filter.
#[derive(Debug, Default)]
pub struct EmptySearch {
    state: IteratorState,
}

impl EmptySearch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SearchIterator for EmptySearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        self.state.set_at_end();
    }

    fn do_seek(&mut self, _doc_id: DocId) {}

    fn do_unpack(&mut self, _doc_id: DocId) {}

    fn is_strict(&self) -> Trinary {
        Trinary::True
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        BitVector::new(begin_id, self.end_id())
    }

    fn matches_any(&self) -> Trinary {
        Trinary::False
    }

    fn name(&self) -> &'static str {
        "EmptySearch"
    }
}
