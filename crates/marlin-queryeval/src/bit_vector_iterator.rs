//! Leaf iterator over a shared bit vector.
//!
//! Bit-vector iterators are the raw material of the fused
//! multi-bit-vector optimization: they expose their backing words (and
//! inversion flag) so a fused parent can batch-combine them directly.

use std::rc::Rc;

use marlin_bitvec::BitVector;
use marlin_types::{DocId, SharedMatchData, TermFieldHandle, Trinary};

use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};

/// Shared view of a bit-vector iterator's backing data.
#[derive(Debug, Clone)]
pub struct BitVectorView {
    pub bits: Rc<BitVector>,
    pub inverted: bool,
    pub docid_limit: DocId,
}

/// Build a bit-vector leaf iterator. `match_target` names the scratch
/// row stamped with the doc id on unpack, when the term is ranked.
#[must_use]
pub fn create(
    bits: Rc<BitVector>,
    docid_limit: DocId,
    match_target: Option<(SharedMatchData, TermFieldHandle)>,
    strict: bool,
    inverted: bool,
) -> SearchIteratorBox {
    Box::new(BitVectorIterator {
        state: IteratorState::default(),
        bits,
        inverted,
        docid_limit,
        strict,
        match_target,
    })
}

#[derive(Debug)]
pub struct BitVectorIterator {
    state: IteratorState,
    bits: Rc<BitVector>,
    inverted: bool,
    docid_limit: DocId,
    strict: bool,
    match_target: Option<(SharedMatchData, TermFieldHandle)>,
}

impl BitVectorIterator {
    fn contains(&self, doc_id: DocId) -> bool {
        self.bits.test_bit(doc_id) != self.inverted
    }
}

impl SearchIterator for BitVectorIterator {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id.min(self.docid_limit));
        if self.strict {
            self.do_seek(begin_id);
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        if self.state.is_past_end(doc_id) {
            self.state.set_at_end();
            return;
        }
        if self.strict {
            let next = if self.inverted {
                self.bits.next_false_bit(doc_id)
            } else {
                self.bits.next_true_bit(doc_id)
            };
            if self.state.is_past_end(next) {
                self.state.set_at_end();
            } else {
                self.state.set_doc_id(next);
            }
        } else if self.contains(doc_id) {
            self.state.set_doc_id(doc_id);
        }
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        if let Some((md, handle)) = &self.match_target {
            md.borrow_mut()
                .term_field_mut(*handle)
                .reset_only_doc_id(doc_id);
        }
    }

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        BitVector::from_view(
            begin_id,
            self.state.end_id(),
            self.bits.words(),
            self.inverted,
        )
    }

    fn and_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        if self.inverted {
            result.and_not_with(&self.bits);
        } else {
            result.and_with(&self.bits);
        }
        let _ = begin_id;
    }

    fn or_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        if self.inverted {
            let hits = self.get_hits(begin_id);
            result.or_with(&hits);
        } else {
            result.or_with(&self.bits);
        }
    }

    fn is_bit_vector(&self) -> bool {
        true
    }

    fn bit_vector_view(&self) -> Option<BitVectorView> {
        Some(BitVectorView {
            bits: Rc::clone(&self.bits),
            inverted: self.inverted,
            docid_limit: self.docid_limit,
        })
    }

    fn name(&self) -> &'static str {
        "BitVectorIterator"
    }
}
