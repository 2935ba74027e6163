//! The doc-id cursor abstraction.
//!
//! A search iterator walks matching documents in strictly ascending doc
//! id order within the range set by `init_range`. The public driver
//! methods `seek`/`unpack` guard the internal hooks `do_seek`/`do_unpack`
//! so implementations may assume their preconditions:
//!
//! - `do_seek(d)` is only invoked with `d` greater than the current doc
//!   id,
//! - `do_unpack(d)` is only invoked when the iterator is positioned
//!   exactly at `d`.
//!
//! Strictness is a contract with the parent operator: a strict iterator
//! advances on its own to the next hit when a seek misses, a non-strict
//! iterator only answers yes/no for the given target and leaves its
//! position unspecified on a miss.

use marlin_bitvec::BitVector;
use marlin_types::{DocId, Trinary, END_DOC_ID};

use crate::bit_vector_iterator::BitVectorView;
use crate::multi_search::MultiSearch;
use crate::source_blender::SourceBlenderSearch;

/// Boxed iterator, the unit of composition for operator trees.
pub type SearchIteratorBox = Box<dyn SearchIterator>;

/// The `(doc_id, end_id)` cursor state embedded in every iterator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IteratorState {
    doc_id: DocId,
    end_id: DocId,
}

impl IteratorState {
    /// State for a fresh range: positioned just before `begin_id`.
    #[must_use]
    pub fn for_range(begin_id: DocId, end_id: DocId) -> Self {
        Self {
            doc_id: begin_id.saturating_sub(1),
            end_id,
        }
    }

    #[must_use]
    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    #[must_use]
    pub fn end_id(&self) -> DocId {
        self.end_id
    }

    pub fn set_doc_id(&mut self, doc_id: DocId) {
        self.doc_id = doc_id;
    }

    pub fn set_at_end(&mut self) {
        self.doc_id = END_DOC_ID;
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.doc_id >= self.end_id
    }

    /// Whether `doc_id` lies at or past the end of the active range.
    #[must_use]
    pub fn is_past_end(&self, doc_id: DocId) -> bool {
        doc_id >= self.end_id
    }
}

impl Default for IteratorState {
    fn default() -> Self {
        Self::for_range(0, 0)
    }
}

/// A cursor over matching doc ids with optional per-term unpack.
pub trait SearchIterator: std::fmt::Debug {
    /// Access to the embedded cursor state.
    fn state(&self) -> &IteratorState;
    fn state_mut(&mut self) -> &mut IteratorState;

    /// Position for the range `[begin_id, end_id)`. Implementations
    /// must reset all internal state; strict iterators additionally
    /// position themselves at the first hit (or at end).
    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        *self.state_mut() = IteratorState::for_range(begin_id, end_id);
    }

    /// Move towards `doc_id`. Precondition: `doc_id` is greater than the
    /// current doc id. Use [`SearchIterator::seek`] from the outside.
    fn do_seek(&mut self, doc_id: DocId);

    /// Populate match data for a hit at `doc_id`. Precondition: the
    /// iterator is positioned at `doc_id`. Use
    /// [`SearchIterator::unpack`] from the outside.
    fn do_unpack(&mut self, doc_id: DocId);

    /// Seek to `doc_id`, returning whether the iterator is positioned
    /// exactly there afterwards.
    fn seek(&mut self, doc_id: DocId) -> bool {
        if doc_id > self.doc_id() {
            self.do_seek(doc_id);
        }
        self.doc_id() == doc_id
    }

    /// Unpack match data for `doc_id` if this iterator is positioned on
    /// it.
    fn unpack(&mut self, doc_id: DocId) {
        if self.doc_id() == doc_id {
            self.do_unpack(doc_id);
        }
    }

    fn doc_id(&self) -> DocId {
        self.state().doc_id()
    }

    fn end_id(&self) -> DocId {
        self.state().end_id()
    }

    fn is_at_end(&self) -> bool {
        self.state().is_at_end()
    }

    /// The strictness contract this iterator honors.
    fn is_strict(&self) -> Trinary {
        Trinary::Undefined
    }

    /// Materialize all hits in `[begin_id, end_id)` into a bit vector.
    /// The default drives `seek` over the whole range, skipping ahead by
    /// the iterator's own position when it is strict.
    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        let end = self.end_id();
        let mut result = BitVector::new(begin_id, end);
        let mut doc_id = begin_id;
        while doc_id < end {
            if self.seek(doc_id) {
                result.set_bit(doc_id);
            }
            doc_id = (doc_id + 1).max(self.doc_id());
        }
        result
    }

    /// Intersect this iterator's hits into a caller-owned bit vector.
    fn and_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        let hits = self.get_hits(begin_id);
        result.and_with(&hits);
    }

    /// Union this iterator's hits into a caller-owned bit vector.
    fn or_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        let hits = self.get_hits(begin_id);
        result.or_with(&hits);
    }

    /// Offer a strict filter for absorption. Implementations that can
    /// fold the filter into their own evaluation consume it and return
    /// `None`; the default hands it back untouched.
    fn and_with(
        &mut self,
        filter: SearchIteratorBox,
        estimate: u32,
    ) -> Option<SearchIteratorBox> {
        let _ = estimate;
        Some(filter)
    }

    /// Ternary answer used while building filter iterators: does this
    /// iterator match any document at all?
    fn matches_any(&self) -> Trinary {
        Trinary::Undefined
    }

    /// Whether this is a plain bit-vector iterator (fusion candidate).
    fn is_bit_vector(&self) -> bool {
        false
    }

    /// The word view of a bit-vector iterator; `None` for everything
    /// else.
    fn bit_vector_view(&self) -> Option<BitVectorView> {
        None
    }

    /// Downcast hook for operators that own a child list.
    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        None
    }

    /// Downcast hook for the source blender (the fused bit-vector
    /// optimization recurses through its per-source children).
    fn as_source_blender(&mut self) -> Option<&mut SourceBlenderSearch> {
        None
    }

    /// Short name for debug output.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::{IteratorState, SearchIterator};
    use marlin_types::{DocId, Trinary};

    /// Strict test iterator over a fixed, sorted doc id list.
    #[derive(Debug)]
    pub struct VecIterator {
        state: IteratorState,
        hits: Vec<DocId>,
    }

    impl VecIterator {
        pub fn new(hits: Vec<DocId>) -> Self {
            Self {
                state: IteratorState::default(),
                hits,
            }
        }
    }

    impl SearchIterator for VecIterator {
        fn state(&self) -> &IteratorState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut IteratorState {
            &mut self.state
        }

        fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
            self.state = IteratorState::for_range(begin_id, end_id);
            let first = self
                .hits
                .iter()
                .copied()
                .find(|&d| d >= begin_id && d < end_id);
            match first {
                Some(doc) => self.state.set_doc_id(doc),
                None => self.state.set_at_end(),
            }
        }

        fn do_seek(&mut self, doc_id: DocId) {
            let next = self
                .hits
                .iter()
                .copied()
                .find(|&d| d >= doc_id && d < self.state.end_id());
            match next {
                Some(doc) => self.state.set_doc_id(doc),
                None => self.state.set_at_end(),
            }
        }

        fn do_unpack(&mut self, _doc_id: DocId) {}

        fn is_strict(&self) -> Trinary {
            Trinary::True
        }

        fn name(&self) -> &'static str {
            "VecIterator"
        }
    }
}
