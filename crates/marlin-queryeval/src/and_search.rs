//! The AND operator.
//!
//! The strict variant assumes child 0 is strict and drives a leap-frog
//! loop over the remaining children; the non-strict variant only
//! answers membership at a given target. Unpack dispatch (full,
//! selective, none) is chosen at plan time.

use marlin_bitvec::BitVector;
use marlin_types::{DocId, Trinary};

use crate::multi_search::{init_children, MultiKind, MultiSearch};
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};
use crate::termwise;
use crate::unpack::{UnpackInfo, UnpackPolicy};

/// Build an AND iterator. `estimate` is the plan-time hit estimate,
/// consulted when deciding where an absorbed filter should be inserted.
#[must_use]
pub fn create(
    children: Vec<SearchIteratorBox>,
    strict: bool,
    unpack: UnpackInfo,
    estimate: u32,
) -> SearchIteratorBox {
    let unpack = UnpackPolicy::from_info(unpack);
    if strict {
        Box::new(AndSearchStrict {
            state: IteratorState::default(),
            children,
            unpack,
            estimate,
        })
    } else {
        Box::new(AndSearchNoStrict {
            state: IteratorState::default(),
            children,
            unpack,
        })
    }
}

/// Build an AND iterator that unpacks all children.
#[must_use]
pub fn create_full_unpack(children: Vec<SearchIteratorBox>, strict: bool) -> SearchIteratorBox {
    let mut info = UnpackInfo::new();
    info.force_all();
    create(children, strict, info, u32::MAX)
}

/// Offer `filter` to each child in turn until one absorbs it.
fn offer_filter_to_children(
    children: &mut [SearchIteratorBox],
    mut filter: SearchIteratorBox,
    estimate: u32,
) -> Option<SearchIteratorBox> {
    for child in children {
        match child.and_with(filter, estimate) {
            Some(rejected) => filter = rejected,
            None => return None,
        }
    }
    Some(filter)
}

#[derive(Debug)]
pub struct AndSearchNoStrict {
    state: IteratorState,
    children: Vec<SearchIteratorBox>,
    unpack: UnpackPolicy,
}

impl SearchIterator for AndSearchNoStrict {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        init_children(&mut self.children, begin_id, end_id);
    }

    fn do_seek(&mut self, doc_id: DocId) {
        for child in &mut self.children {
            if !child.seek(doc_id) {
                return;
            }
        }
        self.state.set_doc_id(doc_id);
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        self.unpack.unpack_children_direct(&mut self.children, doc_id);
    }

    fn is_strict(&self) -> Trinary {
        Trinary::False
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        let end = self.state.end_id();
        termwise::and_children(&mut self.children, begin_id, end)
    }

    fn and_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        termwise::and_children_into(result, &mut self.children, begin_id);
    }

    fn and_with(
        &mut self,
        filter: SearchIteratorBox,
        estimate: u32,
    ) -> Option<SearchIteratorBox> {
        offer_filter_to_children(&mut self.children, filter, estimate)
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "AndSearchNoStrict"
    }
}

impl MultiSearch for AndSearchNoStrict {
    fn children(&self) -> &[SearchIteratorBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
        &mut self.children
    }

    fn multi_kind(&self) -> MultiKind {
        MultiKind::And
    }

    fn need_unpack(&self, index: usize) -> bool {
        self.unpack.need_unpack(index)
    }

    fn on_insert(&mut self, index: usize) {
        self.unpack.on_insert(index);
    }

    fn on_remove(&mut self, index: usize) {
        self.unpack.on_remove(index);
    }
}

#[derive(Debug)]
pub struct AndSearchStrict {
    state: IteratorState,
    children: Vec<SearchIteratorBox>,
    unpack: UnpackPolicy,
    estimate: u32,
}

impl AndSearchStrict {
    /// Leap-frog to the next document matched by every child, starting
    /// from child 0's position. `failed_child` is the child whose miss
    /// triggered the advance (0 for a fresh start); `seek_only` selects
    /// the unguarded internal seek used on the hot path.
    fn advance(&mut self, failed_child: usize, seek_only: bool) {
        if failed_child != 0 {
            if seek_only && self.children[failed_child].is_at_end() {
                self.state.set_at_end();
                return;
            }
            let target = (self.children[0].doc_id() + 1).max(self.children[failed_child].doc_id());
            if seek_only {
                self.children[0].do_seek(target);
            } else {
                self.children[0].seek(target);
            }
        }
        let mut next_id = self.children[0].doc_id();
        'candidates: while !self.state.is_past_end(next_id) {
            for i in 1..self.children.len() {
                if !self.children[i].seek(next_id) {
                    if self.children[i].is_at_end() {
                        self.state.set_at_end();
                        return;
                    }
                    let target = (next_id + 1).max(self.children[i].doc_id());
                    self.children[0].do_seek(target);
                    next_id = self.children[0].doc_id();
                    continue 'candidates;
                }
            }
            break;
        }
        self.state.set_doc_id(next_id);
    }
}

impl SearchIterator for AndSearchStrict {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        init_children(&mut self.children, begin_id, end_id);
        self.advance(0, false);
    }

    fn do_seek(&mut self, doc_id: DocId) {
        for i in 0..self.children.len() {
            if !self.children[i].seek(doc_id) {
                self.advance(i, true);
                return;
            }
        }
        self.state.set_doc_id(doc_id);
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        self.unpack.unpack_children_direct(&mut self.children, doc_id);
    }

    fn is_strict(&self) -> Trinary {
        Trinary::True
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        let end = self.state.end_id();
        termwise::and_children(&mut self.children, begin_id, end)
    }

    fn and_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        termwise::and_children_into(result, &mut self.children, begin_id);
    }

    fn and_with(
        &mut self,
        filter: SearchIteratorBox,
        estimate: u32,
    ) -> Option<SearchIteratorBox> {
        let filter = self.children[0].and_with(filter, estimate)?;
        if estimate < self.estimate && filter.is_strict() == Trinary::True {
            self.insert_child(0, filter);
            return None;
        }
        let filter = offer_filter_to_children(&mut self.children, filter, estimate)?;
        self.insert_child(1, filter);
        None
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "AndSearchStrict"
    }
}

impl MultiSearch for AndSearchStrict {
    fn children(&self) -> &[SearchIteratorBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
        &mut self.children
    }

    fn multi_kind(&self) -> MultiKind {
        MultiKind::And
    }

    fn need_unpack(&self, index: usize) -> bool {
        self.unpack.need_unpack(index)
    }

    fn on_insert(&mut self, index: usize) {
        self.unpack.on_insert(index);
    }

    fn on_remove(&mut self, index: usize) {
        self.unpack.on_remove(index);
    }
}
