//! Weighted-set iterator.
//!
//! Matches the union of its weighted term children; unpack appends one
//! occurrence per matching child to the output row, carrying the
//! child's set weight as element weight, ordered by descending weight.
//! Filter fields skip occurrence data and only stamp the doc id.

use std::marker::PhantomData;

use marlin_bitvec::BitVector;
use marlin_types::{DocId, Position, SharedMatchData, TermFieldHandle, Trinary};

use crate::heap::{HeapOps, LeftArrayHeap, LeftHeap};
use crate::iterator_pack::SearchIteratorPack;
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};

/// Output row of the weighted set: shared scratch plus row handle.
pub type OutputRow = (SharedMatchData, TermFieldHandle);

/// Build a weighted-set iterator over term children with set weights.
#[must_use]
pub fn create(
    children: Vec<SearchIteratorBox>,
    output: OutputRow,
    field_is_filter: bool,
    weights: Vec<i32>,
    child_match_data: SharedMatchData,
) -> SearchIteratorBox {
    assert_eq!(children.len(), weights.len());
    assert!(!children.is_empty());
    let pack = SearchIteratorPack::new(children, Vec::new(), child_match_data);
    if pack.len() < 128 {
        Box::new(WeightedSetTermSearch::<LeftArrayHeap>::new(
            output,
            field_is_filter,
            weights,
            pack,
        ))
    } else {
        Box::new(WeightedSetTermSearch::<LeftHeap>::new(
            output,
            field_is_filter,
            weights,
            pack,
        ))
    }
}

#[derive(Debug)]
struct WeightedSetTermSearch<H: HeapOps> {
    state: IteratorState,
    output: OutputRow,
    field_is_filter: bool,
    weights: Vec<i32>,
    term_pos: Vec<DocId>,
    refs: Vec<u32>,
    /// Number of refs inside the heap; popped refs park at
    /// `refs[stash..]`.
    stash: usize,
    children: SearchIteratorPack,
    _heap: PhantomData<H>,
}

impl<H: HeapOps> WeightedSetTermSearch<H> {
    fn new(
        output: OutputRow,
        field_is_filter: bool,
        weights: Vec<i32>,
        children: SearchIteratorPack,
    ) -> Self {
        let n = weights.len();
        {
            let (md, handle) = &output;
            let mut md = md.borrow_mut();
            let row = md.term_field_mut(*handle);
            if !field_is_filter && !row.is_not_needed() {
                row.reserve_positions(n);
            }
        }
        Self {
            state: IteratorState::default(),
            output,
            field_is_filter,
            weights,
            term_pos: vec![0; n],
            refs: (0..n as u32).collect(),
            stash: 0,
            children,
            _heap: PhantomData,
        }
    }

    /// Pop every child positioned at `doc_id`; they end up parked at
    /// `refs[stash..]`.
    fn pop_matching_children(&mut self, doc_id: DocId) {
        while self.stash > 0 {
            let front = H::front(&self.refs[..self.stash]) as usize;
            if self.term_pos[front] != doc_id {
                break;
            }
            let term_pos = &self.term_pos;
            H::pop(&mut self.refs[..self.stash], &|a: u32, b: u32| {
                term_pos[a as usize] < term_pos[b as usize]
            });
            self.stash -= 1;
        }
    }
}

impl<H: HeapOps + std::fmt::Debug> SearchIterator for WeightedSetTermSearch<H> {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        self.children.init_range(begin_id, end_id);
        for (slot, pos) in self.term_pos.iter_mut().enumerate() {
            *pos = self.children.get_docid(slot);
        }
        self.stash = 0;
        while self.stash < self.refs.len() {
            self.stash += 1;
            let term_pos = &self.term_pos;
            H::push(&mut self.refs[..self.stash], &|a: u32, b: u32| {
                term_pos[a as usize] < term_pos[b as usize]
            });
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        while self.stash < self.refs.len() {
            let child = self.refs[self.stash] as usize;
            self.term_pos[child] = self.children.seek(child, doc_id);
            self.stash += 1;
            let term_pos = &self.term_pos;
            H::push(&mut self.refs[..self.stash], &|a: u32, b: u32| {
                term_pos[a as usize] < term_pos[b as usize]
            });
        }
        loop {
            let front = H::front(&self.refs[..self.stash]) as usize;
            if self.term_pos[front] >= doc_id {
                break;
            }
            self.term_pos[front] = self.children.seek(front, doc_id);
            let term_pos = &self.term_pos;
            H::adjust(&mut self.refs[..self.stash], &|a: u32, b: u32| {
                term_pos[a as usize] < term_pos[b as usize]
            });
        }
        let front = H::front(&self.refs[..self.stash]) as usize;
        self.state.set_doc_id(self.term_pos[front]);
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        let needed = {
            let (md, handle) = &self.output;
            !self.field_is_filter && !md.borrow().term_field(*handle).is_not_needed()
        };
        if needed {
            self.pop_matching_children(doc_id);
            let weights = &self.weights;
            self.refs[self.stash..]
                .sort_by(|&a, &b| weights[b as usize].cmp(&weights[a as usize]));
            let (md, handle) = &self.output;
            let mut md = md.borrow_mut();
            let row = md.term_field_mut(*handle);
            row.reset(doc_id);
            for &child in &self.refs[self.stash..] {
                row.append_position(Position::with_element_weight(
                    self.weights[child as usize],
                ));
            }
        } else {
            let (md, handle) = &self.output;
            md.borrow_mut()
                .term_field_mut(*handle)
                .reset_only_doc_id(doc_id);
        }
    }

    fn is_strict(&self) -> Trinary {
        Trinary::True
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        self.children.get_hits(begin_id, self.state.end_id())
    }

    fn and_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        let hits = self.get_hits(begin_id);
        result.and_with(&hits);
    }

    fn or_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        self.children.or_hits_into(result, begin_id);
    }

    fn name(&self) -> &'static str {
        "WeightedSetTermSearch"
    }
}
