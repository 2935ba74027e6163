//! Sparse dot-product iterator.
//!
//! Matches the union of its weighted term children; unpack computes
//! `score = Σ weights[c] · child_weight(c, doc)` over the children
//! matching the document and writes it as the raw score of the output
//! row. The children are merged with a heap keyed by current doc id;
//! the heap layout follows child count.

use std::marker::PhantomData;

use marlin_types::{DocId, SharedMatchData, TermFieldHandle, Trinary};

use crate::heap::{HeapOps, LeftArrayHeap, LeftHeap};
use crate::iterator_pack::SearchIteratorPack;
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};

/// Output row of a weighted leaf operator: the scratch shared with the
/// surrounding query plus the handle of the row to write.
pub type OutputRow = (SharedMatchData, TermFieldHandle);

/// Build a dot-product iterator over weighted term children.
/// `child_handles` address the children's rows inside `child_match_data`
/// (the operator-private scratch).
#[must_use]
pub fn create(
    children: Vec<SearchIteratorBox>,
    output: OutputRow,
    child_handles: Vec<TermFieldHandle>,
    weights: Vec<i32>,
    child_match_data: SharedMatchData,
) -> SearchIteratorBox {
    assert_eq!(children.len(), weights.len());
    assert!(!children.is_empty());
    let mut children = children;
    if children.len() == 1 {
        if let Some(child) = children.pop() {
            return Box::new(SingleTermDotProductSearch {
                state: IteratorState::default(),
                child,
                child_handle: child_handles[0],
                child_match_data,
                output,
                weight: f64::from(weights[0]),
            });
        }
    }
    let pack = SearchIteratorPack::new(children, child_handles, child_match_data);
    if pack.len() < 128 {
        Box::new(DotProductSearch::<LeftArrayHeap>::new(output, weights, pack))
    } else {
        Box::new(DotProductSearch::<LeftHeap>::new(output, weights, pack))
    }
}

#[derive(Debug)]
struct DotProductSearch<H: HeapOps> {
    state: IteratorState,
    output: OutputRow,
    weights: Vec<i32>,
    term_pos: Vec<DocId>,
    refs: Vec<u32>,
    /// Number of refs currently inside the heap; popped refs are parked
    /// at `refs[stash..]`.
    stash: usize,
    children: SearchIteratorPack,
    _heap: PhantomData<H>,
}

impl<H: HeapOps> DotProductSearch<H> {
    fn new(output: OutputRow, weights: Vec<i32>, children: SearchIteratorPack) -> Self {
        let n = weights.len();
        Self {
            state: IteratorState::default(),
            output,
            weights,
            term_pos: vec![0; n],
            refs: (0..n as u32).collect(),
            stash: 0,
            children,
            _heap: PhantomData,
        }
    }
}

impl<H: HeapOps + std::fmt::Debug> SearchIterator for DotProductSearch<H> {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        self.children.init_range(begin_id, end_id);
        for (slot, child) in self.term_pos.iter_mut().enumerate() {
            *child = self.children.get_docid(slot);
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
        let mut score = 0.0;
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
            let child = self.refs[self.stash] as usize;
            score += f64::from(self.weights[child])
                * f64::from(self.children.get_weight(child, doc_id));
        }
        let (md, handle) = &self.output;
        md.borrow_mut()
            .term_field_mut(*handle)
            .set_raw_score(doc_id, score);
    }

    fn is_strict(&self) -> Trinary {
        Trinary::True
    }

    fn name(&self) -> &'static str {
        "DotProductSearch"
    }
}

/// Degenerate single-term case: forwards positioning to the child and
/// scales its reported weight.
#[derive(Debug)]
struct SingleTermDotProductSearch {
    state: IteratorState,
    child: SearchIteratorBox,
    child_handle: TermFieldHandle,
    child_match_data: SharedMatchData,
    output: OutputRow,
    weight: f64,
}

impl SearchIterator for SingleTermDotProductSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        self.child.init_range(begin_id, end_id);
        self.state.set_doc_id(self.child.doc_id());
    }

    fn do_seek(&mut self, doc_id: DocId) {
        self.child.do_seek(doc_id);
        self.state.set_doc_id(self.child.doc_id());
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        self.child.do_unpack(doc_id);
        let child_weight = f64::from(
            self.child_match_data
                .borrow()
                .term_field(self.child_handle)
                .weight(),
        );
        let (md, handle) = &self.output;
        md.borrow_mut()
            .term_field_mut(*handle)
            .set_raw_score(doc_id, self.weight * child_weight);
    }

    fn is_strict(&self) -> Trinary {
        Trinary::True
    }

    fn name(&self) -> &'static str {
        "SingleTermDotProductSearch"
    }
}
