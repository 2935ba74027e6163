//! The OR operator.
//!
//! The non-strict variant probes children linearly. The strict variant
//! keeps a heap over the children keyed by their current doc id; the
//! heap layout and reference width are chosen by child count (sorted
//! array up to 0x70 children, binary heap with u8/u16/u32 refs above).
//! A strict OR may assume all of its children are strict.

use std::marker::PhantomData;

use marlin_bitvec::BitVector;
use marlin_types::{DocId, Trinary};

use crate::heap::{HeapOps, HeapRef, LeftArrayHeap, LeftHeap};
use crate::multi_search::{init_children, MultiKind, MultiSearch};
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};
use crate::termwise;
use crate::unpack::{UnpackInfo, UnpackPolicy};

/// Build an OR iterator; strict variants use the heap implementation.
#[must_use]
pub fn create(
    children: Vec<SearchIteratorBox>,
    strict: bool,
    unpack: UnpackInfo,
) -> SearchIteratorBox {
    let policy = UnpackPolicy::from_info(unpack);
    if strict {
        match children.len() {
            0..=0x70 => Box::new(StrictHeapOrSearch::<LeftArrayHeap, u8>::new(children, policy)),
            0x71..=0xff => Box::new(StrictHeapOrSearch::<LeftHeap, u8>::new(children, policy)),
            0x100..=0xffff => Box::new(StrictHeapOrSearch::<LeftHeap, u16>::new(children, policy)),
            _ => Box::new(StrictHeapOrSearch::<LeftHeap, u32>::new(children, policy)),
        }
    } else {
        Box::new(OrLikeSearch {
            state: IteratorState::default(),
            children,
            strict: false,
            unpack: policy,
        })
    }
}

/// Build an OR iterator that unpacks all children.
#[must_use]
pub fn create_full_unpack(children: Vec<SearchIteratorBox>, strict: bool) -> SearchIteratorBox {
    let mut info = UnpackInfo::new();
    info.force_all();
    create(children, strict, info)
}

/// Strict OR without the heap; linear restart on every seek. Kept for
/// small child counts and as a reference implementation for the heap
/// variant.
#[must_use]
pub fn create_plain(
    children: Vec<SearchIteratorBox>,
    strict: bool,
    unpack: UnpackInfo,
) -> SearchIteratorBox {
    Box::new(OrLikeSearch {
        state: IteratorState::default(),
        children,
        strict,
        unpack: UnpackPolicy::from_info(unpack),
    })
}

#[derive(Debug)]
pub struct OrLikeSearch {
    state: IteratorState,
    children: Vec<SearchIteratorBox>,
    strict: bool,
    unpack: UnpackPolicy,
}

impl SearchIterator for OrLikeSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        init_children(&mut self.children, begin_id, end_id);
        if self.strict {
            self.do_seek(begin_id);
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        for child in &mut self.children {
            if child.seek(doc_id) {
                self.state.set_doc_id(doc_id);
                return;
            }
        }
        if self.strict {
            let min_next = self
                .children
                .iter()
                .map(|child| child.doc_id())
                .min()
                .unwrap_or(marlin_types::END_DOC_ID);
            self.state.set_doc_id(min_next);
        }
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        self.unpack.unpack_children(&mut self.children, doc_id);
    }

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        let end = self.state.end_id();
        termwise::or_children(&mut self.children, begin_id, end)
    }

    fn and_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        let hits = self.get_hits(begin_id);
        result.and_with(&hits);
    }

    fn or_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        termwise::or_children_into(result, &mut self.children, begin_id);
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "OrLikeSearch"
    }
}

impl MultiSearch for OrLikeSearch {
    fn children(&self) -> &[SearchIteratorBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
        &mut self.children
    }

    fn multi_kind(&self) -> MultiKind {
        MultiKind::Or
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
pub struct StrictHeapOrSearch<H: HeapOps, R: HeapRef> {
    state: IteratorState,
    children: Vec<SearchIteratorBox>,
    child_docid: Vec<DocId>,
    refs: Vec<R>,
    unpack: UnpackPolicy,
    _heap: PhantomData<H>,
}

impl<H: HeapOps, R: HeapRef> StrictHeapOrSearch<H, R> {
    #[must_use]
    pub fn new(children: Vec<SearchIteratorBox>, unpack: UnpackPolicy) -> Self {
        assert!(
            children.len() <= R::max_refs() + 1,
            "child count exceeds heap reference width"
        );
        let child_docid = vec![0; children.len()];
        let refs = (0..children.len()).map(R::from_usize).collect();
        Self {
            state: IteratorState::default(),
            children,
            child_docid,
            refs,
            unpack,
            _heap: PhantomData,
        }
    }

    fn rebuild_refs(&mut self) {
        self.refs = (0..self.children.len()).map(R::from_usize).collect();
    }
}

impl<H: HeapOps + std::fmt::Debug, R: HeapRef> SearchIterator for StrictHeapOrSearch<H, R> {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        init_children(&mut self.children, begin_id, end_id);
        for (slot, child) in self.child_docid.iter_mut().zip(&self.children) {
            *slot = child.doc_id();
        }
        let docids = &self.child_docid;
        let less = |a: R, b: R| docids[a.to_usize()] < docids[b.to_usize()];
        for i in 2..=self.refs.len() {
            H::push(&mut self.refs[..i], &less);
        }
        let front = H::front(&self.refs).to_usize();
        self.state.set_doc_id(self.child_docid[front]);
    }

    fn do_seek(&mut self, doc_id: DocId) {
        loop {
            let front = H::front(&self.refs).to_usize();
            if self.child_docid[front] >= doc_id {
                break;
            }
            let child = &mut self.children[front];
            child.do_seek(doc_id);
            self.child_docid[front] = child.doc_id();
            let docids = &self.child_docid;
            let less = |a: R, b: R| docids[a.to_usize()] < docids[b.to_usize()];
            H::adjust(&mut self.refs, &less);
        }
        let front = H::front(&self.refs).to_usize();
        self.state.set_doc_id(self.child_docid[front]);
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        let n = self.children.len();
        self.unpack.each(n, |i| {
            if self.child_docid[i] == doc_id {
                self.children[i].do_unpack(doc_id);
            }
        });
    }

    fn is_strict(&self) -> Trinary {
        Trinary::True
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        let end = self.state.end_id();
        termwise::or_children(&mut self.children, begin_id, end)
    }

    fn and_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        let hits = self.get_hits(begin_id);
        result.and_with(&hits);
    }

    fn or_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        termwise::or_children_into(result, &mut self.children, begin_id);
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "StrictHeapOrSearch"
    }
}

impl<H: HeapOps + std::fmt::Debug, R: HeapRef> MultiSearch for StrictHeapOrSearch<H, R> {
    fn children(&self) -> &[SearchIteratorBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
        &mut self.children
    }

    fn multi_kind(&self) -> MultiKind {
        MultiKind::Or
    }

    fn need_unpack(&self, index: usize) -> bool {
        self.unpack.need_unpack(index)
    }

    fn on_insert(&mut self, index: usize) {
        self.unpack.on_insert(index);
        let doc_id = self.children[index].doc_id();
        self.child_docid.insert(index, doc_id);
        self.rebuild_refs();
    }

    fn on_remove(&mut self, index: usize) {
        self.unpack.on_remove(index);
        self.child_docid.remove(index);
        self.rebuild_refs();
    }
}
