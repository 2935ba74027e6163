//! Fused evaluation of multiple bit-vector children.
//!
//! When an AND/OR/AND-NOT iterator holds two or more bit-vector
//! children, [`optimize`] steals them into a single fused node that
//! combines the backing words in aligned batches of 8 (64 bytes) and
//! answers seeks from the cached batch. Under AND-NOT only the negative
//! side is stolen, fused as OR; the surrounding AND-NOT keeps treating
//! the fused node as one negative child.

use marlin_bitvec::accel::{and_batch, or_batch, WordView, WORDS_PER_BATCH};
use marlin_bitvec::{check_mask, word_mask, word_num, BitVector, WORD_LEN};
use marlin_types::{DocId, Trinary};

use crate::empty_search::EmptySearch;
use crate::multi_search::{init_children, MultiKind, MultiSearch};
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};
use crate::unpack::UnpackInfo;

/// Word combine performed by a fused node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusedOp {
    And,
    Or,
}

#[derive(Debug)]
pub struct MultiBitVectorIterator {
    state: IteratorState,
    children: Vec<SearchIteratorBox>,
    views: Vec<(std::rc::Rc<BitVector>, bool)>,
    num_docs: DocId,
    last_max_limit: DocId,
    last_max_limit_fetch: DocId,
    last_value: u64,
    last_words: [u64; WORDS_PER_BATCH],
    unpack_info: UnpackInfo,
    op: FusedOp,
    strict: bool,
}

impl MultiBitVectorIterator {
    /// Fuse `children`, which must all be bit-vector iterators.
    #[must_use]
    pub fn new(children: Vec<SearchIteratorBox>, op: FusedOp, strict: bool) -> Self {
        let mut views = Vec::with_capacity(children.len());
        let mut num_docs = DocId::MAX;
        for child in &children {
            let view = child
                .bit_vector_view()
                .expect("fused children must be bit-vector iterators");
            num_docs = num_docs.min(view.docid_limit);
            views.push((view.bits, view.inverted));
        }
        Self {
            state: IteratorState::default(),
            children,
            views,
            num_docs,
            last_max_limit: 0,
            last_max_limit_fetch: 0,
            last_value: 0,
            last_words: [0; WORDS_PER_BATCH],
            unpack_info: UnpackInfo::new(),
            op,
            strict,
        }
    }

    pub fn add_unpack_index(&mut self, index: usize) {
        self.unpack_info.add(index);
    }

    fn invalidate_batch_cache(&mut self) {
        self.last_max_limit = 0;
        self.last_max_limit_fetch = 0;
    }

    /// Refresh the cached word for `doc_id`, fetching a new 8-word batch
    /// when the cursor has moved past the cached one.
    fn update_last_value(&mut self, doc_id: DocId) {
        if doc_id >= self.last_max_limit {
            if doc_id >= self.num_docs {
                self.state.set_at_end();
                return;
            }
            let index = word_num(doc_id);
            if doc_id >= self.last_max_limit_fetch {
                let base = index & !(WORDS_PER_BATCH - 1);
                let sources = self
                    .views
                    .iter()
                    .map(|(bits, inverted)| WordView::new(bits.words(), *inverted));
                match self.op {
                    FusedOp::And => and_batch(&mut self.last_words, base, sources),
                    FusedOp::Or => or_batch(&mut self.last_words, base, sources),
                }
                self.last_max_limit_fetch = ((base + WORDS_PER_BATCH) as u32) * WORD_LEN;
            }
            self.last_value = self.last_words[index % WORDS_PER_BATCH];
            self.last_max_limit = ((index + 1) as u32) * WORD_LEN;
        }
    }

    fn strict_seek(&mut self, doc_id: DocId) {
        self.update_last_value(doc_id);
        self.last_value &= check_mask(doc_id);
        while self.last_value == 0 && !self.state.is_at_end() {
            let next = self.last_max_limit;
            self.update_last_value(next);
        }
        if !self.state.is_at_end() {
            let doc = self.last_max_limit - WORD_LEN + self.last_value.trailing_zeros();
            if doc >= self.num_docs {
                self.state.set_at_end();
            } else {
                self.state.set_doc_id(doc);
            }
        }
    }
}

impl SearchIterator for MultiBitVectorIterator {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        init_children(&mut self.children, begin_id, end_id);
        self.invalidate_batch_cache();
        if self.strict {
            self.strict_seek(begin_id);
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        if self.strict {
            self.strict_seek(doc_id);
            return;
        }
        self.update_last_value(doc_id);
        if !self.state.is_at_end() && (self.last_value & word_mask(doc_id)) != 0 {
            self.state.set_doc_id(doc_id);
        }
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        if self.unpack_info.unpack_all() {
            for child in &mut self.children {
                if child.doc_id() < doc_id {
                    child.do_seek(doc_id);
                }
                if child.doc_id() == doc_id {
                    child.do_unpack(doc_id);
                }
            }
        } else {
            let children = &mut self.children;
            self.unpack_info
                .each(children.len(), |i| children[i].do_unpack(doc_id));
        }
    }

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn and_with(
        &mut self,
        filter: SearchIteratorBox,
        _estimate: u32,
    ) -> Option<SearchIteratorBox> {
        if self.op == FusedOp::And {
            if let Some(view) = filter.bit_vector_view() {
                self.views.push((view.bits, view.inverted));
                self.num_docs = self.num_docs.min(view.docid_limit);
                let index = self.children.len();
                self.insert_child(index, filter);
                self.invalidate_batch_cache();
                return None;
            }
        }
        Some(filter)
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "MultiBitVectorIterator"
    }
}

impl MultiSearch for MultiBitVectorIterator {
    fn children(&self) -> &[SearchIteratorBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
        &mut self.children
    }

    fn need_unpack(&self, index: usize) -> bool {
        self.unpack_info.need_unpack(index)
    }
}

fn count_bit_vectors(children: &[SearchIteratorBox]) -> usize {
    children.iter().filter(|c| c.is_bit_vector()).count()
}

/// Steal and fuse bit-vector children throughout an iterator tree.
/// Returns the rewritten tree; nodes without at least two bit-vector
/// children are left as they are.
#[must_use]
pub fn optimize(mut iterator: SearchIteratorBox) -> SearchIteratorBox {
    if let Some(blender) = iterator.as_source_blender() {
        for i in 0..blender.child_count() {
            let child = blender.take_child_search(i);
            blender.put_child_search(i, optimize(child));
        }
        return iterator;
    }
    if iterator.as_multi().is_some() {
        return optimize_multi(iterator);
    }
    iterator
}

fn optimize_multi(mut parent: SearchIteratorBox) -> SearchIteratorBox {
    let Some(multi) = parent.as_multi() else {
        return parent;
    };
    let kind = multi.multi_kind();
    let fusable = matches!(kind, MultiKind::And | MultiKind::Or | MultiKind::AndNot)
        && multi.children().len() >= 2
        && count_bit_vectors(multi.children()) >= 2;
    if fusable {
        let first_stealable = usize::from(kind == MultiKind::AndNot);
        let mut stolen = Vec::new();
        let mut unpack_indices = Vec::new();
        let mut strict = false;
        let mut insert_position = 0;
        let mut idx = first_stealable;
        while idx != multi.children().len() {
            if multi.children()[idx].is_bit_vector() {
                if stolen.is_empty() {
                    insert_position = idx;
                }
                if multi.need_unpack(idx) {
                    unpack_indices.push(stolen.len());
                }
                let bit = multi.remove_child(idx);
                if !strict && bit.is_strict() == Trinary::True {
                    strict = true;
                }
                stolen.push(bit);
            } else {
                idx += 1;
            }
        }
        let op = if kind == MultiKind::And {
            FusedOp::And
        } else {
            FusedOp::Or
        };
        let mut fused = MultiBitVectorIterator::new(stolen, op, strict);
        for index in unpack_indices {
            fused.add_unpack_index(index);
        }
        if multi.children().is_empty() {
            return Box::new(fused);
        }
        multi.insert_child(insert_position, Box::new(fused));
    }
    if let Some(multi) = parent.as_multi() {
        for slot in multi.children_mut() {
            let owned = std::mem::replace(slot, Box::new(EmptySearch::new()) as SearchIteratorBox);
            *slot = optimize(owned);
        }
    }
    parent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::and_not_search;
    use crate::and_search;
    use crate::bit_vector_iterator;
    use crate::or_search;
    use std::rc::Rc;

    fn bv_iter(docs: &[DocId], limit: DocId, strict: bool) -> SearchIteratorBox {
        bit_vector_iterator::create(
            Rc::new(BitVector::from_bits(1, limit, docs)),
            limit,
            None,
            strict,
            false,
        )
    }

    fn collect(it: &mut SearchIteratorBox, begin: DocId, end: DocId) -> Vec<DocId> {
        it.init_range(begin, end);
        let mut hits = Vec::new();
        let mut doc = begin;
        while doc < end {
            if it.seek(doc) {
                hits.push(doc);
            }
            doc = (doc + 1).max(it.doc_id());
        }
        hits
    }

    #[test]
    fn fused_or_unions_bit_vectors() {
        let mut fused: SearchIteratorBox = Box::new(MultiBitVectorIterator::new(
            vec![bv_iter(&[1, 4, 7], 100, true), bv_iter(&[2, 4, 9], 100, true)],
            FusedOp::Or,
            true,
        ));
        assert_eq!(collect(&mut fused, 1, 100), vec![1, 2, 4, 7, 9]);
    }

    #[test]
    fn fused_and_intersects_bit_vectors() {
        let mut fused: SearchIteratorBox = Box::new(MultiBitVectorIterator::new(
            vec![
                bv_iter(&[1, 4, 7, 90], 100, true),
                bv_iter(&[4, 7, 90, 95], 100, true),
            ],
            FusedOp::And,
            true,
        ));
        assert_eq!(collect(&mut fused, 1, 100), vec![4, 7, 90]);
    }

    #[test]
    fn fused_node_crosses_batch_boundaries() {
        let docs: Vec<DocId> = (1..2000).filter(|d| d % 97 == 0).collect();
        let mut fused: SearchIteratorBox = Box::new(MultiBitVectorIterator::new(
            vec![bv_iter(&docs, 2000, true), bv_iter(&docs, 2000, true)],
            FusedOp::And,
            true,
        ));
        assert_eq!(collect(&mut fused, 1, 2000), docs);
    }

    #[test]
    fn optimize_fuses_or_children() {
        let or = or_search::create_full_unpack(
            vec![bv_iter(&[1, 4, 7], 100, true), bv_iter(&[2, 4, 9], 100, true)],
            true,
        );
        let mut optimized = optimize(or);
        assert_eq!(optimized.name(), "MultiBitVectorIterator");
        assert_eq!(collect(&mut optimized, 1, 100), vec![1, 2, 4, 7, 9]);
    }

    #[test]
    fn optimize_keeps_non_bit_vector_children() {
        use crate::search_iterator::test_support::VecIterator;
        let and = and_search::create_full_unpack(
            vec![
                bv_iter(&[2, 4, 6, 8], 100, true),
                Box::new(VecIterator::new(vec![2, 4, 8])),
                bv_iter(&[2, 8], 100, false),
            ],
            true,
        );
        let mut optimized = optimize(and);
        assert_eq!(optimized.name(), "AndSearchStrict");
        assert_eq!(collect(&mut optimized, 1, 100), vec![2, 8]);
    }

    #[test]
    fn optimize_fuses_andnot_negatives_as_or() {
        let andnot = and_not_search::create(
            vec![
                bv_iter(&[1, 2, 4, 7, 9], 100, true),
                bv_iter(&[4], 100, false),
                bv_iter(&[9], 100, false),
            ],
            true,
        );
        let mut optimized = optimize(andnot);
        assert_eq!(optimized.name(), "AndNotSearchStrict");
        assert_eq!(collect(&mut optimized, 1, 100), vec![1, 2, 7]);
    }

    #[test]
    fn fused_and_absorbs_extra_filter() {
        let mut fused: SearchIteratorBox = Box::new(MultiBitVectorIterator::new(
            vec![
                bv_iter(&[1, 4, 7, 9], 100, true),
                bv_iter(&[1, 4, 9], 100, true),
            ],
            FusedOp::And,
            true,
        ));
        fused.init_range(1, 100);
        assert!(fused.seek(1));
        let absorbed = fused.and_with(bv_iter(&[4, 9], 100, true), 2);
        assert!(absorbed.is_none());
        fused.init_range(1, 100);
        assert_eq!(collect(&mut fused, 1, 100), vec![4, 9]);
    }
}
