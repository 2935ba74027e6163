//! The AND-NOT operator.
//!
//! Matches documents hit by the first (positive) child and by none of
//! the remaining (negative) children. The strict variant assumes the
//! positive child is strict.

use marlin_bitvec::BitVector;
use marlin_types::{DocId, Trinary};

use crate::multi_search::{init_children, MultiKind, MultiSearch};
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};
use crate::termwise;

/// Build an AND-NOT iterator over `children[0]` minus `children[1..]`.
#[must_use]
pub fn create(children: Vec<SearchIteratorBox>, strict: bool) -> SearchIteratorBox {
    if strict {
        Box::new(AndNotSearchStrict {
            inner: AndNotSearch {
                state: IteratorState::default(),
                children,
            },
        })
    } else {
        Box::new(AndNotSearch {
            state: IteratorState::default(),
            children,
        })
    }
}

#[derive(Debug)]
pub struct AndNotSearch {
    state: IteratorState,
    children: Vec<SearchIteratorBox>,
}

impl AndNotSearch {
    fn get_hits_impl(&mut self, begin_id: DocId) -> BitVector {
        let mut result = self.children[0].get_hits(begin_id);
        result.not_self();
        termwise::or_children_into(&mut result, &mut self.children[1..], begin_id);
        result.not_self();
        result
    }
}

impl SearchIterator for AndNotSearch {
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
        if !self.children[0].seek(doc_id) {
            return; // no match in positive subtree
        }
        for negative in &mut self.children[1..] {
            if negative.seek(doc_id) {
                return; // match in negative subtree
            }
        }
        self.state.set_doc_id(doc_id);
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        self.children[0].do_unpack(doc_id);
    }

    fn is_strict(&self) -> Trinary {
        Trinary::False
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        self.get_hits_impl(begin_id)
    }

    fn or_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        let hits = self.get_hits_impl(begin_id);
        result.or_with(&hits);
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "AndNotSearch"
    }
}

impl MultiSearch for AndNotSearch {
    fn children(&self) -> &[SearchIteratorBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
        &mut self.children
    }

    fn multi_kind(&self) -> MultiKind {
        MultiKind::AndNot
    }

    fn need_unpack(&self, index: usize) -> bool {
        index == 0
    }
}

#[derive(Debug)]
pub struct AndNotSearchStrict {
    inner: AndNotSearch,
}

impl AndNotSearchStrict {
    /// Find the next positive hit with no negative match. `seek_only`
    /// selects the unguarded internal seek on the positive child.
    fn internal_seek(&mut self, doc_id: DocId, seek_only: bool) {
        let children = &mut self.inner.children;
        let mut hit = if seek_only {
            children[0].do_seek(doc_id);
            children[0].doc_id() == doc_id
        } else {
            children[0].seek(doc_id)
        };
        if hit {
            for negative in &mut children[1..] {
                if negative.seek(doc_id) {
                    hit = false;
                    break;
                }
            }
        }
        if hit {
            self.inner.state.set_doc_id(doc_id);
            return;
        }
        let mut next_id = children[0].doc_id();
        while !self.inner.state.is_past_end(next_id) {
            let mut found = true;
            for negative in &mut children[1..] {
                if negative.seek(next_id) {
                    found = false;
                    next_id += 1;
                    break;
                }
            }
            if found {
                break;
            }
            children[0].do_seek(next_id);
            next_id = children[0].doc_id();
        }
        self.inner.state.set_doc_id(next_id);
    }
}

impl SearchIterator for AndNotSearchStrict {
    fn state(&self) -> &IteratorState {
        &self.inner.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.inner.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.inner.init_range(begin_id, end_id);
        self.internal_seek(begin_id, false);
    }

    fn do_seek(&mut self, doc_id: DocId) {
        self.internal_seek(doc_id, true);
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        self.inner.do_unpack(doc_id);
    }

    fn is_strict(&self) -> Trinary {
        Trinary::True
    }

    fn get_hits(&mut self, begin_id: DocId) -> BitVector {
        self.inner.get_hits_impl(begin_id)
    }

    fn or_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        let hits = self.inner.get_hits_impl(begin_id);
        result.or_with(&hits);
    }

    fn and_with(
        &mut self,
        filter: SearchIteratorBox,
        estimate: u32,
    ) -> Option<SearchIteratorBox> {
        self.inner.children[0].and_with(filter, estimate)
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(&mut self.inner)
    }

    fn name(&self) -> &'static str {
        "AndNotSearchStrict"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_iterator::test_support::VecIterator;

    fn boxed(hits: &[DocId]) -> SearchIteratorBox {
        Box::new(VecIterator::new(hits.to_vec()))
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
    fn strict_andnot_subtracts_negatives() {
        let mut it = create(vec![boxed(&[1, 2, 3, 4, 5]), boxed(&[2, 4])], true);
        assert_eq!(collect(&mut it, 1, 100), vec![1, 3, 5]);
    }

    #[test]
    fn strict_andnot_with_multiple_negatives() {
        let mut it = create(
            vec![boxed(&[1, 2, 3, 4, 5, 6]), boxed(&[2]), boxed(&[5, 6])],
            true,
        );
        assert_eq!(collect(&mut it, 1, 100), vec![1, 3, 4]);
    }

    #[test]
    fn non_strict_andnot_answers_membership() {
        let mut it = create(vec![boxed(&[2, 4, 6]), boxed(&[4])], false);
        it.init_range(1, 100);
        assert!(it.seek(2));
        assert!(!it.seek(4));
        assert!(it.seek(6));
    }

    #[test]
    fn get_hits_is_set_difference() {
        let mut it = create(vec![boxed(&[1, 2, 4, 7, 9]), boxed(&[4])], true);
        it.init_range(1, 20);
        let hits = it.get_hits(1);
        assert_eq!(hits.count_bits(), 4);
        assert!(!hits.test_bit(4));
        assert!(hits.test_bit(9));
    }
}
