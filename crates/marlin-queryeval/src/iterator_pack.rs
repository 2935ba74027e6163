//! Flat pack of child iterators with their private match data.
//!
//! The weighted leaf operators (dot product, weighted set) evaluate
//! many term iterators whose match data is internal to the operator:
//! the pack owns a private scratch instance, and children are addressed
//! by dense references instead of boxed trait objects on the hot path.

use marlin_bitvec::BitVector;
use marlin_types::{DocId, SharedMatchData, TermFieldHandle};

use crate::search_iterator::SearchIteratorBox;
use crate::termwise;

#[derive(Debug)]
pub struct SearchIteratorPack {
    children: Vec<SearchIteratorBox>,
    child_match: Vec<TermFieldHandle>,
    match_data: SharedMatchData,
}

impl SearchIteratorPack {
    /// Pack `children` with their scratch rows inside `match_data`.
    /// `child_match` may be empty when weights are never read.
    #[must_use]
    pub fn new(
        children: Vec<SearchIteratorBox>,
        child_match: Vec<TermFieldHandle>,
        match_data: SharedMatchData,
    ) -> Self {
        debug_assert!(child_match.is_empty() || child_match.len() == children.len());
        Self {
            children,
            child_match,
            match_data,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub fn get_docid(&self, child: usize) -> DocId {
        self.children[child].doc_id()
    }

    /// Seek one child, returning its resulting position.
    pub fn seek(&mut self, child: usize, doc_id: DocId) -> DocId {
        self.children[child].seek(doc_id);
        self.children[child].doc_id()
    }

    /// Unpack one child and read the weight it reported.
    pub fn get_weight(&mut self, child: usize, doc_id: DocId) -> i32 {
        self.children[child].do_unpack(doc_id);
        self.match_data
            .borrow()
            .term_field(self.child_match[child])
            .weight()
    }

    pub fn unpack(&mut self, child: usize, doc_id: DocId) {
        self.children[child].do_unpack(doc_id);
    }

    pub fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        for child in &mut self.children {
            child.init_range(begin_id, end_id);
        }
    }

    /// Union of all children's hits.
    pub fn get_hits(&mut self, begin_id: DocId, end_id: DocId) -> BitVector {
        termwise::or_children(&mut self.children, begin_id, end_id)
    }

    pub fn or_hits_into(&mut self, result: &mut BitVector, begin_id: DocId) {
        termwise::or_children_into(result, &mut self.children, begin_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_iterator::test_support::VecIterator;
    use crate::search_iterator::SearchIterator;
    use marlin_types::MatchDataLayout;

    #[test]
    fn pack_tracks_child_positions() {
        let layout = MatchDataLayout::new();
        let md = layout.create_shared_match_data();
        let children: Vec<SearchIteratorBox> = vec![
            Box::new(VecIterator::new(vec![2, 6])),
            Box::new(VecIterator::new(vec![4])),
        ];
        let mut pack = SearchIteratorPack::new(children, Vec::new(), md);
        pack.init_range(1, 10);
        assert_eq!(pack.get_docid(0), 2);
        assert_eq!(pack.get_docid(1), 4);
        assert_eq!(pack.seek(0, 3), 6);
        let hits = pack.get_hits(1, 10);
        assert_eq!(hits.count_bits(), 3);
    }
}
