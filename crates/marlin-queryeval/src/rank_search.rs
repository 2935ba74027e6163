//! The RANK operator.
//!
//! Matches exactly when the first child matches; the remaining children
//! exist only to contribute unpack data for ranking.

use marlin_types::{DocId, Trinary};

use crate::multi_search::{init_children, MultiKind, MultiSearch};
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};

/// Build a RANK iterator over `children[0]`, with `children[1..]` as
/// rank-data-only contributors.
#[must_use]
pub fn create(children: Vec<SearchIteratorBox>, strict: bool) -> SearchIteratorBox {
    Box::new(RankSearch {
        state: IteratorState::default(),
        children,
        strict,
    })
}

#[derive(Debug)]
pub struct RankSearch {
    state: IteratorState,
    children: Vec<SearchIteratorBox>,
    strict: bool,
}

impl SearchIterator for RankSearch {
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
            self.state.set_doc_id(self.children[0].doc_id());
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        let hit = self.children[0].seek(doc_id);
        if hit {
            self.state.set_doc_id(doc_id);
        } else if self.strict {
            self.state.set_doc_id(self.children[0].doc_id());
        }
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        for child in &mut self.children {
            if child.doc_id() < doc_id {
                child.do_seek(doc_id);
            }
            if child.doc_id() == doc_id {
                child.do_unpack(doc_id);
            }
        }
    }

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn and_with(
        &mut self,
        filter: SearchIteratorBox,
        estimate: u32,
    ) -> Option<SearchIteratorBox> {
        if self.strict {
            self.children[0].and_with(filter, estimate)
        } else {
            Some(filter)
        }
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "RankSearch"
    }
}

impl MultiSearch for RankSearch {
    fn children(&self) -> &[SearchIteratorBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
        &mut self.children
    }

    fn multi_kind(&self) -> MultiKind {
        MultiKind::Rank
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_iterator::test_support::VecIterator;

    fn boxed(hits: &[DocId]) -> SearchIteratorBox {
        Box::new(VecIterator::new(hits.to_vec()))
    }

    #[test]
    fn rank_matches_exactly_first_child() {
        let mut it = create(vec![boxed(&[2, 5, 9]), boxed(&[3, 5])], true);
        it.init_range(1, 100);
        assert_eq!(it.doc_id(), 2);
        assert!(it.seek(2));
        assert!(!it.seek(3));
        assert_eq!(it.doc_id(), 5);
        assert!(it.seek(5));
        assert!(it.seek(9));
        assert!(!it.seek(10));
        assert!(it.is_at_end());
    }

    #[test]
    fn non_strict_rank_ignores_extra_children() {
        let mut it = create(vec![boxed(&[4]), boxed(&[2, 4, 6])], false);
        it.init_range(1, 100);
        assert!(!it.seek(2));
        assert!(it.seek(4));
        assert!(!it.seek(6));
    }
}
