//! Shared plumbing for operators that combine a list of children.
//!
//! Operators owning a child list (AND, OR, AND-NOT, RANK, NEAR, the
//! fused bit-vector node) expose it through [`MultiSearch`] so tree
//! rewrites performed after construction (bit-vector fusion, filter
//! absorption) can move children around. `insert_child`/`remove_child`
//! invoke the `on_insert`/`on_remove` hooks so the owner can keep its
//! unpack bookkeeping aligned with the shifted indices.

use marlin_types::DocId;

use crate::search_iterator::{SearchIterator, SearchIteratorBox};

/// Operator identity needed by the bit-vector fusion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiKind {
    And,
    Or,
    AndNot,
    Rank,
    Other,
}

/// An iterator with an owned, mutable child list.
pub trait MultiSearch: SearchIterator {
    fn children(&self) -> &[SearchIteratorBox];
    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox>;

    fn multi_kind(&self) -> MultiKind {
        MultiKind::Other
    }

    /// Whether the child at `index` must be unpacked for ranking.
    fn need_unpack(&self, index: usize) -> bool {
        let _ = index;
        true
    }

    /// Called after a child was inserted at `index`.
    fn on_insert(&mut self, index: usize) {
        let _ = index;
    }

    /// Called after the child at `index` was removed.
    fn on_remove(&mut self, index: usize) {
        let _ = index;
    }

    fn insert_child(&mut self, index: usize, child: SearchIteratorBox) {
        self.children_mut().insert(index, child);
        self.on_insert(index);
    }

    fn remove_child(&mut self, index: usize) -> SearchIteratorBox {
        let child = self.children_mut().remove(index);
        self.on_remove(index);
        child
    }
}

/// Propagate `init_range` to all children.
pub fn init_children(children: &mut [SearchIteratorBox], begin_id: DocId, end_id: DocId) {
    for child in children {
        child.init_range(begin_id, end_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_iterator::test_support::VecIterator;
    use crate::search_iterator::IteratorState;
    use marlin_types::Trinary;

    #[derive(Debug)]
    struct Recorder {
        state: IteratorState,
        children: Vec<SearchIteratorBox>,
        events: Vec<(char, usize)>,
    }

    impl SearchIterator for Recorder {
        fn state(&self) -> &IteratorState {
            &self.state
        }
        fn state_mut(&mut self) -> &mut IteratorState {
            &mut self.state
        }
        fn do_seek(&mut self, _doc_id: DocId) {}
        fn do_unpack(&mut self, _doc_id: DocId) {}
        fn is_strict(&self) -> Trinary {
            Trinary::False
        }
        fn name(&self) -> &'static str {
            "Recorder"
        }
    }

    impl MultiSearch for Recorder {
        fn children(&self) -> &[SearchIteratorBox] {
            &self.children
        }
        fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
            &mut self.children
        }
        fn on_insert(&mut self, index: usize) {
            self.events.push(('i', index));
        }
        fn on_remove(&mut self, index: usize) {
            self.events.push(('r', index));
        }
    }

    #[test]
    fn insert_and_remove_fire_hooks() {
        let mut node = Recorder {
            state: IteratorState::default(),
            children: vec![
                Box::new(VecIterator::new(vec![1])),
                Box::new(VecIterator::new(vec![2])),
            ],
            events: Vec::new(),
        };
        node.insert_child(1, Box::new(VecIterator::new(vec![3])));
        assert_eq!(node.children().len(), 3);
        let removed = node.remove_child(0);
        assert_eq!(removed.name(), "VecIterator");
        assert_eq!(node.events, vec![('i', 1), ('r', 0)]);
    }
}
