//! Termwise evaluation.
//!
//! A subtree whose hits are not needed for ranking can be evaluated
//! "termwise": its hits for the active range are materialized into a
//! bit-vector fragment once, and the wrapper then answers `seek` by bit
//! lookup. The helpers here also implement the child folds used by the
//! operators' `get_hits` implementations, visiting bit-vector children
//! before the rest so the cheap combines happen against dense data
//! first.

use marlin_bitvec::BitVector;
use marlin_types::{DocId, Trinary};

use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};
use crate::unpack::UnpackInfo;

fn fold_children(
    mut result: Option<BitVector>,
    children: &mut [SearchIteratorBox],
    begin_id: DocId,
    and_fold: bool,
) -> Option<BitVector> {
    for select_bit_vector in [true, false] {
        for child in children
            .iter_mut()
            .filter(|child| child.is_bit_vector() == select_bit_vector)
        {
            match result.as_mut() {
                None => result = Some(child.get_hits(begin_id)),
                Some(acc) => {
                    if and_fold {
                        child.and_hits_into(acc, begin_id);
                    } else {
                        child.or_hits_into(acc, begin_id);
                    }
                }
            }
        }
    }
    result
}

/// Intersection of all children's hits over `[begin_id, end_id)`.
#[must_use]
pub fn and_children(
    children: &mut [SearchIteratorBox],
    begin_id: DocId,
    end_id: DocId,
) -> BitVector {
    fold_children(None, children, begin_id, true)
        .unwrap_or_else(|| BitVector::new(begin_id, end_id))
}

/// Intersect all children's hits into `result`.
pub fn and_children_into(
    result: &mut BitVector,
    children: &mut [SearchIteratorBox],
    begin_id: DocId,
) {
    for select_bit_vector in [true, false] {
        for child in children
            .iter_mut()
            .filter(|child| child.is_bit_vector() == select_bit_vector)
        {
            child.and_hits_into(result, begin_id);
        }
    }
}

/// Union of all children's hits over `[begin_id, end_id)`.
#[must_use]
pub fn or_children(
    children: &mut [SearchIteratorBox],
    begin_id: DocId,
    end_id: DocId,
) -> BitVector {
    fold_children(None, children, begin_id, false)
        .unwrap_or_else(|| BitVector::new(begin_id, end_id))
}

/// Union all children's hits into `result`.
pub fn or_children_into(
    result: &mut BitVector,
    children: &mut [SearchIteratorBox],
    begin_id: DocId,
) {
    for select_bit_vector in [true, false] {
        for child in children
            .iter_mut()
            .filter(|child| child.is_bit_vector() == select_bit_vector)
        {
            child.or_hits_into(result, begin_id);
        }
    }
}

/// Wrap `search` for termwise evaluation: the first `init_range`
/// materializes all hits into a bit-vector fragment, and subsequent
/// seeks answer from the fragment. No match data is produced for hits
/// delivered by the wrapper.
#[must_use]
pub fn make_termwise(search: SearchIteratorBox, strict: bool) -> SearchIteratorBox {
    Box::new(TermwiseSearch {
        state: IteratorState::default(),
        search,
        result: None,
        my_begin_id: 0,
        my_first_hit: 0,
        strict,
    })
}

#[derive(Debug)]
struct TermwiseSearch {
    state: IteratorState,
    search: SearchIteratorBox,
    result: Option<BitVector>,
    my_begin_id: DocId,
    my_first_hit: DocId,
    strict: bool,
}

impl TermwiseSearch {
    fn same_range(&self, begin_id: DocId, end_id: DocId) -> bool {
        begin_id == self.my_begin_id && end_id == self.state.end_id() && self.result.is_some()
    }
}

impl SearchIterator for TermwiseSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        if !self.same_range(begin_id, end_id) {
            self.my_begin_id = begin_id;
            self.state = IteratorState::for_range(begin_id, end_id);
            self.search.init_range(begin_id, end_id);
            self.my_first_hit = self.state.doc_id().max(self.search.doc_id());
            self.result = Some(self.search.get_hits(begin_id));
        }
        self.state.set_doc_id(self.my_first_hit);
    }

    fn do_seek(&mut self, doc_id: DocId) {
        if self.state.is_past_end(doc_id) {
            self.state.set_at_end();
            return;
        }
        let result = self
            .result
            .as_ref()
            .expect("init_range populates the fragment before seeks");
        if self.strict {
            let next = result.next_true_bit(doc_id);
            if self.state.is_past_end(next) {
                self.state.set_at_end();
            } else {
                self.state.set_doc_id(next);
            }
        } else if result.test_bit(doc_id) {
            self.state.set_doc_id(doc_id);
        }
    }

    fn do_unpack(&mut self, _doc_id: DocId) {}

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn name(&self) -> &'static str {
        "TermwiseSearch"
    }
}

/// Partition of an operator's sub-iterators into the termwise-capable
/// group and the rest, keeping track of where the wrapped group must be
/// re-inserted and which surviving children still require unpack.
#[derive(Debug)]
pub struct TermwisePartition {
    termwise: Vec<SearchIteratorBox>,
    other: Vec<SearchIteratorBox>,
    /// Original index of the first termwise child; the wrapped group is
    /// re-inserted at this position among the survivors.
    pub first_termwise: usize,
    /// Unpack info renumbered for the rearranged child list.
    pub termwise_unpack: UnpackInfo,
}

impl TermwisePartition {
    /// Split `sub_searches` by unpack requirement and per-child termwise
    /// capability (`allow_termwise(i)` reflects the child blueprint's
    /// state).
    pub fn split(
        sub_searches: Vec<SearchIteratorBox>,
        unpack_info: &UnpackInfo,
        allow_termwise: impl Fn(usize) -> bool,
    ) -> Self {
        let total = sub_searches.len();
        let mut partition = Self {
            termwise: Vec::with_capacity(total),
            other: Vec::with_capacity(total),
            first_termwise: total,
            termwise_unpack: UnpackInfo::new(),
        };
        for (i, search) in sub_searches.into_iter().enumerate() {
            let need_unpack = unpack_info.need_unpack(i);
            if need_unpack || !allow_termwise(i) {
                if need_unpack {
                    let index = if i < partition.first_termwise {
                        partition.other.len()
                    } else {
                        partition.other.len() + 1
                    };
                    partition.termwise_unpack.add(index);
                }
                partition.other.push(search);
            } else {
                partition.first_termwise = partition.first_termwise.min(i);
                partition.termwise.push(search);
            }
        }
        partition
    }

    /// The termwise group, consumed to build the group iterator.
    pub fn take_termwise_children(&mut self) -> Vec<SearchIteratorBox> {
        std::mem::take(&mut self.termwise)
    }

    /// Insert the wrapped group iterator back among the survivors.
    pub fn insert_termwise(&mut self, search: SearchIteratorBox, strict: bool) {
        let wrapped = make_termwise(search, strict);
        self.other.insert(self.first_termwise, wrapped);
    }

    /// The rearranged child list.
    pub fn into_result(self) -> Vec<SearchIteratorBox> {
        self.other
    }
}
