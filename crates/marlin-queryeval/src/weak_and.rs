//! The WEAK-AND (wand) operator.
//!
//! A top-N scoring union: every child carries an integer weight, a hit
//! scores the sum of the weights of the children matching it, and a
//! priority queue of the best N scores seen so far yields a rising
//! threshold. Documents whose best possible score cannot exceed the
//! threshold are skipped without touching all children, using the
//! classic pivot rule over children ordered by current doc id. Child
//! order is fixed (parallel to the weights) and every hit is unpacked.

use std::collections::BinaryHeap;

use marlin_types::{DocId, Trinary};

use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};

/// Priority queue holding the best N hit scores; the threshold is the
/// worst score still inside once the queue is full.
#[derive(Debug)]
pub struct WeakAndPriorityQueue {
    best: BinaryHeap<std::cmp::Reverse<i64>>,
    target_hits: usize,
}

impl WeakAndPriorityQueue {
    #[must_use]
    pub fn new(target_hits: usize) -> Self {
        Self {
            best: BinaryHeap::with_capacity(target_hits + 1),
            target_hits,
        }
    }

    /// Score a document must beat to be interesting.
    #[must_use]
    pub fn threshold(&self) -> i64 {
        if self.best.len() < self.target_hits {
            0
        } else {
            self.best.peek().map_or(0, |worst| worst.0)
        }
    }

    pub fn insert(&mut self, score: i64) {
        self.best.push(std::cmp::Reverse(score));
        if self.best.len() > self.target_hits {
            self.best.pop();
        }
    }

    pub fn reset(&mut self) {
        self.best.clear();
    }
}

/// A wand term: child iterator, weight, and the plan-time hit estimate
/// used for diagnostics.
#[derive(Debug)]
pub struct WandTerm {
    pub search: SearchIteratorBox,
    pub weight: u32,
    pub est_hits: u32,
}

/// Build a weak-and iterator keeping roughly `target_hits` best hits.
#[must_use]
pub fn create(terms: Vec<WandTerm>, target_hits: u32, strict: bool) -> SearchIteratorBox {
    let order = (0..terms.len()).collect();
    Box::new(WeakAndSearch {
        state: IteratorState::default(),
        doc_ids: vec![0; terms.len()],
        terms,
        order,
        scores: WeakAndPriorityQueue::new(target_hits as usize),
        strict,
    })
}

#[derive(Debug)]
pub struct WeakAndSearch {
    state: IteratorState,
    terms: Vec<WandTerm>,
    /// Term indices ordered by current doc id.
    order: Vec<usize>,
    doc_ids: Vec<DocId>,
    scores: WeakAndPriorityQueue,
    strict: bool,
}

impl WeakAndSearch {
    fn seek_term(&mut self, term: usize, doc_id: DocId) {
        self.terms[term].search.seek(doc_id);
        self.doc_ids[term] = self.terms[term].search.doc_id();
    }

    fn sort_order(&mut self) {
        let doc_ids = &self.doc_ids;
        self.order.sort_by_key(|&term| doc_ids[term]);
    }

    /// Sum of weights of all terms positioned exactly at `doc_id`.
    fn score_at(&self, doc_id: DocId) -> i64 {
        self.terms
            .iter()
            .enumerate()
            .filter(|(i, _)| self.doc_ids[*i] == doc_id)
            .map(|(_, term)| i64::from(term.weight))
            .sum()
    }

    /// Advance to the next document whose potential score beats the
    /// threshold, starting from children positioned at or past
    /// `doc_id`.
    fn strict_seek(&mut self, doc_id: DocId) {
        for term in 0..self.terms.len() {
            if self.doc_ids[term] < doc_id {
                self.seek_term(term, doc_id);
            }
        }
        loop {
            self.sort_order();
            let threshold = self.scores.threshold();
            // pivot: first prefix of doc-id-ordered terms whose summed
            // weights can beat the threshold
            let mut acc = 0i64;
            let mut pivot = None;
            for &term in &self.order {
                acc += i64::from(self.terms[term].weight);
                if acc > threshold {
                    pivot = Some(term);
                    break;
                }
            }
            let Some(pivot) = pivot else {
                self.state.set_at_end();
                return;
            };
            let pivot_doc = self.doc_ids[pivot];
            if self.state.is_past_end(pivot_doc) {
                self.state.set_at_end();
                return;
            }
            let first = self.order[0];
            if self.doc_ids[first] == pivot_doc {
                self.state.set_doc_id(pivot_doc);
                return;
            }
            // the leading term lags behind the pivot document
            self.seek_term(first, pivot_doc);
        }
    }
}

impl SearchIterator for WeakAndSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        self.scores.reset();
        for term in &mut self.terms {
            term.search.init_range(begin_id, end_id);
        }
        for term in 0..self.terms.len() {
            self.doc_ids[term] = self.terms[term].search.doc_id();
        }
        if self.strict {
            self.strict_seek(begin_id);
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        if self.strict {
            self.strict_seek(doc_id);
            return;
        }
        for term in 0..self.terms.len() {
            if self.doc_ids[term] < doc_id {
                self.seek_term(term, doc_id);
            }
        }
        if self.score_at(doc_id) > self.scores.threshold() {
            self.state.set_doc_id(doc_id);
        }
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        for term in 0..self.terms.len() {
            if self.doc_ids[term] == doc_id {
                self.terms[term].search.do_unpack(doc_id);
            }
        }
        let score = self.score_at(doc_id);
        self.scores.insert(score);
    }

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn name(&self) -> &'static str {
        "WeakAndSearch"
    }
}
