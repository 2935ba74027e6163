//! Plan node for the sparse dot product.
//!
//! A complex leaf: it looks like a single term to the surrounding plan
//! (one field, one scratch row), while internally owning weighted term
//! blueprints whose match data lives in a private layout.

use marlin_types::{DocId, FieldSpec, MatchDataLayout, SharedMatchData};
use serde_json::{json, Value};
use smallvec::smallvec;

use crate::blueprint::{
    create_or_filter, Blueprint, FilterConstraint, HitEstimate, State,
};
use crate::dot_product_search;
use crate::empty_search::EmptySearch;
use crate::execute_info::ExecuteInfo;
use crate::leaf_blueprints::LeafCore;
use crate::search_iterator::SearchIteratorBox;

#[derive(Debug)]
pub struct DotProductBlueprint {
    core: LeafCore,
    layout: MatchDataLayout,
    estimate: HitEstimate,
    weights: Vec<i32>,
    terms: Vec<Box<dyn Blueprint>>,
    field: FieldSpec,
}

impl DotProductBlueprint {
    #[must_use]
    pub fn new(field: FieldSpec) -> Self {
        let mut state = State::new(smallvec![field.base()]);
        state.set_allow_termwise_eval(false);
        Self {
            core: LeafCore::new(state),
            layout: MatchDataLayout::new(),
            estimate: HitEstimate::empty(),
            weights: Vec::new(),
            terms: Vec::new(),
            field,
        }
    }

    /// Field spec handed to each child term; every child gets its own
    /// row in the private layout.
    pub fn next_child_field(&mut self) -> FieldSpec {
        FieldSpec::new(
            self.field.name(),
            self.field.field_id(),
            self.layout.alloc_term_field(self.field.field_id()),
            false,
        )
    }

    pub fn reserve(&mut self, num_children: usize) {
        self.weights.reserve(num_children);
        self.terms.reserve(num_children);
    }

    /// Add a weighted term; the estimate is the saturated sum of the
    /// non-empty child estimates.
    pub fn add_term(&mut self, term: Box<dyn Blueprint>, weight: i32) -> &mut Self {
        let child_est = term.state().estimate();
        if !child_est.empty {
            if self.estimate.empty {
                self.estimate = child_est;
            } else {
                self.estimate.est_hits = self.estimate.est_hits.saturating_add(child_est.est_hits);
            }
            self.core.state.set_estimate(self.estimate);
        }
        self.weights.push(weight);
        self.terms.push(term);
        self
    }
}

impl Blueprint for DotProductBlueprint {
    fn state(&self) -> State {
        self.core.state.clone()
    }

    fn docid_limit(&self) -> DocId {
        self.core.docid_limit
    }

    fn set_docid_limit(&mut self, limit: DocId) {
        self.core.docid_limit = limit;
        for term in &mut self.terms {
            term.set_docid_limit(limit);
        }
    }

    fn source_id(&self) -> u32 {
        self.core.source_id
    }

    fn set_source_id(&mut self, source_id: u32) {
        self.core.source_id = source_id;
    }

    fn fetch_postings(&mut self, execute_info: &ExecuteInfo) {
        let child_info = execute_info.for_child(true, execute_info.hit_rate());
        for term in &mut self.terms {
            term.fetch_postings(&child_info);
        }
    }

    fn freeze(&mut self) {
        for term in &mut self.terms {
            term.freeze();
        }
    }

    fn create_search(&self, match_data: &SharedMatchData, _strict: bool) -> SearchIteratorBox {
        if self.terms.is_empty() {
            return Box::new(EmptySearch::new());
        }
        let handle = self.core.state.field(0).handle();
        let child_match_data = self.layout.create_shared_match_data();
        let mut children = Vec::with_capacity(self.terms.len());
        let mut child_handles = Vec::with_capacity(self.terms.len());
        for term in &self.terms {
            let term_state = term.state();
            debug_assert_eq!(term_state.num_fields(), 1);
            child_handles.push(term_state.field(0).handle());
            children.push(term.create_search(&child_match_data, true));
        }
        dot_product_search::create(
            children,
            (match_data.clone(), handle),
            child_handles,
            self.weights.clone(),
            child_match_data,
        )
    }

    fn create_filter_search(
        &self,
        strict: bool,
        constraint: FilterConstraint,
    ) -> SearchIteratorBox {
        create_or_filter(&self.terms, strict, constraint)
    }

    fn class_name(&self) -> &'static str {
        "DotProductBlueprint"
    }

    fn extra_plan_members(&self, out: &mut serde_json::Map<String, Value>) {
        out.insert("field".into(), json!(self.field.name()));
        out.insert("weights".into(), json!(self.weights));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBlueprint, FakeResult};
    use crate::search_iterator::SearchIterator;
    use marlin_types::MatchDataLayout as OuterLayout;

    fn weighted_term(bp: &mut DotProductBlueprint, docs: &[(DocId, i32)], weight: i32) {
        let field = bp.next_child_field();
        let mut result = FakeResult::new();
        for &(doc, element_weight) in docs {
            result = result.doc(doc).elem(0).weight(element_weight).pos(0);
        }
        bp.add_term(Box::new(FakeBlueprint::new(field, result)), weight);
    }

    #[test]
    fn accumulates_estimates() {
        let mut bp = DotProductBlueprint::new(FieldSpec::new("tags", 2, 0, false));
        weighted_term(&mut bp, &[(1, 1), (2, 1)], 10);
        weighted_term(&mut bp, &[(2, 1)], 20);
        assert_eq!(bp.state().estimate().est_hits, 3);
        assert!(!bp.state().allow_termwise_eval());
    }

    #[test]
    fn end_to_end_scoring() {
        let mut outer = OuterLayout::new();
        let handle = outer.alloc_term_field(2);
        let md = outer.create_shared_match_data();

        let mut bp = DotProductBlueprint::new(FieldSpec::new("tags", 2, handle, false));
        weighted_term(&mut bp, &[(3, 2)], 10);
        weighted_term(&mut bp, &[(3, 5), (8, 1)], 100);

        let mut it = bp.create_search(&md, true);
        it.init_range(1, 100);
        assert!(it.seek(3));
        it.unpack(3);
        assert_eq!(md.borrow().term_field(handle).raw_score(), 20.0 + 500.0);
        assert!(it.seek(8));
        it.unpack(8);
        assert_eq!(md.borrow().term_field(handle).raw_score(), 100.0);
    }
}
