//! Plan node for the weighted-set term.
//!
//! Like the dot product, a complex leaf over weighted term children,
//! but delivering per-matching-child element weights instead of a
//! combined score. All children share one scratch row in the private
//! layout; the weights reported to ranking are the set weights, not the
//! children's own.

use marlin_types::{DocId, FieldSpec, MatchDataLayout, SharedMatchData};
use serde_json::{json, Value};
use smallvec::smallvec;

use crate::blueprint::{
    create_or_filter, Blueprint, FilterConstraint, HitEstimate, State,
};
use crate::empty_search::EmptySearch;
use crate::execute_info::ExecuteInfo;
use crate::leaf_blueprints::LeafCore;
use crate::search_iterator::SearchIteratorBox;
use crate::weighted_set_term_search;

#[derive(Debug)]
pub struct WeightedSetTermBlueprint {
    core: LeafCore,
    layout: MatchDataLayout,
    estimate: HitEstimate,
    children_field: FieldSpec,
    weights: Vec<i32>,
    terms: Vec<Box<dyn Blueprint>>,
}

impl WeightedSetTermBlueprint {
    #[must_use]
    pub fn new(field: FieldSpec) -> Self {
        let mut layout = MatchDataLayout::new();
        let children_field = FieldSpec::new(
            field.name(),
            field.field_id(),
            layout.alloc_term_field(field.field_id()),
            field.is_filter(),
        );
        let state = State::new(smallvec![field.base()]);
        Self {
            core: LeafCore::new(state),
            layout,
            estimate: HitEstimate::empty(),
            children_field,
            weights: Vec::new(),
            terms: Vec::new(),
        }
    }

    /// Field spec for child terms; all children share the same row.
    #[must_use]
    pub fn next_child_field(&self) -> FieldSpec {
        self.children_field.clone()
    }

    #[must_use]
    pub fn field_name(&self) -> &str {
        self.children_field.name()
    }

    #[must_use]
    pub fn terms(&self) -> &[Box<dyn Blueprint>] {
        &self.terms
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

impl Blueprint for WeightedSetTermBlueprint {
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
        let children: Vec<SearchIteratorBox> = self
            .terms
            .iter()
            .map(|term| term.create_search(&child_match_data, true))
            .collect();
        weighted_set_term_search::create(
            children,
            (match_data.clone(), handle),
            self.children_field.is_filter(),
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
        "WeightedSetTermBlueprint"
    }

    fn extra_plan_members(&self, out: &mut serde_json::Map<String, Value>) {
        out.insert("field".into(), json!(self.children_field.name()));
        out.insert("weights".into(), json!(self.weights));
    }
}
