//! Basic leaf plan nodes.
//!
//! `EmptyBlueprint` is the degenerate plan everything impossible
//! collapses to; `AlwaysTrueBlueprint` is its dual; `SimpleBlueprint`
//! wraps a [`SimpleResult`] fixture for tests and tooling.

use marlin_types::{DocId, FieldSpecBase, FieldSpecBaseList, SharedMatchData};
use serde_json::{json, Value};

use crate::blueprint::{Blueprint, FilterConstraint, HitEstimate, State, INVALID_SOURCE_ID};
use crate::empty_search::EmptySearch;
use crate::full_search::FullSearch;
use crate::search_iterator::SearchIteratorBox;
use crate::simple_result::{self, SimpleResult};

/// Plan-node bookkeeping shared by all leaves.
#[derive(Debug, Clone)]
pub(crate) struct LeafCore {
    pub(crate) state: State,
    pub(crate) docid_limit: DocId,
    pub(crate) source_id: u32,
}

impl LeafCore {
    pub(crate) fn new(state: State) -> Self {
        Self {
            state,
            docid_limit: 0,
            source_id: INVALID_SOURCE_ID,
        }
    }
}

/// The plan that matches nothing, carrying the field list of whatever
/// it replaced so handle resolution upstream keeps working.
#[derive(Debug)]
pub struct EmptyBlueprint {
    core: LeafCore,
}

impl Default for EmptyBlueprint {
    fn default() -> Self {
        Self::new()
    }
}

impl EmptyBlueprint {
    #[must_use]
    pub fn new() -> Self {
        Self::with_fields(FieldSpecBaseList::new())
    }

    #[must_use]
    pub fn with_fields(fields: FieldSpecBaseList) -> Self {
        Self {
            core: LeafCore::new(State::new(fields)),
        }
    }

    #[must_use]
    pub fn with_field(field: FieldSpecBase) -> Self {
        let mut fields = FieldSpecBaseList::new();
        fields.push(field);
        Self::with_fields(fields)
    }
}

impl Blueprint for EmptyBlueprint {
    fn state(&self) -> State {
        self.core.state.clone()
    }

    fn docid_limit(&self) -> DocId {
        self.core.docid_limit
    }

    fn set_docid_limit(&mut self, limit: DocId) {
        self.core.docid_limit = limit;
    }

    fn source_id(&self) -> u32 {
        self.core.source_id
    }

    fn set_source_id(&mut self, source_id: u32) {
        self.core.source_id = source_id;
    }

    fn create_search(&self, _match_data: &SharedMatchData, _strict: bool) -> SearchIteratorBox {
        Box::new(EmptySearch::new())
    }

    fn create_filter_search(
        &self,
        _strict: bool,
        _constraint: FilterConstraint,
    ) -> SearchIteratorBox {
        Box::new(EmptySearch::new())
    }

    fn class_name(&self) -> &'static str {
        "EmptyBlueprint"
    }
}

/// The plan that matches every document.
#[derive(Debug)]
pub struct AlwaysTrueBlueprint {
    core: LeafCore,
}

impl Default for AlwaysTrueBlueprint {
    fn default() -> Self {
        Self::new()
    }
}

impl AlwaysTrueBlueprint {
    #[must_use]
    pub fn new() -> Self {
        let mut state = State::new(FieldSpecBaseList::new());
        state.set_estimate(HitEstimate::new(marlin_types::END_DOC_ID, false));
        Self {
            core: LeafCore::new(state),
        }
    }
}

impl Blueprint for AlwaysTrueBlueprint {
    fn state(&self) -> State {
        self.core.state.clone()
    }

    fn docid_limit(&self) -> DocId {
        self.core.docid_limit
    }

    fn set_docid_limit(&mut self, limit: DocId) {
        self.core.docid_limit = limit;
    }

    fn source_id(&self) -> u32 {
        self.core.source_id
    }

    fn set_source_id(&mut self, source_id: u32) {
        self.core.source_id = source_id;
    }

    fn create_search(&self, _match_data: &SharedMatchData, _strict: bool) -> SearchIteratorBox {
        Box::new(FullSearch::new())
    }

    fn create_filter_search(
        &self,
        _strict: bool,
        _constraint: FilterConstraint,
    ) -> SearchIteratorBox {
        Box::new(FullSearch::new())
    }

    fn class_name(&self) -> &'static str {
        "AlwaysTrueBlueprint"
    }
}

/// Leaf plan over a fixed hit list.
#[derive(Debug)]
pub struct SimpleBlueprint {
    core: LeafCore,
    result: SimpleResult,
    tag: String,
}

impl SimpleBlueprint {
    #[must_use]
    pub fn new(result: SimpleResult) -> Self {
        let mut state = State::new(FieldSpecBaseList::new());
        state.set_estimate(HitEstimate::new(
            result.hit_count() as u32,
            result.is_empty(),
        ));
        Self {
            core: LeafCore::new(state),
            result,
            tag: String::new(),
        }
    }

    /// Tag shown in plan dumps, for picking nodes apart in tests.
    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl Blueprint for SimpleBlueprint {
    fn state(&self) -> State {
        self.core.state.clone()
    }

    fn docid_limit(&self) -> DocId {
        self.core.docid_limit
    }

    fn set_docid_limit(&mut self, limit: DocId) {
        self.core.docid_limit = limit;
    }

    fn source_id(&self) -> u32 {
        self.core.source_id
    }

    fn set_source_id(&mut self, source_id: u32) {
        self.core.source_id = source_id;
    }

    fn create_search(&self, _match_data: &SharedMatchData, strict: bool) -> SearchIteratorBox {
        simple_result::create_search(self.result.clone(), strict)
    }

    fn create_filter_search(
        &self,
        strict: bool,
        _constraint: FilterConstraint,
    ) -> SearchIteratorBox {
        simple_result::create_search(self.result.clone(), strict)
    }

    fn class_name(&self) -> &'static str {
        "SimpleBlueprint"
    }

    fn extra_plan_members(&self, out: &mut serde_json::Map<String, Value>) {
        if !self.tag.is_empty() {
            out.insert("tag".into(), json!(self.tag));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search_iterator::SearchIterator;
    use marlin_types::MatchDataLayout;

    #[test]
    fn empty_blueprint_keeps_fields() {
        let bp = EmptyBlueprint::with_field(FieldSpecBase::new(3, 1, false));
        assert!(bp.state().estimate().empty);
        assert!(bp.state().is_term_like());
        assert_eq!(bp.state().field(0).field_id(), 3);
    }

    #[test]
    fn always_true_estimates_everything() {
        let bp = AlwaysTrueBlueprint::new();
        assert!(!bp.state().estimate().empty);
        let md = MatchDataLayout::new().create_shared_match_data();
        let mut it = bp.create_search(&md, true);
        it.init_range(1, 5);
        assert!(it.seek(4));
    }

    #[test]
    fn simple_blueprint_estimates_hit_count() {
        let bp = SimpleBlueprint::new(SimpleResult::from_hits(vec![2, 4])).tagged("probe");
        assert_eq!(bp.state().estimate().est_hits, 2);
        assert!(!bp.state().estimate().empty);
        assert_eq!(bp.tag(), "probe");

        let empty = SimpleBlueprint::new(SimpleResult::new());
        assert!(empty.state().estimate().empty);
    }
}
