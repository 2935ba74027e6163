//! Posting-list fixtures with full occurrence data.
//!
//! A [`FakeResult`] describes per-document elements (id, weight,
//! length) and term positions, built with a chaining API:
//!
//! ```
//! use marlin_queryeval::fake::FakeResult;
//!
//! let result = FakeResult::new()
//!     .doc(7).elem(0).weight(100).len(20).pos(3).pos(9)
//!     .doc(9).elem(1).pos(0);
//! assert_eq!(result.doc_count(), 2);
//! ```
//!
//! [`FakeSearchable`] maps (field, term) pairs to results and hands out
//! [`FakeBlueprint`]s, giving tests a complete Searchable to plan
//! against.

use hashbrown::HashMap;
use marlin_types::{DocId, FieldSpec, Position, SharedMatchData, TermFieldHandle, Trinary};
use serde_json::{json, Value};
use smallvec::smallvec;

use crate::blueprint::{
    create_default_filter, Blueprint, FilterConstraint, HitEstimate, State,
};
use crate::leaf_blueprints::LeafCore;
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};
use crate::searchable::{RequestContext, Searchable};

/// One element (array entry / struct field occurrence) of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeElement {
    pub id: u32,
    pub weight: i32,
    pub length: u32,
    pub positions: Vec<u32>,
}

/// One matching document with its elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeDoc {
    pub doc_id: DocId,
    pub elements: Vec<FakeElement>,
}

/// Builder-style posting fixture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeResult {
    docs: Vec<FakeDoc>,
}

impl FakeResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new document entry.
    #[must_use]
    pub fn doc(mut self, doc_id: DocId) -> Self {
        debug_assert!(self.docs.last().is_none_or(|d| d.doc_id < doc_id));
        self.docs.push(FakeDoc {
            doc_id,
            elements: Vec::new(),
        });
        self
    }

    /// Start a new element in the current document.
    #[must_use]
    pub fn elem(mut self, id: u32) -> Self {
        if let Some(doc) = self.docs.last_mut() {
            doc.elements.push(FakeElement {
                id,
                weight: 1,
                length: 1,
                positions: Vec::new(),
            });
        }
        self
    }

    /// Set the weight of the current element.
    #[must_use]
    pub fn weight(mut self, weight: i32) -> Self {
        if let Some(element) = self.last_element() {
            element.weight = weight;
        }
        self
    }

    /// Set the length of the current element.
    #[must_use]
    pub fn len(mut self, length: u32) -> Self {
        if let Some(element) = self.last_element() {
            element.length = length;
        }
        self
    }

    /// Add a term occurrence to the current element.
    #[must_use]
    pub fn pos(mut self, position: u32) -> Self {
        if let Some(element) = self.last_element() {
            element.positions.push(position);
        }
        self
    }

    fn last_element(&mut self) -> Option<&mut FakeElement> {
        self.docs.last_mut().and_then(|doc| doc.elements.last_mut())
    }

    #[must_use]
    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    #[must_use]
    pub fn docs(&self) -> &[FakeDoc] {
        &self.docs
    }
}

/// Term iterator over a fake result, unpacking full occurrence data.
#[derive(Debug)]
pub struct FakeSearch {
    state: IteratorState,
    result: FakeResult,
    index: usize,
    strict: bool,
    match_target: Option<(SharedMatchData, TermFieldHandle)>,
}

impl FakeSearch {
    #[must_use]
    pub fn new(
        result: FakeResult,
        match_target: Option<(SharedMatchData, TermFieldHandle)>,
        strict: bool,
    ) -> Self {
        Self {
            state: IteratorState::default(),
            result,
            index: 0,
            strict,
            match_target,
        }
    }
}

impl SearchIterator for FakeSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        self.index = 0;
        if self.strict {
            self.do_seek(begin_id);
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        while self.index < self.result.docs().len()
            && self.result.docs()[self.index].doc_id < doc_id
        {
            self.index += 1;
        }
        match self.result.docs().get(self.index) {
            Some(doc) if !self.state.is_past_end(doc.doc_id) => {
                if self.strict || doc.doc_id == doc_id {
                    self.state.set_doc_id(doc.doc_id);
                }
            }
            _ => {
                if self.strict {
                    self.state.set_at_end();
                }
            }
        }
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        let Some((md, handle)) = &self.match_target else {
            return;
        };
        let Some(doc) = self.result.docs().get(self.index) else {
            return;
        };
        if doc.doc_id != doc_id {
            return;
        }
        let mut md = md.borrow_mut();
        let row = md.term_field_mut(*handle);
        row.reset(doc_id);
        for element in &doc.elements {
            for &position in &element.positions {
                row.append_position(Position::new(
                    position,
                    element.id,
                    element.weight,
                    element.length,
                ));
            }
        }
    }

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn name(&self) -> &'static str {
        "FakeSearch"
    }
}

/// Term-level plan over a fake result.
#[derive(Debug)]
pub struct FakeBlueprint {
    core: LeafCore,
    field: FieldSpec,
    term: String,
    tag: String,
    result: FakeResult,
}

impl FakeBlueprint {
    #[must_use]
    pub fn new(field: FieldSpec, result: FakeResult) -> Self {
        let mut state = State::new(smallvec![field.base()]);
        state.set_estimate(HitEstimate::new(
            result.doc_count() as u32,
            result.is_empty(),
        ));
        Self {
            core: LeafCore::new(state),
            field,
            term: String::new(),
            tag: String::new(),
            result,
        }
    }

    #[must_use]
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    #[must_use]
    pub fn field(&self) -> &FieldSpec {
        &self.field
    }
}

impl Blueprint for FakeBlueprint {
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

    fn create_search(&self, match_data: &SharedMatchData, strict: bool) -> SearchIteratorBox {
        let target = Some((match_data.clone(), self.field.handle()));
        Box::new(FakeSearch::new(self.result.clone(), target, strict))
    }

    fn create_filter_search(
        &self,
        strict: bool,
        constraint: FilterConstraint,
    ) -> SearchIteratorBox {
        create_default_filter(strict, constraint)
    }

    fn class_name(&self) -> &'static str {
        "FakeBlueprint"
    }

    fn extra_plan_members(&self, out: &mut serde_json::Map<String, Value>) {
        if !self.term.is_empty() {
            out.insert("term".into(), json!(self.term));
        }
        if !self.tag.is_empty() {
            out.insert("tag".into(), json!(self.tag));
        }
    }
}

/// A Searchable backed by explicit (field, term) → result fixtures.
#[derive(Debug, Default)]
pub struct FakeSearchable {
    tag: String,
    map: HashMap<(String, String), FakeResult>,
}

impl FakeSearchable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag stamped onto all blueprints this searchable creates.
    #[must_use]
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Register the result for a (field, term) pair.
    pub fn add_result(
        &mut self,
        field: impl Into<String>,
        term: impl Into<String>,
        result: FakeResult,
    ) -> &mut Self {
        self.map.insert((field.into(), term.into()), result);
        self
    }
}

/// The term string a leaf query node searches for, if it has one.
fn leaf_term(node: &marlin_query::Node) -> Option<&str> {
    use marlin_query::Node;
    match node {
        Node::Term(term) | Node::Prefix(term) | Node::Regexp(term) => Some(&term.term),
        Node::Fuzzy { term, .. } => Some(&term.term),
        _ => None,
    }
}

impl Searchable for FakeSearchable {
    fn create_blueprint_for_field(
        &self,
        _ctx: &RequestContext,
        field: &FieldSpec,
        node: &marlin_query::Node,
    ) -> Box<dyn Blueprint> {
        let result = leaf_term(node)
            .and_then(|term| self.map.get(&(field.name().to_string(), term.to_string())))
            .cloned()
            .unwrap_or_default();
        let mut blueprint = FakeBlueprint::new(field.clone(), result);
        if let Some(term) = leaf_term(node) {
            blueprint = blueprint.with_term(term);
        }
        if !self.tag.is_empty() {
            blueprint = blueprint.tagged(self.tag.clone());
        }
        Box::new(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marlin_types::MatchDataLayout;

    #[test]
    fn fake_search_unpacks_positions() {
        let result = FakeResult::new()
            .doc(5)
            .elem(0)
            .weight(42)
            .len(10)
            .pos(1)
            .pos(3)
            .doc(9)
            .elem(2)
            .pos(0);
        let mut layout = MatchDataLayout::new();
        let handle = layout.alloc_term_field(1);
        let md = layout.create_shared_match_data();
        let mut it = FakeSearch::new(result, Some((md.clone(), handle)), true);
        it.init_range(1, 100);
        assert_eq!(it.doc_id(), 5);
        assert!(it.seek(5));
        it.unpack(5);
        {
            let md = md.borrow();
            let row = md.term_field(handle);
            assert_eq!(row.positions().len(), 2);
            assert_eq!(row.positions()[0].position(), 1);
            assert_eq!(row.positions()[0].element_weight(), 42);
            assert_eq!(row.weight(), 42);
        }
        assert!(it.seek(9));
        it.unpack(9);
        assert_eq!(md.borrow().term_field(handle).positions()[0].element_id(), 2);
    }

    #[test]
    fn fake_searchable_resolves_terms() {
        let mut searchable = FakeSearchable::new();
        searchable.add_result("title", "fox", FakeResult::new().doc(3).elem(0).pos(0));
        let ctx = RequestContext::default();
        let field = FieldSpec::new("title", 1, 0, false);
        let hit = searchable.create_blueprint_for_field(
            &ctx,
            &field,
            &marlin_query::Node::term("fox"),
        );
        assert_eq!(hit.state().estimate().est_hits, 1);
        let miss = searchable.create_blueprint_for_field(
            &ctx,
            &field,
            &marlin_query::Node::term("unicorn"),
        );
        assert!(miss.state().estimate().empty);
    }
}
