//! The factory boundary between the kernel and index components.
//!
//! Components exposing searchable content (memory index, disk index,
//! attributes) implement [`Searchable`]: given a request context, a
//! field and a leaf query node, produce the blueprint that will search
//! it. Searching multiple fields defaults to an OR over the per-field
//! blueprints.

use std::cell::RefCell;

use marlin_error::EvalError;
use marlin_query::Node;
use marlin_types::{Doom, FieldSpec, FieldSpecList};

use crate::blueprint::Blueprint;
use crate::intermediate_blueprints::IntermediateBlueprint;
use crate::leaf_blueprints::EmptyBlueprint;

/// Per-query context handed to blueprint factories: the soft deadline
/// plus a failure slot where posting-fetch errors are parked (the
/// evaluation APIs themselves never fail).
#[derive(Debug, Default)]
pub struct RequestContext {
    doom: Doom,
    failure: RefCell<Option<EvalError>>,
}

impl RequestContext {
    #[must_use]
    pub fn new(doom: Doom) -> Self {
        Self {
            doom,
            failure: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn doom(&self) -> Doom {
        self.doom
    }

    /// Park a failure; the first one wins.
    pub fn report_failure(&self, error: EvalError) {
        let mut slot = self.failure.borrow_mut();
        if slot.is_none() {
            *slot = Some(error);
        }
    }

    #[must_use]
    pub fn has_failure(&self) -> bool {
        self.failure.borrow().is_some()
    }

    pub fn take_failure(&self) -> Option<EvalError> {
        self.failure.borrow_mut().take()
    }
}

/// A component whose content can be searched by query terms.
pub trait Searchable {
    /// Create a blueprint searching a single field.
    fn create_blueprint_for_field(
        &self,
        ctx: &RequestContext,
        field: &FieldSpec,
        node: &Node,
    ) -> Box<dyn Blueprint>;

    /// Create a blueprint searching a set of fields. The default wraps
    /// the per-field blueprints in an OR.
    fn create_blueprint(
        &self,
        ctx: &RequestContext,
        fields: &FieldSpecList,
        node: &Node,
    ) -> Box<dyn Blueprint> {
        if fields.is_empty() {
            return Box::new(EmptyBlueprint::new());
        }
        if fields.len() == 1 {
            return self.create_blueprint_for_field(ctx, fields.get(0), node);
        }
        let mut or = IntermediateBlueprint::or();
        for field in fields {
            or.add_child(self.create_blueprint_for_field(ctx, field, node));
        }
        Box::new(or)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeResult, FakeSearchable};

    #[test]
    fn multi_field_default_wraps_in_or() {
        let mut searchable = FakeSearchable::new();
        searchable.add_result("title", "a", FakeResult::new().doc(1).elem(0).pos(0));
        searchable.add_result("body", "a", FakeResult::new().doc(2).elem(0).pos(0));
        let ctx = RequestContext::default();
        let mut fields = FieldSpecList::new();
        fields.add(FieldSpec::new("title", 1, 0, false));
        fields.add(FieldSpec::new("body", 2, 1, false));
        let bp = searchable.create_blueprint(&ctx, &fields, &Node::term("a"));
        assert_eq!(bp.class_name(), "OrBlueprint");
        assert_eq!(bp.state().estimate().est_hits, 2);
    }

    #[test]
    fn empty_field_list_degrades_to_empty_blueprint() {
        let searchable = FakeSearchable::new();
        let ctx = RequestContext::default();
        let bp = searchable.create_blueprint(&ctx, &FieldSpecList::new(), &Node::term("a"));
        assert_eq!(bp.class_name(), "EmptyBlueprint");
    }

    #[test]
    fn failure_slot_keeps_first_error() {
        let ctx = RequestContext::default();
        assert!(!ctx.has_failure());
        ctx.report_failure(EvalError::ResourceExhausted("posting store down".into()));
        ctx.report_failure(EvalError::InvalidPlan("late".into()));
        match ctx.take_failure() {
            Some(EvalError::ResourceExhausted(msg)) => {
                assert_eq!(msg, "posting store down");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }
}
