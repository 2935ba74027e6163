//! Query plan nodes.
//!
//! A blueprint is an annotated factory for search iterators: a tree of
//! plan nodes carrying the fields being searched, hit estimates, cost
//! tiers and unpack requirements. The tree is optimized as a whole
//! ([`optimize`]), bound to posting data (`fetch_postings`), frozen,
//! and finally turned into iterators (`create_search`).

use marlin_types::{DocId, FieldSpecBase, FieldSpecBaseList, SharedMatchData, Trinary};
use serde_json::{json, Value};

use crate::and_search;
use crate::empty_search::EmptySearch;
use crate::execute_info::ExecuteInfo;
use crate::full_search::FullSearch;
use crate::global_filter::GlobalFilter;
use crate::intermediate_blueprints::IntermediateBlueprint;
use crate::leaf_blueprints::EmptyBlueprint;
use crate::or_search;
use crate::and_not_search;
use crate::search_iterator::SearchIteratorBox;
use crate::unpack::UnpackInfo;

/// Source id of a blueprint that was never assigned one.
pub const INVALID_SOURCE_ID: u32 = u32::MAX;

/// Declared upper bound on the number of matching documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitEstimate {
    pub est_hits: u32,
    pub empty: bool,
}

impl HitEstimate {
    #[must_use]
    pub fn new(est_hits: u32, empty: bool) -> Self {
        Self { est_hits, empty }
    }

    /// Statically empty estimate.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            est_hits: 0,
            empty: true,
        }
    }

    /// Estimate ordering: empty sorts below everything, then by hits.
    #[must_use]
    pub fn is_less(&self, other: &Self) -> bool {
        if self.empty == other.empty {
            self.est_hits < other.est_hits
        } else {
            self.empty
        }
    }

    /// Largest of the estimates; empty entries lose.
    #[must_use]
    pub fn max(estimates: &[Self]) -> Self {
        let mut result = Self::empty();
        for est in estimates {
            if result.empty || result.est_hits < est.est_hits {
                result = *est;
            }
        }
        result
    }

    /// Smallest of the estimates; any empty entry wins.
    #[must_use]
    pub fn min(estimates: &[Self]) -> Self {
        let mut result = Self::empty();
        for (i, est) in estimates.iter().enumerate() {
            if i == 0 || est.empty || est.est_hits < result.est_hits {
                result = *est;
            }
        }
        result
    }

    /// Saturated sum: capped by the doc id limit (itself floored by the
    /// largest child estimate), empty only when all inputs are empty.
    #[must_use]
    pub fn sat_sum(estimates: &[Self], docid_limit: u32) -> Self {
        let mut sum: u64 = 0;
        let mut empty = true;
        let mut limit = docid_limit;
        for est in estimates {
            sum += u64::from(est.est_hits);
            empty = empty && est.empty;
            limit = limit.max(est.est_hits);
        }
        Self {
            est_hits: sum.min(u64::from(limit)) as u32,
            empty,
        }
    }
}

const TREE_SIZE_BITS: u32 = 20;
const TREE_SIZE_MASK: u32 = (1 << TREE_SIZE_BITS) - 1;
const COST_TIER_SHIFT: u32 = TREE_SIZE_BITS;
const FLAG_ALLOW_TERMWISE: u32 = 1 << 28;
const FLAG_WANT_GLOBAL_FILTER: u32 = 1 << 29;

/// Immutable-after-freeze plan-node summary: searched fields, hit
/// estimate, and packed `tree_size:20 | cost_tier:8 | flags:4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    fields: FieldSpecBaseList,
    estimate: HitEstimate,
    packed: u32,
}

impl State {
    pub const COST_TIER_NORMAL: u8 = 1;
    pub const COST_TIER_EXPENSIVE: u8 = 2;
    pub const COST_TIER_MAX: u8 = 255;

    #[must_use]
    pub fn new(fields: FieldSpecBaseList) -> Self {
        let mut state = Self {
            fields,
            estimate: HitEstimate::empty(),
            packed: 0,
        };
        state.set_tree_size(1);
        state.set_cost_tier(Self::COST_TIER_NORMAL);
        state.set_allow_termwise_eval(true);
        state
    }

    #[must_use]
    pub fn is_term_like(&self) -> bool {
        !self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &FieldSpecBaseList {
        &self.fields
    }

    #[must_use]
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn field(&self, idx: usize) -> FieldSpecBase {
        self.fields[idx]
    }

    #[must_use]
    pub fn lookup_field(&self, field_id: u32) -> Option<FieldSpecBase> {
        self.fields
            .iter()
            .copied()
            .find(|field| field.field_id() == field_id)
    }

    #[must_use]
    pub fn estimate(&self) -> HitEstimate {
        self.estimate
    }

    pub fn set_estimate(&mut self, estimate: HitEstimate) {
        self.estimate = estimate;
    }

    /// Fraction of the corpus this node is expected to match.
    #[must_use]
    pub fn hit_ratio(&self, docid_limit: u32) -> f64 {
        let total_hits = self.estimate.est_hits;
        let total_docs = total_hits.max(docid_limit);
        if total_docs == 0 {
            0.0
        } else {
            f64::from(total_hits) / f64::from(total_docs)
        }
    }

    #[must_use]
    pub fn tree_size(&self) -> u32 {
        self.packed & TREE_SIZE_MASK
    }

    pub fn set_tree_size(&mut self, value: u32) {
        debug_assert!(value <= TREE_SIZE_MASK, "tree size exceeds 20 bits");
        self.packed = (self.packed & !TREE_SIZE_MASK) | (value & TREE_SIZE_MASK);
    }

    #[must_use]
    pub fn cost_tier(&self) -> u8 {
        ((self.packed >> COST_TIER_SHIFT) & 0xff) as u8
    }

    pub fn set_cost_tier(&mut self, value: u8) {
        self.packed =
            (self.packed & !(0xff << COST_TIER_SHIFT)) | (u32::from(value) << COST_TIER_SHIFT);
    }

    #[must_use]
    pub fn allow_termwise_eval(&self) -> bool {
        (self.packed & FLAG_ALLOW_TERMWISE) != 0
    }

    pub fn set_allow_termwise_eval(&mut self, value: bool) {
        if value {
            self.packed |= FLAG_ALLOW_TERMWISE;
        } else {
            self.packed &= !FLAG_ALLOW_TERMWISE;
        }
    }

    #[must_use]
    pub fn want_global_filter(&self) -> bool {
        (self.packed & FLAG_WANT_GLOBAL_FILTER) != 0
    }

    pub fn set_want_global_filter(&mut self, value: bool) {
        if value {
            self.packed |= FLAG_WANT_GLOBAL_FILTER;
        } else {
            self.packed &= !FLAG_WANT_GLOBAL_FILTER;
        }
    }
}

/// Sort key for child ordering: cheaper tiers first, then by estimate.
/// `descending` selects largest-estimate-first (OR) instead of
/// smallest-first (AND).
#[must_use]
pub fn tiered_sort_key(state: &State, descending: bool) -> (u8, u64) {
    let est = state.estimate();
    let hits = if est.empty {
        // empty estimates sort as the extreme value on their side
        if descending {
            u64::from(u32::MAX) + 1
        } else {
            0
        }
    } else if descending {
        u64::from(u32::MAX) - u64::from(est.est_hits)
    } else {
        u64::from(est.est_hits) + 1
    };
    (state.cost_tier(), hits)
}

/// Intermediate operator identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    And,
    Or,
    AndNot,
    Rank,
    Near,
    ONear,
    WeakAnd,
    SourceBlender,
}

/// Whether a filter iterator must cover at least all matches (upper
/// bound) or only certain matches (lower bound).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterConstraint {
    UpperBound,
    LowerBound,
}

impl FilterConstraint {
    #[must_use]
    pub fn invert(self) -> Self {
        match self {
            Self::UpperBound => Self::LowerBound,
            Self::LowerBound => Self::UpperBound,
        }
    }
}

/// Context threaded through iterator construction, standing in for the
/// ancestor queries the plan tree cannot answer by itself.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext {
    /// Hit ratio of the plan root, gating termwise evaluation.
    pub root_hit_ratio: f64,
    /// Whether the parent operator supports termwise children (an
    /// ancestor hoist would cover this subtree too).
    pub in_termwise_capable_parent: bool,
}

/// A plan node: an iterator factory annotated with estimates, fields
/// and cost metadata.
pub trait Blueprint: std::fmt::Debug {
    /// This node's plan summary. Cheap after `freeze`; intermediates
    /// recompute from their children before that.
    fn state(&self) -> State;

    fn docid_limit(&self) -> DocId;
    fn set_docid_limit(&mut self, limit: DocId);

    fn source_id(&self) -> u32;
    fn set_source_id(&mut self, source_id: u32);

    fn hit_ratio(&self) -> f64 {
        self.state().hit_ratio(self.docid_limit())
    }

    fn as_intermediate(&self) -> Option<&IntermediateBlueprint> {
        None
    }

    fn as_intermediate_mut(&mut self) -> Option<&mut IntermediateBlueprint> {
        None
    }

    /// A node produced to replace this one during optimization, if any
    /// (e.g. the only child of a collapsed operator).
    fn get_replacement(&mut self) -> Option<Box<dyn Blueprint>> {
        None
    }

    /// Whether this node must always be unpacked regardless of what
    /// ranking needs from the scratch rows.
    fn always_needs_unpack(&self) -> bool {
        false
    }

    /// Bind to posting lists. May block on I/O; failures are reported
    /// through the request context owning the query.
    fn fetch_postings(&mut self, execute_info: &ExecuteInfo) {
        let _ = execute_info;
    }

    /// Cache plan state bottom-up. No structural mutation is allowed
    /// afterwards.
    fn freeze(&mut self) {}

    /// Push the computed global filter to the leaves that asked for it.
    fn set_global_filter(&mut self, filter: &GlobalFilter, estimated_hit_ratio: f64) {
        let _ = (filter, estimated_hit_ratio);
    }

    /// Build the iterator tree for this plan.
    fn create_search(&self, match_data: &SharedMatchData, strict: bool) -> SearchIteratorBox;

    /// Build a filter iterator honoring `constraint`.
    fn create_filter_search(
        &self,
        strict: bool,
        constraint: FilterConstraint,
    ) -> SearchIteratorBox;

    /// Class name for plan dumps.
    fn class_name(&self) -> &'static str;

    /// Node-specific additions to the plan dump.
    fn extra_plan_members(&self, out: &mut serde_json::Map<String, Value>) {
        let _ = out;
    }
}

/// Optimize a plan tree: operator-local rewrites (flattening, empty
/// pruning, source-blender hoisting), then elimination (single-child
/// and statically-empty replacement), then per-operator child sorting.
/// Children are rewritten before their parents.
#[must_use]
pub fn optimize(blueprint: Box<dyn Blueprint>) -> Box<dyn Blueprint> {
    optimize_node(blueprint, None)
}

pub(crate) fn optimize_node(
    mut blueprint: Box<dyn Blueprint>,
    parent_kind: Option<OpKind>,
) -> Box<dyn Blueprint> {
    if let Some(node) = blueprint.as_intermediate_mut() {
        node.optimize_children();
        node.optimize_self(parent_kind);
        node.sort_children();
    }
    maybe_eliminate_self(blueprint)
}

/// Apply replacement and empty-elimination to a single node, keeping
/// source id, doc id limit and exposed fields intact.
fn maybe_eliminate_self(mut blueprint: Box<dyn Blueprint>) -> Box<dyn Blueprint> {
    if let Some(mut replacement) = blueprint.get_replacement() {
        replacement.set_source_id(blueprint.source_id());
        blueprint = replacement;
    }
    if blueprint.state().estimate().empty {
        let mut empty = EmptyBlueprint::with_fields(blueprint.state().fields().clone());
        empty.set_source_id(blueprint.source_id());
        empty.set_docid_limit(blueprint.docid_limit());
        return Box::new(empty);
    }
    blueprint
}

// ---------------------------------------------------------------------------
// Filter construction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterOp {
    And,
    Or,
}

fn create_op_filter(
    op: FilterOp,
    children: &[Box<dyn Blueprint>],
    strict: bool,
    constraint: FilterConstraint,
) -> SearchIteratorBox {
    debug_assert!(!children.is_empty());
    let mut list: Vec<SearchIteratorBox> = Vec::with_capacity(children.len());
    let mut spare: Option<SearchIteratorBox> = None;
    for (i, child) in children.iter().enumerate() {
        let strict_child = strict && (op == FilterOp::Or || i == 0);
        let filter = child.create_filter_search(strict_child, constraint);
        let matches_any = filter.matches_any();
        let short_circuit = match op {
            FilterOp::And => matches_any == Trinary::False,
            FilterOp::Or => matches_any == Trinary::True,
        };
        if short_circuit {
            return filter;
        }
        let prune = match op {
            FilterOp::And => matches_any == Trinary::True && !(strict && list.is_empty()),
            FilterOp::Or => matches_any == Trinary::False,
        };
        if prune {
            spare = Some(filter);
        } else {
            list.push(filter);
        }
    }
    if list.is_empty() {
        if let Some(spare) = spare {
            return spare;
        }
        return create_default_filter(strict, constraint);
    }
    if list.len() == 1 {
        if let Some(only) = list.pop() {
            return only;
        }
    }
    match op {
        FilterOp::And => and_search::create(list, strict, UnpackInfo::new(), u32::MAX),
        FilterOp::Or => or_search::create(list, strict, UnpackInfo::new()),
    }
}

/// AND filter with tri-state short-circuit (any always-false child) and
/// pruning (always-true children, except a strict first child).
pub fn create_and_filter(
    children: &[Box<dyn Blueprint>],
    strict: bool,
    constraint: FilterConstraint,
) -> SearchIteratorBox {
    create_op_filter(FilterOp::And, children, strict, constraint)
}

/// OR filter with tri-state short-circuit (any always-true child) and
/// pruning (always-false children).
pub fn create_or_filter(
    children: &[Box<dyn Blueprint>],
    strict: bool,
    constraint: FilterConstraint,
) -> SearchIteratorBox {
    create_op_filter(FilterOp::Or, children, strict, constraint)
}

/// AND filter usable only as an upper bound (the operator may reject
/// documents its children all match, e.g. NEAR).
pub fn create_atmost_and_filter(
    children: &[Box<dyn Blueprint>],
    strict: bool,
    constraint: FilterConstraint,
) -> SearchIteratorBox {
    match constraint {
        FilterConstraint::UpperBound => create_and_filter(children, strict, constraint),
        FilterConstraint::LowerBound => Box::new(EmptySearch::new()),
    }
}

/// OR filter usable only as an upper bound (e.g. WEAK-AND, which drops
/// low-scoring union members).
pub fn create_atmost_or_filter(
    children: &[Box<dyn Blueprint>],
    strict: bool,
    constraint: FilterConstraint,
) -> SearchIteratorBox {
    match constraint {
        FilterConstraint::UpperBound => create_or_filter(children, strict, constraint),
        FilterConstraint::LowerBound => Box::new(EmptySearch::new()),
    }
}

/// AND-NOT filter: negatives get the inverted constraint; an
/// always-true negative empties the result, always-false negatives are
/// dropped.
pub fn create_andnot_filter(
    children: &[Box<dyn Blueprint>],
    strict: bool,
    constraint: FilterConstraint,
) -> SearchIteratorBox {
    debug_assert!(!children.is_empty());
    let positive = children[0].create_filter_search(strict, constraint);
    if positive.matches_any() == Trinary::False {
        return positive;
    }
    let mut list = vec![positive];
    for child in &children[1..] {
        let filter = child.create_filter_search(false, constraint.invert());
        match filter.matches_any() {
            Trinary::True => return Box::new(EmptySearch::new()),
            Trinary::Undefined => list.push(filter),
            Trinary::False => {}
        }
    }
    if list.len() == 1 {
        if let Some(only) = list.pop() {
            return only;
        }
    }
    and_not_search::create(list, strict)
}

/// Filter delegating to the first child only (RANK).
pub fn create_first_child_filter(
    children: &[Box<dyn Blueprint>],
    strict: bool,
    constraint: FilterConstraint,
) -> SearchIteratorBox {
    debug_assert!(!children.is_empty());
    children[0].create_filter_search(strict, constraint)
}

/// Filter for nodes without a usable filter form: everything for an
/// upper bound, nothing for a lower bound.
pub fn create_default_filter(strict: bool, constraint: FilterConstraint) -> SearchIteratorBox {
    let _ = strict;
    match constraint {
        FilterConstraint::UpperBound => Box::new(FullSearch::new()),
        FilterConstraint::LowerBound => Box::new(EmptySearch::new()),
    }
}

// ---------------------------------------------------------------------------
// Plan dumps
// ---------------------------------------------------------------------------

/// Structured dump of a plan subtree.
#[must_use]
pub fn plan_value(blueprint: &dyn Blueprint) -> Value {
    let state = blueprint.state();
    let mut out = serde_json::Map::new();
    out.insert("class".into(), json!(blueprint.class_name()));
    out.insert("is_term_like".into(), json!(state.is_term_like()));
    if state.is_term_like() {
        let fields: Vec<Value> = state
            .fields()
            .iter()
            .map(|field: &FieldSpecBase| {
                json!({
                    "field_id": field.field_id(),
                    "handle": field.handle(),
                    "is_filter": field.is_filter(),
                })
            })
            .collect();
        out.insert("fields".into(), Value::Array(fields));
    }
    out.insert(
        "estimate".into(),
        json!({
            "empty": state.estimate().empty,
            "est_hits": state.estimate().est_hits,
            "cost_tier": state.cost_tier(),
            "tree_size": state.tree_size(),
            "allow_termwise_eval": state.allow_termwise_eval(),
        }),
    );
    out.insert("source_id".into(), json!(blueprint.source_id()));
    out.insert("docid_limit".into(), json!(blueprint.docid_limit()));
    blueprint.extra_plan_members(&mut out);
    if let Some(node) = blueprint.as_intermediate() {
        let children: Vec<Value> = (0..node.child_count())
            .map(|i| plan_value(node.child(i)))
            .collect();
        out.insert("children".into(), Value::Array(children));
    }
    Value::Object(out)
}

/// Human-readable plan dump.
#[must_use]
pub fn plan_string(blueprint: &dyn Blueprint) -> String {
    serde_json::to_string_pretty(&plan_value(blueprint))
        .unwrap_or_else(|_| String::from("<unprintable plan>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn estimate_combiners() {
        let a = HitEstimate::new(10, false);
        let b = HitEstimate::new(5, false);
        let e = HitEstimate::empty();
        assert_eq!(HitEstimate::min(&[a, b]).est_hits, 5);
        assert!(HitEstimate::min(&[a, e]).empty);
        assert_eq!(HitEstimate::max(&[a, b, e]).est_hits, 10);
        let sum = HitEstimate::sat_sum(&[a, b], 100);
        assert_eq!(sum.est_hits, 15);
        assert!(!sum.empty);
        // saturation at the docid limit
        let sum = HitEstimate::sat_sum(&[HitEstimate::new(80, false), a], 64);
        assert_eq!(sum.est_hits, 80.max(64));
        // all empty stays empty
        assert!(HitEstimate::sat_sum(&[e, e], 100).empty);
    }

    #[test]
    fn estimate_ordering_prefers_empty() {
        let empty = HitEstimate::empty();
        let tiny = HitEstimate::new(0, false);
        assert!(empty.is_less(&tiny));
        assert!(!tiny.is_less(&empty));
    }

    #[test]
    fn state_packs_fields() {
        let mut state = State::new(smallvec![FieldSpecBase::new(1, 0, false)]);
        assert!(state.is_term_like());
        assert_eq!(state.tree_size(), 1);
        assert_eq!(state.cost_tier(), State::COST_TIER_NORMAL);
        assert!(state.allow_termwise_eval());
        assert!(!state.want_global_filter());

        state.set_tree_size(12345);
        state.set_cost_tier(State::COST_TIER_EXPENSIVE);
        state.set_allow_termwise_eval(false);
        state.set_want_global_filter(true);
        assert_eq!(state.tree_size(), 12345);
        assert_eq!(state.cost_tier(), State::COST_TIER_EXPENSIVE);
        assert!(!state.allow_termwise_eval());
        assert!(state.want_global_filter());
    }

    #[test]
    fn hit_ratio_uses_docid_limit() {
        let mut state = State::new(FieldSpecBaseList::new());
        state.set_estimate(HitEstimate::new(25, false));
        assert_eq!(state.hit_ratio(100), 0.25);
        // estimate above the limit saturates at 1.0
        state.set_estimate(HitEstimate::new(200, false));
        assert_eq!(state.hit_ratio(100), 1.0);
        assert_eq!(State::new(FieldSpecBaseList::new()).hit_ratio(0), 0.0);
    }

    #[test]
    fn tiered_sort_keys_order_as_specified() {
        let mut cheap_small = State::new(FieldSpecBaseList::new());
        cheap_small.set_estimate(HitEstimate::new(10, false));
        let mut cheap_big = State::new(FieldSpecBaseList::new());
        cheap_big.set_estimate(HitEstimate::new(1000, false));
        let mut expensive_small = State::new(FieldSpecBaseList::new());
        expensive_small.set_estimate(HitEstimate::new(10, false));
        expensive_small.set_cost_tier(State::COST_TIER_EXPENSIVE);

        // ascending: small before big, expensive always last
        assert!(tiered_sort_key(&cheap_small, false) < tiered_sort_key(&cheap_big, false));
        assert!(tiered_sort_key(&cheap_big, false) < tiered_sort_key(&expensive_small, false));
        // descending: big before small, expensive still last
        assert!(tiered_sort_key(&cheap_big, true) < tiered_sort_key(&cheap_small, true));
        assert!(tiered_sort_key(&cheap_small, true) < tiered_sort_key(&expensive_small, true));
    }
}
