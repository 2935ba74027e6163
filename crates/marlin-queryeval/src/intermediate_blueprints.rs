//! Intermediate plan operators.
//!
//! One node type covers all intermediate operators; the operator enum
//! payload carries the per-operator data (window sizes, wand weights,
//! the blender's selector). Each operator row of the design table —
//! estimate combine, exposed fields, sort order, strictness
//! inheritance, termwise support — is a match arm here.

use hashbrown::HashMap;
use marlin_types::{DocId, FieldSpecBaseList, SharedMatchData};
use serde_json::{json, Value};
use tracing::debug;

use crate::and_not_search;
use crate::and_search;
use crate::blueprint::{
    create_and_filter, create_andnot_filter, create_atmost_and_filter, create_atmost_or_filter,
    create_first_child_filter, create_or_filter, optimize_node, tiered_sort_key, Blueprint,
    EvalContext, FilterConstraint, HitEstimate, OpKind, State, INVALID_SOURCE_ID,
};
use crate::execute_info::ExecuteInfo;
use crate::global_filter::GlobalFilter;
use crate::near_search;
use crate::or_search;
use crate::rank_search;
use crate::search_iterator::SearchIteratorBox;
use crate::source_blender::{self, same_selector, SharedSourceSelector, SourceBlenderChild};
use crate::termwise::TermwisePartition;
use crate::unpack::UnpackInfo;
use crate::weak_and::{self, WandTerm};

/// Operator payload of an intermediate node.
#[derive(Debug)]
pub enum IntermediateOp {
    And,
    Or,
    AndNot,
    Rank,
    Near { window: u32 },
    ONear { window: u32 },
    WeakAnd { target_hits: u32, weights: Vec<u32> },
    SourceBlender { selector: SharedSourceSelector },
}

/// An intermediate plan node: an operator over owned children.
#[derive(Debug)]
pub struct IntermediateBlueprint {
    op: IntermediateOp,
    children: Vec<Box<dyn Blueprint>>,
    docid_limit: DocId,
    source_id: u32,
    frozen_state: Option<State>,
}

impl IntermediateBlueprint {
    fn with_op(op: IntermediateOp) -> Self {
        Self {
            op,
            children: Vec::new(),
            docid_limit: 0,
            source_id: INVALID_SOURCE_ID,
            frozen_state: None,
        }
    }

    #[must_use]
    pub fn and() -> Self {
        Self::with_op(IntermediateOp::And)
    }

    #[must_use]
    pub fn or() -> Self {
        Self::with_op(IntermediateOp::Or)
    }

    #[must_use]
    pub fn and_not() -> Self {
        Self::with_op(IntermediateOp::AndNot)
    }

    #[must_use]
    pub fn rank() -> Self {
        Self::with_op(IntermediateOp::Rank)
    }

    #[must_use]
    pub fn near(window: u32) -> Self {
        Self::with_op(IntermediateOp::Near { window })
    }

    #[must_use]
    pub fn onear(window: u32) -> Self {
        Self::with_op(IntermediateOp::ONear { window })
    }

    #[must_use]
    pub fn weak_and(target_hits: u32) -> Self {
        Self::with_op(IntermediateOp::WeakAnd {
            target_hits,
            weights: Vec::new(),
        })
    }

    #[must_use]
    pub fn source_blender(selector: SharedSourceSelector) -> Self {
        Self::with_op(IntermediateOp::SourceBlender { selector })
    }

    #[must_use]
    pub fn op_kind(&self) -> OpKind {
        match &self.op {
            IntermediateOp::And => OpKind::And,
            IntermediateOp::Or => OpKind::Or,
            IntermediateOp::AndNot => OpKind::AndNot,
            IntermediateOp::Rank => OpKind::Rank,
            IntermediateOp::Near { .. } => OpKind::Near,
            IntermediateOp::ONear { .. } => OpKind::ONear,
            IntermediateOp::WeakAnd { .. } => OpKind::WeakAnd,
            IntermediateOp::SourceBlender { .. } => OpKind::SourceBlender,
        }
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    #[must_use]
    pub fn child(&self, idx: usize) -> &dyn Blueprint {
        self.children[idx].as_ref()
    }

    pub fn add_child(&mut self, child: Box<dyn Blueprint>) -> &mut Self {
        debug_assert!(self.frozen_state.is_none(), "mutating a frozen blueprint");
        self.children.push(child);
        self
    }

    /// Builder-style `add_child` for literal tree construction.
    #[must_use]
    pub fn adding(mut self, child: Box<dyn Blueprint>) -> Self {
        self.add_child(child);
        self
    }

    pub fn insert_child(&mut self, idx: usize, child: Box<dyn Blueprint>) -> &mut Self {
        debug_assert!(self.frozen_state.is_none(), "mutating a frozen blueprint");
        self.children.insert(idx, child);
        self
    }

    pub fn remove_child(&mut self, idx: usize) -> Box<dyn Blueprint> {
        debug_assert!(self.frozen_state.is_none(), "mutating a frozen blueprint");
        self.children.remove(idx)
    }

    pub(crate) fn take_children(&mut self) -> Vec<Box<dyn Blueprint>> {
        std::mem::take(&mut self.children)
    }

    /// Add a weighted term to a WEAK-AND node; child order stays
    /// parallel to the weights.
    pub fn add_term(&mut self, child: Box<dyn Blueprint>, weight: u32) -> &mut Self {
        if let IntermediateOp::WeakAnd { weights, .. } = &mut self.op {
            weights.push(weight);
        } else {
            debug_assert!(false, "add_term is only meaningful for weak-and");
        }
        self.add_child(child)
    }

    /// Indices of the children satisfying `predicate`.
    pub fn find(&self, predicate: impl Fn(&dyn Blueprint) -> bool) -> Vec<usize> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, child)| predicate(child.as_ref()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Index of the child registered for `source_id`, if any.
    #[must_use]
    pub fn find_source(&self, source_id: u32) -> Option<usize> {
        self.find(|child| child.source_id() == source_id)
            .first()
            .copied()
    }

    #[must_use]
    pub fn supports_termwise_children(&self) -> bool {
        matches!(
            self.op_kind(),
            OpKind::And | OpKind::Or | OpKind::AndNot
        )
    }

    fn inherit_strict(&self, idx: usize) -> bool {
        match self.op_kind() {
            OpKind::Or | OpKind::WeakAnd | OpKind::SourceBlender => true,
            OpKind::And | OpKind::AndNot | OpKind::Rank | OpKind::Near | OpKind::ONear => idx == 0,
        }
    }

    fn is_positive(&self, idx: usize) -> bool {
        match self.op_kind() {
            OpKind::AndNot => idx == 0,
            _ => true,
        }
    }

    fn combine(&self, estimates: &[HitEstimate]) -> HitEstimate {
        match &self.op {
            IntermediateOp::And
            | IntermediateOp::Near { .. }
            | IntermediateOp::ONear { .. } => HitEstimate::min(estimates),
            IntermediateOp::Or => HitEstimate::sat_sum(estimates, self.docid_limit),
            IntermediateOp::AndNot | IntermediateOp::Rank => {
                estimates.first().copied().unwrap_or_else(HitEstimate::empty)
            }
            IntermediateOp::WeakAnd { target_hits, .. } => {
                let child_est = HitEstimate::max(estimates);
                let my_est = HitEstimate::new(*target_hits, false);
                if child_est.is_less(&my_est) {
                    child_est
                } else {
                    my_est
                }
            }
            IntermediateOp::SourceBlender { .. } => HitEstimate::max(estimates),
        }
    }

    fn expose_fields(&self) -> FieldSpecBaseList {
        match self.op_kind() {
            OpKind::Or | OpKind::SourceBlender => self.mix_children_fields(),
            _ => FieldSpecBaseList::new(),
        }
    }

    /// Union of children's fields; empty if any child is not term-like
    /// or two children bind different handles to the same field.
    fn mix_children_fields(&self) -> FieldSpecBaseList {
        let mut field_map = HashMap::new();
        for child in &self.children {
            let child_state = child.state();
            if !child_state.is_term_like() {
                return FieldSpecBaseList::new();
            }
            for field in child_state.fields() {
                match field_map.insert(field.field_id(), *field) {
                    Some(other) if other.handle() != field.handle() => {
                        debug!(
                            field_id = field.field_id(),
                            "conflicting handles while mixing child fields"
                        );
                        return FieldSpecBaseList::new();
                    }
                    _ => {}
                }
            }
        }
        let mut fields: FieldSpecBaseList = field_map.into_values().collect();
        fields.sort_by_key(marlin_types::FieldSpecBase::field_id);
        fields
    }

    fn calculate_cost_tier(&self) -> u8 {
        match self.op_kind() {
            OpKind::AndNot | OpKind::Rank => self
                .children
                .first()
                .map_or(State::COST_TIER_NORMAL, |child| child.state().cost_tier()),
            _ => self
                .children
                .iter()
                .map(|child| child.state().cost_tier())
                .min()
                .unwrap_or(State::COST_TIER_MAX),
        }
    }

    fn calculate_state(&self) -> State {
        let mut state = State::new(self.expose_fields());
        let estimates: Vec<HitEstimate> = self
            .children
            .iter()
            .map(|child| child.state().estimate())
            .collect();
        state.set_estimate(self.combine(&estimates));
        state.set_cost_tier(self.calculate_cost_tier());
        let tree_size = 1 + self
            .children
            .iter()
            .map(|child| child.state().tree_size())
            .sum::<u32>();
        state.set_tree_size(tree_size);
        state.set_allow_termwise_eval(
            self.supports_termwise_children()
                && self
                    .children
                    .iter()
                    .all(|child| child.state().allow_termwise_eval()),
        );
        state.set_want_global_filter(
            self.children
                .iter()
                .any(|child| child.state().want_global_filter()),
        );
        state
    }

    // -----------------------------------------------------------------
    // optimization
    // -----------------------------------------------------------------

    pub(crate) fn optimize_children(&mut self) {
        let kind = self.op_kind();
        for slot in &mut self.children {
            let owned = std::mem::replace(
                slot,
                Box::new(crate::leaf_blueprints::EmptyBlueprint::new()) as Box<dyn Blueprint>,
            );
            *slot = optimize_node(owned, Some(kind));
        }
    }

    fn child_kind(&self, idx: usize) -> Option<OpKind> {
        self.children[idx]
            .as_intermediate()
            .map(IntermediateBlueprint::op_kind)
    }

    /// Lift grandchildren of a same-operator child into this node,
    /// dropping the emptied child.
    fn flatten_child(&mut self, idx: usize) {
        let mut child = self.remove_child(idx);
        if let Some(node) = child.as_intermediate_mut() {
            for grandchild in node.take_children() {
                self.add_child(grandchild);
            }
        }
    }

    pub(crate) fn optimize_self(&mut self, parent_kind: Option<OpKind>) {
        match self.op_kind() {
            OpKind::And => {
                let mut i = 0;
                while i < self.children.len() {
                    if self.child_kind(i) == Some(OpKind::And) {
                        self.flatten_child(i);
                    } else {
                        i += 1;
                    }
                }
                if parent_kind != Some(OpKind::And) {
                    self.optimize_source_blenders(OpKind::And, 0);
                }
            }
            OpKind::Or => {
                let mut i = 0;
                while self.children.len() > 1 && i < self.children.len() {
                    if self.child_kind(i) == Some(OpKind::Or) {
                        self.flatten_child(i);
                    } else if self.children[i].state().estimate().empty {
                        self.remove_child(i);
                    } else {
                        i += 1;
                    }
                }
                if parent_kind != Some(OpKind::Or) {
                    self.optimize_source_blenders(OpKind::Or, 0);
                }
            }
            OpKind::AndNot => {
                if self.children.is_empty() {
                    return;
                }
                if self.child_kind(0) == Some(OpKind::AndNot) {
                    // fold a nested and-not on the positive side: its
                    // positive becomes ours, its negatives join ours
                    let mut inner = self.remove_child(0);
                    if let Some(node) = inner.as_intermediate_mut() {
                        let mut grandchildren = node.take_children();
                        if !grandchildren.is_empty() {
                            let positive = grandchildren.remove(0);
                            self.insert_child(0, positive);
                        }
                        for negative in grandchildren {
                            self.add_child(negative);
                        }
                    }
                }
                let mut i = 1;
                while i < self.children.len() {
                    if self.children[i].state().estimate().empty {
                        self.remove_child(i);
                    } else {
                        i += 1;
                    }
                }
                if parent_kind != Some(OpKind::AndNot) {
                    self.optimize_source_blenders(OpKind::Or, 1);
                }
            }
            OpKind::Rank => {
                let mut i = 1;
                while i < self.children.len() {
                    if self.children[i].state().estimate().empty {
                        self.remove_child(i);
                    } else {
                        i += 1;
                    }
                }
                self.optimize_source_blenders(OpKind::Or, 1);
            }
            _ => {}
        }
    }

    /// Merge compatible source-blender children (same selector
    /// instance) into one blender whose children are per-source
    /// combinations of the original per-source subtrees.
    fn optimize_source_blenders(&mut self, combine_kind: OpKind, begin_idx: usize) {
        let mut blender_indices = Vec::new();
        let mut reference: Option<SharedSourceSelector> = None;
        for i in begin_idx..self.children.len() {
            if let Some(node) = self.children[i].as_intermediate() {
                if let IntermediateOp::SourceBlender { selector } = &node.op {
                    match &reference {
                        None => {
                            blender_indices.push(i);
                            reference = Some(selector.clone());
                        }
                        Some(reference) if same_selector(reference, selector) => {
                            blender_indices.push(i);
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        if blender_indices.len() <= 1 {
            return;
        }
        debug!(
            blenders = blender_indices.len(),
            "hoisting compatible source blenders"
        );
        let mut sources: Vec<(u32, IntermediateBlueprint)> = Vec::new();
        let mut shell: Option<Box<dyn Blueprint>> = None;
        while let Some(idx) = blender_indices.pop() {
            let mut blender = self.remove_child(idx);
            if let Some(node) = blender.as_intermediate_mut() {
                while node.child_count() > 0 {
                    let child = node.remove_child(node.child_count() - 1);
                    let child_source = child.source_id();
                    let slot = match sources.iter().position(|(s, _)| *s == child_source) {
                        Some(slot) => slot,
                        None => {
                            let mut combine = match combine_kind {
                                OpKind::And => Self::and(),
                                _ => Self::or(),
                            };
                            combine.set_source_id(child_source);
                            combine.set_docid_limit(self.docid_limit);
                            sources.push((child_source, combine));
                            sources.len() - 1
                        }
                    };
                    sources[slot].1.add_child(child);
                }
            }
            shell = Some(blender);
        }
        let Some(mut shell) = shell else { return };
        if let Some(top) = shell.as_intermediate_mut() {
            while let Some((_, combine)) = sources.pop() {
                top.add_child(Box::new(combine));
            }
        }
        let optimized = optimize_node(shell, None);
        self.add_child(optimized);
    }

    pub(crate) fn sort_children(&mut self) {
        match self.op_kind() {
            OpKind::And | OpKind::Near => sort_slice(&mut self.children, false),
            OpKind::Or => sort_slice(&mut self.children, true),
            OpKind::AndNot => {
                if self.children.len() > 2 {
                    sort_slice(&mut self.children[1..], true);
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------
    // iterator construction
    // -----------------------------------------------------------------

    /// Which children must unpack, given what ranking needs from the
    /// scratch rows.
    fn calculate_unpack_info(&self, match_data: &SharedMatchData) -> UnpackInfo {
        let mut info = UnpackInfo::new();
        let mut all_need_unpack = true;
        let md = match_data.borrow();
        for (i, child) in self.children.iter().enumerate() {
            if !self.is_positive(i) {
                all_need_unpack = false;
                continue;
            }
            let child_state = child.state();
            let mut can_skip = !child.always_needs_unpack()
                && (child_state.num_fields() != 0
                    || child
                        .as_intermediate()
                        .is_some_and(|node| node.calculate_unpack_info(match_data).is_empty()));
            for field in child_state.fields() {
                if can_skip && !md.term_field(field.handle()).is_not_needed() {
                    can_skip = false;
                }
            }
            if can_skip {
                all_need_unpack = false;
            } else {
                info.add(i);
            }
        }
        if all_need_unpack {
            info.force_all();
        }
        info
    }

    fn count_termwise_nodes(&self, unpack: &UnpackInfo) -> u32 {
        self.children
            .iter()
            .enumerate()
            .filter(|(i, child)| {
                child.state().allow_termwise_eval() && !unpack.need_unpack(*i)
            })
            .map(|(_, child)| child.state().tree_size())
            .sum()
    }

    fn should_do_termwise_eval(
        &self,
        unpack: &UnpackInfo,
        match_limit: f64,
        ctx: EvalContext,
    ) -> bool {
        if ctx.root_hit_ratio <= match_limit {
            return false; // global hit density too low
        }
        if self.state().allow_termwise_eval()
            && unpack.is_empty()
            && ctx.in_termwise_capable_parent
        {
            return false; // an ancestor will hoist a larger group
        }
        self.count_termwise_nodes(unpack) > 1
    }

    /// Resolve NEAR/ONEAR children's rows to full occurrence tracking.
    fn need_normal_features_for_children(&self, match_data: &SharedMatchData) {
        let mut md = match_data.borrow_mut();
        for child in &self.children {
            for field in child.state().fields() {
                md.term_field_mut(field.handle())
                    .set_need_normal_features(true);
            }
        }
    }

    pub(crate) fn create_search_ctx(
        &self,
        match_data: &SharedMatchData,
        strict: bool,
        ctx: EvalContext,
    ) -> SearchIteratorBox {
        if matches!(self.op_kind(), OpKind::Near | OpKind::ONear) {
            self.need_normal_features_for_children(match_data);
        }
        let child_ctx = EvalContext {
            root_hit_ratio: ctx.root_hit_ratio,
            in_termwise_capable_parent: self.supports_termwise_children(),
        };
        let sub_searches: Vec<SearchIteratorBox> = self
            .children
            .iter()
            .enumerate()
            .map(|(i, child)| {
                let strict_child = strict && self.inherit_strict(i);
                match child.as_intermediate() {
                    Some(node) => node.create_search_ctx(match_data, strict_child, child_ctx),
                    None => child.create_search(match_data, strict_child),
                }
            })
            .collect();
        self.create_intermediate_search(sub_searches, strict, match_data, ctx)
    }

    fn allow_termwise_child(&self, idx: usize) -> bool {
        self.children[idx].state().allow_termwise_eval()
    }

    fn create_intermediate_search(
        &self,
        sub_searches: Vec<SearchIteratorBox>,
        strict: bool,
        match_data: &SharedMatchData,
        ctx: EvalContext,
    ) -> SearchIteratorBox {
        match &self.op {
            IntermediateOp::And => {
                let unpack = self.calculate_unpack_info(match_data);
                let estimate = self.state().estimate().est_hits;
                let termwise_limit = match_data.borrow().termwise_limit();
                if self.should_do_termwise_eval(&unpack, termwise_limit, ctx) {
                    let mut partition = TermwisePartition::split(sub_searches, &unpack, |i| {
                        self.allow_termwise_child(i)
                    });
                    let termwise_strict = strict && self.inherit_strict(partition.first_termwise);
                    let group = and_search::create_full_unpack(
                        partition.take_termwise_children(),
                        termwise_strict,
                    );
                    partition.insert_termwise(group, termwise_strict);
                    let termwise_unpack = partition.termwise_unpack.clone();
                    let mut rearranged = partition.into_result();
                    if rearranged.len() == 1 {
                        if let Some(only) = rearranged.pop() {
                            return only;
                        }
                    }
                    and_search::create(rearranged, strict, termwise_unpack, estimate)
                } else {
                    and_search::create(sub_searches, strict, unpack, estimate)
                }
            }
            IntermediateOp::Or => {
                let unpack = self.calculate_unpack_info(match_data);
                let termwise_limit = match_data.borrow().termwise_limit();
                if self.should_do_termwise_eval(&unpack, termwise_limit, ctx) {
                    let mut partition = TermwisePartition::split(sub_searches, &unpack, |i| {
                        self.allow_termwise_child(i)
                    });
                    let termwise_strict = strict && self.inherit_strict(partition.first_termwise);
                    let group = or_search::create_full_unpack(
                        partition.take_termwise_children(),
                        termwise_strict,
                    );
                    partition.insert_termwise(group, termwise_strict);
                    let termwise_unpack = partition.termwise_unpack.clone();
                    let mut rearranged = partition.into_result();
                    if rearranged.len() == 1 {
                        if let Some(only) = rearranged.pop() {
                            return only;
                        }
                    }
                    or_search::create(rearranged, strict, termwise_unpack)
                } else {
                    or_search::create(sub_searches, strict, unpack)
                }
            }
            IntermediateOp::AndNot => {
                let unpack = self.calculate_unpack_info(match_data);
                let termwise_limit = match_data.borrow().termwise_limit();
                if self.should_do_termwise_eval(&unpack, termwise_limit, ctx) {
                    let mut partition = TermwisePartition::split(sub_searches, &unpack, |i| {
                        self.allow_termwise_child(i)
                    });
                    let termwise_strict = strict && self.inherit_strict(partition.first_termwise);
                    // the hoisted group only forms an and-not when the
                    // positive child is part of it
                    let group = if partition.first_termwise == 0 {
                        and_not_search::create(
                            partition.take_termwise_children(),
                            termwise_strict,
                        )
                    } else {
                        or_search::create_full_unpack(
                            partition.take_termwise_children(),
                            termwise_strict,
                        )
                    };
                    partition.insert_termwise(group, termwise_strict);
                    let mut rearranged = partition.into_result();
                    if rearranged.len() == 1 {
                        if let Some(only) = rearranged.pop() {
                            return only;
                        }
                    }
                    and_not_search::create(rearranged, strict)
                } else {
                    and_not_search::create(sub_searches, strict)
                }
            }
            IntermediateOp::Rank => {
                let unpack = self.calculate_unpack_info(match_data);
                if unpack.unpack_all() {
                    rank_search::create(sub_searches, strict)
                } else {
                    let mut kept = Vec::with_capacity(sub_searches.len());
                    for (i, search) in sub_searches.into_iter().enumerate() {
                        if i == 0 || unpack.need_unpack(i) {
                            kept.push(search);
                        }
                    }
                    if kept.len() == 1 {
                        if let Some(only) = kept.pop() {
                            return only;
                        }
                    }
                    rank_search::create(kept, strict)
                }
            }
            IntermediateOp::Near { window } => {
                let handles = self.gather_child_handles();
                near_search::create_near(
                    sub_searches,
                    handles,
                    match_data.clone(),
                    *window,
                    strict,
                )
            }
            IntermediateOp::ONear { window } => {
                let handles = self.gather_child_handles();
                near_search::create_onear(
                    sub_searches,
                    handles,
                    match_data.clone(),
                    *window,
                    strict,
                )
            }
            IntermediateOp::WeakAnd {
                target_hits,
                weights,
            } => {
                debug_assert_eq!(weights.len(), sub_searches.len());
                let terms: Vec<WandTerm> = sub_searches
                    .into_iter()
                    .zip(weights)
                    .enumerate()
                    .map(|(i, (search, &weight))| WandTerm {
                        search,
                        weight,
                        est_hits: self.children[i].state().estimate().est_hits,
                    })
                    .collect();
                weak_and::create(terms, *target_hits, strict)
            }
            IntermediateOp::SourceBlender { selector } => {
                let children: Vec<SourceBlenderChild> = sub_searches
                    .into_iter()
                    .enumerate()
                    .map(|(i, search)| {
                        let source_id = self.children[i].source_id();
                        debug_assert_ne!(source_id, INVALID_SOURCE_ID);
                        SourceBlenderChild { search, source_id }
                    })
                    .collect();
                source_blender::create(selector.clone(), children, strict)
            }
        }
    }

    fn gather_child_handles(&self) -> Vec<marlin_types::TermFieldHandle> {
        let mut handles = Vec::new();
        for child in &self.children {
            for field in child.state().fields() {
                handles.push(field.handle());
            }
        }
        handles
    }
}

fn sort_slice(children: &mut [Box<dyn Blueprint>], descending: bool) {
    children.sort_by_cached_key(|child| tiered_sort_key(&child.state(), descending));
}

impl Blueprint for IntermediateBlueprint {
    fn state(&self) -> State {
        self.frozen_state
            .clone()
            .unwrap_or_else(|| self.calculate_state())
    }

    fn docid_limit(&self) -> DocId {
        self.docid_limit
    }

    fn set_docid_limit(&mut self, limit: DocId) {
        self.docid_limit = limit;
        for child in &mut self.children {
            child.set_docid_limit(limit);
        }
    }

    fn source_id(&self) -> u32 {
        self.source_id
    }

    fn set_source_id(&mut self, source_id: u32) {
        self.source_id = source_id;
    }

    fn as_intermediate(&self) -> Option<&IntermediateBlueprint> {
        Some(self)
    }

    fn as_intermediate_mut(&mut self) -> Option<&mut IntermediateBlueprint> {
        Some(self)
    }

    fn get_replacement(&mut self) -> Option<Box<dyn Blueprint>> {
        match self.op_kind() {
            OpKind::And | OpKind::Or | OpKind::AndNot | OpKind::Rank
                if self.children.len() == 1 =>
            {
                Some(self.remove_child(0))
            }
            _ => None,
        }
    }

    fn always_needs_unpack(&self) -> bool {
        matches!(self.op_kind(), OpKind::WeakAnd)
    }

    fn fetch_postings(&mut self, execute_info: &ExecuteInfo) {
        let is_and = self.op_kind() == OpKind::And;
        let mut next_hit_rate = execute_info.hit_rate();
        for i in 0..self.children.len() {
            let strict_child = execute_info.is_strict() && self.inherit_strict(i);
            let child_info = execute_info.for_child(strict_child, next_hit_rate);
            self.children[i].fetch_postings(&child_info);
            if is_and {
                next_hit_rate *= self.children[i].hit_ratio();
            }
        }
    }

    fn freeze(&mut self) {
        for child in &mut self.children {
            child.freeze();
        }
        self.frozen_state = Some(self.calculate_state());
    }

    fn set_global_filter(&mut self, filter: &GlobalFilter, estimated_hit_ratio: f64) {
        for child in &mut self.children {
            if child.state().want_global_filter() {
                child.set_global_filter(filter, estimated_hit_ratio);
            }
        }
    }

    fn create_search(&self, match_data: &SharedMatchData, strict: bool) -> SearchIteratorBox {
        let ctx = EvalContext {
            root_hit_ratio: self.hit_ratio(),
            in_termwise_capable_parent: false,
        };
        self.create_search_ctx(match_data, strict, ctx)
    }

    fn create_filter_search(
        &self,
        strict: bool,
        constraint: FilterConstraint,
    ) -> SearchIteratorBox {
        match self.op_kind() {
            OpKind::And => create_and_filter(&self.children, strict, constraint),
            OpKind::Or => create_or_filter(&self.children, strict, constraint),
            OpKind::AndNot => create_andnot_filter(&self.children, strict, constraint),
            OpKind::Rank => create_first_child_filter(&self.children, strict, constraint),
            OpKind::Near | OpKind::ONear => {
                create_atmost_and_filter(&self.children, strict, constraint)
            }
            OpKind::WeakAnd | OpKind::SourceBlender => {
                create_atmost_or_filter(&self.children, strict, constraint)
            }
        }
    }

    fn class_name(&self) -> &'static str {
        match self.op_kind() {
            OpKind::And => "AndBlueprint",
            OpKind::Or => "OrBlueprint",
            OpKind::AndNot => "AndNotBlueprint",
            OpKind::Rank => "RankBlueprint",
            OpKind::Near => "NearBlueprint",
            OpKind::ONear => "ONearBlueprint",
            OpKind::WeakAnd => "WeakAndBlueprint",
            OpKind::SourceBlender => "SourceBlenderBlueprint",
        }
    }

    fn extra_plan_members(&self, out: &mut serde_json::Map<String, Value>) {
        match &self.op {
            IntermediateOp::Near { window } | IntermediateOp::ONear { window } => {
                out.insert("window".into(), json!(window));
            }
            IntermediateOp::WeakAnd {
                target_hits,
                weights,
            } => {
                out.insert("target_hits".into(), json!(target_hits));
                out.insert("weights".into(), json!(weights));
            }
            _ => {}
        }
    }
}
