//! Query tree → blueprint tree construction.
//!
//! Intermediate query nodes compile into the matching blueprint
//! operators; leaf nodes are resolved through the [`Searchable`]. The
//! builder owns the match-data layout for the query: every leaf term
//! gets its own scratch row per searched field, allocated here, so the
//! field specs handed to callers are templates (their handles are
//! ignored). Structurally invalid queries (negative wand weights,
//! weighted leaves under a multi-field spec, a source blender without a
//! selector) are rejected with [`EvalError::InvalidPlan`].

use std::cell::RefCell;

use marlin_error::{EvalError, Result};
use marlin_query::Node;
use marlin_types::{FieldSpec, FieldSpecList, MatchDataLayout, SharedMatchData};

use crate::blueprint::Blueprint;
use crate::dot_product_blueprint::DotProductBlueprint;
use crate::intermediate_blueprints::IntermediateBlueprint;
use crate::searchable::{RequestContext, Searchable};
use crate::source_blender::SharedSourceSelector;
use crate::weighted_set_term_blueprint::WeightedSetTermBlueprint;

/// Builds blueprint trees from query trees, allocating match-data rows
/// as it goes.
pub struct BlueprintBuilder<'a> {
    searchable: &'a dyn Searchable,
    ctx: &'a RequestContext,
    selector: Option<SharedSourceSelector>,
    layout: RefCell<MatchDataLayout>,
}

impl<'a> BlueprintBuilder<'a> {
    #[must_use]
    pub fn new(searchable: &'a dyn Searchable, ctx: &'a RequestContext) -> Self {
        Self {
            searchable,
            ctx,
            selector: None,
            layout: RefCell::new(MatchDataLayout::new()),
        }
    }

    /// Selector used by source-blender nodes in the query.
    #[must_use]
    pub fn with_selector(mut self, selector: SharedSourceSelector) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Scratch matching every row allocated while building. Call after
    /// the last `build`.
    #[must_use]
    pub fn create_shared_match_data(&self) -> SharedMatchData {
        self.layout.borrow().create_shared_match_data()
    }

    /// Compile `node` against the field templates in `fields`.
    pub fn build(&self, fields: &FieldSpecList, node: &Node) -> Result<Box<dyn Blueprint>> {
        if node.is_leaf() {
            let resolved = self.resolve_fields(fields);
            return Ok(self.searchable.create_blueprint(self.ctx, &resolved, node));
        }
        match node {
            Node::And(children) => self.build_plain(IntermediateBlueprint::and(), fields, children),
            Node::Or(children) => self.build_plain(IntermediateBlueprint::or(), fields, children),
            Node::AndNot(children) => {
                self.build_plain(IntermediateBlueprint::and_not(), fields, children)
            }
            Node::Rank(children) => {
                self.build_plain(IntermediateBlueprint::rank(), fields, children)
            }
            Node::Near { window, children } => {
                self.build_plain(IntermediateBlueprint::near(*window), fields, children)
            }
            Node::ONear { window, children } => {
                self.build_plain(IntermediateBlueprint::onear(*window), fields, children)
            }
            Node::WeakAnd {
                target_hits,
                children,
            } => {
                let mut wand = IntermediateBlueprint::weak_and(*target_hits);
                for child in children {
                    let weight = u32::try_from(child.weight).map_err(|_| {
                        EvalError::InvalidPlan(format!(
                            "weak-and weight {} is negative",
                            child.weight
                        ))
                    })?;
                    wand.add_term(self.build(fields, &child.node)?, weight);
                }
                Ok(Box::new(wand))
            }
            Node::WeightedSet { children } => {
                let field = self.resolve_single_field(fields, "weighted-set")?;
                let mut blueprint = WeightedSetTermBlueprint::new(field);
                for child in children {
                    let child_field = blueprint.next_child_field();
                    let term =
                        self.searchable
                            .create_blueprint_for_field(self.ctx, &child_field, &child.node);
                    blueprint.add_term(term, child.weight);
                }
                Ok(Box::new(blueprint))
            }
            Node::DotProduct { children } => {
                let field = self.resolve_single_field(fields, "dot-product")?;
                let mut blueprint = DotProductBlueprint::new(field);
                for child in children {
                    let child_field = blueprint.next_child_field();
                    let term =
                        self.searchable
                            .create_blueprint_for_field(self.ctx, &child_field, &child.node);
                    blueprint.add_term(term, child.weight);
                }
                Ok(Box::new(blueprint))
            }
            Node::SourceBlender { children } => {
                let selector = self.selector.clone().ok_or_else(|| {
                    EvalError::InvalidPlan("source blender without a selector".into())
                })?;
                let mut blender = IntermediateBlueprint::source_blender(selector);
                for child in children {
                    let mut built = self.build(fields, &child.node)?;
                    built.set_source_id(child.source_id);
                    blender.add_child(built);
                }
                Ok(Box::new(blender))
            }
            _ => Err(EvalError::InvalidPlan(
                "unsupported intermediate query node".into(),
            )),
        }
    }

    fn build_plain(
        &self,
        mut node: IntermediateBlueprint,
        fields: &FieldSpecList,
        children: &[Node],
    ) -> Result<Box<dyn Blueprint>> {
        for child in children {
            node.add_child(self.build(fields, child)?);
        }
        Ok(Box::new(node))
    }

    /// Per-term field resolution: one fresh scratch row per field.
    fn resolve_fields(&self, fields: &FieldSpecList) -> FieldSpecList {
        let mut layout = self.layout.borrow_mut();
        let mut resolved = FieldSpecList::new();
        for field in fields {
            resolved.add(FieldSpec::new(
                field.name(),
                field.field_id(),
                layout.alloc_term_field(field.field_id()),
                field.is_filter(),
            ));
        }
        resolved
    }

    fn resolve_single_field(&self, fields: &FieldSpecList, what: &str) -> Result<FieldSpec> {
        if fields.len() == 1 {
            let resolved = self.resolve_fields(fields);
            Ok(resolved.get(0).clone())
        } else {
            Err(EvalError::InvalidPlan(format!(
                "{what} requires exactly one field, got {}",
                fields.len()
            )))
        }
    }
}
