//! Query evaluation kernel.
//!
//! This crate compiles a query tree into a tree of [`Blueprint`] plan
//! nodes, optimizes that tree (flattening, reordering, source-blender
//! hoisting, bit-vector fusion, termwise hoisting), and turns it into a
//! tree of [`SearchIterator`] doc-id cursors evaluated against posting
//! data.
//!
//! The life of a query:
//!
//! 1. build blueprints bottom-up through a [`Searchable`] factory,
//! 2. [`optimize`] the blueprint tree (two passes, children first),
//! 3. [`Blueprint::fetch_postings`] to hydrate posting lists,
//! 4. [`Blueprint::freeze`] to cache plan state,
//! 5. [`Blueprint::create_search`] to build the iterator tree,
//! 6. drive the iterators with `init_range` + `seek`/`unpack`.

pub mod and_not_search;
pub mod and_search;
pub mod bit_vector_iterator;
pub mod blueprint;
pub mod dot_product_blueprint;
pub mod dot_product_search;
pub mod empty_search;
pub mod execute_info;
pub mod fake;
pub mod full_search;
pub mod global_filter;
pub mod heap;
pub mod intermediate_blueprints;
pub mod iterator_pack;
pub mod leaf_blueprints;
pub mod multi_bit_vector_iterator;
pub mod multi_search;
pub mod near_search;
pub mod or_search;
pub mod planner;
pub mod rank_search;
pub mod search_iterator;
pub mod searchable;
pub mod simple_result;
pub mod source_blender;
pub mod termwise;
pub mod unpack;
pub mod weak_and;
pub mod weighted_set_term_blueprint;
pub mod weighted_set_term_search;

pub use blueprint::{optimize, plan_string, plan_value, Blueprint, FilterConstraint, HitEstimate, State};
pub use execute_info::ExecuteInfo;
pub use intermediate_blueprints::IntermediateBlueprint;
pub use planner::BlueprintBuilder;
pub use search_iterator::{SearchIterator, SearchIteratorBox};
pub use searchable::{RequestContext, Searchable};
pub use unpack::UnpackInfo;
