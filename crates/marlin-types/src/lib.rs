//! Core type definitions for the marlin search kernel.
//!
//! This crate holds the vocabulary types shared by every layer of the
//! kernel: document ids, the ternary logic value used for strictness and
//! filter queries, field specifications with their match-data handles,
//! the per-query mutable match-data scratch, and the soft query
//! deadline.

pub mod doom;
pub mod field_spec;
pub mod match_data;
pub mod trinary;

pub use doom::Doom;
pub use field_spec::{FieldSpec, FieldSpecBase, FieldSpecBaseList, FieldSpecList};
pub use match_data::{
    MatchData, MatchDataLayout, Position, PositionKey, SharedMatchData, TermFieldHandle,
    TermFieldMatchData, ILLEGAL_HANDLE,
};
pub use trinary::Trinary;

/// Document identifier. Doc ids are produced in strictly ascending order
/// by every iterator.
pub type DocId = u32;

/// First valid document id. Doc id 0 is reserved.
pub const BEGIN_DOC_ID: DocId = 1;

/// Sentinel marking "past the end" of the doc id range. Iterators whose
/// current doc id is at or beyond their end id are exhausted.
pub const END_DOC_ID: DocId = u32::MAX;
