//! Global filter input for leaves that request it.
//!
//! Some leaves (approximate nearest-neighbor terms, for instance) want
//! a pre-computed bit vector of the documents surviving the rest of the
//! query. Blueprints signal the wish through their state; once the
//! filter is calculated, it is pushed down the tree to exactly those
//! leaves.

use std::rc::Rc;

use marlin_bitvec::BitVector;
use marlin_types::DocId;

/// An optional document filter shared across the plan.
#[derive(Debug, Clone)]
pub struct GlobalFilter {
    bits: Option<Rc<BitVector>>,
}

impl GlobalFilter {
    /// A filter that was requested but not computed; leaves fall back
    /// to unfiltered evaluation.
    #[must_use]
    pub fn inactive() -> Self {
        Self { bits: None }
    }

    #[must_use]
    pub fn from_bits(bits: Rc<BitVector>) -> Self {
        Self { bits: Some(bits) }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.bits.is_some()
    }

    /// Whether `doc_id` passes the filter. Inactive filters pass
    /// everything.
    #[must_use]
    pub fn check(&self, doc_id: DocId) -> bool {
        self.bits.as_ref().is_none_or(|bits| bits.test_bit(doc_id))
    }

    #[must_use]
    pub fn bits(&self) -> Option<&Rc<BitVector>> {
        self.bits.as_ref()
    }
}
