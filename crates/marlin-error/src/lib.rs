//! Error types shared across the marlin search kernel.
//!
//! The evaluation hot path (`seek`/`unpack`) is infallible by design:
//! anything that can go wrong is detected at plan time and degraded to
//! an empty plan, or parked in the request context's failure slot during
//! posting fetch. These types cover the plan-time and fetch-time cases.

use thiserror::Error;

/// Errors produced while building, optimizing or hydrating a query plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The plan cannot match anything: empty field set or an impossible
    /// operator combination. Callers replace the offending node with an
    /// empty blueprint.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// An internal optimizer invariant was violated. Fatal for the
    /// query; there is no safe way to continue evaluating a plan whose
    /// structure is inconsistent.
    #[error("optimization assertion failed: {0}")]
    OptimizationAssertion(String),

    /// Posting-list hydration failed (out of memory, missing store,
    /// deadline exceeded). Surfaced through the request context; the
    /// caller turns the query into an empty result.
    #[error("resource exhausted while fetching postings: {0}")]
    ResourceExhausted(String),

    /// Two children bind different match-data handles to the same field
    /// id, so the parent cannot expose a coherent field list.
    #[error("inconsistent handles for field {field_id}: {first} vs {second}")]
    InconsistentHandles {
        field_id: u32,
        first: u32,
        second: u32,
    },
}

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, EvalError>;
