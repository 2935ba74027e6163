//! Query tree model.
//!
//! The kernel consumes an already-parsed query as a tree of [`Node`]
//! values: leaf kinds looked up through a `Searchable`, and intermediate
//! kinds compiled into the matching blueprint operators. The tree is a
//! plain tagged enum; consumers dispatch with `match`.

use marlin_types::DocId;

/// A single query term with its significance weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermNode {
    pub term: String,
    pub weight: i32,
}

impl TermNode {
    #[must_use]
    pub fn new(term: impl Into<String>, weight: i32) -> Self {
        Self {
            term: term.into(),
            weight,
        }
    }
}

/// A child annotated with an integer weight (weighted-set, dot-product,
/// weak-and).
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedChild {
    pub node: Node,
    pub weight: i32,
}

/// A child annotated with the source id it serves (source-blender).
#[derive(Debug, Clone, PartialEq)]
pub struct SourcedChild {
    pub node: Node,
    pub source_id: u32,
}

/// One node of the query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    // ---- leaf kinds, resolved by a Searchable ----
    Term(TermNode),
    Prefix(TermNode),
    Phrase { terms: Vec<String>, weight: i32 },
    NumericRange { low: Option<i64>, high: Option<i64> },
    Location { x: i64, y: i64, radius: u64 },
    SameElement { terms: Vec<TermNode> },
    Regexp(TermNode),
    Fuzzy { term: TermNode, max_edits: u8, prefix_length: u32 },

    // ---- intermediate kinds, compiled into operators ----
    And(Vec<Node>),
    Or(Vec<Node>),
    AndNot(Vec<Node>),
    Rank(Vec<Node>),
    Near { window: u32, children: Vec<Node> },
    ONear { window: u32, children: Vec<Node> },
    WeakAnd { target_hits: u32, children: Vec<WeightedChild> },
    WeightedSet { children: Vec<WeightedChild> },
    DotProduct { children: Vec<WeightedChild> },
    SourceBlender { children: Vec<SourcedChild> },
}

impl Node {
    /// Convenience constructor for a unit-weight term.
    #[must_use]
    pub fn term(term: impl Into<String>) -> Self {
        Self::Term(TermNode::new(term, 100))
    }

    /// Whether this node is a leaf kind (resolved through a
    /// Searchable rather than compiled into an operator).
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(
            self,
            Self::Term(_)
                | Self::Prefix(_)
                | Self::Phrase { .. }
                | Self::NumericRange { .. }
                | Self::Location { .. }
                | Self::SameElement { .. }
                | Self::Regexp(_)
                | Self::Fuzzy { .. }
        )
    }

    /// Number of leaf terms in the subtree.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        match self {
            node if node.is_leaf() => 1,
            Self::And(children)
            | Self::Or(children)
            | Self::AndNot(children)
            | Self::Rank(children)
            | Self::Near { children, .. }
            | Self::ONear { children, .. } => children.iter().map(Self::leaf_count).sum(),
            Self::WeakAnd { children, .. }
            | Self::WeightedSet { children }
            | Self::DotProduct { children } => {
                children.iter().map(|c| c.node.leaf_count()).sum()
            }
            Self::SourceBlender { children } => {
                children.iter().map(|c| c.node.leaf_count()).sum()
            }
            _ => 0,
        }
    }
}

/// Upper bound context a query executes in: the exclusive doc id limit
/// of the index generation being searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub docid_limit: DocId,
}
