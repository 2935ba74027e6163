//! Per-query mutable match-data scratch.
//!
//! Iterators report *where* a term matched by writing occurrence data
//! into rows of [`MatchData`], addressed by dense [`TermFieldHandle`]
//! indices handed out by [`MatchDataLayout`] at plan-build time. The
//! rows are reused for every matching document; no allocation happens
//! per seek once positions capacity has been established.

use std::cell::RefCell;
use std::rc::Rc;

use bitflags::bitflags;

use crate::DocId;

/// Dense index of a term/field scratch row inside [`MatchData`].
pub type TermFieldHandle = u32;

/// Handle value meaning "no row allocated".
pub const ILLEGAL_HANDLE: TermFieldHandle = u32::MAX;

/// A single term occurrence inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    position: u32,
    element_id: u32,
    element_weight: i32,
    element_length: u32,
}

impl Position {
    #[must_use]
    pub fn new(position: u32, element_id: u32, element_weight: i32, element_length: u32) -> Self {
        Self {
            position,
            element_id,
            element_weight,
            element_length,
        }
    }

    /// An occurrence carrying only an element weight, used by
    /// weighted-set unpacking.
    #[must_use]
    pub fn with_element_weight(element_weight: i32) -> Self {
        Self {
            position: 0,
            element_id: 0,
            element_weight,
            element_length: 0,
        }
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    pub fn element_id(&self) -> u32 {
        self.element_id
    }

    #[must_use]
    pub fn element_weight(&self) -> i32 {
        self.element_weight
    }

    #[must_use]
    pub fn element_length(&self) -> u32 {
        self.element_length
    }

    /// The ordering key of this occurrence: element first, then
    /// position within the element.
    #[must_use]
    pub fn key(&self) -> PositionKey {
        PositionKey {
            element_id: self.element_id,
            position: self.position,
        }
    }
}

/// Ordering key for occurrences. Occurrences in different elements never
/// fall inside the same proximity window, which the key ordering encodes
/// by comparing element ids before positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PositionKey {
    element_id: u32,
    position: u32,
}

impl PositionKey {
    #[must_use]
    pub fn new(element_id: u32, position: u32) -> Self {
        Self {
            element_id,
            position,
        }
    }

    #[must_use]
    pub fn element_id(&self) -> u32 {
        self.element_id
    }

    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// The key `distance` positions to the right, inside the same
    /// element.
    #[must_use]
    pub fn advanced(&self, distance: u32) -> Self {
        Self {
            element_id: self.element_id,
            position: self.position.saturating_add(distance),
        }
    }
}

bitflags! {
    /// Per-row demand flags, set by the ranking setup before evaluation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MatchDataNeeds: u8 {
        /// The row is read by ranking at all. Rows without this flag can
        /// be skipped during unpack.
        const FEATURES = 0b01;
        /// Full occurrence data (positions) is wanted, not just doc id
        /// and weight.
        const NORMAL_FEATURES = 0b10;
    }
}

/// Mutable scratch row for one (term, field) pair of the query.
#[derive(Debug, Clone)]
pub struct TermFieldMatchData {
    field_id: u32,
    doc_id: DocId,
    raw_score: f64,
    positions: Vec<Position>,
    needs: MatchDataNeeds,
}

impl TermFieldMatchData {
    #[must_use]
    pub fn new(field_id: u32) -> Self {
        Self {
            field_id,
            doc_id: crate::END_DOC_ID,
            raw_score: 0.0,
            positions: Vec::new(),
            needs: MatchDataNeeds::FEATURES,
        }
    }

    #[must_use]
    pub fn field_id(&self) -> u32 {
        self.field_id
    }

    #[must_use]
    pub fn doc_id(&self) -> DocId {
        self.doc_id
    }

    /// Whether ranking has no use for this row.
    #[must_use]
    pub fn is_not_needed(&self) -> bool {
        !self.needs.contains(MatchDataNeeds::FEATURES)
    }

    pub fn set_not_needed(&mut self, not_needed: bool) {
        self.needs.set(MatchDataNeeds::FEATURES, !not_needed);
    }

    #[must_use]
    pub fn needs_normal_features(&self) -> bool {
        self.needs.contains(MatchDataNeeds::NORMAL_FEATURES)
    }

    pub fn set_need_normal_features(&mut self, need: bool) {
        self.needs.set(MatchDataNeeds::NORMAL_FEATURES, need);
    }

    /// Start a fresh unpack for `doc_id`, discarding old occurrences.
    pub fn reset(&mut self, doc_id: DocId) {
        self.doc_id = doc_id;
        self.raw_score = 0.0;
        self.positions.clear();
    }

    /// Record a hit without occurrence data (filter fields).
    pub fn reset_only_doc_id(&mut self, doc_id: DocId) {
        self.doc_id = doc_id;
    }

    pub fn reserve_positions(&mut self, capacity: usize) {
        self.positions.reserve(capacity);
    }

    pub fn append_position(&mut self, position: Position) {
        self.positions.push(position);
    }

    #[must_use]
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// The element weight of the first occurrence; 0 when the row holds
    /// no occurrences.
    #[must_use]
    pub fn weight(&self) -> i32 {
        self.positions.first().map_or(0, Position::element_weight)
    }

    pub fn set_raw_score(&mut self, doc_id: DocId, raw_score: f64) {
        self.doc_id = doc_id;
        self.raw_score = raw_score;
    }

    #[must_use]
    pub fn raw_score(&self) -> f64 {
        self.raw_score
    }
}

/// Flat vector of scratch rows for one query execution, indexed by
/// handle.
#[derive(Debug, Clone)]
pub struct MatchData {
    term_fields: Vec<TermFieldMatchData>,
    termwise_limit: f64,
}

impl MatchData {
    #[must_use]
    pub fn with_rows(term_fields: Vec<TermFieldMatchData>) -> Self {
        Self {
            term_fields,
            termwise_limit: 1.0,
        }
    }

    #[must_use]
    pub fn num_term_fields(&self) -> usize {
        self.term_fields.len()
    }

    #[must_use]
    pub fn term_field(&self, handle: TermFieldHandle) -> &TermFieldMatchData {
        &self.term_fields[handle as usize]
    }

    pub fn term_field_mut(&mut self, handle: TermFieldHandle) -> &mut TermFieldMatchData {
        &mut self.term_fields[handle as usize]
    }

    /// Hit-ratio limit below which termwise evaluation is not worth it.
    /// The default of 1.0 disables termwise evaluation.
    #[must_use]
    pub fn termwise_limit(&self) -> f64 {
        self.termwise_limit
    }

    pub fn set_termwise_limit(&mut self, limit: f64) {
        self.termwise_limit = limit;
    }
}

/// Shared ownership of the per-query scratch. Evaluation is
/// single-threaded per query, so plain `Rc` + `RefCell` is the right
/// sharing primitive.
pub type SharedMatchData = Rc<RefCell<MatchData>>;

/// Allocator for scratch rows. Blueprint construction allocates one row
/// per (term, field); the resulting layout stamps out a fresh
/// [`MatchData`] per query execution.
#[derive(Debug, Clone, Default)]
pub struct MatchDataLayout {
    field_ids: Vec<u32>,
}

impl MatchDataLayout {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a row for `field_id`, returning its dense handle.
    pub fn alloc_term_field(&mut self, field_id: u32) -> TermFieldHandle {
        let handle = self.field_ids.len() as TermFieldHandle;
        self.field_ids.push(field_id);
        handle
    }

    #[must_use]
    pub fn num_handles(&self) -> usize {
        self.field_ids.len()
    }

    /// Create a fresh scratch instance matching this layout.
    #[must_use]
    pub fn create_match_data(&self) -> MatchData {
        MatchData::with_rows(
            self.field_ids
                .iter()
                .map(|&field_id| TermFieldMatchData::new(field_id))
                .collect(),
        )
    }

    /// Create a fresh shared scratch instance matching this layout.
    #[must_use]
    pub fn create_shared_match_data(&self) -> SharedMatchData {
        Rc::new(RefCell::new(self.create_match_data()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_hands_out_dense_handles() {
        let mut layout = MatchDataLayout::new();
        let a = layout.alloc_term_field(11);
        let b = layout.alloc_term_field(22);
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        let md = layout.create_match_data();
        assert_eq!(md.num_term_fields(), 2);
        assert_eq!(md.term_field(a).field_id(), 11);
        assert_eq!(md.term_field(b).field_id(), 22);
    }

    #[test]
    fn reset_clears_positions() {
        let mut tfmd = TermFieldMatchData::new(1);
        tfmd.reset(10);
        tfmd.append_position(Position::new(4, 0, 100, 20));
        assert_eq!(tfmd.weight(), 100);
        tfmd.reset(11);
        assert!(tfmd.positions().is_empty());
        assert_eq!(tfmd.doc_id(), 11);
        assert_eq!(tfmd.weight(), 0);
    }

    #[test]
    fn position_keys_order_by_element_then_position() {
        let early = PositionKey::new(0, 9);
        let late = PositionKey::new(1, 0);
        assert!(early < late);
        assert!(early.advanced(4) < late);
        assert_eq!(early.advanced(2), PositionKey::new(0, 11));
    }

    #[test]
    fn needs_flags_default_to_featured() {
        let mut tfmd = TermFieldMatchData::new(1);
        assert!(!tfmd.is_not_needed());
        assert!(!tfmd.needs_normal_features());
        tfmd.set_need_normal_features(true);
        assert!(tfmd.needs_normal_features());
        tfmd.set_not_needed(true);
        assert!(tfmd.is_not_needed());
    }
}
