//! The NEAR and ONEAR positional operators.
//!
//! Both first require every child to match the document (AND
//! semantics), then check term occurrences: NEAR accepts any window of
//! size `window` covering one occurrence per term within the same field
//! and element; ONEAR additionally requires the occurrences to appear
//! in child order, left to right. Occurrence data is read from the
//! shared match data after unpacking the children, one matcher per
//! searched field.

use marlin_types::{DocId, MatchData, PositionKey, SharedMatchData, TermFieldHandle, Trinary};
use tracing::trace;

use crate::multi_search::{init_children, MultiKind, MultiSearch};
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};

/// Build a NEAR iterator (unordered window match).
#[must_use]
pub fn create_near(
    children: Vec<SearchIteratorBox>,
    handles: Vec<TermFieldHandle>,
    match_data: SharedMatchData,
    window: u32,
    strict: bool,
) -> SearchIteratorBox {
    NearSearch::boxed(children, handles, match_data, window, strict, false)
}

/// Build an ONEAR iterator (ordered window match).
#[must_use]
pub fn create_onear(
    children: Vec<SearchIteratorBox>,
    handles: Vec<TermFieldHandle>,
    match_data: SharedMatchData,
    window: u32,
    strict: bool,
) -> SearchIteratorBox {
    NearSearch::boxed(children, handles, match_data, window, strict, true)
}

/// Per-field matcher: the subset of scratch rows bound to one field.
#[derive(Debug)]
struct Matcher {
    window: u32,
    handles: Vec<TermFieldHandle>,
}

impl Matcher {
    /// Unordered window check over this field's occurrences.
    fn match_unordered(&self, md: &MatchData, doc_id: DocId) -> bool {
        let mut cursors: Vec<(&[marlin_types::Position], usize)> =
            Vec::with_capacity(self.handles.len());
        let mut max_occ = PositionKey::new(0, 0);
        for &handle in &self.handles {
            let row = md.term_field(handle);
            if row.doc_id() != doc_id || row.positions().is_empty() {
                return false;
            }
            let first = row.positions()[0].key();
            if cursors.is_empty() || max_occ < first {
                max_occ = first;
            }
            cursors.push((row.positions(), 0));
        }
        loop {
            let front = cursors
                .iter()
                .enumerate()
                .min_by_key(|&(_, &(positions, cur))| positions[cur].key())
                .map(|(i, _)| i)
                .unwrap_or(0);
            let (positions, cur) = cursors[front];
            let last_allowed = positions[cur].key().advanced(self.window);
            if !(last_allowed < max_occ) {
                return true;
            }
            // advance the lagging term until its window reaches max_occ
            loop {
                let (positions, cur) = &mut cursors[front];
                *cur += 1;
                if *cur == positions.len() {
                    return false;
                }
                let last_allowed = positions[*cur].key().advanced(self.window);
                if !(last_allowed < max_occ) {
                    break;
                }
            }
            let (positions, cur) = cursors[front];
            let key = positions[cur].key();
            if max_occ < key {
                max_occ = key;
            }
        }
    }

    /// Ordered window check: each term's occurrence must follow the
    /// previous term's within the window.
    fn match_ordered(&self, md: &MatchData, doc_id: DocId) -> bool {
        let num_terms = self.handles.len();
        let mut positions: Vec<&[marlin_types::Position]> = Vec::with_capacity(num_terms);
        for &handle in &self.handles {
            let row = md.term_field(handle);
            if row.doc_id() != doc_id || row.positions().is_empty() {
                return false;
            }
            positions.push(row.positions());
        }
        if num_terms < 2 {
            return true;
        }
        let mut cursors = vec![0usize; num_terms];
        let mut cur_term_pos = PositionKey::new(0, 0);
        for first in positions[0] {
            let first_key = first.key();
            let last_allowed = first_key.advanced(self.window);
            if last_allowed < cur_term_pos {
                // a later term already forced the window past this spot
                continue;
            }
            let mut prev_term_pos = first_key;
            trace!(
                from = first_key.position(),
                to = last_allowed.position(),
                "looking for ordered match in window"
            );
            for i in 1..num_terms {
                while cursors[i] < positions[i].len()
                    && !(prev_term_pos < positions[i][cursors[i]].key())
                {
                    cursors[i] += 1;
                }
                if cursors[i] == positions[i].len() {
                    return false;
                }
                cur_term_pos = positions[i][cursors[i]].key();
                if last_allowed < cur_term_pos {
                    break; // outside window
                }
                if i + 1 == num_terms {
                    return true;
                }
                prev_term_pos = cur_term_pos;
            }
        }
        false
    }
}

#[derive(Debug)]
pub struct NearSearch {
    state: IteratorState,
    children: Vec<SearchIteratorBox>,
    strict: bool,
    ordered: bool,
    match_data: SharedMatchData,
    matchers: Vec<Matcher>,
}

impl NearSearch {
    fn boxed(
        children: Vec<SearchIteratorBox>,
        handles: Vec<TermFieldHandle>,
        match_data: SharedMatchData,
        window: u32,
        strict: bool,
        ordered: bool,
    ) -> SearchIteratorBox {
        let matchers = Self::setup_fields(window, &handles, &match_data);
        Box::new(Self {
            state: IteratorState::default(),
            children,
            strict,
            ordered,
            match_data,
            matchers,
        })
    }

    /// One matcher per distinct field, each holding the rows of every
    /// term bound to that field.
    fn setup_fields(
        window: u32,
        handles: &[TermFieldHandle],
        match_data: &SharedMatchData,
    ) -> Vec<Matcher> {
        let md = match_data.borrow();
        let mut field_ids: Vec<u32> = handles
            .iter()
            .map(|&handle| md.term_field(handle).field_id())
            .collect();
        field_ids.sort_unstable();
        field_ids.dedup();
        field_ids
            .into_iter()
            .map(|field_id| Matcher {
                window,
                handles: handles
                    .iter()
                    .copied()
                    .filter(|&handle| md.term_field(handle).field_id() == field_id)
                    .collect(),
            })
            .collect()
    }

    /// Check the positional constraint at `doc_id`. All children are
    /// positioned there; unpack them and consult the per-field
    /// matchers.
    fn match_doc(&mut self, doc_id: DocId) -> bool {
        for child in &mut self.children {
            child.do_unpack(doc_id);
        }
        let md = self.match_data.borrow();
        self.matchers.iter().any(|matcher| {
            if self.ordered {
                matcher.match_ordered(&md, doc_id)
            } else {
                matcher.match_unordered(&md, doc_id)
            }
        })
    }

    /// Seek the next document where all terms occur and the window
    /// constraint holds.
    fn seek_next(&mut self, _doc_id: DocId) {
        let mut next_id = self.children[0].doc_id();
        while !self.state.is_past_end(next_id) {
            let mut found_hit = true;
            for i in 1..self.children.len() {
                if !self.children[i].seek(next_id) {
                    found_hit = false;
                    let child_doc = self.children[i].doc_id();
                    if child_doc > next_id {
                        next_id = child_doc;
                    } else {
                        next_id += 1;
                    }
                    break;
                }
            }
            if found_hit {
                if self.match_doc(next_id) {
                    break;
                }
                next_id += 1;
            }
            if !self.state.is_past_end(next_id) {
                self.children[0].seek(next_id);
                next_id = self.children[0].doc_id();
            }
        }
        if self.state.is_past_end(next_id) {
            self.state.set_at_end();
        } else {
            self.state.set_doc_id(next_id);
        }
    }
}

impl SearchIterator for NearSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        init_children(&mut self.children, begin_id, end_id);
    }

    fn do_seek(&mut self, doc_id: DocId) {
        if self.children.is_empty() {
            // a window over no terms holds nowhere
            self.state.set_at_end();
            return;
        }
        let mut found_hit = true;
        for child in &mut self.children {
            if !child.seek(doc_id) {
                found_hit = false;
                break;
            }
        }
        if found_hit && self.match_doc(doc_id) {
            self.state.set_doc_id(doc_id);
        } else if self.strict {
            self.seek_next(doc_id);
        }
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        for child in &mut self.children {
            child.do_unpack(doc_id);
        }
    }

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn as_multi(&mut self) -> Option<&mut dyn MultiSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        if self.ordered {
            "ONearSearch"
        } else {
            "NearSearch"
        }
    }
}

impl MultiSearch for NearSearch {
    fn children(&self) -> &[SearchIteratorBox] {
        &self.children
    }

    fn children_mut(&mut self) -> &mut Vec<SearchIteratorBox> {
        &mut self.children
    }

    fn multi_kind(&self) -> MultiKind {
        MultiKind::And
    }
}
