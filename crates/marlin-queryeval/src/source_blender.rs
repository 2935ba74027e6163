//! The source blender.
//!
//! A selector maps every document to a source id, and each child serves
//! exactly one source. The blender delivers a hit for a document only
//! when the child registered for that document's source matches it.
//! Selector identity (pointer equality) decides whether two blenders
//! are compatible for the hoisting optimization on the blueprint side.

use std::rc::Rc;

use marlin_types::{DocId, Trinary, END_DOC_ID};

use crate::empty_search::EmptySearch;
use crate::search_iterator::{IteratorState, SearchIterator, SearchIteratorBox};

/// Maps documents to source ids.
pub trait SourceSelector: std::fmt::Debug {
    fn source_at(&self, doc_id: DocId) -> u32;
}

/// Shared selector handle; compatibility is pointer identity.
pub type SharedSourceSelector = Rc<dyn SourceSelector>;

/// Whether two selector handles denote the same selector instance.
#[must_use]
pub fn same_selector(a: &SharedSourceSelector, b: &SharedSourceSelector) -> bool {
    Rc::ptr_eq(a, b)
}

/// Simple selector backed by a per-document array with a default for
/// documents past the end.
#[derive(Debug)]
pub struct FixedSourceSelector {
    sources: Vec<u32>,
    default_source: u32,
}

impl FixedSourceSelector {
    #[must_use]
    pub fn new(default_source: u32) -> Self {
        Self {
            sources: Vec::new(),
            default_source,
        }
    }

    pub fn set_source(&mut self, doc_id: DocId, source: u32) {
        let idx = doc_id as usize;
        if idx >= self.sources.len() {
            self.sources.resize(idx + 1, self.default_source);
        }
        self.sources[idx] = source;
    }
}

impl SourceSelector for FixedSourceSelector {
    fn source_at(&self, doc_id: DocId) -> u32 {
        self.sources
            .get(doc_id as usize)
            .copied()
            .unwrap_or(self.default_source)
    }
}

/// A child iterator with the source id it serves.
#[derive(Debug)]
pub struct SourceBlenderChild {
    pub search: SearchIteratorBox,
    pub source_id: u32,
}

/// Build a source blender over `children`, routing by `selector`.
#[must_use]
pub fn create(
    selector: SharedSourceSelector,
    children: Vec<SourceBlenderChild>,
    strict: bool,
) -> SearchIteratorBox {
    Box::new(SourceBlenderSearch {
        state: IteratorState::default(),
        selector,
        children,
        strict,
    })
}

#[derive(Debug)]
pub struct SourceBlenderSearch {
    state: IteratorState,
    selector: SharedSourceSelector,
    children: Vec<SourceBlenderChild>,
    strict: bool,
}

impl SourceBlenderSearch {
    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Detach the child iterator at `index` (used by the bit-vector
    /// fusion pass to rewrite per-source subtrees in place).
    pub fn take_child_search(&mut self, index: usize) -> SearchIteratorBox {
        std::mem::replace(
            &mut self.children[index].search,
            Box::new(EmptySearch::new()),
        )
    }

    pub fn put_child_search(&mut self, index: usize, search: SearchIteratorBox) {
        self.children[index].search = search;
    }

    fn child_for_source(&mut self, source: u32) -> Option<&mut SourceBlenderChild> {
        self.children
            .iter_mut()
            .find(|child| child.source_id == source)
    }

    fn strict_seek(&mut self, doc_id: DocId) {
        for child in &mut self.children {
            child.search.seek(doc_id);
        }
        loop {
            let candidate = self
                .children
                .iter()
                .map(|child| child.search.doc_id())
                .min()
                .unwrap_or(END_DOC_ID);
            if self.state.is_past_end(candidate) {
                self.state.set_at_end();
                return;
            }
            let wanted = self.selector.source_at(candidate);
            let owner_matches = self
                .children
                .iter()
                .any(|child| child.source_id == wanted && child.search.doc_id() == candidate);
            if owner_matches {
                self.state.set_doc_id(candidate);
                return;
            }
            // candidate belongs to another source; everyone parked on it
            // moves past
            for child in &mut self.children {
                if child.search.doc_id() == candidate {
                    child.search.seek(candidate + 1);
                }
            }
        }
    }
}

impl SearchIterator for SourceBlenderSearch {
    fn state(&self) -> &IteratorState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut IteratorState {
        &mut self.state
    }

    fn init_range(&mut self, begin_id: DocId, end_id: DocId) {
        self.state = IteratorState::for_range(begin_id, end_id);
        for child in &mut self.children {
            child.search.init_range(begin_id, end_id);
        }
        if self.strict {
            self.strict_seek(begin_id);
        }
    }

    fn do_seek(&mut self, doc_id: DocId) {
        if self.strict {
            self.strict_seek(doc_id);
            return;
        }
        let wanted = self.selector.source_at(doc_id);
        if let Some(child) = self.child_for_source(wanted) {
            if child.search.seek(doc_id) {
                self.state.set_doc_id(doc_id);
            }
        }
    }

    fn do_unpack(&mut self, doc_id: DocId) {
        let wanted = self.selector.source_at(doc_id);
        if let Some(child) = self.child_for_source(wanted) {
            if child.search.doc_id() == doc_id {
                child.search.do_unpack(doc_id);
            }
        }
    }

    fn is_strict(&self) -> Trinary {
        Trinary::from_bool(self.strict)
    }

    fn as_source_blender(&mut self) -> Option<&mut SourceBlenderSearch> {
        Some(self)
    }

    fn name(&self) -> &'static str {
        "SourceBlenderSearch"
    }
}
