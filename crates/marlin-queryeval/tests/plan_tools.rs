//! Plan dumps, global-filter plumbing, and the termwise hoist seen
//! through the public blueprint API.

use std::cell::RefCell;
use std::rc::Rc;

use marlin_bitvec::BitVector;
use marlin_queryeval::blueprint::{plan_string, plan_value, Blueprint, FilterConstraint};
use marlin_queryeval::fake::{FakeBlueprint, FakeResult};
use marlin_queryeval::global_filter::GlobalFilter;
use marlin_queryeval::leaf_blueprints::EmptyBlueprint;
use marlin_queryeval::{IntermediateBlueprint, SearchIterator};
use marlin_types::{DocId, FieldSpec, MatchDataLayout, SharedMatchData};

fn fake_term(field_id: u32, handle: u32, docs: &[DocId]) -> Box<dyn Blueprint> {
    let mut result = FakeResult::new();
    for &doc in docs {
        result = result.doc(doc).elem(0).pos(0);
    }
    Box::new(FakeBlueprint::new(
        FieldSpec::new("f", field_id, handle, false),
        result,
    ))
}

#[test]
fn plan_dump_includes_structure() {
    let mut and = IntermediateBlueprint::and();
    and.add_child(fake_term(0, 0, &[1, 2]));
    and.add_child(fake_term(0, 1, &[2, 3]));
    and.set_docid_limit(50);
    let dump = plan_value(&and);
    assert_eq!(dump["class"], "AndBlueprint");
    assert_eq!(dump["children"][0]["class"], "FakeBlueprint");
    assert_eq!(dump["estimate"]["est_hits"], 2);
    assert_eq!(dump["docid_limit"], 50);
    let printed = plan_string(&and);
    assert!(printed.contains("AndBlueprint"));
    assert!(printed.contains("est_hits"));
}

#[test]
fn termwise_hoist_wraps_unranked_children() {
    let mut layout = MatchDataLayout::new();
    let a = layout.alloc_term_field(0);
    let b = layout.alloc_term_field(0);
    let md: SharedMatchData = layout.create_shared_match_data();
    // ranking does not read these rows, and the query asks for
    // termwise evaluation aggressively
    md.borrow_mut().term_field_mut(a).set_not_needed(true);
    md.borrow_mut().term_field_mut(b).set_not_needed(true);
    md.borrow_mut().set_termwise_limit(0.0);

    let mut and = IntermediateBlueprint::and();
    and.add_child(fake_term(0, a, &[1, 2, 4]));
    and.add_child(fake_term(0, b, &[2, 4, 9]));
    and.set_docid_limit(20);

    let mut it = and.create_search(&md, true);
    assert_eq!(it.name(), "TermwiseSearch");
    it.init_range(1, 20);
    let mut hits = Vec::new();
    let mut doc = 1;
    while doc < 20 {
        if it.seek(doc) {
            hits.push(doc);
        }
        doc = (doc + 1).max(it.doc_id());
    }
    assert_eq!(hits, vec![2, 4]);
}

#[test]
fn termwise_hoist_skips_ranked_children() {
    let mut layout = MatchDataLayout::new();
    let a = layout.alloc_term_field(0);
    let b = layout.alloc_term_field(0);
    let md: SharedMatchData = layout.create_shared_match_data();
    md.borrow_mut().set_termwise_limit(0.0);
    // rows stay needed: no hoisting allowed

    let mut and = IntermediateBlueprint::and();
    and.add_child(fake_term(0, a, &[1, 2, 4]));
    and.add_child(fake_term(0, b, &[2, 4, 9]));
    and.set_docid_limit(20);

    let it = and.create_search(&md, true);
    assert_eq!(it.name(), "AndSearchStrict");
}

/// Leaf standing in for an approximate-NN term: it requests the global
/// filter and records what it receives.
#[derive(Debug)]
struct FilterProbe {
    core: EmptyBlueprint,
    wants: bool,
    received: Rc<RefCell<Option<u32>>>,
}

impl Blueprint for FilterProbe {
    fn state(&self) -> marlin_queryeval::State {
        let mut state = self.core.state();
        state.set_estimate(marlin_queryeval::HitEstimate::new(1, false));
        state.set_want_global_filter(self.wants);
        state
    }

    fn docid_limit(&self) -> DocId {
        self.core.docid_limit()
    }

    fn set_docid_limit(&mut self, limit: DocId) {
        self.core.set_docid_limit(limit);
    }

    fn source_id(&self) -> u32 {
        self.core.source_id()
    }

    fn set_source_id(&mut self, source_id: u32) {
        self.core.set_source_id(source_id);
    }

    fn set_global_filter(&mut self, filter: &GlobalFilter, _estimated_hit_ratio: f64) {
        let count = filter.bits().map_or(0, |bits| bits.count_bits());
        *self.received.borrow_mut() = Some(count);
    }

    fn create_search(
        &self,
        _match_data: &SharedMatchData,
        _strict: bool,
    ) -> marlin_queryeval::SearchIteratorBox {
        Box::new(marlin_queryeval::empty_search::EmptySearch::new())
    }

    fn create_filter_search(
        &self,
        _strict: bool,
        _constraint: FilterConstraint,
    ) -> marlin_queryeval::SearchIteratorBox {
        Box::new(marlin_queryeval::empty_search::EmptySearch::new())
    }

    fn class_name(&self) -> &'static str {
        "FilterProbe"
    }
}

#[test]
fn global_filter_reaches_requesting_leaves_only() {
    let wanted = Rc::new(RefCell::new(None));
    let unwanted = Rc::new(RefCell::new(None));
    let mut and = IntermediateBlueprint::and();
    and.add_child(Box::new(FilterProbe {
        core: EmptyBlueprint::new(),
        wants: true,
        received: wanted.clone(),
    }));
    and.add_child(Box::new(FilterProbe {
        core: EmptyBlueprint::new(),
        wants: false,
        received: unwanted.clone(),
    }));

    assert!(and.state().want_global_filter());
    let filter = GlobalFilter::from_bits(Rc::new(BitVector::from_bits(1, 10, &[2, 5])));
    let mut tree: Box<dyn Blueprint> = Box::new(and);
    tree.set_global_filter(&filter, 0.5);
    assert_eq!(*wanted.borrow(), Some(2));
    assert_eq!(*unwanted.borrow(), None);
}
