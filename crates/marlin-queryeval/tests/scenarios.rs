//! End-to-end query scenarios driving the full pipeline: query tree →
//! blueprints → optimize → fetch → freeze → iterators → hits.

use std::rc::Rc;

use marlin_bitvec::BitVector;
use marlin_query::Node;
use marlin_queryeval::bit_vector_iterator;
use marlin_queryeval::fake::{FakeResult, FakeSearchable};
use marlin_queryeval::multi_bit_vector_iterator;
use marlin_queryeval::or_search;
use marlin_queryeval::and_not_search;
use marlin_queryeval::{
    optimize, BlueprintBuilder, ExecuteInfo, RequestContext, SearchIterator, SearchIteratorBox,
};
use marlin_types::{DocId, FieldSpec, FieldSpecList, SharedMatchData};

fn collect_hits(it: &mut SearchIteratorBox, begin: DocId, end: DocId) -> Vec<DocId> {
    it.init_range(begin, end);
    let mut hits = Vec::new();
    let mut doc = begin;
    while doc < end {
        if it.seek(doc) {
            hits.push(doc);
            it.unpack(doc);
        }
        doc = (doc + 1).max(it.doc_id());
    }
    hits
}

struct Fixture {
    searchable: FakeSearchable,
    fields: FieldSpecList,
}

impl Fixture {
    fn new() -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        Self {
            searchable: FakeSearchable::new(),
            fields: FieldSpecList::new(),
        }
    }

    fn field(&mut self, name: &str, field_id: u32) -> &mut Self {
        // handle is a template slot; the builder allocates per term
        self.fields.add(FieldSpec::new(name, field_id, 0, false));
        self
    }

    fn result(&mut self, field: &str, term: &str, result: FakeResult) -> &mut Self {
        self.searchable.add_result(field, term, result);
        self
    }

    fn run(&self, tree: &Node, docid_limit: DocId) -> (Vec<DocId>, SharedMatchData) {
        let ctx = RequestContext::default();
        let builder = BlueprintBuilder::new(&self.searchable, &ctx);
        let mut blueprint = builder.build(&self.fields, tree).expect("plan builds");
        blueprint.set_docid_limit(docid_limit);
        let mut blueprint = optimize(blueprint);
        blueprint.fetch_postings(&ExecuteInfo::full(true));
        blueprint.freeze();
        let md = builder.create_shared_match_data();
        let mut it = blueprint.create_search(&md, true);
        (collect_hits(&mut it, 1, docid_limit), md)
    }
}

fn posting(docs: &[DocId]) -> FakeResult {
    let mut result = FakeResult::new();
    for &doc in docs {
        result = result.doc(doc).elem(0).pos(0);
    }
    result
}

fn positioned(entries: &[(DocId, &[u32])]) -> FakeResult {
    let mut result = FakeResult::new();
    for &(doc, positions) in entries {
        result = result.doc(doc).elem(0).weight(10).len(50);
        for &pos in positions {
            result = result.pos(pos);
        }
    }
    result
}

/// S5: AND of three strict posting iterators.
#[test]
fn and_intersects_three_posting_lists() {
    let mut fx = Fixture::new();
    fx.field("f", 0)
        .result("f", "a", posting(&[1, 3, 5, 7]))
        .result("f", "b", posting(&[3, 5, 9]))
        .result("f", "c", posting(&[3, 5, 11]));
    let tree = Node::And(vec![Node::term("a"), Node::term("b"), Node::term("c")]);
    let (hits, _) = fx.run(&tree, 100);
    assert_eq!(hits, vec![3, 5]);
}

#[test]
fn or_unions_posting_lists() {
    let mut fx = Fixture::new();
    fx.field("f", 0)
        .result("f", "a", posting(&[1, 4, 7]))
        .result("f", "b", posting(&[2, 4, 9]));
    let tree = Node::Or(vec![Node::term("a"), Node::term("b")]);
    let (hits, _) = fx.run(&tree, 100);
    assert_eq!(hits, vec![1, 2, 4, 7, 9]);
}

#[test]
fn andnot_subtracts_negatives() {
    let mut fx = Fixture::new();
    fx.field("f", 0)
        .result("f", "a", posting(&[1, 2, 3, 4, 5]))
        .result("f", "b", posting(&[2, 4]));
    let tree = Node::AndNot(vec![Node::term("a"), Node::term("b")]);
    let (hits, _) = fx.run(&tree, 100);
    assert_eq!(hits, vec![1, 3, 5]);
}

/// S2: three terms at positions (0, 2, 4), window 4.
#[test]
fn near_and_onear_match_within_window() {
    for ordered in [false, true] {
        let mut fx = Fixture::new();
        fx.field("f", 0)
            .result("f", "a", positioned(&[(11, &[0])]))
            .result("f", "b", positioned(&[(11, &[2])]))
            .result("f", "c", positioned(&[(11, &[4])]));
        let children = vec![Node::term("a"), Node::term("b"), Node::term("c")];
        let tree = if ordered {
            Node::ONear {
                window: 4,
                children,
            }
        } else {
            Node::Near {
                window: 4,
                children,
            }
        };
        let (hits, _) = fx.run(&tree, 100);
        assert_eq!(hits, vec![11], "ordered={ordered}");
    }
}

/// S3: (0, 2, 5) exceeds window 4 for both; an extra first-term
/// occurrence at 2 rescues NEAR but not ONEAR ordering constraints.
#[test]
fn near_window_violation_and_recovery() {
    for ordered in [false, true] {
        let mut fx = Fixture::new();
        fx.field("f", 0)
            .result("f", "a", positioned(&[(11, &[0])]))
            .result("f", "b", positioned(&[(11, &[2])]))
            .result("f", "c", positioned(&[(11, &[5])]));
        let children = vec![Node::term("a"), Node::term("b"), Node::term("c")];
        let tree = if ordered {
            Node::ONear {
                window: 4,
                children,
            }
        } else {
            Node::Near {
                window: 4,
                children,
            }
        };
        let (hits, _) = fx.run(&tree, 100);
        assert!(hits.is_empty(), "ordered={ordered}");
    }

    // recovery: first term also occurs at 2, second at 3
    let mut fx = Fixture::new();
    fx.field("f", 0)
        .result("f", "a", positioned(&[(11, &[0, 2])]))
        .result("f", "b", positioned(&[(11, &[3])]))
        .result("f", "c", positioned(&[(11, &[5])]));
    let tree = Node::Near {
        window: 4,
        children: vec![Node::term("a"), Node::term("b"), Node::term("c")],
    };
    let (hits, _) = fx.run(&tree, 100);
    assert_eq!(hits, vec![11]);
}

/// S4: order (2, 0, 4) — NEAR accepts, ONEAR rejects.
#[test]
fn order_matters_only_for_onear() {
    for (ordered, expect_hit) in [(false, true), (true, false)] {
        let mut fx = Fixture::new();
        fx.field("f", 0)
            .result("f", "a", positioned(&[(11, &[2])]))
            .result("f", "b", positioned(&[(11, &[0])]))
            .result("f", "c", positioned(&[(11, &[4])]));
        let children = vec![Node::term("a"), Node::term("b"), Node::term("c")];
        let tree = if ordered {
            Node::ONear {
                window: 4,
                children,
            }
        } else {
            Node::Near {
                window: 4,
                children,
            }
        };
        let (hits, _) = fx.run(&tree, 100);
        assert_eq!(!hits.is_empty(), expect_hit, "ordered={ordered}");
    }
}

/// S1: an empty NEAR plan collapses to nothing.
#[test]
fn empty_near_matches_nothing() {
    let mut fx = Fixture::new();
    fx.field("f", 0);
    let tree = Node::Near {
        window: 4,
        children: vec![],
    };
    let (hits, _) = fx.run(&tree, 100);
    assert!(hits.is_empty());
}

/// S6: fused OR over two dense bit vectors, then AND-NOT with a
/// bit-vector negative over the same OR.
#[test]
fn fused_bit_vector_or_and_andnot() {
    let limit = 100;
    let or_children = || -> Vec<SearchIteratorBox> {
        vec![
            bit_vector_iterator::create(
                Rc::new(BitVector::from_bits(1, limit, &[1, 4, 7])),
                limit,
                None,
                true,
                false,
            ),
            bit_vector_iterator::create(
                Rc::new(BitVector::from_bits(1, limit, &[2, 4, 9])),
                limit,
                None,
                true,
                false,
            ),
        ]
    };

    let or = or_search::create_full_unpack(or_children(), true);
    let mut fused = multi_bit_vector_iterator::optimize(or);
    assert_eq!(fused.name(), "MultiBitVectorIterator");
    assert_eq!(collect_hits(&mut fused, 1, limit), vec![1, 2, 4, 7, 9]);

    let andnot = and_not_search::create(
        vec![
            or_search::create_full_unpack(or_children(), true),
            bit_vector_iterator::create(
                Rc::new(BitVector::from_bits(1, limit, &[4])),
                limit,
                None,
                false,
                false,
            ),
        ],
        true,
    );
    let mut optimized = multi_bit_vector_iterator::optimize(andnot);
    assert_eq!(collect_hits(&mut optimized, 1, limit), vec![1, 2, 7, 9]);
}

/// Weighted operators deliver scores through the shared match data.
#[test]
fn dot_product_end_to_end() {
    let mut fx = Fixture::new();
    fx.field("tags", 0)
        .result(
            "tags",
            "x",
            FakeResult::new().doc(3).elem(0).weight(2).pos(0),
        )
        .result(
            "tags",
            "y",
            FakeResult::new()
                .doc(3)
                .elem(0)
                .weight(5)
                .pos(0)
                .doc(8)
                .elem(0)
                .weight(1)
                .pos(0),
        );
    let tree = Node::DotProduct {
        children: vec![
            marlin_query::WeightedChild {
                node: Node::term("x"),
                weight: 10,
            },
            marlin_query::WeightedChild {
                node: Node::term("y"),
                weight: 100,
            },
        ],
    };
    let (hits, md) = fx.run(&tree, 100);
    assert_eq!(hits, vec![3, 8]);
    // last unpacked doc was 8: score = 100 * 1
    assert_eq!(md.borrow().term_field(0).raw_score(), 100.0);
}

#[test]
fn weak_and_keeps_strong_hits() {
    let mut fx = Fixture::new();
    fx.field("f", 0)
        .result("f", "a", posting(&[2, 4, 9]))
        .result("f", "b", posting(&[2, 7]));
    let tree = Node::WeakAnd {
        target_hits: 1,
        children: vec![
            marlin_query::WeightedChild {
                node: Node::term("a"),
                weight: 10,
            },
            marlin_query::WeightedChild {
                node: Node::term("b"),
                weight: 20,
            },
        ],
    };
    let (hits, _) = fx.run(&tree, 100);
    assert_eq!(hits, vec![2]);
}

#[test]
fn rank_contributes_data_without_restricting() {
    let mut fx = Fixture::new();
    fx.field("f", 0)
        .result("f", "a", posting(&[2, 5]))
        .result("f", "b", posting(&[5, 7]));
    let tree = Node::Rank(vec![Node::term("a"), Node::term("b")]);
    let (hits, _) = fx.run(&tree, 100);
    assert_eq!(hits, vec![2, 5]);
}
