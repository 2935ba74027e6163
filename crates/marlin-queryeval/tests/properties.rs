//! Property tests for the quantified invariants: set semantics of the
//! operators, strictly ascending hit streams, and equivalence of the
//! rewritten forms (termwise wrapping, bit-vector fusion) with their
//! plain counterparts.

use std::collections::BTreeSet;
use std::rc::Rc;

use proptest::prelude::*;

use marlin_bitvec::BitVector;
use marlin_queryeval::bit_vector_iterator;
use marlin_queryeval::blueprint::Blueprint;
use marlin_queryeval::leaf_blueprints::SimpleBlueprint;
use marlin_queryeval::multi_bit_vector_iterator;
use marlin_queryeval::simple_result::SimpleResult;
use marlin_queryeval::termwise::make_termwise;
use marlin_queryeval::{
    and_not_search, and_search, optimize, or_search, SearchIterator, SearchIteratorBox,
};
use marlin_types::{DocId, MatchDataLayout};

const LIMIT: DocId = 300;

fn doc_set() -> impl Strategy<Value = BTreeSet<DocId>> {
    prop::collection::btree_set(1u32..LIMIT, 0..40)
}

fn simple_iter(docs: &BTreeSet<DocId>, strict: bool) -> SearchIteratorBox {
    marlin_queryeval::simple_result::create_search(
        SimpleResult::from_hits(docs.iter().copied().collect()),
        strict,
    )
}

fn bv_iter(docs: &BTreeSet<DocId>, strict: bool) -> SearchIteratorBox {
    bit_vector_iterator::create(
        Rc::new(BitVector::from_bits(
            1,
            LIMIT,
            &docs.iter().copied().collect::<Vec<_>>(),
        )),
        LIMIT,
        None,
        strict,
        false,
    )
}

fn drive(it: &mut SearchIteratorBox) -> Vec<DocId> {
    it.init_range(1, LIMIT);
    let mut hits = Vec::new();
    let mut doc = 1;
    while doc < LIMIT {
        if it.seek(doc) {
            hits.push(doc);
        }
        doc = (doc + 1).max(it.doc_id());
    }
    hits
}

fn ascending(hits: &[DocId]) -> bool {
    hits.windows(2).all(|pair| pair[0] < pair[1])
}

proptest! {
    /// Invariants 1, 3: AND evaluates to the set intersection and its
    /// hit stream is strictly ascending.
    #[test]
    fn and_is_intersection(a in doc_set(), b in doc_set(), c in doc_set()) {
        let mut it = and_search::create_full_unpack(
            vec![simple_iter(&a, true), simple_iter(&b, false), simple_iter(&c, false)],
            true,
        );
        let hits = drive(&mut it);
        let expected: Vec<DocId> = a
            .intersection(&b)
            .copied()
            .collect::<BTreeSet<_>>()
            .intersection(&c)
            .copied()
            .collect();
        prop_assert!(ascending(&hits));
        prop_assert_eq!(hits, expected);
    }

    /// Invariant 4: OR evaluates to the set union.
    #[test]
    fn or_is_union(a in doc_set(), b in doc_set(), c in doc_set()) {
        let mut it = or_search::create_full_unpack(
            vec![simple_iter(&a, true), simple_iter(&b, true), simple_iter(&c, true)],
            true,
        );
        let hits = drive(&mut it);
        let expected: Vec<DocId> = a.union(&b).copied().collect::<BTreeSet<_>>()
            .union(&c).copied().collect();
        prop_assert!(ascending(&hits));
        prop_assert_eq!(hits, expected);
    }

    /// Invariant 5: AND-NOT evaluates to the set difference.
    #[test]
    fn andnot_is_difference(a in doc_set(), b in doc_set(), c in doc_set()) {
        let mut it = and_not_search::create(
            vec![simple_iter(&a, true), simple_iter(&b, false), simple_iter(&c, false)],
            true,
        );
        let hits = drive(&mut it);
        let negatives: BTreeSet<DocId> = b.union(&c).copied().collect();
        let expected: Vec<DocId> = a.difference(&negatives).copied().collect();
        prop_assert!(ascending(&hits));
        prop_assert_eq!(hits, expected);
    }

    /// Invariant 6: wrapping a subtree for termwise evaluation keeps
    /// the hit set.
    #[test]
    fn termwise_wrapping_preserves_hits(a in doc_set(), b in doc_set()) {
        let plain_hits = {
            let mut plain = or_search::create_full_unpack(
                vec![simple_iter(&a, true), simple_iter(&b, true)],
                true,
            );
            drive(&mut plain)
        };
        let wrapped_hits = {
            let or = or_search::create_full_unpack(
                vec![simple_iter(&a, true), simple_iter(&b, true)],
                true,
            );
            let mut wrapped = make_termwise(or, true);
            drive(&mut wrapped)
        };
        prop_assert_eq!(plain_hits, wrapped_hits);
    }

    /// Invariant 7: fusing bit-vector children preserves the hit set,
    /// for AND, OR and the negative side of AND-NOT.
    #[test]
    fn bit_vector_fusion_preserves_hits(
        a in doc_set(),
        b in doc_set(),
        c in doc_set(),
    ) {
        let make_and = || and_search::create_full_unpack(
            vec![bv_iter(&a, true), bv_iter(&b, false), bv_iter(&c, false)],
            true,
        );
        let make_or = || or_search::create_full_unpack(
            vec![bv_iter(&a, true), bv_iter(&b, true), bv_iter(&c, true)],
            true,
        );
        let make_andnot = || and_not_search::create(
            vec![simple_iter(&a, true), bv_iter(&b, false), bv_iter(&c, false)],
            true,
        );

        let mut plain = make_and();
        let mut fused = multi_bit_vector_iterator::optimize(make_and());
        prop_assert_eq!(drive(&mut plain), drive(&mut fused));

        let mut plain = make_or();
        let mut fused = multi_bit_vector_iterator::optimize(make_or());
        prop_assert_eq!(drive(&mut plain), drive(&mut fused));

        let mut plain = make_andnot();
        let mut fused = multi_bit_vector_iterator::optimize(make_andnot());
        prop_assert_eq!(drive(&mut plain), drive(&mut fused));
    }

    /// Invariant 8 on randomized shapes: optimizing twice yields the
    /// same structure, and the optimized plan yields the same hits.
    #[test]
    fn optimize_preserves_semantics(
        a in doc_set(),
        b in doc_set(),
        c in doc_set(),
    ) {
        use marlin_queryeval::IntermediateBlueprint;
        let build = || {
            let inner = IntermediateBlueprint::or()
                .adding(Box::new(SimpleBlueprint::new(
                    SimpleResult::from_hits(b.iter().copied().collect()),
                )) as Box<dyn Blueprint>)
                .adding(Box::new(SimpleBlueprint::new(
                    SimpleResult::from_hits(c.iter().copied().collect()),
                )));
            let mut tree = IntermediateBlueprint::and()
                .adding(Box::new(SimpleBlueprint::new(
                    SimpleResult::from_hits(a.iter().copied().collect()),
                )))
                .adding(Box::new(inner));
            tree.set_docid_limit(LIMIT);
            Box::new(tree) as Box<dyn Blueprint>
        };
        let md = MatchDataLayout::new().create_shared_match_data();

        let mut unoptimized_it = build().create_search(&md, true);
        let plain_hits = drive(&mut unoptimized_it);

        let optimized = optimize(build());
        let mut optimized_it = optimized.create_search(&md, true);
        let optimized_hits = drive(&mut optimized_it);
        prop_assert_eq!(&plain_hits, &optimized_hits);

        let dump_once = marlin_queryeval::plan_value(optimized.as_ref());
        let twice = optimize(optimized);
        let dump_twice = marlin_queryeval::plan_value(twice.as_ref());
        prop_assert_eq!(dump_once, dump_twice);
    }

    /// Invariant 2: a strict iterator terminates after finitely many
    /// advances and ends in the at-end state.
    #[test]
    fn strict_iterators_terminate(a in doc_set(), b in doc_set()) {
        let mut it = or_search::create_full_unpack(
            vec![simple_iter(&a, true), simple_iter(&b, true)],
            true,
        );
        it.init_range(1, LIMIT);
        let mut advances = 0;
        let mut doc = 1;
        while doc < LIMIT {
            it.seek(doc);
            doc = (doc + 1).max(it.doc_id());
            advances += 1;
            prop_assert!(advances <= LIMIT + 1, "too many advances");
        }
        prop_assert!(it.doc_id() >= LIMIT || it.is_at_end());
    }
}
