use std::collections::BTreeSet;

use bigdecimal::BigDecimal;
use proptest::prelude::*;
use statgraph_term::{unify, ClosedTerm, Kind, Term, Theta, Variable};

const MAX_NAMES: u8 = 3;

// Variable names carry their kind ("i" items, "p" properties, "v" values) so
// generated terms never hold same-named variables of unrelated kinds.

fn item_term(open: bool) -> BoxedStrategy<Term> {
    let ground = (0..MAX_NAMES)
        .prop_map(|i| Term::from(ClosedTerm::item(format!("http://www.wikidata.org/entity/Q{i}"))));
    if open {
        prop_oneof![
            ground,
            (0..MAX_NAMES).prop_map(|i| Term::from(Variable::new(format!("i{i}"), Kind::Item))),
        ]
        .boxed()
    } else {
        ground.boxed()
    }
}

fn property_term(open: bool) -> BoxedStrategy<Term> {
    let ground = (0..MAX_NAMES)
        .prop_map(|i| Term::from(ClosedTerm::property(format!("http://www.wikidata.org/entity/P{i}"))));
    if open {
        prop_oneof![
            ground,
            (0..MAX_NAMES).prop_map(|i| Term::from(Variable::new(format!("p{i}"), Kind::Property))),
        ]
        .boxed()
    } else {
        ground.boxed()
    }
}

fn value_term(open: bool) -> BoxedStrategy<Term> {
    let quantity = (0i64..3).prop_map(|n| Term::from(ClosedTerm::quantity(BigDecimal::from(n))));
    if open {
        prop_oneof![
            item_term(true),
            quantity,
            (0..MAX_NAMES).prop_map(|i| Term::from(Variable::new(format!("v{i}"), Kind::Value))),
        ]
        .boxed()
    } else {
        prop_oneof![item_term(false), quantity].boxed()
    }
}

fn statement_term(open: bool) -> impl Strategy<Value = Term> {
    (item_term(open), property_term(open), value_term(open), any::<bool>()).prop_map(
        |(subject, property, value, some_value)| {
            let snak = if some_value {
                Term::some_value_snak(property)
            } else {
                Term::value_snak(property, value)
            }
            .expect("generated snak is well-kinded");
            Term::statement(subject, snak).expect("generated statement is well-kinded")
        },
    )
}

// Mixed terms draw names from one small pool at related kinds, so the same
// name turns up as `Term`, `Entity`, `Item`, ... across equations.

fn mixed_variable() -> impl Strategy<Value = Variable> {
    let names = prop::sample::select(vec!["a", "b", "c"]);
    let kinds = prop::sample::select(vec![
        Kind::Term,
        Kind::Value,
        Kind::Entity,
        Kind::Item,
        Kind::Property,
        Kind::Quantity,
    ]);
    (names, kinds).prop_map(|(name, kind)| Variable::new(name, kind))
}

fn mixed_leaf() -> BoxedStrategy<Term> {
    prop_oneof![
        mixed_variable().prop_map(Term::from),
        (0..MAX_NAMES)
            .prop_map(|i| Term::from(ClosedTerm::item(format!("http://www.wikidata.org/entity/Q{i}")))),
        (0i64..2).prop_map(|n| Term::from(ClosedTerm::quantity(BigDecimal::from(n)))),
    ]
    .boxed()
}

fn mixed_term() -> BoxedStrategy<Term> {
    let snak = (mixed_variable(), mixed_leaf()).prop_filter_map(
        "property slot and value must agree on shared names",
        |(property, value)| Term::value_snak(property, value).ok(),
    );
    prop_oneof![mixed_leaf(), snak].boxed()
}

fn arbitrary_theta() -> impl Strategy<Value = Theta> {
    prop::collection::vec((0..MAX_NAMES, item_term(false), any::<bool>()), 0..4).prop_map(
        |bindings| {
            bindings
                .into_iter()
                .map(|(i, item, absent)| {
                    let v = Variable::new(format!("i{i}"), Kind::Item);
                    (v, (!absent).then_some(item))
                })
                .collect()
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn unification_succeeds_in_either_order(
        a in statement_term(true),
        b in statement_term(true),
    ) {
        let forward = unify([(a.clone(), b.clone())]);
        let backward = unify([(b.clone(), a.clone())]);
        prop_assert_eq!(forward.is_some(), backward.is_some());
        for theta in forward.iter().chain(backward.iter()) {
            prop_assert_eq!(a.instantiate(theta).unwrap(), b.instantiate(theta).unwrap());
        }
    }

    #[test]
    fn unifiers_equate_both_sides(
        equations in prop::collection::vec((mixed_term(), mixed_term()), 1..4),
    ) {
        if let Some(theta) = unify(equations.clone()) {
            for (s, t) in &equations {
                prop_assert_eq!(s.instantiate(&theta).unwrap(), t.instantiate(&theta).unwrap());
            }
        }
    }

    #[test]
    fn unifiers_are_idempotent(
        equations in prop::collection::vec((mixed_term(), mixed_term()), 1..4),
    ) {
        if let Some(theta) = unify(equations) {
            for (_, value) in theta.iter() {
                if let Some(value) = value {
                    prop_assert_eq!(value.instantiate(&theta).unwrap(), Some(value.clone()));
                }
            }
        }
    }

    #[test]
    fn a_term_unifies_with_itself_trivially(t in statement_term(true)) {
        prop_assert_eq!(unify([(t.clone(), t)]), Some(Theta::new()));
    }

    #[test]
    fn matching_against_a_ground_statement_reproduces_it(
        pattern in statement_term(true),
        ground in statement_term(false),
    ) {
        if let Some(theta) = pattern.match_with(&ground) {
            prop_assert_eq!(pattern.instantiate(&theta).unwrap(), Some(ground));
        }
    }

    #[test]
    fn instantiating_a_ground_term_is_the_identity(
        ground in statement_term(false),
        theta in arbitrary_theta(),
    ) {
        prop_assert_eq!(ground.instantiate(&theta).unwrap(), Some(ground.clone()));
    }

    #[test]
    fn renaming_yields_fresh_consistent_variables(
        t in statement_term(true),
        excluded in prop::collection::btree_set("[ipv][0-3]", 0..6),
    ) {
        let renamed = t.rename(&excluded);
        let names = renamed.variable_names();
        prop_assert!(names.is_disjoint(&excluded));
        prop_assert_eq!(names.len(), t.variable_names().len());
        prop_assert!(renamed.match_with(&t).is_some());
    }

    #[test]
    fn generalization_still_matches_its_source(t in statement_term(false)) {
        let general = t.generalize(&BTreeSet::new(), "g");
        let theta = general.match_with(&t);
        prop_assert!(theta.is_some());
    }
}
