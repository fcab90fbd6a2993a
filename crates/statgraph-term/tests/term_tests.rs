use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::Result;
use bigdecimal::BigDecimal;
use statgraph_term::{unify, ClosedTerm, Kind, Term, TermError, Theta, Variable};

const P31: &str = "http://www.wikidata.org/entity/P31";
const Q5: &str = "http://www.wikidata.org/entity/Q5";
const KG: &str = "http://www.wikidata.org/entity/Q11570";

fn var(name: &str, kind: Kind) -> Variable {
    Variable::new(name, kind)
}

fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).unwrap()
}

// =============================================================================
// Construction
// =============================================================================

#[test]
fn ground_arguments_build_a_closed_term() -> Result<()> {
    let item = Term::item(ClosedTerm::iri(Q5))?;
    assert_eq!(item, Term::Closed(ClosedTerm::item(Q5)));

    let snak = Term::value_snak(ClosedTerm::property(P31), item)?;
    assert!(snak.is_closed());
    assert_eq!(snak.kind(), Kind::ValueSnak);
    Ok(())
}

#[test]
fn closed_iris_are_promoted_into_concrete_entity_slots() -> Result<()> {
    let snak = Term::some_value_snak(ClosedTerm::iri(P31))?;
    assert_eq!(snak, Term::Closed(ClosedTerm::some_value_snak(P31)));
    Ok(())
}

#[test]
fn open_arguments_build_a_template() -> Result<()> {
    let t = Term::value_snak(var("p", Kind::Property), var("v", Kind::Value))?;
    assert!(t.as_template().is_some());
    assert_eq!(
        t.variables(),
        BTreeSet::from([var("p", Kind::Property), var("v", Kind::Value)])
    );
    Ok(())
}

#[test]
fn wide_variables_are_narrowed_to_the_slot_kind() -> Result<()> {
    let t = Term::value_snak(Variable::any("p"), Variable::any("v"))?;
    assert_eq!(
        t.variables(),
        BTreeSet::from([var("p", Kind::Property), var("v", Kind::Value)])
    );
    Ok(())
}

#[test]
fn unrelated_argument_kind_is_a_check_error() {
    let err = Term::value_snak(var("p", Kind::Quantity), var("v", Kind::Value)).unwrap_err();
    assert!(matches!(
        err,
        TermError::Check {
            expected: Kind::Property,
            position: Some(0),
            ..
        }
    ));
}

#[test]
fn arity_and_absent_required_arguments_are_rejected() {
    assert!(matches!(
        Term::construct(Kind::ValueSnak, vec![None]),
        Err(TermError::Arity { expected: 2, got: 1, .. })
    ));
    assert!(matches!(
        Term::construct(Kind::Statement, vec![Some(var("s", Kind::Entity).into()), None]),
        Err(TermError::AbsentArgument { position: 1, .. })
    ));
    assert!(matches!(
        Term::construct(Kind::Entity, vec![]),
        Err(TermError::NotConstructible(Kind::Entity))
    ));
}

#[test]
fn homonyms_are_normalized_to_the_most_specific_kind() -> Result<()> {
    let snak = Term::value_snak(ClosedTerm::property(P31), var("x", Kind::Item))?;
    let stmt = Term::statement(var("x", Kind::Entity), snak)?;
    assert_eq!(stmt.variables(), BTreeSet::from([var("x", Kind::Item)]));
    Ok(())
}

#[test]
fn homonyms_with_unrelated_kinds_are_rejected() -> Result<()> {
    let snak = Term::some_value_snak(var("v", Kind::Property))?;
    let err = Term::statement(var("v", Kind::Item), snak).unwrap_err();
    assert!(matches!(err, TermError::InconsistentVariable { ref name, .. } if name == "v"));
    Ok(())
}

// =============================================================================
// Instantiation
// =============================================================================

#[test]
fn instantiation_grounds_a_template() -> Result<()> {
    let t = Term::value_snak(var("p", Kind::Property), var("v", Kind::Value))?;
    let mut theta = Theta::new();
    theta
        .bind(var("p", Kind::Property), ClosedTerm::property(P31))
        .bind(var("v", Kind::Value), ClosedTerm::item(Q5));
    let expected = ClosedTerm::value_snak(P31, ClosedTerm::item(Q5))?;
    assert_eq!(t.instantiate(&theta)?, Some(Term::Closed(expected)));
    Ok(())
}

#[test]
fn absent_binding_deletes_an_optional_component() -> Result<()> {
    let t = Term::quantity(
        var("a", Kind::Quantity),
        Some(var("u", Kind::Item).into()),
        None,
        None,
    )?;
    let mut theta = Theta::new();
    theta
        .bind(var("a", Kind::Quantity), ClosedTerm::quantity(dec("2.5")))
        .bind_absent(var("u", Kind::Item));
    assert_eq!(
        t.instantiate(&theta)?,
        Some(Term::Closed(ClosedTerm::quantity(dec("2.5"))))
    );
    Ok(())
}

#[test]
fn absent_binding_in_a_required_slot_propagates_or_fails_when_strict() -> Result<()> {
    let t = Term::value_snak(var("p", Kind::Property), var("v", Kind::Value))?;
    let theta = Theta::singleton(var("v", Kind::Value), None);
    assert_eq!(t.instantiate(&theta)?, None);
    assert!(matches!(
        t.instantiate_with(&theta, true, true),
        Err(TermError::AbsentArgument { kind: Kind::ValueSnak, position: 1 })
    ));
    Ok(())
}

#[test]
fn binding_of_an_incompatible_kind_is_an_instantiation_error() {
    let theta = Theta::singleton(
        var("x", Kind::Item),
        Some(ClosedTerm::quantity(dec("1")).into()),
    );
    let err = Term::from(var("x", Kind::Item)).instantiate(&theta).unwrap_err();
    assert!(matches!(err, TermError::Instantiation { .. }));
}

#[test]
fn coercion_narrows_a_wider_bound_variable_only_when_enabled() -> Result<()> {
    let theta = Theta::singleton(var("x", Kind::Item), Some(var("y", Kind::Entity).into()));
    let x = Term::from(var("x", Kind::Item));
    assert_eq!(x.instantiate(&theta)?, Some(var("y", Kind::Item).into()));
    assert!(x.instantiate_with(&theta, false, false).is_err());
    Ok(())
}

// =============================================================================
// Unification
// =============================================================================

#[test]
fn unification_follows_variable_chains() -> Result<()> {
    let (x, y) = (Variable::any("x"), Variable::any("y"));
    let z = Term::from(ClosedTerm::item("z"));
    let theta = unify([
        (Term::from(x.clone()), Term::from(y.clone())),
        (Term::from(y.clone()), z.clone()),
    ])
    .expect("unifiable");
    let mut expected = Theta::new();
    expected.bind(x, z.clone()).bind(y, z);
    assert_eq!(theta, expected);
    Ok(())
}

#[test]
fn occurs_check_rejects_cyclic_bindings() -> Result<()> {
    let x = Variable::any("x");
    let t = Term::value_snak(ClosedTerm::property(P31), x.clone())?;
    assert!(unify([(Term::from(x), t)]).is_none());
    Ok(())
}

#[test]
fn variables_only_unify_with_coercible_kinds() {
    let item = Term::from(var("x", Kind::Item));
    assert!(unify([(item.clone(), Term::from(var("y", Kind::Entity)))]).is_some());
    assert!(unify([(item, Term::from(var("y", Kind::Quantity)))]).is_none());
}

#[test]
fn an_item_variable_does_not_take_a_property_template() -> Result<()> {
    let property = Term::property(var("s", Kind::Iri))?;
    assert!(unify([(Term::from(var("x", Kind::Item)), property.clone())]).is_none());

    let entity = var("x", Kind::Entity);
    let theta = unify([(Term::from(entity.clone()), property.clone())]).expect("entity takes it");
    assert_eq!(theta.get(&entity), Some(Some(&property)));
    Ok(())
}

#[test]
fn a_wide_and_a_narrow_variable_instantiate_to_one_term() -> Result<()> {
    let (x, y) = (var("x", Kind::Entity), var("y", Kind::Item));
    let theta = unify([(Term::from(x.clone()), Term::from(y.clone()))]).expect("comparable kinds");
    let mut expected = Theta::new();
    expected
        .bind(x.clone(), var("x", Kind::Item))
        .bind(y.clone(), var("x", Kind::Item));
    assert_eq!(theta, expected);
    assert_eq!(
        Term::from(x).instantiate(&theta)?,
        Term::from(y).instantiate(&theta)?
    );
    Ok(())
}

#[test]
fn same_named_variables_at_several_kinds_are_one_variable() -> Result<()> {
    let equations = [
        (var("v0", Kind::Term), var("v1", Kind::Item)),
        (var("v0", Kind::Item), var("v1", Kind::Term)),
        (var("v0", Kind::Item), var("v0", Kind::Term)),
    ];
    let theta = unify(equations.iter().map(|(s, t)| (Term::from(s.clone()), Term::from(t.clone()))))
        .expect("one name, one variable");
    for (s, t) in &equations {
        assert_eq!(
            Term::from(s.clone()).instantiate(&theta)?,
            Term::from(t.clone()).instantiate(&theta)?
        );
    }
    assert!(unify([
        (Term::from(var("v0", Kind::Item)), Term::from(var("v1", Kind::Term))),
        (Term::from(var("v0", Kind::Quantity)), Term::from(var("v1", Kind::Term))),
    ])
    .is_none());
    Ok(())
}

#[test]
fn absent_only_unifies_with_absent_or_a_variable() {
    let x = Term::from(var("x", Kind::Item));
    let theta = unify([(Some(x.clone()), None::<Term>)]).expect("variable takes absent");
    assert_eq!(theta.get(&var("x", Kind::Item)), Some(None));

    let item = Term::from(ClosedTerm::item(Q5));
    assert!(unify([(Some(item), None::<Term>)]).is_none());
    assert_eq!(unify([(None::<Term>, None::<Term>)]), Some(Theta::new()));
}

#[test]
fn matching_a_quantity_template_binds_missing_unit_to_absent() -> Result<()> {
    let pattern = Term::quantity(
        var("a", Kind::Quantity),
        Some(var("u", Kind::Item).into()),
        None,
        None,
    )?;
    let plain = Term::from(ClosedTerm::quantity(dec("3")));
    let theta = pattern.match_with(&plain).expect("matches");
    assert_eq!(theta.get(&var("u", Kind::Item)), Some(None));

    let with_unit: Term = ClosedTerm::from(statgraph_term::Quantity::new(dec("3")).with_unit(KG)).into();
    let theta = pattern.match_with(&with_unit).expect("matches");
    assert_eq!(
        theta.get(&var("u", Kind::Item)),
        Some(Some(&Term::from(ClosedTerm::item(KG))))
    );
    Ok(())
}

#[test]
fn templates_of_different_constructors_do_not_unify() -> Result<()> {
    let a = Term::some_value_snak(var("p", Kind::Property))?;
    let b = Term::no_value_snak(var("p", Kind::Property))?;
    assert!(a.match_with(&b).is_none());
    Ok(())
}

// =============================================================================
// Renaming and generalization
// =============================================================================

#[test]
fn renaming_avoids_excluded_names_and_is_consistent() -> Result<()> {
    let snak = Term::value_snak(var("p", Kind::Property), var("x", Kind::Item))?;
    let stmt = Term::statement(var("x", Kind::Item), snak)?;
    let exclude = BTreeSet::from(["x0".to_owned(), "p0".to_owned()]);

    let renamed = stmt.rename(&exclude);
    let names = renamed.variable_names();
    assert_eq!(names, BTreeSet::from(["p1".to_owned(), "x1".to_owned()]));

    let theta = renamed.match_with(&stmt).expect("renaming yields a variant");
    assert_eq!(theta.len(), 2);
    Ok(())
}

#[test]
fn custom_renamer_is_consulted_first() -> Result<()> {
    let t = Term::some_value_snak(var("p", Kind::Property))?;
    let renamed = t.rename_with(&BTreeSet::new(), |name| {
        std::iter::once(format!("{name}_fresh"))
    });
    assert_eq!(renamed.variable_names(), BTreeSet::from(["p_fresh".to_owned()]));
    Ok(())
}

#[test]
fn generalize_opens_absent_optional_slots() -> Result<()> {
    let snak: Term = ClosedTerm::value_snak(P31, ClosedTerm::quantity(dec("5")))?.into();
    let general = snak.generalize(&BTreeSet::new(), "g");
    assert_eq!(
        general.variables(),
        BTreeSet::from([
            var("g0", Kind::Item),
            var("g1", Kind::Quantity),
            var("g2", Kind::Quantity),
        ])
    );

    let theta = general.match_with(&snak).expect("generalization matches its source");
    assert!(theta.iter().all(|(_, t)| t.is_none()));
    Ok(())
}

#[test]
fn generalize_with_prefers_the_renamer_and_falls_back_to_the_prefix() -> Result<()> {
    let snak: Term = ClosedTerm::value_snak(P31, ClosedTerm::quantity(dec("5")))?.into();
    let renamer = |_: &str| ["unit", "lower"].into_iter().map(str::to_owned);

    let general = snak.generalize_with(&BTreeSet::new(), renamer, "g");
    assert_eq!(
        general.variables(),
        BTreeSet::from([
            var("unit", Kind::Item),
            var("lower", Kind::Quantity),
            var("g0", Kind::Quantity),
        ])
    );

    let exclude = BTreeSet::from(["lower".to_owned()]);
    let general = snak.generalize_with(&exclude, renamer, "g");
    assert_eq!(
        general.variable_names(),
        BTreeSet::from(["unit".to_owned(), "g0".to_owned(), "g1".to_owned()])
    );
    assert!(general.match_with(&snak).is_some());
    Ok(())
}
