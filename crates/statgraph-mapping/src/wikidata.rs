//! Mapping for the Wikidata RDF model as served by the Wikidata Query
//! Service.
//!
//! ```text
//! ?subject p:P ?stmt .                      # claim
//! ?stmt ps:P ?value .                       # simple value
//! ?stmt psv:P ?node .                       # deep value (quantity, time)
//! ?node wikibase:quantityAmount ?amount .
//! ?stmt a wdno:P .                          # no value
//! ?stmt wikibase:rank ?rank .
//! ```
//!
//! When the property is left open the `p:`/`ps:`/`psv:`/`wdno:` predicates
//! are reached through `wikibase:claim`, `wikibase:statementProperty`,
//! `wikibase:statementValue` and `wikibase:novalue`.

use std::sync::Arc;

use bigdecimal::ToPrimitive;
use statgraph_term::{ClosedTerm, Datatype, Iri, Kind, Quantity, Term, Variable};

use crate::builder::{Expr, Node, RDF_TYPE};
use crate::config::WikidataConfig;
use crate::error::{EntryError, MappingError};
use crate::filter::DatatypeMask;
use crate::mapping::{Arg, Args, Branch, Mapping, MappingBuilder, MappingHooks};

/// Entity namespace clients use.
pub const ENTITY: &str = "http://www.wikidata.org/entity/";
pub const WIKIBASE: &str = "http://wikiba.se/ontology#";

/// Unit of dimensionless quantities.
const NO_UNIT: &str = "Q199";
const GENID: &str = "/.well-known/genid/";

fn wikibase(local: &str) -> Node {
    Node::iri(format!("{WIKIBASE}{local}"))
}

fn type_name(datatype: Datatype) -> &'static str {
    match datatype {
        Datatype::Item => "WikibaseItem",
        Datatype::Property => "WikibaseProperty",
        Datatype::Lexeme => "WikibaseLexeme",
        Datatype::Iri => "Url",
        Datatype::Text => "Monolingualtext",
        Datatype::String => "String",
        Datatype::ExternalId => "ExternalId",
        Datatype::Quantity => "Quantity",
        Datatype::Time => "Time",
    }
}

// ============================================================================
// Hooks
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct WikidataHooks {
    config: WikidataConfig,
}

impl WikidataHooks {
    pub fn new(config: WikidataConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WikidataConfig {
        &self.config
    }
}

fn rebase(iri: &Iri, from: &str, to: &str) -> Iri {
    match iri.as_str().strip_prefix(from) {
        Some(local) if from != to => Iri::new(format!("{to}{local}")),
        _ => iri.clone(),
    }
}

impl MappingHooks for WikidataHooks {
    fn normalize_entity(&self, iri: &Iri) -> Iri {
        rebase(iri, ENTITY, &self.config.entity_prefix)
    }

    fn denormalize_entity(&self, iri: &Iri) -> Iri {
        rebase(iri, &self.config.entity_prefix, ENTITY)
    }

    fn normalize_value(&self, value: ClosedTerm, _property: Option<&ClosedTerm>) -> ClosedTerm {
        match value {
            ClosedTerm::Quantity(q) => ClosedTerm::Quantity(Quantity {
                amount: q.amount.normalized(),
                unit: q.unit,
                lower_bound: q.lower_bound.map(|b| b.normalized()),
                upper_bound: q.upper_bound.map(|b| b.normalized()),
            }),
            other => other,
        }
    }

    /// Entities are told apart by the first letter of their id.
    fn decode_iri(&self, iri: &str, kind: Kind) -> Option<ClosedTerm> {
        let local = iri.strip_prefix(self.config.entity_prefix.as_str());
        let client = || Iri::new(format!("{ENTITY}{}", local.unwrap_or_default()));
        match kind {
            Kind::Item | Kind::Property | Kind::Lexeme if local.is_none() => None,
            Kind::Item => Some(ClosedTerm::Item(client())),
            Kind::Property => Some(ClosedTerm::Property(client())),
            Kind::Lexeme => Some(ClosedTerm::Lexeme(client())),
            Kind::Entity | Kind::Value | Kind::Term => match local.and_then(|l| l.chars().next()) {
                Some('Q') => Some(ClosedTerm::Item(client())),
                Some('P') => Some(ClosedTerm::Property(client())),
                Some('L') => Some(ClosedTerm::Lexeme(client())),
                _ if kind != Kind::Entity => Some(ClosedTerm::iri(iri)),
                _ => None,
            },
            Kind::Iri | Kind::ShallowDataValue | Kind::DataValue => Some(ClosedTerm::iri(iri)),
            _ => None,
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

#[derive(Debug, Clone)]
struct Namespaces {
    entity: String,
    prop: String,
}

#[derive(Debug, Clone, Copy)]
enum Link {
    /// `ps:`
    Statement,
    /// `psv:`
    StatementValue,
    /// `wdno:`
    NoValue,
}

impl Link {
    fn path(self) -> &'static str {
        match self {
            Link::Statement => "statement/",
            Link::StatementValue => "statement/value/",
            Link::NoValue => "novalue/",
        }
    }

    fn predicate(self) -> &'static str {
        match self {
            Link::Statement => "statementProperty",
            Link::StatementValue => "statementValue",
            Link::NoValue => "novalue",
        }
    }

    fn base(self) -> &'static str {
        match self {
            Link::Statement => "ps",
            Link::StatementValue => "psv",
            Link::NoValue => "wdno",
        }
    }
}

enum PropertyRef {
    /// Local name of a fixed property (`P31`).
    Fixed(String),
    Open(Node),
}

/// The `?subject p:P ?stmt` part every entry starts with.
struct Claim {
    statement: Node,
    property: PropertyRef,
}

impl Claim {
    fn open(
        b: &mut Branch<'_, '_>,
        args: &Args,
        ns: &Namespaces,
        datatype: Option<Datatype>,
    ) -> Result<Claim, EntryError> {
        let subject = b.node(args.get("subject")?)?;
        let property_node = b.node(args.get("property")?)?;
        let statement = b.fresh_var("stmt");

        let property = match args.get("property")? {
            Arg::Value(ClosedTerm::Property(_)) => {
                let Node::Iri(iri) = &property_node else {
                    return Err(EntryError::Skip);
                };
                let local = iri.rsplit('/').next().unwrap_or_default().to_owned();
                b.triple(
                    subject.clone(),
                    Node::iri(format!("{}{local}", ns.prop)),
                    statement.clone(),
                );
                PropertyRef::Fixed(local)
            }
            Arg::Var(_) => {
                let claim = b.fresh_var("claim");
                b.triple(property_node.clone(), wikibase("claim"), claim.clone());
                b.triple(subject.clone(), claim, statement.clone());
                PropertyRef::Open(property_node.clone())
            }
            _ => return Err(EntryError::Skip),
        };

        let property_mask = b.constraints().property_mask();
        match datatype {
            Some(datatype) => {
                b.triple(
                    property_node.clone(),
                    wikibase("propertyType"),
                    wikibase(type_name(datatype)),
                );
            }
            None if !property_mask.is_all() => {
                let types = Datatype::ALL
                    .into_iter()
                    .filter(|d| property_mask.contains_datatype(*d))
                    .map(|d| wikibase(type_name(d)))
                    .collect();
                let ty = b.fresh_var("type");
                b.triple(property_node.clone(), wikibase("propertyType"), ty.clone());
                b.values(&ty, types);
            }
            None => {}
        }

        subject_mask(b, &subject, ns);
        rank(b, &statement);
        Ok(Claim {
            statement,
            property,
        })
    }

    /// `ps:P`, `psv:P` or `wdno:P` of the claim's property.
    fn link(&self, b: &mut Branch<'_, '_>, ns: &Namespaces, link: Link) -> Node {
        match &self.property {
            PropertyRef::Fixed(local) => Node::iri(format!("{}{}{local}", ns.prop, link.path())),
            PropertyRef::Open(property) => {
                let predicate = b.fresh_var(link.base());
                b.triple(property.clone(), wikibase(link.predicate()), predicate.clone());
                predicate
            }
        }
    }
}

fn subject_mask(b: &mut Branch<'_, '_>, subject: &Node, ns: &Namespaces) {
    if !subject.is_var() {
        return;
    }
    let mask = b.constraints().subject_mask() & DatatypeMask::ENTITIES;
    if mask.contains(DatatypeMask::ENTITIES) {
        return;
    }
    let prefixes = [
        (DatatypeMask::ITEM, 'Q'),
        (DatatypeMask::PROPERTY, 'P'),
        (DatatypeMask::LEXEME, 'L'),
    ];
    let tests = prefixes
        .into_iter()
        .filter(|(bit, _)| mask.contains(*bit))
        .map(|(_, letter)| Expr::str_starts(subject.clone(), &format!("{}{letter}", ns.entity)))
        .collect();
    b.filter(Expr::Or(tests));
}

fn rank(b: &mut Branch<'_, '_>, statement: &Node) {
    let mask = b.constraints().rank_mask();
    let annotated = b.constraints().annotated();
    if mask.is_all() && !annotated {
        return;
    }
    let rank = b.fresh_var("rank");
    b.triple(statement.clone(), wikibase("rank"), rank.clone());
    if !mask.is_all() {
        let ranks = mask.ranks().map(|r| Node::iri(r.iri())).collect();
        b.filter(Expr::In(rank.clone(), ranks));
    }
    if annotated {
        b.set_rank_variable(&rank);
    }
}

/// Keep some-value placeholders (blank nodes or skolem IRIs) out of a
/// simple value.
fn known_value(b: &mut Branch<'_, '_>, value: &Node) {
    if value.is_var() {
        b.filter(Expr::Not(Box::new(some_value(value))));
    }
}

fn some_value(node: &Node) -> Expr {
    Expr::Or(vec![
        Expr::Call("isBLANK", vec![Expr::Node(node.clone())]),
        Expr::Call(
            "CONTAINS",
            vec![
                Expr::Call("STR", vec![Expr::Node(node.clone())]),
                Expr::Node(Node::string(GENID)),
            ],
        ),
    ])
}

/// Encode a quantity argument as an `xsd:integer`.
fn integer(b: &Branch<'_, '_>, arg: &Arg) -> Result<Node, EntryError> {
    match arg {
        Arg::Value(ClosedTerm::Quantity(q)) if q.amount.is_integer() => q
            .amount
            .to_i64()
            .map(Node::integer)
            .ok_or_else(|| EntryError::Failed(format!("{} is out of range", q.amount))),
        other => b.node(other),
    }
}

/// One optional component of a deep value.
fn component(
    b: &mut Branch<'_, '_>,
    node: &Node,
    predicate: &str,
    arg: &Arg,
    value: Option<Node>,
    placeholder: Option<&Node>,
) -> Result<(), EntryError> {
    let predicate = wikibase(predicate);
    match arg {
        Arg::Var(var) => {
            b.optional(|g| {
                g.triple(node.clone(), predicate, var.clone());
                if let Some(placeholder) = placeholder {
                    g.filter(Expr::Ne(var.clone(), placeholder.clone()));
                }
            });
        }
        Arg::Value(_) => {
            let value = match value {
                Some(value) => value,
                None => b.node(arg)?,
            };
            b.triple(node.clone(), predicate, value);
        }
        Arg::Absent => {
            b.not_exists(|g| {
                let any = g.fresh_var("any");
                g.triple(node.clone(), predicate, any.clone());
                if let Some(placeholder) = placeholder {
                    g.filter(Expr::Ne(any, placeholder.clone()));
                }
            });
        }
    }
    Ok(())
}

// ============================================================================
// Entries
// ============================================================================

fn var(name: &str, kind: Kind) -> Variable {
    Variable::new(name, kind)
}

fn statement(snak: Term) -> Result<Term, MappingError> {
    Ok(Term::statement(var("subject", Kind::Entity), snak)?)
}

fn value_pattern(value: impl Into<Term>) -> Result<Term, MappingError> {
    statement(Term::value_snak(var("property", Kind::Property), value)?)
}

/// Register the simple-valued entry for `datatype`.
fn simple(
    builder: MappingBuilder,
    ns: &Arc<Namespaces>,
    datatype: Datatype,
) -> Result<MappingBuilder, MappingError> {
    let pattern = value_pattern(var("value", datatype.kind()))?;
    let ns = Arc::clone(ns);
    Ok(builder.register([pattern], move |b, args| {
        let claim = Claim::open(b, args, &ns, Some(datatype))?;
        let value = b.node(args.get("value")?)?;
        let ps = claim.link(b, &ns, Link::Statement);
        b.triple(claim.statement.clone(), ps, value.clone());
        known_value(b, &value);
        if datatype == Datatype::Text && value.is_var() {
            if let Some(language) = b.constraints().language().map(str::to_owned) {
                b.filter(Expr::lang_eq(value, &language));
            }
        }
        Ok(())
    }))
}

/// The Wikidata mapping, pointed at the store described by `config`.
pub fn wikidata_mapping(config: &WikidataConfig) -> Result<Mapping, MappingError> {
    let ns = Arc::new(Namespaces {
        entity: config.entity_prefix.clone(),
        prop: config.prop_prefix.clone(),
    });
    let mut builder = MappingBuilder::new().with_hooks(WikidataHooks::new(config.clone()));
    for datatype in [
        Datatype::Item,
        Datatype::Property,
        Datatype::Lexeme,
        Datatype::Iri,
        Datatype::Text,
        Datatype::String,
        Datatype::ExternalId,
    ] {
        builder = simple(builder, &ns, datatype)?;
    }

    let quantity = value_pattern(Term::quantity(
        var("amount", Kind::Quantity),
        Some(var("unit", Kind::Item).into()),
        Some(var("lower", Kind::Quantity).into()),
        Some(var("upper", Kind::Quantity).into()),
    )?)?;
    let quantity_ns = Arc::clone(&ns);
    builder = builder.register([quantity], move |b, args| {
        let ns = &quantity_ns;
        let claim = Claim::open(b, args, ns, Some(Datatype::Quantity))?;
        let psv = claim.link(b, ns, Link::StatementValue);
        let node = b.fresh_var("quantity");
        b.triple(claim.statement.clone(), psv, node.clone());
        let amount = b.node(args.get("amount")?)?;
        b.triple(node.clone(), wikibase("quantityAmount"), amount);
        let no_unit = Node::iri(format!("{}{NO_UNIT}", ns.entity));
        component(b, &node, "quantityUnit", args.get("unit")?, None, Some(&no_unit))?;
        component(b, &node, "quantityLowerBound", args.get("lower")?, None, None)?;
        component(b, &node, "quantityUpperBound", args.get("upper")?, None, None)?;
        Ok(())
    });

    let time = value_pattern(Term::time(
        var("instant", Kind::Time),
        Some(var("precision", Kind::Quantity).into()),
        Some(var("timezone", Kind::Quantity).into()),
        Some(var("calendar", Kind::Item).into()),
    )?)?;
    let time_ns = Arc::clone(&ns);
    builder = builder.register([time], move |b, args| {
        let ns = &time_ns;
        let claim = Claim::open(b, args, ns, Some(Datatype::Time))?;
        let psv = claim.link(b, ns, Link::StatementValue);
        let node = b.fresh_var("time");
        b.triple(claim.statement.clone(), psv, node.clone());
        let instant = b.node(args.get("instant")?)?;
        b.triple(node.clone(), wikibase("timeValue"), instant);
        let precision = args.get("precision")?;
        let precision_node = precision.as_value().map(|_| integer(b, precision)).transpose()?;
        component(b, &node, "timePrecision", precision, precision_node, None)?;
        let timezone = args.get("timezone")?;
        let timezone_node = timezone.as_value().map(|_| integer(b, timezone)).transpose()?;
        component(b, &node, "timeTimezone", timezone, timezone_node, None)?;
        component(b, &node, "timeCalendarModel", args.get("calendar")?, None, None)?;
        Ok(())
    });

    let some_value_ns = Arc::clone(&ns);
    let some_value_pattern = statement(Term::some_value_snak(var("property", Kind::Property))?)?;
    builder = builder.register([some_value_pattern], move |b, args| {
        let ns = &some_value_ns;
        let claim = Claim::open(b, args, ns, None)?;
        let ps = claim.link(b, ns, Link::Statement);
        let placeholder = b.fresh_var("some");
        b.triple(claim.statement.clone(), ps, placeholder.clone());
        b.filter(some_value(&placeholder));
        Ok(())
    });

    let no_value_ns = Arc::clone(&ns);
    let no_value_pattern = statement(Term::no_value_snak(var("property", Kind::Property))?)?;
    builder = builder.register([no_value_pattern], move |b, args| {
        let ns = &no_value_ns;
        let claim = Claim::open(b, args, ns, None)?;
        let wdno = claim.link(b, ns, Link::NoValue);
        b.triple(claim.statement.clone(), Node::iri(RDF_TYPE), wdno);
        Ok(())
    });

    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hooks_rebase_entity_iris_both_ways() {
        let hooks = WikidataHooks::new(WikidataConfig {
            entity_prefix: "http://example.org/wd/".to_owned(),
            ..WikidataConfig::default()
        });
        let q42 = Iri::new("http://www.wikidata.org/entity/Q42");
        let backend = hooks.normalize_entity(&q42);
        assert_eq!(backend.as_str(), "http://example.org/wd/Q42");
        assert_eq!(hooks.denormalize_entity(&backend), q42);
        assert_eq!(
            hooks.decode_iri("http://example.org/wd/P31", Kind::Entity),
            Some(ClosedTerm::property("http://www.wikidata.org/entity/P31"))
        );
        assert_eq!(
            hooks.decode_iri("http://example.org/other", Kind::Value),
            Some(ClosedTerm::iri("http://example.org/other"))
        );
        assert_eq!(hooks.decode_iri("http://example.org/other", Kind::Item), None);
    }

    #[test]
    fn mapping_registers_every_value_shape() {
        let mapping = wikidata_mapping(&WikidataConfig::default()).unwrap();
        assert_eq!(mapping.len(), 11);
        let datatypes: Vec<_> = mapping.iter().map(|e| e.datatype()).collect();
        assert_eq!(datatypes[0], Some(Datatype::Item));
        assert_eq!(datatypes[7], Some(Datatype::Quantity));
        assert_eq!(datatypes[8], Some(Datatype::Time));
        assert_eq!(mapping[9].snak_kind(), Kind::SomeValueSnak);
        assert_eq!(mapping[10].snak_kind(), Kind::NoValueSnak);
    }
}
