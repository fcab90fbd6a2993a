//! The term algebra: closed values, templates and variables.
//!
//! `Term::construct` is the single factory for constructor applications:
//! it checks each argument against the constructor's slots and returns a
//! `Template` when any argument is open, a `ClosedTerm` otherwise.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bigdecimal::BigDecimal;

use crate::error::{Result, TermError};
use crate::kind::{Kind, Slot};
use crate::template::Template;
use crate::theta::Theta;
use crate::unify::unify;
use crate::value::ClosedTerm;
use crate::variable::{default_renamer, Variable};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Closed(ClosedTerm),
    Template(Template),
    Variable(Variable),
}

impl Term {
    /// Apply the constructor of `kind` to `args` (`None` = absent).
    pub fn construct(kind: Kind, args: Vec<Option<Term>>) -> Result<Term> {
        let slots = kind.signature().ok_or(TermError::NotConstructible(kind))?;
        if args.len() != slots.len() {
            return Err(TermError::Arity {
                kind,
                expected: slots.len(),
                got: args.len(),
            });
        }
        let args = args
            .into_iter()
            .zip(slots)
            .enumerate()
            .map(|(position, (arg, slot))| check_arg(kind, position, *slot, arg))
            .collect::<Result<Vec<_>>>()?;

        if args.iter().flatten().any(Term::is_open) {
            Ok(Term::Template(Template::new(kind, args)?))
        } else {
            let ground = args.into_iter().map(|a| a.and_then(Term::into_closed)).collect();
            Ok(Term::Closed(ClosedTerm::from_args(kind, ground)?))
        }
    }

    pub fn iri(content: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::Iri, vec![Some(content.into())])
    }

    pub fn item(iri: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::Item, vec![Some(iri.into())])
    }

    pub fn property(iri: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::Property, vec![Some(iri.into())])
    }

    pub fn lexeme(iri: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::Lexeme, vec![Some(iri.into())])
    }

    pub fn text(content: impl Into<Term>, language: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::Text, vec![Some(content.into()), Some(language.into())])
    }

    pub fn quantity(
        amount: impl Into<Term>,
        unit: Option<Term>,
        lower_bound: Option<Term>,
        upper_bound: Option<Term>,
    ) -> Result<Term> {
        Term::construct(
            Kind::Quantity,
            vec![Some(amount.into()), unit, lower_bound, upper_bound],
        )
    }

    pub fn time(
        instant: impl Into<Term>,
        precision: Option<Term>,
        timezone: Option<Term>,
        calendar: Option<Term>,
    ) -> Result<Term> {
        Term::construct(
            Kind::Time,
            vec![Some(instant.into()), precision, timezone, calendar],
        )
    }

    pub fn value_snak(property: impl Into<Term>, value: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::ValueSnak, vec![Some(property.into()), Some(value.into())])
    }

    pub fn some_value_snak(property: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::SomeValueSnak, vec![Some(property.into())])
    }

    pub fn no_value_snak(property: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::NoValueSnak, vec![Some(property.into())])
    }

    pub fn statement(subject: impl Into<Term>, snak: impl Into<Term>) -> Result<Term> {
        Term::construct(Kind::Statement, vec![Some(subject.into()), Some(snak.into())])
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Term::Closed(_))
    }

    pub fn is_open(&self) -> bool {
        !self.is_closed()
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Term::Variable(_))
    }

    /// The concrete kind of a closed value or template, the declared kind of
    /// a variable.
    pub fn kind(&self) -> Kind {
        match self {
            Term::Closed(c) => c.kind(),
            Term::Template(t) => t.kind(),
            Term::Variable(v) => v.kind(),
        }
    }

    pub fn as_closed(&self) -> Option<&ClosedTerm> {
        match self {
            Term::Closed(c) => Some(c),
            _ => None,
        }
    }

    pub fn into_closed(self) -> Option<ClosedTerm> {
        match self {
            Term::Closed(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Term::Variable(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_template(&self) -> Option<&Template> {
        match self {
            Term::Template(t) => Some(t),
            _ => None,
        }
    }

    /// Constructor arguments; `None` for variables and leaf values.
    pub fn args(&self) -> Option<Vec<Option<Term>>> {
        match self {
            Term::Closed(c) => c.args(),
            Term::Template(t) => Some(t.args().to_vec()),
            Term::Variable(_) => None,
        }
    }

    /// Free variables. Memoized per template; empty for closed terms.
    pub fn variables(&self) -> BTreeSet<Variable> {
        match self {
            Term::Closed(_) => BTreeSet::new(),
            Term::Template(t) => t.variables().clone(),
            Term::Variable(v) => BTreeSet::from([v.clone()]),
        }
    }

    pub fn contains_variable(&self, variable: &Variable) -> bool {
        match self {
            Term::Closed(_) => false,
            Term::Template(t) => t.variables().contains(variable),
            Term::Variable(v) => v == variable,
        }
    }

    pub fn variable_names(&self) -> BTreeSet<String> {
        self.variables().iter().map(|v| v.name().to_owned()).collect()
    }

    /// `instantiate_with(theta, true, false)`.
    pub fn instantiate(&self, theta: &Theta) -> Result<Option<Term>> {
        self.instantiate_with(theta, true, false)
    }

    /// Apply `theta` directly, without unification.
    ///
    /// - A bound value must be of a subkind of the variable's kind. With
    ///   `coerce`, a bound variable of a wider kind is narrowed instead.
    /// - A variable bound to absent instantiates to `None`. In an optional
    ///   slot the component is dropped; in a required slot the enclosing term
    ///   becomes absent, or, when `strict`, the call fails.
    pub fn instantiate_with(&self, theta: &Theta, coerce: bool, strict: bool) -> Result<Option<Term>> {
        match self {
            Term::Closed(_) => Ok(Some(self.clone())),
            Term::Variable(v) => instantiate_variable(v, theta, coerce),
            Term::Template(t) => t.instantiate_with(theta, coerce, strict),
        }
    }

    /// Unify `self` with `other`.
    pub fn match_with(&self, other: &Term) -> Option<Theta> {
        unify([(self.clone(), other.clone())])
    }

    /// Rename every variable apart from `exclude` using the default renamer.
    pub fn rename(&self, exclude: &BTreeSet<String>) -> Term {
        self.rename_with(exclude, default_renamer)
    }

    /// Rename every variable to a fresh name drawn from `renamer(old_name)`.
    ///
    /// Occurrences of one name map to one fresh name; fresh names avoid
    /// `exclude` and each other.
    pub fn rename_with<R, I>(&self, exclude: &BTreeSet<String>, renamer: R) -> Term
    where
        R: FnMut(&str) -> I,
        I: Iterator<Item = String>,
    {
        let theta = self.renaming_with(exclude, renamer);
        if theta.is_empty() {
            return self.clone();
        }
        match self.instantiate_with(&theta, false, true) {
            Ok(Some(t)) => t,
            other => unreachable!("renaming preserves kinds, got {other:?}"),
        }
    }

    /// The substitution `rename` applies: every free variable mapped to a
    /// variable of the same kind under its fresh name.
    pub fn renaming(&self, exclude: &BTreeSet<String>) -> Theta {
        self.renaming_with(exclude, default_renamer)
    }

    pub fn renaming_with<R, I>(&self, exclude: &BTreeSet<String>, mut renamer: R) -> Theta
    where
        R: FnMut(&str) -> I,
        I: Iterator<Item = String>,
    {
        let vars = self.variables();
        let mut taken = exclude.clone();
        let mut fresh: BTreeMap<String, String> = BTreeMap::new();
        for v in &vars {
            if fresh.contains_key(v.name()) {
                continue;
            }
            let name = match renamer(v.name()).find(|n| !taken.contains(n)) {
                Some(name) => name,
                None => default_renamer(v.name())
                    .find(|n| !taken.contains(n))
                    .unwrap_or_default(),
            };
            taken.insert(name.clone());
            fresh.insert(v.name().to_owned(), name);
        }
        vars.iter()
            .map(|v| {
                let name = fresh.get(v.name()).cloned().unwrap_or_default();
                (v.clone(), Some(Term::Variable(v.with_name(name))))
            })
            .collect()
    }

    /// Replace every absent optional slot with a fresh variable named
    /// `prefix0`, `prefix1`, ... (avoiding `exclude` and the term's own
    /// variables).
    ///
    /// Data-value payloads (a quantity's amount, a time's precision code)
    /// are not opened further.
    pub fn generalize(&self, exclude: &BTreeSet<String>, prefix: &str) -> Term {
        self.generalize_with(exclude, |_| std::iter::empty(), prefix)
    }

    /// `generalize`, drawing fresh names from `renamer(prefix)` first and
    /// falling back to `prefix0`, `prefix1`, ... once it runs dry.
    pub fn generalize_with<R, I>(
        &self,
        exclude: &BTreeSet<String>,
        mut renamer: R,
        prefix: &str,
    ) -> Term
    where
        R: FnMut(&str) -> I,
        I: Iterator<Item = String>,
    {
        let mut taken = exclude.clone();
        taken.extend(self.variable_names());
        let mut names = FreshNames {
            taken,
            candidates: renamer(prefix).chain(default_renamer(prefix)),
        };
        self.generalize_inner(&mut names)
    }

    fn generalize_inner<I: Iterator<Item = String>>(&self, names: &mut FreshNames<I>) -> Term {
        let (kind, args) = match self {
            Term::Variable(_) => return self.clone(),
            Term::Closed(c) => match c.args() {
                Some(args) => (c.kind(), args),
                None => return self.clone(),
            },
            Term::Template(t) => (t.kind(), t.args().to_vec()),
        };
        let Some(slots) = kind.signature() else {
            return self.clone();
        };
        let structural = matches!(
            kind,
            Kind::ValueSnak | Kind::SomeValueSnak | Kind::NoValueSnak | Kind::Statement
        );
        let args = args
            .into_iter()
            .zip(slots)
            .map(|(arg, slot)| match arg {
                Some(t) if structural => Some(t.generalize_inner(names)),
                Some(t) => Some(t),
                None => Some(Term::Variable(Variable::new(names.next_name(), slot.kind))),
            })
            .collect();
        match Term::construct(kind, args) {
            Ok(t) => t,
            Err(err) => unreachable!("generalizing {self} broke its signature: {err}"),
        }
    }
}

struct FreshNames<I> {
    taken: BTreeSet<String>,
    candidates: I,
}

impl<I: Iterator<Item = String>> FreshNames<I> {
    fn next_name(&mut self) -> String {
        let taken = &mut self.taken;
        match self.candidates.find(|name| !taken.contains(name)) {
            Some(name) => {
                taken.insert(name.clone());
                name
            }
            None => unreachable!("the default renamer never runs dry"),
        }
    }
}

fn instantiate_variable(v: &Variable, theta: &Theta, coerce: bool) -> Result<Option<Term>> {
    match theta.get(v) {
        None => Ok(Some(Term::Variable(v.clone()))),
        Some(None) => Ok(None),
        Some(Some(t)) => {
            if t.kind().is_subkind_of(v.kind()) {
                return Ok(Some(t.clone()));
            }
            if let (true, Term::Variable(w)) = (coerce, t) {
                if v.kind().is_subkind_of(w.kind()) {
                    return Ok(Some(Term::Variable(w.coerce(v.kind())?)));
                }
            }
            Err(TermError::Instantiation {
                variable: v.name().to_owned(),
                kind: v.kind(),
                value: t.to_string(),
            })
        }
    }
}

/// Check one constructor argument against its slot.
///
/// Variables of a wider kind are narrowed to the slot; closed strings and
/// IRIs are promoted to the IRI or entity a concrete slot asks for.
fn check_arg(kind: Kind, position: usize, slot: Slot, arg: Option<Term>) -> Result<Option<Term>> {
    let Some(arg) = arg else {
        if slot.optional {
            return Ok(None);
        }
        return Err(TermError::AbsentArgument { kind, position });
    };
    match arg {
        Term::Variable(v) => {
            if v.kind().is_subkind_of(slot.kind) {
                Ok(Some(Term::Variable(v)))
            } else if slot.kind.is_subkind_of(v.kind()) {
                Ok(Some(Term::Variable(v.coerce(slot.kind)?)))
            } else {
                Err(TermError::check(&v, slot.kind, Some(position)))
            }
        }
        t if t.kind().is_subkind_of(slot.kind) => Ok(Some(t)),
        Term::Closed(c) => {
            let shown = c.to_string();
            promote(c, slot.kind)
                .map(|c| Some(Term::Closed(c)))
                .ok_or_else(|| TermError::check(shown, slot.kind, Some(position)))
        }
        t => Err(TermError::check(&t, slot.kind, Some(position))),
    }
}

fn promote(value: ClosedTerm, target: Kind) -> Option<ClosedTerm> {
    match (value, target) {
        (ClosedTerm::String(s), Kind::Iri) => Some(ClosedTerm::iri(s)),
        (ClosedTerm::Iri(iri), Kind::Item) => Some(ClosedTerm::Item(iri)),
        (ClosedTerm::Iri(iri), Kind::Property) => Some(ClosedTerm::Property(iri)),
        (ClosedTerm::Iri(iri), Kind::Lexeme) => Some(ClosedTerm::Lexeme(iri)),
        _ => None,
    }
}

impl From<ClosedTerm> for Term {
    fn from(value: ClosedTerm) -> Self {
        Term::Closed(value)
    }
}

impl From<Variable> for Term {
    fn from(value: Variable) -> Self {
        Term::Variable(value)
    }
}

impl From<Template> for Term {
    fn from(value: Template) -> Self {
        Term::Template(value)
    }
}

impl From<BigDecimal> for Term {
    fn from(value: BigDecimal) -> Self {
        Term::Closed(ClosedTerm::quantity(value))
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::Closed(ClosedTerm::string(value))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Closed(c) => write!(f, "{c}"),
            Term::Template(t) => write!(f, "{t}"),
            Term::Variable(v) => write!(f, "{v}"),
        }
    }
}
