//! Mapping registry: statement patterns paired with query-emitting callbacks.
//!
//! A backend describes how its store represents statements by registering
//! entries on a `MappingBuilder`. Each entry holds one or more statement
//! patterns and a callback; when a filter selects the entry the compiler
//! hands the callback a `Branch` (one `UNION` branch of the query) and the
//! `Args` the pattern variables resolved to.
//!
//! Entry ids follow registration order and never change after `build`.

use std::fmt;
use std::ops::{Deref, DerefMut, Index};
use std::sync::Arc;

use ahash::AHashMap;
use statgraph_term::{ClosedTerm, Datatype, Iri, Kind, Term};

use crate::builder::{GroupBuilder, Node};
use crate::config::CompilerOptions;
use crate::error::{EntryError, MappingError};
use crate::filter::Filter;

/// Entry callback.
pub type Callback =
    Arc<dyn Fn(&mut Branch<'_, '_>, &Args) -> Result<(), EntryError> + Send + Sync>;

// ============================================================================
// Hooks
// ============================================================================

/// Backend-specific value handling.
///
/// Every method has a default suitable for a store that uses the client's
/// IRIs verbatim.
pub trait MappingHooks: Send + Sync {
    /// Rewrite a client entity IRI into the backend's namespace.
    fn normalize_entity(&self, iri: &Iri) -> Iri {
        iri.clone()
    }

    /// Inverse of `normalize_entity`.
    fn denormalize_entity(&self, iri: &Iri) -> Iri {
        iri.clone()
    }

    /// Rewrite a filter value, relative to the filter's property when it
    /// names one.
    fn normalize_value(&self, value: ClosedTerm, _property: Option<&ClosedTerm>) -> ClosedTerm {
        value
    }

    /// The query node standing for a ground value, if it has one.
    fn encode(&self, value: &ClosedTerm) -> Option<Node> {
        match value {
            ClosedTerm::Item(iri) | ClosedTerm::Property(iri) | ClosedTerm::Lexeme(iri) => {
                Some(Node::iri(self.normalize_entity(iri).as_str()))
            }
            ClosedTerm::Iri(iri) => Some(Node::iri(iri.as_str())),
            ClosedTerm::Text(text) => Some(Node::lang(&text.content, &text.language)),
            ClosedTerm::String(s) | ClosedTerm::ExternalId(s) => Some(Node::string(s)),
            ClosedTerm::Quantity(q) => Some(Node::decimal(&q.amount)),
            ClosedTerm::Time(t) => Some(Node::date_time(&t.instant)),
            ClosedTerm::ValueSnak(_)
            | ClosedTerm::SomeValueSnak(_)
            | ClosedTerm::NoValueSnak(_)
            | ClosedTerm::Statement(_) => None,
        }
    }

    /// Read an IRI result column as a value of `kind`.
    ///
    /// Abstract entity kinds cannot be told apart from the IRI alone and
    /// default to items.
    fn decode_iri(&self, iri: &str, kind: Kind) -> Option<ClosedTerm> {
        let entity = || self.denormalize_entity(&Iri::from(iri));
        match kind {
            Kind::Item | Kind::Entity | Kind::Value | Kind::Term => Some(ClosedTerm::Item(entity())),
            Kind::Property => Some(ClosedTerm::Property(entity())),
            Kind::Lexeme => Some(ClosedTerm::Lexeme(entity())),
            Kind::Iri | Kind::ShallowDataValue | Kind::DataValue => Some(ClosedTerm::iri(iri)),
            _ => None,
        }
    }
}

/// Hooks that keep every value as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl MappingHooks for DefaultHooks {}

// ============================================================================
// Entries
// ============================================================================

pub struct Entry {
    id: usize,
    patterns: Vec<Term>,
    snak_kind: Kind,
    subject_kind: Kind,
    datatype: Option<Datatype>,
    callback: Callback,
}

impl Entry {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Statement patterns, tried in order.
    pub fn patterns(&self) -> &[Term] {
        &self.patterns
    }

    /// The snak constructor every pattern of this entry uses.
    pub fn snak_kind(&self) -> Kind {
        self.snak_kind
    }

    /// Kind of the statement subject, widened over all patterns.
    pub fn subject_kind(&self) -> Kind {
        self.subject_kind
    }

    /// Datatype of the property this entry covers; `None` when the entry
    /// accepts any.
    pub fn datatype(&self) -> Option<Datatype> {
        self.datatype
    }

    pub(crate) fn invoke(&self, branch: &mut Branch<'_, '_>, args: &Args) -> Result<(), EntryError> {
        (self.callback)(branch, args)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("patterns", &self.patterns)
            .field("snak_kind", &self.snak_kind)
            .field("datatype", &self.datatype)
            .finish_non_exhaustive()
    }
}

struct PendingEntry {
    patterns: Vec<Term>,
    datatype: Option<Datatype>,
    callback: Callback,
}

/// Collects entries in declaration order.
pub struct MappingBuilder {
    pending: Vec<PendingEntry>,
    hooks: Arc<dyn MappingHooks>,
}

impl Default for MappingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl MappingBuilder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            hooks: Arc::new(DefaultHooks),
        }
    }

    pub fn with_hooks(mut self, hooks: impl MappingHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Register an entry. Its datatype is taken from the value of its
    /// value-snak patterns when that is concrete.
    pub fn register<P, F>(self, patterns: P, callback: F) -> Self
    where
        P: IntoIterator<Item = Term>,
        F: Fn(&mut Branch<'_, '_>, &Args) -> Result<(), EntryError> + Send + Sync + 'static,
    {
        self.push(patterns, None, callback)
    }

    /// Register an entry covering properties of `datatype` only. Needed for
    /// some-value and no-value patterns, which carry no value to infer it
    /// from.
    pub fn register_with_datatype<P, F>(self, patterns: P, datatype: Datatype, callback: F) -> Self
    where
        P: IntoIterator<Item = Term>,
        F: Fn(&mut Branch<'_, '_>, &Args) -> Result<(), EntryError> + Send + Sync + 'static,
    {
        self.push(patterns, Some(datatype), callback)
    }

    fn push<P, F>(mut self, patterns: P, datatype: Option<Datatype>, callback: F) -> Self
    where
        P: IntoIterator<Item = Term>,
        F: Fn(&mut Branch<'_, '_>, &Args) -> Result<(), EntryError> + Send + Sync + 'static,
    {
        self.pending.push(PendingEntry {
            patterns: patterns.into_iter().collect(),
            datatype,
            callback: Arc::new(callback),
        });
        self
    }

    /// Freeze the registered entries, assigning ids `0, 1, 2, ...`.
    pub fn build(self) -> Result<Mapping, MappingError> {
        let entries = self
            .pending
            .into_iter()
            .enumerate()
            .map(|(index, pending)| freeze(index, pending))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(entries = entries.len(), "mapping built");
        Ok(Mapping {
            entries,
            hooks: self.hooks,
        })
    }
}

fn freeze(index: usize, pending: PendingEntry) -> Result<Entry, MappingError> {
    if pending.patterns.is_empty() {
        return Err(MappingError::NoPatterns { index });
    }
    let mut snak_kind: Option<Kind> = None;
    let mut subject_kind: Option<Kind> = None;
    let mut value_kind: Option<Kind> = None;
    for pattern in &pending.patterns {
        let (subject, snak) = statement_parts(pattern).ok_or_else(|| MappingError::NotAStatement {
            index,
            pattern: pattern.to_string(),
        })?;
        let kind = snak.kind();
        if !kind.is_concrete() {
            return Err(MappingError::AbstractSnak {
                index,
                pattern: pattern.to_string(),
            });
        }
        match snak_kind {
            Some(first) if first != kind => {
                return Err(MappingError::MixedSnaks {
                    index,
                    first,
                    second: kind,
                })
            }
            _ => snak_kind = Some(kind),
        }
        subject_kind = Some(match subject_kind {
            Some(k) => widen(k, subject.kind()),
            None => subject.kind(),
        });
        if kind == Kind::ValueSnak {
            if let Some(value) = snak.args().and_then(|args| args.into_iter().nth(1).flatten()) {
                value_kind = Some(match value_kind {
                    Some(k) => widen(k, value.kind()),
                    None => value.kind(),
                });
            }
        }
    }
    let datatype = pending
        .datatype
        .or_else(|| value_kind.and_then(Datatype::of_kind));
    Ok(Entry {
        id: index,
        patterns: pending.patterns,
        snak_kind: snak_kind.unwrap_or(Kind::Snak),
        subject_kind: subject_kind.unwrap_or(Kind::Entity),
        datatype,
        callback: pending.callback,
    })
}

/// Subject and snak of a statement pattern.
fn statement_parts(pattern: &Term) -> Option<(Term, Term)> {
    if pattern.kind() != Kind::Statement {
        return None;
    }
    let mut args = pattern.args()?.into_iter();
    let subject = args.next().flatten()?;
    let snak = args.next().flatten()?;
    Some((subject, snak))
}

/// Least common superkind.
fn widen(a: Kind, b: Kind) -> Kind {
    let mut cur = Some(a);
    while let Some(k) = cur {
        if b.is_subkind_of(k) {
            return k;
        }
        cur = k.parent();
    }
    Kind::Term
}

/// A frozen, read-only sequence of entries.
#[derive(Clone)]
pub struct Mapping {
    entries: Vec<Entry>,
    hooks: Arc<dyn MappingHooks>,
}

impl Clone for Entry {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            patterns: self.patterns.clone(),
            snak_kind: self.snak_kind,
            subject_kind: self.subject_kind,
            datatype: self.datatype,
            callback: Arc::clone(&self.callback),
        }
    }
}

impl Mapping {
    pub fn builder() -> MappingBuilder {
        MappingBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&Entry> {
        self.entries.get(id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn hooks(&self) -> &Arc<dyn MappingHooks> {
        &self.hooks
    }
}

impl Index<usize> for Mapping {
    type Output = Entry;

    fn index(&self, id: usize) -> &Entry {
        &self.entries[id]
    }
}

impl<'a> IntoIterator for &'a Mapping {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Callback arguments
// ============================================================================

/// What a pattern variable resolved to for one branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    /// Still open; bound by the query to this variable.
    Var(Node),
    /// Fixed by the filter.
    Value(ClosedTerm),
    /// The optional component is absent.
    Absent,
}

impl Arg {
    pub fn is_absent(&self) -> bool {
        matches!(self, Arg::Absent)
    }

    pub fn as_value(&self) -> Option<&ClosedTerm> {
        match self {
            Arg::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Pattern variable name → resolved argument.
#[derive(Debug, Clone, Default)]
pub struct Args {
    args: AHashMap<String, Arg>,
}

impl Args {
    pub(crate) fn insert(&mut self, name: impl Into<String>, arg: Arg) {
        self.args.insert(name.into(), arg);
    }

    /// A missing variable means the entry cannot serve this filter.
    pub fn get(&self, name: &str) -> Result<&Arg, EntryError> {
        self.args.get(name).ok_or(EntryError::Skip)
    }

    pub fn is_absent(&self, name: &str) -> bool {
        self.args.get(name).is_some_and(Arg::is_absent)
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// One `UNION` branch under construction, as seen by an entry callback.
pub struct Branch<'a, 'b> {
    group: &'a mut GroupBuilder<'b>,
    hooks: &'a dyn MappingHooks,
    filter: &'a Filter,
    options: &'a CompilerOptions,
    rank: Option<String>,
}

impl<'a, 'b> Branch<'a, 'b> {
    pub(crate) fn new(
        group: &'a mut GroupBuilder<'b>,
        hooks: &'a dyn MappingHooks,
        filter: &'a Filter,
        options: &'a CompilerOptions,
    ) -> Self {
        Self {
            group,
            hooks,
            filter,
            options,
            rank: None,
        }
    }

    /// The query node for `arg`. Absent arguments skip the entry.
    pub fn node(&self, arg: &Arg) -> Result<Node, EntryError> {
        match arg {
            Arg::Var(node) => Ok(node.clone()),
            Arg::Value(value) => self
                .hooks
                .encode(value)
                .ok_or_else(|| EntryError::Failed(format!("cannot encode {value}"))),
            Arg::Absent => Err(EntryError::Skip),
        }
    }

    /// The filter being compiled. Nested snak constraints see a filter
    /// without masks.
    pub fn constraints(&self) -> &Filter {
        self.filter
    }

    pub fn options(&self) -> &CompilerOptions {
        self.options
    }

    pub fn hooks(&self) -> &dyn MappingHooks {
        self.hooks
    }

    /// Record the variable carrying the statement rank.
    pub fn set_rank_variable(&mut self, var: &Node) {
        self.rank = var.as_var().map(str::to_owned);
    }

    pub(crate) fn into_rank_variable(self) -> Option<String> {
        self.rank
    }
}

impl<'b> Deref for Branch<'_, 'b> {
    type Target = GroupBuilder<'b>;

    fn deref(&self) -> &Self::Target {
        &*self.group
    }
}

impl<'b> DerefMut for Branch<'_, 'b> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statgraph_term::Variable;

    fn pattern(snak: Term) -> Term {
        Term::statement(Variable::new("s", Kind::Item), snak).unwrap()
    }

    #[test]
    fn datatype_is_inferred_from_concrete_values() {
        let p = Variable::new("p", Kind::Property);
        let mapping = MappingBuilder::new()
            .register(
                [pattern(Term::value_snak(p.clone(), Variable::new("v", Kind::Quantity)).unwrap())],
                |_, _| Ok(()),
            )
            .register(
                [pattern(Term::value_snak(p.clone(), Variable::new("v", Kind::Value)).unwrap())],
                |_, _| Ok(()),
            )
            .register_with_datatype(
                [pattern(Term::no_value_snak(p).unwrap())],
                Datatype::Time,
                |_, _| Ok(()),
            )
            .build()
            .unwrap();
        assert_eq!(mapping[0].datatype(), Some(Datatype::Quantity));
        assert_eq!(mapping[1].datatype(), None);
        assert_eq!(mapping[2].datatype(), Some(Datatype::Time));
        assert_eq!(mapping[2].snak_kind(), Kind::NoValueSnak);
        assert_eq!(mapping[0].subject_kind(), Kind::Item);
    }

    #[test]
    fn widen_finds_the_least_common_superkind() {
        assert_eq!(widen(Kind::Item, Kind::Property), Kind::Entity);
        assert_eq!(widen(Kind::Item, Kind::Quantity), Kind::Value);
        assert_eq!(widen(Kind::Statement, Kind::Item), Kind::Term);
        assert_eq!(widen(Kind::ExternalId, Kind::String), Kind::String);
    }

    #[test]
    fn default_hooks_encode_entities_and_literals() {
        let hooks = DefaultHooks;
        assert_eq!(
            hooks.encode(&ClosedTerm::item("http://x/Q1")),
            Some(Node::iri("http://x/Q1"))
        );
        assert_eq!(
            hooks.encode(&ClosedTerm::text("hi", "en")),
            Some(Node::lang("hi", "en"))
        );
        assert_eq!(hooks.encode(&ClosedTerm::some_value_snak("http://x/P1")), None);
        assert_eq!(
            hooks.decode_iri("http://x/P1", Kind::Property),
            Some(ClosedTerm::property("http://x/P1"))
        );
        assert_eq!(hooks.decode_iri("http://x/P1", Kind::Quantity), None);
    }
}
