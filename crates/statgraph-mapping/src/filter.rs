//! Filters: what a client asks the compiler for.
//!
//! A filter constrains the subject, property and value of the statements to
//! match (one `Fingerprint` each) and narrows them further with bit masks
//! over snak kinds, ranks and datatypes. Filters are validated and
//! normalized once, in `FilterBuilder::build`.

use std::ops::{BitAnd, BitOr};

use statgraph_term::{ClosedTerm, Datatype, Kind};

use crate::error::FilterError;

// ============================================================================
// Fingerprints
// ============================================================================

/// One constraint component of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fingerprint {
    /// Matches anything.
    Full,
    /// Matches nothing.
    Empty,
    /// Equal to the given value.
    Value(ClosedTerm),
    /// An entity having every one of the given snaks.
    Snaks(Vec<ClosedTerm>),
    /// Any of the alternatives.
    Or(Vec<Fingerprint>),
}

impl Default for Fingerprint {
    fn default() -> Self {
        Fingerprint::Full
    }
}

/// A leaf of a normalized fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Alternative<'a> {
    Any,
    Value(&'a ClosedTerm),
    Snaks(&'a [ClosedTerm]),
}

impl Fingerprint {
    pub fn value(value: impl Into<ClosedTerm>) -> Self {
        Fingerprint::Value(value.into())
    }

    pub fn snaks(snaks: impl IntoIterator<Item = ClosedTerm>) -> Self {
        Fingerprint::Snaks(snaks.into_iter().collect())
    }

    pub fn or(alternatives: impl IntoIterator<Item = Fingerprint>) -> Self {
        Fingerprint::Or(alternatives.into_iter().collect())
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Fingerprint::Full)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Fingerprint::Empty)
    }

    /// Flatten nested `Or`s, drop `Empty` alternatives and apply the
    /// full/empty reductions.
    pub fn normalize(self) -> Fingerprint {
        match self {
            Fingerprint::Snaks(snaks) if snaks.is_empty() => Fingerprint::Full,
            Fingerprint::Or(alternatives) => {
                let mut flat: Vec<Fingerprint> = Vec::new();
                for alt in alternatives {
                    match alt.normalize() {
                        Fingerprint::Full => return Fingerprint::Full,
                        Fingerprint::Empty => {}
                        Fingerprint::Or(inner) => {
                            for fp in inner {
                                push_unique(&mut flat, fp);
                            }
                        }
                        other => push_unique(&mut flat, other),
                    }
                }
                match flat.len() {
                    0 => Fingerprint::Empty,
                    1 => flat.swap_remove(0),
                    _ => Fingerprint::Or(flat),
                }
            }
            other => other,
        }
    }

    /// Leaves of this (normalized) fingerprint.
    pub(crate) fn alternatives(&self) -> Vec<Alternative<'_>> {
        match self {
            Fingerprint::Full => vec![Alternative::Any],
            Fingerprint::Empty => Vec::new(),
            Fingerprint::Value(v) => vec![Alternative::Value(v)],
            Fingerprint::Snaks(snaks) if snaks.is_empty() => vec![Alternative::Any],
            Fingerprint::Snaks(snaks) => vec![Alternative::Snaks(snaks)],
            Fingerprint::Or(alts) => alts.iter().flat_map(Fingerprint::alternatives).collect(),
        }
    }

    fn leaves(&self) -> Vec<&Fingerprint> {
        match self {
            Fingerprint::Or(alts) => alts.iter().flat_map(Fingerprint::leaves).collect(),
            other => vec![other],
        }
    }

    fn retain_values(self, keep: &impl Fn(&ClosedTerm) -> bool) -> Fingerprint {
        match self {
            Fingerprint::Value(v) if !keep(&v) => Fingerprint::Empty,
            Fingerprint::Or(alts) => {
                Fingerprint::Or(alts.into_iter().map(|fp| fp.retain_values(keep)).collect())
            }
            other => other,
        }
    }
}

fn push_unique(flat: &mut Vec<Fingerprint>, fp: Fingerprint) {
    if !flat.contains(&fp) {
        flat.push(fp);
    }
}

// ============================================================================
// Masks
// ============================================================================

macro_rules! bit_mask {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$flag_meta:meta])* $flag:ident = $bit:expr),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u16);

        impl $name {
            $($(#[$flag_meta])* pub const $flag: Self = Self(1 << $bit);)+
            pub const NONE: Self = Self(0);
            pub const ALL: Self = Self(0 $(| (1 << $bit))+);

            pub const fn bits(self) -> u16 {
                self.0
            }

            /// Unknown bits are dropped.
            pub const fn from_bits_truncate(bits: u16) -> Self {
                Self(bits & Self::ALL.0)
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            pub const fn is_all(self) -> bool {
                self.0 == Self::ALL.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: Self) -> bool {
                self.0 & other.0 != 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::ALL
            }
        }

        impl BitOr for $name {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl BitAnd for $name {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }
    };
}

bit_mask! {
    /// Snak kinds a filter accepts.
    SnakMask {
        VALUE_SNAK = 0,
        SOME_VALUE_SNAK = 1,
        NO_VALUE_SNAK = 2,
    }
}

bit_mask! {
    /// Statement ranks a filter accepts.
    RankMask {
        PREFERRED = 0,
        NORMAL = 1,
        DEPRECATED = 2,
    }
}

bit_mask! {
    /// One bit per concrete datatype.
    DatatypeMask {
        ITEM = 0,
        PROPERTY = 1,
        LEXEME = 2,
        IRI = 3,
        TEXT = 4,
        STRING = 5,
        EXTERNAL_ID = 6,
        QUANTITY = 7,
        TIME = 8,
    }
}

impl SnakMask {
    pub fn of_kind(kind: Kind) -> Self {
        match kind {
            Kind::ValueSnak => Self::VALUE_SNAK,
            Kind::SomeValueSnak => Self::SOME_VALUE_SNAK,
            Kind::NoValueSnak => Self::NO_VALUE_SNAK,
            Kind::Snak => Self::ALL,
            _ => Self::NONE,
        }
    }
}

impl RankMask {
    pub fn of(rank: Rank) -> Self {
        match rank {
            Rank::Preferred => Self::PREFERRED,
            Rank::Normal => Self::NORMAL,
            Rank::Deprecated => Self::DEPRECATED,
        }
    }

    pub fn ranks(self) -> impl Iterator<Item = Rank> {
        Rank::ALL.into_iter().filter(move |r| self.contains(RankMask::of(*r)))
    }
}

impl DatatypeMask {
    pub const ENTITIES: Self = Self(Self::ITEM.0 | Self::PROPERTY.0 | Self::LEXEME.0);

    pub fn of(datatype: Datatype) -> Self {
        match datatype {
            Datatype::Item => Self::ITEM,
            Datatype::Property => Self::PROPERTY,
            Datatype::Lexeme => Self::LEXEME,
            Datatype::Iri => Self::IRI,
            Datatype::Text => Self::TEXT,
            Datatype::String => Self::STRING,
            Datatype::ExternalId => Self::EXTERNAL_ID,
            Datatype::Quantity => Self::QUANTITY,
            Datatype::Time => Self::TIME,
        }
    }

    /// Every datatype whose values may stand where `kind` is expected.
    pub fn of_kind(kind: Kind) -> Self {
        Datatype::ALL
            .into_iter()
            .filter(|d| d.kind().is_subkind_of(kind))
            .fold(Self::NONE, |mask, d| mask | Self::of(d))
    }

    pub fn contains_datatype(self, datatype: Datatype) -> bool {
        self.contains(Self::of(datatype))
    }
}

const WIKIBASE: &str = "http://wikiba.se/ontology#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rank {
    Preferred,
    Normal,
    Deprecated,
}

impl Rank {
    pub const ALL: [Rank; 3] = [Rank::Preferred, Rank::Normal, Rank::Deprecated];

    fn local_name(self) -> &'static str {
        match self {
            Rank::Preferred => "PreferredRank",
            Rank::Normal => "NormalRank",
            Rank::Deprecated => "DeprecatedRank",
        }
    }

    pub fn iri(self) -> String {
        format!("{WIKIBASE}{}", self.local_name())
    }

    pub fn from_iri(iri: &str) -> Option<Rank> {
        let local = iri.strip_prefix(WIKIBASE)?;
        Rank::ALL.into_iter().find(|r| r.local_name() == local)
    }
}

// ============================================================================
// Filter
// ============================================================================

/// A validated, normalized filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    subject: Fingerprint,
    property: Fingerprint,
    value: Fingerprint,
    snak_mask: SnakMask,
    subject_mask: DatatypeMask,
    property_mask: DatatypeMask,
    value_mask: DatatypeMask,
    rank_mask: RankMask,
    language: Option<String>,
    annotated: bool,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            subject: Fingerprint::Full,
            property: Fingerprint::Full,
            value: Fingerprint::Full,
            snak_mask: SnakMask::ALL,
            subject_mask: DatatypeMask::ENTITIES,
            property_mask: DatatypeMask::ALL,
            value_mask: DatatypeMask::ALL,
            rank_mask: RankMask::ALL,
            language: None,
            annotated: false,
        }
    }
}

impl Filter {
    pub fn builder() -> FilterBuilder {
        FilterBuilder::default()
    }

    pub fn subject(&self) -> &Fingerprint {
        &self.subject
    }

    pub fn property(&self) -> &Fingerprint {
        &self.property
    }

    pub fn value(&self) -> &Fingerprint {
        &self.value
    }

    pub fn snak_mask(&self) -> SnakMask {
        self.snak_mask
    }

    pub fn subject_mask(&self) -> DatatypeMask {
        self.subject_mask
    }

    /// Range datatypes of the properties to match.
    pub fn property_mask(&self) -> DatatypeMask {
        self.property_mask
    }

    pub fn value_mask(&self) -> DatatypeMask {
        self.value_mask
    }

    pub fn rank_mask(&self) -> RankMask {
        self.rank_mask
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    /// Whether matched statements should carry their rank.
    pub fn annotated(&self) -> bool {
        self.annotated
    }

    /// True when no statement can match.
    pub fn is_empty(&self) -> bool {
        self.snak_mask.is_empty()
            || self.rank_mask.is_empty()
            || !self.subject_mask.intersects(DatatypeMask::ENTITIES)
            || self.property_mask.is_empty()
            || self.value_mask.is_empty()
            || self.subject.is_empty()
            || self.property.is_empty()
            || self.value.is_empty()
            || (!self.value.is_full() && !self.snak_mask.contains(SnakMask::VALUE_SNAK))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterBuilder {
    filter: Filter,
}

impl FilterBuilder {
    pub fn subject(mut self, fingerprint: Fingerprint) -> Self {
        self.filter.subject = fingerprint;
        self
    }

    pub fn property(mut self, fingerprint: Fingerprint) -> Self {
        self.filter.property = fingerprint;
        self
    }

    pub fn value(mut self, fingerprint: Fingerprint) -> Self {
        self.filter.value = fingerprint;
        self
    }

    pub fn snak_mask(mut self, mask: SnakMask) -> Self {
        self.filter.snak_mask = mask;
        self
    }

    pub fn subject_mask(mut self, mask: DatatypeMask) -> Self {
        self.filter.subject_mask = mask;
        self
    }

    pub fn property_mask(mut self, mask: DatatypeMask) -> Self {
        self.filter.property_mask = mask;
        self
    }

    pub fn value_mask(mut self, mask: DatatypeMask) -> Self {
        self.filter.value_mask = mask;
        self
    }

    pub fn rank_mask(mut self, mask: RankMask) -> Self {
        self.filter.rank_mask = mask;
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.filter.language = Some(language.into());
        self
    }

    pub fn annotated(mut self, annotated: bool) -> Self {
        self.filter.annotated = annotated;
        self
    }

    pub fn build(self) -> Result<Filter, FilterError> {
        let mut filter = self.filter;

        for leaf in filter.subject.leaves() {
            match leaf {
                Fingerprint::Value(v) if !v.kind().is_entity() => {
                    return Err(FilterError::Subject(v.to_string()))
                }
                Fingerprint::Snaks(snaks) => check_snaks(snaks)?,
                _ => {}
            }
        }
        for leaf in filter.property.leaves() {
            match leaf {
                Fingerprint::Value(v) if v.kind() != Kind::Property => {
                    return Err(FilterError::Property(v.to_string()))
                }
                Fingerprint::Snaks(_) => return Err(FilterError::PropertySnaks),
                _ => {}
            }
        }
        for leaf in filter.value.leaves() {
            match leaf {
                Fingerprint::Value(v) if !v.kind().is_subkind_of(Kind::Value) => {
                    return Err(FilterError::Value(v.to_string()))
                }
                Fingerprint::Snaks(snaks) => check_snaks(snaks)?,
                _ => {}
            }
        }
        if filter.language.as_deref() == Some("") {
            return Err(FilterError::EmptyLanguage);
        }

        let (subject_mask, value_mask) = (filter.subject_mask, filter.value_mask);
        let within = |mask: DatatypeMask| {
            move |v: &ClosedTerm| v.datatype().is_some_and(|d| mask.contains_datatype(d))
        };
        filter.subject = filter.subject.retain_values(&within(subject_mask)).normalize();
        filter.property = filter.property.normalize();
        filter.value = filter.value.retain_values(&within(value_mask)).normalize();
        Ok(filter)
    }
}

fn check_snaks(snaks: &[ClosedTerm]) -> Result<(), FilterError> {
    match snaks.iter().find(|s| !s.kind().is_snak()) {
        Some(bad) => Err(FilterError::Snak(bad.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const Q5: &str = "http://www.wikidata.org/entity/Q5";

    #[test]
    fn or_normalization_flattens_and_reduces() {
        let a = Fingerprint::value(ClosedTerm::item(Q5));
        let nested = Fingerprint::or([
            Fingerprint::Empty,
            Fingerprint::or([a.clone(), Fingerprint::Empty]),
            a.clone(),
        ]);
        assert_eq!(nested.normalize(), a);
        assert_eq!(Fingerprint::or([]).normalize(), Fingerprint::Empty);
        assert_eq!(
            Fingerprint::or([a, Fingerprint::Full]).normalize(),
            Fingerprint::Full
        );
        assert_eq!(Fingerprint::snaks([]).normalize(), Fingerprint::Full);
    }

    #[test]
    fn datatype_mask_of_abstract_kinds() {
        assert_eq!(DatatypeMask::of_kind(Kind::Entity), DatatypeMask::ENTITIES);
        assert_eq!(
            DatatypeMask::of_kind(Kind::String),
            DatatypeMask::STRING | DatatypeMask::EXTERNAL_ID
        );
        assert!(DatatypeMask::of_kind(Kind::Value).is_all());
    }

    #[test]
    fn rank_iris_round_trip() {
        for rank in Rank::ALL {
            assert_eq!(Rank::from_iri(&rank.iri()), Some(rank));
        }
        assert_eq!(Rank::from_iri("http://example.org/Rank"), None);
    }

    #[test]
    fn values_outside_the_mask_empty_the_filter() {
        let filter = Filter::builder()
            .value(Fingerprint::value(ClosedTerm::item(Q5)))
            .value_mask(DatatypeMask::QUANTITY)
            .build()
            .unwrap();
        assert!(filter.value().is_empty());
        assert!(filter.is_empty());
    }
}
