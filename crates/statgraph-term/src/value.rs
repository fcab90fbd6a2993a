//! Closed (ground) terms.
//!
//! A `ClosedTerm` never contains variables. Each concrete variant pairs with
//! a constructor signature in [`Kind::signature`]; `args` decomposes a value
//! into argument terms along that signature and `from_args` rebuilds it.

use std::fmt;
use std::sync::Arc;

use bigdecimal::{BigDecimal, ToPrimitive};

use crate::error::{Result, TermError};
use crate::instant::Instant;
use crate::kind::{Datatype, Kind};
use crate::term::Term;

/// An IRI, shared cheaply between terms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Iri(Arc<str>);

impl Iri {
    pub fn new(iri: impl Into<Arc<str>>) -> Self {
        Self(iri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Iri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Iri {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for Iri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

/// A language-tagged string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Text {
    pub content: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Quantity {
    pub amount: BigDecimal,
    /// Unit item; absent for dimensionless quantities.
    pub unit: Option<Iri>,
    pub lower_bound: Option<BigDecimal>,
    pub upper_bound: Option<BigDecimal>,
}

impl Quantity {
    pub fn new(amount: BigDecimal) -> Self {
        Self {
            amount,
            unit: None,
            lower_bound: None,
            upper_bound: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<Iri>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_bounds(mut self, lower: BigDecimal, upper: BigDecimal) -> Self {
        self.lower_bound = Some(lower);
        self.upper_bound = Some(upper);
        self
    }
}

/// Wikidata time precision codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimePrecision {
    BillionYears = 0,
    HundredMillionYears = 1,
    TenMillionYears = 2,
    MillionYears = 3,
    HundredThousandYears = 4,
    TenThousandYears = 5,
    Millennium = 6,
    Century = 7,
    Decade = 8,
    Year = 9,
    Month = 10,
    Day = 11,
    Hour = 12,
    Minute = 13,
    Second = 14,
}

impl TimePrecision {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        use TimePrecision::*;
        Some(match code {
            0 => BillionYears,
            1 => HundredMillionYears,
            2 => TenMillionYears,
            3 => MillionYears,
            4 => HundredThousandYears,
            5 => TenThousandYears,
            6 => Millennium,
            7 => Century,
            8 => Decade,
            9 => Year,
            10 => Month,
            11 => Day,
            12 => Hour,
            13 => Minute,
            14 => Second,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Time {
    pub instant: Instant,
    pub precision: Option<TimePrecision>,
    /// Offset from UTC in minutes.
    pub timezone: Option<i32>,
    /// Calendar model item.
    pub calendar: Option<Iri>,
}

impl Time {
    pub fn new(instant: impl Into<Instant>) -> Self {
        Self {
            instant: instant.into(),
            precision: None,
            timezone: None,
            calendar: None,
        }
    }

    pub fn with_precision(mut self, precision: TimePrecision) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_timezone(mut self, minutes: i32) -> Self {
        self.timezone = Some(minutes);
        self
    }

    pub fn with_calendar(mut self, calendar: impl Into<Iri>) -> Self {
        self.calendar = Some(calendar.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueSnak {
    pub property: Iri,
    pub value: ClosedTerm,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Statement {
    pub subject: ClosedTerm,
    pub snak: ClosedTerm,
}

/// A ground value of some concrete kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClosedTerm {
    Item(Iri),
    Property(Iri),
    Lexeme(Iri),
    Iri(Iri),
    Text(Text),
    String(String),
    ExternalId(String),
    Quantity(Quantity),
    Time(Time),
    ValueSnak(Arc<ValueSnak>),
    SomeValueSnak(Iri),
    NoValueSnak(Iri),
    Statement(Arc<Statement>),
}

impl ClosedTerm {
    pub fn item(iri: impl Into<Iri>) -> Self {
        ClosedTerm::Item(iri.into())
    }

    pub fn property(iri: impl Into<Iri>) -> Self {
        ClosedTerm::Property(iri.into())
    }

    pub fn lexeme(iri: impl Into<Iri>) -> Self {
        ClosedTerm::Lexeme(iri.into())
    }

    pub fn iri(iri: impl Into<Iri>) -> Self {
        ClosedTerm::Iri(iri.into())
    }

    pub fn string(content: impl Into<String>) -> Self {
        ClosedTerm::String(content.into())
    }

    pub fn external_id(content: impl Into<String>) -> Self {
        ClosedTerm::ExternalId(content.into())
    }

    pub fn text(content: impl Into<String>, language: impl Into<String>) -> Self {
        ClosedTerm::Text(Text {
            content: content.into(),
            language: language.into(),
        })
    }

    pub fn quantity(amount: BigDecimal) -> Self {
        ClosedTerm::Quantity(Quantity::new(amount))
    }

    pub fn time(instant: impl Into<Instant>) -> Self {
        ClosedTerm::Time(Time::new(instant))
    }

    pub fn value_snak(property: impl Into<Iri>, value: ClosedTerm) -> Result<Self> {
        if !value.kind().is_subkind_of(Kind::Value) {
            return Err(TermError::check(&value, Kind::Value, Some(1)));
        }
        Ok(ClosedTerm::ValueSnak(Arc::new(ValueSnak {
            property: property.into(),
            value,
        })))
    }

    pub fn some_value_snak(property: impl Into<Iri>) -> Self {
        ClosedTerm::SomeValueSnak(property.into())
    }

    pub fn no_value_snak(property: impl Into<Iri>) -> Self {
        ClosedTerm::NoValueSnak(property.into())
    }

    pub fn statement(subject: ClosedTerm, snak: ClosedTerm) -> Result<Self> {
        if !subject.kind().is_entity() {
            return Err(TermError::check(&subject, Kind::Entity, Some(0)));
        }
        if !snak.kind().is_snak() {
            return Err(TermError::check(&snak, Kind::Snak, Some(1)));
        }
        Ok(ClosedTerm::Statement(Arc::new(Statement { subject, snak })))
    }

    pub fn kind(&self) -> Kind {
        match self {
            ClosedTerm::Item(_) => Kind::Item,
            ClosedTerm::Property(_) => Kind::Property,
            ClosedTerm::Lexeme(_) => Kind::Lexeme,
            ClosedTerm::Iri(_) => Kind::Iri,
            ClosedTerm::Text(_) => Kind::Text,
            ClosedTerm::String(_) => Kind::String,
            ClosedTerm::ExternalId(_) => Kind::ExternalId,
            ClosedTerm::Quantity(_) => Kind::Quantity,
            ClosedTerm::Time(_) => Kind::Time,
            ClosedTerm::ValueSnak(_) => Kind::ValueSnak,
            ClosedTerm::SomeValueSnak(_) => Kind::SomeValueSnak,
            ClosedTerm::NoValueSnak(_) => Kind::NoValueSnak,
            ClosedTerm::Statement(_) => Kind::Statement,
        }
    }

    pub fn datatype(&self) -> Option<Datatype> {
        Datatype::of_kind(self.kind())
    }

    /// The IRI of an entity or IRI value.
    pub fn as_iri(&self) -> Option<&Iri> {
        match self {
            ClosedTerm::Item(iri)
            | ClosedTerm::Property(iri)
            | ClosedTerm::Lexeme(iri)
            | ClosedTerm::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The property of a snak.
    pub fn snak_property(&self) -> Option<&Iri> {
        match self {
            ClosedTerm::ValueSnak(snak) => Some(&snak.property),
            ClosedTerm::SomeValueSnak(p) | ClosedTerm::NoValueSnak(p) => Some(p),
            _ => None,
        }
    }

    /// Decompose into constructor arguments; `None` for leaf kinds.
    pub fn args(&self) -> Option<Vec<Option<Term>>> {
        use ClosedTerm as C;
        fn closed(c: ClosedTerm) -> Option<Term> {
            Some(Term::Closed(c))
        }
        fn amount(a: &BigDecimal) -> Option<Term> {
            closed(ClosedTerm::quantity(a.clone()))
        }
        fn item(iri: &Iri) -> Option<Term> {
            closed(ClosedTerm::Item(iri.clone()))
        }
        Some(match self {
            C::Item(iri) | C::Property(iri) | C::Lexeme(iri) => vec![closed(C::Iri(iri.clone()))],
            C::Iri(iri) => vec![closed(C::String(iri.as_str().to_owned()))],
            C::Text(t) => vec![
                closed(C::String(t.content.clone())),
                closed(C::String(t.language.clone())),
            ],
            C::String(_) | C::ExternalId(_) => return None,
            C::Quantity(q) => vec![
                amount(&q.amount),
                q.unit.as_ref().and_then(item),
                q.lower_bound.as_ref().and_then(amount),
                q.upper_bound.as_ref().and_then(amount),
            ],
            C::Time(t) => vec![
                closed(C::time(t.instant)),
                t.precision
                    .and_then(|p| amount(&BigDecimal::from(p.code() as i32))),
                t.timezone.and_then(|z| amount(&BigDecimal::from(z))),
                t.calendar.as_ref().and_then(item),
            ],
            C::ValueSnak(snak) => vec![
                closed(C::Property(snak.property.clone())),
                closed(snak.value.clone()),
            ],
            C::SomeValueSnak(p) | C::NoValueSnak(p) => vec![closed(C::Property(p.clone()))],
            C::Statement(stmt) => vec![closed(stmt.subject.clone()), closed(stmt.snak.clone())],
        })
    }

    /// Rebuild a value of `kind` from ground arguments.
    ///
    /// Arity and slot kinds are expected to be checked by the caller
    /// (`Term::construct`); violations still surface as `TermError`.
    pub(crate) fn from_args(kind: Kind, args: Vec<Option<ClosedTerm>>) -> Result<ClosedTerm> {
        let slots = kind.signature().ok_or(TermError::NotConstructible(kind))?;
        if args.len() != slots.len() {
            return Err(TermError::Arity {
                kind,
                expected: slots.len(),
                got: args.len(),
            });
        }
        let mut args = args.into_iter();
        let mut next = || args.next().flatten();
        Ok(match kind {
            Kind::Iri => ClosedTerm::Iri(Iri::new(string_arg(kind, next(), 0)?)),
            Kind::Item => ClosedTerm::Item(iri_arg(kind, next(), 0)?),
            Kind::Property => ClosedTerm::Property(iri_arg(kind, next(), 0)?),
            Kind::Lexeme => ClosedTerm::Lexeme(iri_arg(kind, next(), 0)?),
            Kind::Text => {
                let content = string_arg(kind, next(), 0)?;
                let language = string_arg(kind, next(), 1)?;
                ClosedTerm::Text(Text { content, language })
            }
            Kind::Quantity => {
                let amount = amount_arg(kind, next(), 0)?;
                let unit = next().map(|u| entity_iri(u, Kind::Item, 1)).transpose()?;
                let lower_bound = next().map(|b| amount_of(b, 2)).transpose()?;
                let upper_bound = next().map(|b| amount_of(b, 3)).transpose()?;
                ClosedTerm::Quantity(Quantity {
                    amount,
                    unit,
                    lower_bound,
                    upper_bound,
                })
            }
            Kind::Time => {
                let instant = match next() {
                    Some(ClosedTerm::Time(t)) => t.instant,
                    Some(other) => return Err(TermError::check(&other, Kind::Time, Some(0))),
                    None => return Err(TermError::AbsentArgument { kind, position: 0 }),
                };
                let precision = next()
                    .map(|p| {
                        let code = amount_of(p, 1)?;
                        code.to_u8()
                            .filter(|_| code.is_integer())
                            .and_then(TimePrecision::from_code)
                            .ok_or_else(|| TermError::InvalidLiteral {
                                what: "time precision",
                                value: code.to_string(),
                            })
                    })
                    .transpose()?;
                let timezone = next()
                    .map(|z| {
                        let minutes = amount_of(z, 2)?;
                        minutes
                            .to_i32()
                            .filter(|_| minutes.is_integer())
                            .ok_or_else(|| TermError::InvalidLiteral {
                                what: "timezone",
                                value: minutes.to_string(),
                            })
                    })
                    .transpose()?;
                let calendar = next().map(|c| entity_iri(c, Kind::Item, 3)).transpose()?;
                ClosedTerm::Time(Time {
                    instant,
                    precision,
                    timezone,
                    calendar,
                })
            }
            Kind::ValueSnak => {
                let property = iri_of(kind, next(), Kind::Property, 0)?;
                let value = next().ok_or(TermError::AbsentArgument { kind, position: 1 })?;
                ClosedTerm::value_snak(property, value)?
            }
            Kind::SomeValueSnak => {
                ClosedTerm::SomeValueSnak(iri_of(kind, next(), Kind::Property, 0)?)
            }
            Kind::NoValueSnak => ClosedTerm::NoValueSnak(iri_of(kind, next(), Kind::Property, 0)?),
            Kind::Statement => {
                let subject = next().ok_or(TermError::AbsentArgument { kind, position: 0 })?;
                let snak = next().ok_or(TermError::AbsentArgument { kind, position: 1 })?;
                ClosedTerm::statement(subject, snak)?
            }
            _ => unreachable!("{kind} has a signature but no ground constructor"),
        })
    }
}

fn string_arg(kind: Kind, arg: Option<ClosedTerm>, position: usize) -> Result<String> {
    match arg {
        Some(ClosedTerm::String(s)) | Some(ClosedTerm::ExternalId(s)) => Ok(s),
        Some(other) => Err(TermError::check(&other, Kind::String, Some(position))),
        None => Err(TermError::AbsentArgument { kind, position }),
    }
}

fn iri_arg(kind: Kind, arg: Option<ClosedTerm>, position: usize) -> Result<Iri> {
    match arg {
        Some(ClosedTerm::Iri(iri)) => Ok(iri),
        Some(other) => Err(TermError::check(&other, Kind::Iri, Some(position))),
        None => Err(TermError::AbsentArgument { kind, position }),
    }
}

fn iri_of(kind: Kind, arg: Option<ClosedTerm>, expected: Kind, position: usize) -> Result<Iri> {
    match arg {
        Some(term) => entity_iri(term, expected, position),
        None => Err(TermError::AbsentArgument { kind, position }),
    }
}

fn entity_iri(term: ClosedTerm, expected: Kind, position: usize) -> Result<Iri> {
    if term.kind() != expected {
        return Err(TermError::check(&term, expected, Some(position)));
    }
    match term {
        ClosedTerm::Item(iri) | ClosedTerm::Property(iri) | ClosedTerm::Lexeme(iri) => Ok(iri),
        other => Err(TermError::check(&other, expected, Some(position))),
    }
}

fn amount_arg(kind: Kind, arg: Option<ClosedTerm>, position: usize) -> Result<BigDecimal> {
    match arg {
        Some(term) => amount_of(term, position),
        None => Err(TermError::AbsentArgument { kind, position }),
    }
}

fn amount_of(term: ClosedTerm, position: usize) -> Result<BigDecimal> {
    match term {
        ClosedTerm::Quantity(q) => Ok(q.amount),
        other => Err(TermError::check(&other, Kind::Quantity, Some(position))),
    }
}

impl From<Quantity> for ClosedTerm {
    fn from(value: Quantity) -> Self {
        ClosedTerm::Quantity(value)
    }
}

impl From<Time> for ClosedTerm {
    fn from(value: Time) -> Self {
        ClosedTerm::Time(value)
    }
}

fn fmt_opt<T: fmt::Display>(f: &mut fmt::Formatter<'_>, value: Option<T>) -> fmt::Result {
    match value {
        Some(v) => write!(f, ", {v}"),
        None => f.write_str(", _"),
    }
}

impl fmt::Display for ClosedTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedTerm::Item(iri) => write!(f, "Item({iri})"),
            ClosedTerm::Property(iri) => write!(f, "Property({iri})"),
            ClosedTerm::Lexeme(iri) => write!(f, "Lexeme({iri})"),
            ClosedTerm::Iri(iri) => write!(f, "{iri}"),
            ClosedTerm::Text(t) => write!(f, "Text({:?}, {:?})", t.content, t.language),
            ClosedTerm::String(s) => write!(f, "{s:?}"),
            ClosedTerm::ExternalId(s) => write!(f, "ExternalId({s:?})"),
            ClosedTerm::Quantity(q) => {
                write!(f, "Quantity({}", q.amount)?;
                if q.unit.is_some() || q.lower_bound.is_some() || q.upper_bound.is_some() {
                    fmt_opt(f, q.unit.as_ref().map(|u| ClosedTerm::Item(u.clone())))?;
                    fmt_opt(f, q.lower_bound.as_ref())?;
                    fmt_opt(f, q.upper_bound.as_ref())?;
                }
                f.write_str(")")
            }
            ClosedTerm::Time(t) => {
                write!(f, "Time({}", t.instant)?;
                if t.precision.is_some() || t.timezone.is_some() || t.calendar.is_some() {
                    fmt_opt(f, t.precision.map(|p| p.code()))?;
                    fmt_opt(f, t.timezone)?;
                    fmt_opt(f, t.calendar.as_ref().map(|c| ClosedTerm::Item(c.clone())))?;
                }
                f.write_str(")")
            }
            ClosedTerm::ValueSnak(s) => write!(f, "ValueSnak(Property({}), {})", s.property, s.value),
            ClosedTerm::SomeValueSnak(p) => write!(f, "SomeValueSnak(Property({p}))"),
            ClosedTerm::NoValueSnak(p) => write!(f, "NoValueSnak(Property({p}))"),
            ClosedTerm::Statement(s) => write!(f, "Statement({}, {})", s.subject, s.snak),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn quantity_decomposes_and_rebuilds() {
        let q = ClosedTerm::from(Quantity::new(dec("2.5")).with_unit("http://u/kg"));
        let args = q.args().unwrap();
        assert_eq!(args.len(), 4);
        assert!(args[2].is_none() && args[3].is_none());
        let ground: Vec<Option<ClosedTerm>> = args
            .into_iter()
            .map(|a| a.map(|t| t.into_closed().unwrap()))
            .collect();
        assert_eq!(ClosedTerm::from_args(Kind::Quantity, ground).unwrap(), q);
    }

    #[test]
    fn statement_rejects_non_entity_subject() {
        let snak = ClosedTerm::some_value_snak("http://p/P1");
        let err = ClosedTerm::statement(ClosedTerm::string("x"), snak).unwrap_err();
        assert!(matches!(
            err,
            TermError::Check {
                expected: Kind::Entity,
                position: Some(0),
                ..
            }
        ));
    }

    #[test]
    fn invalid_precision_code_is_rejected() {
        let args = vec![
            Some(ClosedTerm::time(Instant::new(2020, 1, 1))),
            Some(ClosedTerm::quantity(dec("99"))),
            None,
            None,
        ];
        assert!(matches!(
            ClosedTerm::from_args(Kind::Time, args),
            Err(TermError::InvalidLiteral { .. })
        ));
    }
}
