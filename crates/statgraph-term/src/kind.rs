//! The closed-term class lattice.
//!
//! Every term has a `Kind`. Concrete kinds (`Item`, `Quantity`, `Statement`,
//! ...) are the kinds a ground value can have; abstract kinds (`Entity`,
//! `DataValue`, `Snak`, ...) only ever appear as the declared kind of a
//! variable or as the expected kind of a constructor slot.
//!
//! ```text
//! Term
//! ├── Value
//! │   ├── Entity: Item, Property, Lexeme
//! │   └── DataValue
//! │       ├── ShallowDataValue: Iri, Text, String ⊐ ExternalId
//! │       └── DeepDataValue: Quantity, Time
//! ├── Snak: ValueSnak, SomeValueSnak, NoValueSnak
//! └── Statement
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    Term,
    Value,
    Entity,
    Item,
    Property,
    Lexeme,
    DataValue,
    ShallowDataValue,
    Iri,
    Text,
    String,
    ExternalId,
    DeepDataValue,
    Quantity,
    Time,
    Snak,
    ValueSnak,
    SomeValueSnak,
    NoValueSnak,
    Statement,
}

/// One argument position of a constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub kind: Kind,
    /// Optional ("deletable") slots may be absent.
    pub optional: bool,
}

const fn req(kind: Kind) -> Slot {
    Slot {
        kind,
        optional: false,
    }
}

const fn opt(kind: Kind) -> Slot {
    Slot {
        kind,
        optional: true,
    }
}

const IRI_SLOTS: &[Slot] = &[req(Kind::String)];
const ENTITY_SLOTS: &[Slot] = &[req(Kind::Iri)];
const TEXT_SLOTS: &[Slot] = &[req(Kind::String), req(Kind::String)];
const QUANTITY_SLOTS: &[Slot] = &[
    req(Kind::Quantity),
    opt(Kind::Item),
    opt(Kind::Quantity),
    opt(Kind::Quantity),
];
const TIME_SLOTS: &[Slot] = &[
    req(Kind::Time),
    opt(Kind::Quantity),
    opt(Kind::Quantity),
    opt(Kind::Item),
];
const VALUE_SNAK_SLOTS: &[Slot] = &[req(Kind::Property), req(Kind::Value)];
const PROPERTY_ONLY_SLOTS: &[Slot] = &[req(Kind::Property)];
const STATEMENT_SLOTS: &[Slot] = &[req(Kind::Entity), req(Kind::Snak)];

impl Kind {
    pub const ALL: [Kind; 20] = [
        Kind::Term,
        Kind::Value,
        Kind::Entity,
        Kind::Item,
        Kind::Property,
        Kind::Lexeme,
        Kind::DataValue,
        Kind::ShallowDataValue,
        Kind::Iri,
        Kind::Text,
        Kind::String,
        Kind::ExternalId,
        Kind::DeepDataValue,
        Kind::Quantity,
        Kind::Time,
        Kind::Snak,
        Kind::ValueSnak,
        Kind::SomeValueSnak,
        Kind::NoValueSnak,
        Kind::Statement,
    ];

    /// Immediate superkind, `None` for the root.
    pub fn parent(self) -> Option<Kind> {
        use Kind::*;
        Some(match self {
            Term => return None,
            Value | Snak | Statement => Term,
            Entity | DataValue => Value,
            Item | Property | Lexeme => Entity,
            ShallowDataValue | DeepDataValue => DataValue,
            Iri | Text | String => ShallowDataValue,
            ExternalId => String,
            Quantity | Time => DeepDataValue,
            ValueSnak | SomeValueSnak | NoValueSnak => Snak,
        })
    }

    /// Reflexive subkind test: `self ⊑ other`.
    pub fn is_subkind_of(self, other: Kind) -> bool {
        let mut cur = Some(self);
        while let Some(k) = cur {
            if k == other {
                return true;
            }
            cur = k.parent();
        }
        false
    }

    /// Strict subkind test: `self ⊏ other`.
    pub fn is_strict_subkind_of(self, other: Kind) -> bool {
        self != other && self.is_subkind_of(other)
    }

    /// Two kinds are coercible when one is a subkind of the other.
    pub fn is_coercible_with(self, other: Kind) -> bool {
        self.is_subkind_of(other) || other.is_subkind_of(self)
    }

    /// The more specific of two coercible kinds.
    pub fn meet(self, other: Kind) -> Option<Kind> {
        if self.is_subkind_of(other) {
            Some(self)
        } else if other.is_subkind_of(self) {
            Some(other)
        } else {
            None
        }
    }

    /// Whether ground values of exactly this kind exist.
    pub fn is_concrete(self) -> bool {
        use Kind::*;
        matches!(
            self,
            Item | Property
                | Lexeme
                | Iri
                | Text
                | String
                | ExternalId
                | Quantity
                | Time
                | ValueSnak
                | SomeValueSnak
                | NoValueSnak
                | Statement
        )
    }

    /// Constructor slots for kinds that can be templated.
    ///
    /// Leaf kinds (`String`, `ExternalId`) and abstract kinds have no
    /// constructor and return `None`.
    pub fn signature(self) -> Option<&'static [Slot]> {
        use Kind::*;
        match self {
            Iri => Some(IRI_SLOTS),
            Item | Property | Lexeme => Some(ENTITY_SLOTS),
            Text => Some(TEXT_SLOTS),
            Quantity => Some(QUANTITY_SLOTS),
            Time => Some(TIME_SLOTS),
            ValueSnak => Some(VALUE_SNAK_SLOTS),
            SomeValueSnak | NoValueSnak => Some(PROPERTY_ONLY_SLOTS),
            Statement => Some(STATEMENT_SLOTS),
            _ => None,
        }
    }

    pub fn is_entity(self) -> bool {
        self.is_subkind_of(Kind::Entity)
    }

    pub fn is_snak(self) -> bool {
        self.is_subkind_of(Kind::Snak)
    }

    pub fn name(self) -> &'static str {
        use Kind::*;
        match self {
            Term => "Term",
            Value => "Value",
            Entity => "Entity",
            Item => "Item",
            Property => "Property",
            Lexeme => "Lexeme",
            DataValue => "DataValue",
            ShallowDataValue => "ShallowDataValue",
            Iri => "IRI",
            Text => "Text",
            String => "String",
            ExternalId => "ExternalId",
            DeepDataValue => "DeepDataValue",
            Quantity => "Quantity",
            Time => "Time",
            Snak => "Snak",
            ValueSnak => "ValueSnak",
            SomeValueSnak => "SomeValueSnak",
            NoValueSnak => "NoValueSnak",
            Statement => "Statement",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Datatype of a value, i.e. the concrete value kinds a property range can
/// name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Datatype {
    Item,
    Property,
    Lexeme,
    Iri,
    Text,
    String,
    ExternalId,
    Quantity,
    Time,
}

impl Datatype {
    pub const ALL: [Datatype; 9] = [
        Datatype::Item,
        Datatype::Property,
        Datatype::Lexeme,
        Datatype::Iri,
        Datatype::Text,
        Datatype::String,
        Datatype::ExternalId,
        Datatype::Quantity,
        Datatype::Time,
    ];

    /// The datatype of values of `kind`, if `kind` is a concrete value kind.
    pub fn of_kind(kind: Kind) -> Option<Datatype> {
        Some(match kind {
            Kind::Item => Datatype::Item,
            Kind::Property => Datatype::Property,
            Kind::Lexeme => Datatype::Lexeme,
            Kind::Iri => Datatype::Iri,
            Kind::Text => Datatype::Text,
            Kind::String => Datatype::String,
            Kind::ExternalId => Datatype::ExternalId,
            Kind::Quantity => Datatype::Quantity,
            Kind::Time => Datatype::Time,
            _ => return None,
        })
    }

    pub fn kind(self) -> Kind {
        match self {
            Datatype::Item => Kind::Item,
            Datatype::Property => Kind::Property,
            Datatype::Lexeme => Kind::Lexeme,
            Datatype::Iri => Kind::Iri,
            Datatype::Text => Kind::Text,
            Datatype::String => Kind::String,
            Datatype::ExternalId => Kind::ExternalId,
            Datatype::Quantity => Kind::Quantity,
            Datatype::Time => Kind::Time,
        }
    }

    pub fn is_entity(self) -> bool {
        matches!(self, Datatype::Item | Datatype::Property | Datatype::Lexeme)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind().name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_reaches_the_root() {
        for k in Kind::ALL {
            assert!(k.is_subkind_of(Kind::Term), "{k} is detached");
        }
    }

    #[test]
    fn coercion_follows_the_lattice() {
        assert!(Kind::Item.is_coercible_with(Kind::Entity));
        assert!(Kind::Entity.is_coercible_with(Kind::Item));
        assert!(!Kind::Item.is_coercible_with(Kind::Property));
        assert!(Kind::ExternalId.is_strict_subkind_of(Kind::String));
        assert_eq!(Kind::Entity.meet(Kind::Item), Some(Kind::Item));
        assert_eq!(Kind::Item.meet(Kind::Quantity), None);
    }

    #[test]
    fn only_concrete_kinds_have_datatypes_or_are_values() {
        for d in Datatype::ALL {
            assert_eq!(Datatype::of_kind(d.kind()), Some(d));
            assert!(d.kind().is_concrete());
        }
        assert_eq!(Datatype::of_kind(Kind::Entity), None);
    }
}
