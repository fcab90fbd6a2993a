use thiserror::Error;

use crate::kind::Kind;

/// Errors raised while constructing or instantiating terms.
///
/// Unification never surfaces these: a failed unification is `None`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TermError {
    /// A value could not be coerced into the kind a position expects.
    #[error("cannot coerce {value} into {expected}{}", position_suffix(*.position))]
    Check {
        value: String,
        expected: Kind,
        position: Option<usize>,
    },

    /// A constructor got the wrong number of arguments.
    #[error("{kind} expects {expected} arguments, got {got}")]
    Arity {
        kind: Kind,
        expected: usize,
        got: usize,
    },

    /// A required argument was absent.
    #[error("{kind} argument {position} cannot be absent")]
    AbsentArgument { kind: Kind, position: usize },

    /// `kind` has no constructor (abstract or leaf kind).
    #[error("{0} cannot be constructed from arguments")]
    NotConstructible(Kind),

    /// Two same-named variables in a template have unrelated kinds.
    #[error("variable ?{name} occurs as both {first} and {second}")]
    InconsistentVariable {
        name: String,
        first: Kind,
        second: Kind,
    },

    /// A variable cannot be coerced to an unrelated kind.
    #[error("cannot coerce variable ?{name} of kind {from} to {to}")]
    Coercion { name: String, from: Kind, to: Kind },

    /// A substitution binds a variable to a value of an incompatible kind.
    #[error("cannot instantiate ?{variable}:{kind} with {value}")]
    Instantiation {
        variable: String,
        kind: Kind,
        value: String,
    },

    /// A literal payload failed to parse (time precision code, ...).
    #[error("invalid {what}: {value}")]
    InvalidLiteral { what: &'static str, value: String },
}

fn position_suffix(position: Option<usize>) -> String {
    match position {
        Some(i) => format!(" (argument {i})"),
        None => String::new(),
    }
}

impl TermError {
    pub(crate) fn check(value: impl ToString, expected: Kind, position: Option<usize>) -> Self {
        TermError::Check {
            value: value.to_string(),
            expected,
            position,
        }
    }
}

pub type Result<T> = std::result::Result<T, TermError>;
