use std::fmt;
use std::sync::Arc;

use crate::error::{Result, TermError};
use crate::kind::Kind;

/// A named, typed placeholder.
///
/// Two variables are equal when both name and declared kind agree; a
/// template keeps same-named occurrences at one kind (see
/// `Template` normalization).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable {
    name: Arc<str>,
    kind: Kind,
}

impl Variable {
    pub fn new(name: impl Into<Arc<str>>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// A variable that may stand for any term.
    pub fn any(name: impl Into<Arc<str>>) -> Self {
        Self::new(name, Kind::Term)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Re-declare this variable at `target`, narrowing or widening.
    pub fn coerce(&self, target: Kind) -> Result<Variable> {
        if !self.kind.is_coercible_with(target) {
            return Err(TermError::Coercion {
                name: self.name.to_string(),
                from: self.kind,
                to: target,
            });
        }
        Ok(Variable {
            name: self.name.clone(),
            kind: target,
        })
    }

    pub fn with_name(&self, name: impl Into<Arc<str>>) -> Variable {
        Variable::new(name, self.kind)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}:{}", self.name, self.kind)
    }
}

/// The default renamer: strip trailing digits from `name`, then count up
/// from zero (`x7` yields `x0`, `x1`, ...).
pub fn default_renamer(name: &str) -> impl Iterator<Item = String> {
    let base = name.trim_end_matches(|c: char| c.is_ascii_digit()).to_owned();
    (0u64..).map(move |i| format!("{base}{i}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coercion_is_bidirectional_within_the_lattice() {
        let x = Variable::new("x", Kind::Entity);
        assert_eq!(x.coerce(Kind::Item).unwrap().kind(), Kind::Item);
        assert_eq!(x.coerce(Kind::Value).unwrap().kind(), Kind::Value);
        assert!(matches!(
            x.coerce(Kind::Quantity),
            Err(TermError::Coercion { .. })
        ));
    }

    #[test]
    fn default_renamer_strips_trailing_digits() {
        let names: Vec<String> = default_renamer("subject12").take(3).collect();
        assert_eq!(names, vec!["subject0", "subject1", "subject2"]);
    }
}
