use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;

use crate::term::Term;
use crate::variable::Variable;

/// A substitution: variable ↦ term, or variable ↦ absent.
///
/// Absent (`None`) is a binding in its own right: instantiating a variable
/// bound to absent deletes the optional component it occupies. A variable
/// with no entry at all is left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Theta(BTreeMap<Variable, Option<Term>>);

impl Theta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, variable: Variable, term: impl Into<Term>) -> &mut Self {
        self.0.insert(variable, Some(term.into()));
        self
    }

    pub fn bind_absent(&mut self, variable: Variable) -> &mut Self {
        self.0.insert(variable, None);
        self
    }

    pub fn insert(&mut self, variable: Variable, value: Option<Term>) -> Option<Option<Term>> {
        self.0.insert(variable, value)
    }

    /// `None` when unbound, `Some(None)` when bound to absent.
    pub fn get(&self, variable: &Variable) -> Option<Option<&Term>> {
        self.0.get(variable).map(Option::as_ref)
    }

    pub fn contains(&self, variable: &Variable) -> bool {
        self.0.contains_key(variable)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Variable, Option<&Term>)> {
        self.0.iter().map(|(v, t)| (v, t.as_ref()))
    }

    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.0.keys()
    }

    /// Look a binding up by name, ignoring the declared kind.
    pub fn get_by_name(&self, name: &str) -> Option<(&Variable, Option<&Term>)> {
        self.iter().find(|(v, _)| v.name() == name)
    }

    pub fn singleton(variable: Variable, value: Option<Term>) -> Self {
        let mut theta = Theta::new();
        theta.insert(variable, value);
        theta
    }
}

impl FromIterator<(Variable, Option<Term>)> for Theta {
    fn from_iter<I: IntoIterator<Item = (Variable, Option<Term>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Theta {
    type Item = (Variable, Option<Term>);
    type IntoIter = btree_map::IntoIter<Variable, Option<Term>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for Theta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (v, t)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match t {
                Some(t) => write!(f, "{v} ↦ {t}")?,
                None => write!(f, "{v} ↦ _")?,
            }
        }
        f.write_str("}")
    }
}
