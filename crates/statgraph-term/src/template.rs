//! Templates: constructor applications with at least one open argument.
//!
//! Construction always normalizes: every variable name occurring in a
//! template is redeclared at the most specific kind among its occurrences,
//! and construction fails when two occurrences have unrelated kinds.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::error::{Result, TermError};
use crate::kind::Kind;
use crate::term::Term;
use crate::theta::Theta;
use crate::variable::Variable;

#[derive(Clone)]
pub struct Template(Arc<Inner>);

struct Inner {
    kind: Kind,
    args: Vec<Option<Term>>,
    /// Free variables, derived on first use. Terms are immutable so the
    /// cached set never goes stale.
    variables: OnceLock<BTreeSet<Variable>>,
}

impl Template {
    /// Build and normalize. Arguments must already be checked against the
    /// signature of `kind` (see `Term::construct`).
    pub(crate) fn new(kind: Kind, args: Vec<Option<Term>>) -> Result<Template> {
        let template = Template::raw(kind, args);

        let mut canonical: BTreeMap<&str, Kind> = BTreeMap::new();
        for v in template.variables() {
            let kind = match canonical.get(v.name()) {
                None => v.kind(),
                Some(&seen) => seen.meet(v.kind()).ok_or_else(|| TermError::InconsistentVariable {
                    name: v.name().to_owned(),
                    first: seen,
                    second: v.kind(),
                })?,
            };
            canonical.insert(v.name(), kind);
        }

        let theta: Theta = template
            .variables()
            .iter()
            .filter_map(|v| {
                let kind = canonical.get(v.name()).copied()?;
                (kind != v.kind()).then(|| (v.clone(), Some(Term::Variable(Variable::new(v.name(), kind)))))
            })
            .collect();
        if theta.is_empty() {
            return Ok(template);
        }

        let args = template
            .args()
            .iter()
            .map(|arg| match arg {
                Some(t) => t.instantiate_with(&theta, false, true),
                None => Ok(None),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Template::raw(kind, args))
    }

    fn raw(kind: Kind, args: Vec<Option<Term>>) -> Template {
        Template(Arc::new(Inner {
            kind,
            args,
            variables: OnceLock::new(),
        }))
    }

    pub fn kind(&self) -> Kind {
        self.0.kind
    }

    pub fn args(&self) -> &[Option<Term>] {
        &self.0.args
    }

    /// Free variables of this template (memoized).
    pub fn variables(&self) -> &BTreeSet<Variable> {
        self.0.variables.get_or_init(|| {
            let mut vars = BTreeSet::new();
            for arg in self.0.args.iter().flatten() {
                match arg {
                    Term::Closed(_) => {}
                    Term::Variable(v) => {
                        vars.insert(v.clone());
                    }
                    Term::Template(t) => vars.extend(t.variables().iter().cloned()),
                }
            }
            vars
        })
    }

    pub(crate) fn instantiate_with(
        &self,
        theta: &Theta,
        coerce: bool,
        strict: bool,
    ) -> Result<Option<Term>> {
        if !self.variables().iter().any(|v| theta.contains(v)) {
            return Ok(Some(Term::Template(self.clone())));
        }
        let kind = self.kind();
        let slots = kind.signature().ok_or(TermError::NotConstructible(kind))?;
        let mut args = Vec::with_capacity(slots.len());
        for (position, (arg, slot)) in self.args().iter().zip(slots).enumerate() {
            let value = match arg {
                Some(t) => t.instantiate_with(theta, coerce, strict)?,
                None => None,
            };
            if value.is_none() && !slot.optional {
                if strict {
                    return Err(TermError::AbsentArgument { kind, position });
                }
                return Ok(None);
            }
            args.push(value);
        }
        Term::construct(kind, args).map(Some)
    }
}

impl PartialEq for Template {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || (self.0.kind == other.0.kind && self.0.args == other.0.args)
    }
}

impl Eq for Template {}

impl Hash for Template {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.kind.hash(state);
        self.0.args.hash(state);
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("kind", &self.0.kind)
            .field("args", &self.0.args)
            .finish()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind())?;
        for (i, arg) in self.args().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            match arg {
                Some(t) => write!(f, "{t}")?,
                None => f.write_str("_")?,
            }
        }
        f.write_str(")")
    }
}
