//! Syntactic unification with kind-aware variables and absent arguments.
//!
//! Rule-based (Martelli-Montanari) over a work list of equations. Each side
//! is `Option<Term>`; `None` is the absent value, which only unifies with
//! itself or with a variable (binding it to absent).
//!
//! Before solving, every variable name is narrowed to the meet of the kinds
//! it occurs with across all equations, so one name stands for one variable.
//! A name used at unrelated kinds fails.
//!
//! ```text
//! delete     : s = s                      -> drop
//! decompose  : f(s..) = f(t..)            -> s_i = t_i
//! merge      : x:K = y:L                  -> x, y := y:K∧L
//!                                            (x, y := x:K∧L when L ⊏ K)
//! eliminate  : x = t  or  t = x           -> x := t everywhere
//! ```
//!
//! Every binding removes one name from the work list, so solving
//! terminates. The solved form is idempotent and also binds each narrowed
//! variable, so both sides of every equation instantiate to the same term.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::error::TermError;
use crate::kind::Kind;
use crate::term::Term;
use crate::theta::Theta;
use crate::variable::Variable;

type Side = Option<Term>;
type Equation = (Side, Side);

#[derive(Debug, Error)]
enum Failure {
    #[error("cannot unify {0} with {1}")]
    Clash(String, String),
    #[error("{0} occurs in {1}")]
    Occurs(String, String),
    #[error("?{0} is used as both {1} and {2}")]
    Homonym(String, Kind, Kind),
    #[error(transparent)]
    Term(#[from] TermError),
}

/// Unify a list of equations. `None` on failure.
pub fn unify<I, A, B>(equations: I) -> Option<Theta>
where
    I: IntoIterator<Item = (A, B)>,
    A: Into<Option<Term>>,
    B: Into<Option<Term>>,
{
    let equations: Vec<Equation> = equations
        .into_iter()
        .map(|(a, b)| (a.into(), b.into()))
        .collect();
    match Solver::new(equations).and_then(Solver::solve) {
        Ok(theta) => Some(theta),
        Err(failure) => {
            tracing::trace!(%failure, "unification failed");
            None
        }
    }
}

struct Solver {
    /// Unsolved equations, last one first.
    pending: Vec<Equation>,
    solved: Theta,
}

impl Solver {
    fn new(mut equations: Vec<Equation>) -> Result<Self, Failure> {
        let variables: BTreeSet<Variable> = equations
            .iter()
            .flat_map(|(s, t)| [s, t])
            .flatten()
            .flat_map(Term::variables)
            .collect();

        let mut kinds: BTreeMap<&str, Kind> = BTreeMap::new();
        for v in &variables {
            let kind = match kinds.get(v.name()) {
                None => v.kind(),
                Some(&seen) => seen
                    .meet(v.kind())
                    .ok_or_else(|| Failure::Homonym(v.name().to_owned(), seen, v.kind()))?,
            };
            kinds.insert(v.name(), kind);
        }
        let narrowing: Theta = variables
            .iter()
            .filter(|v| kinds[v.name()] != v.kind())
            .map(|v| {
                let narrowed = Variable::new(v.name(), kinds[v.name()]);
                (v.clone(), Some(Term::Variable(narrowed)))
            })
            .collect();

        equations.reverse();
        let mut solver = Solver {
            pending: equations,
            solved: Theta::new(),
        };
        if !narrowing.is_empty() {
            solver.bind(narrowing)?;
        }
        Ok(solver)
    }

    fn solve(mut self) -> Result<Theta, Failure> {
        while let Some((s, t)) = self.pending.pop() {
            if s == t {
                continue;
            }
            match (s, t) {
                (Some(Term::Variable(x)), Some(Term::Variable(y))) => self.merge(x, y)?,
                (Some(Term::Variable(x)), t) | (t, Some(Term::Variable(x))) => {
                    self.eliminate(x, t)?
                }
                (s, t) => {
                    let parts = decompose(&s, &t)?;
                    self.pending.extend(parts.into_iter().rev());
                }
            }
        }
        Ok(self.solved)
    }

    /// Bind the narrower-or-left variable to the other one, narrowed to the
    /// meet of both kinds.
    fn merge(&mut self, x: Variable, y: Variable) -> Result<(), Failure> {
        let (from, to) = if y.kind().is_strict_subkind_of(x.kind()) {
            (y, x)
        } else {
            (x, y)
        };
        let kind = from
            .kind()
            .meet(to.kind())
            .ok_or_else(|| Failure::Clash(from.to_string(), to.to_string()))?;
        let survivor = Variable::new(to.name(), kind);
        let mut theta = Theta::new();
        if to.kind() != kind {
            theta.bind(to, survivor.clone());
        }
        theta.bind(from, survivor);
        self.bind(theta)
    }

    fn eliminate(&mut self, x: Variable, t: Side) -> Result<(), Failure> {
        if let Some(term) = &t {
            if !term.kind().is_subkind_of(x.kind()) {
                return Err(Failure::Clash(x.to_string(), term.to_string()));
            }
            if term.variable_names().contains(x.name()) {
                return Err(Failure::Occurs(x.to_string(), term.to_string()));
            }
        }
        self.bind(Theta::singleton(x, t))
    }

    /// Apply `theta` to the work list and to the solved values, then record it.
    fn bind(&mut self, theta: Theta) -> Result<(), Failure> {
        for (s, t) in &mut self.pending {
            *s = substitute(s, &theta)?;
            *t = substitute(t, &theta)?;
        }
        let solved = std::mem::take(&mut self.solved);
        for (v, value) in solved {
            let value = substitute(&value, &theta)?;
            self.solved.insert(v, value);
        }
        for (v, value) in theta {
            self.solved.insert(v, value);
        }
        Ok(())
    }
}

fn decompose(s: &Side, t: &Side) -> Result<Vec<Equation>, Failure> {
    let clash = || Failure::Clash(show(s), show(t));
    let (Some(s), Some(t)) = (s, t) else {
        return Err(clash());
    };
    if s.kind() != t.kind() || (s.is_closed() && t.is_closed()) {
        return Err(clash());
    }
    let (Some(s_args), Some(t_args)) = (s.args(), t.args()) else {
        return Err(clash());
    };
    let mut parts = Vec::with_capacity(s_args.len());
    for (a, b) in s_args.into_iter().zip(t_args) {
        match (&a, &b) {
            (None, None) => {}
            (None, Some(x)) | (Some(x), None) if !x.is_variable() => return Err(clash()),
            _ => parts.push((a, b)),
        }
    }
    Ok(parts)
}

fn substitute(side: &Side, theta: &Theta) -> Result<Side, TermError> {
    Ok(side
        .as_ref()
        .map(|t| t.instantiate_with(theta, false, false))
        .transpose()?
        .flatten())
}

fn show(side: &Side) -> String {
    match side {
        Some(t) => t.to_string(),
        None => "_".to_owned(),
    }
}
