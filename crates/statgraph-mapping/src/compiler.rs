//! Filter → SPARQL compiler.
//!
//! ```text
//! Filter ──► targets (subject × property × value alternatives)
//!              │
//!              ▼ for every target, every entry in registration order
//!        mask checks ──► rename pattern apart ──► unify with target
//!              │
//!              ▼
//!        UNION branch: callback clauses, nested snak constraints,
//!                      BIND(k AS ?branch)
//! ```
//!
//! Every emitted branch gets a `BranchPlan` so result rows can be decoded
//! back into statements (see `decode`).

use std::collections::BTreeSet;

use statgraph_term::{default_renamer, unify, ClosedTerm, Kind, Term, TermError, Theta, Variable};

use crate::builder::{sanitize, GroupBuilder, Node, QueryBuilder, VarPool};
use crate::config::CompilerOptions;
use crate::decode::{BranchPlan, CompiledQuery};
use crate::error::{CompileError, EntryError};
use crate::filter::{Alternative, DatatypeMask, Filter, SnakMask};
use crate::mapping::{Arg, Args, Branch, Entry, Mapping, MappingHooks};

/// Query variable bound to the statement subject when the filter leaves it open.
pub const SUBJECT: &str = "subject";
pub const PROPERTY: &str = "property";
pub const VALUE: &str = "value";

pub struct Compiler<'m> {
    mapping: &'m Mapping,
    options: CompilerOptions,
}

/// What one combination of filter alternatives asks for.
struct Target<'f> {
    subject: Term,
    property: Term,
    value: Term,
    value_constrained: bool,
    subject_snaks: &'f [ClosedTerm],
    value_snaks: &'f [ClosedTerm],
}

impl Target<'_> {
    fn statement(&self, snak_kind: Kind) -> Result<Term, TermError> {
        let snak = match snak_kind {
            Kind::ValueSnak => Term::value_snak(self.property.clone(), self.value.clone())?,
            Kind::SomeValueSnak => Term::some_value_snak(self.property.clone())?,
            Kind::NoValueSnak => Term::no_value_snak(self.property.clone())?,
            other => return Err(TermError::NotConstructible(other)),
        };
        Term::statement(self.subject.clone(), snak)
    }
}

/// An entry pattern unified with a target.
struct Plan {
    pattern: Term,
    bindings: Theta,
    template: Term,
    args: Args,
}

impl Plan {
    /// Keep later renamings and fresh variables clear of this plan's names.
    fn reserve(&self, vars: &mut VarPool) {
        for name in self.pattern.variable_names() {
            vars.reserve(name);
        }
        for name in self.template.variable_names() {
            vars.reserve(name);
        }
    }
}

impl<'m> Compiler<'m> {
    pub fn new(mapping: &'m Mapping, options: CompilerOptions) -> Self {
        Self { mapping, options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Compile `filter` into a single `SELECT` query.
    ///
    /// A filter nothing can match compiles to a query with no branches;
    /// only a failing entry callback is an error.
    pub fn compile(&self, filter: &Filter) -> Result<CompiledQuery, CompileError> {
        let hooks: &dyn MappingHooks = self.mapping.hooks().as_ref();
        let mut qb = QueryBuilder::new();
        for name in [SUBJECT, PROPERTY, VALUE, self.options.branch_variable.as_str()] {
            qb.reserve(name);
        }

        let mut plans: Vec<BranchPlan> = Vec::new();
        if filter.is_empty() {
            tracing::debug!("filter matches nothing");
            qb.where_(|g| g.union(|_| {}));
        } else {
            let targets = self.targets(filter, hooks);
            tracing::debug!(
                targets = targets.len(),
                entries = self.mapping.len(),
                "compiling filter"
            );
            qb.where_(|g| {
                g.union(|u| -> Result<(), CompileError> {
                    for target in &targets {
                        for entry in self.mapping {
                            if let Some(reason) = excluded(entry, filter, target) {
                                tracing::debug!(entry = entry.id(), reason, "entry skipped");
                                continue;
                            }
                            let goal = target.statement(entry.snak_kind())?;
                            let Some(plan) = plan_entry(entry, &goal, u.vars().used()) else {
                                tracing::debug!(
                                    entry = entry.id(),
                                    reason = "no pattern unifies",
                                    "entry skipped"
                                );
                                continue;
                            };
                            plan.reserve(u.vars());
                            let index = plans.len();
                            let mut rank = None;
                            let outcome = u.branch(|g| -> Result<(), EntryError> {
                                rank = self.emit(g, entry, &plan, target, filter, hooks, index)?;
                                Ok(())
                            });
                            match outcome {
                                Ok(()) => plans.push(BranchPlan::new(
                                    entry.id(),
                                    plan.pattern,
                                    plan.bindings,
                                    plan.template,
                                    rank,
                                )),
                                Err(EntryError::Skip) => {
                                    tracing::debug!(
                                        entry = entry.id(),
                                        reason = "callback skipped",
                                        "entry skipped"
                                    );
                                }
                                Err(EntryError::Failed(message)) => {
                                    return Err(CompileError::Entry {
                                        id: entry.id(),
                                        message,
                                    })
                                }
                            }
                        }
                    }
                    Ok(())
                })
            })?;
        }

        tracing::debug!(branches = plans.len(), "filter compiled");
        let query = qb.build(self.options.distinct, self.options.limit);
        Ok(CompiledQuery::new(
            query,
            plans,
            self.options.branch_variable.clone(),
            self.options.default_language.clone(),
            self.mapping.hooks().clone(),
        ))
    }

    fn targets<'f>(&self, filter: &'f Filter, hooks: &dyn MappingHooks) -> Vec<Target<'f>> {
        let mut targets = Vec::new();
        for subject in filter.subject().alternatives() {
            for property in filter.property().alternatives() {
                for value in filter.value().alternatives() {
                    let (subject, subject_snaks) = match subject {
                        Alternative::Value(c) => (Term::Closed(c.clone()), &[][..]),
                        Alternative::Snaks(snaks) => (open(SUBJECT, Kind::Entity), snaks),
                        Alternative::Any => (open(SUBJECT, Kind::Entity), &[][..]),
                    };
                    let fixed_property = match property {
                        Alternative::Value(c) => Some(c),
                        _ => None,
                    };
                    let property = match fixed_property {
                        Some(c) => Term::Closed(c.clone()),
                        None => open(PROPERTY, Kind::Property),
                    };
                    let (value, value_snaks, value_constrained) = match value {
                        Alternative::Value(c) => (
                            Term::Closed(hooks.normalize_value(c.clone(), fixed_property)),
                            &[][..],
                            true,
                        ),
                        Alternative::Snaks(snaks) => (open(VALUE, Kind::Entity), snaks, true),
                        Alternative::Any => (open(VALUE, Kind::Value), &[][..], false),
                    };
                    targets.push(Target {
                        subject,
                        property,
                        value,
                        value_constrained,
                        subject_snaks,
                        value_snaks,
                    });
                }
            }
        }
        targets
    }

    /// Fill one top-level branch. Returns the rank variable the callback
    /// recorded, if any.
    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        g: &mut GroupBuilder<'_>,
        entry: &Entry,
        plan: &Plan,
        target: &Target<'_>,
        filter: &Filter,
        hooks: &dyn MappingHooks,
        index: usize,
    ) -> Result<Option<String>, EntryError> {
        if self.options.debug_comments {
            g.comment(format!("entry {}", entry.id()));
        }
        let mut branch = Branch::new(g, hooks, filter, &self.options);
        entry.invoke(&mut branch, &plan.args)?;
        let rank = branch.into_rank_variable();

        for (focus, snaks) in [
            (&target.subject, target.subject_snaks),
            (&target.value, target.value_snaks),
        ] {
            if snaks.is_empty() {
                continue;
            }
            let focus = match settle(focus, &plan.bindings) {
                Some(Some(term)) => term,
                _ => return Err(EntryError::Skip),
            };
            self.constrain(g, &focus, snaks, hooks)?;
        }

        let index = i64::try_from(index).map_err(|e| EntryError::Failed(e.to_string()))?;
        g.bind(Node::integer(index), &Node::var(&self.options.branch_variable));
        Ok(rank)
    }

    /// Require `focus` to have every snak in `snaks`, one nested `UNION`
    /// per snak. A snak no entry can express leaves an always-false union.
    fn constrain(
        &self,
        g: &mut GroupBuilder<'_>,
        focus: &Term,
        snaks: &[ClosedTerm],
        hooks: &dyn MappingHooks,
    ) -> Result<(), EntryError> {
        let unrestricted = Filter::default();
        for snak in snaks {
            let goal = Term::statement(focus.clone(), snak.clone())
                .map_err(|e| EntryError::Failed(e.to_string()))?;
            g.union(|u| -> Result<(), EntryError> {
                for entry in self.mapping {
                    if entry.snak_kind() != snak.kind() {
                        continue;
                    }
                    let Some(plan) = plan_entry(entry, &goal, u.vars().used()) else {
                        continue;
                    };
                    plan.reserve(u.vars());
                    let outcome = u.branch(|g| {
                        let mut branch = Branch::new(g, hooks, &unrestricted, &self.options);
                        entry.invoke(&mut branch, &plan.args)
                    });
                    match outcome {
                        Ok(()) | Err(EntryError::Skip) => {}
                        Err(failed) => return Err(failed),
                    }
                }
                Ok(())
            })?;
        }
        Ok(())
    }
}

fn open(name: &str, kind: Kind) -> Term {
    Term::Variable(Variable::new(name, kind))
}

/// Why `entry` cannot serve `target`, if it cannot.
fn excluded(entry: &Entry, filter: &Filter, target: &Target<'_>) -> Option<&'static str> {
    let snak_kind = entry.snak_kind();
    if !filter.snak_mask().intersects(SnakMask::of_kind(snak_kind)) {
        return Some("snak kind masked out");
    }
    if target.value_constrained && snak_kind != Kind::ValueSnak {
        return Some("value constraint needs a value snak");
    }
    if !DatatypeMask::of_kind(entry.subject_kind()).intersects(filter.subject_mask()) {
        return Some("subject kind masked out");
    }
    if let Some(datatype) = entry.datatype() {
        if !filter.property_mask().contains_datatype(datatype) {
            return Some("property datatype masked out");
        }
        if snak_kind == Kind::ValueSnak && !filter.value_mask().contains_datatype(datatype) {
            return Some("value datatype masked out");
        }
        if !target.value_snaks.is_empty() && !datatype.is_entity() {
            return Some("snak constraint on a non-entity value");
        }
    }
    None
}

/// Rename the first of `entry`'s patterns that unifies with `goal` apart
/// from `used`, and resolve its variables. Fresh names are valid SPARQL
/// variable names.
fn plan_entry(entry: &Entry, goal: &Term, used: &BTreeSet<String>) -> Option<Plan> {
    for pattern in entry.patterns() {
        let renaming = pattern.renaming_with(used, |name| default_renamer(&sanitize(name)));
        let renamed = match pattern.instantiate_with(&renaming, false, true) {
            Ok(Some(renamed)) => renamed,
            _ => continue,
        };
        let Some(bindings) = unify([(renamed.clone(), goal.clone())]) else {
            continue;
        };
        let Some(Some(template)) = settle(&renamed, &bindings) else {
            continue;
        };

        let mut args = Args::default();
        for (original, fresh) in renaming.iter() {
            let Some(Term::Variable(fresh)) = fresh else {
                continue;
            };
            let arg = match settle(&Term::Variable(fresh.clone()), &bindings) {
                Some(None) => Arg::Absent,
                Some(Some(Term::Closed(value))) => Arg::Value(value),
                Some(Some(Term::Variable(var))) => Arg::Var(Node::var(var.name())),
                // Bound to a partial structure; lookups of it skip.
                Some(Some(Term::Template(_))) | None => continue,
            };
            args.insert(original.name(), arg);
        }
        return Some(Plan {
            pattern: renamed,
            bindings,
            template,
            args,
        });
    }
    None
}

/// Instantiate `term` with `theta` until nothing changes. `None` when an
/// instantiation fails.
fn settle(term: &Term, theta: &Theta) -> Option<Option<Term>> {
    let mut current = term.clone();
    for _ in 0..=theta.len() {
        match current.instantiate(theta) {
            Ok(Some(next)) if next == current => break,
            Ok(Some(next)) => current = next,
            Ok(None) => return Some(None),
            Err(_) => return None,
        }
    }
    Some(Some(current))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_follows_variable_chains() {
        let x = Variable::new("x", Kind::Item);
        let y = Variable::new("y", Kind::Item);
        let mut theta = Theta::new();
        theta.bind(x.clone(), y.clone());
        theta.bind(y, ClosedTerm::item("http://x/Q1"));
        assert_eq!(
            settle(&Term::Variable(x), &theta),
            Some(Some(Term::Closed(ClosedTerm::item("http://x/Q1"))))
        );
    }
}
