//! Compiled queries and decoding of their result rows.
//!
//! Each row carries the index of the branch that produced it in the branch
//! marker variable. The branch's plan holds the entry pattern already
//! unified with the filter; its remaining variables are exactly the result
//! columns, so a row decodes by reading each column at its variable's kind
//! and instantiating the pattern.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ahash::AHashMap;
use bigdecimal::BigDecimal;
use statgraph_term::{ClosedTerm, Instant, Kind, Term, Theta, Variable};

use crate::builder::{Literal, Node, Query, XSD_DATE_TIME, XSD_DECIMAL, XSD_DOUBLE, XSD_INTEGER, XSD_STRING};
use crate::error::DecodeError;
use crate::filter::Rank;
use crate::mapping::MappingHooks;

/// One solution: query variable name → bound node.
pub type Row = AHashMap<String, Node>;

/// How to read the rows of one `UNION` branch.
#[derive(Debug, Clone)]
pub struct BranchPlan {
    entry_id: usize,
    pattern: Term,
    bindings: Theta,
    template: Term,
    rank_variable: Option<String>,
}

impl BranchPlan {
    pub(crate) fn new(
        entry_id: usize,
        pattern: Term,
        bindings: Theta,
        template: Term,
        rank_variable: Option<String>,
    ) -> Self {
        Self {
            entry_id,
            pattern,
            bindings,
            template,
            rank_variable,
        }
    }

    pub fn entry_id(&self) -> usize {
        self.entry_id
    }

    /// The entry pattern, renamed apart from the rest of the query.
    pub fn pattern(&self) -> &Term {
        &self.pattern
    }

    /// Compile-time bindings: the unifier of `pattern` and the filter.
    pub fn bindings(&self) -> &Theta {
        &self.bindings
    }

    /// `pattern` with `bindings` applied. Its variables are the columns.
    pub fn template(&self) -> &Term {
        &self.template
    }

    pub fn columns(&self) -> Vec<String> {
        self.template.variable_names().into_iter().collect()
    }

    pub fn rank_variable(&self) -> Option<&str> {
        self.rank_variable.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedStatement {
    pub statement: ClosedTerm,
    pub entry_id: usize,
    pub rank: Option<Rank>,
}

/// The output of `Compiler::compile`.
pub struct CompiledQuery {
    query: Query,
    plans: Vec<BranchPlan>,
    branch_variable: String,
    default_language: String,
    hooks: Arc<dyn MappingHooks>,
}

impl CompiledQuery {
    pub(crate) fn new(
        query: Query,
        plans: Vec<BranchPlan>,
        branch_variable: String,
        default_language: String,
        hooks: Arc<dyn MappingHooks>,
    ) -> Self {
        Self {
            query,
            plans,
            branch_variable,
            default_language,
            hooks,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn sparql(&self) -> String {
        self.query.to_sparql()
    }

    pub fn plans(&self) -> &[BranchPlan] {
        &self.plans
    }

    pub fn branch_variable(&self) -> &str {
        &self.branch_variable
    }

    /// True when the query cannot return any row.
    pub fn is_always_false(&self) -> bool {
        self.plans.is_empty()
    }

    /// Turn one result row back into a statement.
    pub fn decode(&self, row: &Row) -> Result<DecodedStatement, DecodeError> {
        let index = self.branch_index(row)?;
        let plan = self
            .plans
            .get(index)
            .ok_or(DecodeError::UnknownBranch(index))?;

        let mut theta = Theta::new();
        for var in plan.template.variables() {
            match row.get(var.name()) {
                Some(node) => {
                    let value = self.decode_column(&var, node)?;
                    theta.bind(var, value);
                }
                None => {
                    theta.bind_absent(var);
                }
            }
        }

        let statement = match plan.template.instantiate_with(&theta, false, true)? {
            Some(Term::Closed(c)) if c.kind() == Kind::Statement => c,
            Some(other) => return Err(DecodeError::NotAStatement(other.to_string())),
            None => return Err(DecodeError::NotAStatement("_".to_owned())),
        };
        let rank = plan
            .rank_variable()
            .and_then(|v| row.get(v))
            .and_then(|node| match node {
                Node::Iri(iri) => Rank::from_iri(iri),
                _ => None,
            });
        tracing::trace!(entry = plan.entry_id, %statement, "decoded row");
        Ok(DecodedStatement {
            statement,
            entry_id: plan.entry_id,
            rank,
        })
    }

    /// Decode every row, stopping at the first failure.
    pub fn decode_all<'r>(
        &self,
        rows: impl IntoIterator<Item = &'r Row>,
    ) -> Result<Vec<DecodedStatement>, DecodeError> {
        rows.into_iter().map(|row| self.decode(row)).collect()
    }

    fn branch_index(&self, row: &Row) -> Result<usize, DecodeError> {
        match row.get(&self.branch_variable) {
            Some(Node::Literal(lit)) => lit
                .value
                .parse()
                .map_err(|_| DecodeError::InvalidBranch(lit.value.clone())),
            Some(other) => Err(DecodeError::InvalidBranch(other.to_string())),
            None => Err(DecodeError::MissingBranch(self.branch_variable.clone())),
        }
    }

    fn decode_column(&self, var: &Variable, node: &Node) -> Result<ClosedTerm, DecodeError> {
        let kind = var.kind();
        let column_error = || DecodeError::Column {
            column: var.name().to_owned(),
            kind,
            node: node.to_string(),
        };
        let value = match node {
            Node::Iri(iri) => self.hooks.decode_iri(iri, kind),
            Node::Literal(lit) => decode_literal(lit, kind, &self.default_language),
            Node::Var(_) => None,
        }
        .ok_or_else(column_error)?;
        if value.kind().is_subkind_of(kind) {
            Ok(value)
        } else {
            Err(column_error())
        }
    }
}

fn decode_literal(lit: &Literal, kind: Kind, default_language: &str) -> Option<ClosedTerm> {
    if let Some(language) = &lit.language {
        return Some(ClosedTerm::text(&lit.value, language));
    }
    match lit.datatype.as_deref() {
        Some(XSD_DECIMAL | XSD_INTEGER | XSD_DOUBLE) => {
            BigDecimal::from_str(&lit.value).ok().map(ClosedTerm::quantity)
        }
        Some(XSD_DATE_TIME) => Instant::from_str(&lit.value).ok().map(ClosedTerm::time),
        None | Some(XSD_STRING) => Some(match kind {
            Kind::ExternalId => ClosedTerm::external_id(&lit.value),
            Kind::Text => ClosedTerm::text(&lit.value, default_language),
            _ => ClosedTerm::string(&lit.value),
        }),
        Some(_) => None,
    }
}

impl fmt::Debug for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledQuery")
            .field("query", &self.query)
            .field("plans", &self.plans)
            .field("branch_variable", &self.branch_variable)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for CompiledQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.query, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_decode_by_datatype_and_kind() {
        let dec = Literal {
            value: "1.50".to_owned(),
            language: None,
            datatype: Some(XSD_DECIMAL.to_owned()),
        };
        assert_eq!(
            decode_literal(&dec, Kind::Quantity, "en"),
            Some(ClosedTerm::quantity(BigDecimal::from_str("1.5").unwrap()))
        );

        let plain = Literal {
            value: "abc".to_owned(),
            language: None,
            datatype: None,
        };
        assert_eq!(
            decode_literal(&plain, Kind::ExternalId, "en"),
            Some(ClosedTerm::external_id("abc"))
        );
        assert_eq!(
            decode_literal(&plain, Kind::Text, "pt"),
            Some(ClosedTerm::text("abc", "pt"))
        );
        assert_eq!(
            decode_literal(&plain, Kind::Value, "en"),
            Some(ClosedTerm::string("abc"))
        );

        let odd = Literal {
            value: "x".to_owned(),
            language: None,
            datatype: Some("http://example.org/dt".to_owned()),
        };
        assert_eq!(decode_literal(&odd, Kind::Value, "en"), None);
    }

    #[test]
    fn date_times_outside_chrono_still_decode() {
        let ides = Instant::new(-43, 3, 15);
        let Node::Literal(lit) = Node::date_time(&ides) else {
            panic!("date_time builds a literal");
        };
        assert_eq!(lit.value, "-0043-03-15T00:00:00Z");
        assert_eq!(
            decode_literal(&lit, Kind::Time, "en"),
            Some(ClosedTerm::time(ides))
        );

        let universe = Literal {
            value: "+13798000000-00-00T00:00:00Z".to_owned(),
            language: None,
            datatype: Some(XSD_DATE_TIME.to_owned()),
        };
        assert_eq!(
            decode_literal(&universe, Kind::Time, "en"),
            Some(ClosedTerm::time(Instant::new(13_798_000_000, 0, 0)))
        );

        let garbled = Literal {
            value: "yesterday".to_owned(),
            ..universe
        };
        assert_eq!(decode_literal(&garbled, Kind::Time, "en"), None);
    }
}
