//! SPARQL query builder.
//!
//! Group patterns are accumulated through scoped closures, so a nested
//! group is closed exactly when its closure returns:
//!
//! ```text
//! QueryBuilder::where_ ──► GroupBuilder ──┬─ triple / bind / filter / values
//!                                         ├─ optional / not_exists / group ──► GroupBuilder
//!                                         └─ union ──► UnionBuilder ── branch ──► GroupBuilder
//! ```
//!
//! All scopes share one `VarPool`, so `fresh_var` never hands out a name
//! twice within a query.

use std::collections::BTreeSet;
use std::fmt::{self, Write as _};

use bigdecimal::BigDecimal;
use statgraph_term::{default_renamer, Instant};

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_DATE_TIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

// ============================================================================
// Nodes and expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub value: String,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Node {
    Var(String),
    Iri(String),
    Literal(Literal),
}

impl Node {
    pub fn var(name: impl Into<String>) -> Self {
        Node::Var(name.into())
    }

    pub fn iri(iri: impl Into<String>) -> Self {
        Node::Iri(iri.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::Literal(Literal {
            value: value.into(),
            language: None,
            datatype: None,
        })
    }

    pub fn lang(value: impl Into<String>, language: impl Into<String>) -> Self {
        Node::Literal(Literal {
            value: value.into(),
            language: Some(language.into()),
            datatype: None,
        })
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Node::Literal(Literal {
            value: value.into(),
            language: None,
            datatype: Some(datatype.into()),
        })
    }

    pub fn integer(value: i64) -> Self {
        Node::typed(value.to_string(), XSD_INTEGER)
    }

    /// A plain `xsd:decimal`; trailing zeros are dropped and no exponent
    /// is ever written.
    pub fn decimal(value: &BigDecimal) -> Self {
        let mut value = value.normalized();
        if value.as_bigint_and_exponent().1 < 0 {
            value = value.with_scale(0);
        }
        Node::typed(value.to_string(), XSD_DECIMAL)
    }

    pub fn date_time(value: &Instant) -> Self {
        Node::typed(value.to_string(), XSD_DATE_TIME)
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Node::Var(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Node::Var(_))
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Var(name) => write!(f, "?{name}"),
            Node::Iri(iri) => write!(f, "<{iri}>"),
            Node::Literal(lit) => {
                if lit.datatype.as_deref() == Some(XSD_INTEGER) && lit.value.parse::<i64>().is_ok() {
                    return f.write_str(&lit.value);
                }
                write!(f, "\"{}\"", escape(&lit.value))?;
                if let Some(lang) = &lit.language {
                    write!(f, "@{lang}")
                } else if let Some(dt) = &lit.datatype {
                    write!(f, "^^<{dt}>")
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Filter and bind expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Node(Node),
    Bool(bool),
    Eq(Node, Node),
    Ne(Node, Node),
    In(Node, Vec<Node>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// A built-in call such as `isBLANK(?x)`.
    Call(&'static str, Vec<Expr>),
}

impl Expr {
    /// `LANG(node) = "language"`
    pub fn lang_eq(node: Node, language: &str) -> Expr {
        Expr::Call(
            "sameTerm",
            vec![Expr::Call("LANG", vec![Expr::Node(node)]), Expr::Node(Node::string(language))],
        )
    }

    /// `STRSTARTS(STR(node), "prefix")`
    pub fn str_starts(node: Node, prefix: &str) -> Expr {
        Expr::Call(
            "STRSTARTS",
            vec![Expr::Call("STR", vec![Expr::Node(node)]), Expr::Node(Node::string(prefix))],
        )
    }

    fn is_compound(&self) -> bool {
        matches!(self, Expr::And(_) | Expr::Or(_) | Expr::Eq(..) | Expr::Ne(..) | Expr::In(..))
    }
}

impl From<Node> for Expr {
    fn from(value: Node) -> Self {
        Expr::Node(value)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, items: &[Expr], sep: &str| -> fmt::Result {
            for (i, e) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(sep)?;
                }
                if e.is_compound() {
                    write!(f, "({e})")?;
                } else {
                    write!(f, "{e}")?;
                }
            }
            Ok(())
        };
        match self {
            Expr::Node(n) => write!(f, "{n}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Eq(a, b) => write!(f, "{a} = {b}"),
            Expr::Ne(a, b) => write!(f, "{a} != {b}"),
            Expr::In(a, list) => {
                write!(f, "{a} IN (")?;
                for (i, n) in list.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{n}")?;
                }
                f.write_str(")")
            }
            Expr::And(items) if items.is_empty() => f.write_str("true"),
            Expr::Or(items) if items.is_empty() => f.write_str("false"),
            Expr::And(items) => join(f, items, " && "),
            Expr::Or(items) => join(f, items, " || "),
            Expr::Not(e) => write!(f, "!({e})"),
            Expr::Call(name, args) => {
                write!(f, "{name}(")?;
                join(f, args, ", ")?;
                f.write_str(")")
            }
        }
    }
}

// ============================================================================
// Patterns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Triple(Node, Node, Node),
    Bind(Expr, String),
    Filter(Expr),
    Values(String, Vec<Node>),
    Optional(Vec<Pattern>),
    NotExists(Vec<Pattern>),
    Group(Vec<Pattern>),
    Union(Vec<Vec<Pattern>>),
    Comment(String),
}

/// Variable names in use within one query.
#[derive(Debug, Clone, Default)]
pub struct VarPool {
    used: BTreeSet<String>,
}

impl VarPool {
    /// Mark `name` as taken.
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.used.insert(name.into());
    }

    pub fn is_used(&self, name: &str) -> bool {
        self.used.contains(name)
    }

    pub fn used(&self) -> &BTreeSet<String> {
        &self.used
    }

    /// `base` itself if free, otherwise `base0`, `base1`, ...
    pub fn fresh(&mut self, base: &str) -> String {
        let base = sanitize(base);
        let name = if self.used.contains(&base) {
            default_renamer(&base)
                .find(|n| !self.used.contains(n))
                .unwrap_or_default()
        } else {
            base
        };
        self.used.insert(name.clone());
        name
    }
}

/// Replace characters SPARQL does not allow in a variable name.
pub(crate) fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "v".to_owned()
    } else {
        cleaned
    }
}

/// Accumulates the patterns of one group.
pub struct GroupBuilder<'a> {
    patterns: Vec<Pattern>,
    vars: &'a mut VarPool,
}

impl<'a> GroupBuilder<'a> {
    fn new(vars: &'a mut VarPool) -> Self {
        Self {
            patterns: Vec::new(),
            vars,
        }
    }

    pub fn triple(&mut self, s: impl Into<Node>, p: impl Into<Node>, o: impl Into<Node>) -> &mut Self {
        self.patterns.push(Pattern::Triple(s.into(), p.into(), o.into()));
        self
    }

    /// `BIND(expr AS ?var)`; non-variable targets are ignored.
    pub fn bind(&mut self, expr: impl Into<Expr>, var: &Node) -> &mut Self {
        if let Some(name) = var.as_var() {
            self.patterns.push(Pattern::Bind(expr.into(), name.to_owned()));
        }
        self
    }

    pub fn filter(&mut self, expr: Expr) -> &mut Self {
        self.patterns.push(Pattern::Filter(expr));
        self
    }

    /// `VALUES ?var { ... }`; a constant `var` becomes a `FILTER(... IN ...)`.
    pub fn values(&mut self, var: &Node, values: Vec<Node>) -> &mut Self {
        match var {
            Node::Var(name) => self.patterns.push(Pattern::Values(name.clone(), values)),
            other => self.patterns.push(Pattern::Filter(Expr::In(other.clone(), values))),
        }
        self
    }

    pub fn comment(&mut self, text: impl Into<String>) -> &mut Self {
        self.patterns.push(Pattern::Comment(text.into()));
        self
    }

    /// Add a pattern assembled elsewhere.
    pub fn push(&mut self, pattern: Pattern) -> &mut Self {
        self.patterns.push(pattern);
        self
    }

    pub fn fresh_var(&mut self, base: &str) -> Node {
        Node::Var(self.vars.fresh(base))
    }

    pub fn vars(&mut self) -> &mut VarPool {
        &mut *self.vars
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn optional<R>(&mut self, f: impl FnOnce(&mut GroupBuilder<'_>) -> R) -> R {
        let (patterns, out) = self.scoped(f);
        if !patterns.is_empty() {
            self.patterns.push(Pattern::Optional(patterns));
        }
        out
    }

    pub fn not_exists<R>(&mut self, f: impl FnOnce(&mut GroupBuilder<'_>) -> R) -> R {
        let (patterns, out) = self.scoped(f);
        if !patterns.is_empty() {
            self.patterns.push(Pattern::NotExists(patterns));
        }
        out
    }

    pub fn group<R>(&mut self, f: impl FnOnce(&mut GroupBuilder<'_>) -> R) -> R {
        let (patterns, out) = self.scoped(f);
        self.patterns.push(Pattern::Group(patterns));
        out
    }

    /// Open a `UNION`. A union left with no branches matches nothing.
    pub fn union<R>(&mut self, f: impl FnOnce(&mut UnionBuilder<'_>) -> R) -> R {
        let mut union = UnionBuilder {
            branches: Vec::new(),
            vars: &mut *self.vars,
        };
        let out = f(&mut union);
        let branches = union.branches;
        match branches.len() {
            0 => self.patterns.push(Pattern::Filter(Expr::Bool(false))),
            _ => self.patterns.push(Pattern::Union(branches)),
        }
        out
    }

    fn scoped<R>(&mut self, f: impl FnOnce(&mut GroupBuilder<'_>) -> R) -> (Vec<Pattern>, R) {
        let mut child = GroupBuilder::new(&mut *self.vars);
        let out = f(&mut child);
        (child.patterns, out)
    }
}

pub struct UnionBuilder<'a> {
    branches: Vec<Vec<Pattern>>,
    vars: &'a mut VarPool,
}

impl UnionBuilder<'_> {
    /// Build one branch; it is kept only when `f` succeeds.
    pub fn branch<E>(
        &mut self,
        f: impl FnOnce(&mut GroupBuilder<'_>) -> Result<(), E>,
    ) -> Result<(), E> {
        let mut child = GroupBuilder::new(&mut *self.vars);
        f(&mut child)?;
        let patterns = child.patterns;
        self.branches.push(patterns);
        Ok(())
    }

    pub fn vars(&mut self) -> &mut VarPool {
        &mut *self.vars
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

// ============================================================================
// Query
// ============================================================================

#[derive(Debug, Default)]
pub struct QueryBuilder {
    vars: VarPool,
    patterns: Vec<Pattern>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, name: impl Into<String>) {
        self.vars.reserve(name);
    }

    pub fn vars(&mut self) -> &mut VarPool {
        &mut self.vars
    }

    /// Append to the top-level `WHERE` group.
    pub fn where_<R>(&mut self, f: impl FnOnce(&mut GroupBuilder<'_>) -> R) -> R {
        let mut group = GroupBuilder::new(&mut self.vars);
        let out = f(&mut group);
        let patterns = group.patterns;
        self.patterns.extend(patterns);
        out
    }

    pub fn build(self, distinct: bool, limit: Option<u64>) -> Query {
        Query {
            distinct,
            limit,
            patterns: self.patterns,
        }
    }
}

/// A finished `SELECT *` query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub distinct: bool,
    pub limit: Option<u64>,
    pub patterns: Vec<Pattern>,
}

impl Query {
    pub fn to_sparql(&self) -> String {
        let mut out = String::new();
        out.push_str("SELECT ");
        if self.distinct {
            out.push_str("DISTINCT ");
        }
        out.push_str("* WHERE {\n");
        write_patterns(&mut out, &self.patterns, 1);
        out.push('}');
        if let Some(limit) = self.limit {
            let _ = write!(out, "\nLIMIT {limit}");
        }
        out
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sparql())
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_block(out: &mut String, keyword: &str, patterns: &[Pattern], depth: usize) {
    indent(out, depth);
    out.push_str(keyword);
    out.push_str("{\n");
    write_patterns(out, patterns, depth + 1);
    indent(out, depth);
    out.push_str("}\n");
}

fn write_patterns(out: &mut String, patterns: &[Pattern], depth: usize) {
    for pattern in patterns {
        match pattern {
            Pattern::Triple(s, p, o) => {
                indent(out, depth);
                let p = match p {
                    Node::Iri(iri) if iri == RDF_TYPE => "a".to_owned(),
                    other => other.to_string(),
                };
                let _ = writeln!(out, "{s} {p} {o} .");
            }
            Pattern::Bind(expr, var) => {
                indent(out, depth);
                let _ = writeln!(out, "BIND({expr} AS ?{var})");
            }
            Pattern::Filter(expr) => {
                indent(out, depth);
                let _ = writeln!(out, "FILTER({expr})");
            }
            Pattern::Values(var, values) => {
                indent(out, depth);
                let _ = write!(out, "VALUES ?{var} {{");
                for v in values {
                    let _ = write!(out, " {v}");
                }
                out.push_str(" }\n");
            }
            Pattern::Optional(inner) => write_block(out, "OPTIONAL ", inner, depth),
            Pattern::NotExists(inner) => write_block(out, "FILTER NOT EXISTS ", inner, depth),
            Pattern::Group(inner) => write_block(out, "", inner, depth),
            Pattern::Union(branches) => {
                for (i, branch) in branches.iter().enumerate() {
                    if i > 0 {
                        indent(out, depth);
                        out.push_str("UNION\n");
                    }
                    write_block(out, "", branch, depth);
                }
            }
            Pattern::Comment(text) => {
                for line in text.lines() {
                    indent(out, depth);
                    let _ = writeln!(out, "# {line}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_vars_never_repeat() {
        let mut pool = VarPool::default();
        pool.reserve("subject");
        assert_eq!(pool.fresh("stmt"), "stmt");
        assert_eq!(pool.fresh("stmt"), "stmt0");
        assert_eq!(pool.fresh("stmt"), "stmt1");
        assert_eq!(pool.fresh("subject"), "subject0");
        assert_eq!(pool.fresh("a-b"), "a_b");
    }

    #[test]
    fn serializes_nested_groups_with_two_space_indent() {
        let mut qb = QueryBuilder::new();
        qb.where_(|g| {
            let s = g.fresh_var("s");
            g.union(|u| {
                u.branch(|b| -> Result<(), ()> {
                    b.triple(s.clone(), Node::iri("http://p"), Node::string("x\"y"));
                    b.bind(Node::integer(0), &Node::var("branch"));
                    Ok(())
                })
                .unwrap();
                u.branch(|b| -> Result<(), ()> {
                    b.triple(s.clone(), Node::iri(RDF_TYPE), Node::iri("http://C"));
                    Err(())
                })
                .unwrap_err();
            });
            g.optional(|o| {
                o.triple(s.clone(), Node::iri("http://q"), Node::lang("hi", "en"));
            });
        });
        let text = qb.build(true, Some(5)).to_sparql();
        let expected = "SELECT DISTINCT * WHERE {
  {
    ?s <http://p> \"x\\\"y\" .
    BIND(0 AS ?branch)
  }
  OPTIONAL {
    ?s <http://q> \"hi\"@en .
  }
}
LIMIT 5";
        assert_eq!(text, expected);
    }

    #[test]
    fn empty_union_is_always_false() {
        let mut qb = QueryBuilder::new();
        qb.where_(|g| g.union(|_| {}));
        assert_eq!(qb.build(false, None).to_sparql(), "SELECT * WHERE {\n  FILTER(false)\n}");
    }
}
