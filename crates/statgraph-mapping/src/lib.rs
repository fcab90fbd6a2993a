//! Statgraph mapping: filters in, SPARQL out, statements back.
//!
//! ```text
//! Filter ──► Compiler ──(Mapping entries + hooks)──► CompiledQuery ──► SPARQL text
//!                                                          │
//!                               result rows ──► decode ────┴──► statements
//! ```
//!
//! Key pieces:
//! 1. **Filter**: subject/property/value fingerprints plus snak, rank and
//!    datatype masks, validated by `FilterBuilder::build`
//! 2. **Mapping**: an ordered registry of statement patterns and callbacks
//!    describing how a backend stores statements
//! 3. **Compiler**: unifies each entry pattern with the filter and lets the
//!    entry emit one `UNION` branch
//! 4. **Decoding**: turns result rows back into statements through the
//!    per-branch plans
//!
//! `wikidata` provides a complete mapping for the Wikidata Query Service.

pub mod builder;
pub mod compiler;
pub mod config;
pub mod decode;
pub mod error;
pub mod filter;
pub mod mapping;
pub mod wikidata;

pub use builder::{Expr, Literal, Node, Pattern, Query, QueryBuilder};
pub use compiler::Compiler;
pub use config::{CompilerOptions, WikidataConfig};
pub use decode::{BranchPlan, CompiledQuery, DecodedStatement, Row};
pub use error::{CompileError, DecodeError, EntryError, FilterError, MappingError};
pub use filter::{DatatypeMask, Filter, FilterBuilder, Fingerprint, Rank, RankMask, SnakMask};
pub use mapping::{Arg, Args, Branch, DefaultHooks, Entry, Mapping, MappingBuilder, MappingHooks};
pub use wikidata::{wikidata_mapping, WikidataHooks};

/// Compile `filter` against `mapping` with default options.
pub fn compile(mapping: &Mapping, filter: &Filter) -> Result<CompiledQuery, CompileError> {
    Compiler::new(mapping, CompilerOptions::default()).compile(filter)
}
