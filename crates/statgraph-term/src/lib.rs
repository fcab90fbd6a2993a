//! Statgraph terms: a small typed term algebra for statements.
//!
//! Key pieces:
//! 1. **Kinds**: a class lattice (`Item ⊑ Entity ⊑ Value ⊑ Term`, ...) with
//!    constructor signatures for every templatable kind
//! 2. **Closed terms**: ground items, data values, snaks and statements
//! 3. **Templates**: constructor applications over variables, normalized so
//!    a variable name has one kind per template
//! 4. **Unification**: kind-aware, with an occurs check and absent
//!    ("deleted") optional arguments
//!
//! ```text
//! let p = Variable::new("p", Kind::Property);
//! let pattern = Term::value_snak(p.clone(), Variable::new("v", Kind::Value))?;
//! let snak = ClosedTerm::value_snak("http://www.wikidata.org/entity/P31", item)?;
//! let theta = pattern.match_with(&snak.into()).unwrap();
//! ```

pub mod error;
pub mod instant;
pub mod kind;
pub mod template;
pub mod term;
pub mod theta;
pub mod unify;
pub mod value;
pub mod variable;

pub use error::{Result, TermError};
pub use instant::Instant;
pub use kind::{Datatype, Kind, Slot};
pub use template::Template;
pub use term::Term;
pub use theta::Theta;
pub use unify::unify;
pub use value::{ClosedTerm, Iri, Quantity, Statement, Text, Time, TimePrecision, ValueSnak};
pub use variable::{default_renamer, Variable};
