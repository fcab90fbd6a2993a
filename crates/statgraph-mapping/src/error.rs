use statgraph_term::{Kind, TermError};
use thiserror::Error;

/// A filter that cannot be compiled at all.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("subject constraint must be an entity, got {0}")]
    Subject(String),

    #[error("property constraint must be a property, got {0}")]
    Property(String),

    #[error("value constraint must be a value, got {0}")]
    Value(String),

    #[error("snak constraint must be a snak, got {0}")]
    Snak(String),

    #[error("the property constraint cannot be a set of snaks")]
    PropertySnaks,

    #[error("language tag cannot be empty")]
    EmptyLanguage,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("entry {index} has no patterns")]
    NoPatterns { index: usize },

    #[error("entry {index}: {pattern} is not a statement pattern")]
    NotAStatement { index: usize, pattern: String },

    #[error("entry {index}: {pattern} must name a concrete snak constructor")]
    AbstractSnak { index: usize, pattern: String },

    #[error("entry {index}: patterns mix {first} and {second}")]
    MixedSnaks {
        index: usize,
        first: Kind,
        second: Kind,
    },

    #[error(transparent)]
    Term(#[from] TermError),
}

/// Raised by entry callbacks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntryError {
    /// The entry does not apply to this filter; the branch is dropped.
    #[error("entry does not apply")]
    Skip,

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("entry {id} failed: {message}")]
    Entry { id: usize, message: String },

    #[error(transparent)]
    Term(#[from] TermError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("row has no branch marker ?{0}")]
    MissingBranch(String),

    #[error("invalid branch marker {0}")]
    InvalidBranch(String),

    #[error("row refers to unknown branch {0}")]
    UnknownBranch(usize),

    #[error("column ?{column} cannot be read as {kind}: {node}")]
    Column {
        column: String,
        kind: Kind,
        node: String,
    },

    #[error("bindings do not yield a statement: {0}")]
    NotAStatement(String),

    #[error(transparent)]
    Term(#[from] TermError),
}
