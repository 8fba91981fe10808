//! Error types for timex-eval.

use thiserror::Error;

/// Result type for timex-eval operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for timex-eval operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A markup tag could not be parsed (e.g. uneven quotation marks).
    #[error("Malformed tag: {0}")]
    MalformedTag(String),

    /// An attribute appeared more than once with conflicting values.
    #[error("Conflicting attribute: {0}")]
    ConflictingAttribute(String),

    /// An annotation's offsets could not be reconciled with its literal text.
    #[error("Offset resolution failed: {0}")]
    OffsetResolution(String),

    /// Interval begin/end point references form a cycle.
    #[error("Cyclic reference: {0}")]
    CyclicReference(String),

    /// An attribute was written outside a layer's declared schema.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Structural parse error in an input file.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Internal inconsistency detected during evaluation.
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed tag error.
    pub fn malformed_tag(msg: impl Into<String>) -> Self {
        Error::MalformedTag(msg.into())
    }

    /// Create a conflicting attribute error.
    pub fn conflicting_attribute(msg: impl Into<String>) -> Self {
        Error::ConflictingAttribute(msg.into())
    }

    /// Create an offset resolution error.
    pub fn offset_resolution(msg: impl Into<String>) -> Self {
        Error::OffsetResolution(msg.into())
    }

    /// Create a cyclic reference error.
    pub fn cyclic_reference(msg: impl Into<String>) -> Self {
        Error::CyclicReference(msg.into())
    }

    /// Create a schema violation error.
    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Error::SchemaViolation(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Create an evaluation error.
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Error::Evaluation(msg.into())
    }
}
