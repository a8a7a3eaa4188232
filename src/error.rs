//! Error taxonomy for the engine.
//!
//! Configuration errors are programming mistakes in a descriptor or rule
//! table and are reported when the table is built. Everything else is a
//! per-document failure that names the first offending key.
use std::path::PathBuf;

use thiserror::Error;

use crate::descriptor::InputKind;
use crate::value::{Value, ValueKind};

// ---- Configuration ----

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("setter for `{key}` takes {setter}, field is declared {declared}")]
    SetterKind { key: String, setter: InputKind, declared: InputKind },
    #[error("comparison value for `{key}` does not fit declared kind {declared}")]
    CompareKind { key: String, declared: InputKind },
    #[error("rule {rule} is not allowed on {declared} field `{key}`")]
    RuleNotAllowed { key: String, rule: &'static str, declared: InputKind },
    #[error("{declared} field `{key}` cannot carry a setter")]
    CompositeSetter { key: String, declared: InputKind },
    #[error("broadcast on `{key}` needs an array-of-scalar kind and a parent path")]
    Broadcast { key: String },
    #[error("path for `{key}`: {source}")]
    Path { key: String, #[source] source: PathError },
    #[error("invalid pattern for `{key}`: {detail}")]
    Pattern { key: String, detail: String },
    #[error("unsupported date format `{format}` for `{key}`")]
    DateFormat { key: String, format: String },
    #[error("descriptor `{key}`: {detail}")]
    Descriptor { key: String, detail: String },
    #[error("schema for `{key}`: {detail}")]
    Schema { key: String, detail: String },
    #[error("no Body schema for {method} {route}")]
    Route { route: String, method: String },
    #[error("configuration document at {path} → {message}")]
    Document { path: String, message: String },
    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, #[source] source: std::io::Error },
}

// ---- Paths ----

#[derive(Clone, Debug, Error, PartialEq)]
pub enum PathError {
    #[error("segment `{segment}` holds {found}, expected {expected}")]
    KindMismatch { segment: String, expected: ValueKind, found: ValueKind },
    #[error("unindexed array segment `{segment}` is not the last segment")]
    AmbiguousBroadcast { segment: String },
    #[error("malformed path segment `{segment}`")]
    BadSegment { segment: String },
}

// ---- Decoding ----

/// Why a single field was rejected.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum FieldFault {
    #[error("required field is missing")]
    Missing,
    #[error("null is not allowed")]
    Null,
    #[error("empty string is not allowed")]
    Empty,
    #[error("expected {expected}, found {found}")]
    Kind { expected: InputKind, found: &'static str },
    #[error("value is out of range")]
    OutOfRange,
    #[error("value is not one of the enumerated values")]
    NotInEnum,
    #[error("value does not match pattern")]
    Pattern,
    #[error("value is not a valid date")]
    DateFormat,
    #[error("date offset must be {expected_hours:+} hours")]
    TimeZone { expected_hours: i32 },
    #[error("coordinates must be a non-empty array of lon/lat pairs")]
    Coordinates,
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("syntax error near `{key}` at line {line} column {column}: {message}")]
    Syntax { key: String, line: usize, column: usize, message: String },
    #[error("base key `{0}` not found")]
    BaseKeyNotFound(String),
    #[error("field `{key}`: {fault}")]
    Field { key: String, fault: FieldFault, value: Option<Value> },
}

impl DecodeError {
    /// The key reported to the caller for this failure.
    pub fn key(&self) -> &str {
        match self {
            Self::Syntax { key, .. } => key,
            Self::BaseKeyNotFound(key) => key,
            Self::Field { key, .. } => key,
        }
    }
    /// The offending value, when the input had one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Field { value, .. } => value.as_ref(),
            _ => None,
        }
    }
}

// ---- Encoding ----

#[derive(Clone, Debug, Error, PartialEq)]
pub enum EncodeError {
    #[error("`{key}` holds a non-finite real")]
    NonFiniteReal { key: String },
    #[error("serialization failed: {0}")]
    Serialize(String),
}

// ---- Analysis ----

#[derive(Debug, Error)]
pub enum Violation {
    #[error("field is missing")]
    Missing,
    #[error("field must not be present")]
    Present,
    #[error("value differs from the required value")]
    NotEqual,
    #[error("value equals a forbidden value")]
    Equal,
    #[error("value is not one of the allowed values")]
    NotOneOf,
    #[error("value is one of the forbidden values")]
    OneOf,
    #[error("field holds {found}, declared {declared}")]
    Kind { declared: InputKind, found: ValueKind },
    #[error("element {index} of the broadcast lacks the field")]
    IncompleteBroadcast { index: usize },
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("setter failed: {0}")]
    Setter(String),
}

#[derive(Debug, Error)]
#[error("analysis failed at `{key}` (parent `{parent}`): {violation}")]
pub struct AnalyzeError {
    pub key: String,
    pub parent: String,
    #[source]
    pub violation: Violation,
}

/// A typed read found a cell of another kind.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("`{key}` holds {found}, expected {expected}")]
pub struct KindMismatch {
    pub key: String,
    pub expected: ValueKind,
    pub found: ValueKind,
}
