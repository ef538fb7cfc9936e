//! Error types for the formtree engine.

use thiserror::Error;

use crate::value::ValueType;

/// Top-level error type for the formtree engine.
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Errors while parsing paths, expressions, and layouts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Invalid data model path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Unknown function '{name}' at {location}")]
    UnknownFunction { name: String, location: String },

    #[error("Invalid expression at {location}: {reason}")]
    InvalidExpression { location: String, reason: String },

    #[error("Expression nesting exceeds maximum depth ({depth})")]
    MaxDepthExceeded { depth: usize },

    #[error("Invalid layout: {reason}")]
    InvalidLayout { reason: String },

    #[error("Invalid component '{id}': {reason}")]
    InvalidComponent { id: String, reason: String },

    #[error("Invalid JSON: {reason}")]
    Json { reason: String },
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        ParseError::Json {
            reason: err.to_string(),
        }
    }
}

/// Errors while looking up data sources.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    #[error("Data model with type {data_type} not found")]
    UnknownDataType { data_type: String },

    #[error("Cannot lookup dataType undefined")]
    MissingDataType,

    #[error("Unknown {context} property {key}")]
    UnknownContextKey { context: &'static str, key: String },

    #[error("Circular dependency while resolving {id}")]
    CircularReference { id: String },
}

/// Errors during expression evaluation.
///
/// `location` is the JSON path of the failing sub-expression, e.g. `[1][0]`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("Expected {expected}, got value {value} (at {location})")]
    Cast {
        expected: ValueType,
        value: String,
        location: String,
    },

    #[error("Expected {expected} argument(s) for {function}, got {got} (at {location})")]
    Arity {
        function: &'static str,
        expected: String,
        got: usize,
        location: String,
    },

    #[error("{message} (at {location})")]
    Runtime { message: String, location: String },

    #[error("Expression nesting exceeds maximum depth ({depth})")]
    MaxDepthExceeded { depth: usize },

    #[error("{source} (at {location})")]
    Resolve {
        #[source]
        source: ResolveError,
        location: String,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl ExprError {
    pub fn runtime(message: impl Into<String>, location: impl Into<String>) -> Self {
        ExprError::Runtime {
            message: message.into(),
            location: location.into(),
        }
    }
}

/// Errors while building a node tree from a layout set.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("Duplicate component id '{id}' on page {page}")]
    DuplicateComponentId { page: String, id: String },

    #[error("Component '{id}' on page {page} is a child of both {first} and {second}")]
    MultipleParents {
        page: String,
        id: String,
        first: String,
        second: String,
    },

    #[error("Container cycle on page {page} involving {}", .ids.join(", "))]
    ContainerCycle { page: String, ids: Vec<String> },

    #[error("Duplicate node id '{id}' produced while expanding page {page}")]
    DuplicateNodeId { page: String, id: String },

    #[error("Maximum component nesting depth ({depth}) exceeded")]
    MaxDepthExceeded { depth: usize },

    #[error("Unknown page {page}")]
    UnknownPage { page: String },

    #[error("Node '{id}' is attached to a parent or row that is not in the tree")]
    DetachedNode { id: String },
}
