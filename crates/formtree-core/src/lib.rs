//! Core types, expression AST definitions, and errors for the formtree engine.
//!
//! This crate provides the foundational types used across all other formtree crates:
//! - Expression AST and the function signature table
//! - Expression values and value types
//! - Data-model paths and references
//! - Layout definitions (components, pages, layout sets)
//! - Error types

pub mod ast;
pub mod errors;
pub mod layout;
pub mod path;
pub mod value;

pub use ast::*;
pub use errors::*;
pub use layout::*;
pub use path::*;
pub use value::*;

/// Maximum nesting depth of an expression, enforced when parsing and evaluating.
pub const MAX_EXPRESSION_DEPTH: usize = 100;
