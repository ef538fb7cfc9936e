//! Parsers for formtree inputs.
//!
//! This crate turns raw inputs into the typed structures of `formtree-core`:
//! - Data-model paths (`Group[1].Field`), built on `nom`
//! - Expression JSON, with static validation against the function table
//! - Layout pages and layout sets from their JSON files

mod expression;
mod layout;
mod path;

pub use expression::{parse_expression, parse_expression_str, validate_expression, ExprIssue};
pub use layout::{parse_component, parse_layout_set, parse_page, parse_page_str};
pub use path::{parse_data_model_ref, parse_data_path};
