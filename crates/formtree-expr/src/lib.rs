//! Expression evaluation for formtree.
//!
//! Expressions are evaluated synchronously against a [`DataSources`] bundle and,
//! optionally, a [`NodeScope`] describing the node the expression belongs to.
//!
//! ```
//! use formtree_expr::Evaluator;
//! use formtree_resolver::DataSources;
//! use formtree_core::ExprValue;
//! use serde_json::json;
//!
//! let sources = DataSources::new().with_form_data("model", json!({ "count": 3 }));
//! let result = Evaluator::new(&sources)
//!     .evaluate_json(&json!(["greaterThan", ["dataModel", "count"], 2]))
//!     .unwrap();
//! assert_eq!(result, ExprValue::Bool(true));
//! ```
//!
//! [`DataSources`]: formtree_resolver::DataSources
//! [`NodeScope`]: formtree_resolver::NodeScope

mod cast;
mod date;
mod evaluator;
mod functions;
mod options;

pub use cast::{cast, parse_date};
pub use date::format_date;
pub use evaluator::{Evaluator, ValueArguments};
pub use options::EvalOptions;
