//! Node trees for formtree layouts.
//!
//! A [`LayoutTree`] holds the realized nodes of every page in a layout set:
//! one node per component, repeated once per row inside repeating groups.
//! Trees are produced by `formtree-expander`; this crate owns the arena,
//! the traversal queries, and [`resolve_tree`], which evaluates each node's
//! expressions (hidden, required, readOnly, text bindings, hidden rows).
//!
//! # Example
//!
//! ```ignore
//! let mut tree = NodeBuilder::new().build_from_data(&layout_set, &sources)?;
//! let report = resolve_tree(&mut tree, &sources, &ResolveOptions::default());
//!
//! for node in tree.visible_roots("page1") {
//!     println!("{} ({})", node.id, node.kind);
//! }
//! ```

mod resolve;
mod tree;

pub use resolve::{resolve_tree, ResolveIssue, ResolveOptions, ResolveReport, ResolvedScope};
pub use tree::{realized_id, LayoutNode, LayoutPage, LayoutTree, NodeKey, NodeState, Row};
