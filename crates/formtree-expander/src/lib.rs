//! Layout node building for formtree.
//!
//! This crate handles:
//! - Page hierarchy validation (duplicate ids, shared children, cycles)
//! - Repeating group expansion, one subtree per row
//! - Data binding transposition into each row
//! - Stable node keys across rebuilds

mod expander;
mod registry;
mod rows;

pub use expander::{expand_layout, BuildOptions, NodeBuilder, MAX_NESTING_DEPTH};
pub use registry::ComponentRegistry;
pub use rows::{FormDataRows, RowCounts, RowInfo, RowProvider, DEFAULT_ROW_ID_FIELD};
