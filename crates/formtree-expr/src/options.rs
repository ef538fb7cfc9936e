//! Evaluator configuration.

use serde::{Deserialize, Serialize};

use formtree_core::MAX_EXPRESSION_DEPTH;

/// Options for expression evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EvalOptions {
    /// Deepest call nesting evaluated before failing.
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_depth: MAX_EXPRESSION_DEPTH,
        }
    }
}

impl EvalOptions {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}
