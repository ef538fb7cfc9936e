//! The engine behind the browser bindings, usable from plain Rust.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use formtree_core::{BuildError, ExprError, ExprValue, LayoutSet, ParseError};
use formtree_expander::{BuildOptions, NodeBuilder};
use formtree_expr::{EvalOptions, Evaluator};
use formtree_layout::{resolve_tree, LayoutTree, ResolveOptions, ResolveReport, ResolvedScope};
use formtree_parser::{parse_expression, parse_layout_set};
use formtree_resolver::DataSources;

/// Engine configuration, loadable from JSON.
///
/// `eval` applies both to [`Engine::evaluate`] and to tree resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub eval: EvalOptions,
    pub build: BuildOptions,
}

impl EngineConfig {
    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions { eval: self.eval }
    }
}

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("No layout set loaded. Call loadLayoutSet() first.")]
    NoLayoutSet,

    #[error("No node with id '{id}'")]
    UnknownNode { id: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Holds a layout set and its data sources, and keeps a resolved node tree.
///
/// The tree is rebuilt lazily after any input changes. Node keys stay stable
/// across rebuilds.
#[derive(Debug, Default)]
pub struct Engine {
    config: EngineConfig,
    layout_set: Option<LayoutSet>,
    sources: DataSources,
    builder: NodeBuilder,
    tree: Option<LayoutTree>,
    report: ResolveReport,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.configure(config);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration. Changing build options drops remembered node keys.
    pub fn configure(&mut self, config: EngineConfig) {
        if config.build != self.config.build {
            self.builder = NodeBuilder::new().with_options(config.build.clone());
        }
        self.config = config;
        self.tree = None;
    }

    /// Replace the configuration from JSON.
    pub fn configure_json(&mut self, value: Value) -> Result<(), EngineError> {
        let config = serde_json::from_value(value).map_err(|e| EngineError::Config(e.to_string()))?;
        self.configure(config);
        Ok(())
    }

    /// Load a layout set from JSON. Its data type becomes the default data type.
    pub fn load_layout_set(&mut self, value: &Value) -> Result<(), EngineError> {
        let set = parse_layout_set(value)?;
        if set.data_type.is_some() {
            self.sources.default_data_type = set.data_type.clone();
        }
        debug!(layout_set = %set.id, "loaded layout set");
        self.layout_set = Some(set);
        self.tree = None;
        Ok(())
    }

    pub fn layout_set(&self) -> Option<&LayoutSet> {
        self.layout_set.as_ref()
    }

    /// Replace the form data for one data type.
    pub fn set_form_data(&mut self, data_type: &str, data: Value) {
        if self.sources.default_data_type.is_none() {
            self.sources.default_data_type = Some(data_type.to_string());
        }
        self.sources.form_data.insert(data_type.to_string(), data);
        self.tree = None;
    }

    /// Replace all data sources. The layout set's data type stays the default.
    pub fn set_data_sources(&mut self, sources: DataSources) {
        let default = self
            .layout_set
            .as_ref()
            .and_then(|set| set.data_type.clone());
        self.sources = sources;
        if default.is_some() {
            self.sources.default_data_type = default;
        }
        self.tree = None;
    }

    pub fn sources(&self) -> &DataSources {
        &self.sources
    }

    /// Build and resolve the node tree, unless it is already current.
    pub fn build(&mut self) -> Result<&LayoutTree, EngineError> {
        if self.tree.is_none() {
            let set = self.layout_set.as_ref().ok_or(EngineError::NoLayoutSet)?;
            let mut tree = self.builder.build_from_data(set, &self.sources)?;
            self.report = resolve_tree(&mut tree, &self.sources, &self.config.resolve_options());
            self.tree = Some(tree);
        }
        self.tree.as_ref().ok_or(EngineError::NoLayoutSet)
    }

    /// The last built tree, if still current.
    pub fn tree(&self) -> Option<&LayoutTree> {
        self.tree.as_ref()
    }

    /// Issues from the last resolution.
    pub fn report(&self) -> &ResolveReport {
        &self.report
    }

    /// Evaluate expression JSON, optionally in the scope of a node.
    ///
    /// `node_id` may be a realized id (`name-1`) or a base id.
    pub fn evaluate(&mut self, expr: &Value, node_id: Option<&str>) -> Result<ExprValue, EngineError> {
        let expr = parse_expression(expr)?;
        let options = self.config.eval;

        let Some(node_id) = node_id else {
            return Ok(Evaluator::new(&self.sources).with_options(options).evaluate(&expr)?);
        };

        self.build()?;
        let tree = self.tree.as_ref().ok_or(EngineError::NoLayoutSet)?;
        let node = tree
            .find_by_id(node_id, None)
            .ok_or_else(|| EngineError::UnknownNode { id: node_id.to_string() })?;
        let scope = ResolvedScope::node(tree, node.key);
        let value = Evaluator::new(&self.sources)
            .with_scope(&scope)
            .with_options(options)
            .evaluate(&expr)?;
        Ok(value)
    }
}
