//! WebAssembly bindings for the formtree engine.
//!
//! This crate provides a JavaScript/TypeScript API for evaluating expressions
//! and building node trees in web browsers.
//!
//! ## Example
//!
//! ```js
//! import { FormEngine } from 'formtree';
//!
//! const engine = new FormEngine();
//! engine.loadLayoutSet({
//!   id: 'form',
//!   dataType: 'model',
//!   pages: { page1: [{ id: 'name', type: 'Input', dataModelBindings: { simpleBinding: 'name' } }] }
//! });
//! engine.setFormData('model', { name: 'Ada', count: 3 });
//!
//! const tree = engine.build();
//! const big = engine.evaluate(['greaterThan', ['dataModel', 'count'], 2]);
//! ```

use serde::Serialize;
use wasm_bindgen::prelude::*;

use formtree_parser::validate_expression;
use formtree_resolver::DataSources;

mod engine;
mod types;

pub use engine::{Engine, EngineConfig, EngineError};
pub use types::*;

/// Initialize panic hook for better error messages in the browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(debug_assertions)]
    console_error_panic_hook::set_once();
}

/// The main formtree engine interface for JavaScript.
#[wasm_bindgen]
pub struct FormEngine {
    engine: Engine,
}

#[wasm_bindgen]
impl FormEngine {
    /// Create a new engine instance.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self { engine: Engine::new() }
    }

    /// Get the version of the engine.
    #[wasm_bindgen(js_name = version)]
    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Set engine options (`{ eval, build }`).
    #[wasm_bindgen]
    pub fn configure(&mut self, config: JsValue) -> Result<(), JsError> {
        let config: EngineConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsError::new(&format!("Invalid configuration: {}", e)))?;
        self.engine.configure(config);
        Ok(())
    }

    /// Load a layout set (`{ id, dataType, pages, order }`).
    #[wasm_bindgen(js_name = loadLayoutSet)]
    pub fn load_layout_set(&mut self, layout_set: JsValue) -> Result<(), JsError> {
        let value: serde_json::Value = serde_wasm_bindgen::from_value(layout_set)
            .map_err(|e| JsError::new(&format!("Invalid layout set: {}", e)))?;
        self.engine
            .load_layout_set(&value)
            .map_err(|e| JsError::new(&format!("Layout error: {}", e)))
    }

    /// Replace the form data of one data type.
    #[wasm_bindgen(js_name = setFormData)]
    pub fn set_form_data(&mut self, data_type: &str, data: JsValue) -> Result<(), JsError> {
        let data: serde_json::Value = serde_wasm_bindgen::from_value(data)
            .map_err(|e| JsError::new(&format!("Invalid form data: {}", e)))?;
        self.engine.set_form_data(data_type, data);
        Ok(())
    }

    /// Replace every data source: form data, instance, settings, roles, texts.
    #[wasm_bindgen(js_name = setDataSources)]
    pub fn set_data_sources(&mut self, sources: JsValue) -> Result<(), JsError> {
        let sources: DataSources = serde_wasm_bindgen::from_value(sources)
            .map_err(|e| JsError::new(&format!("Invalid data sources: {}", e)))?;
        self.engine.set_data_sources(sources);
        Ok(())
    }

    /// Build and resolve the node tree.
    #[wasm_bindgen]
    pub fn build(&mut self) -> Result<JsValue, JsError> {
        self.engine
            .build()
            .map_err(|e| JsError::new(&format!("Build error: {}", e)))?;
        let tree = self
            .engine
            .tree()
            .map(|tree| TreeJs::from_tree(tree, self.engine.report()));
        to_js(&tree)
    }

    /// Evaluate an expression, optionally in the scope of a node id.
    #[wasm_bindgen]
    pub fn evaluate(&mut self, expr: JsValue, node_id: Option<String>) -> Result<JsValue, JsError> {
        let expr: serde_json::Value = serde_wasm_bindgen::from_value(expr)
            .map_err(|e| JsError::new(&format!("Invalid expression: {}", e)))?;
        let value = self
            .engine
            .evaluate(&expr, node_id.as_deref())
            .map_err(|e| JsError::new(&format!("Evaluation error: {}", e)))?;
        to_js(&value)
    }

    /// List static problems in expression JSON without evaluating it.
    #[wasm_bindgen(js_name = validateExpression)]
    pub fn validate_expression(&self, expr: JsValue) -> Result<JsValue, JsError> {
        let expr: serde_json::Value = serde_wasm_bindgen::from_value(expr)
            .map_err(|e| JsError::new(&format!("Invalid expression: {}", e)))?;
        to_js(&validate_expression(&expr))
    }
}

impl Default for FormEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Serialize with plain objects instead of `Map`s.
fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}

/// Get the engine version.
#[wasm_bindgen(js_name = getVersion)]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
