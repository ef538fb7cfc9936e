//! Layout definitions: components, pages, and layout sets.
//!
//! These are the declarative inputs to the node builder. They are immutable once
//! parsed; realized nodes live in `formtree-layout`.

use indexmap::IndexMap;
use serde_json::Value;

use crate::ast::Expression;
use crate::path::DataModelRef;

/// Component type of a repeating group.
pub const REPEATING_GROUP_TYPE: &str = "RepeatingGroup";

/// Component type of a (possibly legacy repeating) group.
pub const GROUP_TYPE: &str = "Group";

/// Binding key holding the array a repeating group iterates over.
pub const GROUP_BINDING_KEY: &str = "group";

/// Binding key holding the single value of a simple component.
pub const SIMPLE_BINDING_KEY: &str = "simpleBinding";

/// A reference from a container to one of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub id: String,
    /// Page index within a multi-page group (`"N:id"` form).
    pub multi_page_index: Option<u32>,
}

impl ChildRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            multi_page_index: None,
        }
    }
}

/// A selectable option on a component, used for display values.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentOption {
    pub value: String,
    /// Text resource key or literal label.
    pub label: String,
}

/// An expression property that failed to parse. The property keeps its default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidExpression {
    /// Property name, e.g. `hidden` or `textResourceBindings.title`.
    pub property: String,
    pub error: String,
}

/// A declared component in a page.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDef {
    /// Identifier, unique within its page.
    pub id: String,
    /// Component type tag (e.g. `Input`, `Group`, `RepeatingGroup`).
    pub kind: String,
    pub data_model_bindings: IndexMap<String, DataModelRef>,
    pub text_resource_bindings: IndexMap<String, Expression>,
    pub children: Vec<ChildRef>,
    pub max_count: Option<u32>,
    pub hidden: Option<Expression>,
    pub required: Option<Expression>,
    pub read_only: Option<Expression>,
    /// Per-row visibility for repeating groups.
    pub hidden_row: Option<Expression>,
    pub options: Vec<ComponentOption>,
    /// Data model paths to query parameters for option lookups. Keys may hold
    /// `[{0}]` row indicators.
    pub mapping: IndexMap<String, String>,
    /// Expression properties dropped while parsing.
    pub invalid_expressions: Vec<InvalidExpression>,
    /// Any remaining type-specific configuration, kept verbatim.
    pub properties: IndexMap<String, Value>,
}

impl ComponentDef {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            data_model_bindings: IndexMap::new(),
            text_resource_bindings: IndexMap::new(),
            children: Vec::new(),
            max_count: None,
            hidden: None,
            required: None,
            read_only: None,
            hidden_row: None,
            options: Vec::new(),
            mapping: IndexMap::new(),
            invalid_expressions: Vec::new(),
            properties: IndexMap::new(),
        }
    }

    /// Whether this component replicates its children once per data row.
    pub fn is_repeating(&self) -> bool {
        self.kind == REPEATING_GROUP_TYPE
            || (self.kind == GROUP_TYPE && self.max_count.is_some_and(|max| max > 1))
    }

    /// Whether this component owns children (repeating or not).
    pub fn is_container(&self) -> bool {
        self.is_repeating() || self.kind == GROUP_TYPE || !self.children.is_empty()
    }

    /// The binding of a repeating group's rows.
    pub fn group_binding(&self) -> Option<&DataModelRef> {
        self.data_model_bindings.get(GROUP_BINDING_KEY)
    }

    /// The single value binding of a simple component.
    pub fn simple_binding(&self) -> Option<&DataModelRef> {
        self.data_model_bindings.get(SIMPLE_BINDING_KEY)
    }
}

/// Fill the `[{N}]` row indicators of a mapping key with row indices, outermost first.
///
/// `Group[{0}].Inner[{1}].Value` inside rows `[1, 0]` becomes `Group[1].Inner[0].Value`.
pub fn index_mapping_key(key: &str, row_indices: &[usize]) -> String {
    let mut key = key.to_string();
    for index in row_indices {
        let Some(start) = key.find("[{") else {
            break;
        };
        let Some(len) = key[start..].find("}]") else {
            break;
        };
        let inner = &key[start + 2..start + len];
        if inner.is_empty() || !inner.bytes().all(|b| b.is_ascii_digit()) {
            break;
        }
        key.replace_range(start..start + len + 2, &format!("[{}]", index));
    }
    key
}

/// One page of a layout set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageLayout {
    /// Components in declared order.
    pub components: Vec<ComponentDef>,
    /// Page-level visibility.
    pub hidden: Option<Expression>,
    pub invalid_expressions: Vec<InvalidExpression>,
}

impl PageLayout {
    pub fn new(components: Vec<ComponentDef>) -> Self {
        Self {
            components,
            hidden: None,
            invalid_expressions: Vec::new(),
        }
    }
}

/// A named collection of pages sharing a default data model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayoutSet {
    pub id: String,
    /// Data type used when a binding or `dataModel` call names none.
    pub data_type: Option<String>,
    pub pages: IndexMap<String, PageLayout>,
    /// Page order; empty means insertion order of `pages`.
    pub order: Vec<String>,
}

impl LayoutSet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the default data type.
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Add a page; it is appended to the order when an explicit order is in use.
    pub fn with_page(mut self, name: impl Into<String>, page: PageLayout) -> Self {
        let name = name.into();
        if !self.order.is_empty() {
            self.order.push(name.clone());
        }
        self.pages.insert(name, page);
        self
    }

    /// Page names in display order. Names in `order` with no page are skipped.
    pub fn page_order(&self) -> Vec<&str> {
        if self.order.is_empty() {
            return self.pages.keys().map(String::as_str).collect();
        }
        self.order
            .iter()
            .map(String::as_str)
            .filter(|name| self.pages.contains_key(*name))
            .collect()
    }
}
