//! Expression resolution over a node tree.
//!
//! Every node's `hidden`, `required`, `readOnly` and text resource bindings are
//! evaluated in the node's own scope, so `dataModel` paths land in the node's
//! row and `component` lookups start from the node. Hidden state is memoized
//! per pass since `component` and `displayValue` need the hidden state of the
//! nodes they reference. A node in a row hidden by `hiddenRow` is hidden too.

use std::cell::RefCell;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use formtree_core::{DataModelRef, ExprValue, Expression, ResolveError, ValueType};
use formtree_expr::{EvalOptions, Evaluator};
use formtree_resolver::{ComponentTarget, DataSources, NodeScope};

use crate::tree::{LayoutTree, NodeKey, NodeState};

/// Options for tree resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResolveOptions {
    pub eval: EvalOptions,
}

/// An expression that failed during resolution and was defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveIssue {
    /// Realized node id, or `None` for page-level expressions.
    pub node: Option<String>,
    pub page: String,
    /// Property that failed, e.g. `hidden` or `textResourceBindings.title`.
    pub property: String,
    pub error: String,
}

/// Outcome of [`resolve_tree`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveReport {
    pub issues: Vec<ResolveIssue>,
}

impl ResolveReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Evaluate every expression in the tree and store the results on the nodes.
///
/// Failing expressions are logged, recorded in the report, and take their
/// default: visible, optional, editable, no text.
pub fn resolve_tree(tree: &mut LayoutTree, sources: &DataSources, options: &ResolveOptions) -> ResolveReport {
    let (pages, states, rows, issues) = {
        let resolver = Resolver::new(tree, sources, options);

        let pages: Vec<(String, bool)> = tree
            .pages()
            .map(|page| (page.name.clone(), resolver.page_hidden(&page.name)))
            .collect();

        let mut states = Vec::with_capacity(tree.len());
        let mut rows = Vec::new();
        for key in tree.keys() {
            states.push((key, resolver.node_state(key)));
            if let Some(hidden) = resolver.hidden_rows(key) {
                rows.push((key, hidden));
            }
        }
        (pages, states, rows, resolver.issues.into_inner())
    };

    for (name, hidden) in pages {
        if let Some(page) = tree.page_mut(&name) {
            page.hidden = hidden;
        }
    }
    for (key, state) in states {
        if let Some(node) = tree.get_mut(key) {
            node.state = state;
        }
    }
    for (key, hidden) in rows {
        if let Some(node) = tree.get_mut(key) {
            for (row, hidden) in node.rows.iter_mut().zip(hidden) {
                row.hidden = hidden;
            }
        }
    }

    debug!(nodes = tree.len(), issues = issues.len(), "resolved layout tree");
    ResolveReport { issues }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Memo {
    InProgress,
    Done(bool),
}

/// Per-pass resolution state.
struct Resolver<'a> {
    tree: &'a LayoutTree,
    sources: &'a DataSources,
    options: &'a ResolveOptions,
    pages: RefCell<HashMap<String, Memo>>,
    hidden: RefCell<HashMap<NodeKey, Memo>>,
    /// `hiddenRow` per (group, row position)
    rows: RefCell<HashMap<(NodeKey, usize), Memo>>,
    issues: RefCell<Vec<ResolveIssue>>,
}

impl<'a> Resolver<'a> {
    fn new(tree: &'a LayoutTree, sources: &'a DataSources, options: &'a ResolveOptions) -> Self {
        Self {
            tree,
            sources,
            options,
            pages: RefCell::new(HashMap::new()),
            hidden: RefCell::new(HashMap::new()),
            rows: RefCell::new(HashMap::new()),
            issues: RefCell::new(Vec::new()),
        }
    }

    fn page_hidden(&self, page: &str) -> bool {
        match self.pages.borrow().get(page) {
            Some(Memo::Done(hidden)) => return *hidden,
            Some(Memo::InProgress) => {
                debug!(page, "page hidden expression depends on its own page");
                return false;
            }
            None => {}
        }

        self.pages.borrow_mut().insert(page.to_string(), Memo::InProgress);
        if let Some(layout) = self.tree.page(page) {
            for invalid in &layout.invalid_expressions {
                self.record(None, page, &invalid.property, invalid.error.clone());
            }
        }
        let expr = self.tree.page(page).and_then(|p| p.hidden_expr.as_ref());
        let hidden = match expr {
            Some(expr) => {
                let scope = TreeScope::page(self, page);
                self.eval(&scope, expr, ValueType::Boolean, "hidden")
                    .as_bool()
                    .unwrap_or(false)
            }
            None => false,
        };
        self.pages.borrow_mut().insert(page.to_string(), Memo::Done(hidden));
        hidden
    }

    /// Hidden by page, ancestor, enclosing row, or own expression.
    ///
    /// Fails only when the node is already being resolved further up the
    /// stack, i.e. its hidden state depends on itself.
    fn is_hidden(&self, key: NodeKey) -> Result<bool, ResolveError> {
        match self.hidden.borrow().get(&key) {
            Some(Memo::Done(hidden)) => return Ok(*hidden),
            Some(Memo::InProgress) => {
                let id = self.tree.get(key).map(|n| n.id.clone()).unwrap_or_default();
                debug!(node = %id, "circular hidden reference");
                return Err(ResolveError::CircularReference { id });
            }
            None => {}
        }

        self.hidden.borrow_mut().insert(key, Memo::InProgress);
        let result = self.compute_hidden(key);
        match &result {
            Ok(hidden) => self.hidden.borrow_mut().insert(key, Memo::Done(*hidden)),
            Err(_) => self.hidden.borrow_mut().remove(&key),
        };
        result
    }

    fn compute_hidden(&self, key: NodeKey) -> Result<bool, ResolveError> {
        let Some(node) = self.tree.get(key) else {
            return Ok(false);
        };
        if self.page_hidden(&node.page) {
            return Ok(true);
        }
        if let Some(parent) = node.parent {
            if self.is_hidden(parent)? {
                return Ok(true);
            }
            if let Some(row) = node.parent_row {
                if self.row_hidden(parent, row)? {
                    return Ok(true);
                }
            }
        }
        let Some(expr) = &node.def.hidden else {
            return Ok(false);
        };
        let scope = TreeScope::node(self, key);
        Ok(self
            .eval(&scope, expr, ValueType::Boolean, "hidden")
            .as_bool()
            .unwrap_or(false))
    }

    fn node_state(&self, key: NodeKey) -> NodeState {
        let Some(node) = self.tree.get(key) else {
            return NodeState::default();
        };
        for invalid in &node.def.invalid_expressions {
            self.record(Some(&node.id), &node.page, &invalid.property, invalid.error.clone());
        }
        let hidden = self.is_hidden(key).unwrap_or_else(|err| {
            self.record(Some(&node.id), &node.page, "hidden", err.to_string());
            false
        });

        let scope = TreeScope::node(self, key);
        let flag = |expr: Option<&Expression>, property: &str| {
            expr.map(|expr| self.eval(&scope, expr, ValueType::Boolean, property))
                .and_then(|value| value.as_bool())
                .unwrap_or(false)
        };
        let required = flag(node.def.required.as_ref(), "required");
        let read_only = flag(node.def.read_only.as_ref(), "readOnly");

        let texts = node
            .def
            .text_resource_bindings
            .iter()
            .map(|(name, expr)| {
                let property = format!("textResourceBindings.{}", name);
                let text = match self.eval(&scope, expr, ValueType::String, &property) {
                    ExprValue::String(key) => ExprValue::String(self.sources.text(&key).to_string()),
                    other => other,
                };
                (name.clone(), text)
            })
            .collect();

        NodeState {
            hidden,
            required,
            read_only,
            texts,
        }
    }

    /// `hiddenRow` per row of a repeating group.
    fn hidden_rows(&self, key: NodeKey) -> Option<Vec<bool>> {
        let node = self.tree.get(key)?;
        node.def.hidden_row.as_ref()?;
        let hidden = (0..node.rows.len())
            .map(|position| self.row_hidden(key, position).unwrap_or(false))
            .collect();
        Some(hidden)
    }

    /// `hiddenRow` of one row, evaluated from the row's first child.
    ///
    /// Fails when the row's own `hiddenRow` is being evaluated further up the
    /// stack, e.g. it looks up a component inside the same row.
    fn row_hidden(&self, group: NodeKey, position: usize) -> Result<bool, ResolveError> {
        let Some(node) = self.tree.get(group) else {
            return Ok(false);
        };
        let (Some(expr), Some(row)) = (node.def.hidden_row.as_ref(), node.rows.get(position)) else {
            return Ok(false);
        };

        match self.rows.borrow().get(&(group, position)) {
            Some(Memo::Done(hidden)) => return Ok(*hidden),
            Some(Memo::InProgress) => {
                let id = format!("{}[{}]", node.id, row.index);
                debug!(row = %id, "circular hiddenRow reference");
                return Err(ResolveError::CircularReference { id });
            }
            None => {}
        }

        self.rows.borrow_mut().insert((group, position), Memo::InProgress);
        let from = row.children.first().copied().unwrap_or(group);
        let scope = TreeScope::node(self, from).with_location(row.location.clone());
        let property = format!("hiddenRow[{}]", row.index);
        let hidden = self
            .eval(&scope, expr, ValueType::Boolean, &property)
            .as_bool()
            .unwrap_or(false);
        self.rows.borrow_mut().insert((group, position), Memo::Done(hidden));
        Ok(hidden)
    }

    fn eval(&self, scope: &TreeScope<'_>, expr: &Expression, ty: ValueType, property: &str) -> ExprValue {
        let evaluator = Evaluator::new(self.sources)
            .with_scope(scope)
            .with_options(self.options.eval);
        match evaluator.evaluate_as(expr, ty) {
            Ok(value) => value,
            Err(err) => {
                let node = scope.node.and_then(|key| self.tree.get(key)).map(|n| n.id.as_str());
                warn!(node = ?node, page = %scope.page.as_deref().unwrap_or(""), property, error = %err, "expression failed, using default value");
                self.record(node, scope.page.as_deref().unwrap_or(""), property, err.to_string());
                ExprValue::Null
            }
        }
    }

    fn record(&self, node: Option<&str>, page: &str, property: &str, error: String) {
        self.issues.borrow_mut().push(ResolveIssue {
            node: node.map(str::to_string),
            page: page.to_string(),
            property: property.to_string(),
            error,
        });
    }
}

/// The scope of a node (or a page) during tree resolution.
struct TreeScope<'a> {
    resolver: &'a Resolver<'a>,
    node: Option<NodeKey>,
    location: Option<DataModelRef>,
    page: Option<String>,
}

impl<'a> TreeScope<'a> {
    fn node(resolver: &'a Resolver<'a>, key: NodeKey) -> Self {
        let node = resolver.tree.get(key);
        Self {
            resolver,
            node: Some(key),
            location: node.and_then(|n| n.row_location.clone()),
            page: node.map(|n| n.page.clone()),
        }
    }

    fn page(resolver: &'a Resolver<'a>, page: &str) -> Self {
        Self {
            resolver,
            node: None,
            location: None,
            page: Some(page.to_string()),
        }
    }

    fn with_location(mut self, location: Option<DataModelRef>) -> Self {
        if location.is_some() {
            self.location = location;
        }
        self
    }
}

impl NodeScope for TreeScope<'_> {
    fn location(&self) -> Option<&DataModelRef> {
        self.location.as_ref()
    }

    fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    fn find_component(&self, id: &str) -> Result<Option<ComponentTarget>, ResolveError> {
        let tree = self.resolver.tree;
        let target = match self.node {
            Some(key) => tree.closest(key, id),
            None => tree.find_by_id(id, self.page.as_deref()),
        };
        let Some(target) = target else {
            return Ok(None);
        };
        Ok(Some(ComponentTarget {
            id: target.id.clone(),
            kind: target.kind.clone(),
            page: target.page.clone(),
            simple_binding: target.simple_binding().cloned(),
            hidden: self.resolver.is_hidden(target.key)?,
            options: target.def.options.clone(),
        }))
    }
}

/// The scope of a node in a tree that has already been resolved.
///
/// Hidden state is read from the nodes instead of being evaluated.
pub struct ResolvedScope<'a> {
    tree: &'a LayoutTree,
    node: Option<NodeKey>,
    page: Option<String>,
}

impl<'a> ResolvedScope<'a> {
    pub fn node(tree: &'a LayoutTree, key: NodeKey) -> Self {
        Self {
            tree,
            node: Some(key),
            page: tree.get(key).map(|n| n.page.clone()),
        }
    }

    pub fn page(tree: &'a LayoutTree, page: impl Into<String>) -> Self {
        Self {
            tree,
            node: None,
            page: Some(page.into()),
        }
    }
}

impl NodeScope for ResolvedScope<'_> {
    fn location(&self) -> Option<&DataModelRef> {
        self.node
            .and_then(|key| self.tree.get(key))
            .and_then(|n| n.row_location.as_ref())
    }

    fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    fn find_component(&self, id: &str) -> Result<Option<ComponentTarget>, ResolveError> {
        let target = match self.node {
            Some(key) => self.tree.closest(key, id),
            None => self.tree.find_by_id(id, self.page.as_deref()),
        };
        Ok(target.map(|target| ComponentTarget {
            id: target.id.clone(),
            kind: target.kind.clone(),
            page: target.page.clone(),
            simple_binding: target.simple_binding().cloned(),
            hidden: target.state.hidden,
            options: target.def.options.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use formtree_core::{ComponentDef, DataPath, InvalidExpression, PathSegment, REPEATING_GROUP_TYPE};
    use formtree_parser::{parse_data_model_ref, parse_expression};
    use serde_json::{json, Value};

    use crate::tree::{LayoutNode, Row};

    fn expr(value: Value) -> Expression {
        parse_expression(&value).unwrap()
    }

    fn input(id: &str, binding: &str) -> ComponentDef {
        let mut def = ComponentDef::new(id, "Input");
        def.data_model_bindings
            .insert("simpleBinding".into(), parse_data_model_ref(&json!(binding)).unwrap());
        def
    }

    fn insert(tree: &mut LayoutTree, key: u64, def: ComponentDef) -> NodeKey {
        let node = LayoutNode::new(NodeKey(key), Rc::new(def), "page1").with_default_type(Some("model"));
        tree.insert(node).unwrap()
    }

    fn sources(data: Value) -> DataSources {
        DataSources::new()
            .with_form_data("model", data)
            .with_text_resource("name.title", "Your name")
    }

    #[test]
    fn test_hidden_required_and_texts() {
        let mut tree = LayoutTree::new("form").with_data_type(Some("model".into()));
        tree.add_page("page1", None);

        let mut name = input("name", "name");
        name.hidden = Some(expr(json!(["equals", ["dataModel", "skip"], true])));
        name.required = Some(expr(json!(true)));
        name.text_resource_bindings.insert("title".into(), expr(json!("name.title")));
        let name = insert(&mut tree, 0, name);

        let mut age = input("age", "age");
        age.read_only = Some(expr(json!(["greaterThan", ["dataModel", "age"], 17])));
        let age = insert(&mut tree, 1, age);

        let report = resolve_tree(&mut tree, &sources(json!({ "skip": true, "age": 30 })), &ResolveOptions::default());
        assert!(report.is_clean());

        let name = &tree.get(name).unwrap().state;
        assert!(name.hidden);
        assert!(name.required);
        assert_eq!(name.texts["title"], ExprValue::String("Your name".into()));

        let age = &tree.get(age).unwrap().state;
        assert!(!age.hidden);
        assert!(age.read_only);
        assert_eq!(tree.visible_roots("page1").len(), 1);
    }

    #[test]
    fn test_page_and_parent_hidden_propagate() {
        let mut tree = LayoutTree::new("form");
        tree.add_page("page1", Some(expr(json!(["dataModel", "hidePage"]))));

        let mut group = ComponentDef::new("group", "Group");
        group.hidden = Some(expr(json!(true)));
        let group = insert(&mut tree, 0, group);
        let child = LayoutNode::new(NodeKey(1), Rc::new(input("child", "x")), "page1").with_parent(group, None);
        let child = tree.insert(child).unwrap();

        resolve_tree(&mut tree, &sources(json!({ "hidePage": false })), &ResolveOptions::default());
        assert!(!tree.page("page1").unwrap().hidden);
        assert!(tree.get(child).unwrap().state.hidden);

        let mut tree = LayoutTree::new("form");
        tree.add_page("page1", Some(expr(json!(["dataModel", "hidePage"]))));
        let lone = insert(&mut tree, 0, input("lone", "x"));
        resolve_tree(&mut tree, &sources(json!({ "hidePage": true })), &ResolveOptions::default());
        assert!(tree.page("page1").unwrap().hidden);
        assert!(tree.get(lone).unwrap().state.hidden);
    }

    #[test]
    fn test_component_sees_hidden_target() {
        let mut tree = LayoutTree::new("form");
        tree.add_page("page1", None);

        let mut source = input("source", "a");
        source.hidden = Some(expr(json!(true)));
        insert(&mut tree, 0, source);

        let mut reader = input("reader", "b");
        reader.hidden = Some(expr(json!(["equals", ["component", "source"], null])));
        let reader = insert(&mut tree, 1, reader);

        let report = resolve_tree(&mut tree, &sources(json!({ "a": "x" })), &ResolveOptions::default());
        assert!(report.is_clean());
        assert!(tree.get(reader).unwrap().state.hidden);
    }

    #[test]
    fn test_circular_hidden_defaults_to_visible() {
        let mut tree = LayoutTree::new("form");
        tree.add_page("page1", None);

        let mut a = input("a", "a");
        a.hidden = Some(expr(json!(["equals", ["component", "b"], "x"])));
        let a = insert(&mut tree, 0, a);
        let mut b = input("b", "b");
        b.hidden = Some(expr(json!(["equals", ["component", "a"], "x"])));
        let b = insert(&mut tree, 1, b);

        let report = resolve_tree(&mut tree, &sources(json!({ "a": "x", "b": "y" })), &ResolveOptions::default());
        assert!(!report.is_clean());
        assert!(report.issues.iter().all(|issue| issue.property == "hidden"));
        assert!(!tree.get(b).unwrap().state.hidden);
        // b resolves visible after the cycle is broken, so a compares "y" to "x"
        assert!(!tree.get(a).unwrap().state.hidden);
    }

    #[test]
    fn test_errors_are_reported_and_defaulted() {
        let mut tree = LayoutTree::new("form");
        tree.add_page("page1", None);
        let mut broken = input("broken", "a");
        broken.required = Some(expr(json!(["component", "nowhere"])));
        let broken = insert(&mut tree, 0, broken);

        let report = resolve_tree(&mut tree, &sources(json!({})), &ResolveOptions::default());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].node.as_deref(), Some("broken"));
        assert_eq!(report.issues[0].property, "required");
        assert!(!tree.get(broken).unwrap().state.required);
    }

    #[test]
    fn test_rows_resolve_in_their_own_location() {
        let mut tree = LayoutTree::new("form").with_data_type(Some("model".into()));
        tree.add_page("page1", None);

        let mut group = ComponentDef::new("group", REPEATING_GROUP_TYPE);
        group.data_model_bindings
            .insert("group".into(), parse_data_model_ref(&json!("rows")).unwrap());
        group.hidden_row = Some(expr(json!(["dataModel", "rows.skip"])));
        let group = insert(&mut tree, 0, group);

        let mut child_def = input("value", "rows.value");
        child_def.hidden = Some(expr(json!(["equals", ["dataModel", "rows.value"], "b"])));
        let child_def = Rc::new(child_def);

        let mut children = Vec::new();
        for i in 0..2 {
            let location = DataModelRef::new(Some("model".into()), DataPath::new([PathSegment::indexed("rows", i)]));
            let mut row = Row::new(i);
            row.location = Some(location.clone());
            let row = tree.push_row(group, row).unwrap();
            let node = LayoutNode::new(NodeKey(1 + i as u64), child_def.clone(), "page1")
                .with_default_type(Some("model"))
                .with_parent(group, Some(row))
                .with_rows(vec![i], Some(location));
            children.push(tree.insert(node).unwrap());
        }

        let data = json!({ "rows": [{ "value": "a", "skip": true }, { "value": "b", "skip": false }] });
        let report = resolve_tree(&mut tree, &sources(data), &ResolveOptions::default());
        assert!(report.is_clean());

        let node = tree.get(group).unwrap();
        assert_eq!(node.rows.iter().map(|r| r.hidden).collect::<Vec<_>>(), vec![true, false]);
        // row 0 by hiddenRow, row 1 by its own expression
        assert!(tree.get(children[0]).unwrap().state.hidden);
        assert!(tree.get(children[1]).unwrap().state.hidden);
        assert_eq!(
            tree.get(children[1]).unwrap().simple_binding().unwrap().to_string(),
            "model:rows[1].value"
        );
    }

    #[test]
    fn test_hidden_row_hides_its_nodes() {
        let mut tree = LayoutTree::new("form").with_data_type(Some("model".into()));
        tree.add_page("page1", None);

        let mut group = ComponentDef::new("people", REPEATING_GROUP_TYPE);
        group.data_model_bindings
            .insert("group".into(), parse_data_model_ref(&json!("people")).unwrap());
        group.hidden_row = Some(expr(json!(["equals", ["dataModel", "people.archived"], true])));
        let group = insert(&mut tree, 0, group);

        let name_def = Rc::new(input("name", "people.name"));
        let mut names = Vec::new();
        for i in 0..2 {
            let location = DataModelRef::new(Some("model".into()), DataPath::new([PathSegment::indexed("people", i)]));
            let mut row = Row::new(i);
            row.location = Some(location.clone());
            let row = tree.push_row(group, row).unwrap();
            let node = LayoutNode::new(NodeKey(1 + i as u64), name_def.clone(), "page1")
                .with_default_type(Some("model"))
                .with_parent(group, Some(row))
                .with_rows(vec![i], Some(location));
            names.push(tree.insert(node).unwrap());
        }

        let mut reader = input("reader", "reader");
        reader.required = Some(expr(json!(["equals", ["component", "name-0"], null])));
        let reader = insert(&mut tree, 3, reader);

        let sources = sources(json!({
            "people": [{ "name": "Ada", "archived": true }, { "name": "Bo", "archived": false }]
        }));
        let report = resolve_tree(&mut tree, &sources, &ResolveOptions::default());
        assert!(report.is_clean());

        assert!(tree.get(group).unwrap().rows[0].hidden);
        assert!(tree.get(names[0]).unwrap().state.hidden);
        assert!(!tree.get(names[1]).unwrap().state.hidden);
        assert!(tree.get(reader).unwrap().state.required);
        assert_eq!(tree.visible_children(group, Some(0)).len(), 0);
        assert_eq!(tree.visible_children(group, Some(1)).len(), 1);

        let scope = ResolvedScope::node(&tree, reader);
        let evaluator = Evaluator::new(&sources).with_scope(&scope);
        assert_eq!(evaluator.evaluate(&expr(json!(["component", "name-0"]))).unwrap(), ExprValue::Null);
        assert_eq!(evaluator.evaluate(&expr(json!(["component", "name-1"]))).unwrap(), ExprValue::from("Bo"));
    }

    #[test]
    fn test_hidden_row_reading_its_own_row_is_reported() {
        let mut tree = LayoutTree::new("form").with_data_type(Some("model".into()));
        tree.add_page("page1", None);

        let mut group = ComponentDef::new("rows", REPEATING_GROUP_TYPE);
        group.data_model_bindings
            .insert("group".into(), parse_data_model_ref(&json!("rows")).unwrap());
        group.hidden_row = Some(expr(json!(["equals", ["component", "value"], "x"])));
        let group = insert(&mut tree, 0, group);

        let location = DataModelRef::new(Some("model".into()), DataPath::new([PathSegment::indexed("rows", 0)]));
        let mut row = Row::new(0);
        row.location = Some(location.clone());
        let row = tree.push_row(group, row).unwrap();
        let node = LayoutNode::new(NodeKey(1), Rc::new(input("value", "rows.value")), "page1")
            .with_default_type(Some("model"))
            .with_parent(group, Some(row))
            .with_rows(vec![0], Some(location));
        let value = tree.insert(node).unwrap();

        let report = resolve_tree(&mut tree, &sources(json!({ "rows": [{ "value": "x" }] })), &ResolveOptions::default());
        assert!(report.issues.iter().any(|issue| issue.property == "hiddenRow[0]"));
        assert!(!tree.get(group).unwrap().rows[0].hidden);
        assert!(!tree.get(value).unwrap().state.hidden);
    }

    #[test]
    fn test_invalid_expressions_are_reported() {
        let mut tree = LayoutTree::new("form");
        tree.add_page("page1", None);
        tree.page_mut("page1").unwrap().invalid_expressions.push(InvalidExpression {
            property: "hidden".into(),
            error: "Unknown function 'bogus' at $[0]".into(),
        });

        let mut typo = input("typo", "a");
        typo.invalid_expressions.push(InvalidExpression {
            property: "hidden".into(),
            error: "Unknown function 'equalz' at $[0]".into(),
        });
        let typo = insert(&mut tree, 0, typo);
        let ok = insert(&mut tree, 1, input("ok", "b"));

        let report = resolve_tree(&mut tree, &sources(json!({})), &ResolveOptions::default());
        assert_eq!(report.issues.len(), 2);
        assert_eq!(report.issues[0].node, None);
        assert_eq!(report.issues[1].node.as_deref(), Some("typo"));
        assert!(report.issues[1].error.contains("equalz"));
        assert!(!tree.get(typo).unwrap().state.hidden);
        assert!(!tree.get(ok).unwrap().state.hidden);
        assert_eq!(tree.visible_roots("page1").len(), 2);
    }

    #[test]
    fn test_resolved_scope_reads_node_state() {
        let mut tree = LayoutTree::new("form");
        tree.add_page("page1", None);
        let mut hidden = input("secret", "secret");
        hidden.hidden = Some(expr(json!(true)));
        insert(&mut tree, 0, hidden);
        let shown = insert(&mut tree, 1, input("shown", "shown"));

        let sources = sources(json!({ "secret": "s", "shown": "v" }));
        resolve_tree(&mut tree, &sources, &ResolveOptions::default());

        let scope = ResolvedScope::node(&tree, shown);
        let evaluator = Evaluator::new(&sources).with_scope(&scope);
        assert_eq!(evaluator.evaluate(&expr(json!(["component", "shown"]))).unwrap(), ExprValue::from("v"));
        assert_eq!(evaluator.evaluate(&expr(json!(["component", "secret"]))).unwrap(), ExprValue::Null);

        let scope = ResolvedScope::page(&tree, "page1");
        let evaluator = Evaluator::new(&sources).with_scope(&scope);
        assert_eq!(evaluator.evaluate(&expr(json!(["component", "shown"]))).unwrap(), ExprValue::from("v"));
    }
}
