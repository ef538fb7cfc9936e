//! Node tree data structures.
//!
//! The node tree mirrors the layout hierarchy, with repeating groups expanded
//! into one subtree per row. Nodes live in an arena keyed by [`NodeKey`] and
//! are stored in pre-order.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use formtree_core::{index_mapping_key, BuildError, ComponentDef, DataModelRef, ExprValue, Expression, InvalidExpression};

/// Stable identity of a node, reused across rebuilds of the same layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub u64);

/// Resolved expression state of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeState {
    /// Hidden by its own expression, an ancestor, or its page.
    pub hidden: bool,
    pub required: bool,
    pub read_only: bool,
    /// Resolved text resource bindings.
    pub texts: IndexMap<String, ExprValue>,
}

/// One row of a repeating group.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub index: usize,
    /// Stable row id from the row's data, if any.
    pub row_id: Option<String>,
    /// The group binding with this row's index, e.g. `Group[1]`.
    pub location: Option<DataModelRef>,
    pub children: Vec<NodeKey>,
    /// Result of the group's `hiddenRow` expression.
    pub hidden: bool,
}

impl Row {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            row_id: None,
            location: None,
            children: Vec::new(),
            hidden: false,
        }
    }
}

/// A realized component.
#[derive(Debug, Clone)]
pub struct LayoutNode {
    pub key: NodeKey,
    /// Realized id: the base id plus one `-i` suffix per enclosing row.
    pub id: String,
    /// Component id from the layout.
    pub base_id: String,
    pub page: String,
    pub kind: String,
    pub def: Rc<ComponentDef>,
    pub parent: Option<NodeKey>,
    /// Row of the parent repeating group this node belongs to.
    pub parent_row: Option<usize>,
    /// Children of a plain container.
    pub children: Vec<NodeKey>,
    /// Rows of a repeating group.
    pub rows: Vec<Row>,
    /// Indices of every enclosing row, outermost first.
    pub row_indices: Vec<usize>,
    /// Location of the innermost enclosing row.
    pub row_location: Option<DataModelRef>,
    /// Data model bindings transposed into this node's row.
    pub bindings: IndexMap<String, DataModelRef>,
    /// Option mapping with row indicators filled in.
    pub mapping: IndexMap<String, String>,
    pub state: NodeState,
}

/// Realized id of a component inside the given rows.
pub fn realized_id(base_id: &str, row_indices: &[usize]) -> String {
    let mut id = base_id.to_string();
    for index in row_indices {
        let _ = write!(id, "-{}", index);
    }
    id
}

impl LayoutNode {
    /// Create a top-level node outside any row.
    pub fn new(key: NodeKey, def: Rc<ComponentDef>, page: impl Into<String>) -> Self {
        Self {
            key,
            id: def.id.clone(),
            base_id: def.id.clone(),
            page: page.into(),
            kind: def.kind.clone(),
            bindings: def.data_model_bindings.clone(),
            mapping: def.mapping.clone(),
            def,
            parent: None,
            parent_row: None,
            children: Vec::new(),
            rows: Vec::new(),
            row_indices: Vec::new(),
            row_location: None,
            state: NodeState::default(),
        }
    }

    /// Attach to a parent, optionally inside one of its rows.
    pub fn with_parent(mut self, parent: NodeKey, row: Option<usize>) -> Self {
        self.parent = Some(parent);
        self.parent_row = row;
        self
    }

    /// Give bindings without a data type the layout set's default.
    pub fn with_default_type(mut self, default: Option<&str>) -> Self {
        for binding in self.bindings.values_mut() {
            *binding = binding.with_default_type(default);
        }
        self
    }

    /// Place inside rows: suffixes the id, transposes bindings into `location`,
    /// and fills mapping row indicators.
    pub fn with_rows(mut self, row_indices: Vec<usize>, location: Option<DataModelRef>) -> Self {
        self.id = realized_id(&self.base_id, &row_indices);
        if !row_indices.is_empty() {
            self.mapping = self
                .mapping
                .iter()
                .map(|(path, param)| (index_mapping_key(path, &row_indices), param.clone()))
                .collect();
        }
        if let Some(location) = &location {
            for binding in self.bindings.values_mut() {
                *binding = binding.transpose(location);
            }
        }
        self.row_indices = row_indices;
        self.row_location = location;
        self
    }

    pub fn is_repeating(&self) -> bool {
        self.def.is_repeating()
    }

    pub fn is_container(&self) -> bool {
        self.def.is_container()
    }

    pub fn simple_binding(&self) -> Option<&DataModelRef> {
        self.bindings.get(formtree_core::SIMPLE_BINDING_KEY)
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    fn matches(&self, id: &str) -> bool {
        self.id == id || self.base_id == id
    }
}

/// The nodes of one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPage {
    pub name: String,
    /// Top-level nodes in declared order.
    pub roots: Vec<NodeKey>,
    pub hidden_expr: Option<Expression>,
    /// Page expressions dropped while parsing.
    pub invalid_expressions: Vec<InvalidExpression>,
    pub hidden: bool,
}

/// The realized nodes of a layout set.
#[derive(Debug, Clone, Default)]
pub struct LayoutTree {
    pub layout_set: String,
    /// Default data type of the layout set.
    pub data_type: Option<String>,
    /// All nodes, in pre-order
    nodes: IndexMap<NodeKey, LayoutNode>,
    /// Pages in display order
    pages: IndexMap<String, LayoutPage>,
    /// Realized id to its nodes, one per page at most
    ids: HashMap<String, Vec<NodeKey>>,
    /// Base id to every realization of it
    base_ids: HashMap<String, Vec<NodeKey>>,
}

impl LayoutTree {
    pub fn new(layout_set: impl Into<String>) -> Self {
        Self {
            layout_set: layout_set.into(),
            ..Default::default()
        }
    }

    pub fn with_data_type(mut self, data_type: Option<String>) -> Self {
        self.data_type = data_type;
        self
    }

    /// Add an empty page. Pages keep the order they are added in.
    pub fn add_page(&mut self, name: impl Into<String>, hidden_expr: Option<Expression>) {
        let name = name.into();
        self.pages.insert(
            name.clone(),
            LayoutPage {
                name,
                hidden_expr,
                ..Default::default()
            },
        );
    }

    /// Add a node, attaching it to its page or parent.
    ///
    /// Realized ids must be unique within a page.
    pub fn insert(&mut self, node: LayoutNode) -> Result<NodeKey, BuildError> {
        let duplicate = self
            .ids
            .get(&node.id)
            .map_or(false, |keys| keys.iter().filter_map(|k| self.nodes.get(k)).any(|n| n.page == node.page));
        if duplicate || self.nodes.contains_key(&node.key) {
            return Err(BuildError::DuplicateNodeId {
                page: node.page.clone(),
                id: node.id.clone(),
            });
        }

        let detached = || BuildError::DetachedNode { id: node.id.clone() };
        match (node.parent, node.parent_row) {
            (None, _) => self
                .pages
                .get_mut(&node.page)
                .ok_or_else(|| BuildError::UnknownPage {
                    page: node.page.clone(),
                })?
                .roots
                .push(node.key),
            (Some(parent), Some(row)) => self
                .nodes
                .get_mut(&parent)
                .and_then(|p| p.rows.get_mut(row))
                .ok_or_else(detached)?
                .children
                .push(node.key),
            (Some(parent), None) => self
                .nodes
                .get_mut(&parent)
                .ok_or_else(detached)?
                .children
                .push(node.key),
        }

        let key = node.key;
        self.ids.entry(node.id.clone()).or_default().push(key);
        self.base_ids.entry(node.base_id.clone()).or_default().push(key);
        self.nodes.insert(key, node);
        Ok(key)
    }

    /// Append a row to a repeating group node, returning its position.
    pub fn push_row(&mut self, key: NodeKey, row: Row) -> Option<usize> {
        let node = self.nodes.get_mut(&key)?;
        node.rows.push(row);
        Some(node.rows.len() - 1)
    }

    pub fn get(&self, key: NodeKey) -> Option<&LayoutNode> {
        self.nodes.get(&key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut LayoutNode> {
        self.nodes.get_mut(&key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in pre-order.
    pub fn nodes(&self) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.keys().copied()
    }

    pub fn page(&self, name: &str) -> Option<&LayoutPage> {
        self.pages.get(name)
    }

    pub fn page_mut(&mut self, name: &str) -> Option<&mut LayoutPage> {
        self.pages.get_mut(name)
    }

    pub fn pages(&self) -> impl Iterator<Item = &LayoutPage> {
        self.pages.values()
    }

    pub fn page_order(&self) -> Vec<&str> {
        self.pages.keys().map(String::as_str).collect()
    }

    /// Find a node by realized id, or else by base id, preferring `page`.
    pub fn find_by_id(&self, id: &str, page: Option<&str>) -> Option<&LayoutNode> {
        let candidates = self.find_all_by_id(id);
        page.and_then(|page| candidates.iter().find(|node| node.page == page).copied())
            .or_else(|| candidates.first().copied())
    }

    /// Every node with this realized id, or failing that, this base id.
    pub fn find_all_by_id(&self, id: &str) -> Vec<&LayoutNode> {
        self.ids
            .get(id)
            .or_else(|| self.base_ids.get(id))
            .map(|keys| keys.iter().filter_map(|key| self.get(*key)).collect())
            .unwrap_or_default()
    }

    /// Children of a node; with `row`, only that row of a repeating group.
    pub fn children(&self, key: NodeKey, row: Option<usize>) -> Vec<&LayoutNode> {
        let Some(node) = self.get(key) else {
            return Vec::new();
        };
        let keys: Vec<NodeKey> = match row {
            Some(row) => node.rows.get(row).map(|r| r.children.clone()).unwrap_or_default(),
            None => node
                .children
                .iter()
                .copied()
                .chain(node.rows.iter().flat_map(|r| r.children.iter().copied()))
                .collect(),
        };
        keys.into_iter().filter_map(|key| self.get(key)).collect()
    }

    /// Ancestors of a node, nearest first.
    pub fn parents(&self, key: NodeKey) -> Vec<&LayoutNode> {
        let mut out = Vec::new();
        let mut current = self.get(key).and_then(|node| node.parent);
        while let Some(parent) = current.and_then(|key| self.get(key)) {
            out.push(parent);
            current = parent.parent;
        }
        out
    }

    /// Top-level nodes of a page.
    pub fn roots(&self, page: &str) -> Vec<&LayoutNode> {
        self.pages
            .get(page)
            .map(|p| p.roots.iter().filter_map(|key| self.get(*key)).collect())
            .unwrap_or_default()
    }

    /// Every node of a page (or of all pages), in pre-order.
    pub fn flat(&self, page: Option<&str>, include_containers: bool) -> Vec<&LayoutNode> {
        self.nodes()
            .filter(|node| page.map_or(true, |page| node.page == page))
            .filter(|node| include_containers || !node.is_container())
            .collect()
    }

    /// The node that `id` refers to, as seen from `from`.
    ///
    /// Looks at `from` itself, then its siblings in the same row, then each
    /// ancestor and its siblings, then the page's top level. Failing that, the
    /// best match anywhere in the tree: same page first, then the candidate
    /// sharing the most enclosing rows with `from`.
    pub fn closest(&self, from: NodeKey, id: &str) -> Option<&LayoutNode> {
        let origin = self.get(from)?;
        if origin.matches(id) {
            return Some(origin);
        }

        let mut current = origin;
        loop {
            let siblings: &[NodeKey] = match current.parent {
                Some(parent) => {
                    let parent = self.get(parent)?;
                    match current.parent_row {
                        Some(row) => &parent.rows.get(row)?.children,
                        None => &parent.children,
                    }
                }
                None => &self.pages.get(&current.page)?.roots,
            };
            if let Some(found) = siblings.iter().filter_map(|key| self.get(*key)).find(|n| n.matches(id)) {
                return Some(found);
            }

            let Some(parent) = current.parent.and_then(|key| self.get(key)) else {
                break;
            };
            if parent.matches(id) {
                return Some(parent);
            }
            current = parent;
        }

        let score = |node: &LayoutNode| {
            let shared = node
                .row_indices
                .iter()
                .zip(&origin.row_indices)
                .take_while(|(a, b)| a == b)
                .count();
            (node.page == origin.page, shared)
        };
        self.find_all_by_id(id)
            .into_iter()
            .fold(None::<&LayoutNode>, |best, node| match best {
                Some(b) if score(b) >= score(node) => Some(b),
                _ => Some(node),
            })
    }

    /// Top-level nodes of a page that are not hidden.
    pub fn visible_roots(&self, page: &str) -> Vec<&LayoutNode> {
        self.roots(page).into_iter().filter(|n| !n.state.hidden).collect()
    }

    /// Children that are not hidden, skipping hidden rows.
    pub fn visible_children(&self, key: NodeKey, row: Option<usize>) -> Vec<&LayoutNode> {
        let Some(node) = self.get(key) else {
            return Vec::new();
        };
        let keys: Vec<NodeKey> = match row {
            Some(row) => node
                .rows
                .get(row)
                .filter(|r| !r.hidden)
                .map(|r| r.children.clone())
                .unwrap_or_default(),
            None => node
                .children
                .iter()
                .copied()
                .chain(node.rows.iter().filter(|r| !r.hidden).flat_map(|r| r.children.iter().copied()))
                .collect(),
        };
        keys.into_iter()
            .filter_map(|key| self.get(key))
            .filter(|n| !n.state.hidden)
            .collect()
    }

    /// Indented text rendering of the tree, one line per page, node and row.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        for page in self.pages.values() {
            let _ = writeln!(out, "{}{}", page.name, if page.hidden { " (hidden)" } else { "" });
            for key in &page.roots {
                self.outline_node(*key, 1, &mut out);
            }
        }
        out
    }

    fn outline_node(&self, key: NodeKey, depth: usize, out: &mut String) {
        let Some(node) = self.get(key) else {
            return;
        };
        let indent = "  ".repeat(depth);
        let hidden = if node.state.hidden { " (hidden)" } else { "" };
        let _ = writeln!(out, "{}{} [{}]{}", indent, node.id, node.kind, hidden);

        for child in &node.children {
            self.outline_node(*child, depth + 1, out);
        }
        for row in &node.rows {
            let _ = write!(out, "{}  row {}", indent, row.index);
            if let Some(row_id) = &row.row_id {
                let _ = write!(out, " ({})", row_id);
            }
            let _ = writeln!(out, "{}", if row.hidden { " (hidden)" } else { "" });
            for child in &row.children {
                self.outline_node(*child, depth + 2, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formtree_core::{ChildRef, REPEATING_GROUP_TYPE};

    fn def(id: &str, kind: &str) -> Rc<ComponentDef> {
        Rc::new(ComponentDef::new(id, kind))
    }

    /// page1: [header, group(rows 0..2: [name]), footer], page2: [name2]
    fn sample() -> (LayoutTree, Vec<NodeKey>) {
        let mut tree = LayoutTree::new("form");
        tree.add_page("page1", None);
        tree.add_page("page2", None);

        let mut group_def = ComponentDef::new("group", REPEATING_GROUP_TYPE);
        group_def.children.push(ChildRef::new("name"));
        let group_def = Rc::new(group_def);
        let name_def = def("name", "Input");

        let header = tree.insert(LayoutNode::new(NodeKey(0), def("header", "Header"), "page1")).unwrap();
        let group = tree.insert(LayoutNode::new(NodeKey(1), group_def, "page1")).unwrap();
        let mut keys = vec![header, group];
        for i in 0..2 {
            let row = tree.push_row(group, Row::new(i)).unwrap();
            let node = LayoutNode::new(NodeKey(2 + i as u64), name_def.clone(), "page1")
                .with_parent(group, Some(row))
                .with_rows(vec![i], None);
            keys.push(tree.insert(node).unwrap());
        }
        keys.push(tree.insert(LayoutNode::new(NodeKey(4), def("footer", "Paragraph"), "page1")).unwrap());
        keys.push(tree.insert(LayoutNode::new(NodeKey(5), def("name2", "Input"), "page2")).unwrap());
        (tree, keys)
    }

    #[test]
    fn test_realized_ids() {
        assert_eq!(realized_id("name", &[]), "name");
        assert_eq!(realized_id("name", &[1, 0]), "name-1-0");

        let (tree, keys) = sample();
        assert_eq!(tree.get(keys[2]).unwrap().id, "name-0");
        assert_eq!(tree.get(keys[3]).unwrap().id, "name-1");
        assert_eq!(tree.len(), 6);
    }

    #[test]
    fn test_duplicate_and_detached_nodes() {
        let (mut tree, keys) = sample();
        let err = tree
            .insert(LayoutNode::new(NodeKey(99), def("header", "Header"), "page1"))
            .unwrap_err();
        assert!(matches!(err, BuildError::DuplicateNodeId { .. }));

        let err = tree
            .insert(LayoutNode::new(NodeKey(100), def("x", "Input"), "page1").with_parent(keys[1], Some(7)))
            .unwrap_err();
        assert!(matches!(err, BuildError::DetachedNode { .. }));

        let err = tree
            .insert(LayoutNode::new(NodeKey(101), def("y", "Input"), "nowhere"))
            .unwrap_err();
        assert!(matches!(err, BuildError::UnknownPage { .. }));
    }

    #[test]
    fn test_children_and_parents() {
        let (tree, keys) = sample();
        let ids = |nodes: Vec<&LayoutNode>| nodes.into_iter().map(|n| n.id.clone()).collect::<Vec<_>>();

        assert_eq!(ids(tree.children(keys[1], None)), vec!["name-0", "name-1"]);
        assert_eq!(ids(tree.children(keys[1], Some(1))), vec!["name-1"]);
        assert_eq!(ids(tree.parents(keys[3])), vec!["group"]);
        assert_eq!(ids(tree.roots("page1")), vec!["header", "group", "footer"]);
        assert_eq!(ids(tree.flat(Some("page1"), false)), vec!["header", "name-0", "name-1", "footer"]);
        assert_eq!(tree.flat(None, true).len(), 6);
    }

    #[test]
    fn test_find_by_id() {
        let (tree, _) = sample();
        assert_eq!(tree.find_by_id("name-1", None).unwrap().id, "name-1");
        assert_eq!(tree.find_by_id("name", None).unwrap().id, "name-0");
        assert_eq!(tree.find_all_by_id("name").len(), 2);
        assert!(tree.find_by_id("missing", None).is_none());
    }

    #[test]
    fn test_same_id_on_two_pages() {
        let (mut tree, _) = sample();
        let other = tree
            .insert(LayoutNode::new(NodeKey(6), def("header", "Header"), "page2"))
            .unwrap();
        assert_eq!(tree.find_by_id("header", Some("page2")).unwrap().key, other);
        assert_eq!(tree.find_by_id("header", Some("page1")).unwrap().key, NodeKey(0));
        assert_eq!(tree.find_by_id("header", None).unwrap().key, NodeKey(0));
        assert_eq!(tree.find_all_by_id("header").len(), 2);
    }

    #[test]
    fn test_closest() {
        let (tree, keys) = sample();
        assert_eq!(tree.closest(keys[3], "name").unwrap().id, "name-1");
        assert_eq!(tree.closest(keys[3], "header").unwrap().key, keys[0]);
        assert_eq!(tree.closest(keys[3], "group").unwrap().key, keys[1]);
        assert_eq!(tree.closest(keys[0], "name").unwrap().id, "name-0");
        assert_eq!(tree.closest(keys[0], "name2").unwrap().page, "page2");
        assert!(tree.closest(keys[0], "missing").is_none());
    }

    #[test]
    fn test_visible_queries() {
        let (mut tree, keys) = sample();
        tree.get_mut(keys[0]).unwrap().state.hidden = true;
        tree.get_mut(keys[1]).unwrap().rows[0].hidden = true;

        let visible: Vec<_> = tree.visible_roots("page1").into_iter().map(|n| n.id.clone()).collect();
        assert_eq!(visible, vec!["group", "footer"]);
        let children: Vec<_> = tree.visible_children(keys[1], None).into_iter().map(|n| n.id.clone()).collect();
        assert_eq!(children, vec!["name-1"]);
        assert!(tree.visible_children(keys[1], Some(0)).is_empty());
    }

    #[test]
    fn test_outline() {
        let (mut tree, keys) = sample();
        tree.get_mut(keys[1]).unwrap().rows[1].row_id = Some("abc".into());
        assert_eq!(
            tree.outline(),
            "page1\n  header [Header]\n  group [RepeatingGroup]\n    row 0\n      name-0 [Input]\n    row 1 (abc)\n      name-1 [Input]\n  footer [Paragraph]\npage2\n  name2 [Input]\n"
        );
    }
}
