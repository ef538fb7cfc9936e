//! JavaScript-friendly representations of the node tree.

use indexmap::IndexMap;
use serde::Serialize;

use formtree_core::ExprValue;
use formtree_layout::{LayoutNode, LayoutTree, NodeKey, ResolveIssue, ResolveReport};

/// A resolved node tree for JavaScript.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeJs {
    pub layout_set: String,
    pub pages: Vec<PageJs>,
    pub issues: Vec<ResolveIssue>,
}

/// A page and its top-level nodes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageJs {
    pub name: String,
    pub hidden: bool,
    pub nodes: Vec<NodeJs>,
}

/// A node with its resolved state and children.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeJs {
    pub key: NodeKey,
    pub id: String,
    pub base_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub hidden: bool,
    pub required: bool,
    pub read_only: bool,
    pub texts: IndexMap<String, ExprValue>,
    /// Bindings transposed into the node's row, as `dataType:path` strings.
    pub bindings: IndexMap<String, String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub mapping: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeJs>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<RowJs>,
}

/// A repeating group row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowJs {
    pub index: usize,
    pub row_id: Option<String>,
    pub hidden: bool,
    pub children: Vec<NodeJs>,
}

impl TreeJs {
    pub fn from_tree(tree: &LayoutTree, report: &ResolveReport) -> Self {
        Self {
            layout_set: tree.layout_set.clone(),
            pages: tree
                .pages()
                .map(|page| PageJs {
                    name: page.name.clone(),
                    hidden: page.hidden,
                    nodes: nodes(tree, &page.roots),
                })
                .collect(),
            issues: report.issues.clone(),
        }
    }
}

fn nodes(tree: &LayoutTree, keys: &[NodeKey]) -> Vec<NodeJs> {
    keys.iter()
        .filter_map(|key| tree.get(*key))
        .map(|node| node_js(tree, node))
        .collect()
}

fn node_js(tree: &LayoutTree, node: &LayoutNode) -> NodeJs {
    NodeJs {
        key: node.key,
        id: node.id.clone(),
        base_id: node.base_id.clone(),
        kind: node.kind.clone(),
        hidden: node.state.hidden,
        required: node.state.required,
        read_only: node.state.read_only,
        texts: node.state.texts.clone(),
        bindings: node
            .bindings
            .iter()
            .map(|(name, binding)| (name.clone(), binding.to_string()))
            .collect(),
        mapping: node.mapping.clone(),
        children: nodes(tree, &node.children),
        rows: node
            .rows
            .iter()
            .map(|row| RowJs {
                index: row.index,
                row_id: row.row_id.clone(),
                hidden: row.hidden,
                children: nodes(tree, &row.children),
            })
            .collect(),
    }
}
