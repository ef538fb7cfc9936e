//! Node building.
//!
//! Expands a layout set into a [`LayoutTree`]:
//! 1. Index and validate each page's components
//! 2. Create a node per top-level component, in declared order
//! 3. Recurse into containers, once per row for repeating groups
//! 4. Reuse node keys from the previous build for the same identity

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use formtree_core::{BuildError, ComponentDef, DataModelRef, LayoutSet, GROUP_BINDING_KEY};
use formtree_layout::{LayoutNode, LayoutTree, NodeKey, Row};
use formtree_resolver::DataSources;

use crate::registry::ComponentRegistry;
use crate::rows::{FormDataRows, RowProvider, DEFAULT_ROW_ID_FIELD};

/// Maximum container nesting depth.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Options for node building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildOptions {
    /// Field of a row object holding its stable id.
    pub row_id_field: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            row_id_field: DEFAULT_ROW_ID_FIELD.to_string(),
        }
    }
}

/// Build a tree once, without keeping identities between builds.
pub fn expand_layout(layout_set: &LayoutSet, rows: &dyn RowProvider) -> Result<LayoutTree, BuildError> {
    NodeBuilder::new().build(layout_set, rows)
}

/// How a row is told apart from its siblings across builds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RowToken {
    Id(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Identity {
    page: String,
    base_id: String,
    rows: Vec<RowToken>,
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    key: NodeKey,
    generation: u64,
}

/// Node keys from earlier builds, by identity.
#[derive(Debug, Default)]
struct IdentityCache {
    entries: HashMap<Identity, CacheEntry>,
    next_key: u64,
    generation: u64,
}

impl IdentityCache {
    /// Key for an identity: the cached one, unless another node already
    /// claimed it in this build.
    fn key(&mut self, identity: Identity, claimed: &mut HashSet<NodeKey>) -> NodeKey {
        let generation = self.generation;
        if let Some(entry) = self.entries.get_mut(&identity) {
            if claimed.insert(entry.key) {
                entry.generation = generation;
                return entry.key;
            }
            let key = self.fresh();
            claimed.insert(key);
            return key;
        }

        let key = self.fresh();
        claimed.insert(key);
        self.entries.insert(identity, CacheEntry { key, generation });
        key
    }

    fn fresh(&mut self) -> NodeKey {
        let key = NodeKey(self.next_key);
        self.next_key += 1;
        key
    }

    /// Drop identities not seen in the current build.
    fn sweep(&mut self) {
        let generation = self.generation;
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.generation == generation);
        let evicted = before - self.entries.len();
        if evicted > 0 {
            debug!(evicted, kept = self.entries.len(), "evicted stale node identities");
        }
    }
}

/// Builds node trees from layout sets, keeping node keys stable across builds.
///
/// A node keeps its key between builds as long as its page, component id and
/// enclosing rows stay the same. Rows are identified by their row id when the
/// data has one, else by index.
#[derive(Debug, Default)]
pub struct NodeBuilder {
    options: BuildOptions,
    cache: IdentityCache,
}

impl NodeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Number of identities remembered from the last build.
    pub fn cached(&self) -> usize {
        self.cache.entries.len()
    }

    /// Build with rows read from form data.
    pub fn build_from_data(&mut self, layout_set: &LayoutSet, sources: &DataSources) -> Result<LayoutTree, BuildError> {
        let rows = FormDataRows::new(sources).with_row_id_field(self.options.row_id_field.clone());
        self.build(layout_set, &rows)
    }

    /// Build the tree for every page of a layout set.
    pub fn build(&mut self, layout_set: &LayoutSet, rows: &dyn RowProvider) -> Result<LayoutTree, BuildError> {
        self.cache.generation += 1;
        let mut tree = LayoutTree::new(layout_set.id.clone()).with_data_type(layout_set.data_type.clone());
        let mut claimed = HashSet::new();

        for page in layout_set.page_order() {
            let Some(layout) = layout_set.pages.get(page) else {
                continue;
            };
            let registry = ComponentRegistry::new(page, layout)?;
            tree.add_page(page, layout.hidden.clone());
            if let Some(built) = tree.page_mut(page) {
                built.invalid_expressions = layout.invalid_expressions.clone();
            }

            let mut expansion = Expansion {
                tree: &mut tree,
                cache: &mut self.cache,
                claimed: &mut claimed,
                registry: &registry,
                rows,
                data_type: layout_set.data_type.as_deref(),
            };
            for def in registry.top_level() {
                expansion.expand(def, None, &RowContext::default(), 0)?;
            }
        }

        self.cache.sweep();
        debug!(layout_set = %layout_set.id, nodes = tree.len(), "built node tree");
        Ok(tree)
    }
}

/// The rows enclosing a node being built.
#[derive(Debug, Clone, Default)]
struct RowContext {
    indices: Vec<usize>,
    tokens: Vec<RowToken>,
    location: Option<DataModelRef>,
}

impl RowContext {
    fn enter(&self, index: usize, token: RowToken, location: Option<DataModelRef>) -> Self {
        let mut indices = self.indices.clone();
        indices.push(index);
        let mut tokens = self.tokens.clone();
        tokens.push(token);
        Self {
            indices,
            tokens,
            location: location.or_else(|| self.location.clone()),
        }
    }
}

/// State of one page's expansion.
struct Expansion<'a> {
    tree: &'a mut LayoutTree,
    cache: &'a mut IdentityCache,
    claimed: &'a mut HashSet<NodeKey>,
    registry: &'a ComponentRegistry,
    rows: &'a dyn RowProvider,
    data_type: Option<&'a str>,
}

impl Expansion<'_> {
    fn expand(
        &mut self,
        def: &Rc<ComponentDef>,
        parent: Option<(NodeKey, Option<usize>)>,
        context: &RowContext,
        depth: usize,
    ) -> Result<NodeKey, BuildError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(BuildError::MaxDepthExceeded {
                depth: MAX_NESTING_DEPTH,
            });
        }

        let page = self.registry.page();
        let identity = Identity {
            page: page.to_string(),
            base_id: def.id.clone(),
            rows: context.tokens.clone(),
        };
        let key = self.cache.key(identity, self.claimed);

        let mut node = LayoutNode::new(key, def.clone(), page)
            .with_default_type(self.data_type)
            .with_rows(context.indices.clone(), context.location.clone());
        if let Some((parent, row)) = parent {
            node = node.with_parent(parent, row);
        }
        let group_binding = node.bindings.get(GROUP_BINDING_KEY).cloned();
        let id = node.id.clone();
        let key = self.tree.insert(node)?;

        if def.is_repeating() {
            for info in self.rows.rows(&id, group_binding.as_ref()) {
                let location = group_binding.as_ref().map(|binding| DataModelRef {
                    data_type: binding.data_type.clone(),
                    field: binding.field.with_last_index(info.index),
                });
                let token = match &info.row_id {
                    Some(row_id) => RowToken::Id(row_id.clone()),
                    None => RowToken::Index(info.index),
                };
                let inner = context.enter(info.index, token, location.clone());

                let row = Row {
                    row_id: info.row_id,
                    location,
                    ..Row::new(info.index)
                };
                let position = self
                    .tree
                    .push_row(key, row)
                    .ok_or_else(|| BuildError::DetachedNode { id: id.clone() })?;
                for child in self.registry.children(&def.id) {
                    self.expand(child, Some((key, Some(position))), &inner, depth + 1)?;
                }
            }
        } else if def.is_container() {
            for child in self.registry.children(&def.id) {
                self.expand(child, Some((key, None)), context, depth + 1)?;
            }
        }

        Ok(key)
    }
}
