//! Component registry for one page.
//!
//! Indexes a page's flat component list by id and records which container
//! claims each component, validating the hierarchy along the way.

use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::warn;

use formtree_core::{BuildError, ComponentDef, PageLayout};

/// The components of one page and their container hierarchy.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    page: String,
    components: IndexMap<String, Rc<ComponentDef>>,
    /// Child id to the container that claims it.
    parents: HashMap<String, String>,
}

impl ComponentRegistry {
    /// Index a page.
    ///
    /// Duplicate ids, components claimed by two containers, and container
    /// cycles are errors. Children that do not exist on the page are skipped.
    pub fn new(page: &str, layout: &PageLayout) -> Result<Self, BuildError> {
        let mut components = IndexMap::with_capacity(layout.components.len());
        for def in &layout.components {
            if components.contains_key(&def.id) {
                return Err(BuildError::DuplicateComponentId {
                    page: page.to_string(),
                    id: def.id.clone(),
                });
            }
            components.insert(def.id.clone(), Rc::new(def.clone()));
        }

        let mut parents: HashMap<String, String> = HashMap::new();
        for def in components.values() {
            for child in &def.children {
                if !components.contains_key(&child.id) {
                    warn!(page, container = %def.id, child = %child.id, "child component not found, skipping");
                    continue;
                }
                if let Some(first) = parents.get(&child.id) {
                    return Err(BuildError::MultipleParents {
                        page: page.to_string(),
                        id: child.id.clone(),
                        first: first.clone(),
                        second: def.id.clone(),
                    });
                }
                parents.insert(child.id.clone(), def.id.clone());
            }
        }

        let registry = Self {
            page: page.to_string(),
            components,
            parents,
        };
        registry.check_cycles()?;
        Ok(registry)
    }

    /// Each component has at most one parent, so a cycle shows up as a walk
    /// up the parent chain that returns to its start.
    fn check_cycles(&self) -> Result<(), BuildError> {
        for id in self.components.keys() {
            let mut chain = vec![id.clone()];
            let mut current = self.parents.get(id);
            while let Some(parent) = current {
                if parent == id {
                    return Err(BuildError::ContainerCycle {
                        page: self.page.clone(),
                        ids: chain,
                    });
                }
                if chain.contains(parent) {
                    break;
                }
                chain.push(parent.clone());
                current = self.parents.get(parent);
            }
        }
        Ok(())
    }

    pub fn page(&self) -> &str {
        &self.page
    }

    pub fn get(&self, id: &str) -> Option<&Rc<ComponentDef>> {
        self.components.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.components.contains_key(id)
    }

    /// The container claiming a component.
    pub fn parent(&self, id: &str) -> Option<&str> {
        self.parents.get(id).map(String::as_str)
    }

    /// Components not claimed by any container, in declared order.
    pub fn top_level(&self) -> Vec<&Rc<ComponentDef>> {
        self.components
            .values()
            .filter(|def| !self.parents.contains_key(&def.id))
            .collect()
    }

    /// Existing children of a container, in its `children` order.
    pub fn children(&self, id: &str) -> Vec<&Rc<ComponentDef>> {
        let Some(def) = self.components.get(id) else {
            return Vec::new();
        };
        def.children
            .iter()
            .filter_map(|child| self.components.get(&child.id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}
