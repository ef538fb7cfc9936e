//! The node context an expression is evaluated in.

use formtree_core::{ComponentOption, DataModelRef, ResolveError};

/// A component found by id from the evaluating node.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentTarget {
    /// Realized id, including row suffixes.
    pub id: String,
    pub kind: String,
    pub page: String,
    /// Simple binding, already transposed into the target's row.
    pub simple_binding: Option<DataModelRef>,
    pub hidden: bool,
    pub options: Vec<ComponentOption>,
}

/// Where in the layout an expression is being evaluated.
///
/// The node tree implements this so that `component`, `displayValue` and
/// `linkToComponent` can find other nodes, and so that `dataModel` paths are
/// transposed into the evaluating node's repeating group row.
pub trait NodeScope {
    /// Row location of the evaluating node, e.g. `Group[1]`.
    fn location(&self) -> Option<&DataModelRef>;

    /// Page of the evaluating node.
    fn page(&self) -> Option<&str>;

    /// Find the closest component with the given base or realized id.
    fn find_component(&self, id: &str) -> Result<Option<ComponentTarget>, ResolveError>;
}

/// Evaluation outside any node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScope;

impl NodeScope for NoScope {
    fn location(&self) -> Option<&DataModelRef> {
        None
    }

    fn page(&self) -> Option<&str> {
        None
    }

    fn find_component(&self, _id: &str) -> Result<Option<ComponentTarget>, ResolveError> {
        Ok(None)
    }
}

/// Evaluation inside a known row location, with a fixed set of components.
#[derive(Debug, Clone, Default)]
pub struct LocationScope {
    pub location: Option<DataModelRef>,
    pub page: Option<String>,
    pub components: Vec<ComponentTarget>,
}

impl LocationScope {
    pub fn new(location: Option<DataModelRef>) -> Self {
        Self {
            location,
            ..Default::default()
        }
    }

    pub fn with_page(mut self, page: impl Into<String>) -> Self {
        self.page = Some(page.into());
        self
    }

    pub fn with_component(mut self, target: ComponentTarget) -> Self {
        self.components.push(target);
        self
    }
}

impl NodeScope for LocationScope {
    fn location(&self) -> Option<&DataModelRef> {
        self.location.as_ref()
    }

    fn page(&self) -> Option<&str> {
        self.page.as_deref()
    }

    fn find_component(&self, id: &str) -> Result<Option<ComponentTarget>, ResolveError> {
        Ok(self.components.iter().find(|c| c.id == id).cloned())
    }
}
