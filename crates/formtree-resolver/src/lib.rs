//! Data-source resolution for formtree.
//!
//! This crate resolves:
//! - Data-model references against form data (with default data types)
//! - Context lookups (instance, auth, settings, roles, text resources, external APIs)
//! - Component references, through the [`NodeScope`] seam implemented by the node tree

mod lookup;
mod scope;
mod sources;

pub use lookup::{lookup_dotted, lookup_path};
pub use scope::{ComponentTarget, LocationScope, NoScope, NodeScope};
pub use sources::{AuthContext, DataSources, InstanceContext};
