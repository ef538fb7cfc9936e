//! Row cardinality for repeating groups.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use formtree_core::DataModelRef;
use formtree_resolver::DataSources;

/// Field holding a row's stable id in form data.
pub const DEFAULT_ROW_ID_FIELD: &str = "altinnRowId";

/// One row of a repeating group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowInfo {
    pub index: usize,
    pub row_id: Option<String>,
}

impl RowInfo {
    pub fn new(index: usize) -> Self {
        Self { index, row_id: None }
    }
}

/// Supplies the rows of each repeating group while building.
pub trait RowProvider {
    /// Rows of the group with realized id `group_id`, whose `group` binding
    /// has been transposed into the enclosing rows.
    fn rows(&self, group_id: &str, binding: Option<&DataModelRef>) -> Vec<RowInfo>;
}

/// Fixed row counts keyed by realized group id. Unlisted groups have no rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCounts {
    pub counts: HashMap<String, usize>,
}

impl RowCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_count(mut self, group_id: impl Into<String>, count: usize) -> Self {
        self.counts.insert(group_id.into(), count);
        self
    }
}

impl RowProvider for RowCounts {
    fn rows(&self, group_id: &str, _binding: Option<&DataModelRef>) -> Vec<RowInfo> {
        let count = self.counts.get(group_id).copied().unwrap_or(0);
        (0..count).map(RowInfo::new).collect()
    }
}

/// Rows read from form data: one per element of the array at the group binding.
#[derive(Debug, Clone)]
pub struct FormDataRows<'a> {
    sources: &'a DataSources,
    row_id_field: String,
}

impl<'a> FormDataRows<'a> {
    pub fn new(sources: &'a DataSources) -> Self {
        Self {
            sources,
            row_id_field: DEFAULT_ROW_ID_FIELD.to_string(),
        }
    }

    pub fn with_row_id_field(mut self, field: impl Into<String>) -> Self {
        self.row_id_field = field.into();
        self
    }
}

impl RowProvider for FormDataRows<'_> {
    fn rows(&self, group_id: &str, binding: Option<&DataModelRef>) -> Vec<RowInfo> {
        let Some(binding) = binding else {
            return Vec::new();
        };
        let rows = match self.sources.rows(binding) {
            Ok(rows) => rows.unwrap_or_default(),
            Err(err) => {
                warn!(group = group_id, binding = %binding, error = %err, "cannot read group rows");
                return Vec::new();
            }
        };
        rows.iter()
            .enumerate()
            .map(|(index, row)| RowInfo {
                index,
                row_id: row
                    .get(&self.row_id_field)
                    .and_then(|id| id.as_str())
                    .filter(|id| !id.is_empty())
                    .map(str::to_string),
            })
            .collect()
    }
}
