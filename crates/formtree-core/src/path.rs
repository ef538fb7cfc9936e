//! Data-model paths and references.
//!
//! A path like `Model.Group[1].Nested[0].Field` addresses a value inside a form
//! data document. Paths without indices are relative to whatever repeating
//! group row they are evaluated in, see [`DataPath::transpose`].

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// One dotted segment of a data path, with an optional row index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    pub name: String,
    pub index: Option<usize>,
}

impl PathSegment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    pub fn indexed(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }
}

/// A dotted data-model path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DataPath {
    pub segments: SmallVec<[PathSegment; 4]>,
}

impl DataPath {
    pub fn new(segments: impl IntoIterator<Item = PathSegment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Append a segment.
    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// Join another path onto this one.
    pub fn join(&self, other: &DataPath) -> DataPath {
        let mut joined = self.clone();
        joined.segments.extend(other.segments.iter().cloned());
        joined
    }

    /// Copy of this path with the last segment pointing at the given row.
    pub fn with_last_index(&self, index: usize) -> DataPath {
        let mut out = self.clone();
        if let Some(last) = out.segments.last_mut() {
            last.index = Some(index);
        }
        out
    }

    /// Copy of this path with every row index removed.
    pub fn without_indices(&self) -> DataPath {
        DataPath::new(self.segments.iter().map(|s| PathSegment::new(s.name.clone())))
    }

    /// Whether any segment carries a row index.
    pub fn has_indices(&self) -> bool {
        self.segments.iter().any(|s| s.index.is_some())
    }

    /// Rewrite this path so it points into the same repeating group rows as `location`.
    ///
    /// Segments are compared from the start. While the names match, a row index from
    /// `location` is copied into the subject. Transposition stops at the first name
    /// mismatch, or at the first subject segment that already has an index of its own.
    pub fn transpose(&self, location: &DataPath) -> DataPath {
        let mut out = self.clone();
        for (ours, theirs) in location.segments.iter().zip(out.segments.iter_mut()) {
            if ours.name != theirs.name {
                break;
            }
            let Some(index) = ours.index else {
                continue;
            };
            if theirs.index.is_some() {
                break;
            }
            theirs.index = Some(index);
        }
        out
    }
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(&segment.name)?;
            if let Some(index) = segment.index {
                write!(f, "[{}]", index)?;
            }
        }
        Ok(())
    }
}

/// A reference into a specific data model.
///
/// A missing data type means the default data type of the layout set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModelRef {
    pub data_type: Option<String>,
    pub field: DataPath,
}

impl DataModelRef {
    pub fn new(data_type: Option<String>, field: DataPath) -> Self {
        Self { data_type, field }
    }

    /// Fill in the data type when none was given.
    pub fn with_default_type(&self, default: Option<&str>) -> DataModelRef {
        DataModelRef {
            data_type: self.data_type.clone().or_else(|| default.map(str::to_string)),
            field: self.field.clone(),
        }
    }

    /// Transpose into `location` when both refer to the same data model.
    pub fn transpose(&self, location: &DataModelRef) -> DataModelRef {
        if self.data_type != location.data_type {
            return self.clone();
        }
        DataModelRef {
            data_type: self.data_type.clone(),
            field: self.field.transpose(&location.field),
        }
    }
}

impl fmt::Display for DataModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data_type {
            Some(data_type) => write!(f, "{}:{}", data_type, self.field),
            None => write!(f, "{}", self.field),
        }
    }
}
