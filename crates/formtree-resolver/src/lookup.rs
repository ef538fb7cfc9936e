//! Path lookups in JSON documents.

use serde_json::Value;

use formtree_core::DataPath;
use formtree_parser::parse_data_path;

/// Follow `path` into `root`.
///
/// Segment names index objects; a numeric name also indexes arrays, so both
/// `Group[1].Field` and `Group.1.Field` work.
pub fn lookup_path<'a>(root: &'a Value, path: &DataPath) -> Option<&'a Value> {
    let mut current = root;
    for segment in &path.segments {
        current = match current {
            Value::Object(map) => map.get(&segment.name)?,
            Value::Array(items) => items.get(segment.name.parse::<usize>().ok()?)?,
            _ => return None,
        };
        if let Some(index) = segment.index {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Follow a dotted path string into `root`. Invalid paths find nothing.
pub fn lookup_dotted<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let path = parse_data_path(path).ok()?;
    lookup_path(root, &path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_nested() {
        let data = json!({
            "Group": [
                { "Name": "first", "Nested": [{ "Value": 1 }] },
                { "Name": "second", "Nested": [{ "Value": 2 }, { "Value": 3 }] }
            ]
        });
        let path = parse_data_path("Group[1].Nested[1].Value").unwrap();
        assert_eq!(lookup_path(&data, &path), Some(&json!(3)));
        assert_eq!(lookup_dotted(&data, "Group.0.Name"), Some(&json!("first")));
        assert_eq!(lookup_dotted(&data, "Group[5].Name"), None);
        assert_eq!(lookup_dotted(&data, "Group[0].Name.Deeper"), None);
    }

    #[test]
    fn test_lookup_without_index_returns_array() {
        let data = json!({ "rows": [1, 2] });
        assert_eq!(lookup_dotted(&data, "rows"), Some(&json!([1, 2])));
        assert_eq!(lookup_dotted(&data, "not a path"), None);
    }
}
