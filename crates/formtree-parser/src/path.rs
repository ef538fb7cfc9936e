//! Data-model path grammar.
//!
//! ```text
//! path    := segment ("." segment)*
//! segment := name ("[" digits "]")?
//! name    := any characters except '.', '[', ']' and whitespace
//! ```

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt},
    multi::separated_list1,
    sequence::{delimited, pair},
    IResult,
};
use serde_json::Value;

use formtree_core::{DataModelRef, DataPath, ParseError, PathSegment};

fn segment_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c != '.' && c != '[' && c != ']' && !c.is_whitespace())(input)
}

fn row_index(input: &str) -> IResult<&str, usize> {
    delimited(
        char('['),
        map_res(digit1, |digits: &str| digits.parse::<usize>()),
        char(']'),
    )(input)
}

fn segment(input: &str) -> IResult<&str, PathSegment> {
    map(pair(segment_name, opt(row_index)), |(name, index)| PathSegment {
        name: name.to_string(),
        index,
    })(input)
}

fn segments(input: &str) -> IResult<&str, Vec<PathSegment>> {
    separated_list1(char('.'), segment)(input)
}

/// Parse a dotted data-model path such as `Model.Group[1].Field`.
pub fn parse_data_path(input: &str) -> Result<DataPath, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::InvalidPath {
            path: input.to_string(),
            reason: "path is empty".to_string(),
        });
    }

    match all_consuming(segments)(trimmed) {
        Ok((_, parsed)) => Ok(DataPath::new(parsed)),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ParseError::InvalidPath {
            path: input.to_string(),
            reason: format!("unexpected input at '{}'", e.input),
        }),
        Err(nom::Err::Incomplete(_)) => Err(ParseError::InvalidPath {
            path: input.to_string(),
            reason: "incomplete path".to_string(),
        }),
    }
}

/// Parse a data model binding: either a path string or `{"dataType": .., "field": ..}`.
pub fn parse_data_model_ref(value: &Value) -> Result<DataModelRef, ParseError> {
    match value {
        Value::String(path) => Ok(DataModelRef::new(None, parse_data_path(path)?)),
        Value::Object(map) => {
            let field = map
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| ParseError::InvalidPath {
                    path: value.to_string(),
                    reason: "binding object needs a string 'field'".to_string(),
                })?;
            let data_type = match map.get("dataType") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => {
                    return Err(ParseError::InvalidPath {
                        path: value.to_string(),
                        reason: format!("'dataType' must be a string, got {}", other),
                    })
                }
            };
            Ok(DataModelRef::new(data_type, parse_data_path(field)?))
        }
        other => Err(ParseError::InvalidPath {
            path: other.to_string(),
            reason: "binding must be a string or an object".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_simple_path() {
        let path = parse_data_path("Model.Person.Name").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.segments[1].name, "Person");
        assert!(!path.has_indices());
    }

    #[test]
    fn test_parse_indexed_path() {
        let path = parse_data_path("Group[1].Nested[12].Field").unwrap();
        assert_eq!(path.segments[0].index, Some(1));
        assert_eq!(path.segments[1].index, Some(12));
        assert_eq!(path.segments[2].index, None);
        assert_eq!(path.to_string(), "Group[1].Nested[12].Field");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(parse_data_path("  count ").unwrap().to_string(), "count");
    }

    #[test]
    fn test_invalid_paths() {
        for input in ["", "a..b", "a[", "a[x]", "a]", ".a", "a.", "a b"] {
            assert!(
                matches!(parse_data_path(input), Err(ParseError::InvalidPath { .. })),
                "expected {:?} to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_parse_binding_forms() {
        let simple = parse_data_model_ref(&json!("Group.Field")).unwrap();
        assert_eq!(simple.data_type, None);
        assert_eq!(simple.field.to_string(), "Group.Field");

        let typed = parse_data_model_ref(&json!({"dataType": "model", "field": "a.b"})).unwrap();
        assert_eq!(typed.data_type.as_deref(), Some("model"));

        assert!(parse_data_model_ref(&json!(3)).is_err());
        assert!(parse_data_model_ref(&json!({"dataType": "model"})).is_err());
    }
}
