//! Layout JSON parsing.
//!
//! Turns page files and layout-set bundles into [`PageLayout`] and [`LayoutSet`].
//! Known component keys are lifted into typed fields; everything else is kept
//! verbatim in [`ComponentDef::properties`].
//!
//! A malformed expression does not reject its component: it is logged, recorded
//! in `invalid_expressions`, and the property keeps its default.

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use formtree_core::{
    ChildRef, ComponentDef, ComponentOption, Expression, InvalidExpression, LayoutSet, PageLayout, ParseError,
};

use crate::expression::parse_expression;
use crate::path::parse_data_model_ref;

fn invalid(id: &str, reason: impl Into<String>) -> ParseError {
    ParseError::InvalidComponent {
        id: id.to_string(),
        reason: reason.into(),
    }
}

/// Parse a single component definition.
pub fn parse_component(value: &Value) -> Result<ComponentDef, ParseError> {
    let obj = value.as_object().ok_or_else(|| ParseError::InvalidLayout {
        reason: format!("component must be an object, got {}", value),
    })?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ParseError::InvalidLayout {
            reason: "component is missing a string 'id'".to_string(),
        })?;

    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(id, "missing a string 'type'"))?;

    let mut def = ComponentDef::new(id, kind);

    for (key, value) in obj {
        match key.as_str() {
            "id" | "type" => {}
            "dataModelBindings" => {
                for (name, binding) in expect_object(id, key, value)? {
                    let binding = parse_data_model_ref(binding)
                        .map_err(|e| invalid(id, format!("binding '{}': {}", name, e)))?;
                    def.data_model_bindings.insert(name.clone(), binding);
                }
            }
            "textResourceBindings" => {
                for (name, text) in expect_object(id, key, value)? {
                    let property = format!("{}.{}", key, name);
                    if let Some(expr) = parse_property(id, &property, text, &mut def.invalid_expressions) {
                        def.text_resource_bindings.insert(name.clone(), expr);
                    }
                }
            }
            "children" => def.children = parse_children(id, value)?,
            "maxCount" => {
                let max = value
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| invalid(id, format!("'maxCount' must be a non-negative integer, got {}", value)))?;
                def.max_count = Some(max);
            }
            "hidden" => def.hidden = parse_property(id, key, value, &mut def.invalid_expressions),
            "required" => def.required = parse_property(id, key, value, &mut def.invalid_expressions),
            "readOnly" => def.read_only = parse_property(id, key, value, &mut def.invalid_expressions),
            "hiddenRow" => def.hidden_row = parse_property(id, key, value, &mut def.invalid_expressions),
            "options" => def.options = parse_options(id, value)?,
            "mapping" => {
                for (path, param) in expect_object(id, key, value)? {
                    let param = param
                        .as_str()
                        .ok_or_else(|| invalid(id, format!("mapping '{}' must be a string", path)))?;
                    def.mapping.insert(path.clone(), param.to_string());
                }
            }
            _ => {
                def.properties.insert(key.clone(), value.clone());
            }
        }
    }

    Ok(def)
}

fn expect_object<'a>(id: &str, key: &str, value: &'a Value) -> Result<&'a Map<String, Value>, ParseError> {
    value
        .as_object()
        .ok_or_else(|| invalid(id, format!("'{}' must be an object", key)))
}

fn parse_property(
    owner: &str,
    property: &str,
    value: &Value,
    invalid: &mut Vec<InvalidExpression>,
) -> Option<Expression> {
    if value.is_null() {
        return None;
    }
    match parse_expression(value) {
        Ok(expr) => Some(expr),
        Err(err) => {
            warn!(owner, property, error = %err, "invalid expression, using default value");
            invalid.push(InvalidExpression {
                property: property.to_string(),
                error: err.to_string(),
            });
            None
        }
    }
}

/// Children are plain ids, or `"N:id"` inside multi-page groups.
fn parse_children(id: &str, value: &Value) -> Result<Vec<ChildRef>, ParseError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(id, "'children' must be an array"))?;

    items
        .iter()
        .map(|item| {
            let child = item
                .as_str()
                .ok_or_else(|| invalid(id, format!("child reference must be a string, got {}", item)))?;
            Ok(match child.split_once(':') {
                Some((page, rest)) if !page.is_empty() && page.bytes().all(|b| b.is_ascii_digit()) => ChildRef {
                    id: rest.to_string(),
                    multi_page_index: page.parse().ok(),
                },
                _ => ChildRef::new(child),
            })
        })
        .collect()
}

fn parse_options(id: &str, value: &Value) -> Result<Vec<ComponentOption>, ParseError> {
    let items = value
        .as_array()
        .ok_or_else(|| invalid(id, "'options' must be an array"))?;

    items
        .iter()
        .map(|item| {
            let value = match item.get("value") {
                Some(Value::String(s)) => s.clone(),
                Some(v @ (Value::Number(_) | Value::Bool(_))) => v.to_string(),
                _ => return Err(invalid(id, format!("option is missing a value: {}", item))),
            };
            let label = item
                .get("label")
                .and_then(Value::as_str)
                .unwrap_or(value.as_str())
                .to_string();
            Ok(ComponentOption { value, label })
        })
        .collect()
}

/// Parse a page, either the file shape `{"data": {"layout": [...], "hidden": ..}}` or a bare array.
pub fn parse_page(value: &Value) -> Result<PageLayout, ParseError> {
    let (layout, hidden) = match value {
        Value::Array(_) => (value, None),
        Value::Object(obj) => {
            let data = obj.get("data").unwrap_or(value);
            let layout = data.get("layout").ok_or_else(|| ParseError::InvalidLayout {
                reason: "page is missing 'data.layout'".to_string(),
            })?;
            (layout, data.get("hidden"))
        }
        other => {
            return Err(ParseError::InvalidLayout {
                reason: format!("page must be an object or an array, got {}", other),
            })
        }
    };

    let components = layout
        .as_array()
        .ok_or_else(|| ParseError::InvalidLayout {
            reason: "'layout' must be an array".to_string(),
        })?
        .iter()
        .map(parse_component)
        .collect::<Result<Vec<_>, _>>()?;

    let mut page = PageLayout::new(components);
    if let Some(expr) = hidden {
        page.hidden = parse_property("page", "hidden", expr, &mut page.invalid_expressions);
    }
    Ok(page)
}

/// Parse a page from its JSON text.
pub fn parse_page_str(source: &str) -> Result<PageLayout, ParseError> {
    let value: Value = serde_json::from_str(source)?;
    parse_page(&value)
}

/// Parse a layout-set bundle:
///
/// ```json
/// {
///   "id": "form",
///   "dataType": "model",
///   "pages": { "page1": { "data": { "layout": [] } } },
///   "order": ["page1"]
/// }
/// ```
///
/// The order may also be given as `settings.pages.order`, the shape of a
/// `Settings.json` file.
pub fn parse_layout_set(value: &Value) -> Result<LayoutSet, ParseError> {
    let obj = value.as_object().ok_or_else(|| ParseError::InvalidLayout {
        reason: "layout set must be an object".to_string(),
    })?;

    let id = obj.get("id").and_then(Value::as_str).unwrap_or("default");
    let mut set = LayoutSet::new(id);
    set.data_type = obj.get("dataType").and_then(Value::as_str).map(str::to_string);

    let pages = obj
        .get("pages")
        .and_then(Value::as_object)
        .ok_or_else(|| ParseError::InvalidLayout {
            reason: "layout set is missing a 'pages' object".to_string(),
        })?;

    let mut parsed = IndexMap::with_capacity(pages.len());
    for (name, page) in pages {
        let page = parse_page(page).map_err(|e| ParseError::InvalidLayout {
            reason: format!("page {}: {}", name, e),
        })?;
        parsed.insert(name.clone(), page);
    }
    set.pages = parsed;

    let order = obj
        .get("order")
        .or_else(|| obj.get("settings").and_then(|s| s.pointer("/pages/order")));
    if let Some(order) = order {
        set.order = order
            .as_array()
            .ok_or_else(|| ParseError::InvalidLayout {
                reason: "page order must be an array".to_string(),
            })?
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }

    debug!(layout_set = %set.id, pages = set.pages.len(), "parsed layout set");
    Ok(set)
}
