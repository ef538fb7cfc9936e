//! Expression values.

use std::fmt;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A primitive value produced or consumed by an expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExprValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// The value types that appear in function signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueType {
    Any,
    Boolean,
    Number,
    String,
    Date,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Any => "any",
            ValueType::Boolean => "boolean",
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Date => "date",
        };
        f.write_str(name)
    }
}

impl ExprValue {
    /// Convert a JSON value. Objects and arrays are not expression values and become null.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ExprValue::Null,
            Value::Bool(b) => ExprValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(ExprValue::Number).unwrap_or(ExprValue::Null),
            Value::String(s) => ExprValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => ExprValue::Null,
        }
    }

    /// Convert to a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            ExprValue::Null => Value::Null,
            ExprValue::Bool(b) => Value::Bool(*b),
            ExprValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            ExprValue::String(s) => Value::String(s.clone()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ExprValue::Null)
    }

    /// Name of the JSON type this value represents.
    pub fn type_name(&self) -> &'static str {
        match self {
            ExprValue::Null => "null",
            ExprValue::Bool(_) => "boolean",
            ExprValue::Number(_) => "number",
            ExprValue::String(_) => "string",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ExprValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ExprValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExprValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// String form used when the value is placed into text.
    ///
    /// Null has no text form.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ExprValue::Null => None,
            ExprValue::Bool(b) => Some(b.to_string()),
            ExprValue::Number(n) => Some(format_number(*n)),
            ExprValue::String(s) => Some(s.clone()),
        }
    }

    /// String form used by `equals` and `notEquals`.
    ///
    /// `"true"` and `"false"` in any casing compare equal to the booleans, and
    /// `"null"` compares equal to null.
    pub fn to_string_for_equals(&self) -> Option<String> {
        match self {
            ExprValue::Null => None,
            ExprValue::Bool(b) => Some(b.to_string()),
            ExprValue::Number(n) => Some(format_number(*n)),
            ExprValue::String(s) if s.eq_ignore_ascii_case("true") => Some("true".to_string()),
            ExprValue::String(s) if s.eq_ignore_ascii_case("false") => Some("false".to_string()),
            ExprValue::String(s) if s.eq_ignore_ascii_case("null") => None,
            ExprValue::String(s) => Some(s.clone()),
        }
    }
}

/// Render a number the way JavaScript's `Number.prototype.toString` does.
///
/// Shortest round-trip digits, positional between `1e-7` and `1e21`,
/// exponent form (`1e+21`, `1.5e-7`) outside that range.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    // `{:e}` yields the shortest digits as `d.ddde<exp>`
    let sci = format!("{:e}", n.abs());
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let point = exp + 1;

    let mut out = String::with_capacity(digits.len() + 8);
    if n < 0.0 {
        out.push('-');
    }
    if k <= point && point <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((point - k) as usize));
    } else if 0 < point && point <= 21 {
        out.push_str(&digits[..point as usize]);
        out.push('.');
        out.push_str(&digits[point as usize..]);
    } else if -6 < point && point <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-point) as usize));
        out.push_str(&digits);
    } else {
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        let _ = write!(out, "e{}{}", if exp < 0 { '-' } else { '+' }, exp.abs());
    }
    out
}

impl fmt::Display for ExprValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprValue::Null => f.write_str("null"),
            ExprValue::Bool(b) => write!(f, "{}", b),
            ExprValue::Number(n) => f.write_str(&format_number(*n)),
            ExprValue::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for ExprValue {
    fn from(value: bool) -> Self {
        ExprValue::Bool(value)
    }
}

impl From<f64> for ExprValue {
    fn from(value: f64) -> Self {
        ExprValue::Number(value)
    }
}

impl From<&str> for ExprValue {
    fn from(value: &str) -> Self {
        ExprValue::String(value.to_string())
    }
}

impl From<String> for ExprValue {
    fn from(value: String) -> Self {
        ExprValue::String(value)
    }
}

impl<T: Into<ExprValue>> From<Option<T>> for ExprValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(ExprValue::Null)
    }
}

impl Serialize for ExprValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExprValue {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(ExprValue::from_json(&value))
    }
}
