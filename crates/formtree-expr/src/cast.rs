//! Casting values to the types function signatures expect.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use nom::{
    character::complete::{char, digit1},
    combinator::{all_consuming, opt, recognize},
    sequence::{pair, tuple},
    IResult,
};

use formtree_core::{ExprError, ExprValue, ValueType};

fn cast_error(expected: ValueType, value: &ExprValue, location: &str) -> ExprError {
    ExprError::Cast {
        expected,
        value: value.to_string(),
        location: location.to_string(),
    }
}

/// `-?digits(.digits)?`
fn numeric(input: &str) -> IResult<&str, &str> {
    recognize(tuple((opt(char('-')), digit1, opt(pair(char('.'), digit1)))))(input)
}

fn is_numeric(input: &str) -> bool {
    all_consuming(numeric)(input).is_ok()
}

/// Cast `value` to `ty`. Null stays null for every type.
pub fn cast(value: ExprValue, ty: ValueType, location: &str) -> Result<ExprValue, ExprError> {
    match ty {
        ValueType::Any => Ok(value),
        ValueType::Boolean => to_boolean(value, location),
        ValueType::Number => to_number(value, location),
        ValueType::String => Ok(value.to_text().map(ExprValue::String).unwrap_or_default()),
        ValueType::Date => {
            parse_date(&value, location)?;
            Ok(value)
        }
    }
}

fn to_boolean(value: ExprValue, location: &str) -> Result<ExprValue, ExprError> {
    match &value {
        ExprValue::Null | ExprValue::Bool(_) => Ok(value),
        ExprValue::Number(n) if *n == 1.0 => Ok(ExprValue::Bool(true)),
        ExprValue::Number(n) if *n == 0.0 => Ok(ExprValue::Bool(false)),
        ExprValue::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(ExprValue::Bool(true)),
            "false" | "0" => Ok(ExprValue::Bool(false)),
            "null" => Ok(ExprValue::Null),
            _ => Err(cast_error(ValueType::Boolean, &value, location)),
        },
        ExprValue::Number(_) => Err(cast_error(ValueType::Boolean, &value, location)),
    }
}

fn to_number(value: ExprValue, location: &str) -> Result<ExprValue, ExprError> {
    match &value {
        ExprValue::Null | ExprValue::Number(_) => Ok(value),
        ExprValue::String(s) if s.is_empty() || s == "null" => Ok(ExprValue::Null),
        ExprValue::String(s) if is_numeric(s) => s
            .parse::<f64>()
            .map(ExprValue::Number)
            .map_err(|_| cast_error(ValueType::Number, &value, location)),
        _ => Err(cast_error(ValueType::Number, &value, location)),
    }
}

/// Parse an ISO date or date-time. Null parses to `None`.
///
/// A date-time with an offset keeps its wall-clock time in that offset.
pub fn parse_date(value: &ExprValue, location: &str) -> Result<Option<NaiveDateTime>, ExprError> {
    let text = match value {
        ExprValue::Null => return Ok(None),
        ExprValue::String(s) => s.trim(),
        _ => return Err(cast_error(ValueType::Date, value, location)),
    };

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date.and_hms_opt(0, 0, 0));
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(date_time.naive_local()));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(Some(date_time));
        }
    }
    Err(cast_error(ValueType::Date, value, location))
}
