//! Expression JSON parsing and static validation.
//!
//! An expression is either a JSON literal or an array `[functionName, ...args]`.
//! Structural problems (objects, empty arrays, unknown function names, excessive
//! nesting) stop parsing. Signature problems (argument counts, the `if`/`else`
//! shape, a computed `dataModel` data type) are collected as [`ExprIssue`]s so a
//! validator can report all of them at once.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use formtree_core::{
    Call, ExprValue, Expression, Function, ParseError, MAX_EXPRESSION_DEPTH,
};

/// Location of the root of an expression in issue and error messages.
const ROOT: &str = "$";

/// A validation problem found in an otherwise well-formed expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExprIssue {
    /// JSON path of the offending value, e.g. `$[1][0]`.
    pub location: String,
    pub message: String,
}

/// Parse and validate an expression. The first validation issue becomes the error.
pub fn parse_expression(value: &Value) -> Result<Expression, ParseError> {
    let mut parser = ExprParser::default();
    let expr = parser.parse(value, ROOT, 0)?;
    match parser.issues.into_iter().next() {
        Some(issue) => Err(ParseError::InvalidExpression {
            location: issue.location,
            reason: issue.message,
        }),
        None => Ok(expr),
    }
}

/// Parse an expression from its JSON text.
pub fn parse_expression_str(source: &str) -> Result<Expression, ParseError> {
    let value: Value = serde_json::from_str(source)?;
    parse_expression(&value)
}

/// Collect every validation problem in an expression.
pub fn validate_expression(value: &Value) -> Vec<ExprIssue> {
    let mut parser = ExprParser::default();
    match parser.parse(value, ROOT, 0) {
        Ok(_) => parser.issues,
        Err(err) => {
            let location = match &err {
                ParseError::UnknownFunction { location, .. }
                | ParseError::InvalidExpression { location, .. } => location.clone(),
                _ => ROOT.to_string(),
            };
            parser.issues.push(ExprIssue {
                location,
                message: err.to_string(),
            });
            parser.issues
        }
    }
}

#[derive(Default)]
struct ExprParser {
    issues: Vec<ExprIssue>,
}

impl ExprParser {
    fn issue(&mut self, location: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ExprIssue {
            location: location.into(),
            message: message.into(),
        });
    }

    fn parse(&mut self, value: &Value, location: &str, depth: usize) -> Result<Expression, ParseError> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(ParseError::MaxDepthExceeded {
                depth: MAX_EXPRESSION_DEPTH,
            });
        }

        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {
                Ok(Expression::Literal(ExprValue::from_json(value)))
            }
            Value::Object(_) => Err(ParseError::InvalidExpression {
                location: location.to_string(),
                reason: "objects are not valid expressions".to_string(),
            }),
            Value::Array(items) => self.parse_call(items, location, depth),
        }
    }

    fn parse_call(&mut self, items: &[Value], location: &str, depth: usize) -> Result<Expression, ParseError> {
        let Some((head, rest)) = items.split_first() else {
            return Err(ParseError::InvalidExpression {
                location: location.to_string(),
                reason: "missing function name in expression".to_string(),
            });
        };

        let name = head.as_str().ok_or_else(|| ParseError::InvalidExpression {
            location: format!("{}[0]", location),
            reason: format!("function name must be a string, got {}", head),
        })?;

        let function = Function::from_name(name).ok_or_else(|| ParseError::UnknownFunction {
            name: name.to_string(),
            location: format!("{}[0]", location),
        })?;

        let args = rest
            .iter()
            .enumerate()
            .map(|(i, arg)| self.parse(arg, &format!("{}[{}]", location, i + 1), depth + 1))
            .collect::<Result<Vec<_>, _>>()?;

        self.check_signature(function, &args, location);

        Ok(Expression::Call(Call { function, args }))
    }

    fn check_signature(&mut self, function: Function, args: &[Expression], location: &str) {
        match function {
            Function::If => self.check_if(args, location),
            _ => self.check_arity(function, args.len(), location),
        }

        if function == Function::DataModel {
            if let Some(data_type) = args.get(1) {
                let is_literal_string = matches!(
                    data_type,
                    Expression::Literal(ExprValue::String(_)) | Expression::Literal(ExprValue::Null)
                );
                if !is_literal_string {
                    self.issue(
                        format!("{}[2]", location),
                        "The data type must be a string (expressions cannot be used here)",
                    );
                }
            }
        }
    }

    fn check_arity(&mut self, function: Function, got: usize, location: &str) {
        let signature = function.signature();
        let min = signature.min_args();
        let max = signature.max_args();

        let ok = got >= min && max.map_or(true, |max| got <= max);
        if ok {
            return;
        }

        let expected = match max {
            Some(max) if max == min => format!("exactly {}", min),
            Some(max) => format!("{} to {}", min, max),
            None => format!("at least {}", min),
        };
        self.issue(
            location,
            format!("Expected {} argument(s) for {}, got {}", expected, function, got),
        );
    }

    fn check_if(&mut self, args: &[Expression], location: &str) {
        if args.len() == 2 {
            return;
        }
        if args.len() > 2 && args[2] != Expression::literal("else") {
            self.issue(format!("{}[3]", location), "Expected third argument to be \"else\"");
        }
        if args.len() == 4 {
            return;
        }
        self.issue(
            location,
            format!(
                "Expected either 2 arguments (if) or 4 (if + else), got {}",
                args.len()
            ),
        );
    }
}
