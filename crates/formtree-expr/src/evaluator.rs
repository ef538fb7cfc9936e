//! The expression evaluator.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::warn;

use formtree_core::{ExprError, ExprValue, Expression, Function, ValueType};
use formtree_parser::parse_expression;
use formtree_resolver::{DataSources, NoScope, NodeScope};

use crate::cast::cast;
use crate::functions;
use crate::options::EvalOptions;

/// Location of the root expression in error messages.
const ROOT: &str = "$";

/// Named values readable through the `value` function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueArguments {
    pub data: IndexMap<String, ExprValue>,
    /// Key used by `["value"]` without an argument.
    pub default_key: Option<String>,
}

impl ValueArguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<ExprValue>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_default_key(mut self, key: impl Into<String>) -> Self {
        self.default_key = Some(key.into());
        self
    }
}

/// Evaluates expressions against data sources, within an optional node scope.
///
/// Arguments are evaluated eagerly and cast to the types in the function's
/// signature before the function runs.
pub struct Evaluator<'a> {
    pub(crate) sources: &'a DataSources,
    pub(crate) scope: &'a dyn NodeScope,
    pub(crate) positional: &'a [ExprValue],
    pub(crate) value_args: Option<&'a ValueArguments>,
    options: EvalOptions,
}

impl<'a> Evaluator<'a> {
    pub fn new(sources: &'a DataSources) -> Self {
        Self {
            sources,
            scope: &NoScope,
            positional: &[],
            value_args: None,
            options: EvalOptions::default(),
        }
    }

    /// Evaluate in the context of a node.
    pub fn with_scope(mut self, scope: &'a dyn NodeScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Values readable through `argv`.
    pub fn with_positional_args(mut self, args: &'a [ExprValue]) -> Self {
        self.positional = args;
        self
    }

    /// Values readable through `value`.
    pub fn with_value_args(mut self, args: &'a ValueArguments) -> Self {
        self.value_args = Some(args);
        self
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    /// Evaluate an expression.
    pub fn evaluate(&self, expr: &Expression) -> Result<ExprValue, ExprError> {
        self.eval(expr, ROOT, 0)
    }

    /// Evaluate and cast the result to `ty`.
    pub fn evaluate_as(&self, expr: &Expression, ty: ValueType) -> Result<ExprValue, ExprError> {
        let value = self.evaluate(expr)?;
        cast(value, ty, ROOT)
    }

    /// Evaluate, cast to `ty`, and fall back to `default` on error or null.
    ///
    /// Errors are logged as warnings.
    pub fn evaluate_or(&self, expr: &Expression, ty: ValueType, default: ExprValue) -> ExprValue {
        match self.evaluate_as(expr, ty) {
            Ok(ExprValue::Null) => default,
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, expression = %expr, "expression failed, using default value");
                default
            }
        }
    }

    /// Parse and evaluate expression JSON.
    pub fn evaluate_json(&self, value: &Value) -> Result<ExprValue, ExprError> {
        let expr = parse_expression(value)?;
        self.evaluate(&expr)
    }

    fn eval(&self, expr: &Expression, location: &str, depth: usize) -> Result<ExprValue, ExprError> {
        if depth > self.options.max_depth {
            return Err(ExprError::MaxDepthExceeded {
                depth: self.options.max_depth,
            });
        }

        let call = match expr {
            Expression::Literal(value) => return Ok(value.clone()),
            Expression::Call(call) => call,
        };

        check_arity(call.function, call.args.len(), location)?;

        let signature = call.function.signature();
        let args = call
            .args
            .iter()
            .enumerate()
            .map(|(i, arg)| {
                let arg_location = format!("{}[{}]", location, i + 1);
                let value = self.eval(arg, &arg_location, depth + 1)?;
                cast(value, signature.arg_type(i), &arg_location)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let result = functions::call(self, call.function, args, location)?;
        cast(result, signature.returns, location)
    }
}

fn check_arity(function: Function, got: usize, location: &str) -> Result<(), ExprError> {
    let signature = function.signature();
    let (ok, expected) = match function {
        Function::If => (got == 2 || got == 4, "2 or 4".to_string()),
        _ => {
            let min = signature.min_args();
            match signature.max_args() {
                Some(max) => (
                    got >= min && got <= max,
                    if min == max { min.to_string() } else { format!("{} to {}", min, max) },
                ),
                None => (got >= min, format!("at least {}", min)),
            }
        }
    };

    if ok {
        return Ok(());
    }
    Err(ExprError::Arity {
        function: function.name(),
        expected,
        got,
        location: location.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use formtree_core::{ComponentOption, DataModelRef};
    use formtree_parser::{parse_data_model_ref, parse_expression_str};
    use formtree_resolver::{ComponentTarget, InstanceContext, LocationScope};
    use serde_json::json;

    fn eval_with(sources: &DataSources, source: &str) -> Result<ExprValue, ExprError> {
        let expr = parse_expression_str(source).unwrap();
        Evaluator::new(sources).evaluate(&expr)
    }

    fn eval(source: &str) -> ExprValue {
        eval_with(&DataSources::new(), source).unwrap()
    }

    fn s(text: &str) -> ExprValue {
        ExprValue::String(text.to_string())
    }

    #[test]
    fn test_data_model_comparison() {
        let sources = DataSources::new().with_form_data("model", json!({ "count": 3 }));
        let result = eval_with(&sources, r#"["greaterThan", ["dataModel", "count"], 2]"#).unwrap();
        assert_eq!(result, ExprValue::Bool(true));
    }

    #[test]
    fn test_equality_uses_string_forms() {
        assert_eq!(eval(r#"["equals", 1, "1"]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["equals", true, "TRUE"]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["equals", null, "null"]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["notEquals", "a", "b"]"#), ExprValue::Bool(true));
    }

    #[test]
    fn test_comparisons_with_null_are_false() {
        assert_eq!(eval(r#"["lessThan", null, 2]"#), ExprValue::Bool(false));
        assert_eq!(eval(r#"["greaterThanEq", 2, null]"#), ExprValue::Bool(false));
        assert_eq!(eval(r#"["lessThanEq", "2", 2]"#), ExprValue::Bool(true));
    }

    #[test]
    fn test_logic_functions() {
        assert_eq!(eval(r#"["and", true, null]"#), ExprValue::Bool(false));
        assert_eq!(eval(r#"["or", false, null, "true"]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["not", null]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["if", true, "yes", "else", "no"]"#), s("yes"));
        assert_eq!(eval(r#"["if", false, "yes", "else", "no"]"#), s("no"));
        assert_eq!(eval(r#"["if", false, "yes"]"#), ExprValue::Null);
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval(r#"["concat", "a", null, 1, true]"#), s("a1true"));
        assert_eq!(eval(r#"["contains", "hello", "ell"]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["notContains", null, "x"]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["startsWith", "hello", "he"]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["endsWith", "hello", null]"#), ExprValue::Bool(false));
        assert_eq!(eval(r#"["stringLength", "æøå"]"#), ExprValue::Number(3.0));
        assert_eq!(eval(r#"["stringLength", null]"#), ExprValue::Number(0.0));
        assert_eq!(eval(r#"["commaContains", "a, b ,c", "b"]"#), ExprValue::Bool(true));
        assert_eq!(eval(r#"["lowerCase", "ABC"]"#), s("abc"));
        assert_eq!(eval(r#"["upperCase", null]"#), ExprValue::Null);
    }

    #[test]
    fn test_round() {
        assert_eq!(eval(r#"["round", 2.5]"#), s("3"));
        assert_eq!(eval(r#"["round", -2.5]"#), s("-3"));
        assert_eq!(eval(r#"["round", "3.14159", 2]"#), s("3.14"));
        assert_eq!(eval(r#"["round", 1, 2]"#), s("1.00"));
        assert_eq!(eval(r#"["round", null]"#), s("0"));
        assert!(eval_with(&DataSources::new(), r#"["round", 1, -1]"#).is_err());
    }

    #[test]
    fn test_format_date() {
        let sources = DataSources::new().with_language("en");
        assert_eq!(
            eval_with(&sources, r#"["formatDate", "2023-05-15T12:30:00", "d MMM yyyy HH:mm"]"#).unwrap(),
            s("15 May 2023 12:30")
        );
        assert_eq!(eval(r#"["formatDate", "2023-05-15"]"#), s("15.05.2023"));
        assert_eq!(eval(r#"["formatDate", null]"#), ExprValue::Null);
        assert!(eval_with(&sources, r#"["formatDate", "2023-05-15", "QQQ"]"#).is_err());
        assert!(matches!(
            eval_with(&sources, r#"["formatDate", "yesterday"]"#),
            Err(ExprError::Cast { expected: ValueType::Date, .. })
        ));
    }

    #[test]
    fn test_context_functions() {
        let sources = DataSources::new()
            .with_instance(InstanceContext {
                app_id: Some("org/app".into()),
                ..Default::default()
            })
            .with_application_setting("homepage", json!("https://example.com"))
            .with_roles(["DAGL"])
            .with_text_resource("title", "Form title")
            .with_language("en");

        assert_eq!(eval_with(&sources, r#"["instanceContext", "appId"]"#).unwrap(), s("org/app"));
        assert!(eval_with(&sources, r#"["instanceContext", "nope"]"#).is_err());
        assert_eq!(
            eval_with(&sources, r#"["frontendSettings", "homepage"]"#).unwrap(),
            s("https://example.com")
        );
        assert_eq!(eval_with(&sources, r#"["authContext", "write"]"#).unwrap(), ExprValue::Bool(false));
        assert_eq!(eval_with(&sources, r#"["hasRole", "DAGL"]"#).unwrap(), ExprValue::Bool(true));
        assert_eq!(eval_with(&sources, r#"["text", "title"]"#).unwrap(), s("Form title"));
        assert_eq!(eval_with(&sources, r#"["text", "missing"]"#).unwrap(), s("missing"));
        assert_eq!(eval_with(&sources, r#"["language"]"#).unwrap(), s("en"));
    }

    #[test]
    fn test_external_api() {
        let sources = DataSources::new().with_external_api("api", json!({ "nested": { "value": 12 } }));
        assert_eq!(eval_with(&sources, r#"["externalApi", "api", "nested.value"]"#).unwrap(), s("12"));
        assert_eq!(eval_with(&sources, r#"["externalApi", "api", null]"#).unwrap(), ExprValue::Null);
        assert!(eval_with(&sources, r#"["externalApi", null, "a"]"#).is_err());
    }

    #[test]
    fn test_links() {
        let sources = DataSources::new()
            .with_instance(InstanceContext {
                instance_id: Some("1337/abc".into()),
                ..Default::default()
            })
            .with_current_task("Task_1");

        assert_eq!(
            eval_with(&sources, r#"["linkToPage", "Go", "summary"]"#).unwrap(),
            s(r#"<a href="/instance/1337/abc/Task_1/summary" data-link-type="LinkToPotentialPage">Go</a>"#)
        );
        assert_eq!(
            eval_with(&DataSources::new(), r#"["linkToPage", "Go", "summary"]"#).unwrap(),
            s(r#"<a href="/summary" data-link-type="LinkToPotentialPage">Go</a>"#)
        );
        assert_eq!(eval(r#"["linkToPage", null, "summary"]"#), ExprValue::Null);

        let scope = LocationScope::new(None).with_component(ComponentTarget {
            id: "name-1".into(),
            kind: "Input".into(),
            page: "page2".into(),
            simple_binding: None,
            hidden: false,
            options: Vec::new(),
        });
        let expr = parse_expression_str(r#"["linkToComponent", "Fix", "name-1"]"#).unwrap();
        let result = Evaluator::new(&sources).with_scope(&scope).evaluate(&expr).unwrap();
        assert_eq!(
            result,
            s(r#"<a href="/instance/1337/abc/Task_1/page2?focusComponentId=name-1" data-link-type="LinkToPotentialNode">Fix</a>"#)
        );
    }

    #[test]
    fn test_component_and_display_value() {
        let sources = DataSources::new()
            .with_form_data("model", json!({ "Person": { "Country": "no,se", "Age": 40, "Secret": "x" } }))
            .with_text_resource("country.no", "Norway");

        let target = |id: &str, field: &str, hidden: bool| ComponentTarget {
            id: id.into(),
            kind: "Input".into(),
            page: "p".into(),
            simple_binding: Some(parse_data_model_ref(&json!(field)).unwrap()),
            hidden,
            options: Vec::new(),
        };
        let mut country = target("country", "Person.Country", false);
        country.options = vec![
            ComponentOption { value: "no".into(), label: "country.no".into() },
            ComponentOption { value: "se".into(), label: "Sweden".into() },
        ];
        let scope = LocationScope::new(None)
            .with_component(target("age", "Person.Age", false))
            .with_component(target("secret", "Person.Secret", true))
            .with_component(country);

        let evaluator = Evaluator::new(&sources).with_scope(&scope);
        let run = |source: &str| evaluator.evaluate(&parse_expression_str(source).unwrap());

        assert_eq!(run(r#"["component", "age"]"#).unwrap(), ExprValue::Number(40.0));
        assert_eq!(run(r#"["component", "secret"]"#).unwrap(), ExprValue::Null);
        assert!(run(r#"["component", "missing"]"#).is_err());
        assert_eq!(run(r#"["displayValue", "age"]"#).unwrap(), s("40"));
        assert_eq!(run(r#"["displayValue", "country"]"#).unwrap(), s("Norway, Sweden"));
        assert_eq!(run(r#"["displayValue", "secret"]"#).unwrap(), ExprValue::Null);
    }

    #[test]
    fn test_data_model_transposed_into_row() {
        let sources = DataSources::new().with_form_data(
            "model",
            json!({ "Group": [{ "Name": "first" }, { "Name": "second" }], "Top": 1 }),
        );
        let location = DataModelRef::new(Some("model".into()), formtree_parser::parse_data_path("Group[1]").unwrap());
        let scope = LocationScope::new(Some(location));
        let evaluator = Evaluator::new(&sources).with_scope(&scope);

        let name = parse_expression_str(r#"["dataModel", "Group.Name"]"#).unwrap();
        assert_eq!(evaluator.evaluate(&name).unwrap(), s("second"));
        let top = parse_expression_str(r#"["dataModel", "Top"]"#).unwrap();
        assert_eq!(evaluator.evaluate(&top).unwrap(), ExprValue::Number(1.0));

        let unknown = parse_expression_str(r#"["dataModel", "Top", "other"]"#).unwrap();
        assert!(matches!(evaluator.evaluate(&unknown), Err(ExprError::Resolve { .. })));
    }

    #[test]
    fn test_select_and_map() {
        let sources = DataSources::new().with_form_data(
            "model",
            json!({ "People": [{ "Name": "Ada" }, { "Name": "Bo" }, { "Age": 3 }] }),
        );
        assert_eq!(
            eval_with(&sources, r#"["_experimentalSelectAndMap", "People", "Name", "<", ">", false]"#).unwrap(),
            s("<Ada> <Bo> <")
        );
        assert_eq!(
            eval_with(&sources, r#"["_experimentalSelectAndMap", "Missing", "Name"]"#).unwrap(),
            s("")
        );
    }

    #[test]
    fn test_argv_and_value() {
        let sources = DataSources::new();
        let positional = [s("first"), ExprValue::Number(2.0)];
        let values = ValueArguments::new().with_value("x", 5.0).with_default_key("x");
        let evaluator = Evaluator::new(&sources)
            .with_positional_args(&positional)
            .with_value_args(&values);
        let run = |source: &str| evaluator.evaluate(&parse_expression_str(source).unwrap());

        assert_eq!(run(r#"["argv", 1]"#).unwrap(), ExprValue::Number(2.0));
        assert!(run(r#"["argv", 2]"#).is_err());
        assert_eq!(run(r#"["value"]"#).unwrap(), ExprValue::Number(5.0));
        assert_eq!(run(r#"["value", "x"]"#).unwrap(), ExprValue::Number(5.0));
        assert!(run(r#"["value", "y"]"#).is_err());

        assert!(eval_with(&sources, r#"["argv", 0]"#).is_err());
    }

    #[test]
    fn test_error_locations() {
        let err = eval_with(&DataSources::new(), r#"["equals", 1, ["greaterThan", "abc", 1]]"#).unwrap_err();
        assert_eq!(
            err,
            ExprError::Cast {
                expected: ValueType::Number,
                value: "\"abc\"".into(),
                location: "$[2][1]".into(),
            }
        );
    }

    #[test]
    fn test_depth_limit() {
        let mut expr = Expression::literal(true);
        for _ in 0..10 {
            expr = Expression::call(Function::Not, vec![expr]);
        }
        let sources = DataSources::new();
        let shallow = Evaluator::new(&sources).with_options(EvalOptions::default().with_max_depth(5));
        assert_eq!(shallow.evaluate(&expr), Err(ExprError::MaxDepthExceeded { depth: 5 }));
        assert_eq!(Evaluator::new(&sources).evaluate(&expr).unwrap(), ExprValue::Bool(true));
    }

    #[test]
    fn test_arity_checked_for_built_asts() {
        let expr = Expression::call(Function::Not, vec![]);
        let err = Evaluator::new(&DataSources::new()).evaluate(&expr).unwrap_err();
        assert!(matches!(err, ExprError::Arity { function: "not", got: 0, .. }));
    }

    #[test]
    fn test_evaluate_or_defaults() {
        let sources = DataSources::new();
        let evaluator = Evaluator::new(&sources);
        let broken = parse_expression_str(r#"["greaterThan", "abc", 1]"#).unwrap();
        assert_eq!(
            evaluator.evaluate_or(&broken, ValueType::Boolean, ExprValue::Bool(false)),
            ExprValue::Bool(false)
        );
        let null = Expression::Literal(ExprValue::Null);
        assert_eq!(
            evaluator.evaluate_or(&null, ValueType::Boolean, ExprValue::Bool(true)),
            ExprValue::Bool(true)
        );
        let text = Expression::literal("1");
        assert_eq!(
            evaluator.evaluate_or(&text, ValueType::Boolean, ExprValue::Bool(false)),
            ExprValue::Bool(true)
        );
    }

    #[test]
    fn test_unknown_function_in_json_is_an_error() {
        let result = Evaluator::new(&DataSources::new()).evaluate_json(&json!(["noSuchFunction", 1]));
        assert!(matches!(result, Err(ExprError::Parse(_))));
    }
}
