//! Function implementations.
//!
//! Arguments arrive already cast to their signature types, so a `Number`
//! parameter is either `ExprValue::Number` or `ExprValue::Null`.

use tracing::warn;

use formtree_core::{DataModelRef, ExprError, ExprValue, Function, ResolveError};
use formtree_parser::parse_data_path;
use formtree_resolver::ComponentTarget;

use crate::cast::parse_date;
use crate::date::format_date;
use crate::evaluator::Evaluator;

/// Run `function` on its evaluated arguments.
pub(crate) fn call(
    eval: &Evaluator<'_>,
    function: Function,
    args: Vec<ExprValue>,
    location: &str,
) -> Result<ExprValue, ExprError> {
    let ctx = Invocation { eval, args, location };
    match function {
        Function::Argv => ctx.argv(),
        Function::Value => ctx.value(),
        Function::Equals => Ok(ExprValue::Bool(ctx.equals())),
        Function::NotEquals => Ok(ExprValue::Bool(!ctx.equals())),
        Function::Not => Ok(ExprValue::Bool(!ctx.truthy(0))),
        Function::GreaterThan => Ok(ctx.compare(|a, b| a > b)),
        Function::GreaterThanEq => Ok(ctx.compare(|a, b| a >= b)),
        Function::LessThan => Ok(ctx.compare(|a, b| a < b)),
        Function::LessThanEq => Ok(ctx.compare(|a, b| a <= b)),
        Function::Concat => Ok(ExprValue::String(
            ctx.args.iter().filter_map(ExprValue::to_text).collect(),
        )),
        Function::And => Ok(ExprValue::Bool((0..ctx.args.len()).all(|i| ctx.truthy(i)))),
        Function::Or => Ok(ExprValue::Bool((0..ctx.args.len()).any(|i| ctx.truthy(i)))),
        Function::If => Ok(ctx.if_else()),
        Function::InstanceContext => ctx.instance_context(),
        Function::FrontendSettings => ctx.frontend_settings(),
        Function::AuthContext => ctx.auth_context(),
        Function::Component => ctx.component(),
        Function::DataModel => ctx.data_model(),
        Function::HasRole => Ok(ExprValue::Bool(
            ctx.str_arg(0).is_some_and(|role| ctx.eval.sources.has_role(role)),
        )),
        Function::ExternalApi => ctx.external_api(),
        Function::DisplayValue => ctx.display_value(),
        Function::FormatDate => ctx.format_date(),
        Function::Round => ctx.round(),
        Function::Text => Ok(ctx
            .str_arg(0)
            .map(|key| ExprValue::String(ctx.eval.sources.text(key).to_string()))
            .unwrap_or_default()),
        Function::LinkToComponent => ctx.link_to_component(),
        Function::LinkToPage => Ok(ctx.link_to_page()),
        Function::Language => Ok(ExprValue::String(ctx.eval.sources.language.clone())),
        Function::Contains => Ok(ctx.string_test(false, |s, sub| s.contains(sub))),
        Function::NotContains => Ok(ctx.string_test(true, |s, sub| !s.contains(sub))),
        Function::EndsWith => Ok(ctx.string_test(false, |s, sub| s.ends_with(sub))),
        Function::StartsWith => Ok(ctx.string_test(false, |s, sub| s.starts_with(sub))),
        Function::CommaContains => Ok(ctx.string_test(false, |list, item| {
            list.split(',').any(|part| part.trim() == item)
        })),
        Function::StringLength => Ok(ExprValue::Number(
            ctx.str_arg(0).map_or(0, |s| s.encode_utf16().count()) as f64,
        )),
        Function::LowerCase => Ok(ctx.map_str(|s| s.to_lowercase())),
        Function::UpperCase => Ok(ctx.map_str(|s| s.to_uppercase())),
        Function::SelectAndMap => ctx.select_and_map(),
    }
}

struct Invocation<'e, 'a> {
    eval: &'e Evaluator<'a>,
    args: Vec<ExprValue>,
    location: &'e str,
}

impl Invocation<'_, '_> {
    fn arg(&self, index: usize) -> &ExprValue {
        static NULL: ExprValue = ExprValue::Null;
        self.args.get(index).unwrap_or(&NULL)
    }

    fn str_arg(&self, index: usize) -> Option<&str> {
        self.arg(index).as_str()
    }

    fn truthy(&self, index: usize) -> bool {
        self.arg(index).as_bool().unwrap_or(false)
    }

    fn runtime(&self, message: impl Into<String>) -> ExprError {
        ExprError::runtime(message, self.location)
    }

    fn resolve(&self, source: ResolveError) -> ExprError {
        ExprError::Resolve {
            source,
            location: self.location.to_string(),
        }
    }

    fn argv(&self) -> Result<ExprValue, ExprError> {
        let positional = self.eval.positional;
        if positional.is_empty() {
            return Err(self.runtime("No positional arguments available"));
        }
        let index = self.arg(0).as_number();
        index
            .filter(|i| i.fract() == 0.0 && *i >= 0.0)
            .and_then(|i| positional.get(i as usize))
            .cloned()
            .ok_or_else(|| self.runtime(format!("Index {} out of range", self.arg(0))))
    }

    fn value(&self) -> Result<ExprValue, ExprError> {
        let config = self
            .eval
            .value_args
            .ok_or_else(|| self.runtime("No value arguments available"))?;
        let key = self
            .str_arg(0)
            .or(config.default_key.as_deref())
            .ok_or_else(|| self.runtime("Invalid key (expected string, got null)"))?;
        config.data.get(key).cloned().ok_or_else(|| {
            let valid: Vec<&str> = config.data.keys().map(String::as_str).collect();
            self.runtime(format!("Unknown key {}, Valid keys are: {}", key, valid.join(", ")))
        })
    }

    fn equals(&self) -> bool {
        self.arg(0).to_string_for_equals() == self.arg(1).to_string_for_equals()
    }

    fn compare(&self, op: impl Fn(f64, f64) -> bool) -> ExprValue {
        match (self.arg(0).as_number(), self.arg(1).as_number()) {
            (Some(a), Some(b)) => ExprValue::Bool(op(a, b)),
            _ => ExprValue::Bool(false),
        }
    }

    fn if_else(&self) -> ExprValue {
        if self.arg(0) == &ExprValue::Bool(true) {
            self.arg(1).clone()
        } else {
            self.arg(3).clone()
        }
    }

    fn instance_context(&self) -> Result<ExprValue, ExprError> {
        let key = self.str_arg(0).unwrap_or("null");
        let value = self.eval.sources.instance_value(key).map_err(|e| self.resolve(e))?;
        Ok(value.map(ExprValue::from).unwrap_or_default())
    }

    fn frontend_settings(&self) -> Result<ExprValue, ExprError> {
        let key = self
            .str_arg(0)
            .ok_or_else(|| self.runtime("Value cannot be null. (Parameter 'key')"))?;
        Ok(self.eval.sources.frontend_setting(key))
    }

    fn auth_context(&self) -> Result<ExprValue, ExprError> {
        let key = self.str_arg(0).unwrap_or("null");
        let value = self.eval.sources.auth_value(key).map_err(|e| self.resolve(e))?;
        Ok(ExprValue::Bool(value))
    }

    fn find_component(&self) -> Result<Option<ComponentTarget>, ExprError> {
        let id = self
            .str_arg(0)
            .ok_or_else(|| self.runtime("Cannot lookup component null"))?;
        self.eval.scope.find_component(id).map_err(|e| self.resolve(e))
    }

    fn component(&self) -> Result<ExprValue, ExprError> {
        let target = self.find_component()?;
        let Some((target, binding)) = target.and_then(|t| t.simple_binding.clone().map(|b| (t, b))) else {
            return Err(self.runtime(format!(
                "Unable to find component with identifier {} or it does not have a simpleBinding",
                self.arg(0)
            )));
        };
        if target.hidden {
            return Ok(ExprValue::Null);
        }
        self.eval.sources.pick_simple(&binding).map_err(|e| self.resolve(e))
    }

    fn display_value(&self) -> Result<ExprValue, ExprError> {
        let target = self.find_component()?.ok_or_else(|| {
            self.runtime(format!("Unable to find component with identifier {}", self.arg(0)))
        })?;
        let binding = target.simple_binding.as_ref().ok_or_else(|| {
            self.runtime(format!("Component with identifier {} does not have a displayValue", target.id))
        })?;
        if target.hidden {
            return Ok(ExprValue::Null);
        }

        let sources = self.eval.sources;
        let raw = sources
            .pick_simple(binding)
            .map_err(|e| self.resolve(e))?
            .to_text()
            .unwrap_or_default();
        if target.options.is_empty() || raw.is_empty() {
            return Ok(ExprValue::String(raw));
        }

        let labels: Vec<&str> = raw
            .split(',')
            .map(str::trim)
            .map(|value| {
                target
                    .options
                    .iter()
                    .find(|option| option.value == value)
                    .map(|option| sources.text(&option.label))
                    .unwrap_or(value)
            })
            .collect();
        Ok(ExprValue::String(labels.join(", ")))
    }

    fn data_model(&self) -> Result<ExprValue, ExprError> {
        let path = self
            .str_arg(0)
            .ok_or_else(|| self.runtime("Cannot lookup dataModel null"))?;
        let field = parse_data_path(path).map_err(|e| self.runtime(e.to_string()))?;

        let sources = self.eval.sources;
        let data_type = self
            .str_arg(1)
            .map(str::to_string)
            .or_else(|| sources.default_data_type.clone())
            .ok_or_else(|| self.resolve(ResolveError::MissingDataType))?;

        let reference = DataModelRef::new(Some(data_type), field);
        let reference = match self.eval.scope.location() {
            Some(location) => {
                let location = location.with_default_type(sources.default_data_type.as_deref());
                reference.transpose(&location)
            }
            None => reference,
        };
        sources.pick_simple(&reference).map_err(|e| self.resolve(e))
    }

    fn external_api(&self) -> Result<ExprValue, ExprError> {
        let id = self
            .str_arg(0)
            .ok_or_else(|| self.runtime("Expected an external API id"))?;
        match self.str_arg(1) {
            Some(path) if !path.is_empty() => Ok(self.eval.sources.external_api(id, path)),
            _ => Ok(ExprValue::Null),
        }
    }

    fn format_date(&self) -> Result<ExprValue, ExprError> {
        let Some(date) = parse_date(self.arg(0), self.location)? else {
            return Ok(ExprValue::Null);
        };
        let pattern = self.str_arg(1);
        format_date(&date, pattern, &self.eval.sources.language)
            .map(ExprValue::String)
            .map_err(|token| {
                self.runtime(format!(
                    "Unsupported date format token '{}' in '{}'",
                    token,
                    pattern.unwrap_or_default()
                ))
            })
    }

    fn round(&self) -> Result<ExprValue, ExprError> {
        let number = self.arg(0).as_number().unwrap_or(0.0);
        let decimals = self.arg(1).as_number().unwrap_or(0.0);
        if decimals.fract() != 0.0 || !(0.0..=100.0).contains(&decimals) {
            return Err(self.runtime(format!("Decimal points must be between 0 and 100, got {}", self.arg(1))));
        }
        let decimals = decimals as usize;

        let rounded = if decimals <= 15 {
            let factor = 10f64.powi(decimals as i32);
            (number * factor).round() / factor
        } else {
            number
        };
        let rounded = if rounded == 0.0 { 0.0 } else { rounded };
        Ok(ExprValue::String(format!("{:.*}", decimals, rounded)))
    }

    fn link_url(&self, page: &str) -> String {
        let sources = self.eval.sources;
        let instance_id = sources.instance.as_ref().and_then(|i| i.instance_id.as_deref());
        match (instance_id, sources.current_task.as_deref()) {
            (Some(instance_id), Some(task)) if !instance_id.is_empty() && !task.is_empty() => {
                format!("/instance/{}/{}/{}", instance_id, task, page)
            }
            _ => format!("/{}", page),
        }
    }

    fn link_to_component(&self) -> Result<ExprValue, ExprError> {
        let (Some(text), Some(id)) = (self.str_arg(0), self.str_arg(1)) else {
            warn!("linkToComponent needs both link text and a component id");
            return Ok(ExprValue::Null);
        };
        let target = self
            .eval
            .scope
            .find_component(id)
            .map_err(|e| self.resolve(e))?
            .ok_or_else(|| self.runtime(format!("Unable to find component with identifier {}", id)))?;

        let url = self.link_url(&target.page);
        Ok(ExprValue::String(format!(
            "<a href=\"{}?focusComponentId={}\" data-link-type=\"LinkToPotentialNode\">{}</a>",
            url, target.id, text
        )))
    }

    fn link_to_page(&self) -> ExprValue {
        let (Some(text), Some(page)) = (self.str_arg(0), self.str_arg(1)) else {
            warn!("linkToPage needs both link text and a page id");
            return ExprValue::Null;
        };
        ExprValue::String(format!(
            "<a href=\"{}\" data-link-type=\"LinkToPotentialPage\">{}</a>",
            self.link_url(page),
            text
        ))
    }

    /// Apply a two-string test; `on_null` is the result when either side is null.
    fn string_test(&self, on_null: bool, test: impl Fn(&str, &str) -> bool) -> ExprValue {
        match (self.str_arg(0), self.str_arg(1)) {
            (Some(a), Some(b)) => ExprValue::Bool(test(a, b)),
            _ => ExprValue::Bool(on_null),
        }
    }

    fn map_str(&self, f: impl Fn(&str) -> String) -> ExprValue {
        self.str_arg(0).map(|s| ExprValue::String(f(s))).unwrap_or_default()
    }

    fn select_and_map(&self) -> Result<ExprValue, ExprError> {
        let (Some(path), Some(property)) = (self.str_arg(0), self.str_arg(1)) else {
            return Err(self.runtime("Cannot lookup dataModel null"));
        };
        let sources = self.eval.sources;
        let data_type = sources
            .default_data_type
            .clone()
            .ok_or_else(|| self.resolve(ResolveError::MissingDataType))?;
        let field = parse_data_path(path).map_err(|e| self.runtime(e.to_string()))?;
        let reference = DataModelRef::new(Some(data_type), field);

        let Some(rows) = sources.rows(&reference).map_err(|e| self.resolve(e))? else {
            return Ok(ExprValue::String(String::new()));
        };

        let prepend = self.str_arg(2).unwrap_or("");
        let append = self.str_arg(3).unwrap_or("");
        let append_to_last = self.arg(4).as_bool().unwrap_or(true);

        let parts: Vec<String> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let selected = row
                    .get(property)
                    .map(ExprValue::from_json)
                    .and_then(|v| v.to_text())
                    .unwrap_or_default();
                let suffix = if i + 1 == rows.len() && !append_to_last { "" } else { append };
                format!("{}{}{}", prepend, selected, suffix)
            })
            .collect();
        Ok(ExprValue::String(parts.join(" ")))
    }
}
