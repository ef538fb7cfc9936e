//! Expression AST and the function signature table.

use std::fmt;

use serde_json::Value;

use crate::value::{ExprValue, ValueType};

/// A parsed expression: either a literal or a function call.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(ExprValue),
    Call(Call),
}

/// A function call `[name, ...args]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub function: Function,
    pub args: Vec<Expression>,
}

impl Expression {
    pub fn literal(value: impl Into<ExprValue>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn call(function: Function, args: Vec<Expression>) -> Self {
        Expression::Call(Call { function, args })
    }

    /// Whether this expression is a literal value (no function calls).
    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    /// Nesting depth; a literal has depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Expression::Literal(_) => 0,
            Expression::Call(call) => 1 + call.args.iter().map(Expression::depth).max().unwrap_or(0),
        }
    }

    /// Serialize back into the JSON array form.
    pub fn to_json(&self) -> Value {
        match self {
            Expression::Literal(value) => value.to_json(),
            Expression::Call(call) => {
                let mut items = Vec::with_capacity(call.args.len() + 1);
                items.push(Value::String(call.function.name().to_string()));
                items.extend(call.args.iter().map(Expression::to_json));
                Value::Array(items)
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// How an argument position may be filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgVariant {
    Required,
    Optional,
    /// Zero or more further arguments of the same type.
    Rest,
}

/// One argument in a function signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgDef {
    pub ty: ValueType,
    pub variant: ArgVariant,
}

// Argument tables must be promotable to `'static`, so these are macros.
macro_rules! required {
    ($ty:ident) => {
        ArgDef { ty: ValueType::$ty, variant: ArgVariant::Required }
    };
}

macro_rules! optional {
    ($ty:ident) => {
        ArgDef { ty: ValueType::$ty, variant: ArgVariant::Optional }
    };
}

macro_rules! rest {
    ($ty:ident) => {
        ArgDef { ty: ValueType::$ty, variant: ArgVariant::Rest }
    };
}

/// Argument list and return type of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub args: &'static [ArgDef],
    pub returns: ValueType,
}

impl Signature {
    /// Smallest number of arguments accepted.
    pub fn min_args(&self) -> usize {
        self.args
            .iter()
            .filter(|a| a.variant == ArgVariant::Required)
            .count()
    }

    /// Largest number of arguments accepted, or `None` when the last argument is a rest argument.
    pub fn max_args(&self) -> Option<usize> {
        match self.args.last() {
            Some(ArgDef { variant: ArgVariant::Rest, .. }) => None,
            _ => Some(self.args.len()),
        }
    }

    /// Expected type for the argument at `index`.
    pub fn arg_type(&self, index: usize) -> ValueType {
        match self.args.get(index) {
            Some(def) => def.ty,
            None => match self.args.last() {
                Some(ArgDef { ty, variant: ArgVariant::Rest }) => *ty,
                _ => ValueType::Any,
            },
        }
    }
}

macro_rules! functions {
    ($($variant:ident => $name:literal,)*) => {
        /// Every function available in expressions.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Function {
            $($variant,)*
        }

        impl Function {
            /// All functions, in declaration order.
            pub const ALL: &'static [Function] = &[$(Function::$variant,)*];

            /// Name used in expression JSON.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Function::$variant => $name,)*
                }
            }

            /// Look up a function by its JSON name.
            pub fn from_name(name: &str) -> Option<Function> {
                match name {
                    $($name => Some(Function::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

functions! {
    Argv => "argv",
    Value => "value",
    Equals => "equals",
    NotEquals => "notEquals",
    Not => "not",
    GreaterThan => "greaterThan",
    GreaterThanEq => "greaterThanEq",
    LessThan => "lessThan",
    LessThanEq => "lessThanEq",
    Concat => "concat",
    And => "and",
    Or => "or",
    If => "if",
    InstanceContext => "instanceContext",
    FrontendSettings => "frontendSettings",
    AuthContext => "authContext",
    Component => "component",
    DataModel => "dataModel",
    HasRole => "hasRole",
    ExternalApi => "externalApi",
    DisplayValue => "displayValue",
    FormatDate => "formatDate",
    Round => "round",
    Text => "text",
    LinkToComponent => "linkToComponent",
    LinkToPage => "linkToPage",
    Language => "language",
    Contains => "contains",
    NotContains => "notContains",
    EndsWith => "endsWith",
    StartsWith => "startsWith",
    StringLength => "stringLength",
    CommaContains => "commaContains",
    LowerCase => "lowerCase",
    UpperCase => "upperCase",
    SelectAndMap => "_experimentalSelectAndMap",
}

impl Function {
    /// Argument list and return type.
    pub fn signature(&self) -> Signature {
        let (args, returns): (&'static [ArgDef], ValueType) = match self {
            Function::Argv => (&[required!(Number)], ValueType::Any),
            Function::Value => (&[optional!(String)], ValueType::Any),
            Function::Equals | Function::NotEquals => (&[required!(String), required!(String)], ValueType::Boolean),
            Function::Not => (&[required!(Boolean)], ValueType::Boolean),
            Function::GreaterThan
            | Function::GreaterThanEq
            | Function::LessThan
            | Function::LessThanEq => (&[required!(Number), required!(Number)], ValueType::Boolean),
            Function::Concat => (&[rest!(String)], ValueType::String),
            Function::And | Function::Or => (&[required!(Boolean), rest!(Boolean)], ValueType::Boolean),
            Function::If => (
                &[required!(Boolean), required!(Any), optional!(String), optional!(Any)],
                ValueType::Any,
            ),
            Function::InstanceContext => (&[required!(String)], ValueType::String),
            Function::FrontendSettings => (&[required!(String)], ValueType::Any),
            Function::AuthContext => (&[required!(String)], ValueType::Boolean),
            Function::Component => (&[required!(String)], ValueType::Any),
            Function::DataModel => (&[required!(String), optional!(String)], ValueType::Any),
            Function::HasRole => (&[required!(String)], ValueType::Boolean),
            Function::ExternalApi => (&[required!(String), required!(String)], ValueType::String),
            Function::DisplayValue => (&[required!(String)], ValueType::String),
            Function::FormatDate => (&[required!(Date), optional!(String)], ValueType::String),
            Function::Round => (&[required!(Number), optional!(Number)], ValueType::String),
            Function::Text => (&[required!(String)], ValueType::String),
            Function::LinkToComponent | Function::LinkToPage => {
                (&[required!(String), required!(String)], ValueType::String)
            }
            Function::Language => (&[], ValueType::String),
            Function::Contains
            | Function::NotContains
            | Function::EndsWith
            | Function::StartsWith
            | Function::CommaContains => (&[required!(String), required!(String)], ValueType::Boolean),
            Function::StringLength => (&[required!(String)], ValueType::Number),
            Function::LowerCase | Function::UpperCase => (&[required!(String)], ValueType::String),
            Function::SelectAndMap => (
                &[
                    required!(String),
                    required!(String),
                    optional!(String),
                    optional!(String),
                    optional!(Boolean),
                ],
                ValueType::String,
            ),
        };
        Signature { args, returns }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
