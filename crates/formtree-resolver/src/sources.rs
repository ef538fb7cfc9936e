//! The data-source bundle expressions are evaluated against.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use formtree_core::{DataModelRef, ExprValue, ResolveError};

use crate::lookup::{lookup_dotted, lookup_path};

/// Language used when none is configured.
pub const DEFAULT_LANGUAGE: &str = "nb";

/// Instance metadata available through `instanceContext`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstanceContext {
    pub instance_id: Option<String>,
    pub app_id: Option<String>,
    pub instance_owner_party_id: Option<String>,
    pub instance_owner_party_type: Option<String>,
}

impl InstanceContext {
    /// Keys accepted by `instanceContext`.
    pub const KEYS: &'static [&'static str] = &[
        "instanceId",
        "appId",
        "instanceOwnerPartyId",
        "instanceOwnerPartyType",
    ];

    fn field(&self, key: &str) -> Option<&str> {
        match key {
            "instanceId" => self.instance_id.as_deref(),
            "appId" => self.app_id.as_deref(),
            "instanceOwnerPartyId" => self.instance_owner_party_id.as_deref(),
            "instanceOwnerPartyType" => self.instance_owner_party_type.as_deref(),
            _ => None,
        }
    }
}

/// Actions the current user may perform on the current task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthContext {
    pub read: bool,
    pub write: bool,
    pub instantiate: bool,
    pub confirm: bool,
    pub sign: bool,
    pub reject: bool,
}

impl AuthContext {
    /// Keys accepted by `authContext`.
    pub const KEYS: &'static [&'static str] = &["read", "write", "instantiate", "confirm", "sign", "reject"];

    /// Build from the action names granted on a task. Unknown actions are ignored.
    pub fn from_actions<'a>(actions: impl IntoIterator<Item = &'a str>) -> Self {
        let mut auth = AuthContext::default();
        for action in actions {
            match action {
                "read" => auth.read = true,
                "write" => auth.write = true,
                "instantiate" => auth.instantiate = true,
                "confirm" => auth.confirm = true,
                "sign" => auth.sign = true,
                "reject" => auth.reject = true,
                _ => {}
            }
        }
        auth
    }

    fn field(&self, key: &str) -> bool {
        match key {
            "read" => self.read,
            "write" => self.write,
            "instantiate" => self.instantiate,
            "confirm" => self.confirm,
            "sign" => self.sign,
            "reject" => self.reject,
            _ => false,
        }
    }
}

/// Everything an expression can read besides the node tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DataSources {
    /// Form data documents keyed by data type.
    pub form_data: IndexMap<String, Value>,
    /// Data type used when a reference names none.
    pub default_data_type: Option<String>,
    pub instance: Option<InstanceContext>,
    /// Frontend settings of the application.
    pub application_settings: IndexMap<String, Value>,
    pub auth: Option<AuthContext>,
    pub roles: Vec<String>,
    /// Text resources keyed by text key, in the current language.
    pub text_resources: IndexMap<String, String>,
    pub language: String,
    /// Latest result of each external API, keyed by API id.
    pub external_apis: IndexMap<String, Value>,
    /// Element id of the current process task.
    pub current_task: Option<String>,
}

impl Default for DataSources {
    fn default() -> Self {
        Self {
            form_data: IndexMap::new(),
            default_data_type: None,
            instance: None,
            application_settings: IndexMap::new(),
            auth: None,
            roles: Vec::new(),
            text_resources: IndexMap::new(),
            language: DEFAULT_LANGUAGE.to_string(),
            external_apis: IndexMap::new(),
            current_task: None,
        }
    }
}

impl DataSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a form data document. The first one added becomes the default data type.
    pub fn with_form_data(mut self, data_type: impl Into<String>, data: Value) -> Self {
        let data_type = data_type.into();
        if self.default_data_type.is_none() {
            self.default_data_type = Some(data_type.clone());
        }
        self.form_data.insert(data_type, data);
        self
    }

    pub fn with_default_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.default_data_type = Some(data_type.into());
        self
    }

    pub fn with_instance(mut self, instance: InstanceContext) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn with_application_setting(mut self, key: impl Into<String>, value: Value) -> Self {
        self.application_settings.insert(key.into(), value);
        self
    }

    pub fn with_auth(mut self, auth: AuthContext) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_text_resource(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.text_resources.insert(key.into(), text.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_external_api(mut self, id: impl Into<String>, data: Value) -> Self {
        self.external_apis.insert(id.into(), data);
        self
    }

    pub fn with_current_task(mut self, task: impl Into<String>) -> Self {
        self.current_task = Some(task.into());
        self
    }

    /// Fill in the default data type and check that the data model exists.
    pub fn qualify(&self, reference: &DataModelRef) -> Result<DataModelRef, ResolveError> {
        let qualified = reference.with_default_type(self.default_data_type.as_deref());
        let data_type = qualified.data_type.as_deref().ok_or(ResolveError::MissingDataType)?;
        if !self.form_data.contains_key(data_type) {
            return Err(ResolveError::UnknownDataType {
                data_type: data_type.to_string(),
            });
        }
        Ok(qualified)
    }

    /// The raw JSON value a reference points at.
    pub fn lookup(&self, reference: &DataModelRef) -> Result<Option<&Value>, ResolveError> {
        let qualified = self.qualify(reference)?;
        let root = qualified
            .data_type
            .as_deref()
            .and_then(|data_type| self.form_data.get(data_type));
        Ok(root.and_then(|root| lookup_path(root, &qualified.field)))
    }

    /// The primitive value a reference points at; objects, arrays and missing values are null.
    pub fn pick_simple(&self, reference: &DataModelRef) -> Result<ExprValue, ResolveError> {
        Ok(self.lookup(reference)?.map(ExprValue::from_json).unwrap_or_default())
    }

    /// The rows of the array a reference points at, if it points at an array.
    pub fn rows(&self, reference: &DataModelRef) -> Result<Option<&[Value]>, ResolveError> {
        Ok(self.lookup(reference)?.and_then(Value::as_array).map(Vec::as_slice))
    }

    /// Value of an `instanceContext` key; null without an instance.
    pub fn instance_value(&self, key: &str) -> Result<Option<&str>, ResolveError> {
        if !InstanceContext::KEYS.contains(&key) {
            return Err(ResolveError::UnknownContextKey {
                context: "instanceContext",
                key: key.to_string(),
            });
        }
        Ok(self
            .instance
            .as_ref()
            .and_then(|instance| instance.field(key))
            .filter(|value| !value.is_empty()))
    }

    /// Value of an `authContext` key; false without an auth context.
    pub fn auth_value(&self, key: &str) -> Result<bool, ResolveError> {
        if !AuthContext::KEYS.contains(&key) {
            return Err(ResolveError::UnknownContextKey {
                context: "authContext",
                key: key.to_string(),
            });
        }
        Ok(self.auth.map(|auth| auth.field(key)).unwrap_or(false))
    }

    /// A frontend setting. Falsy settings read as null.
    pub fn frontend_setting(&self, key: &str) -> ExprValue {
        let value = self
            .application_settings
            .get(key)
            .map(ExprValue::from_json)
            .unwrap_or_default();
        if is_falsy(&value) {
            ExprValue::Null
        } else {
            value
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// A text resource, falling back to the key itself.
    pub fn text<'a>(&'a self, key: &'a str) -> &'a str {
        self.text_resources.get(key).map(String::as_str).unwrap_or(key)
    }

    /// A value from an external API result. Objects and falsy values read as null.
    pub fn external_api(&self, id: &str, path: &str) -> ExprValue {
        let Some(data) = self.external_apis.get(id) else {
            return ExprValue::Null;
        };
        let found = match data {
            Value::Object(_) | Value::Array(_) => lookup_dotted(data, path),
            other => Some(other),
        };
        let value = found.map(ExprValue::from_json).unwrap_or_default();
        match value {
            v if is_falsy(&v) => ExprValue::Null,
            v => v.to_text().map(ExprValue::String).unwrap_or_default(),
        }
    }
}

fn is_falsy(value: &ExprValue) -> bool {
    match value {
        ExprValue::Null => true,
        ExprValue::Bool(b) => !b,
        ExprValue::Number(n) => *n == 0.0 || n.is_nan(),
        ExprValue::String(s) => s.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formtree_core::DataPath;
    use formtree_parser::parse_data_model_ref;
    use serde_json::json;

    fn reference(path: &str) -> DataModelRef {
        parse_data_model_ref(&json!(path)).unwrap()
    }

    #[test]
    fn test_pick_simple_uses_default_data_type() {
        let sources = DataSources::new().with_form_data("model", json!({ "count": 3, "obj": { "a": 1 } }));
        assert_eq!(sources.pick_simple(&reference("count")).unwrap(), ExprValue::Number(3.0));
        assert_eq!(sources.pick_simple(&reference("obj")).unwrap(), ExprValue::Null);
        assert_eq!(sources.pick_simple(&reference("missing")).unwrap(), ExprValue::Null);
    }

    #[test]
    fn test_unknown_and_missing_data_types() {
        let sources = DataSources::new();
        assert_eq!(
            sources.pick_simple(&reference("count")),
            Err(ResolveError::MissingDataType)
        );

        let sources = sources.with_form_data("model", json!({}));
        let other = DataModelRef::new(Some("other".into()), DataPath::default());
        assert_eq!(
            sources.lookup(&other),
            Err(ResolveError::UnknownDataType {
                data_type: "other".into()
            })
        );
    }

    #[test]
    fn test_rows() {
        let sources = DataSources::new().with_form_data("model", json!({ "G": [{}, {}], "N": 1 }));
        assert_eq!(sources.rows(&reference("G")).unwrap().map(<[Value]>::len), Some(2));
        assert_eq!(sources.rows(&reference("N")).unwrap(), None);
    }

    #[test]
    fn test_context_lookups() {
        let sources = DataSources::new()
            .with_instance(InstanceContext {
                instance_id: Some("512345/abc".into()),
                ..Default::default()
            })
            .with_auth(AuthContext::from_actions(["read", "sign", "unknown"]));

        assert_eq!(sources.instance_value("instanceId").unwrap(), Some("512345/abc"));
        assert_eq!(sources.instance_value("appId").unwrap(), None);
        assert!(matches!(
            sources.instance_value("nope"),
            Err(ResolveError::UnknownContextKey { context: "instanceContext", .. })
        ));

        assert!(sources.auth_value("sign").unwrap());
        assert!(!sources.auth_value("write").unwrap());
        assert!(sources.auth_value("delete").is_err());
    }

    #[test]
    fn test_settings_roles_and_text() {
        let sources = DataSources::new()
            .with_application_setting("flag", json!(true))
            .with_application_setting("off", json!(false))
            .with_roles(["DAGL"])
            .with_text_resource("greeting", "Hello");

        assert_eq!(sources.frontend_setting("flag"), ExprValue::Bool(true));
        assert_eq!(sources.frontend_setting("off"), ExprValue::Null);
        assert_eq!(sources.frontend_setting("missing"), ExprValue::Null);
        assert!(sources.has_role("DAGL"));
        assert!(!sources.has_role("PRIV"));
        assert_eq!(sources.text("greeting"), "Hello");
        assert_eq!(sources.text("unknown.key"), "unknown.key");
        assert_eq!(sources.language, "nb");
    }

    #[test]
    fn test_external_api() {
        let sources = DataSources::new()
            .with_external_api("api", json!({ "a": { "b": 42, "c": { "d": 1 }, "zero": 0 } }))
            .with_external_api("plain", json!("value"));

        assert_eq!(sources.external_api("api", "a.b"), ExprValue::String("42".into()));
        assert_eq!(sources.external_api("api", "a.c"), ExprValue::Null);
        assert_eq!(sources.external_api("api", "a.zero"), ExprValue::Null);
        assert_eq!(sources.external_api("plain", "ignored"), ExprValue::String("value".into()));
        assert_eq!(sources.external_api("unknown", "a"), ExprValue::Null);
    }

    #[test]
    fn test_deserialize_defaults() {
        let sources: DataSources = serde_json::from_value(json!({
            "formData": { "model": { "x": 1 } },
            "defaultDataType": "model",
            "roles": ["DAGL"]
        }))
        .unwrap();
        assert_eq!(sources.language, "nb");
        assert!(sources.has_role("DAGL"));
        assert_eq!(sources.pick_simple(&reference("x")).unwrap(), ExprValue::Number(1.0));
    }
}
