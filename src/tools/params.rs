//! Declared operation parameters — validation, defaults, JSON Schema.
//!
//! Named operations declare their keyword parameters up front. The registry
//! checks incoming params against the declaration before invoking the
//! operation, so a missing or unexpected keyword becomes a structured
//! failure instead of reaching the handler.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Keyword arguments passed to an operation.
pub type Params = Map<String, Value>;

/// Parameter type for operation inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
    StringList,
    Object,
    Enum(Vec<String>),
    Optional(Box<ParamType>),
}

impl ParamType {
    /// Check a JSON value against this type.
    pub fn validate(&self, value: &Value) -> Result<(), String> {
        let ok = match self {
            ParamType::String => value.is_string(),
            ParamType::Int => value.is_i64() || value.is_u64(),
            ParamType::Float => value.is_number(),
            ParamType::Bool => value.is_boolean(),
            ParamType::Object => value.is_object(),
            ParamType::StringList => {
                let Some(items) = value.as_array() else {
                    return Err(format!("expected array, got {}", json_kind(value)));
                };
                if let Some((i, item)) = items.iter().enumerate().find(|(_, v)| !v.is_string()) {
                    return Err(format!("expected string at index {}, got {}", i, json_kind(item)));
                }
                true
            }
            ParamType::Enum(variants) => {
                let Some(s) = value.as_str() else {
                    return Err(format!("expected string for enum, got {}", json_kind(value)));
                };
                if !variants.iter().any(|v| v == s) {
                    return Err(format!(
                        "invalid value '{}', expected one of: {}",
                        s,
                        variants.join(", ")
                    ));
                }
                true
            }
            ParamType::Optional(inner) => return if value.is_null() { Ok(()) } else { inner.validate(value) },
        };

        if ok {
            Ok(())
        } else {
            Err(format!("expected {}, got {}", self.schema_type(), json_kind(value)))
        }
    }

    fn schema_type(&self) -> &'static str {
        match self {
            ParamType::String | ParamType::Enum(_) => "string",
            ParamType::Int => "integer",
            ParamType::Float => "number",
            ParamType::Bool => "boolean",
            ParamType::StringList => "array",
            ParamType::Object => "object",
            ParamType::Optional(inner) => inner.schema_type(),
        }
    }

    /// JSON Schema fragment for this type.
    pub fn json_schema(&self) -> Value {
        match self {
            ParamType::StringList => json!({"type": "array", "items": {"type": "string"}}),
            ParamType::Enum(variants) => json!({"type": "string", "enum": variants}),
            ParamType::Optional(inner) => inner.json_schema(),
            other => json!({"type": other.schema_type()}),
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    pub name: String,
    pub param_type: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParamDef {
    pub fn new(name: impl Into<String>, param_type: ParamType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: String::new(),
            default: None,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.default.is_none() && !matches!(self.param_type, ParamType::Optional(_))
    }
}

/// Validate `params` against `defs`. Returns every problem found (empty = valid).
pub fn validate_params(defs: &[ParamDef], params: &Params) -> Vec<String> {
    let mut errors: Vec<String> = defs
        .iter()
        .filter(|d| d.is_required() && !params.contains_key(&d.name))
        .map(|d| format!("Missing required parameter: {}", d.name))
        .collect();

    for (key, value) in params {
        match defs.iter().find(|d| &d.name == key) {
            Some(def) => {
                if let Err(e) = def.param_type.validate(value) {
                    errors.push(format!("Parameter '{}': {}", key, e));
                }
            }
            None => errors.push(format!("Unknown parameter: {}", key)),
        }
    }

    errors
}

/// Insert declared defaults for parameters the caller omitted.
pub fn fill_defaults(defs: &[ParamDef], params: &mut Params) {
    for def in defs {
        if let Some(default) = &def.default {
            params
                .entry(def.name.clone())
                .or_insert_with(|| default.clone());
        }
    }
}

/// JSON Schema object describing `defs`.
pub fn input_schema(defs: &[ParamDef]) -> Value {
    let properties: Map<String, Value> = defs
        .iter()
        .map(|d| {
            let mut schema = d.param_type.json_schema();
            if let Some(obj) = schema.as_object_mut() {
                if !d.description.is_empty() {
                    obj.insert("description".to_string(), json!(d.description));
                }
                if let Some(default) = &d.default {
                    obj.insert("default".to_string(), default.clone());
                }
            }
            (d.name.clone(), schema)
        })
        .collect();
    let required: Vec<&str> = defs
        .iter()
        .filter(|d| d.is_required())
        .map(|d| d.name.as_str())
        .collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_defs() -> Vec<ParamDef> {
        vec![
            ParamDef::new("text", ParamType::String).describe("Text to echo"),
            ParamDef::new("repeat", ParamType::Optional(Box::new(ParamType::Int))).with_default(1),
        ]
    }

    fn params(value: Value) -> Params {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_params() {
        let errors = validate_params(&echo_defs(), &params(json!({"text": "hi"})));
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
    }

    #[test]
    fn test_missing_required() {
        let errors = validate_params(&echo_defs(), &params(json!({})));
        assert_eq!(errors, vec!["Missing required parameter: text"]);
    }

    #[test]
    fn test_wrong_type_and_unknown() {
        let errors = validate_params(&echo_defs(), &params(json!({"text": 3, "loud": true})));
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.contains("expected string, got number")));
        assert!(errors.iter().any(|e| e == "Unknown parameter: loud"));
    }

    #[test]
    fn test_optional_accepts_null() {
        let errors = validate_params(&echo_defs(), &params(json!({"text": "x", "repeat": null})));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_fill_defaults_does_not_overwrite() {
        let mut p = params(json!({"text": "x"}));
        fill_defaults(&echo_defs(), &mut p);
        assert_eq!(p["repeat"], 1);

        let mut p = params(json!({"text": "x", "repeat": 4}));
        fill_defaults(&echo_defs(), &mut p);
        assert_eq!(p["repeat"], 4);
    }

    #[test]
    fn test_enum_and_string_list() {
        let mode = ParamType::Enum(vec!["fast".into(), "full".into()]);
        assert!(mode.validate(&json!("fast")).is_ok());
        assert!(mode.validate(&json!("slow")).is_err());

        let list = ParamType::StringList;
        assert!(list.validate(&json!(["a", "b"])).is_ok());
        assert_eq!(
            list.validate(&json!(["a", 2])).unwrap_err(),
            "expected string at index 1, got number"
        );
    }

    #[test]
    fn test_input_schema() {
        let schema = input_schema(&echo_defs());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["text"]["type"], "string");
        assert_eq!(schema["properties"]["text"]["description"], "Text to echo");
        assert_eq!(schema["properties"]["repeat"]["default"], 1);
        assert_eq!(schema["required"], json!(["text"]));
    }
}
