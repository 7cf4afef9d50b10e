//! Tool input schemas and argument validation.

use std::fmt;

use serde_json::{Map, Value, json};

use crate::error::ToolError;

/// JSON type of a single tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Number,
    Integer,
    String,
    Boolean,
}

impl ParamKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamKind::Number => "number",
            ParamKind::Integer => "integer",
            ParamKind::String => "string",
            ParamKind::Boolean => "boolean",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            ParamKind::Number => value.is_number(),
            ParamKind::Integer => integral(value).is_some(),
            ParamKind::String => value.is_string(),
            ParamKind::Boolean => value.is_boolean(),
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `5` and `5.0` are both integers; `5.5` is not.
fn integral(value: &Value) -> Option<i64> {
    if let Some(n) = value.as_i64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    let in_range = (i64::MIN as f64..i64::MAX as f64).contains(&f);
    (f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A named tool parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
}

impl Param {
    pub fn required(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Value filled in when the caller omits the parameter.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.required = false;
        self.default = Some(default.into());
        self
    }
}

/// Ordered set of parameters accepted by a tool.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    params: Vec<Param>,
}

impl InputSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(mut self, param: Param) -> Self {
        self.params.push(param);
        self
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Render as the JSON Schema object sent in `tools/list`.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        for param in &self.params {
            let mut property = Map::new();
            property.insert("type".into(), Value::from(param.kind.as_str()));
            if let Some(description) = &param.description {
                property.insert("description".into(), Value::from(description.as_str()));
            }
            if let Some(default) = &param.default {
                property.insert("default".into(), default.clone());
            }
            properties.insert(param.name.clone(), Value::Object(property));
        }

        let required: Vec<Value> = self
            .params
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::from(p.name.as_str()))
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Check `arguments` against the schema and fill in defaults.
    ///
    /// Fields the schema does not name are dropped. `null` counts as absent.
    pub fn validate(&self, arguments: Option<Map<String, Value>>) -> Result<Arguments, ToolError> {
        let mut arguments = arguments.unwrap_or_default();
        let mut validated = Map::new();

        for param in &self.params {
            match arguments.remove(&param.name) {
                None | Some(Value::Null) => {
                    if let Some(default) = &param.default {
                        validated.insert(param.name.clone(), default.clone());
                    } else if param.required {
                        return Err(ToolError::invalid(&param.name, "missing required parameter"));
                    }
                }
                Some(value) if param.kind.accepts(&value) => {
                    validated.insert(param.name.clone(), value);
                }
                Some(value) => {
                    return Err(ToolError::invalid(
                        &param.name,
                        format!("expected {}, got {}", param.kind, json_type_name(&value)),
                    ));
                }
            }
        }

        Ok(Arguments(validated))
    }
}

/// Validated arguments handed to a tool handler.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(Map<String, Value>);

impl Arguments {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn f64(&self, name: &str) -> Result<f64, ToolError> {
        self.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::invalid(name, "expected number"))
    }

    pub fn i64(&self, name: &str) -> Result<i64, ToolError> {
        self.get(name)
            .and_then(integral)
            .ok_or_else(|| ToolError::invalid(name, "expected integer"))
    }

    pub fn str(&self, name: &str) -> Result<&str, ToolError> {
        self.get(name)
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::invalid(name, "expected string"))
    }

    pub fn opt_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(value: Value) -> Option<Map<String, Value>> {
        match value {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    fn search_schema() -> InputSchema {
        InputSchema::new()
            .param(Param::required("query", ParamKind::String).describe("Search query string"))
            .param(Param::optional("max_results", ParamKind::Integer).with_default(5))
    }

    #[test]
    fn renders_json_schema() {
        let schema = search_schema().to_json();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["query"]["type"], "string");
        assert_eq!(schema["properties"]["max_results"]["default"], 5);
        assert_eq!(schema["required"], json!(["query"]));
    }

    #[test]
    fn fills_defaults_and_drops_unknown_fields() {
        let validated = search_schema()
            .validate(args(json!({"query": "rust", "extra": true})))
            .unwrap();
        assert_eq!(validated.str("query").unwrap(), "rust");
        assert_eq!(validated.i64("max_results").unwrap(), 5);
        assert!(validated.get("extra").is_none());
    }

    #[test]
    fn missing_required_names_the_field() {
        let err = search_schema().validate(None).unwrap_err();
        assert_eq!(
            err,
            ToolError::invalid("query", "missing required parameter")
        );

        let err = search_schema()
            .validate(args(json!({"query": null})))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { field, .. } if field == "query"));
    }

    #[test]
    fn type_mismatch_names_the_field() {
        let err = search_schema()
            .validate(args(json!({"query": 42})))
            .unwrap_err();
        assert_eq!(err, ToolError::invalid("query", "expected string, got number"));
    }

    #[test]
    fn integers_accept_integral_floats_only() {
        let schema = InputSchema::new().param(Param::required("n", ParamKind::Integer));
        assert_eq!(
            schema.validate(args(json!({"n": 5.0}))).unwrap().i64("n").unwrap(),
            5
        );
        assert!(schema.validate(args(json!({"n": 5.5}))).is_err());
        assert!(schema.validate(args(json!({"n": "5"}))).is_err());
    }

    #[test]
    fn numbers_accept_integers() {
        let schema = InputSchema::new().param(Param::required("a", ParamKind::Number));
        let validated = schema.validate(args(json!({"a": 7}))).unwrap();
        assert_eq!(validated.f64("a").unwrap(), 7.0);
    }
}
