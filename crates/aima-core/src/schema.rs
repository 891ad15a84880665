//! Declarative schema descriptors for unit inputs and outputs.
//!
//! A [`Schema`] is a JSON-Schema-like tree over the primitive set
//! {string, number, boolean, object, array}. It serves two purposes:
//! self-description (listing, documentation, tool exposure) and optional
//! input validation in the gateway before a unit executes.
//!
//! Unknown fields in validated input are ignored.

use crate::error::{AimaError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Primitive type of a schema node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    #[default]
    Object,
    String,
    Number,
    Boolean,
    Array,
}

impl SchemaType {
    fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Object => "object",
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Array => "array",
        }
    }

    fn matches(&self, value: &Value) -> bool {
        match self {
            SchemaType::Object => value.is_object(),
            SchemaType::String => value.is_string(),
            SchemaType::Number => value.is_number(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Array => value.is_array(),
        }
    }
}

/// Schema descriptor for a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(rename = "type")]
    pub schema_type: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, rename = "minimum", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, rename = "maximum", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,
}

// ============================================================================
// Builders
// ============================================================================

impl Schema {
    fn of(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            ..Default::default()
        }
    }

    pub fn object() -> Self {
        Self::of(SchemaType::Object)
    }

    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    pub fn boolean() -> Self {
        Self::of(SchemaType::Boolean)
    }

    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(SchemaType::Array)
        }
    }

    /// String schema restricted to a fixed set of values.
    pub fn string_enum<'a>(values: impl IntoIterator<Item = &'a str>) -> Self {
        Self::string().one_of(values.into_iter().map(|v| Value::String(v.to_string())))
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn property(mut self, name: &str, schema: Schema) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    pub fn required(mut self, names: &[&str]) -> Self {
        self.required.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    pub fn min_length(mut self, len: usize) -> Self {
        self.min_length = Some(len);
        self
    }

    pub fn max_length(mut self, len: usize) -> Self {
        self.max_length = Some(len);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn one_of(mut self, values: impl IntoIterator<Item = Value>) -> Self {
        self.enum_values = values.into_iter().collect();
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn example(mut self, value: Value) -> Self {
        self.examples.push(value);
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl Schema {
    /// Validate `input` against this schema.
    ///
    /// Fails with `INVALID_INPUT` tagged with `domain` on the first violation.
    pub fn validate(&self, domain: &str, input: &Value) -> Result<()> {
        self.check("input", input)
            .map_err(|message| AimaError::invalid_input(domain, message))
    }

    fn check(&self, path: &str, value: &Value) -> std::result::Result<(), String> {
        if !self.schema_type.matches(value) {
            return Err(format!(
                "{}: expected {}, got {}",
                path,
                self.schema_type.as_str(),
                json_type_name(value)
            ));
        }

        if !self.enum_values.is_empty() && !self.enum_values.contains(value) {
            let allowed: Vec<String> = self.enum_values.iter().map(|v| v.to_string()).collect();
            return Err(format!("{}: must be one of [{}]", path, allowed.join(", ")));
        }

        match value {
            Value::Number(n) => {
                let n = n.as_f64().unwrap_or_default();
                if let Some(min) = self.min {
                    if n < min {
                        return Err(format!("{}: must be >= {}", path, min));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(format!("{}: must be <= {}", path, max));
                    }
                }
            }
            Value::String(s) => {
                let len = s.chars().count();
                if let Some(min) = self.min_length {
                    if len < min {
                        return Err(format!("{}: length must be >= {}", path, min));
                    }
                }
                if let Some(max) = self.max_length {
                    if len > max {
                        return Err(format!("{}: length must be <= {}", path, max));
                    }
                }
                if let Some(pattern) = &self.pattern {
                    let re = Regex::new(pattern)
                        .map_err(|e| format!("{}: invalid pattern {}: {}", path, pattern, e))?;
                    if !re.is_match(s) {
                        return Err(format!("{}: does not match pattern {}", path, pattern));
                    }
                }
            }
            Value::Array(items) => {
                if let Some(item_schema) = &self.items {
                    for (i, item) in items.iter().enumerate() {
                        item_schema.check(&format!("{}[{}]", path, i), item)?;
                    }
                }
            }
            Value::Object(map) => {
                for name in &self.required {
                    match map.get(name) {
                        None | Some(Value::Null) => {
                            return Err(format!("{} is required", qualify(path, name)));
                        }
                        Some(_) => {}
                    }
                }
                for (name, prop) in &self.properties {
                    match map.get(name) {
                        None | Some(Value::Null) => {}
                        Some(v) => prop.check(&qualify(path, name), v)?,
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }
}

fn qualify(path: &str, name: &str) -> String {
    if path == "input" {
        name.to_string()
    } else {
        format!("{}.{}", path, name)
    }
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
