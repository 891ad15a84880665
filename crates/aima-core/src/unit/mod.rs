//! The unit abstraction: commands, queries and resources.
//!
//! Every operation the control plane offers is a named, schema-described
//! unit. Commands mutate state, queries read it, and resources are
//! URI-addressed read-only entities (`asms://<domain>/<resource>[/<id>]`).
//!
//! Inputs cross the gateway as JSON values; each unit decodes them into a
//! typed struct with [`decode_input`] before doing any work.

mod resource;

pub use resource::{watch_resource, Resource, ResourceFactory, ResourceUpdate, UpdateOperation};

use crate::cancel::CancellationToken;
use crate::error::{AimaError, Result};
use crate::schema::Schema;
use async_trait::async_trait;
use serde::de::{DeserializeOwned, Deserializer, Error as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of a registered unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Command,
    Query,
    Resource,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnitKind::Command => "command",
            UnitKind::Query => "query",
            UnitKind::Resource => "resource",
        };
        write!(f, "{}", s)
    }
}

/// Worked example attached to a unit for documentation and tool exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub description: String,
    pub input: Value,
    pub output: Value,
}

impl Example {
    pub fn new(description: &str, input: Value, output: Value) -> Self {
        Self {
            description: description.to_string(),
            input,
            output,
        }
    }
}

/// Per-request context handed to every unit.
#[derive(Debug, Clone)]
pub struct UnitContext {
    /// Request id, also used as event correlation id.
    pub request_id: String,
    /// Cancelled when the caller goes away or the gateway timeout fires.
    pub cancel: CancellationToken,
}

impl UnitContext {
    pub fn new(request_id: impl Into<String>, cancel: CancellationToken) -> Self {
        Self {
            request_id: request_id.into(),
            cancel,
        }
    }

    /// Context for calls made outside the gateway (bootstrap, tests).
    pub fn detached() -> Self {
        Self::new(crate::gateway::generate_request_id(), CancellationToken::new())
    }
}

/// Descriptor surface shared by commands and queries.
pub trait UnitDescriptor: Send + Sync {
    /// Fully qualified dotted name, e.g. `model.pull`.
    fn name(&self) -> &str;

    fn domain(&self) -> &str;

    fn description(&self) -> &str;

    fn input_schema(&self) -> Schema;

    fn output_schema(&self) -> Schema;

    fn examples(&self) -> Vec<Example> {
        Vec::new()
    }
}

/// Side-effecting unit.
#[async_trait]
pub trait Command: UnitDescriptor {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value>;
}

/// Read-only unit. Must not mutate any store.
#[async_trait]
pub trait Query: UnitDescriptor {
    async fn execute(&self, ctx: &UnitContext, input: Value) -> Result<Value>;
}

/// Introspection record for a registered unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitInfo {
    pub kind: UnitKind,
    pub name: String,
    pub domain: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Example>,
}

impl UnitInfo {
    pub fn describe(kind: UnitKind, unit: &dyn UnitDescriptor) -> Self {
        Self {
            kind,
            name: unit.name().to_string(),
            domain: unit.domain().to_string(),
            description: unit.description().to_string(),
            input_schema: unit.input_schema(),
            output_schema: unit.output_schema(),
            examples: unit.examples(),
        }
    }
}

/// Decode a unit's JSON input into its typed input struct.
///
/// A `null` input decodes as an empty object so units whose fields are all
/// optional accept a missing payload.
pub fn decode_input<T: DeserializeOwned>(domain: &str, input: Value) -> Result<T> {
    let input = match input {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(input).map_err(|e| AimaError::invalid_input(domain, e.to_string()))
}

/// `deserialize_with` helper for optional integer inputs.
///
/// Schemas describe these fields as plain numbers, so `24.0` is accepted and
/// any fraction is truncated.
pub fn lenient_int<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let int = match (number.as_i64(), number.as_f64()) {
        (Some(i), _) => i,
        (None, Some(f)) if f.is_finite() && f.abs() < i64::MAX as f64 => f.trunc() as i64,
        _ => return Err(D::Error::custom(format!("number out of range: {}", number))),
    };
    T::try_from(int)
        .map(Some)
        .map_err(|_| D::Error::custom(format!("number out of range: {}", number)))
}

/// Reject an empty required string field.
pub fn require_non_empty(domain: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AimaError::invalid_input(
            domain,
            format!("{} is required", field),
        ));
    }
    Ok(())
}

/// Serialize a unit output.
pub fn to_output<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Input {
        name: String,
        #[serde(default)]
        limit: Option<usize>,
    }

    #[test]
    fn test_decode_input_typed() {
        let input: Input = decode_input("model", json!({"name": "x", "limit": 3, "other": true})).unwrap();
        assert_eq!(input.name, "x");
        assert_eq!(input.limit, Some(3));
    }

    #[test]
    fn test_decode_input_type_error_is_invalid_input() {
        let err = decode_input::<Input>("model", json!({"name": 5})).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
        assert_eq!(err.domain(), Some("model"));
    }

    #[test]
    fn test_decode_null_as_empty_object() {
        #[derive(Deserialize)]
        struct AllOptional {
            #[serde(default)]
            limit: Option<usize>,
        }
        let input: AllOptional = decode_input("model", Value::Null).unwrap();
        assert!(input.limit.is_none());
    }

    #[test]
    fn test_lenient_int_accepts_integral_floats() {
        #[derive(Debug, Deserialize)]
        struct Paging {
            #[serde(default, deserialize_with = "lenient_int")]
            limit: Option<usize>,
            #[serde(default, deserialize_with = "lenient_int")]
            vram: Option<u32>,
        }
        let input: Paging = decode_input("model", json!({"limit": 10.0, "vram": 23.9})).unwrap();
        assert_eq!(input.limit, Some(10));
        assert_eq!(input.vram, Some(23));

        let input: Paging = decode_input("model", json!({"limit": null})).unwrap();
        assert!(input.limit.is_none() && input.vram.is_none());

        let err = decode_input::<Paging>("model", json!({"limit": -1})).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
        assert!(decode_input::<Paging>("model", json!({"limit": "10"})).is_err());
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("catalog", "name", "r1").is_ok());
        let err = require_non_empty("catalog", "name", "  ").unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: name is required");
    }
}
