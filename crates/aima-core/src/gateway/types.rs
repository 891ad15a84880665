//! Request and response envelopes.

use crate::error::{AimaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of call a request makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Command,
    Query,
    ResourceGet,
}

impl RequestType {
    /// Parse the envelope `type` field. `resource` is accepted as an alias of `resource_get`.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "command" => Ok(RequestType::Command),
            "query" => Ok(RequestType::Query),
            "resource_get" | "resource" => Ok(RequestType::ResourceGet),
            "" => Err(AimaError::InvalidRequest {
                message: "type is required".to_string(),
            }),
            other => Err(AimaError::InvalidRequest {
                message: format!("unsupported request type: {}", other),
            }),
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestType::Command => "command",
            RequestType::Query => "query",
            RequestType::ResourceGet => "resource_get",
        };
        write!(f, "{}", s)
    }
}

/// Request envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type", default)]
    pub request_type: String,
    /// Dotted unit name, or the resource URI for `resource_get`.
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Caller credentials forwarded by the transport (e.g. a bearer token).
    #[serde(skip)]
    pub credentials: Option<String>,
}

impl Request {
    pub fn new(request_type: RequestType, unit: impl Into<String>, input: Value) -> Self {
        Self {
            request_type: request_type.to_string(),
            unit: unit.into(),
            input,
            request_id: None,
            credentials: None,
        }
    }

    pub fn command(unit: impl Into<String>, input: Value) -> Self {
        Self::new(RequestType::Command, unit, input)
    }

    pub fn query(unit: impl Into<String>, input: Value) -> Self {
        Self::new(RequestType::Query, unit, input)
    }

    pub fn resource_get(uri: impl Into<String>) -> Self {
        Self::new(RequestType::ResourceGet, uri, Value::Null)
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }
}

/// Error section of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl From<&AimaError> for ErrorInfo {
    fn from(err: &AimaError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            domain: err.domain().map(str::to_string),
            details: err.details(),
        }
    }
}

/// Response envelope. Every response carries `request_id` and `duration_ms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<ErrorInfo>,
    pub request_id: String,
    pub duration_ms: u64,
}

impl Response {
    pub fn success(request_id: String, data: Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            request_id,
            duration_ms,
        }
    }

    pub fn failure(request_id: String, err: &AimaError, duration_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorInfo::from(err)),
            request_id,
            duration_ms,
        }
    }

    /// Error code of a failed response.
    pub fn error_code(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.code.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_request_type() {
        assert_eq!(RequestType::parse("command").unwrap(), RequestType::Command);
        assert_eq!(
            RequestType::parse("resource").unwrap(),
            RequestType::ResourceGet
        );
        assert_eq!(RequestType::parse("").unwrap_err().code(), "INVALID_REQUEST");
        assert_eq!(
            RequestType::parse("stream").unwrap_err().code(),
            "INVALID_REQUEST"
        );
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: Request = serde_json::from_value(json!({"unit": "model.list"})).unwrap();
        assert_eq!(req.request_type, "");
        assert!(req.input.is_null());
        assert!(req.request_id.is_none());
    }

    #[test]
    fn test_failure_envelope_shape() {
        let err = AimaError::ModelNotFound {
            model_id: "model-1".into(),
        }
        .context("get model");
        let resp = Response::failure("req_1".into(), &err, 3);
        let value = serde_json::to_value(&resp).unwrap();

        assert_eq!(value["success"], false);
        assert!(value["data"].is_null());
        assert_eq!(value["error"]["code"], "MODEL_NOT_FOUND");
        assert_eq!(value["error"]["domain"], "model");
        assert_eq!(value["request_id"], "req_1");
        assert_eq!(value["duration_ms"], 3);
    }

    #[test]
    fn test_success_envelope_shape() {
        let resp = Response::success("req_2".into(), json!({"total": 0}), 1);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(value["success"], true);
        assert!(value["error"].is_null());
        assert_eq!(value["data"]["total"], 0);
    }
}
