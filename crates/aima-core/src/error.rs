//! Error types for the AIMA control plane.
//!
//! Every failure carries a stable string code (`MODEL_NOT_FOUND`, `PULL_IN_PROGRESS`, ...)
//! and, where it belongs to one, a domain tag. Errors can be wrapped with
//! operation context while keeping the root code intact, which is what the
//! gateway reads when it builds a response envelope.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for the AIMA library.
#[derive(Debug, Error)]
pub enum AimaError {
    // Request and input errors
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Domain of the unit that rejected the input, if known
        domain: Option<String>,
        message: String,
    },

    #[error("Invalid model ID: {model_id}")]
    InvalidModelId { model_id: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Lookup errors
    #[error("{kind} not found: {name}")]
    UnitNotFound { kind: String, name: String },

    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    #[error("Model not found: {model_id}")]
    ModelNotFound { model_id: String },

    #[error("Recipe not found: {recipe_id}")]
    RecipeNotFound { recipe_id: String },

    #[error("Service not found: {service_id}")]
    ServiceNotFound { service_id: String },

    // Uniqueness errors
    #[error("Unit already registered: {name}")]
    UnitAlreadyExists { name: String },

    #[error("Model already exists: {model_id}")]
    ModelAlreadyExists { model_id: String },

    #[error("Recipe already exists: {recipe_id}")]
    RecipeAlreadyExists { recipe_id: String },

    #[error("Service already exists: {service_id}")]
    ServiceAlreadyExists { service_id: String },

    #[error("Service already running: {service_id}")]
    ServiceAlreadyRunning { service_id: String },

    // Operation errors
    #[error("Pull already in progress for {key}")]
    PullInProgress { key: String },

    #[error("Pull failed for {repo}: {message}")]
    PullFailed { repo: String, message: String },

    #[error("Verification failed for {model_id}: {message}")]
    VerifyFailed { model_id: String, message: String },

    #[error("Import failed for {path}: {message}")]
    ImportFailed { path: String, message: String },

    #[error("Failed to apply recipe {recipe_id}: {message}")]
    RecipeApplyFailed { recipe_id: String, message: String },

    #[error("Provider not set for {domain}")]
    ProviderNotSet { domain: String },

    #[error("Resource does not support watching: {uri}")]
    WatchNotSupported { uri: String },

    // Control errors
    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limit exceeded; retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    // Infrastructure errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// HTTP status returned by the remote side, if any
        status: Option<u16>,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("YAML error: {message}")]
    Yaml { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    /// Operation context wrapped around a lower-level error.
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<AimaError>,
    },
}

/// Result type alias for AIMA operations.
pub type Result<T> = std::result::Result<T, AimaError>;

// Conversion implementations for common error types

impl From<std::io::Error> for AimaError {
    fn from(err: std::io::Error) -> Self {
        AimaError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for AimaError {
    fn from(err: serde_json::Error) -> Self {
        AimaError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_yaml::Error> for AimaError {
    fn from(err: serde_yaml::Error) -> Self {
        AimaError::Yaml {
            message: err.to_string(),
        }
    }
}

impl From<rusqlite::Error> for AimaError {
    fn from(err: rusqlite::Error) -> Self {
        AimaError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for AimaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AimaError::Timeout(Duration::from_secs(0))
        } else {
            AimaError::Network {
                message: err.to_string(),
                status: err.status().map(|s| s.as_u16()),
            }
        }
    }
}

impl AimaError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        AimaError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create an input error tagged with the rejecting domain.
    pub fn invalid_input(domain: &str, message: impl Into<String>) -> Self {
        AimaError::InvalidInput {
            domain: Some(domain.to_string()),
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        AimaError::Internal {
            message: message.into(),
        }
    }

    /// Wrap this error with operation context.
    pub fn context(self, context: impl Into<String>) -> Self {
        AimaError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AimaError {
        match self {
            AimaError::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stable error code of the root error.
    pub fn code(&self) -> &'static str {
        match self.root() {
            AimaError::InvalidRequest { .. } => "INVALID_REQUEST",
            AimaError::InvalidInput { .. } => "INVALID_INPUT",
            AimaError::InvalidModelId { .. } => "INVALID_MODEL_ID",
            AimaError::Unauthorized { .. } => "UNAUTHORIZED",
            AimaError::UnitNotFound { .. } => "UNIT_NOT_FOUND",
            AimaError::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            AimaError::ModelNotFound { .. } => "MODEL_NOT_FOUND",
            AimaError::RecipeNotFound { .. } => "RECIPE_NOT_FOUND",
            AimaError::ServiceNotFound { .. } => "SERVICE_NOT_FOUND",
            AimaError::UnitAlreadyExists { .. } => "UNIT_ALREADY_EXISTS",
            AimaError::ModelAlreadyExists { .. } => "MODEL_ALREADY_EXISTS",
            AimaError::RecipeAlreadyExists { .. } => "RECIPE_ALREADY_EXISTS",
            AimaError::ServiceAlreadyExists { .. } => "SERVICE_ALREADY_EXISTS",
            AimaError::ServiceAlreadyRunning { .. } => "SERVICE_ALREADY_RUNNING",
            AimaError::PullInProgress { .. } => "PULL_IN_PROGRESS",
            AimaError::PullFailed { .. } => "MODEL_PULL_FAILED",
            AimaError::VerifyFailed { .. } => "MODEL_VERIFY_FAILED",
            AimaError::ImportFailed { .. } => "MODEL_IMPORT_FAILED",
            AimaError::RecipeApplyFailed { .. } => "RECIPE_APPLY_FAILED",
            AimaError::ProviderNotSet { .. } => "PROVIDER_NOT_SET",
            AimaError::WatchNotSupported { .. } => "WATCH_NOT_SUPPORTED",
            AimaError::Cancelled => "CANCELLED",
            AimaError::Timeout(_) => "TIMEOUT",
            AimaError::RateLimited { .. } => "RATE_LIMITED",
            AimaError::Network { .. } => "NETWORK_ERROR",
            AimaError::Database { .. }
            | AimaError::Io { .. }
            | AimaError::Json { .. }
            | AimaError::Yaml { .. }
            | AimaError::Internal { .. }
            | AimaError::Context { .. } => "INTERNAL_ERROR",
        }
    }

    /// Domain tag of the root error, if it belongs to one.
    pub fn domain(&self) -> Option<&str> {
        match self.root() {
            AimaError::InvalidInput { domain, .. } => domain.as_deref(),
            AimaError::ProviderNotSet { domain } => Some(domain.as_str()),
            AimaError::InvalidModelId { .. }
            | AimaError::ModelNotFound { .. }
            | AimaError::ModelAlreadyExists { .. }
            | AimaError::PullInProgress { .. }
            | AimaError::PullFailed { .. }
            | AimaError::VerifyFailed { .. }
            | AimaError::ImportFailed { .. } => Some("model"),
            AimaError::RecipeNotFound { .. }
            | AimaError::RecipeAlreadyExists { .. }
            | AimaError::RecipeApplyFailed { .. } => Some("catalog"),
            AimaError::ServiceNotFound { .. }
            | AimaError::ServiceAlreadyExists { .. }
            | AimaError::ServiceAlreadyRunning { .. } => Some("service"),
            _ => None,
        }
    }

    /// Structured details for the response envelope.
    pub fn details(&self) -> Option<Value> {
        match self.root() {
            AimaError::UnitNotFound { kind, name } => Some(json!({"kind": kind, "name": name})),
            AimaError::PullInProgress { key } => Some(json!({"key": key})),
            AimaError::Timeout(d) => Some(json!({"timeout_ms": d.as_millis() as u64})),
            AimaError::RateLimited { retry_after } => {
                Some(json!({"retry_after_ms": retry_after.as_millis() as u64}))
            }
            AimaError::Network {
                status: Some(status),
                ..
            } => Some(json!({"status": status})),
            AimaError::Io {
                path: Some(path), ..
            } => Some(json!({"path": path.display().to_string()})),
            _ => None,
        }
    }

    /// HTTP status the server uses for this error.
    pub fn http_status(&self) -> u16 {
        http_status_for_code(self.code())
    }
}

/// HTTP status for a stable error code.
pub fn http_status_for_code(code: &str) -> u16 {
    match code {
        "INVALID_REQUEST" | "INVALID_INPUT" | "INVALID_MODEL_ID" | "WATCH_NOT_SUPPORTED" => 400,
        "UNAUTHORIZED" => 401,
        "UNIT_NOT_FOUND" | "RESOURCE_NOT_FOUND" | "MODEL_NOT_FOUND" | "RECIPE_NOT_FOUND"
        | "SERVICE_NOT_FOUND" => 404,
        "TIMEOUT" => 408,
        "UNIT_ALREADY_EXISTS"
        | "MODEL_ALREADY_EXISTS"
        | "RECIPE_ALREADY_EXISTS"
        | "SERVICE_ALREADY_EXISTS"
        | "SERVICE_ALREADY_RUNNING"
        | "PULL_IN_PROGRESS" => 409,
        "RATE_LIMITED" => 429,
        "CANCELLED" => 499,
        "NETWORK_ERROR" => 502,
        _ => 500,
    }
}

/// Attach operation context to a fallible result.
pub trait ResultExt<T> {
    /// Wrap the error with a fixed context string.
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Wrap the error with a lazily built context string.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.context(f()))
    }
}
