//! Pluggable request authentication.

use super::Request;
use crate::error::{AimaError, Result};

/// Hook consulted by the gateway before dispatching a request.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, request: &Request) -> Result<()>;
}

/// Accepts requests whose credentials equal a configured token.
#[derive(Clone)]
pub struct StaticTokenAuthenticator {
    token: String,
}

impl StaticTokenAuthenticator {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<()> {
        match request.credentials.as_deref() {
            Some(provided) if provided == self.token => Ok(()),
            Some(_) => Err(AimaError::Unauthorized {
                message: "invalid credentials".to_string(),
            }),
            None => Err(AimaError::Unauthorized {
                message: "credentials required".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_static_token() {
        let auth = StaticTokenAuthenticator::new("s3cret");
        let req = Request::query("model.list", Value::Null);

        assert_eq!(auth.authenticate(&req).unwrap_err().code(), "UNAUTHORIZED");
        assert!(auth
            .authenticate(&req.clone().with_credentials("wrong"))
            .is_err());
        assert!(auth.authenticate(&req.with_credentials("s3cret")).is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let auth = StaticTokenAuthenticator::new("s3cret");
        assert!(!format!("{:?}", auth).contains("s3cret"));
    }
}
