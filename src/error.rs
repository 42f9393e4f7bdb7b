//! Error taxonomy shared by every service, plugin and the router.

use serde_json::{json, Value};
use thiserror::Error;

use crate::store::StoreError;

/// Result alias used across the request pipeline.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors a service or plugin can raise while handling a request.
///
/// Every variant except `Internal` is safe to show to the client; `Internal`
/// is logged and rendered as a generic message.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or unsupported request shape.
    #[error("{0}")]
    Request(String),
    /// No authenticated user where one is required.
    #[error("{0}")]
    Authorization(String),
    /// Authenticated but forbidden, or bad credentials.
    #[error("{0}")]
    Credential(String),
    /// Missing collection or record.
    #[error("{0}")]
    NotFound(String),
    /// Duplicate unique identity.
    #[error("{0}")]
    Conflict(String),
    /// Anything the service code did not anticipate.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn request() -> Self {
        ServiceError::Request("Request error".into())
    }

    pub fn unauthorized() -> Self {
        ServiceError::Authorization("Unauthorized".into())
    }

    pub fn forbidden() -> Self {
        ServiceError::Credential("Forbidden".into())
    }

    pub fn not_found() -> Self {
        ServiceError::NotFound("Resource not found".into())
    }

    pub fn conflict() -> Self {
        ServiceError::Conflict("Resource conflict".into())
    }

    /// Map this error to its HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Request(_) => 400,
            ServiceError::Authorization(_) => 401,
            ServiceError::Credential(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::Internal(_) => 500,
        }
    }

    /// Message safe to put on the wire.
    pub fn public_message(&self) -> String {
        match self {
            ServiceError::Internal(_) => "Server Error".to_string(),
            other => other.to_string(),
        }
    }

    /// The `{code, message}` envelope written for failed requests.
    pub fn to_body(&self) -> Value {
        error_body(self.status_code(), &self.public_message())
    }
}

/// Build the `{code, message}` error envelope.
pub fn error_body(code: u16, message: &str) -> Value {
    json!({ "code": code, "message": message })
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::CollectionNotFound(_) | StoreError::EntryNotFound(_) => {
                ServiceError::NotFound(err.to_string())
            }
            StoreError::LockPoisoned(_) => ServiceError::Internal(err.to_string()),
        }
    }
}
