use thiserror::Error;

use crate::database::errors::DatabaseError;

/// The error taxonomy shared by the control plane and the ingestion
/// pipeline. Each variant carries the semantics needed to decide an HTTP
/// status or a delivery-retry policy at the boundary that owns that
/// decision; this crate itself stays transport-agnostic.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("forbidden")]
    Forbidden,

    #[error("webhook delivery failed: {0}")]
    WebhookFailure(String),

    #[error("transient error, retry: {0}")]
    Transient(String),
}

impl From<DatabaseError> for CoreError {
    fn from(value: DatabaseError) -> Self {
        match value {
            | DatabaseError::NotFound => CoreError::NotFound,
            | DatabaseError::DuplicateRecord => {
                CoreError::AlreadyExists("duplicate record".to_string())
            }
            | DatabaseError::Parse(e) => CoreError::Validation(e.to_string()),
            | DatabaseError::Db(e) => CoreError::Transient(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(value: serde_json::Error) -> Self {
        CoreError::Validation(value.to_string())
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(value: validator::ValidationErrors) -> Self {
        CoreError::Validation(value.to_string())
    }
}

impl From<crate::access::AccessError> for CoreError {
    fn from(value: crate::access::AccessError) -> Self {
        CoreError::Transient(value.to_string())
    }
}
