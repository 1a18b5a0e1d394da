//! Admission errors.
//!
//! Every failed evaluation produces an [`AdmissionError`]. The server encodes
//! it inside the admission review (`allowed: false` plus status code and
//! message) so the API server always receives a structured verdict.

use axum::http::StatusCode;
use thiserror::Error;

use crate::credspec::CredentialSpecError;
use crate::workload::Workload;

/// Error type for admission evaluation.
///
/// The attached workload is only used for logging and is never serialized
/// back to the caller.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// Malformed request, wrong object kind or unsupported operation
    #[error("{message}")]
    BadRequest {
        message: String,
        workload: Option<Box<Workload>>,
    },

    /// Authorization denied or immutable field changed
    #[error("{message}")]
    Forbidden {
        message: String,
        workload: Option<Box<Workload>>,
    },

    /// Credential spec assignment is inconsistent
    #[error("{message}")]
    UnprocessableContent {
        message: String,
        workload: Option<Box<Workload>>,
    },

    /// Referenced credential spec does not exist
    #[error("{message}")]
    NotFound {
        message: String,
        workload: Option<Box<Workload>>,
    },

    /// Store or serialization failure
    #[error("{message}")]
    InternalError {
        message: String,
        code: u16,
        workload: Option<Box<Workload>>,
    },
}

impl AdmissionError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        AdmissionError::BadRequest {
            message: message.into(),
            workload: None,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        AdmissionError::Forbidden {
            message: message.into(),
            workload: None,
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        AdmissionError::UnprocessableContent {
            message: message.into(),
            workload: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AdmissionError::NotFound {
            message: message.into(),
            workload: None,
        }
    }

    /// Internal error answered with a 500 status
    pub fn internal(message: impl Into<String>) -> Self {
        AdmissionError::InternalError {
            message: message.into(),
            code: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            workload: None,
        }
    }

    /// Attach the offending workload for logging
    pub fn with_workload(mut self, workload: &Workload) -> Self {
        *self.workload_slot() = Some(Box::new(workload.clone()));
        self
    }

    fn workload_slot(&mut self) -> &mut Option<Box<Workload>> {
        match self {
            AdmissionError::BadRequest { workload, .. }
            | AdmissionError::Forbidden { workload, .. }
            | AdmissionError::UnprocessableContent { workload, .. }
            | AdmissionError::NotFound { workload, .. }
            | AdmissionError::InternalError { workload, .. } => workload,
        }
    }

    /// The workload being evaluated when the error occurred, if known
    pub fn workload(&self) -> Option<&Workload> {
        match self {
            AdmissionError::BadRequest { workload, .. }
            | AdmissionError::Forbidden { workload, .. }
            | AdmissionError::UnprocessableContent { workload, .. }
            | AdmissionError::NotFound { workload, .. }
            | AdmissionError::InternalError { workload, .. } => workload.as_deref(),
        }
    }

    /// HTTP status code reported inside the admission response
    pub fn status_code(&self) -> u16 {
        match self {
            AdmissionError::BadRequest { .. } => StatusCode::BAD_REQUEST.as_u16(),
            AdmissionError::Forbidden { .. } => StatusCode::FORBIDDEN.as_u16(),
            AdmissionError::UnprocessableContent { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY.as_u16()
            }
            AdmissionError::NotFound { .. } => StatusCode::NOT_FOUND.as_u16(),
            AdmissionError::InternalError { code, .. } => *code,
        }
    }

    /// Machine-readable reason reported alongside the message
    pub fn reason(&self) -> &'static str {
        match self {
            AdmissionError::BadRequest { .. } => "BadRequest",
            AdmissionError::Forbidden { .. } => "Forbidden",
            AdmissionError::UnprocessableContent { .. } => "Invalid",
            AdmissionError::NotFound { .. } => "NotFound",
            AdmissionError::InternalError { .. } => "InternalError",
        }
    }
}

impl From<CredentialSpecError> for AdmissionError {
    fn from(err: CredentialSpecError) -> Self {
        match err {
            CredentialSpecError::NotFound { .. } => AdmissionError::not_found(err.to_string()),
            CredentialSpecError::MissingContents { .. } | CredentialSpecError::Unavailable { .. } => {
                AdmissionError::InternalError {
                    code: err.status_code(),
                    message: err.to_string(),
                    workload: None,
                }
            }
        }
    }
}
