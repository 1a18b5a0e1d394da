//! Access to credential spec resources.
//!
//! The admission policies only need two things from the cluster: whether a
//! service account may `use` a named credential spec, and the canonical
//! contents of that credential spec. [`CredentialSpecStore`] captures those
//! two calls so the policies can run against the real API server
//! ([`KubeCredentialSpecStore`]) or an in-memory fake ([`FakeCredentialSpecStore`]).

mod cluster;
mod fake;

use std::future::Future;

use axum::http::StatusCode;
use thiserror::Error;

pub use self::cluster::{
    CREDSPEC_CONTENTS_FIELD, CREDSPEC_GROUP, CREDSPEC_KIND, CREDSPEC_PLURAL, CREDSPEC_VERSION,
    KubeCredentialSpecStore,
};
pub use self::fake::FakeCredentialSpecStore;

/// Outcome of an authorization check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Authorization {
    /// Whether the subject may `use` the credential spec
    pub allowed: bool,
    /// Explanation returned by the authorizer (may be empty)
    pub reason: String,
}

impl Authorization {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Errors returned when retrieving credential spec contents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialSpecError {
    /// No credential spec with that name exists
    #[error("credential spec {name} does not exist")]
    NotFound { name: String },

    /// The credential spec exists but carries no contents
    #[error("credential spec {name} does not have a {} key", CREDSPEC_CONTENTS_FIELD)]
    MissingContents { name: String },

    /// The credential spec could not be retrieved or serialized
    #[error("unable to retrieve the contents of credential spec {name}: {reason}")]
    Unavailable { name: String, reason: String },
}

impl CredentialSpecError {
    /// HTTP status code to pass through in the admission response
    pub fn status_code(&self) -> u16 {
        match self {
            CredentialSpecError::NotFound { .. } => StatusCode::NOT_FOUND.as_u16(),
            CredentialSpecError::MissingContents { .. } => StatusCode::EXPECTATION_FAILED.as_u16(),
            CredentialSpecError::Unavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }
}

/// Read-only view of credential spec resources and their authorization.
///
/// Every call is attempted exactly once; callers own any retry policy.
/// Dropping the returned future aborts the underlying request.
pub trait CredentialSpecStore: Send + Sync + 'static {
    /// Check whether `service_account` in `namespace` may `use` credential spec `name`.
    ///
    /// Never fails: a transport error is reported as a denial whose reason
    /// describes the failure.
    fn is_authorized(
        &self,
        service_account: &str,
        namespace: &str,
        name: &str,
    ) -> impl Future<Output = Authorization> + Send;

    /// Fetch the canonical contents of credential spec `name` as a JSON string.
    fn fetch_contents(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<String, CredentialSpecError>> + Send;
}
