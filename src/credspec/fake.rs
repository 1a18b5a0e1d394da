//! Deterministic in-memory credential spec store.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{Authorization, CredentialSpecError, CredentialSpecStore};

/// In-memory store for tests and local runs.
///
/// Every subject is authorized unless explicitly denied. Calls are recorded
/// in order so callers can assert on what was (and was not) queried.
#[derive(Debug, Default)]
pub struct FakeCredentialSpecStore {
    specs: HashMap<String, String>,
    denials: HashMap<(String, String, String), String>,
    missing_contents: HashSet<String>,
    unavailable: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
}

impl FakeCredentialSpecStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a credential spec with its canonical contents
    pub fn with_spec(mut self, name: impl Into<String>, contents: impl Into<String>) -> Self {
        self.specs.insert(name.into(), contents.into());
        self
    }

    /// Deny `service_account` in `namespace` the use of credential spec `name`
    pub fn deny(
        mut self,
        service_account: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.denials.insert(
            (service_account.into(), namespace.into(), name.into()),
            reason.into(),
        );
        self
    }

    /// Register a credential spec that exists but has no contents
    pub fn with_missing_contents(mut self, name: impl Into<String>) -> Self {
        self.missing_contents.insert(name.into());
        self
    }

    /// Make retrieval of credential spec `name` fail as if the API server were unreachable
    pub fn with_unavailable(mut self, name: impl Into<String>, reason: impl Into<String>) -> Self {
        self.unavailable.insert(name.into(), reason.into());
        self
    }

    /// Calls made so far, formatted as `authorize:<sa>/<ns>/<name>` or `fetch:<name>`
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl CredentialSpecStore for FakeCredentialSpecStore {
    async fn is_authorized(
        &self,
        service_account: &str,
        namespace: &str,
        name: &str,
    ) -> Authorization {
        self.record(format!("authorize:{}/{}/{}", service_account, namespace, name));

        let key = (
            service_account.to_string(),
            namespace.to_string(),
            name.to_string(),
        );
        match self.denials.get(&key) {
            Some(reason) => Authorization::denied(reason.clone()),
            None => Authorization::allowed(),
        }
    }

    async fn fetch_contents(&self, name: &str) -> Result<String, CredentialSpecError> {
        self.record(format!("fetch:{}", name));

        if let Some(reason) = self.unavailable.get(name) {
            return Err(CredentialSpecError::Unavailable {
                name: name.to_string(),
                reason: reason.clone(),
            });
        }
        if self.missing_contents.contains(name) {
            return Err(CredentialSpecError::MissingContents {
                name: name.to_string(),
            });
        }
        self.specs
            .get(name)
            .cloned()
            .ok_or_else(|| CredentialSpecError::NotFound {
                name: name.to_string(),
            })
    }
}
