//! Credential spec admission policies.
//!
//! Policies are organized by operation:
//! - Create: authorization, contents consistency and (when mutating)
//!   inlining of the canonical contents
//! - Update: credential spec settings are immutable
//!
//! Any other operation, or any object other than a Pod, is a bad request.

pub mod create;
pub mod immutability;

use std::fmt;

use k8s_openapi::api::core::v1::Pod;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, Operation};

use super::decision::Decision;
use super::error::AdmissionError;
use crate::credspec::CredentialSpecStore;
use crate::workload::Workload;

/// Object kind governed by the webhook
const POD_KIND: &str = "Pod";

/// Namespace used when neither the request nor the pod names one
const DEFAULT_NAMESPACE: &str = "default";

/// Which webhook endpoint is evaluating the request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WebhookOperation {
    Validate,
    Mutate,
}

impl WebhookOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOperation::Validate => "validate",
            WebhookOperation::Mutate => "mutate",
        }
    }
}

impl fmt::Display for WebhookOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional behaviors of the engine
#[derive(Clone, Debug, Default)]
pub struct EngineOptions {
    /// Give pods using a credential spec a random hostname when mutating
    pub random_hostname: bool,
}

/// Admission decision engine.
///
/// Holds no per-request state; one engine serves all concurrent requests.
pub struct AdmissionEngine<S> {
    store: S,
    options: EngineOptions,
}

impl<S: CredentialSpecStore> AdmissionEngine<S> {
    pub fn new(store: S) -> Self {
        Self::with_options(store, EngineOptions::default())
    }

    pub fn with_options(store: S, options: EngineOptions) -> Self {
        Self { store, options }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Evaluate a decoded admission request.
    pub async fn evaluate(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        operation: WebhookOperation,
    ) -> Result<Decision, AdmissionError> {
        if request.kind.kind != POD_KIND {
            return Err(AdmissionError::bad_request(format!(
                "expected a Pod object, got a {}",
                request.kind.kind
            )));
        }

        let workload = decode_workload(request.object.as_ref(), "object")?;

        match request.operation {
            Operation::Create => {
                let namespace = request
                    .namespace
                    .as_deref()
                    .filter(|ns| !ns.is_empty())
                    .or(workload.namespace.as_deref())
                    .unwrap_or(DEFAULT_NAMESPACE);
                self.evaluate_create(&workload, namespace, operation).await
            }
            Operation::Update => match operation {
                WebhookOperation::Validate => {
                    let old = decode_workload(request.old_object.as_ref(), "oldObject")?;
                    immutability::evaluate_update(&workload, &old)
                }
                // updates are validated, never mutated
                WebhookOperation::Mutate => Ok(Decision::allowed()),
            },
            ref other => Err(AdmissionError::bad_request(format!(
                "unexpected operation {:?}",
                other
            ))
            .with_workload(&workload)),
        }
    }
}

/// Decode a pod carried in the admission request into a workload
fn decode_workload(object: Option<&DynamicObject>, field: &str) -> Result<Workload, AdmissionError> {
    let object = object.ok_or_else(|| {
        AdmissionError::bad_request(format!("no {} in admission request", field))
    })?;

    let pod: Pod = serde_json::to_value(object)
        .and_then(serde_json::from_value)
        .map_err(|e| {
            AdmissionError::bad_request(format!("unable to unmarshal pod JSON object: {}", e))
        })?;

    Ok(Workload::from(&pod))
}
