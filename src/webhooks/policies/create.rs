//! Credential spec policy for CREATE operations.
//!
//! For every resource naming a credential spec:
//! - the pod's service account must be authorized to `use` it
//! - inlined contents must match the credential spec's canonical contents
//! - when mutating, missing contents are inlined with a JSON patch
//!
//! Resources are evaluated workload first, then containers in order, and
//! evaluation stops at the first failure.

use jsonptr::PointerBuf;
use rand::seq::SliceRandom;
use serde_json::Value;

use super::{AdmissionEngine, WebhookOperation};
use crate::credspec::CredentialSpecStore;
use crate::webhooks::decision::{Decision, PatchOp};
use crate::webhooks::error::AdmissionError;
use crate::workload::Workload;

/// Length of generated hostnames (NetBIOS computer name limit)
pub const RANDOM_HOSTNAME_LENGTH: usize = 15;

const HOSTNAME_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

impl<S: CredentialSpecStore> AdmissionEngine<S> {
    /// Evaluate a CREATE request for `workload` in `namespace`.
    pub async fn evaluate_create(
        &self,
        workload: &Workload,
        namespace: &str,
        operation: WebhookOperation,
    ) -> Result<Decision, AdmissionError> {
        let mut patches = Vec::new();

        for (resource, assignment) in workload.resources() {
            let Some(name) = assignment.name.as_deref() else {
                if assignment.contents.is_some() {
                    return Err(AdmissionError::unprocessable(format!(
                        "{} has credential spec contents set but no name",
                        resource
                    ))
                    .with_workload(workload));
                }
                continue;
            };

            // authorize before touching contents so denials never echo them
            let authorization = self
                .store
                .is_authorized(&workload.service_account, namespace, name)
                .await;
            if !authorization.allowed {
                let mut message = format!(
                    "service account {:?} is not authorized to `use` credential spec {:?}",
                    workload.service_account, name
                );
                if !authorization.reason.is_empty() {
                    message.push_str(&format!(", reason: {:?}", authorization.reason));
                }
                return Err(AdmissionError::forbidden(message).with_workload(workload));
            }

            match (assignment.contents.as_deref(), operation) {
                (Some(contents), _) => {
                    let expected = self
                        .store
                        .fetch_contents(name)
                        .await
                        .map_err(|e| AdmissionError::from(e).with_workload(workload))?;

                    match contents_match(contents, &expected) {
                        Ok(true) => {}
                        Ok(false) => {
                            return Err(AdmissionError::unprocessable(format!(
                                "the credential spec contents for {} do not match the contents of credential spec resource {:?}",
                                resource, name
                            ))
                            .with_workload(workload));
                        }
                        Err(e) => {
                            return Err(AdmissionError::unprocessable(format!(
                                "the credential spec contents for {} do not match the contents of credential spec resource {:?}: {}",
                                resource, name, e
                            ))
                            .with_workload(workload));
                        }
                    }
                }
                (None, WebhookOperation::Mutate) => {
                    let contents = self
                        .store
                        .fetch_contents(name)
                        .await
                        .map_err(|e| AdmissionError::from(e).with_workload(workload))?;
                    patches.push(PatchOp::add(resource.contents_path(), contents));
                }
                (None, WebhookOperation::Validate) => {}
            }
        }

        if operation == WebhookOperation::Mutate && self.options.random_hostname {
            if let Some(patch) = random_hostname_patch(workload) {
                patches.push(patch);
            }
        }

        Ok(Decision::allowed().with_patches(patches))
    }
}

/// Compare inlined contents with the canonical contents of a credential spec.
///
/// Identical strings match without parsing. Otherwise both sides must parse
/// as JSON and are compared by value, so object key order is irrelevant.
/// Numbers compare by representation: `1` and `1.0` differ.
pub fn contents_match(from_resource: &str, from_store: &str) -> Result<bool, String> {
    if from_resource == from_store {
        return Ok(true);
    }

    let given: Value = serde_json::from_str(from_resource)
        .map_err(|e| format!("unable to parse {:?} as JSON: {}", from_resource, e))?;
    let expected: Value = serde_json::from_str(from_store)
        .map_err(|e| format!("unable to parse credential spec {:?} as JSON: {}", from_store, e))?;

    Ok(given == expected)
}

/// Hostname patch for pods using a credential spec without their own hostname
fn random_hostname_patch(workload: &Workload) -> Option<PatchOp> {
    if !workload.references_credential_spec()
        || workload.host_network
        || workload.hostname.is_some()
    {
        return None;
    }

    Some(PatchOp::add(
        PointerBuf::from_tokens(["spec", "hostname"]),
        random_hostname(),
    ))
}

/// Random lowercase alphanumeric hostname of [`RANDOM_HOSTNAME_LENGTH`] characters
pub fn random_hostname() -> String {
    let mut rng = rand::thread_rng();
    (0..RANDOM_HOSTNAME_LENGTH)
        .filter_map(|_| HOSTNAME_CHARSET.choose(&mut rng))
        .map(|b| char::from(*b))
        .collect()
}
