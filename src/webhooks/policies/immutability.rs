//! Immutability policy for UPDATE operations.
//!
//! Credential spec settings are fixed at creation time. Both the name and
//! the contents of every resource must be identical between the old and
//! the new pod.

use crate::webhooks::decision::Decision;
use crate::webhooks::error::AdmissionError;
use crate::workload::{CredentialAssignment, ResourceKind, Workload};

/// Reject any change to a credential spec name or contents.
///
/// Containers are matched by name; a container absent from the old pod is
/// compared against an empty assignment.
pub fn evaluate_update(workload: &Workload, old: &Workload) -> Result<Decision, AdmissionError> {
    let empty = CredentialAssignment::default();

    for (resource, assignment) in workload.resources() {
        let previous = match &resource {
            ResourceKind::Workload { .. } => &old.assignment,
            ResourceKind::Container { name, .. } => {
                old.container_assignment(name).unwrap_or(&empty)
            }
        };

        let modified = modified_fields(previous, assignment);
        if !modified.is_empty() {
            return Err(AdmissionError::forbidden(format!(
                "cannot update an existing pod's credential spec settings (credential spec {} modified on {})",
                modified.join(" and "),
                resource
            ))
            .with_workload(workload));
        }
    }

    Ok(Decision::allowed())
}

fn modified_fields(old: &CredentialAssignment, new: &CredentialAssignment) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if old.name != new.name {
        fields.push("name");
    }
    if old.contents != new.contents {
        fields.push("contents");
    }
    fields
}
