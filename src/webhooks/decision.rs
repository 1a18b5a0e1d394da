//! Admission decisions and the patches they carry.

use json_patch::{AddOperation, Patch, PatchOperation};
use jsonptr::PointerBuf;
use kube::core::admission::AdmissionResponse;
use serde_json::Value;

use super::error::AdmissionError;

/// A JSON Patch `add` operation inlining a string value at `path`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatchOp {
    pub path: PointerBuf,
    pub value: String,
}

impl PatchOp {
    pub fn add(path: PointerBuf, value: impl Into<String>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }

    fn into_operation(self) -> PatchOperation {
        PatchOperation::Add(AddOperation {
            path: self.path,
            value: Value::String(self.value),
        })
    }
}

/// An admitted request and the patches to apply to it.
///
/// Rejections never produce a `Decision`; policies return an
/// [`AdmissionError`] instead, rendered by [`deny_with_error`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Decision {
    /// Patches to apply, in the order they were produced
    pub patches: Vec<PatchOp>,
}

impl Decision {
    /// An allowed decision without patches
    pub fn allowed() -> Self {
        Self::default()
    }

    pub fn with_patches(mut self, patches: Vec<PatchOp>) -> Self {
        self.patches = patches;
        self
    }

    /// Fold this decision into the response for the originating request.
    ///
    /// An empty patch list leaves the response without a patch.
    pub fn into_admission_response(
        self,
        response: AdmissionResponse,
    ) -> Result<AdmissionResponse, AdmissionError> {
        if self.patches.is_empty() {
            return Ok(response);
        }

        let patch = Patch(
            self.patches
                .into_iter()
                .map(PatchOp::into_operation)
                .collect(),
        );
        response
            .with_patch(patch)
            .map_err(|e| AdmissionError::internal(format!("unable to marshal JSON patch: {}", e)))
    }
}

/// Build the denial response for an admission error
pub fn deny_with_error(response: AdmissionResponse, err: &AdmissionError) -> AdmissionResponse {
    let mut response = response.deny(err.to_string());
    response.result.code = err.status_code();
    response.result.reason = err.reason().to_string();
    response
}
