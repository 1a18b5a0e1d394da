//! Admission webhooks for credential spec assignment.
//!
//! - `/validate` rejects unauthorized or inconsistent credential spec use,
//!   and any change to credential spec settings on update
//! - `/mutate` additionally inlines the canonical contents of named
//!   credential specs and can assign random hostnames

pub mod decision;
pub mod error;
pub mod policies;
mod server;

pub use decision::{Decision, PatchOp};
pub use error::AdmissionError;
pub use policies::{AdmissionEngine, EngineOptions, WebhookOperation};
pub use server::{WebhookError, WebhookState, create_webhook_router, run_webhook_server};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
