//! gmsa-webhook library crate
//!
//! Admission webhook enforcing authorized, consistent assignment of GMSA
//! credential specs to pods, served over a hot-reloadable TLS certificate.

pub mod config;
pub mod credspec;
pub mod health;
pub mod tls;
pub mod webhooks;
pub mod workload;

pub use config::Config;
pub use credspec::{CredentialSpecStore, FakeCredentialSpecStore, KubeCredentialSpecStore};
pub use health::HealthState;
pub use tls::{CertificateReloader, watch_certificate_files};
pub use webhooks::{
    AdmissionEngine, EngineOptions, WebhookError, WebhookState, create_webhook_router,
    run_webhook_server,
};
