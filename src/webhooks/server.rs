//! Admission webhook server.
//!
//! Serves `/validate` and `/mutate` over TLS, with the health, info and
//! metrics routes on the same listener. The serving certificate is chosen
//! per handshake by [`CertificateReloader`], so a reloaded certificate is
//! picked up without restarting the listener.
//!
//! Transport violations (unknown path, wrong method, wrong content type,
//! unparseable body) are answered with a plain HTTP error by axum before
//! any admission logic runs. Every decoded review is answered with 200 and
//! the verdict inside the response body.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::decision::deny_with_error;
use super::policies::{AdmissionEngine, WebhookOperation};
use crate::credspec::CredentialSpecStore;
use crate::health::{self, HealthState};
use crate::tls::{self, CertificateError, CertificateReloader};

/// Time given to in-flight requests once shutdown starts
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Shared state for webhook handlers
pub struct WebhookState<S> {
    pub engine: AdmissionEngine<S>,
    pub health: Arc<HealthState>,
}

impl<S: CredentialSpecStore> WebhookState<S> {
    pub fn new(engine: AdmissionEngine<S>, health: Arc<HealthState>) -> Self {
        Self { engine, health }
    }
}

/// Create the webhook router, including the health routes
pub fn create_webhook_router<S: CredentialSpecStore>(state: Arc<WebhookState<S>>) -> Router {
    let health_router = health::create_router(state.health.clone());

    Router::new()
        .route("/validate", post(validate::<S>))
        .route("/mutate", post(mutate::<S>))
        .with_state(state)
        .merge(health_router)
}

async fn validate<S: CredentialSpecStore>(
    State(state): State<Arc<WebhookState<S>>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    handle_review(&state, review, WebhookOperation::Validate).await
}

async fn mutate<S: CredentialSpecStore>(
    State(state): State<Arc<WebhookState<S>>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    handle_review(&state, review, WebhookOperation::Mutate).await
}

async fn handle_review<S: CredentialSpecStore>(
    state: &WebhookState<S>,
    review: AdmissionReview<DynamicObject>,
    operation: WebhookOperation,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let started = Instant::now();
    debug!(
        uid = %request.uid,
        endpoint = %operation,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    let response = match state.engine.evaluate(&request, operation).await {
        Ok(decision) => decision.into_admission_response(AdmissionResponse::from(&request)),
        Err(e) => Err(e),
    };

    let response = match response {
        Ok(response) => {
            info!(
                uid = %request.uid,
                endpoint = %operation,
                allowed = response.allowed,
                "Admission request answered"
            );
            response
        }
        Err(e) => {
            let workload = e.workload();
            info!(
                uid = %request.uid,
                endpoint = %operation,
                code = e.status_code(),
                reason = e.reason(),
                message = %e,
                pod = workload.map(|w| w.name.as_str()),
                namespace = workload.and_then(|w| w.namespace.as_deref()),
                service_account = workload.map(|w| w.service_account.as_str()),
                "Admission request denied"
            );
            deny_with_error(AdmissionResponse::from(&request), &e)
        }
    };

    state.health.metrics.record_admission(
        operation.as_str(),
        response.allowed,
        started.elapsed().as_secs_f64(),
    );

    (StatusCode::OK, Json(response.into_review()))
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[from] CertificateError),

    #[error("Webhook server error: {0}")]
    Server(#[from] std::io::Error),
}

/// Run the webhook server with TLS until `shutdown` is cancelled.
///
/// Binds to `0.0.0.0:<port>`. In-flight requests get a short grace period
/// once shutdown starts.
pub async fn run_webhook_server<S: CredentialSpecStore>(
    state: Arc<WebhookState<S>>,
    reloader: Arc<CertificateReloader>,
    port: u16,
    shutdown: CancellationToken,
) -> Result<(), WebhookError> {
    let app = create_webhook_router(state);
    let config = RustlsConfig::from_config(Arc::new(tls::server_config(reloader)?));

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown.cancelled().await;
            info!("Shutting down webhook server");
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
        }
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "Webhook server listening with TLS");

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await?;

    info!("Webhook server stopped");
    Ok(())
}
