//! Health, info and Prometheus metrics endpoints.
//!
//! Provides:
//! - `/health` - Liveness probe (204 No Content while the server is up)
//! - `/info` - Build information as JSON
//! - `/metrics` - Prometheus metrics endpoint
//!
//! These routes are served on the webhook's TLS listener alongside the
//! admission endpoints.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use serde::Serialize;

/// Version reported by `/info`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Labels for admission metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AdmissionLabels {
    pub endpoint: String,
    pub verdict: String,
}

impl EncodeLabelSet for AdmissionLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("endpoint", self.endpoint.as_str()).encode(encoder.encode_label())?;
        ("verdict", self.verdict.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for certificate reload metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct ReloadLabels {
    pub result: String,
}

impl EncodeLabelSet for ReloadLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("result", self.result.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission reviews answered, by endpoint and verdict
    pub admission_requests_total: Family<AdmissionLabels, Counter>,
    /// Time spent evaluating admission reviews
    pub admission_duration_seconds: Family<AdmissionLabels, Histogram>,
    /// Certificate reload attempts, by result
    pub certificate_reloads_total: Family<ReloadLabels, Counter>,
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_requests_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "gmsa_webhook_admission_requests",
            "Total number of admission reviews answered",
            admission_requests_total.clone(),
        );

        let admission_duration_seconds =
            Family::<AdmissionLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.001, 2.0, 15))
            });
        registry.register(
            "gmsa_webhook_admission_duration_seconds",
            "Duration of admission review evaluation in seconds",
            admission_duration_seconds.clone(),
        );

        let certificate_reloads_total = Family::<ReloadLabels, Counter>::default();
        registry.register(
            "gmsa_webhook_certificate_reloads",
            "Total number of TLS certificate reload attempts",
            certificate_reloads_total.clone(),
        );

        Self {
            admission_requests_total,
            admission_duration_seconds,
            certificate_reloads_total,
            registry,
        }
    }

    /// Record an answered admission review
    pub fn record_admission(&self, endpoint: &str, allowed: bool, duration_secs: f64) {
        let labels = AdmissionLabels {
            endpoint: endpoint.to_string(),
            verdict: if allowed { "allowed" } else { "denied" }.to_string(),
        };
        self.admission_requests_total.get_or_create(&labels).inc();
        self.admission_duration_seconds
            .get_or_create(&labels)
            .observe(duration_secs);
    }

    /// Record a certificate reload attempt
    pub fn record_reload(&self, success: bool) {
        let labels = ReloadLabels {
            result: if success { "success" } else { "failure" }.to_string(),
        };
        self.certificate_reloads_total.get_or_create(&labels).inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health endpoints
#[derive(Default)]
pub struct HealthState {
    pub metrics: Metrics,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Serialize)]
struct Info {
    version: &'static str,
}

/// Liveness probe handler
async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn info() -> impl IntoResponse {
    Json(Info { version: VERSION })
}

async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/info", get(info))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
