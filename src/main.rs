//! gmsa-webhook - admission webhook for GMSA credential specs.
//!
//! This is the main entry point that:
//! - Parses configuration from flags and environment
//! - Initializes structured logging
//! - Creates the Kubernetes client
//! - Loads the serving certificate and optionally watches it for changes
//! - Runs the webhook server until SIGTERM or SIGINT

use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gmsa_webhook::{
    AdmissionEngine, CertificateReloader, Config, EngineOptions, HealthState,
    KubeCredentialSpecStore, WebhookState, run_webhook_server, watch_certificate_files,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // the listener and the kube client share one process-wide provider
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        return Err("a rustls crypto provider is already installed".into());
    }

    let (level, level_understood) = config.level_filter();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(format!("gmsa_webhook={}", level).parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    if !level_understood {
        warn!(
            log_level = %config.log_level,
            default = %level,
            valid = "panic, fatal, error, warn, info, debug, trace",
            "Unknown log level, using default"
        );
    }

    info!(
        version = gmsa_webhook::health::VERSION,
        https_port = config.https_port,
        cert_reload = config.cert_reload,
        random_hostname = config.random_hostname,
        "Starting gmsa-webhook"
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());
    let shutdown = CancellationToken::new();

    let reloader = Arc::new(CertificateReloader::new(&config.tls_crt, &config.tls_key)?);
    let watcher_handle = if config.cert_reload {
        Some(watch_certificate_files(
            reloader.clone(),
            shutdown.clone(),
            Some(health_state.clone()),
        )?)
    } else {
        info!("Certificate reload disabled");
        None
    };

    let engine = AdmissionEngine::with_options(
        KubeCredentialSpecStore::new(client),
        EngineOptions {
            random_hostname: config.random_hostname,
        },
    );
    let state = Arc::new(WebhookState::new(engine, health_state));

    let server_handle = tokio::spawn(run_webhook_server(
        state,
        reloader,
        config.https_port,
        shutdown.clone(),
    ));

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown.cancel();
        }
    });

    let result = match server_handle.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => {
            error!(error = %e, "Webhook server error");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "Webhook server task panicked");
            Err(e.into())
        }
    };

    // stop the watcher too if the server exited on its own
    shutdown.cancel();
    if let Some(handle) = watcher_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "Certificate watcher task panicked");
        }
    }

    info!("gmsa-webhook stopped");
    result
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Signal handler setup failures are fatal; the process cannot shut down
/// gracefully without them.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
