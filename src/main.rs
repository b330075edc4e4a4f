//! Controller binary: flag parsing, wiring, and shutdown handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use k8s_openapi::api::batch::v1::CronJob;
use kube::{Api, Client};
use tracing::{error, info};

use cronjob_label_controller::controller::{Controller, KubeCronJobUpdater};
use cronjob_label_controller::watch::CronJobInformer;
use cronjob_label_controller::{constants, metrics, server};

/// Keeps a name label present on CronJobs and their job/pod templates
#[derive(Debug, Parser)]
#[command(name = constants::CONTROLLER_NAME, version, about)]
struct Args {
    /// Label key to enforce; the value is always the CronJob's name
    #[arg(long, default_value = constants::DEFAULT_LABEL_KEY)]
    label: String,

    /// Watch a single namespace instead of the whole cluster
    #[arg(long)]
    namespace: Option<String>,

    /// Worker count hint (accepted for interface compatibility; dispatch is
    /// currently single-threaded)
    #[arg(long, default_value_t = constants::DEFAULT_WORKERS)]
    workers: usize,

    /// Port for the metrics and probe HTTP server
    #[arg(long, default_value_t = constants::DEFAULT_METRICS_PORT)]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cronjob_label_controller=info".into()),
        )
        .init();

    info!(
        "Starting {} {} ({})",
        constants::CONTROLLER_NAME,
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_HASH"),
    );

    // Configure rustls crypto provider FIRST, before any TLS connections
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    metrics::register_metrics().context("Failed to register metrics")?;

    // Readiness flips once the informer cache finishes its initial listing
    let ready = Arc::new(AtomicBool::new(false));

    let server_ready = Arc::clone(&ready);
    let metrics_port = args.metrics_port;
    tokio::spawn(async move {
        if let Err(err) = server::serve(metrics_port, server_ready).await {
            error!("HTTP server error: {err}");
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let cronjobs: Api<CronJob> = match &args.namespace {
        Some(namespace) => Api::namespaced(client.clone(), namespace),
        None => Api::all(client.clone()),
    };

    info!("Setting up event handlers");
    let (informer, events, synced) = CronJobInformer::new();
    tokio::spawn(informer.run(cronjobs));

    let probe_ready = Arc::clone(&ready);
    let mut probe_synced = synced.clone();
    tokio::spawn(async move {
        if probe_synced.wait_for(|s| *s).await.is_ok() {
            probe_ready.store(true, Ordering::Relaxed);
        }
    });

    let controller = Controller::new(KubeCronJobUpdater::new(client), args.label);
    controller
        .run(args.workers, events, synced, shutdown_signal())
        .await?;

    info!("Controller stopped");

    Ok(())
}

/// Resolve on SIGTERM or ctrl-c, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
