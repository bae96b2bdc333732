// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context as _, Result};
use axum::{http::StatusCode, routing::get, Router};
use clap::{Parser, Subcommand};
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use nestlb::{
    config::ReleaseConfig,
    constants::{CONTROLLER_NAME, DEFAULT_METRICS_ADDR},
    context::Context,
    controller::{run_ingress_controller, run_service_controller},
    metrics,
    naming::checksum_name,
};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// nestlb - project guest-cluster load balancers and ingresses onto a host cluster
#[derive(Parser, Debug)]
#[command(name = "nestlb", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run both controllers against the guest and host clusters
    Run(RunArgs),

    /// Print the host port name a guest Service port is projected to
    PortName {
        namespace: String,
        name: String,
        /// Port name, or the port number when the port is unnamed
        port: String,
    },
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Path to the release configuration (YAML)
    #[arg(short = 'c', long = "config", env = "NESTLB_CONFIG")]
    config: PathBuf,

    /// Kubeconfig of the guest cluster; defaults to the in-cluster or local config
    #[arg(long, env = "NESTLB_GUEST_KUBECONFIG")]
    guest_kubeconfig: Option<PathBuf>,

    /// Address of the metrics and health endpoint
    #[arg(long, env = "NESTLB_METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    metrics_addr: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::PortName {
            namespace,
            name,
            port,
        } => {
            println!("{}", checksum_name(&format!("{namespace}/{name}/{port}")));
            Ok(())
        }
        Commands::Run(args) => {
            // Build Tokio runtime with custom thread names
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(4)
                .thread_name(CONTROLLER_NAME)
                .enable_all()
                .build()?;

            runtime.block_on(async_main(args))
        }
    }
}

async fn async_main(args: RunArgs) -> Result<()> {
    // Respects RUST_LOG (default INFO) and RUST_LOG_FORMAT=json|text
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }

    info!("Starting nestlb projection controller");

    let config = ReleaseConfig::from_file(&args.config)?;
    for problem in config.validate() {
        warn!("Configuration problem: {}", problem);
    }
    info!(
        namespace = %config.namespace,
        classes = config.ingress.class_mappings.len(),
        "Loaded release configuration"
    );

    debug!("Initializing host Kubernetes client");
    let host = Client::try_default()
        .await
        .context("failed to create host cluster client")?;

    debug!("Initializing guest Kubernetes client");
    let guest = match &args.guest_kubeconfig {
        Some(path) => guest_client(path).await?,
        None => host.clone(),
    };

    let ctx = Context::new(config, guest.clone(), host);

    info!("Starting all controllers");

    // Controllers should never exit - if one does, log it and exit the process
    tokio::select! {
        result = run_service_controller(ctx.clone(), guest.clone()) => {
            error!("CRITICAL: Service controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Service controller exited unexpectedly without error")
        }
        result = run_ingress_controller(ctx.clone(), guest) => {
            error!("CRITICAL: Ingress controller exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Ingress controller exited unexpectedly without error")
        }
        result = serve_metrics(&args.metrics_addr) => {
            error!("CRITICAL: Metrics server exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Metrics server exited unexpectedly without error")
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, stopping");
            Ok(())
        }
    }
}

/// Build a client from an explicit guest kubeconfig.
async fn guest_client(path: &Path) -> Result<Client> {
    let kubeconfig = Kubeconfig::read_from(path)
        .with_context(|| format!("failed to read guest kubeconfig {}", path.display()))?;
    let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .context("invalid guest kubeconfig")?;
    Ok(Client::try_from(config)?)
}

/// Serve `/metrics` and `/healthz`.
async fn serve_metrics(addr: &str) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(|| async { "ok" }));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind metrics address {addr}"))?;
    info!("Serving metrics on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn metrics_handler() -> (StatusCode, String) {
    match metrics::gather_metrics() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
