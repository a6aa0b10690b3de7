#![forbid(unsafe_code)]

//! `metagen-queue`: generation queue server binary.
//!
//! Bootstraps configuration, starts the queue scheduler against the HTTP
//! collaborator services, the retention task, and the HTTP surface used
//! by the UI and by `metagen-ctl`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::{fmt, EnvFilter};

use metagen_queue::api::{self, ApiState};
use metagen_queue::config::GlobalConfig;
use metagen_queue::orchestrator::{Collaborators, QueueScheduler, SchedulerConfig};
use metagen_queue::pipeline::http::HttpServices;
use metagen_queue::store::{retention, SessionStore};
use metagen_queue::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "metagen-queue", about = "Generation session queue server", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured concurrency ceiling.
    #[arg(long)]
    max_active: Option<usize>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("metagen-queue server bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(ceiling) = args.max_active {
        if ceiling == 0 {
            return Err(AppError::Config("--max-active must be greater than zero".into()));
        }
        config.queue.max_active_sessions = ceiling;
    }
    config.load_credentials();
    info!(
        ceiling = config.queue.max_active_sessions,
        "configuration loaded"
    );

    // ── Build the queue ─────────────────────────────────
    let services = HttpServices::from_config(&config.services)?;
    let store = Arc::new(SessionStore::new());
    let scheduler = QueueScheduler::new(
        SchedulerConfig::from(&config),
        Arc::clone(&store),
        Collaborators {
            grounding: Arc::new(services.grounding),
            generation: Arc::new(services.generation),
            persistence: Arc::new(services.persistence),
        },
    );
    let scheduler_handle = scheduler.start();

    // ── Start retention service ─────────────────────────
    let ct = CancellationToken::new();
    let retention_handle = config.retention().map(|window| {
        info!(
            retention_minutes = config.retention_minutes,
            "retention service started"
        );
        retention::spawn_retention_task(Arc::clone(&store), window, ct.clone())
    });

    // ── Start HTTP surface ──────────────────────────────
    let listener = api::bind(config.http_port).await?;
    let state = ApiState::new(scheduler.clone(), config.generation.clone());
    let http_ct = ct.clone();
    let http_handle = tokio::spawn(
        async move {
            if let Err(err) = api::serve(listener, state, http_ct).await {
                error!(%err, "HTTP surface failed");
            }
        }
        .instrument(info_span!("http")),
    );

    info!("metagen-queue ready");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");

    // ── Graceful shutdown: settle in-flight sessions first ─
    let summary = scheduler.cancel_all();
    info!(
        cancelled_pending = summary.cancelled_pending,
        signalled_active = summary.signalled_active,
        "queue drained"
    );
    scheduler_handle.shutdown().await;

    ct.cancel();
    if let Err(err) = http_handle.await {
        warn!(%err, "HTTP task ended abnormally");
    }
    if let Some(handle) = retention_handle {
        if let Err(err) = handle.await {
            warn!(%err, "retention task ended abnormally");
        }
    }

    info!("metagen-queue shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
