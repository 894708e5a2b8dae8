use anyhow::Context;
use refract_runner::service::{DeviceService, StandardDeviceService};
use refract_runner::{JobContext, PipelineExecutor, StateStore, Toolkit, WorkflowCatalog};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod service;
pub mod state;

use crate::config::ServerConfig;
use crate::service::processing::PayloadPipeline;
use crate::service::session::SessionRegistry;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "refract_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Refract Server...");

    let config = ServerConfig::from_env()?;
    config.validate().context("Invalid configuration")?;

    // Process-wide defaults every session context forks from
    let devices = StandardDeviceService::new();
    let execution_devices = devices.discover();
    tracing::info!("Discovered {} execution devices", execution_devices.len());

    let mut defaults = JobContext::new();
    config.runner.apply_defaults(&mut defaults)?;
    devices.apply_defaults(&mut defaults);
    let store = StateStore::new(defaults);

    let toolkit = Arc::new(Toolkit::standard(&config.runner));
    let catalog = Arc::new(WorkflowCatalog::standard(Arc::clone(&toolkit)));
    let pipeline = Arc::new(PayloadPipeline {
        transcoder: Arc::clone(&toolkit.transcoder),
        executor: Arc::new(PipelineExecutor::new(catalog)),
    });

    let sessions_root = config.runner.temp_path.join("refract").join("sessions");
    tokio::fs::create_dir_all(&sessions_root)
        .await
        .with_context(|| format!("Failed to create {}", sessions_root.display()))?;
    let sessions = Arc::new(SessionRegistry::new(store, sessions_root));

    sessions.spawn_sweeper(config.sweep_interval, config.session_idle_timeout);
    tracing::info!(
        "Idle sessions expire after {}s",
        config.session_idle_timeout.as_secs()
    );

    // Build router with all API endpoints
    let app = api::create_router(AppState {
        sessions,
        pipeline,
        execution_devices: Arc::new(execution_devices),
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
