//! Illustrative binary wiring `fleet-core` behind a minimal `axum` router.
//! This is not the production HTTP surface (auth modes, rate limiting, and
//! request binding remain external collaborators per the core's contract)
//! - it exists so the crate is runnable end to end and the core-error-to-
//! HTTP-status mapping is demonstrable.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use clap::Parser;
use fleet_core::redfish::fake::FakeTransport;
use fleet_core::{
    ActionExecutor, AuditSink, HostDescriptor, HostDescriptorDelta, HostRegistry, Job, JobCreateRequest,
    JobScheduler, ProviderRegistry,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "fleet-service")]
#[command(about = "Redfish/BMC fleet control-plane service")]
#[command(version)]
struct Cli {
    /// Configuration file path (file + FLEET_* environment overlay).
    #[arg(long, env = "FLEET_CONFIG", default_value = "fleet.toml")]
    config: PathBuf,
}

struct AppState {
    registry: Arc<HostRegistry<FakeTransport>>,
    scheduler: Arc<JobScheduler<FakeTransport>>,
}

/// Wraps a `FleetError` so handlers can just `?` it; the status comes from
/// `FleetError::status_hint`, the body from its `Display` impl (or, for
/// `Validation`, the structured report).
struct ApiError(fleet_core::FleetError);

impl From<fleet_core::FleetError> for ApiError {
    fn from(err: fleet_core::FleetError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_hint()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = match &self.0 {
            fleet_core::FleetError::Validation(report) => json!({ "error": "validation failed", "report": report }),
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Serialize)]
struct StatusBody {
    worker_pool_size: usize,
    active_workers: usize,
    available_workers: usize,
    total_jobs: usize,
    running_jobs: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    let registry = Arc::new(HostRegistry::new(Arc::new(FakeTransport::new())));
    let providers = Arc::new(ProviderRegistry::with_defaults());
    let executor = Arc::new(ActionExecutor::new(registry.clone(), providers));
    let audit = Arc::new(AuditSink::new(config.logs_dir.clone()));
    let scheduler = Arc::new(JobScheduler::new(executor, audit, config.worker_pool_size)?);

    let scheduler_loop = scheduler.clone();
    tokio::spawn(async move { scheduler_loop.run_forever().await });

    let state = Arc::new(AppState { registry, scheduler });
    let app = Router::new()
        .route("/redfish/v1/Hosts", post(register_host).get(list_hosts))
        .route("/redfish/v1/Hosts/:id", patch(patch_host).delete(unregister_host))
        .route(
            "/redfish/v1/JobService/Jobs",
            post(create_job).get(list_jobs),
        )
        .route(
            "/redfish/v1/JobService/Jobs/:id",
            get(get_job).delete(delete_job),
        )
        .route("/redfish/v1/JobService/Jobs/:id/Actions/Cancel", post(cancel_job))
        .route(
            "/redfish/v1/JobService/Jobs/:id/Actions/TriggerNow",
            post(trigger_job),
        )
        .route("/redfish/v1/JobService", get(scheduler_status))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "fleet-service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

async fn register_host(
    State(state): State<Arc<AppState>>,
    Json(descriptor): Json<HostDescriptor>,
) -> Result<StatusCode, ApiError> {
    state.registry.register(descriptor).await?;
    Ok(StatusCode::CREATED)
}

async fn list_hosts(State(state): State<Arc<AppState>>) -> Json<Vec<HostDescriptor>> {
    Json(state.registry.list().await)
}

async fn patch_host(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    Json(delta): Json<HostDescriptorDelta>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let outcome = state.registry.patch(&id, delta).await?;
    Ok(Json(json!({ "reconnected": outcome.reconnected })))
}

async fn unregister_host(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    state.registry.unregister(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JobCreateRequest>,
) -> Result<(StatusCode, Json<Job>), ApiError> {
    let job = state.scheduler.create(request).await?;
    Ok((StatusCode::CREATED, Json(job)))
}

async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<Vec<Job>> {
    Json(state.scheduler.list().await)
}

async fn get_job(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.scheduler.get(&id).await?))
}

async fn delete_job(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<StatusCode, ApiError> {
    state.scheduler.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel_job(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.scheduler.cancel(&id).await?))
}

async fn trigger_job(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<fleet_core::ExecutionRecord>, ApiError> {
    Ok(Json(state.scheduler.trigger_now(&id).await?))
}

async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<StatusBody> {
    let status = state.scheduler.status().await;
    Json(StatusBody {
        worker_pool_size: status.worker_pool_size,
        active_workers: status.active_workers,
        available_workers: status.available_workers,
        total_jobs: status.total_jobs,
        running_jobs: status.running_jobs,
    })
}
