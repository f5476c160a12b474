// src/server/mod.rs

//! HTTP and WebSocket surface.
//!
//! Routes:
//! - GET  /api/health
//! - GET  /api/vms
//! - POST /api/vms/{name}/start | stop | restart
//! - GET  /api/playbooks
//! - GET  /api/vm-metrics
//! - GET  /api/vm-config
//! - GET  /api/services
//! - WS   /api/ws/provision
//! - WS   /api/ws/deprovision
//! - WS   /api/playbooks/ws/run/{name}

pub mod error;
pub mod status;
pub mod stream;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::config::LabConfig;
use crate::engine::{ExecutionSlot, Executor, Operation};
use crate::playbooks::PlaybookCatalog;
use crate::probe::{MetricsCollector, ProbeOptions, ProbeTarget};
use crate::services::ServiceMonitor;
use crate::vms::VmController;

pub use error::ApiError;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub executor: Executor,
    pub provision: Arc<Operation>,
    pub deprovision: Arc<Operation>,
    pub catalog: Arc<PlaybookCatalog>,
    pub vms: Arc<VmController>,
    pub services: Arc<ServiceMonitor>,
    pub collector: Arc<dyn MetricsCollector>,
    pub probe_targets: Arc<Vec<ProbeTarget>>,
    pub probe_options: ProbeOptions,
}

impl AppState {
    /// Build the state for `config` with a fresh execution slot and the SSH
    /// metrics collector.
    pub fn from_config(config: &LabConfig) -> crate::errors::Result<Self> {
        let executor = Executor::new(
            Arc::new(ExecutionSlot::new()),
            config.run_state_store(),
            config.executor.backend,
        );

        Ok(Self {
            executor,
            provision: Arc::new(config.provision_operation()?),
            deprovision: Arc::new(config.deprovision_operation()?),
            catalog: Arc::new(config.playbook_catalog()),
            vms: Arc::new(config.vm_controller()),
            services: Arc::new(config.service_monitor()),
            collector: Arc::new(config.ssh_collector()),
            probe_targets: Arc::new(config.probe_targets()),
            probe_options: config.probe_options(),
        })
    }

    pub fn with_collector(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collector = collector;
        self
    }
}

/// API routes without CORS or static files.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(status::health))
        .route("/api/vms", get(status::list_vms))
        .route("/api/vms/{name}/start", post(status::start_vm))
        .route("/api/vms/{name}/stop", post(status::stop_vm))
        .route("/api/vms/{name}/restart", post(status::restart_vm))
        .route("/api/playbooks", get(status::list_playbooks))
        .route("/api/vm-metrics", get(status::vm_metrics))
        .route("/api/vm-config", get(status::vm_config))
        .route("/api/services", get(status::service_status))
        .route("/api/ws/provision", get(stream::ws_provision))
        .route("/api/ws/deprovision", get(stream::ws_deprovision))
        .route("/api/playbooks/ws/run/{name}", get(stream::ws_run_playbook))
        .with_state(state)
}

/// Full application router: API, CORS for the local origins and, when
/// configured, the static frontend.
pub fn router(config: &LabConfig, state: AppState) -> Router {
    let mut app = api_router(state).layer(cors_layer(config.server.port));

    if let Some(dir) = &config.server.frontend_dir {
        if dir.is_dir() {
            info!(dir = ?dir, "serving static frontend");
            app = app.fallback_service(ServeDir::new(dir));
        } else {
            warn!(dir = ?dir, "frontend_dir does not exist; not serving static files");
        }
    }

    app
}

fn cors_layer(port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://127.0.0.1:{port}"),
        format!("http://localhost:{port}"),
    ]
    .into_iter()
    .filter_map(|origin| HeaderValue::from_str(&origin).ok())
    .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &LabConfig, state: AppState) -> Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!(addr = %addr, "labdash listening");

    axum::serve(listener, router(config, state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
