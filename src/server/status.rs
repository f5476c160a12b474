// src/server/status.rs

//! JSON status and power endpoints. None of these take the execution slot.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::VmSpec;
use crate::playbooks::PlaybookInfo;
use crate::probe::{VmMetrics, probe_all};
use crate::services::ServiceInfo;
use crate::vms::{PowerAction, VmStatus};

use super::AppState;
use super::error::ApiError;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub busy: bool,
    pub current_operation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VmStatusResponse {
    pub vms: Vec<VmStatus>,
    pub busy: bool,
    pub current_operation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PowerResponse {
    pub status: &'static str,
    pub vm: String,
    pub action: PowerAction,
}

#[derive(Debug, Serialize)]
pub struct PlaybookListResponse {
    pub playbooks: Vec<PlaybookInfo>,
}

#[derive(Debug, Serialize)]
pub struct VmMetricsResponse {
    pub vms: Vec<VmMetrics>,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct VmConfigResponse {
    pub vms: Vec<VmSpec>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatusResponse {
    pub services: Vec<ServiceInfo>,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        busy: state.executor.is_busy(),
        current_operation: state.executor.current_label(),
    })
}

/// GET /api/vms
pub async fn list_vms(State(state): State<AppState>) -> Json<VmStatusResponse> {
    let vms = state.vms.status().await;
    Json(VmStatusResponse {
        vms,
        busy: state.executor.is_busy(),
        current_operation: state.executor.current_label(),
    })
}

/// POST /api/vms/{name}/start
pub async fn start_vm(
    state: State<AppState>,
    name: Path<String>,
) -> Result<Json<PowerResponse>, ApiError> {
    power(state, name, PowerAction::Start).await
}

/// POST /api/vms/{name}/stop
pub async fn stop_vm(
    state: State<AppState>,
    name: Path<String>,
) -> Result<Json<PowerResponse>, ApiError> {
    power(state, name, PowerAction::Stop).await
}

/// POST /api/vms/{name}/restart
pub async fn restart_vm(
    state: State<AppState>,
    name: Path<String>,
) -> Result<Json<PowerResponse>, ApiError> {
    power(state, name, PowerAction::Restart).await
}

async fn power(
    State(state): State<AppState>,
    Path(name): Path<String>,
    action: PowerAction,
) -> Result<Json<PowerResponse>, ApiError> {
    state.vms.ensure_provisioned(&name)?;

    if let Some(label) = state.executor.current_label() {
        return Err(ApiError::Conflict(format!(
            "Another operation is running: {label}"
        )));
    }

    state.vms.power(&name, action).await?;

    Ok(Json(PowerResponse {
        status: "ok",
        vm: name,
        action,
    }))
}

/// GET /api/playbooks
pub async fn list_playbooks(
    State(state): State<AppState>,
) -> Result<Json<PlaybookListResponse>, ApiError> {
    let playbooks = state.catalog.list(state.executor.store())?;
    Ok(Json(PlaybookListResponse { playbooks }))
}

/// GET /api/vm-metrics
pub async fn vm_metrics(State(state): State<AppState>) -> Json<VmMetricsResponse> {
    let vms = probe_all(
        Arc::clone(&state.collector),
        &state.probe_targets,
        state.probe_options,
    )
    .await;

    Json(VmMetricsResponse {
        vms,
        collected_at: Utc::now(),
    })
}

/// GET /api/vm-config
///
/// The VM list as validated at startup. Read-only.
pub async fn vm_config(State(state): State<AppState>) -> Json<VmConfigResponse> {
    Json(VmConfigResponse {
        vms: state.vms.specs().to_vec(),
    })
}

/// GET /api/services
pub async fn service_status(State(state): State<AppState>) -> Json<ServiceStatusResponse> {
    Json(ServiceStatusResponse {
        services: state.services.status().await,
    })
}
