use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

use crate::aggregator::InstanceRegistry;
use crate::api::error::ApiError;
use crate::config::is_http_url;
use crate::engine::{HealthService, FULL};
use crate::types::{CompositeHealth, InstanceRecord, RegistrationRequest};

#[derive(Debug, Deserialize)]
pub struct HealthQuery {
    pub group: Option<String>,
}

pub struct HealthResponse(pub CompositeHealth);

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let code = if self.0.is_up() {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        };
        (code, Json(self.0)).into_response()
    }
}

pub async fn health(
    State(service): State<Arc<HealthService>>,
    Query(query): Query<HealthQuery>,
) -> Result<HealthResponse, ApiError> {
    let group = query.group.unwrap_or_else(|| FULL.to_string());
    group_health_for(&service, &group).await
}

pub async fn group_health(
    State(service): State<Arc<HealthService>>,
    Path(group): Path<String>,
) -> Result<HealthResponse, ApiError> {
    group_health_for(&service, &group).await
}

async fn group_health_for(service: &HealthService, group: &str) -> Result<HealthResponse, ApiError> {
    service
        .health(group)
        .await
        .map(HealthResponse)
        .ok_or_else(|| ApiError::NotFound(format!("Health group '{}' not found", group)))
}

pub async fn register(
    State(registry): State<Arc<InstanceRegistry>>,
    Json(request): Json<RegistrationRequest>,
) -> Result<Json<InstanceRecord>, ApiError> {
    if request.instance_id.trim().is_empty() {
        return Err(ApiError::BadRequest("instanceId must not be empty".to_string()));
    }
    if !is_http_url(&request.health_url) {
        return Err(ApiError::BadRequest(format!(
            "healthUrl '{}' is not an http(s) URL",
            request.health_url
        )));
    }

    Ok(Json(registry.register(request, Utc::now())))
}

pub async fn list_instances(
    State(registry): State<Arc<InstanceRegistry>>,
) -> Json<Vec<InstanceRecord>> {
    Json(registry.list())
}

pub async fn get_instance(
    State(registry): State<Arc<InstanceRegistry>>,
    Path(id): Path<String>,
) -> Result<Json<InstanceRecord>, ApiError> {
    registry
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Instance '{}' not found", id)))
}

pub async fn deregister_instance(
    State(registry): State<Arc<InstanceRegistry>>,
    Path(id): Path<String>,
) -> Result<Json<InstanceRecord>, ApiError> {
    registry
        .deregister(&id, Utc::now())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Instance '{}' not found", id)))
}

pub async fn aggregator_health(
    State(registry): State<Arc<InstanceRegistry>>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION"),
        "instances": registry.len(),
    }))
}
