use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok" when every tool is installed, "degraded" otherwise
    pub status: String,
    /// Tool name to installed flag
    pub tools: BTreeMap<String, bool>,
    pub failure_policy: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service health and tool availability", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let tools = crate::services::dependencies::Tool::ALL
        .iter()
        .map(|tool| {
            (
                tool.binary_name().to_string(),
                state.dependencies.is_installed(*tool),
            )
        })
        .collect();

    let status = if state.dependencies.is_ready() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        tools,
        failure_policy: state.pipeline.policy().to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
