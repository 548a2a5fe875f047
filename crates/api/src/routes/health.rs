//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub inventory_circuit: &'static str,
}

/// GET /health: returns service health and the inventory breaker state.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let circuit = state.orchestrator.inventory().breaker().state();
    Json(HealthResponse {
        status: "ok",
        inventory_circuit: circuit.as_str(),
    })
}
