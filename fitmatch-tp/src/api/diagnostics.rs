//! Resolution diagnostics
//!
//! Read-only snapshot of the resolver's per-strategy counters, for
//! dashboards watching how often legacy links still arrive.

use axum::{extract::State, Json};

use crate::telemetry::ResolutionMetrics;
use crate::AppState;

/// GET /api/diagnostics/resolution
pub async fn get_resolution_metrics(State(state): State<AppState>) -> Json<ResolutionMetrics> {
    Json(state.telemetry.metrics())
}
