//! Trainer profile endpoints
//!
//! `GET` resolves any accepted identifier and returns the merged profile.
//! `PATCH` writes a partial profile update; it only accepts the trainer's
//! unique id so a write can never land on a guessed slug match.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::completion::CompletionRule;
use crate::error::{ApiError, ApiResult};
use crate::merger::merge_profile;
use crate::types::{Identifier, ProfilePatch, StrategyName, UnifiedTrainerProfile};
use crate::AppState;

/// Resolved and merged trainer profile
#[derive(Debug, Serialize)]
pub struct TrainerResponse {
    pub success: bool,
    /// Strategy that found the trainer
    pub method: StrategyName,
    pub profile: UnifiedTrainerProfile,
    pub completion_percentage: u8,
    /// Required trainer fields still empty
    pub missing_required: Vec<&'static str>,
}

/// GET /api/trainers/:identifier
pub async fn get_trainer(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<TrainerResponse>> {
    let resolved = state.resolver.resolve_raw(&identifier).await?;
    let profile = merge_profile(&resolved.record);
    let completion = CompletionRule::trainer().assess(&profile);

    Ok(Json(TrainerResponse {
        success: true,
        method: resolved.method,
        profile,
        completion_percentage: completion.percentage,
        missing_required: completion.missing_required,
    }))
}

/// PATCH /api/trainers/:identifier/profile
pub async fn patch_trainer_profile(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
    Json(patch): Json<ProfilePatch>,
) -> ApiResult<StatusCode> {
    let id: Uuid = Identifier::parse(&identifier)
        .ok()
        .and_then(|parsed| parsed.unique_id())
        .ok_or_else(|| {
            ApiError::BadRequest(format!("profile updates require a trainer id, got '{}'", identifier))
        })?;

    if patch.is_empty() {
        return Err(ApiError::BadRequest("patch sets no fields".to_string()));
    }

    state.store.apply_patch(id, &patch).await?;

    info!(trainer_id = %id, fields = ?patch.field_names(), "Profile patch applied");
    Ok(StatusCode::NO_CONTENT)
}
