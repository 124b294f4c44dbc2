//! fitmatch-tp library - Trainer Profiles
//!
//! Resolves public trainer identifiers (slugs or unique ids) to canonical
//! trainer records, merges each record with its profile document, and
//! manages edit sessions over the merged profile.
//!
//! Module map, leaf first:
//! - [`telemetry`]: per-strategy resolution counters
//! - [`resolver`]: ordered-fallback identifier resolution
//! - [`merger`]: column/document precedence merge
//! - [`completion`]: weighted completion score
//! - [`editor`]: edit session (dirty tracking, optimistic save, rollback)
//! - [`store`]: backing store boundary (SQLite and in-memory)
//! - [`api`]: HTTP surface

use axum::Router;
use std::sync::Arc;

pub mod api;
pub mod completion;
pub mod editor;
pub mod error;
pub mod merger;
pub mod resolver;
pub mod store;
pub mod telemetry;
pub mod types;

use resolver::IdentifierResolver;
use store::TrainerStore;
use telemetry::ResolutionTelemetry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TrainerStore>,
    pub resolver: IdentifierResolver,
    pub telemetry: Arc<ResolutionTelemetry>,
}

impl AppState {
    /// Create new application state with a fresh telemetry collector
    pub fn new(store: Arc<dyn TrainerStore>) -> Self {
        let telemetry = Arc::new(ResolutionTelemetry::new());
        let resolver = IdentifierResolver::new(Arc::clone(&store), Arc::clone(&telemetry));
        Self {
            store,
            resolver,
            telemetry,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;
    use tower_http::trace::TraceLayer;

    Router::new()
        .route("/api/trainers/:identifier", get(api::get_trainer))
        .route(
            "/api/trainers/:identifier/profile",
            axum::routing::patch(api::patch_trainer_profile),
        )
        .route("/api/diagnostics/resolution", get(api::get_resolution_metrics))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
