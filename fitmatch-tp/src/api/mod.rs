//! HTTP API handlers for fitmatch-tp

pub mod diagnostics;
pub mod health;
pub mod trainers;

pub use diagnostics::get_resolution_metrics;
pub use health::health_routes;
pub use trainers::{get_trainer, patch_trainer_profile};
