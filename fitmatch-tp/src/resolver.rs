//! Identifier Resolver
//!
//! Resolves a public-facing identifier to exactly one trainer record by
//! trying strategies in a fixed order and stopping at the first hit:
//!
//! 1. [`StrategyName::SlugView`]: exact slug in the materialized slug view
//! 2. [`StrategyName::UniqueId`]: keyed lookup, only for UUID-shaped input
//! 3. [`StrategyName::LegacySlug`]: case-insensitive, prefix and renamed slugs
//!
//! A UUID-shaped identifier runs strategy 2 only. A slug runs 1 and 3;
//! strategy 2 is gated by the shape check and reported as a miss without
//! touching the store. A store error ends the chain with
//! `BackingStoreUnavailable`.
//!
//! Every attempt is handed to [`ResolutionTelemetry`] before `resolve`
//! returns. The resolver keeps no state between calls.

use crate::store::{StoreError, TrainerStore};
use crate::telemetry::ResolutionTelemetry;
use crate::types::{
    AttemptOutcome, Identifier, IdentifierShape, ResolutionAttempt, ResolutionError,
    ResolutionResult, ResolvedTrainer, StrategyName, TrainerRecord,
};
use fitmatch_common::time::duration_micros;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Ordered-fallback resolver over a [`TrainerStore`]
#[derive(Clone)]
pub struct IdentifierResolver {
    store: Arc<dyn TrainerStore>,
    telemetry: Arc<ResolutionTelemetry>,
}

impl IdentifierResolver {
    pub fn new(store: Arc<dyn TrainerStore>, telemetry: Arc<ResolutionTelemetry>) -> Self {
        Self { store, telemetry }
    }

    pub fn telemetry(&self) -> &Arc<ResolutionTelemetry> {
        &self.telemetry
    }

    /// Validate a raw string, then resolve it.
    ///
    /// Rejected input is counted separately and never reaches the store.
    pub async fn resolve_raw(&self, raw: &str) -> ResolutionResult {
        let identifier = match Identifier::parse(raw) {
            Ok(identifier) => identifier,
            Err(e) => {
                self.telemetry.record_rejected();
                debug!(identifier = %raw, "Rejected malformed trainer identifier");
                return Err(e);
            }
        };

        self.resolve(&identifier).await
    }

    /// Resolve a validated identifier
    pub async fn resolve(&self, identifier: &Identifier) -> ResolutionResult {
        let shape = identifier.shape();

        match shape {
            IdentifierShape::UniqueId => {
                let Some(id) = identifier.unique_id() else {
                    return Err(ResolutionError::InvalidFormat(identifier.to_string()));
                };

                let started = Instant::now();
                let found = self.store.find_by_id(id).await;
                if let Some(record) = self.lookup_outcome(StrategyName::UniqueId, shape, started, found)? {
                    return Ok(self.hit(identifier, record, StrategyName::UniqueId));
                }
            }
            IdentifierShape::Slug => {
                let slug = identifier.as_str();

                let started = Instant::now();
                let found = self.store.find_in_slug_view(slug).await;
                if let Some(record) = self.lookup_outcome(StrategyName::SlugView, shape, started, found)? {
                    return Ok(self.hit(identifier, record, StrategyName::SlugView));
                }

                // Gated by shape: counted, never sent to the store
                self.record(StrategyName::UniqueId, shape, AttemptOutcome::Miss, Instant::now());

                if let Some(record) = self.legacy_slug(identifier).await? {
                    return Ok(self.hit(identifier, record, StrategyName::LegacySlug));
                }
            }
        }

        debug!(identifier = %identifier, "No strategy matched trainer identifier");
        Err(ResolutionError::NotFound(identifier.to_string()))
    }

    async fn legacy_slug(
        &self,
        identifier: &Identifier,
    ) -> Result<Option<TrainerRecord>, ResolutionError> {
        let shape = identifier.shape();
        let started = Instant::now();

        let mut candidates = match self.store.find_by_legacy_slug(identifier.as_str()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.record(StrategyName::LegacySlug, shape, AttemptOutcome::Error, started);
                return Err(unavailable(StrategyName::LegacySlug, e));
            }
        };

        match candidates.len() {
            0 => {
                self.record(StrategyName::LegacySlug, shape, AttemptOutcome::Miss, started);
                Ok(None)
            }
            1 => {
                self.record(StrategyName::LegacySlug, shape, AttemptOutcome::Hit, started);
                Ok(candidates.pop())
            }
            _ => {
                self.record(StrategyName::LegacySlug, shape, AttemptOutcome::Error, started);
                let slugs: Vec<String> = candidates.into_iter().map(|record| record.slug).collect();
                warn!(
                    identifier = %identifier,
                    candidates = ?slugs,
                    "Legacy slug matches several trainers"
                );
                Err(ResolutionError::AmbiguousMatch {
                    identifier: identifier.to_string(),
                    candidates: slugs,
                })
            }
        }
    }

    /// Record a single-record lookup and turn a store error into a terminal failure
    fn lookup_outcome(
        &self,
        strategy: StrategyName,
        shape: IdentifierShape,
        started: Instant,
        found: Result<Option<TrainerRecord>, StoreError>,
    ) -> Result<Option<TrainerRecord>, ResolutionError> {
        match found {
            Ok(Some(record)) => {
                self.record(strategy, shape, AttemptOutcome::Hit, started);
                Ok(Some(record))
            }
            Ok(None) => {
                self.record(strategy, shape, AttemptOutcome::Miss, started);
                Ok(None)
            }
            Err(e) => {
                self.record(strategy, shape, AttemptOutcome::Error, started);
                Err(unavailable(strategy, e))
            }
        }
    }

    fn record(
        &self,
        strategy: StrategyName,
        shape: IdentifierShape,
        outcome: AttemptOutcome,
        started: Instant,
    ) {
        let attempt = ResolutionAttempt {
            strategy,
            shape,
            outcome,
            latency: started.elapsed(),
        };
        debug!(
            strategy = %attempt.strategy,
            shape = ?attempt.shape,
            outcome = ?attempt.outcome,
            latency_us = duration_micros(attempt.latency),
            "Resolution attempt"
        );
        self.telemetry.record(&attempt);
    }

    fn hit(&self, identifier: &Identifier, record: TrainerRecord, method: StrategyName) -> ResolvedTrainer {
        debug!(
            identifier = %identifier,
            trainer_id = %record.id,
            method = %method,
            "Trainer identifier resolved"
        );
        ResolvedTrainer { record, method }
    }
}

fn unavailable(strategy: StrategyName, e: StoreError) -> ResolutionError {
    warn!(strategy = %strategy, error = %e, "Store failure during resolution");
    let message = match e {
        StoreError::Unavailable(message) | StoreError::SaveConflict(message) => message,
    };
    ResolutionError::BackingStoreUnavailable(message)
}
