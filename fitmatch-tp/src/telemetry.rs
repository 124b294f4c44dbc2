//! Resolution telemetry
//!
//! Append-only counters of resolution attempts keyed by strategy and
//! outcome, with a second breakdown by identifier shape. Counters are plain atomics: updates are commutative, so
//! concurrent `record` calls never lose increments.
//!
//! The collector is a pure observer. Nothing in the resolver reads it back.

use crate::types::{AttemptOutcome, IdentifierShape, ResolutionAttempt, StrategyName};
use fitmatch_common::time::duration_micros;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

const STRATEGIES: usize = StrategyName::ALL.len();
const SHAPES: usize = IdentifierShape::ALL.len();
const OUTCOMES: usize = 3;

/// Process-wide resolution counters
///
/// Share one instance through `Arc<ResolutionTelemetry>`; tests create a
/// fresh collector per case.
#[derive(Debug)]
pub struct ResolutionTelemetry {
    /// `[strategy][outcome]` attempt counts
    counts: [[AtomicU64; OUTCOMES]; STRATEGIES],
    /// `[shape][outcome]` attempt counts
    shape_counts: [[AtomicU64; OUTCOMES]; SHAPES],
    /// Accumulated latency per strategy, in microseconds
    latency_micros: [AtomicU64; STRATEGIES],
    /// Identifiers rejected by the format check (no strategy attempted)
    rejected: AtomicU64,
}

/// Per-strategy breakdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StrategyCounts {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
    pub average_latency_micros: u64,
}

impl StrategyCounts {
    pub fn attempts(&self) -> u64 {
        self.hits + self.misses + self.errors
    }
}

/// Per-shape breakdown
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShapeCounts {
    pub hits: u64,
    pub misses: u64,
    pub errors: u64,
}

/// Read-only snapshot for diagnostics dashboards
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionMetrics {
    /// Recorded attempts across all strategies
    pub total_resolves: u64,
    /// Attempts with a `Hit` outcome
    pub successes: u64,
    /// `successes / total_resolves`, or `0.0` with no attempts
    pub success_rate: f64,
    pub rejected_identifiers: u64,
    pub per_strategy: BTreeMap<StrategyName, StrategyCounts>,
    /// Attempts by the shape of the identifier being resolved
    pub per_shape: BTreeMap<IdentifierShape, ShapeCounts>,
}

impl ResolutionTelemetry {
    pub fn new() -> Self {
        Self {
            counts: std::array::from_fn(|_| std::array::from_fn(|_| AtomicU64::new(0))),
            shape_counts: std::array::from_fn(|_| std::array::from_fn(|_| AtomicU64::new(0))),
            latency_micros: std::array::from_fn(|_| AtomicU64::new(0)),
            rejected: AtomicU64::new(0),
        }
    }

    /// Record one strategy attempt
    pub fn record(&self, attempt: &ResolutionAttempt) {
        let strategy = attempt.strategy.index();
        let outcome = attempt.outcome.index();
        self.counts[strategy][outcome].fetch_add(1, Ordering::Relaxed);
        self.shape_counts[attempt.shape.index()][outcome].fetch_add(1, Ordering::Relaxed);
        self.latency_micros[strategy]
            .fetch_add(duration_micros(attempt.latency), Ordering::Relaxed);
    }

    /// Record an identifier rejected before any strategy ran
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of all counters
    ///
    /// Totals are derived from the per-strategy counts read in this call,
    /// so `success_rate` always agrees with the breakdown it is shipped with.
    pub fn metrics(&self) -> ResolutionMetrics {
        let mut per_strategy = BTreeMap::new();
        let mut total_resolves = 0;
        let mut successes = 0;

        for strategy in StrategyName::ALL {
            let i = strategy.index();
            let load = |outcome: AttemptOutcome| self.counts[i][outcome.index()].load(Ordering::Relaxed);

            let mut counts = StrategyCounts {
                hits: load(AttemptOutcome::Hit),
                misses: load(AttemptOutcome::Miss),
                errors: load(AttemptOutcome::Error),
                average_latency_micros: 0,
            };
            let attempts = counts.attempts();
            if attempts > 0 {
                counts.average_latency_micros =
                    self.latency_micros[i].load(Ordering::Relaxed) / attempts;
            }

            total_resolves += attempts;
            successes += counts.hits;
            per_strategy.insert(strategy, counts);
        }

        let per_shape = IdentifierShape::ALL
            .into_iter()
            .map(|shape| {
                let load = |outcome: AttemptOutcome| {
                    self.shape_counts[shape.index()][outcome.index()].load(Ordering::Relaxed)
                };
                let counts = ShapeCounts {
                    hits: load(AttemptOutcome::Hit),
                    misses: load(AttemptOutcome::Miss),
                    errors: load(AttemptOutcome::Error),
                };
                (shape, counts)
            })
            .collect();

        let success_rate = if total_resolves == 0 {
            0.0
        } else {
            successes as f64 / total_resolves as f64
        };

        ResolutionMetrics {
            total_resolves,
            successes,
            success_rate,
            rejected_identifiers: self.rejected.load(Ordering::Relaxed),
            per_strategy,
            per_shape,
        }
    }
}

impl Default for ResolutionTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn attempt(strategy: StrategyName, outcome: AttemptOutcome, micros: u64) -> ResolutionAttempt {
        ResolutionAttempt {
            strategy,
            shape: IdentifierShape::Slug,
            outcome,
            latency: Duration::from_micros(micros),
        }
    }

    #[test]
    fn test_per_shape_breakdown() {
        let telemetry = ResolutionTelemetry::new();
        telemetry.record(&ResolutionAttempt {
            shape: IdentifierShape::UniqueId,
            ..attempt(StrategyName::UniqueId, AttemptOutcome::Hit, 5)
        });
        telemetry.record(&attempt(StrategyName::SlugView, AttemptOutcome::Miss, 5));
        telemetry.record(&attempt(StrategyName::UniqueId, AttemptOutcome::Miss, 0));
        telemetry.record(&attempt(StrategyName::LegacySlug, AttemptOutcome::Error, 5));

        let metrics = telemetry.metrics();
        assert_eq!(
            metrics.per_shape[&IdentifierShape::UniqueId],
            ShapeCounts { hits: 1, misses: 0, errors: 0 }
        );
        assert_eq!(
            metrics.per_shape[&IdentifierShape::Slug],
            ShapeCounts { hits: 0, misses: 2, errors: 1 }
        );

        // Both breakdowns count the same attempts
        let by_shape: u64 = metrics
            .per_shape
            .values()
            .map(|c| c.hits + c.misses + c.errors)
            .sum();
        assert_eq!(by_shape, metrics.total_resolves);

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["per_shape"]["slug"]["misses"], 2);
    }

    #[test]
    fn test_empty_metrics() {
        let telemetry = ResolutionTelemetry::new();
        let metrics = telemetry.metrics();

        assert_eq!(metrics.total_resolves, 0);
        assert_eq!(metrics.successes, 0);
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.per_strategy.len(), 3);
        assert_eq!(metrics.per_shape.len(), 2);
    }

    #[test]
    fn test_success_rate() {
        let telemetry = ResolutionTelemetry::new();
        telemetry.record(&attempt(StrategyName::SlugView, AttemptOutcome::Miss, 10));
        telemetry.record(&attempt(StrategyName::UniqueId, AttemptOutcome::Miss, 0));
        telemetry.record(&attempt(StrategyName::LegacySlug, AttemptOutcome::Hit, 30));
        telemetry.record(&attempt(StrategyName::SlugView, AttemptOutcome::Error, 20));

        let metrics = telemetry.metrics();
        assert_eq!(metrics.total_resolves, 4);
        assert_eq!(metrics.successes, 1);
        assert!((metrics.success_rate - 0.25).abs() < f64::EPSILON);

        let slug_view = metrics.per_strategy[&StrategyName::SlugView];
        assert_eq!(slug_view.misses, 1);
        assert_eq!(slug_view.errors, 1);
        assert_eq!(slug_view.average_latency_micros, 15);
    }

    #[test]
    fn test_rejected_identifiers_are_not_attempts() {
        let telemetry = ResolutionTelemetry::new();
        telemetry.record_rejected();
        telemetry.record_rejected();

        let metrics = telemetry.metrics();
        assert_eq!(metrics.rejected_identifiers, 2);
        assert_eq!(metrics.total_resolves, 0);
        assert_eq!(metrics.success_rate, 0.0);
    }

    #[test]
    fn test_concurrent_record_loses_nothing() {
        let telemetry = Arc::new(ResolutionTelemetry::new());

        let handles: Vec<_> = (0..8)
            .map(|n| {
                let telemetry = Arc::clone(&telemetry);
                std::thread::spawn(move || {
                    let outcome = if n % 2 == 0 {
                        AttemptOutcome::Hit
                    } else {
                        AttemptOutcome::Miss
                    };
                    for _ in 0..1_000 {
                        telemetry.record(&attempt(StrategyName::SlugView, outcome, 1));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let metrics = telemetry.metrics();
        assert_eq!(metrics.total_resolves, 8_000);
        assert_eq!(metrics.successes, 4_000);
        assert!((metrics.success_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_serialize_with_strategy_keys() {
        let telemetry = ResolutionTelemetry::new();
        telemetry.record(&attempt(StrategyName::UniqueId, AttemptOutcome::Hit, 5));

        let json = serde_json::to_value(telemetry.metrics()).unwrap();
        assert_eq!(json["per_strategy"]["unique_id"]["hits"], 1);
        assert_eq!(json["total_resolves"], 1);
    }
}
