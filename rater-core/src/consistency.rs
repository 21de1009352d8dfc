//! # Consistency scoring
//!
//! Measures how reproducible the scoring heuristics are across two or more
//! ratings of comparable material.
//!
//! ```text
//! for each metric type common to every rating:
//!     relative_inconsistency = sample_std_dev(scores) / max(scores)
//! consistency = 1 - mean(relative_inconsistency)
//! score       = clamp(round(100 * consistency), 0, 100)
//! ```
//!
//! Inputs for which the measure is undefined (fewer than two ratings, or no
//! metric type shared by all of them) score 0 and carry the reason in the
//! report. Scoring never fails.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::{Metric, MetricType, Rating};

/// Why a consistency score is the 0 sentinel rather than a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UndefinedConsistency {
    /// Fewer than two ratings were supplied.
    TooFewRatings,
    /// No metric type appears in every rating.
    NoCommonMetrics,
}

impl std::fmt::Display for UndefinedConsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewRatings => f.write_str("at least two ratings are required"),
            Self::NoCommonMetrics => f.write_str("the ratings share no metric type"),
        }
    }
}

/// Disagreement statistics for one common metric type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSpread {
    /// The metric type.
    pub metric_type: MetricType,
    /// One score per rating, in input order.
    pub scores: Vec<u8>,
    /// Arithmetic mean of `scores`.
    pub mean: f64,
    /// Largest score, used as the normalizer.
    pub max: u8,
    /// Corrected sample standard deviation.
    pub std_dev: f64,
    /// `std_dev / max`, or 0 when `max` is 0.
    pub relative_inconsistency: f64,
}

impl MetricSpread {
    fn from_scores(metric_type: MetricType, scores: Vec<u8>) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let n = scores.len() as f64;
        let mean = scores.iter().map(|&s| f64::from(s)).sum::<f64>() / n;
        let max = scores.iter().copied().max().unwrap_or(0);
        let squares: f64 = scores
            .iter()
            .map(|&s| (f64::from(s) - mean).powi(2))
            .sum();
        let std_dev = (squares / (n - 1.0)).sqrt();
        let relative_inconsistency = if max == 0 {
            0.0
        } else {
            std_dev / f64::from(max)
        };
        Self {
            metric_type,
            scores,
            mean,
            max,
            std_dev,
            relative_inconsistency,
        }
    }
}

/// Consistency score with its per-type breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsistencyReport {
    /// Score in `0..=100`.
    pub score: u8,
    /// Statistics per common metric type, sorted by wire key.
    pub spreads: Vec<MetricSpread>,
    /// Set when `score` is the undefined sentinel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undefined: Option<UndefinedConsistency>,
}

impl ConsistencyReport {
    fn undefined(reason: UndefinedConsistency) -> Self {
        Self {
            score: 0,
            spreads: Vec::new(),
            undefined: Some(reason),
        }
    }
}

/// Compute the consistency score and its breakdown.
#[must_use]
pub fn consistency_report(ratings: &[Rating]) -> ConsistencyReport {
    if ratings.len() < 2 {
        return ConsistencyReport::undefined(UndefinedConsistency::TooFewRatings);
    }

    let maps: Vec<HashMap<&MetricType, &Metric>> =
        ratings.iter().map(Rating::metrics_by_type).collect();

    let mut common: HashSet<&MetricType> = maps[0].keys().copied().collect();
    for map in &maps[1..] {
        common.retain(|metric_type| map.contains_key(metric_type));
    }
    if common.is_empty() {
        tracing::debug!("No metric type common to {} ratings", ratings.len());
        return ConsistencyReport::undefined(UndefinedConsistency::NoCommonMetrics);
    }

    let grouped: BTreeMap<&str, (&MetricType, Vec<u8>)> = common
        .into_iter()
        .map(|metric_type| {
            let scores = maps.iter().map(|map| map[metric_type].score).collect();
            (metric_type.key(), (metric_type, scores))
        })
        .collect();

    let spreads: Vec<MetricSpread> = grouped
        .into_values()
        .map(|(metric_type, scores)| MetricSpread::from_scores(metric_type.clone(), scores))
        .collect();

    #[allow(clippy::cast_precision_loss)]
    let mean_inconsistency = spreads
        .iter()
        .map(|spread| spread.relative_inconsistency)
        .sum::<f64>()
        / spreads.len() as f64;
    let consistency = 1.0 - mean_inconsistency;

    let scaled = (100.0 * consistency).round();
    let clamped = scaled.clamp(0.0, 100.0);
    if (clamped - scaled).abs() > f64::EPSILON {
        tracing::warn!("Consistency {scaled} outside [0, 100], clamped to {clamped}");
    }
    // In [0, 100] after clamping.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = clamped as u8;

    ConsistencyReport {
        score,
        spreads,
        undefined: None,
    }
}

/// Compute the consistency score of `ratings` in `0..=100`.
///
/// Returns 0 for fewer than two ratings or when no metric type is common to
/// all of them.
#[must_use]
pub fn compute_consistency(ratings: &[Rating]) -> u8 {
    consistency_report(ratings).score
}
