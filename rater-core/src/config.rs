//! Tunables for sessions and the session actor.

use std::path::PathBuf;

/// Default de-noise threshold for detected boxes (fraction of the canvas).
pub const DEFAULT_NOISE_THRESHOLD: f64 = 0.015;

/// Default minimum number of elements the scoring service accepts.
pub const DEFAULT_MIN_ELEMENTS: usize = 2;

/// Default capacity of the session actor's command queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Default capacity of the session status channel.
pub const DEFAULT_STATUS_CAPACITY: usize = 128;

/// Configuration shared by sessions, the actor and the CLI.
#[derive(Debug, Clone, PartialEq)]
pub struct RaterConfig {
    /// Detected boxes narrower or shorter than this are discarded as noise.
    pub noise_threshold: f64,
    /// Minimum live elements for a scoring submission.
    pub min_elements: usize,
    /// Bounded command queue size for the session actor.
    pub queue_capacity: usize,
    /// Broadcast buffer for session status reports.
    pub status_capacity: usize,
    /// Where the rating store persists ratings, if anywhere.
    pub data_dir: Option<PathBuf>,
}

impl Default for RaterConfig {
    fn default() -> Self {
        Self {
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            min_elements: DEFAULT_MIN_ELEMENTS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            status_capacity: DEFAULT_STATUS_CAPACITY,
            data_dir: None,
        }
    }
}

impl RaterConfig {
    /// Create a configuration from environment variables or defaults.
    ///
    /// Environment variables:
    /// - `RATER_NOISE_THRESHOLD`: de-noise threshold (default: 0.015)
    /// - `RATER_MIN_ELEMENTS`: submission minimum (default: 2)
    /// - `RATER_QUEUE_CAPACITY`: actor queue size (default: 64)
    /// - `RATER_DATA_DIR`: rating store directory (default: none)
    ///
    /// Unparseable values fall back to the default with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            noise_threshold: Some(parse_or(
                &lookup,
                "RATER_NOISE_THRESHOLD",
                defaults.noise_threshold,
            ))
            .filter(|&threshold| {
                let valid = is_valid_noise_threshold(threshold);
                if !valid {
                    tracing::warn!("Ignoring RATER_NOISE_THRESHOLD={threshold}: must be finite and >= 0");
                }
                valid
            })
            .unwrap_or(defaults.noise_threshold),
            min_elements: parse_or(&lookup, "RATER_MIN_ELEMENTS", defaults.min_elements),
            queue_capacity: parse_or(&lookup, "RATER_QUEUE_CAPACITY", defaults.queue_capacity)
                .max(1),
            status_capacity: defaults.status_capacity,
            data_dir: lookup("RATER_DATA_DIR")
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        }
    }
}

/// Whether `threshold` can be used for de-noising: finite and non-negative.
#[must_use]
pub fn is_valid_noise_threshold(threshold: f64) -> bool {
    threshold.is_finite() && threshold >= 0.0
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match lookup(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {key}={raw:?}");
            default
        }),
        None => default,
    }
}
