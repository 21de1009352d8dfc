//! Scoring results produced by the external scoring service.
//!
//! A [`Rating`] aggregates [`MetricGroup`]s, each aggregating [`Metric`]s. The
//! core only reads these; the optional bookkeeping fields on [`Rating`] exist
//! for storage and display.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::UIElement;

/// A heuristic dimension a metric belongs to.
///
/// The vocabulary is open: keys the scoring service adds later deserialize as
/// [`MetricType::Other`] and take part in consistency scoring like any other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricType {
    /// `balance_horizontal`
    HorizontalBalance,
    /// `balance_vertical`
    VerticalBalance,
    /// `symmetry_horizontal`
    HorizontalSymmetry,
    /// `symmetry_vertical`
    VerticalSymmetry,
    /// `symmetry_radial`
    RadialSymmetry,
    /// `equilibrium_horizontal`
    HorizontalEquilibrium,
    /// `equilibrium_vertical`
    VerticalEquilibrium,
    /// `harmony_density`
    DensityHarmony,
    /// `harmony_proportion`
    ProportionHarmony,
    /// Any key not known to this build.
    Other(String),
}

impl MetricType {
    /// Parse a wire key. Never fails: unknown keys become [`MetricType::Other`].
    #[must_use]
    pub fn from_key(key: &str) -> Self {
        match key {
            "balance_horizontal" => Self::HorizontalBalance,
            "balance_vertical" => Self::VerticalBalance,
            "symmetry_horizontal" => Self::HorizontalSymmetry,
            "symmetry_vertical" => Self::VerticalSymmetry,
            "symmetry_radial" => Self::RadialSymmetry,
            "equilibrium_horizontal" => Self::HorizontalEquilibrium,
            "equilibrium_vertical" => Self::VerticalEquilibrium,
            "harmony_density" => Self::DensityHarmony,
            "harmony_proportion" => Self::ProportionHarmony,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire key for this type.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::HorizontalBalance => "balance_horizontal",
            Self::VerticalBalance => "balance_vertical",
            Self::HorizontalSymmetry => "symmetry_horizontal",
            Self::VerticalSymmetry => "symmetry_vertical",
            Self::RadialSymmetry => "symmetry_radial",
            Self::HorizontalEquilibrium => "equilibrium_horizontal",
            Self::VerticalEquilibrium => "equilibrium_vertical",
            Self::DensityHarmony => "harmony_density",
            Self::ProportionHarmony => "harmony_proportion",
            Self::Other(key) => key,
        }
    }

    /// Label for display.
    #[must_use]
    pub fn human_readable(&self) -> String {
        match self {
            Self::HorizontalBalance => "Horizontal balance".to_string(),
            Self::VerticalBalance => "Vertical balance".to_string(),
            Self::HorizontalSymmetry => "Horizontal symmetry".to_string(),
            Self::VerticalSymmetry => "Vertical symmetry".to_string(),
            Self::RadialSymmetry => "Radial symmetry".to_string(),
            Self::HorizontalEquilibrium => "Horizontal equilibrium".to_string(),
            Self::VerticalEquilibrium => "Vertical equilibrium".to_string(),
            Self::DensityHarmony => "Density harmony".to_string(),
            Self::ProportionHarmony => "Proportion harmony".to_string(),
            Self::Other(key) => {
                let mut label = key.replace('_', " ");
                if let Some(first) = label.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                label
            }
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for MetricType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for MetricType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let key = String::deserialize(deserializer)?;
        Ok(Self::from_key(&key))
    }
}

/// Highest score a metric or rating may carry.
pub const MAX_SCORE: u8 = 100;

fn deserialize_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let score = u8::deserialize(deserializer)?;
    if score > MAX_SCORE {
        return Err(serde::de::Error::custom(format!(
            "score {score} is above {MAX_SCORE}"
        )));
    }
    Ok(score)
}

/// A single heuristic score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    /// The metric type.
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    /// Human readable comment explaining the score.
    pub comment: String,
    /// Score in `0..=100`. Larger values are refused when decoding.
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
}

impl Metric {
    /// Create a new metric.
    #[must_use]
    pub fn new(metric_type: MetricType, score: u8, comment: impl Into<String>) -> Self {
        Self {
            metric_type,
            comment: comment.into(),
            score,
        }
    }
}

/// Metrics sharing a semantic section (balance, symmetry, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricGroup {
    /// Section title.
    pub section: String,
    /// Metrics in service order.
    pub metrics: Vec<Metric>,
}

/// RGB swatch, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Parse `#rrggbb` (the leading `#` is optional).
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid colour: {hex}")))
    }
}

/// A scored evaluation of a design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    /// Sectioned metric groups.
    pub metrics: Vec<MetricGroup>,
    /// Overall score in `0..=100`. Larger values are refused when decoding.
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    /// Display name given when the rating was saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<u64>,
    /// Reference to the rated screenshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Average colour of the rated screenshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_color: Option<Rgb>,
    /// Elements that produced this rating.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<UIElement>,
}

impl Rating {
    /// Create a rating with no bookkeeping fields.
    #[must_use]
    pub fn new(metrics: Vec<MetricGroup>, score: u8) -> Self {
        Self {
            metrics,
            score,
            name: None,
            created_at_ms: None,
            image_path: None,
            main_color: None,
            elements: Vec::new(),
        }
    }

    /// All metrics across groups, in group order.
    pub fn flattened_metrics(&self) -> impl Iterator<Item = &Metric> {
        self.metrics.iter().flat_map(|group| group.metrics.iter())
    }

    /// Map each metric type to its metric. When a type repeats, the later
    /// occurrence wins.
    #[must_use]
    pub fn metrics_by_type(&self) -> HashMap<&MetricType, &Metric> {
        self.flattened_metrics()
            .map(|metric| (&metric.metric_type, metric))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVICE_RESPONSE: &str = r#"{
        "score": 72,
        "metrics": [
            {"section": "balance", "metrics": [
                {"type": "balance_horizontal", "score": 80, "comment": "Good"},
                {"type": "balance_vertical", "score": 64, "comment": "Fair"}
            ]},
            {"section": "harmony", "metrics": [
                {"type": "harmony_contrast", "score": 70, "comment": "New metric"}
            ]}
        ]
    }"#;

    #[test]
    fn test_parses_service_response() {
        let rating: Rating = serde_json::from_str(SERVICE_RESPONSE).expect("parse");
        assert_eq!(rating.score, 72);
        assert_eq!(rating.metrics.len(), 2);
        assert_eq!(
            rating.metrics[0].metrics[0].metric_type,
            MetricType::HorizontalBalance
        );
        assert_eq!(
            rating.metrics[1].metrics[0].metric_type,
            MetricType::Other("harmony_contrast".to_string())
        );
        assert!(rating.name.is_none());
        assert!(rating.elements.is_empty());
    }

    #[test]
    fn test_unknown_metric_key_round_trips() {
        let metric = Metric::new(MetricType::from_key("harmony_contrast"), 50, "");
        let json = serde_json::to_value(&metric).expect("serialize");
        assert_eq!(json["type"], "harmony_contrast");
    }

    #[test]
    fn test_later_duplicate_wins() {
        let rating = Rating::new(
            vec![
                MetricGroup {
                    section: "a".to_string(),
                    metrics: vec![Metric::new(MetricType::HorizontalBalance, 10, "first")],
                },
                MetricGroup {
                    section: "b".to_string(),
                    metrics: vec![Metric::new(MetricType::HorizontalBalance, 90, "second")],
                },
            ],
            50,
        );
        let map = rating.metrics_by_type();
        assert_eq!(map.len(), 1);
        assert_eq!(map[&MetricType::HorizontalBalance].score, 90);
    }

    #[test]
    fn test_human_readable() {
        assert_eq!(
            MetricType::RadialSymmetry.human_readable(),
            "Radial symmetry"
        );
        assert_eq!(
            MetricType::from_key("color_contrast").human_readable(),
            "Color contrast"
        );
    }

    #[test]
    fn test_rgb_hex() {
        let colour = Rgb::from_hex("#1a2B3c").expect("valid");
        assert_eq!(colour, Rgb { r: 0x1a, g: 0x2b, b: 0x3c });
        assert_eq!(colour.to_string(), "#1a2b3c");
        assert!(Rgb::from_hex("#12345").is_none());
        assert!(Rgb::from_hex("zzzzzz").is_none());
    }

    #[test]
    fn test_bookkeeping_round_trip() {
        let mut rating = Rating::new(Vec::new(), 40);
        rating.name = Some("Login screen".to_string());
        rating.main_color = Some(Rgb { r: 255, g: 0, b: 16 });
        let json = serde_json::to_string(&rating).expect("serialize");
        assert!(json.contains("\"main_color\":\"#ff0010\""));
        let back: Rating = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, rating);
    }

    #[test]
    fn test_scores_above_hundred_are_refused() {
        let metric = r#"{"type": "balance_horizontal", "score": 150, "comment": ""}"#;
        assert!(serde_json::from_str::<Metric>(metric).is_err());
        let metric = r#"{"type": "balance_horizontal", "score": 100, "comment": ""}"#;
        let parsed: Metric = serde_json::from_str(metric).expect("in range");
        assert_eq!(parsed.score, MAX_SCORE);

        let rating = SERVICE_RESPONSE.replacen("\"score\": 72", "\"score\": 101", 1);
        assert!(serde_json::from_str::<Rating>(&rating).is_err());
        let nested = SERVICE_RESPONSE.replacen("\"score\": 80", "\"score\": 200", 1);
        assert!(serde_json::from_str::<Rating>(&nested).is_err());
    }
}
