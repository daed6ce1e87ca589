//! Tunable policy for the placement engine.
//!
//! Every knob has a default matching the reference tank layout, so hosts
//! usually deserialize a partial JSON document and let `#[serde(default)]`
//! fill in the rest.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{field} must be {expected}, got {value}")]
    OutOfRange {
        field: &'static str,
        expected: &'static str,
        value: f64,
    },
}

/// Row planning policy for one device class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowPolicy {
    /// Rows are added until each is at most this tall.
    pub min_row_height: f64,
    /// Floor on the number of rows regardless of viewport height.
    pub min_rows: usize,
}

impl Default for RowPolicy {
    fn default() -> Self {
        Self {
            min_row_height: 200.0,
            min_rows: 2,
        }
    }
}

/// Bubble geometry. Widths and heights are in the same logical pixels the
/// font metric reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BubbleConfig {
    pub min_width: f64,
    pub max_width: f64,
    /// Bubbles whose single-line width exceeds this wrap at `max_width`.
    pub ideal_single_line_width: f64,
    pub line_height: f64,
    pub padding_x: f64,
    pub padding_y: f64,
    /// Space-to-character ratio above which text is word-wrapped rather
    /// than wrapped per character.
    pub word_wrap_space_ratio: f64,
}

impl Default for BubbleConfig {
    fn default() -> Self {
        Self {
            min_width: 60.0,
            max_width: 200.0,
            ideal_single_line_width: 200.0,
            line_height: 18.0,
            padding_x: 10.0,
            padding_y: 8.0,
            word_wrap_space_ratio: 0.1,
        }
    }
}

impl BubbleConfig {
    /// Widest a single wrapped line may be.
    pub fn content_width(&self) -> f64 {
        (self.max_width - 2.0 * self.padding_x).max(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    pub lane_count: usize,
    pub lane_margin: f64,
    /// Share of each row's height entities may swim in.
    pub swim_fraction: f64,
    /// Height of the band at the top of each row bubbles are anchored in.
    pub annotation_band_height: f64,
    pub regular_rows: RowPolicy,
    pub compact_rows: RowPolicy,
    pub max_rows: usize,
    pub default_duration_ms: u64,
    pub bubble: BubbleConfig,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            lane_count: 3,
            lane_margin: 10.0,
            swim_fraction: 0.7,
            annotation_band_height: 40.0,
            regular_rows: RowPolicy::default(),
            compact_rows: RowPolicy {
                min_row_height: 140.0,
                min_rows: 3,
            },
            max_rows: 8,
            default_duration_ms: 5000,
            bubble: BubbleConfig::default(),
        }
    }
}

impl PlacementConfig {
    /// Parse and validate a (possibly partial) JSON document.
    pub fn from_json(data: &str) -> Result<Self, ConfigError> {
        let config: PlacementConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn row_policy(&self, is_compact: bool) -> RowPolicy {
        if is_compact {
            self.compact_rows
        } else {
            self.regular_rows
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(
            field: &'static str,
            expected: &'static str,
            value: f64,
            ok: bool,
        ) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange {
                    field,
                    expected,
                    value,
                })
            }
        }

        let b = &self.bubble;
        check("lane_count", "at least 1", self.lane_count as f64, self.lane_count >= 1)?;
        check("max_rows", "at least 1", self.max_rows as f64, self.max_rows >= 1)?;
        check(
            "swim_fraction",
            "in (0, 1]",
            self.swim_fraction,
            self.swim_fraction > 0.0 && self.swim_fraction <= 1.0,
        )?;
        check("lane_margin", "non-negative", self.lane_margin, self.lane_margin >= 0.0)?;
        check(
            "annotation_band_height",
            "non-negative",
            self.annotation_band_height,
            self.annotation_band_height >= 0.0,
        )?;
        for (field, policy) in [
            ("regular_rows.min_row_height", self.regular_rows),
            ("compact_rows.min_row_height", self.compact_rows),
        ] {
            check(field, "positive", policy.min_row_height, policy.min_row_height > 0.0)?;
        }
        check("bubble.min_width", "positive", b.min_width, b.min_width > 0.0)?;
        check(
            "bubble.max_width",
            "at least bubble.min_width",
            b.max_width,
            b.max_width >= b.min_width,
        )?;
        check("bubble.line_height", "positive", b.line_height, b.line_height > 0.0)?;
        check(
            "bubble.word_wrap_space_ratio",
            "in [0, 1]",
            b.word_wrap_space_ratio,
            (0.0..=1.0).contains(&b.word_wrap_space_ratio),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = PlacementConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lane_count, 3);
        assert_eq!(config.default_duration_ms, 5000);
        assert!((config.swim_fraction - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = PlacementConfig::from_json(r#"{ "lane_count": 4, "bubble": { "max_width": 240 } }"#)
            .unwrap_or_default();
        assert_eq!(config.lane_count, 4);
        assert!((config.bubble.max_width - 240.0).abs() < f64::EPSILON);
        assert!((config.bubble.min_width - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.compact_rows.min_rows, 3);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = PlacementConfig::from_json(r#"{ "swim_fraction": 1.5 }"#);
        assert!(matches!(
            err,
            Err(ConfigError::OutOfRange {
                field: "swim_fraction",
                ..
            })
        ));
        let err = PlacementConfig::from_json(r#"{ "lane_count": 0 }"#);
        assert!(err.is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            PlacementConfig::from_json("{ lane_count"),
            Err(ConfigError::Json(_))
        ));
    }
}
