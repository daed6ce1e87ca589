//! Splits the viewport into horizontal rows and each row into bands.
//!
//! ```text
//!   row top ┌────────────────────────────────────────────┐
//!           │ annotation band   [lane 0] [lane 1] [lane 2]│
//!           │                                             │
//!           ├─────────────────────────────────────────────┤ swim_y_min
//!           │ swim band (swim_fraction of the row)        │
//!   row btm └─────────────────────────────────────────────┘ swim_y_max
//! ```
//!
//! Planning is a pure function of viewport size, device class and config.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::PlacementConfig;

/// Smallest viewport the planner will lay out. Smaller or non-finite inputs
/// are clamped up to this instead of producing degenerate bands.
pub const MIN_VIEWPORT_WIDTH: f64 = 160.0;
pub const MIN_VIEWPORT_HEIGHT: f64 = 120.0;

/// Horizontal extent of one lane, shared by every row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LaneGeometry {
    pub x_offset: f64,
    pub width: f64,
}

impl LaneGeometry {
    pub fn center(&self) -> f64 {
        self.x_offset + self.width * 0.5
    }
}

/// Absolute vertical bounds of one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RowBounds {
    pub row: usize,
    pub top: f64,
    pub bottom: f64,
    pub annotation_top: f64,
    pub annotation_bottom: f64,
    pub swim_y_min: f64,
    pub swim_y_max: f64,
}

impl RowBounds {
    pub fn swim_center(&self) -> f64 {
        (self.swim_y_min + self.swim_y_max) * 0.5
    }

    pub fn contains_swim_y(&self, y: f64) -> bool {
        y >= self.swim_y_min && y <= self.swim_y_max
    }
}

/// Row and lane layout for one viewport size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportGeometry {
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub row_count: usize,
    pub row_height: f64,
    /// Offsets are relative to the row top.
    pub annotation_band_offset: f64,
    pub annotation_band_height: f64,
    pub swim_band_offset: f64,
    pub swim_band_height: f64,
    pub lanes: Vec<LaneGeometry>,
}

impl ViewportGeometry {
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Bounds of `row`; out-of-range indices resolve to the last row.
    pub fn row_bounds(&self, row: usize) -> RowBounds {
        let row = row.min(self.row_count.saturating_sub(1));
        let top = row as f64 * self.row_height;
        let swim_y_min = top + self.swim_band_offset;
        let swim_y_max = (swim_y_min + self.swim_band_height).min(self.viewport_height);
        RowBounds {
            row,
            top,
            bottom: top + self.row_height,
            annotation_top: top + self.annotation_band_offset,
            annotation_bottom: top + self.annotation_band_offset + self.annotation_band_height,
            swim_y_min,
            swim_y_max,
        }
    }

    /// The row whose swim band contains `y`, if any.
    ///
    /// A swim band ends on its row's bottom edge, so `y` on that edge falls
    /// in the row above the one `y / row_height` points at.
    pub fn row_containing(&self, y: f64) -> Option<usize> {
        if !y.is_finite() || y < 0.0 {
            return None;
        }
        let candidate = (y / self.row_height).floor() as usize;
        (candidate.saturating_sub(1)..=candidate)
            .filter(|row| *row < self.row_count)
            .find(|row| self.row_bounds(*row).contains_swim_y(y))
    }

    /// Map `y` onto a row proportionally to its share of the viewport height.
    /// Positions above or below the viewport land in the first or last row.
    pub fn proportional_row(&self, y: f64) -> usize {
        if !y.is_finite() || y <= 0.0 {
            return 0;
        }
        let frac = y / self.viewport_height;
        ((frac * self.row_count as f64).floor() as usize).min(self.row_count - 1)
    }
}

fn sanitize(value: f64, min: f64, name: &str) -> f64 {
    if value.is_finite() && value >= min {
        return value;
    }
    warn!(value, min, dimension = name, "viewport dimension clamped");
    min
}

/// Compute the row and lane layout for a viewport.
pub fn plan(
    viewport_width: f64,
    viewport_height: f64,
    is_compact: bool,
    config: &PlacementConfig,
) -> ViewportGeometry {
    let width = sanitize(viewport_width, MIN_VIEWPORT_WIDTH, "width");
    let height = sanitize(viewport_height, MIN_VIEWPORT_HEIGHT, "height");
    let policy = config.row_policy(is_compact);

    let needed = (height / policy.min_row_height.max(1.0)).ceil() as usize;
    let row_count = needed
        .max(policy.min_rows)
        .min(config.max_rows)
        .min(height.floor() as usize)
        .max(1);
    let row_height = (height / row_count as f64).floor();

    let mut swim_band_height = (row_height * config.swim_fraction).floor().clamp(1.0, row_height);
    let swim_band_offset = row_height - swim_band_height;
    let annotation_band_height = config.annotation_band_height.min(swim_band_offset);

    // Rounding must never push the last swim band below the canvas.
    let last_swim_max = (row_count - 1) as f64 * row_height + swim_band_offset + swim_band_height;
    if last_swim_max > height {
        let overflow = last_swim_max - height;
        warn!(overflow, "last row swim band clamped to viewport height");
        swim_band_height = (swim_band_height - overflow).max(0.0);
    }

    let lanes = plan_lanes(width, config.lane_count.max(1), config.lane_margin);

    debug!(
        width,
        height,
        is_compact,
        row_count,
        row_height,
        swim_band_height,
        lanes = lanes.len(),
        "planned viewport geometry"
    );

    ViewportGeometry {
        viewport_width: width,
        viewport_height: height,
        row_count,
        row_height,
        annotation_band_offset: 0.0,
        annotation_band_height,
        swim_band_offset,
        swim_band_height,
        lanes,
    }
}

fn plan_lanes(width: f64, count: usize, margin: f64) -> Vec<LaneGeometry> {
    let n = count as f64;
    let mut margin = margin.max(0.0);
    let mut lane_width = (width - margin * (n + 1.0)) / n;
    if lane_width < 1.0 {
        margin = 0.0;
        lane_width = width / n;
    }
    (0..count)
        .map(|i| LaneGeometry {
            x_offset: margin + i as f64 * (lane_width + margin),
            width: lane_width,
        })
        .collect()
}
