pub mod bubble;
pub mod font;
pub mod planner;

pub use bubble::{BubbleSize, WrapStrategy, measure};
pub use font::{CellFontMetric, FontMetric};
pub use planner::{LaneGeometry, RowBounds, ViewportGeometry, plan};
