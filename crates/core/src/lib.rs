//! Dialogue placement for a tank full of moving fish.
//!
//! ```text
//!   viewport ──▶ planner ──▶ rows ──┬──▶ lanes (at most N bubbles per row)
//!                                   └──▶ FIFO queue for the rest
//!   text ──▶ bubble sizer ──▶ width / height / wrapped lines
//!   engine.active_annotations() ──▶ views::bubbles ──▶ RenderCommand[]
//! ```
//!
//! The engine is single-threaded and never sleeps. Hosts call
//! [`PlacementEngine::constrain_position`] for each entity and
//! [`PlacementEngine::tick`] once per animation frame; every other operation
//! is a synchronous call from application logic.

pub mod clock;
pub mod config;
pub mod engine;
pub mod layout;
pub mod model;
pub mod row;
pub mod views;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{BubbleConfig, ConfigError, PlacementConfig, RowPolicy};
pub use engine::{AssignMode, DialogueState, PlacementEngine, RequestOutcome};
pub use layout::{CellFontMetric, FontMetric, ViewportGeometry};
pub use model::{Fish, SwimBand, Swimmer};
pub use row::{LaneState, Row, RowStats};
