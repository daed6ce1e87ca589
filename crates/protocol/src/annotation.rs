use serde::{Deserialize, Serialize};

use crate::shared_str::SharedStr;
use crate::theme::StyleTag;
use crate::types::EntityId;

/// Read-only snapshot of one displayed dialogue, handed to renderers.
///
/// Carries no anchor position: the renderer anchors the bubble on the
/// owner's *current* position every frame, so the bubble follows a moving
/// entity. `lane` is the reserved slot at grant time and only describes the
/// initial placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationView {
    pub owner: EntityId,
    pub text: SharedStr,
    /// Text already broken into display lines with the shared font metric.
    pub lines: Vec<SharedStr>,
    pub width: f64,
    pub height: f64,
    pub row: usize,
    pub lane: usize,
    pub created_at_ms: u64,
    pub duration_ms: u64,
    pub style: StyleTag,
}

impl AnnotationView {
    /// Milliseconds since the bubble appeared, saturating at zero.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }

    pub fn expires_at_ms(&self) -> u64 {
        self.created_at_ms.saturating_add(self.duration_ms)
    }
}
