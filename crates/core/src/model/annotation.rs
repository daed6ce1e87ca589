use shoal_protocol::{AnnotationView, EntityId, SharedStr, StyleTag};

/// A request to show `text` above an entity for `duration_ms`.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogueRequest {
    pub owner: EntityId,
    /// Horizontal position of the speaker when it asked; picks the lane.
    pub entity_x: f64,
    pub text: SharedStr,
    pub duration_ms: u64,
    pub style: StyleTag,
}

/// A request parked in a row's overflow queue.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub request: DialogueRequest,
    pub enqueued_at_ms: u64,
}

/// A dialogue currently holding a lane. Owned by its row; the entity only
/// knows its own id.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub owner: EntityId,
    pub text: SharedStr,
    pub lines: Vec<SharedStr>,
    pub lane: usize,
    pub width: f64,
    pub height: f64,
    pub created_at_ms: u64,
    pub duration_ms: u64,
    pub style: StyleTag,
    /// Unique per grant; lets a firing timer tell whether the annotation it
    /// was scheduled for is still the one on screen.
    pub(crate) serial: u64,
}

impl Annotation {
    pub fn expires_at_ms(&self) -> u64 {
        self.created_at_ms.saturating_add(self.duration_ms)
    }

    pub fn view(&self, row: usize) -> AnnotationView {
        AnnotationView {
            owner: self.owner,
            text: self.text.clone(),
            lines: self.lines.clone(),
            width: self.width,
            height: self.height,
            row,
            lane: self.lane,
            created_at_ms: self.created_at_ms,
            duration_ms: self.duration_ms,
            style: self.style,
        }
    }
}
