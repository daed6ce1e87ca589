use serde::{Deserialize, Serialize};

use crate::shared_str::SharedStr;
use crate::theme::{BubblePalette, ThemeToken};
use crate::types::{Point, Rect};

/// A single, stateless render instruction.
///
/// Views emit a `Vec<RenderCommand>` per frame. Renderers consume this list
/// sequentially; each command carries all the data it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RenderCommand {
    /// Draw a filled rectangle, optionally with a text label.
    DrawRect {
        rect: Rect,
        color: ThemeToken,
        border_color: Option<ThemeToken>,
        label: Option<SharedStr>,
    },

    /// Draw a text string at a position.
    DrawText {
        position: Point,
        text: SharedStr,
        color: ThemeToken,
        font_size: f64,
        align: TextAlign,
    },

    /// Draw a line segment.
    DrawLine {
        from: Point,
        to: Point,
        color: ThemeToken,
        width: f64,
    },

    /// Draw a dialogue bubble: a box holding pre-wrapped lines plus a tail
    /// pointing at the speaker. Lines are laid out top to bottom starting at
    /// `rect.y + padding.y`, `line_height` apart.
    DrawBubble {
        rect: Rect,
        tail: Point,
        lines: Vec<SharedStr>,
        line_height: f64,
        padding: Point,
        palette: BubblePalette,
        /// 0.0 (invisible) to 1.0 (opaque).
        opacity: f64,
    },

    /// Restrict subsequent drawing to a rectangular region.
    SetClip { rect: Rect },

    /// Remove the active clip region.
    ClearClip,

    /// Begin a logical group (e.g. a row). Renderers may use this for
    /// batching or layer separation.
    BeginGroup {
        id: SharedStr,
        label: Option<SharedStr>,
    },

    /// End the current group.
    EndGroup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    Left,
    Center,
    Right,
}
