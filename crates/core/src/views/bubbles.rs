//! Turns dialogue snapshots into bubble draw commands.
//!
//! Bubbles are anchored on the speaker's *current* position every frame and
//! only clamped to the viewport edges, not to the lane reserved at grant
//! time. Lanes bound how many bubbles a row shows at once and where they
//! first appear; two bubbles can still overlap once their speakers swim
//! towards each other.

use shoal_protocol::{AnnotationView, EntityId, Point, Rect, RenderCommand, Viewport};

use crate::config::BubbleConfig;

/// Presentation knobs that do not affect sizing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleRenderOptions {
    /// Gap between the speaker and the bubble's bottom edge.
    pub anchor_gap: f64,
    /// Bubbles keep at least this distance from the viewport edges.
    pub edge_margin: f64,
    pub fade_in_ms: u64,
    pub fade_out_ms: u64,
}

impl Default for BubbleRenderOptions {
    fn default() -> Self {
        Self {
            anchor_gap: 12.0,
            edge_margin: 4.0,
            fade_in_ms: 250,
            fade_out_ms: 400,
        }
    }
}

/// Opacity of a bubble `age_ms` into its `duration_ms` lifetime: ramps up
/// over `fade_in_ms`, down over the last `fade_out_ms`, zero once expired.
pub fn fade_opacity(age_ms: u64, duration_ms: u64, fade_in_ms: u64, fade_out_ms: u64) -> f64 {
    if age_ms >= duration_ms {
        return 0.0;
    }
    let fade_in = if fade_in_ms == 0 {
        1.0
    } else {
        (age_ms as f64 / fade_in_ms as f64).min(1.0)
    };
    let remaining = duration_ms - age_ms;
    let fade_out = if fade_out_ms == 0 {
        1.0
    } else {
        (remaining as f64 / fade_out_ms as f64).min(1.0)
    };
    fade_in.min(fade_out)
}

/// Position a `width` x `height` bubble above `anchor`, flipping below it
/// when there is no room on top, and keep it inside the viewport.
pub fn bubble_rect(
    anchor: Point,
    width: f64,
    height: f64,
    viewport: &Viewport,
    options: &BubbleRenderOptions,
) -> Rect {
    let margin = options.edge_margin;
    let left = viewport.x + margin;
    let top = viewport.y + margin;
    let right = viewport.x + viewport.width - margin;
    let bottom = viewport.y + viewport.height - margin;

    let mut x = anchor.x - width * 0.5;
    x = x.min(right - width).max(left);

    let mut y = anchor.y - options.anchor_gap - height;
    if y < top {
        y = anchor.y + options.anchor_gap;
    }
    y = y.min(bottom - height).max(top);

    Rect::new(x, y, width, height)
}

/// Emit one `DrawBubble` per visible dialogue. `anchor_of` resolves an
/// owner's current position; dialogue whose owner cannot be found is
/// skipped for this frame.
pub fn render_bubbles(
    annotations: &[AnnotationView],
    anchor_of: impl Fn(EntityId) -> Option<Point>,
    viewport: &Viewport,
    now_ms: u64,
    config: &BubbleConfig,
    options: &BubbleRenderOptions,
) -> Vec<RenderCommand> {
    if annotations.is_empty() {
        return Vec::new();
    }

    let mut commands = Vec::with_capacity(annotations.len() + 2);
    commands.push(RenderCommand::BeginGroup {
        id: "bubbles".into(),
        label: Some("Dialogue".into()),
    });

    for view in annotations {
        let Some(anchor) = anchor_of(view.owner) else {
            continue;
        };
        let opacity = fade_opacity(
            view.age_ms(now_ms),
            view.duration_ms,
            options.fade_in_ms,
            options.fade_out_ms,
        );
        if opacity <= 0.0 {
            continue;
        }
        let rect = bubble_rect(anchor, view.width, view.height, viewport, options);
        let tail = Point::new(
            anchor.x.clamp(viewport.x, viewport.x + viewport.width),
            anchor.y.clamp(viewport.y, viewport.y + viewport.height),
        );
        commands.push(RenderCommand::DrawBubble {
            rect,
            tail,
            lines: view.lines.clone(),
            line_height: config.line_height,
            padding: Point::new(config.padding_x, config.padding_y),
            palette: view.style.palette(),
            opacity,
        });
    }

    commands.push(RenderCommand::EndGroup);
    commands
}
