use shoal_protocol::{Point, Rect, RenderCommand, ThemeToken, Viewport};

use crate::layout::planner::ViewportGeometry;

/// Background and row guides: each row's annotation band with its lanes,
/// and its swim band.
pub fn render_tank(geometry: &ViewportGeometry, viewport: &Viewport) -> Vec<RenderCommand> {
    let mut commands = Vec::with_capacity(2 + geometry.row_count * (5 + geometry.lane_count()));
    commands.push(RenderCommand::DrawRect {
        rect: Rect::new(viewport.x, viewport.y, viewport.width, viewport.height),
        color: ThemeToken::Water,
        border_color: None,
        label: None,
    });

    for row in 0..geometry.row_count {
        let bounds = geometry.row_bounds(row);
        commands.push(RenderCommand::BeginGroup {
            id: format!("row-{row}").into(),
            label: Some(format!("Row {}", row + 1).into()),
        });

        let band_height = bounds.annotation_bottom - bounds.annotation_top;
        if band_height > 0.0 {
            commands.push(RenderCommand::DrawRect {
                rect: Rect::new(0.0, bounds.annotation_top, geometry.viewport_width, band_height),
                color: ThemeToken::AnnotationBand,
                border_color: None,
                label: None,
            });
            for lane in &geometry.lanes {
                commands.push(RenderCommand::DrawRect {
                    rect: Rect::new(lane.x_offset, bounds.annotation_top, lane.width, band_height),
                    color: ThemeToken::AnnotationBand,
                    border_color: Some(ThemeToken::LaneGuide),
                    label: None,
                });
            }
        }

        commands.push(RenderCommand::DrawRect {
            rect: Rect::new(
                0.0,
                bounds.swim_y_min,
                geometry.viewport_width,
                bounds.swim_y_max - bounds.swim_y_min,
            ),
            color: ThemeToken::SwimBand,
            border_color: None,
            label: None,
        });
        commands.push(RenderCommand::DrawLine {
            from: Point::new(0.0, bounds.bottom),
            to: Point::new(geometry.viewport_width, bounds.bottom),
            color: ThemeToken::RowBorder,
            width: 1.0,
        });
        commands.push(RenderCommand::EndGroup);
    }
    commands
}
