use unicode_width::UnicodeWidthStr;

/// Width measurement for dialogue text.
///
/// The bubble sizer wraps with this metric and the renderer draws with it.
/// Both must see the same instance (the engine hands its `Arc` out through
/// `PlacementEngine::font_metric`), otherwise wrapped lines will not fit the
/// bubble they were sized for.
pub trait FontMetric {
    /// Advance width of `text` on a single line, in logical pixels.
    fn text_width(&self, text: &str) -> f64;
}

/// Fixed-pitch metric over terminal cell widths: CJK and other wide glyphs
/// take two cells, combining marks none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellFontMetric {
    pub cell_width: f64,
}

impl CellFontMetric {
    pub fn new(cell_width: f64) -> Self {
        Self { cell_width }
    }
}

impl Default for CellFontMetric {
    fn default() -> Self {
        Self::new(8.0)
    }
}

impl FontMetric for CellFontMetric {
    fn text_width(&self, text: &str) -> f64 {
        text.width() as f64 * self.cell_width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wide_glyphs_take_two_cells() {
        let metric = CellFontMetric::new(8.0);
        assert!((metric.text_width("Hi!") - 24.0).abs() < f64::EPSILON);
        assert!((metric.text_width("鱼") - 16.0).abs() < f64::EPSILON);
        assert!(metric.text_width("").abs() < f64::EPSILON);
    }
}
