//! Dialogue bubble sizing.
//!
//! Text is measured with the shared [`FontMetric`]. Short text gets a
//! single-line bubble hugging the text; longer text is wrapped to the
//! configured maximum width and the bubble grows downwards.
//!
//! Choosing between word and per-character wrapping is a heuristic, not
//! language detection: text where spaces make up more than
//! `word_wrap_space_ratio` of the characters is treated as space-delimited,
//! anything denser (Chinese, Japanese, a long URL) is broken per grapheme.

use serde::Serialize;
use shoal_protocol::SharedStr;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::BubbleConfig;
use crate::layout::font::FontMetric;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WrapStrategy {
    /// Break between words; a word is only split if it alone is too wide.
    Words,
    /// Break between any two grapheme clusters.
    Graphemes,
}

/// Outer size of a bubble plus the lines it displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubbleSize {
    pub width: f64,
    pub height: f64,
    pub lines: Vec<SharedStr>,
}

pub fn wrap_strategy(text: &str, space_ratio: f64) -> WrapStrategy {
    let (total, spaces) = text.chars().fold((0usize, 0usize), |(total, spaces), c| {
        (total + 1, spaces + usize::from(c == ' '))
    });
    if total > 0 && spaces as f64 / total as f64 > space_ratio {
        WrapStrategy::Words
    } else {
        WrapStrategy::Graphemes
    }
}

/// Size the bubble for `text`. Deterministic for identical inputs.
pub fn measure(text: &str, metric: &dyn FontMetric, config: &BubbleConfig) -> BubbleSize {
    let pad_x = config.padding_x * 2.0;
    let paragraphs: Vec<&str> = text.split('\n').collect();
    let single_line = paragraphs
        .iter()
        .map(|p| metric.text_width(p))
        .fold(0.0, f64::max)
        + pad_x;

    let lines: Vec<String> = if single_line <= config.ideal_single_line_width.min(config.max_width) {
        paragraphs.iter().map(|p| (*p).to_string()).collect()
    } else {
        let strategy = wrap_strategy(text, config.word_wrap_space_ratio);
        let content_width = config.content_width();
        paragraphs
            .iter()
            .flat_map(|p| wrap(p, content_width, strategy, metric))
            .collect()
    };

    let widest = lines
        .iter()
        .map(|l| metric.text_width(l))
        .fold(0.0, f64::max);
    let width = (widest + pad_x).clamp(config.min_width, config.max_width);
    let height = lines.len() as f64 * config.line_height + config.padding_y * 2.0;

    BubbleSize {
        width,
        height,
        lines: lines.into_iter().map(SharedStr::from).collect(),
    }
}

/// Break one paragraph into lines no wider than `max_width` where possible.
/// Always returns at least one line.
pub fn wrap(
    paragraph: &str,
    max_width: f64,
    strategy: WrapStrategy,
    metric: &dyn FontMetric,
) -> Vec<String> {
    match strategy {
        WrapStrategy::Words => wrap_words(paragraph, max_width, metric),
        WrapStrategy::Graphemes => wrap_graphemes(paragraph, max_width, metric),
    }
}

fn wrap_graphemes(text: &str, max_width: f64, metric: &dyn FontMetric) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;

    for grapheme in text.graphemes(true) {
        let w = metric.text_width(grapheme);
        if current_width + w > max_width && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        current.push_str(grapheme);
        current_width += w;
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

fn wrap_words(text: &str, max_width: f64, metric: &dyn FontMetric) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        if current.is_empty() {
            if metric.text_width(word) <= max_width {
                current.push_str(word);
            } else {
                let mut pieces = wrap_graphemes(word, max_width, metric);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
            continue;
        }

        let candidate = format!("{current} {word}");
        if metric.text_width(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            if metric.text_width(word) <= max_width {
                current.push_str(word);
            } else {
                let mut pieces = wrap_graphemes(word, max_width, metric);
                current = pieces.pop().unwrap_or_default();
                lines.extend(pieces);
            }
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::font::CellFontMetric;

    const CJK: &str = "这是一个比较长的中文测试对话内容用于换行测试";
    const ENGLISH: &str = "This is a reasonably long English sentence for wrap testing";

    fn metric() -> CellFontMetric {
        CellFontMetric::new(8.0)
    }

    #[test]
    fn short_text_hugs_a_single_line() {
        let config = BubbleConfig::default();
        let size = measure("Hi!", &metric(), &config);
        assert_eq!(size.lines, vec![SharedStr::from("Hi!")]);
        // 24px of text + 20px padding sits under the minimum width.
        assert!((size.width - config.min_width).abs() < f64::EPSILON);
        assert!((size.height - (config.line_height + 2.0 * config.padding_y)).abs() < f64::EPSILON);

        let size = measure("Hello there, fish!", &metric(), &config);
        assert_eq!(size.lines.len(), 1);
        assert!((size.width - (18.0 * 8.0 + 20.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn dense_text_wraps_per_character() {
        let config = BubbleConfig::default();
        assert_eq!(wrap_strategy(CJK, config.word_wrap_space_ratio), WrapStrategy::Graphemes);
        let size = measure(CJK, &metric(), &config);
        assert!(size.lines.len() > 1);
        for line in &size.lines {
            assert!(metric().text_width(line) <= 200.0, "{line} too wide");
        }
        let joined: String = size.lines.iter().map(SharedStr::as_str).collect();
        assert_eq!(joined, CJK);
        assert!(size.width <= config.max_width);
    }

    #[test]
    fn spaced_text_wraps_on_word_boundaries() {
        let config = BubbleConfig::default();
        assert_eq!(wrap_strategy(ENGLISH, config.word_wrap_space_ratio), WrapStrategy::Words);
        let size = measure(ENGLISH, &metric(), &config);
        assert!(size.lines.len() > 1);
        let words: Vec<&str> = ENGLISH.split(' ').collect();
        for line in &size.lines {
            assert!(metric().text_width(line) <= config.content_width());
            for word in line.split(' ') {
                assert!(words.contains(&word), "split word {word:?}");
            }
        }
        let rejoined = size
            .lines
            .iter()
            .map(SharedStr::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rejoined, ENGLISH);
    }

    #[test]
    fn oversized_word_is_the_only_thing_split() {
        let long = "a supercalifragilisticexpialidocious fish";
        let lines = wrap(long, 80.0, WrapStrategy::Words, &metric());
        assert_eq!(
            lines,
            vec!["a", "supercalif", "ragilistic", "expialidoc", "ious fish"]
        );
        assert!(lines.iter().all(|l| metric().text_width(l) <= 80.0));
    }

    #[test]
    fn newlines_force_breaks() {
        let size = measure("one\ntwo", &metric(), &BubbleConfig::default());
        assert_eq!(size.lines, vec![SharedStr::from("one"), SharedStr::from("two")]);
    }

    #[test]
    fn empty_text_still_has_one_line() {
        let config = BubbleConfig::default();
        let size = measure("", &metric(), &config);
        assert_eq!(size.lines.len(), 1);
        assert!((size.width - config.min_width).abs() < f64::EPSILON);
    }

    #[test]
    fn measuring_is_deterministic() {
        let config = BubbleConfig::default();
        assert_eq!(measure(ENGLISH, &metric(), &config), measure(ENGLISH, &metric(), &config));
        assert_eq!(measure(CJK, &metric(), &config), measure(CJK, &metric(), &config));
    }
}
