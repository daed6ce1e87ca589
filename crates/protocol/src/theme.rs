use serde::{Deserialize, Serialize};

/// Semantic color tokens resolved by the renderer's active theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeToken {
    Background,
    Water,

    RowBorder,
    SwimBand,
    AnnotationBand,
    LaneGuide,

    FishBody,
    FishLabel,

    TextPrimary,
    TextMuted,

    // Dialogue bubbles, one fill/border/text triple per style.
    BubbleDefaultFill,
    BubbleDefaultBorder,
    BubbleDefaultText,
    BubbleCheerfulFill,
    BubbleCheerfulBorder,
    BubbleCheerfulText,
    BubbleShyFill,
    BubbleShyBorder,
    BubbleShyText,
    BubbleBraveFill,
    BubbleBraveBorder,
    BubbleBraveText,
    BubbleLazyFill,
    BubbleLazyBorder,
    BubbleLazyText,
}

/// Caller-supplied category of a dialogue, usually the speaker's mood.
///
/// A closed set: anything the host does not recognise maps to `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTag {
    #[default]
    Default,
    Cheerful,
    Shy,
    Brave,
    Lazy,
}

impl StyleTag {
    pub const ALL: [StyleTag; 5] = [
        StyleTag::Default,
        StyleTag::Cheerful,
        StyleTag::Shy,
        StyleTag::Brave,
        StyleTag::Lazy,
    ];

    /// Lenient parse used at host boundaries (JSON from a browser, CLI flags).
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "cheerful" => StyleTag::Cheerful,
            "shy" => StyleTag::Shy,
            "brave" => StyleTag::Brave,
            "lazy" => StyleTag::Lazy,
            _ => StyleTag::Default,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StyleTag::Default => "default",
            StyleTag::Cheerful => "cheerful",
            StyleTag::Shy => "shy",
            StyleTag::Brave => "brave",
            StyleTag::Lazy => "lazy",
        }
    }

    /// Palette used to paint a bubble of this style.
    pub fn palette(self) -> BubblePalette {
        PALETTES[self as usize]
    }
}

/// Tokens needed to paint one dialogue bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BubblePalette {
    pub fill: ThemeToken,
    pub border: ThemeToken,
    pub text: ThemeToken,
}

// Indexed by `StyleTag` discriminant.
const PALETTES: [BubblePalette; 5] = [
    BubblePalette {
        fill: ThemeToken::BubbleDefaultFill,
        border: ThemeToken::BubbleDefaultBorder,
        text: ThemeToken::BubbleDefaultText,
    },
    BubblePalette {
        fill: ThemeToken::BubbleCheerfulFill,
        border: ThemeToken::BubbleCheerfulBorder,
        text: ThemeToken::BubbleCheerfulText,
    },
    BubblePalette {
        fill: ThemeToken::BubbleShyFill,
        border: ThemeToken::BubbleShyBorder,
        text: ThemeToken::BubbleShyText,
    },
    BubblePalette {
        fill: ThemeToken::BubbleBraveFill,
        border: ThemeToken::BubbleBraveBorder,
        text: ThemeToken::BubbleBraveText,
    },
    BubblePalette {
        fill: ThemeToken::BubbleLazyFill,
        border: ThemeToken::BubbleLazyBorder,
        text: ThemeToken::BubbleLazyText,
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_style_has_a_distinct_palette() {
        for (i, a) in StyleTag::ALL.iter().enumerate() {
            for b in &StyleTag::ALL[i + 1..] {
                assert_ne!(a.palette().fill, b.palette().fill);
            }
        }
        assert_eq!(StyleTag::Shy.palette().text, ThemeToken::BubbleShyText);
    }

    #[test]
    fn unknown_tags_fall_back_to_default() {
        assert_eq!(StyleTag::from_tag(" Brave "), StyleTag::Brave);
        assert_eq!(StyleTag::from_tag("grumpy"), StyleTag::Default);
        for style in StyleTag::ALL {
            assert_eq!(StyleTag::from_tag(style.as_str()), style);
        }
    }

    #[test]
    fn style_serializes_lowercase() {
        let json = serde_json::to_string(&StyleTag::Cheerful).unwrap_or_default();
        assert_eq!(json, "\"cheerful\"");
    }
}
