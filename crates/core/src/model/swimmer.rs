use serde::{Deserialize, Serialize};
use shoal_protocol::{EntityId, Point, StyleTag};

/// Row assignment and vertical limits the engine stores on an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwimBand {
    pub row_index: usize,
    pub y_min: f64,
    pub y_max: f64,
}

impl SwimBand {
    pub fn clamp(&self, y: f64) -> f64 {
        if y.is_finite() {
            y.clamp(self.y_min, self.y_max)
        } else {
            self.y_min
        }
    }
}

/// The view the engine has of a host-owned moving entity.
///
/// The host moves the entity; the engine only reads its position, writes
/// its [`SwimBand`], and pulls `y` back into that band.
pub trait Swimmer {
    fn id(&self) -> EntityId;
    fn x(&self) -> Option<f64>;
    fn y(&self) -> Option<f64>;
    fn set_y(&mut self, y: f64);
    fn band(&self) -> Option<SwimBand>;
    fn set_band(&mut self, band: SwimBand);

    /// Mood used to style this entity's dialogue.
    fn style(&self) -> StyleTag {
        StyleTag::Default
    }
}

/// Plain entity record for hosts that have nothing richer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fish {
    pub id: EntityId,
    pub x: Option<f64>,
    pub y: Option<f64>,
    #[serde(default)]
    pub band: Option<SwimBand>,
    #[serde(default)]
    pub mood: StyleTag,
}

impl Fish {
    /// A fish that has not been placed yet.
    pub fn new(id: u64) -> Self {
        Self {
            id: EntityId(id),
            x: None,
            y: None,
            band: None,
            mood: StyleTag::Default,
        }
    }

    pub fn at(id: u64, x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Self::new(id)
        }
    }

    pub fn with_mood(mut self, mood: StyleTag) -> Self {
        self.mood = mood;
        self
    }

    pub fn position(&self) -> Option<Point> {
        Some(Point::new(self.x?, self.y?))
    }
}

impl Swimmer for Fish {
    fn id(&self) -> EntityId {
        self.id
    }

    fn x(&self) -> Option<f64> {
        self.x
    }

    fn y(&self) -> Option<f64> {
        self.y
    }

    fn set_y(&mut self, y: f64) {
        self.y = Some(y);
    }

    fn band(&self) -> Option<SwimBand> {
        self.band
    }

    fn set_band(&mut self, band: SwimBand) {
        self.band = Some(band);
    }

    fn style(&self) -> StyleTag {
        self.mood
    }
}
