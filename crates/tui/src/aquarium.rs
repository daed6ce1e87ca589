//! Toy host for the engine: fish that drift around and chatter at random.
//! Motion lives here, not in the engine; the engine only keeps each fish
//! inside its swim band and decides where its dialogue goes.

use std::sync::Arc;

use shoal_core::views::bubbles::{BubbleRenderOptions, render_bubbles};
use shoal_core::views::tank::render_tank;
use shoal_core::{
    AssignMode, CellFontMetric, DialogueState, Fish, MonotonicClock, PlacementConfig,
    PlacementEngine, RequestOutcome, SwimBand, Swimmer,
};
use shoal_protocol::{
    EntityId, Point, RenderCommand, StyleTag, TextAlign, ThemeToken, Viewport,
};
use tracing::info;

/// Logical pixels per terminal cell.
pub const CELL_WIDTH: f64 = 8.0;
pub const CELL_HEIGHT: f64 = 16.0;

const NAMES: [&str; 8] = ["Bubbles", "Finn", "Coral", "Gill", "Nemo", "Marlin", "Dory", "Koi"];

fn chatter(mood: StyleTag) -> &'static [&'static str] {
    match mood {
        StyleTag::Cheerful => &[
            "What a lovely day for a swim!",
            "Hi!",
            "今天的水好清澈呀",
        ],
        StyleTag::Shy => &["...hello", "Oh! You startled me", "我先躲到水草后面"],
        StyleTag::Brave => &[
            "I will explore the sunken castle tonight",
            "Follow me!",
            "我今天游了好远好远的路",
        ],
        StyleTag::Lazy => &["Five more minutes", "zzz", "Is it feeding time yet?"],
        StyleTag::Default => &["Blub.", "Anyone seen my pebble?", "The filter is noisy today"],
    }
}

/// xorshift64*: enough randomness for fish small talk.
#[derive(Debug, Clone)]
struct Rng(u64);

impl Rng {
    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 >> 12;
        self.0 ^= self.0 << 25;
        self.0 ^= self.0 >> 27;
        self.0.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n.max(1) as u64) as usize
    }
}

/// A fish plus the motion state only the host cares about.
#[derive(Debug, Clone)]
pub struct SwimmingFish {
    fish: Fish,
    name: &'static str,
    vx: f64,
    vy: f64,
}

impl Swimmer for SwimmingFish {
    fn id(&self) -> EntityId {
        self.fish.id
    }

    fn x(&self) -> Option<f64> {
        self.fish.x
    }

    fn y(&self) -> Option<f64> {
        self.fish.y
    }

    fn set_y(&mut self, y: f64) {
        self.fish.y = Some(y);
    }

    fn band(&self) -> Option<SwimBand> {
        self.fish.band
    }

    fn set_band(&mut self, band: SwimBand) {
        self.fish.band = Some(band);
    }

    fn style(&self) -> StyleTag {
        self.fish.mood
    }
}

pub struct Aquarium {
    engine: PlacementEngine<MonotonicClock>,
    fish: Vec<SwimmingFish>,
    rng: Rng,
    next_id: u64,
    viewport: Viewport,
    options: BubbleRenderOptions,
}

impl Aquarium {
    pub fn new(count: usize, width: f64, height: f64, is_compact: bool, config: PlacementConfig) -> Self {
        let engine = PlacementEngine::new(
            width,
            height,
            is_compact,
            config,
            Arc::new(CellFontMetric::new(CELL_WIDTH)),
            MonotonicClock::new(),
        );
        let mut aquarium = Self {
            engine,
            fish: Vec::new(),
            rng: Rng(seed()),
            next_id: 0,
            viewport: Viewport::sized(width, height),
            options: BubbleRenderOptions {
                anchor_gap: CELL_HEIGHT,
                edge_margin: 0.0,
                // Cells cannot fade in; DIM only marks the way out.
                fade_in_ms: 0,
                ..BubbleRenderOptions::default()
            },
        };
        for _ in 0..count {
            aquarium.add_fish();
        }
        aquarium
    }

    pub fn fish_count(&self) -> usize {
        self.fish.len()
    }

    pub fn add_fish(&mut self) {
        let id = self.next_id;
        self.next_id += 1;
        let mood = StyleTag::ALL[self.rng.below(StyleTag::ALL.len())];
        let x = self.rng.unit() * self.viewport.width;
        let mut fish = Fish::new(id).with_mood(mood);
        fish.x = Some(x);
        let speed = 0.02 + self.rng.unit() * 0.06;
        let mut swimmer = SwimmingFish {
            fish,
            name: NAMES[id as usize % NAMES.len()],
            vx: if self.rng.unit() < 0.5 { -speed } else { speed },
            vy: (self.rng.unit() - 0.5) * 0.02,
        };
        // No y yet: the engine puts it in the emptiest row.
        self.engine.assign_entity(&mut swimmer, AssignMode::ByPosition);
        self.fish.push(swimmer);
    }

    pub fn remove_fish(&mut self) {
        if let Some(gone) = self.fish.pop() {
            self.engine.forget_entity(gone.fish.id);
        }
    }

    pub fn resize(&mut self, width: f64, height: f64) {
        if (width - self.viewport.width).abs() < f64::EPSILON
            && (height - self.viewport.height).abs() < f64::EPSILON
        {
            return;
        }
        let is_compact = self.engine.is_compact();
        self.engine.resize(width, height, is_compact);
        self.engine
            .assign_entities_to_rows(&mut self.fish, AssignMode::PreserveDistribution);
        self.viewport = Viewport::sized(width, height);
        info!(width, height, rows = self.engine.geometry().row_count, "tank resized");
    }

    pub fn clear(&mut self) {
        self.engine.clear_all();
    }

    /// Everyone talks at once; most of them end up queued.
    pub fn uproar(&mut self) {
        for i in 0..self.fish.len() {
            self.say(i);
        }
    }

    /// Advance motion by `dt_ms`, keep fish in their bands, maybe start
    /// some conversations, and expire old ones.
    pub fn step(&mut self, dt_ms: f64) {
        let width = self.viewport.width;
        for f in &mut self.fish {
            let mut x = f.fish.x.unwrap_or(0.0) + f.vx * dt_ms;
            if x < 0.0 || x > width {
                f.vx = -f.vx;
                x = x.clamp(0.0, width);
            }
            f.fish.x = Some(x);
            f.fish.y = f.fish.y.map(|y| y + f.vy * dt_ms);
            if self.engine.constrain_position(f) {
                f.vy = -f.vy;
            }
        }

        let talk_chance = dt_ms / 4_000.0;
        for i in 0..self.fish.len() {
            let idle = self.engine.dialogue_state(self.fish[i].fish.id) == DialogueState::Idle;
            if idle && self.rng.unit() < talk_chance {
                self.say(i);
            }
        }

        self.engine.tick();
    }

    fn say(&mut self, i: usize) -> RequestOutcome {
        let Some(mood) = self.fish.get(i).map(|f| f.fish.mood) else {
            return RequestOutcome::Rejected;
        };
        let lines = chatter(mood);
        let text = lines[self.rng.below(lines.len())];
        let duration = 3_000 + self.rng.below(4_000) as u64;
        self.engine.request_annotation(&self.fish[i], text, duration)
    }

    pub fn status(&self) -> String {
        let stats = self.engine.stats();
        let shown: usize = stats.iter().map(|s| s.active).sum();
        let queued: usize = stats.iter().map(|s| s.pending).sum();
        format!(
            "{} fish | {} rows | {} talking | {} waiting",
            self.fish.len(),
            stats.len(),
            shown,
            queued
        )
    }

    /// Tank guides, fish and bubbles for this frame.
    pub fn frame(&self) -> Vec<RenderCommand> {
        let mut commands = render_tank(self.engine.geometry(), &self.viewport);
        for f in &self.fish {
            let (Some(x), Some(y)) = (f.fish.x, f.fish.y) else {
                continue;
            };
            commands.push(RenderCommand::DrawText {
                position: Point::new(x, y),
                text: if f.vx >= 0.0 { "><>" } else { "<><" }.into(),
                color: ThemeToken::FishBody,
                font_size: CELL_HEIGHT,
                align: TextAlign::Center,
            });
            commands.push(RenderCommand::DrawText {
                position: Point::new(x, y + CELL_HEIGHT),
                text: f.name.into(),
                color: ThemeToken::FishLabel,
                font_size: CELL_HEIGHT,
                align: TextAlign::Center,
            });
        }

        let annotations = self.engine.active_annotations();
        let anchor_of = |id: EntityId| {
            self.fish
                .iter()
                .find(|f| f.fish.id == id)
                .and_then(|f| f.fish.position())
        };
        commands.extend(render_bubbles(
            &annotations,
            anchor_of,
            &self.viewport,
            self.engine.now_ms(),
            &self.engine.config().bubble,
            &self.options,
        ));
        commands
    }
}

fn seed() -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9e37_79b9_7f4a_7c15);
    nanos | 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::terminal_config;

    fn tank(fish: usize) -> Aquarium {
        Aquarium::new(fish, 120.0 * CELL_WIDTH, 40.0 * CELL_HEIGHT, false, terminal_config())
    }

    #[test]
    fn fish_stay_inside_their_bands() {
        let mut aquarium = tank(12);
        for _ in 0..200 {
            aquarium.step(50.0);
        }
        for f in &aquarium.fish {
            let (Some(y), Some(band)) = (f.fish.y, f.fish.band) else {
                panic!("fish {} was never placed", f.fish.id);
            };
            assert!(band.y_min <= y && y <= band.y_max);
        }
    }

    #[test]
    fn uproar_fills_lanes_and_queues_the_rest() {
        let mut aquarium = tank(30);
        aquarium.uproar();
        let stats = aquarium.engine.stats();
        let shown: usize = stats.iter().map(|s| s.active).sum();
        let queued: usize = stats.iter().map(|s| s.pending).sum();
        assert_eq!(shown + queued, 30);
        assert!(shown <= stats.len() * aquarium.engine.geometry().lane_count());

        let bubbles = aquarium
            .frame()
            .iter()
            .filter(|c| matches!(c, RenderCommand::DrawBubble { .. }))
            .count();
        assert_eq!(bubbles, shown);
    }

    #[test]
    fn removed_fish_lose_their_dialogue() {
        let mut aquarium = tank(1);
        aquarium.uproar();
        assert_eq!(aquarium.engine.active_annotations().len(), 1);
        aquarium.remove_fish();
        assert!(aquarium.engine.active_annotations().is_empty());
        assert_eq!(aquarium.fish_count(), 0);
    }

    #[test]
    fn terminal_bubbles_span_whole_cells() {
        let bubble = terminal_config().bubble;
        for len in [bubble.min_width, bubble.max_width, bubble.padding_x] {
            assert_eq!(len % CELL_WIDTH, 0.0);
        }
        assert_eq!(bubble.line_height, CELL_HEIGHT);
    }
}
