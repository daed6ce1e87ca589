//! Orchestrates rows: entity-to-row assignment, swim band enforcement, and
//! routing of dialogue requests to the row that owns the speaker.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shoal_protocol::{AnnotationView, EntityId, SharedStr};
use tracing::{debug, info, warn};

use crate::clock::{Clock, MonotonicClock};
use crate::config::PlacementConfig;
use crate::layout::font::{CellFontMetric, FontMetric};
use crate::layout::planner::{ViewportGeometry, plan};
use crate::model::{DialogueRequest, SwimBand, Swimmer};
use crate::row::{Row, RowStats};

/// How `assign_entities_to_rows` treats an entity's current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignMode {
    /// Pick rows from positions and pull each entity into its new band.
    /// Entities without a position are placed in the middle of their band.
    ByPosition,
    /// Keep entities where they are: an entity that already has a valid row
    /// keeps it, others get one, and no position is touched.
    PreserveDistribution,
}

/// Result of a dialogue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RequestOutcome {
    Granted { row: usize, lane: usize },
    /// The row is full; the request waits for a lane.
    Queued { row: usize },
    /// The entity has no row yet. Nothing is shown or queued.
    Rejected,
}

impl RequestOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, RequestOutcome::Granted { .. })
    }
}

/// Where an entity's dialogue currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DialogueState {
    Idle,
    Displayed { row: usize, lane: usize },
    /// Waiting in `row`'s queue with `ahead` requests in front of it.
    Pending { row: usize, ahead: usize },
}

pub struct PlacementEngine<C: Clock = MonotonicClock> {
    config: PlacementConfig,
    is_compact: bool,
    geometry: ViewportGeometry,
    rows: Vec<Row>,
    metric: Arc<dyn FontMetric>,
    clock: C,
    members: std::collections::HashMap<EntityId, usize>,
    loads: Vec<usize>,
}

impl PlacementEngine<MonotonicClock> {
    /// Default policy, 8px cell metric and wall-clock timers.
    pub fn with_defaults(width: f64, height: f64, is_compact: bool) -> Self {
        Self::new(
            width,
            height,
            is_compact,
            PlacementConfig::default(),
            Arc::new(CellFontMetric::default()),
            MonotonicClock::new(),
        )
    }
}

impl<C: Clock> PlacementEngine<C> {
    pub fn new(
        width: f64,
        height: f64,
        is_compact: bool,
        config: PlacementConfig,
        metric: Arc<dyn FontMetric>,
        clock: C,
    ) -> Self {
        let geometry = plan(width, height, is_compact, &config);
        let rows = (0..geometry.row_count)
            .map(|i| Row::new(i, &geometry, config.bubble))
            .collect();
        let loads = vec![0; geometry.row_count];
        info!(
            rows = geometry.row_count,
            lanes = geometry.lane_count(),
            is_compact,
            "placement engine ready"
        );
        Self {
            config,
            is_compact,
            geometry,
            rows,
            metric,
            clock,
            members: std::collections::HashMap::new(),
            loads,
        }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn geometry(&self) -> &ViewportGeometry {
        &self.geometry
    }

    pub fn is_compact(&self) -> bool {
        self.is_compact
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// The metric bubbles were sized with. Renderers must draw with it too.
    pub fn font_metric(&self) -> Arc<dyn FontMetric> {
        Arc::clone(&self.metric)
    }

    /// Number of entities assigned to each row.
    pub fn row_loads(&self) -> &[usize] {
        &self.loads
    }

    pub fn stats(&self) -> Vec<RowStats> {
        self.rows.iter().map(Row::stats).collect()
    }

    /// Re-plan for a new viewport size.
    ///
    /// Rows that still exist keep their dialogue and queue; rows past the new
    /// row count are torn down with their timers. Entity row indices are left
    /// alone (out-of-range ones resolve to the last row); run
    /// [`assign_entities_to_rows`](Self::assign_entities_to_rows) with
    /// [`AssignMode::PreserveDistribution`] to refresh stored bands.
    pub fn resize(&mut self, width: f64, height: f64, is_compact: bool) {
        let geometry = plan(width, height, is_compact, &self.config);
        let count = geometry.row_count;

        for row in self.rows.iter_mut().skip(count) {
            row.remove_all();
        }
        self.rows.truncate(count);
        for row in &mut self.rows {
            row.set_geometry(&geometry);
        }
        while self.rows.len() < count {
            self.rows
                .push(Row::new(self.rows.len(), &geometry, self.config.bubble));
        }

        self.loads = vec![0; count];
        for row in self.members.values_mut() {
            *row = (*row).min(count - 1);
            self.loads[*row] += 1;
        }

        debug!(width, height, is_compact, rows = count, "resized");
        self.geometry = geometry;
        self.is_compact = is_compact;
    }

    /// Give every entity a row and swim band. See [`AssignMode`].
    pub fn assign_entities_to_rows<S: Swimmer>(&mut self, entities: &mut [S], mode: AssignMode) {
        for entity in entities.iter_mut() {
            self.assign_entity(entity, mode);
        }
        debug!(count = entities.len(), ?mode, loads = ?self.loads, "assigned entities to rows");
    }

    /// Assign a single entity, e.g. one that just joined the tank. Returns
    /// its row.
    pub fn assign_entity<S: Swimmer + ?Sized>(&mut self, entity: &mut S, mode: AssignMode) -> usize {
        let id = entity.id();
        if let Some(previous) = self.members.remove(&id)
            && let Some(load) = self.loads.get_mut(previous)
        {
            *load = load.saturating_sub(1);
        }

        let kept = match mode {
            AssignMode::PreserveDistribution => entity
                .band()
                .map(|band| band.row_index)
                .filter(|row| *row < self.geometry.row_count),
            AssignMode::ByPosition => None,
        };
        let row = kept.unwrap_or_else(|| match entity.y().filter(|y| y.is_finite()) {
            Some(y) => self
                .geometry
                .row_containing(y)
                .unwrap_or_else(|| self.geometry.proportional_row(y)),
            None => self.least_loaded_row(),
        });

        self.members.insert(id, row);
        self.loads[row] += 1;

        let bounds = self.geometry.row_bounds(row);
        let band = SwimBand {
            row_index: row,
            y_min: bounds.swim_y_min,
            y_max: bounds.swim_y_max,
        };
        entity.set_band(band);
        if mode == AssignMode::ByPosition {
            let y = entity.y().map_or(bounds.swim_center(), |y| band.clamp(y));
            entity.set_y(y);
        }
        row
    }

    /// Drop an entity that left the tank: forget its row and cancel its
    /// dialogue.
    pub fn forget_entity(&mut self, id: EntityId) {
        if let Some(row) = self.members.remove(&id)
            && let Some(load) = self.loads.get_mut(row)
        {
            *load = load.saturating_sub(1);
        }
        self.cancel_annotation(id);
    }

    /// Pull the entity's `y` back into its row's swim band. Call every
    /// animation tick. Returns whether `y` was changed. Entities without a
    /// row are left alone.
    pub fn constrain_position<S: Swimmer + ?Sized>(&self, entity: &mut S) -> bool {
        let Some(stored) = entity.band() else {
            return false;
        };
        let bounds = self.geometry.row_bounds(stored.row_index);
        let band = SwimBand {
            row_index: bounds.row,
            y_min: bounds.swim_y_min,
            y_max: bounds.swim_y_max,
        };
        if stored != band {
            entity.set_band(band);
        }
        match entity.y() {
            Some(y) => {
                let clamped = band.clamp(y);
                let changed = clamped != y;
                if changed {
                    entity.set_y(clamped);
                }
                changed
            }
            None => {
                entity.set_y(bounds.swim_center());
                true
            }
        }
    }

    /// Ask for `text` to be shown above `entity` for `duration_ms`.
    ///
    /// Styled with the entity's mood. A second request from the same entity
    /// replaces its first.
    pub fn request_annotation<S: Swimmer + ?Sized>(
        &mut self,
        entity: &S,
        text: impl Into<SharedStr>,
        duration_ms: u64,
    ) -> RequestOutcome {
        let owner = entity.id();
        let Some(band) = entity.band() else {
            warn!(%owner, "dialogue requested by an entity without a row");
            return RequestOutcome::Rejected;
        };
        let row = band.row_index.min(self.rows.len().saturating_sub(1));
        let now_ms = self.clock.now_ms();

        // An entity reassigned to another row must not keep dialogue there.
        for other in self.rows.iter_mut().filter(|r| r.index() != row) {
            if other.holds(owner) {
                other.release(owner, now_ms, self.metric.as_ref());
            }
        }

        let request = DialogueRequest {
            owner,
            entity_x: entity
                .x()
                .unwrap_or(self.geometry.viewport_width * 0.5),
            text: text.into(),
            duration_ms,
            style: entity.style(),
        };
        match self.rows[row].assign_slot(request, now_ms, self.metric.as_ref()) {
            Some(annotation) => RequestOutcome::Granted {
                row,
                lane: annotation.lane,
            },
            None => RequestOutcome::Queued { row },
        }
    }

    /// [`request_annotation`](Self::request_annotation) with the configured
    /// default duration.
    pub fn request_default_annotation<S: Swimmer + ?Sized>(
        &mut self,
        entity: &S,
        text: impl Into<SharedStr>,
    ) -> RequestOutcome {
        let duration_ms = self.config.default_duration_ms;
        self.request_annotation(entity, text, duration_ms)
    }

    /// Remove the entity's shown or queued dialogue. Unknown ids are a no-op.
    pub fn cancel_annotation(&mut self, id: EntityId) -> bool {
        let now_ms = self.clock.now_ms();
        let mut cancelled = false;
        for row in &mut self.rows {
            cancelled |= row.release(id, now_ms, self.metric.as_ref());
        }
        if cancelled {
            debug!(owner = %id, "dialogue cancelled");
        }
        cancelled
    }

    /// Tear down every dialogue, queue and timer.
    pub fn clear_all(&mut self) {
        for row in &mut self.rows {
            row.remove_all();
        }
        debug!("cleared all dialogue");
    }

    /// Fire every expiry timer that is due, earliest first. Returns how many
    /// dialogues expired.
    pub fn tick(&mut self) -> usize {
        let now_ms = self.clock.now_ms();
        let mut fired = 0;
        loop {
            let due = self
                .rows
                .iter()
                .filter_map(|r| r.next_deadline().map(|d| (d, r.index())))
                .filter(|(deadline, _)| *deadline <= now_ms)
                .min();
            let Some((_, row)) = due else {
                break;
            };
            if self.rows[row].fire_next(now_ms, self.metric.as_ref()).is_some() {
                fired += 1;
            }
        }
        fired
    }

    /// Snapshot of everything on screen, by row then lane.
    pub fn active_annotations(&self) -> Vec<AnnotationView> {
        self.rows
            .iter()
            .flat_map(|row| row.annotations().map(|a| a.view(row.index())))
            .collect()
    }

    pub fn dialogue_state(&self, id: EntityId) -> DialogueState {
        for row in &self.rows {
            if let Some(annotation) = row.annotation(id) {
                return DialogueState::Displayed {
                    row: row.index(),
                    lane: annotation.lane,
                };
            }
            if let Some(ahead) = row.pending().position(|p| p.request.owner == id) {
                return DialogueState::Pending {
                    row: row.index(),
                    ahead,
                };
            }
        }
        DialogueState::Idle
    }

    fn least_loaded_row(&self) -> usize {
        self.loads
            .iter()
            .enumerate()
            .min_by_key(|(i, load)| (**load, *i))
            .map_or(0, |(i, _)| i)
    }
}

impl<C: Clock> fmt::Debug for PlacementEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlacementEngine")
            .field("is_compact", &self.is_compact)
            .field("geometry", &self.geometry)
            .field("rows", &self.stats())
            .field("loads", &self.loads)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Fish;
    use shoal_protocol::StyleTag;

    fn engine() -> (PlacementEngine<ManualClock>, ManualClock) {
        let clock = ManualClock::new(0);
        let engine = PlacementEngine::new(
            960.0,
            600.0,
            false,
            PlacementConfig::default(),
            Arc::new(CellFontMetric::new(8.0)),
            clock.clone(),
        );
        (engine, clock)
    }

    #[test]
    fn positioned_entities_land_in_their_band() {
        let (mut engine, _) = engine();
        let mut fish = vec![Fish::at(1, 10.0, 300.0), Fish::at(2, 10.0, 210.0), Fish::at(3, 10.0, 9_000.0)];
        engine.assign_entities_to_rows(&mut fish, AssignMode::ByPosition);

        assert_eq!(fish[0].band.map(|b| b.row_index), Some(1));
        assert_eq!(fish[0].y, Some(300.0));
        // In row 1's annotation band: mapped proportionally, then pulled down.
        assert_eq!(fish[1].band.map(|b| b.row_index), Some(1));
        assert_eq!(fish[1].y, Some(260.0));
        assert_eq!(fish[2].band.map(|b| b.row_index), Some(2));
        assert_eq!(fish[2].y, Some(600.0));
        assert_eq!(engine.row_loads(), &[0, 2, 1]);
    }

    #[test]
    fn clamped_fish_stays_in_its_row_when_reassigned() {
        let (mut engine, _) = engine();
        let bottom = engine.geometry().row_bounds(0).swim_y_max;
        let mut fish = Fish::at(1, 10.0, bottom + 50.0);
        fish.band = Some(SwimBand {
            row_index: 0,
            y_min: 0.0,
            y_max: 0.0,
        });
        assert!(engine.constrain_position(&mut fish));
        assert_eq!(fish.y, Some(bottom));

        let row = engine.assign_entity(&mut fish, AssignMode::ByPosition);
        assert_eq!(row, 0);
        assert_eq!(fish.y, Some(bottom));
        assert_eq!(engine.row_loads(), &[1, 0, 0]);
    }

    #[test]
    fn preserve_distribution_keeps_rows_and_positions() {
        let (mut engine, _) = engine();
        let mut fish = vec![Fish::at(1, 10.0, 300.0), Fish::new(2)];
        engine.assign_entities_to_rows(&mut fish, AssignMode::ByPosition);
        fish[0].y = Some(30.0);
        engine.assign_entities_to_rows(&mut fish, AssignMode::PreserveDistribution);
        assert_eq!(fish[0].band.map(|b| b.row_index), Some(1));
        assert_eq!(fish[0].y, Some(30.0), "position untouched");
        assert_eq!(engine.row_loads().iter().sum::<usize>(), 2);
    }

    #[test]
    fn unpositioned_entities_are_load_balanced() {
        let (mut engine, _) = engine();
        let mut fish: Vec<Fish> = (0..7).map(Fish::new).collect();
        engine.assign_entities_to_rows(&mut fish, AssignMode::ByPosition);
        assert_eq!(engine.row_loads(), &[3, 2, 2]);
        for f in &fish {
            let band = f.band.unwrap_or(SwimBand { row_index: 99, y_min: 0.0, y_max: 0.0 });
            let y = f.y.unwrap_or(f64::NAN);
            assert!(band.y_min <= y && y <= band.y_max);
        }
    }

    #[test]
    fn constrain_clamps_into_band() {
        let (mut engine, _) = engine();
        let mut fish = Fish::at(1, 50.0, 300.0);
        engine.assign_entity(&mut fish, AssignMode::ByPosition);
        fish.y = Some(1_000.0);
        assert!(engine.constrain_position(&mut fish));
        assert_eq!(fish.y, Some(400.0));
        fish.y = Some(0.0);
        assert!(engine.constrain_position(&mut fish));
        assert_eq!(fish.y, Some(260.0));
        assert!(!engine.constrain_position(&mut fish));
        let mut stray = Fish::at(9, 0.0, -5.0);
        assert!(!engine.constrain_position(&mut stray), "no row, untouched");
    }

    #[test]
    fn request_without_row_is_rejected() {
        let (mut engine, _) = engine();
        let outcome = engine.request_annotation(&Fish::at(1, 0.0, 0.0), "hi", 1000);
        assert_eq!(outcome, RequestOutcome::Rejected);
        assert!(!outcome.is_granted());
        assert!(engine.active_annotations().is_empty());
    }

    #[test]
    fn dialogue_follows_entity_across_rows() {
        let (mut engine, _) = engine();
        let mut fish = Fish::at(1, 100.0, 300.0).with_mood(StyleTag::Brave);
        engine.assign_entity(&mut fish, AssignMode::ByPosition);
        assert!(engine.request_annotation(&fish, "row one", 5000).is_granted());

        fish.y = Some(500.0);
        engine.assign_entity(&mut fish, AssignMode::ByPosition);
        let outcome = engine.request_annotation(&fish, "row two", 5000);
        assert_eq!(outcome, RequestOutcome::Granted { row: 2, lane: 0 });

        let views = engine.active_annotations();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].text, "row two");
        assert_eq!(views[0].style, StyleTag::Brave);
    }

    #[test]
    fn cancel_frees_lane_for_the_queue() {
        let (mut engine, clock) = engine();
        let mut fish: Vec<Fish> = (1..=4).map(|i| Fish::at(i, 100.0, 300.0)).collect();
        engine.assign_entities_to_rows(&mut fish, AssignMode::ByPosition);
        for f in &fish {
            engine.request_annotation(f, "hello", 10_000);
        }
        assert_eq!(
            engine.dialogue_state(EntityId(4)),
            DialogueState::Pending { row: 1, ahead: 0 }
        );

        clock.advance(250);
        assert!(engine.cancel_annotation(EntityId(2)));
        assert!(!engine.cancel_annotation(EntityId(2)));
        assert!(!engine.cancel_annotation(EntityId(42)));
        assert!(matches!(
            engine.dialogue_state(EntityId(4)),
            DialogueState::Displayed { row: 1, .. }
        ));
        let created = engine
            .active_annotations()
            .into_iter()
            .find(|v| v.owner == EntityId(4))
            .map(|v| v.created_at_ms);
        assert_eq!(created, Some(250));
    }

    #[test]
    fn clear_all_stops_pending_timers() {
        let (mut engine, clock) = engine();
        let mut fish: Vec<Fish> = (1..=5).map(Fish::new).collect();
        engine.assign_entities_to_rows(&mut fish, AssignMode::ByPosition);
        for f in &fish {
            engine.request_annotation(f, "bye", 100);
        }
        engine.clear_all();
        clock.advance(1_000);
        assert_eq!(engine.tick(), 0);
        assert!(engine.active_annotations().is_empty());
        assert!(engine.stats().iter().all(|s| s.pending == 0 && s.free_lanes == 3));
    }

    #[test]
    fn resize_keeps_surviving_rows() {
        let (mut engine, _) = engine();
        let mut fish = vec![Fish::at(1, 100.0, 300.0), Fish::at(2, 100.0, 500.0)];
        engine.assign_entities_to_rows(&mut fish, AssignMode::ByPosition);
        engine.request_annotation(&fish[0], "stay", 5000);
        engine.request_annotation(&fish[1], "go", 5000);

        engine.resize(960.0, 400.0, false);
        assert_eq!(engine.geometry().row_count, 2);
        assert_eq!(engine.active_annotations().len(), 1, "row 2 torn down");
        assert_eq!(engine.row_loads(), &[0, 2]);

        // Stored band of fish 2 points past the end; constrain resolves it.
        engine.constrain_position(&mut fish[1]);
        assert_eq!(fish[1].band.map(|b| b.row_index), Some(1));
        assert!(fish[1].y.is_some_and(|y| y <= 400.0));
    }

    #[test]
    fn forget_entity_updates_loads_and_cancels() {
        let (mut engine, _) = engine();
        let mut fish = Fish::new(1);
        engine.assign_entity(&mut fish, AssignMode::ByPosition);
        engine.request_default_annotation(&fish, "so long");
        assert_eq!(
            engine.active_annotations().first().map(|v| v.duration_ms),
            Some(5000)
        );
        engine.forget_entity(EntityId(1));
        assert_eq!(engine.row_loads().iter().sum::<usize>(), 0);
        assert_eq!(engine.dialogue_state(EntityId(1)), DialogueState::Idle);
    }
}
