//! One horizontal band's dialogue capacity.
//!
//! A row owns a fixed number of lanes. A dialogue request takes the free
//! lane nearest its speaker; when every lane is taken the request waits in a
//! FIFO queue. Each granted dialogue carries a one-shot expiry timer, and
//! expiry frees the lane and hands it to the head of the queue in the same
//! step, so no caller ever observes a lane that is free while requests wait.

use std::cmp::Reverse;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use serde::Serialize;
use shoal_protocol::EntityId;
use tracing::{debug, trace};

use crate::config::BubbleConfig;
use crate::layout::bubble;
use crate::layout::font::FontMetric;
use crate::layout::planner::{RowBounds, ViewportGeometry};
use crate::model::{Annotation, DialogueRequest, PendingRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneState {
    Free,
    Occupied(EntityId),
}

/// Occupancy counters for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RowStats {
    pub row: usize,
    pub active: usize,
    pub pending: usize,
    pub free_lanes: usize,
}

// Field order gives the heap its ordering: earliest deadline first, grant
// order breaking ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Expiry {
    deadline_ms: u64,
    serial: u64,
    owner: EntityId,
}

#[derive(Debug, Clone)]
pub struct Row {
    index: usize,
    geometry: ViewportGeometry,
    bubble: BubbleConfig,
    lanes: Vec<LaneState>,
    active: HashMap<EntityId, Annotation>,
    overflow: VecDeque<PendingRequest>,
    timers: BinaryHeap<Reverse<Expiry>>,
    next_serial: u64,
}

impl Row {
    pub fn new(index: usize, geometry: &ViewportGeometry, bubble: BubbleConfig) -> Self {
        Self {
            index,
            geometry: geometry.clone(),
            bubble,
            lanes: vec![LaneState::Free; geometry.lane_count()],
            active: HashMap::new(),
            overflow: VecDeque::new(),
            timers: BinaryHeap::new(),
            next_serial: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bounds(&self) -> RowBounds {
        self.geometry.row_bounds(self.index)
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane_state(&self, lane: usize) -> Option<LaneState> {
        self.lanes.get(lane).copied()
    }

    pub fn available_lanes(&self) -> usize {
        self.lanes.iter().filter(|l| **l == LaneState::Free).count()
    }

    pub fn annotation(&self, owner: EntityId) -> Option<&Annotation> {
        self.active.get(&owner)
    }

    /// Active annotations ordered by lane.
    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> + '_ {
        self.lanes.iter().filter_map(|lane| match lane {
            LaneState::Occupied(owner) => self.active.get(owner),
            LaneState::Free => None,
        })
    }

    /// Queued requests, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &PendingRequest> + '_ {
        self.overflow.iter()
    }

    pub fn is_pending(&self, owner: EntityId) -> bool {
        self.overflow.iter().any(|p| p.request.owner == owner)
    }

    /// Whether `owner` has a dialogue shown or waiting in this row.
    pub fn holds(&self, owner: EntityId) -> bool {
        self.active.contains_key(&owner) || self.is_pending(owner)
    }

    pub fn stats(&self) -> RowStats {
        RowStats {
            row: self.index,
            active: self.active.len(),
            pending: self.overflow.len(),
            free_lanes: self.available_lanes(),
        }
    }

    /// Replace the layout after a resize. Lanes keep their occupants.
    pub fn set_geometry(&mut self, geometry: &ViewportGeometry) {
        self.geometry = geometry.clone();
    }

    /// Grant `request` a lane, or queue it when the row is full.
    ///
    /// A request from an owner that already has a dialogue on screen
    /// replaces it: the old lane is freed first. A request from an owner that
    /// is already queued updates the queued entry in place.
    ///
    /// A replacement is granted straight away even when other requests are
    /// queued: the lane it frees goes back to the same owner, so an owner
    /// that is on screen never waits behind the queue.
    pub fn assign_slot(
        &mut self,
        request: DialogueRequest,
        now_ms: u64,
        metric: &dyn FontMetric,
    ) -> Option<&Annotation> {
        let owner = request.owner;
        if self.remove_annotation(owner) {
            debug!(row = self.index, %owner, "replacing active dialogue");
        }

        if let Some(pending) = self.overflow.iter_mut().find(|p| p.request.owner == owner) {
            pending.request = request;
            trace!(row = self.index, %owner, "updated queued dialogue");
            return None;
        }

        let Some(lane) = self.nearest_free_lane(request.entity_x) else {
            debug!(
                row = self.index,
                %owner,
                queue_len = self.overflow.len() + 1,
                "row full, dialogue queued"
            );
            self.overflow.push_back(PendingRequest {
                request,
                enqueued_at_ms: now_ms,
            });
            return None;
        };

        Some(self.grant(lane, request, now_ms, metric))
    }

    /// Drop `owner`'s dialogue and free its lane. Returns whether anything
    /// was removed; removing twice is a no-op.
    pub fn remove_annotation(&mut self, owner: EntityId) -> bool {
        let Some(annotation) = self.active.remove(&owner) else {
            return false;
        };
        if let Some(lane) = self.lanes.get_mut(annotation.lane) {
            *lane = LaneState::Free;
        }
        self.timers.retain(|Reverse(t)| t.serial != annotation.serial);
        debug_assert_eq!(self.active.len() + self.available_lanes(), self.lanes.len());
        true
    }

    /// Hand free lanes to queued requests, oldest first. Returns how many
    /// were granted.
    pub fn drain_queue(&mut self, now_ms: u64, metric: &dyn FontMetric) -> usize {
        let mut granted = 0;
        while !self.overflow.is_empty() {
            let Some(entity_x) = self.overflow.front().map(|p| p.request.entity_x) else {
                break;
            };
            let Some(lane) = self.nearest_free_lane(entity_x) else {
                break;
            };
            let Some(pending) = self.overflow.pop_front() else {
                break;
            };
            trace!(
                row = self.index,
                owner = %pending.request.owner,
                waited_ms = now_ms.saturating_sub(pending.enqueued_at_ms),
                "dequeued dialogue"
            );
            self.grant(lane, pending.request, now_ms, metric);
            granted += 1;
        }
        granted
    }

    /// Remove `owner`'s shown or queued dialogue and refill the freed lane
    /// from the queue in one step.
    pub fn release(&mut self, owner: EntityId, now_ms: u64, metric: &dyn FontMetric) -> bool {
        let queued = self.overflow.len();
        self.overflow.retain(|p| p.request.owner != owner);
        let dequeued = self.overflow.len() != queued;
        let removed = self.remove_annotation(owner);
        if removed {
            self.drain_queue(now_ms, metric);
        }
        removed || dequeued
    }

    /// Earliest pending expiry, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.peek().map(|Reverse(t)| t.deadline_ms)
    }

    /// Fire the earliest timer if it is due: remove its dialogue and drain
    /// the queue. Returns the owner whose dialogue expired.
    pub fn fire_next(&mut self, now_ms: u64, metric: &dyn FontMetric) -> Option<EntityId> {
        while let Some(Reverse(next)) = self.timers.peek().copied() {
            if next.deadline_ms > now_ms {
                return None;
            }
            self.timers.pop();
            // Timers are withdrawn on removal; this guards against firing for
            // a dialogue that was replaced or torn down anyway.
            let live = self
                .active
                .get(&next.owner)
                .is_some_and(|a| a.serial == next.serial);
            if !live {
                trace!(row = self.index, owner = %next.owner, "ignoring stale timer");
                continue;
            }
            self.remove_annotation(next.owner);
            debug!(
                row = self.index,
                owner = %next.owner,
                late_ms = now_ms - next.deadline_ms,
                "dialogue expired"
            );
            self.drain_queue(now_ms, metric);
            return Some(next.owner);
        }
        None
    }

    /// Cancel every timer and forget all shown and queued dialogue.
    pub fn remove_all(&mut self) {
        self.timers.clear();
        self.active.clear();
        self.overflow.clear();
        self.lanes.fill(LaneState::Free);
    }

    fn nearest_free_lane(&self, entity_x: f64) -> Option<usize> {
        let x = if entity_x.is_finite() {
            entity_x
        } else {
            self.geometry.viewport_width * 0.5
        };
        let mut best: Option<(usize, f64)> = None;
        for (i, state) in self.lanes.iter().enumerate() {
            if *state != LaneState::Free {
                continue;
            }
            let Some(lane) = self.geometry.lanes.get(i) else {
                continue;
            };
            let distance = (lane.center() - x).abs();
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((i, distance));
            }
        }
        best.map(|(i, _)| i)
    }

    fn grant(
        &mut self,
        lane: usize,
        request: DialogueRequest,
        now_ms: u64,
        metric: &dyn FontMetric,
    ) -> &Annotation {
        let size = bubble::measure(&request.text, metric, &self.bubble);
        let serial = self.next_serial;
        self.next_serial += 1;

        let owner = request.owner;
        let annotation = Annotation {
            owner,
            text: request.text,
            lines: size.lines,
            lane,
            width: size.width,
            height: size.height,
            created_at_ms: now_ms,
            duration_ms: request.duration_ms,
            style: request.style,
            serial,
        };
        self.lanes[lane] = LaneState::Occupied(owner);
        self.timers.push(Reverse(Expiry {
            deadline_ms: annotation.expires_at_ms(),
            serial,
            owner,
        }));
        debug!(
            row = self.index,
            lane,
            %owner,
            width = annotation.width,
            height = annotation.height,
            duration_ms = annotation.duration_ms,
            "dialogue granted"
        );

        let annotation = match self.active.entry(owner) {
            Entry::Occupied(mut slot) => {
                slot.insert(annotation);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(annotation),
        };
        annotation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementConfig;
    use crate::layout::font::CellFontMetric;
    use crate::layout::planner::plan;
    use shoal_protocol::StyleTag;

    const METRIC: CellFontMetric = CellFontMetric { cell_width: 8.0 };

    fn row() -> Row {
        let config = PlacementConfig::default();
        let geometry = plan(940.0, 600.0, false, &config);
        Row::new(0, &geometry, config.bubble)
    }

    fn request(owner: u64, x: f64, duration_ms: u64) -> DialogueRequest {
        DialogueRequest {
            owner: EntityId(owner),
            entity_x: x,
            text: "blub".into(),
            duration_ms,
            style: StyleTag::Default,
        }
    }

    fn assert_capacity(row: &Row) {
        assert_eq!(row.stats().active + row.available_lanes(), row.lane_count());
    }

    #[test]
    fn picks_the_nearest_free_lane() {
        let mut row = row();
        // Lane centres for 940px with 10px margins: 160, 470, 780.
        let lane = row.assign_slot(request(1, 500.0, 1000), 0, &METRIC).map(|a| a.lane);
        assert_eq!(lane, Some(1));
        let lane = row.assign_slot(request(2, 400.0, 1000), 0, &METRIC).map(|a| a.lane);
        assert_eq!(lane, Some(0), "middle is taken, left is closer than right");
        let lane = row.assign_slot(request(3, 0.0, 1000), 0, &METRIC).map(|a| a.lane);
        assert_eq!(lane, Some(2));
        assert_capacity(&row);
    }

    #[test]
    fn equidistant_lanes_prefer_the_lowest_index() {
        let mut row = row();
        let taken = row.assign_slot(request(1, 470.0, 1000), 0, &METRIC).map(|a| a.lane);
        assert_eq!(taken, Some(1));
        // 470 is exactly between lanes 0 and 2.
        let lane = row.assign_slot(request(2, 470.0, 1000), 0, &METRIC).map(|a| a.lane);
        assert_eq!(lane, Some(0));
    }

    #[test]
    fn stale_timers_are_ignored() {
        let mut row = row();
        row.assign_slot(request(1, 100.0, 1000), 0, &METRIC);
        let serial = row.annotation(EntityId(1)).map(|a| a.serial).unwrap_or_default();
        row.timers.push(Reverse(Expiry {
            deadline_ms: 100,
            serial: serial + 1,
            owner: EntityId(1),
        }));
        row.timers.push(Reverse(Expiry {
            deadline_ms: 200,
            serial: 99,
            owner: EntityId(7),
        }));

        assert_eq!(row.fire_next(500, &METRIC), None);
        assert!(row.holds(EntityId(1)));
        assert_eq!(row.stats().active, 1);
        assert_eq!(row.next_deadline(), Some(1000));
        assert_capacity(&row);

        assert_eq!(row.fire_next(1000, &METRIC), Some(EntityId(1)));
        assert_eq!(row.available_lanes(), row.lane_count());
    }

    #[test]
    fn full_row_queues_in_order() {
        let mut row = row();
        for id in 1..=5 {
            row.assign_slot(request(id, 100.0 * id as f64, 10_000), 0, &METRIC);
        }
        assert_eq!(row.stats().active, 3);
        let queued: Vec<_> = row.pending().map(|p| p.request.owner).collect();
        assert_eq!(queued, vec![EntityId(4), EntityId(5)]);
        assert_eq!(row.available_lanes(), 0);
        assert_capacity(&row);
    }

    #[test]
    fn repeat_request_replaces_without_leaking_lanes() {
        let mut row = row();
        row.assign_slot(request(1, 100.0, 1000), 0, &METRIC);
        let mut again = request(1, 900.0, 2000);
        again.text = "hello again".into();
        let lane = row.assign_slot(again, 10, &METRIC).map(|a| a.lane);
        assert_eq!(lane, Some(2));
        assert_eq!(row.stats().active, 1);
        assert_eq!(row.available_lanes(), 2);
        assert_eq!(row.annotation(EntityId(1)).map(|a| a.text.as_str()), Some("hello again"));
        // Only the replacement's timer remains.
        assert_eq!(row.next_deadline(), Some(2010));
    }

    #[test]
    fn replacement_on_a_full_row_skips_the_queue() {
        let mut row = row();
        for id in 1..=5 {
            row.assign_slot(request(id, 0.0, 1000), 0, &METRIC);
        }
        let granted = row.assign_slot(request(2, 0.0, 4000), 20, &METRIC).map(|a| a.owner);
        assert_eq!(granted, Some(EntityId(2)));
        assert_eq!(row.stats().active, 3);
        let queued: Vec<_> = row.pending().map(|p| p.request.owner).collect();
        assert_eq!(queued, vec![EntityId(4), EntityId(5)]);
        assert_capacity(&row);
    }

    #[test]
    fn repeat_request_while_queued_keeps_queue_position() {
        let mut row = row();
        for id in 1..=5 {
            row.assign_slot(request(id, 0.0, 1000), 0, &METRIC);
        }
        let mut update = request(4, 0.0, 3000);
        update.text = "still waiting".into();
        assert!(row.assign_slot(update, 5, &METRIC).is_none());
        let queued: Vec<_> = row.pending().map(|p| (p.request.owner, p.request.duration_ms)).collect();
        assert_eq!(queued, vec![(EntityId(4), 3000), (EntityId(5), 1000)]);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut row = row();
        row.assign_slot(request(1, 0.0, 1000), 0, &METRIC);
        assert!(row.remove_annotation(EntityId(1)));
        let after_first = row.stats();
        assert!(!row.remove_annotation(EntityId(1)));
        assert!(!row.remove_annotation(EntityId(99)));
        assert_eq!(row.stats(), after_first);
        assert_eq!(row.available_lanes(), 3);
        assert_eq!(row.next_deadline(), None);
    }

    #[test]
    fn expiry_frees_lane_and_drains_queue() {
        let mut row = row();
        for id in 1..=4 {
            row.assign_slot(request(id, 0.0, 1000 * id), 0, &METRIC);
        }
        assert_eq!(row.fire_next(999, &METRIC), None, "never early");
        assert_eq!(row.fire_next(1000, &METRIC), Some(EntityId(1)));
        assert!(row.annotation(EntityId(4)).is_some());
        assert_eq!(row.annotation(EntityId(4)).map(|a| a.created_at_ms), Some(1000));
        assert_eq!(row.pending().count(), 0);
        assert_eq!(row.fire_next(1000, &METRIC), None, "never twice");
        assert_capacity(&row);
    }

    #[test]
    fn release_drains_and_drops_queued_entries() {
        let mut row = row();
        for id in 1..=5 {
            row.assign_slot(request(id, 0.0, 1000), 0, &METRIC);
        }
        assert!(row.release(EntityId(5), 10, &METRIC), "queued entry cancelled");
        assert!(row.release(EntityId(2), 10, &METRIC));
        assert!(row.annotation(EntityId(4)).is_some());
        assert!(!row.holds(EntityId(5)));
        assert!(!row.release(EntityId(5), 10, &METRIC));
        assert_eq!(row.available_lanes(), 0);
    }

    #[test]
    fn remove_all_cancels_timers() {
        let mut row = row();
        for id in 1..=5 {
            row.assign_slot(request(id, 0.0, 1000), 0, &METRIC);
        }
        row.remove_all();
        assert_eq!(row.next_deadline(), None);
        assert_eq!(row.fire_next(u64::MAX, &METRIC), None);
        assert_eq!(row.available_lanes(), 3);
        assert_eq!(row.pending().count(), 0);
    }
}
