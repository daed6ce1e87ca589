//! Browser bridge. The page owns the animation loop and its clock: every
//! call that can expire dialogue takes the page's `now_ms`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use shoal_core::views::bubbles::{BubbleRenderOptions, render_bubbles};
use shoal_core::views::tank::render_tank;
use shoal_core::{
    AssignMode, CellFontMetric, Fish, ManualClock, PlacementConfig, PlacementEngine,
};
use shoal_protocol::{EntityId, StyleTag, Viewport};
use wasm_bindgen::prelude::*;

struct Tank {
    engine: PlacementEngine<ManualClock>,
    fish: HashMap<EntityId, Fish>,
    viewport: Viewport,
}

thread_local! {
    static TANK: RefCell<Option<Tank>> = const { RefCell::new(None) };
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

fn with_tank<T>(f: impl FnOnce(&mut Tank) -> Result<T, JsError>) -> Result<T, JsError> {
    TANK.with(|cell| {
        let mut slot = cell.borrow_mut();
        let tank = slot
            .as_mut()
            .ok_or_else(|| JsError::new("create_engine has not been called"))?;
        f(tank)
    })
}

/// Create (or replace) the engine. `config_json` may be empty for defaults.
/// `cell_width` is the page font's advance per terminal cell, in CSS pixels.
#[wasm_bindgen]
pub fn create_engine(
    width: f64,
    height: f64,
    is_compact: bool,
    config_json: &str,
    cell_width: f64,
    now_ms: f64,
) -> Result<(), JsError> {
    let config = if config_json.trim().is_empty() {
        PlacementConfig::default()
    } else {
        PlacementConfig::from_json(config_json).map_err(js_err)?
    };
    let engine = PlacementEngine::new(
        width,
        height,
        is_compact,
        config,
        Arc::new(CellFontMetric::new(cell_width)),
        ManualClock::new(now_ms.max(0.0) as u64),
    );
    TANK.with(|cell| {
        *cell.borrow_mut() = Some(Tank {
            engine,
            fish: HashMap::new(),
            viewport: Viewport::sized(width, height),
        });
    });
    Ok(())
}

/// Re-plan rows and move every known fish into a row that still exists.
#[wasm_bindgen]
pub fn resize(width: f64, height: f64, is_compact: bool) -> Result<(), JsError> {
    with_tank(|tank| {
        tank.engine.resize(width, height, is_compact);
        tank.viewport = Viewport::sized(width, height);
        let mut fish: Vec<Fish> = tank.fish.values().cloned().collect();
        tank.engine
            .assign_entities_to_rows(&mut fish, AssignMode::PreserveDistribution);
        tank.fish.extend(fish.into_iter().map(|f| (f.id, f)));
        Ok(())
    })
}

/// Add a fish or update its position and mood. New fish get a row; `y` is
/// clamped into that row's swim band. Returns the fish's `y` afterwards.
#[wasm_bindgen]
pub fn upsert_fish(id: u64, x: f64, y: f64, mood: &str) -> Result<f64, JsError> {
    with_tank(|tank| {
        let key = EntityId(id);
        let fish = tank.fish.entry(key).or_insert_with(|| Fish::new(id));
        fish.x = Some(x);
        fish.y = Some(y);
        fish.mood = StyleTag::from_tag(mood);
        if fish.band.is_none() {
            tank.engine.assign_entity(fish, AssignMode::ByPosition);
        } else {
            tank.engine.constrain_position(fish);
        }
        Ok(fish.y.unwrap_or(y))
    })
}

#[wasm_bindgen]
pub fn remove_fish(id: u64) -> Result<(), JsError> {
    with_tank(|tank| {
        tank.fish.remove(&EntityId(id));
        tank.engine.forget_entity(EntityId(id));
        Ok(())
    })
}

/// Returns the outcome as JSON: `{"Granted":{"row":0,"lane":1}}`,
/// `{"Queued":{"row":0}}` or `"Rejected"`.
#[wasm_bindgen]
pub fn request_annotation(id: u64, text: &str, duration_ms: f64, now_ms: f64) -> Result<String, JsError> {
    with_tank(|tank| {
        tank.engine.clock().set(now_ms.max(0.0) as u64);
        tank.engine.tick();
        let fish = tank
            .fish
            .get(&EntityId(id))
            .ok_or_else(|| JsError::new(&format!("unknown fish {id}")))?;
        let outcome = if duration_ms > 0.0 {
            tank.engine
                .request_annotation(fish, text, duration_ms as u64)
        } else {
            tank.engine.request_default_annotation(fish, text)
        };
        serde_json::to_string(&outcome).map_err(js_err)
    })
}

#[wasm_bindgen]
pub fn cancel_annotation(id: u64) -> Result<bool, JsError> {
    with_tank(|tank| Ok(tank.engine.cancel_annotation(EntityId(id))))
}

#[wasm_bindgen]
pub fn clear_all() -> Result<(), JsError> {
    with_tank(|tank| {
        tank.engine.clear_all();
        Ok(())
    })
}

/// Advance the engine clock and expire due dialogue. Returns how many expired.
#[wasm_bindgen]
pub fn tick(now_ms: f64) -> Result<usize, JsError> {
    with_tank(|tank| {
        tank.engine.clock().set(now_ms.max(0.0) as u64);
        Ok(tank.engine.tick())
    })
}

/// Snapshot of every displayed dialogue as JSON.
#[wasm_bindgen]
pub fn active_annotations() -> Result<String, JsError> {
    with_tank(|tank| serde_json::to_string(&tank.engine.active_annotations()).map_err(js_err))
}

/// Per-row occupancy as JSON.
#[wasm_bindgen]
pub fn row_stats() -> Result<String, JsError> {
    with_tank(|tank| serde_json::to_string(&tank.engine.stats()).map_err(js_err))
}

/// Render commands for the tank guides followed by every visible bubble.
#[wasm_bindgen]
pub fn render_frame(include_tank: bool) -> Result<String, JsError> {
    with_tank(|tank| {
        let mut commands = if include_tank {
            render_tank(tank.engine.geometry(), &tank.viewport)
        } else {
            Vec::new()
        };
        let fish = &tank.fish;
        commands.extend(render_bubbles(
            &tank.engine.active_annotations(),
            |id| fish.get(&id).and_then(Fish::position),
            &tank.viewport,
            tank.engine.now_ms(),
            &tank.engine.config().bubble,
            &BubbleRenderOptions::default(),
        ));
        serde_json::to_string(&commands).map_err(js_err)
    })
}
