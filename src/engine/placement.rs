//! Unit placement.
//!
//! Slot selection in-game is flaky and placement clicks are dropped under
//! load, so placement is built around an unbounded confirmation loop: keep
//! re-selecting and re-clicking until the unit's upgrade panel proves the
//! placement landed. The loop has no retry ceiling on purpose; a unit is
//! either eventually placed or the run is stopped from outside. Every
//! iteration re-checks the cancellation gate.

use std::time::Duration;

use crate::config::Config;
use crate::landmarks::Landmark;
use crate::placements::{self, PlacementUnit, UpgradeTarget};
use crate::vision::MatchResult;

use super::LOG_EVERY;
use super::context::RunContext;

/// Upgrade hotkey.
const UPGRADE_KEY: char = 't';
/// Auto-upgrade toggle hotkey, used when its button image is not found.
const AUTO_UPGRADE_KEY: char = 'z';
/// Slot keys are pressed this many times per selection.
const SLOT_REPEAT: u32 = 3;

/// Which placement document to read.
#[derive(Clone, Debug)]
pub struct BatchTarget {
    pub mode_folder: String,
    pub location: String,
    pub act: String,
}

impl BatchTarget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode_folder: config.mode.folder().to_string(),
            location: config.location.clone(),
            act: config.act.clone(),
        }
    }
}

fn secs(value: f32) -> Duration {
    Duration::from_secs_f32(value.max(0.0))
}

/// Places one batch (early or normal) from the placement document.
///
/// A missing or malformed document is reported and skipped; the run goes on.
/// Returns `false` when nothing was placed, including on cancellation;
/// callers consult the gate to tell those apart.
pub fn place_batch(ctx: &mut RunContext, early: bool, target: Option<BatchTarget>) -> bool {
    let target = target.unwrap_or_else(|| BatchTarget::from_config(&ctx.config));

    let file = match placements::load(
        &ctx.placements_root,
        &target.mode_folder,
        &target.location,
        &target.act,
    ) {
        Ok(file) => file,
        Err(e) => {
            ctx.status.emit(&format!("Unit Placement: {}", e));
            return false;
        }
    };

    let batch: Vec<PlacementUnit> = file.batch(early).into_iter().cloned().collect();
    if batch.is_empty() {
        let kind = if early { "early placement" } else { "enabled" };
        ctx.status.emit(&format!("Unit Placement: No {} units in config", kind));
        return false;
    }

    let kind = if early { "early" } else { "normal" };
    ctx.status.emit(&format!(
        "Unit Placement: Placing {} {} units...",
        batch.len(),
        kind
    ));

    for unit in &batch {
        if !ctx.gate.check() {
            return false;
        }
        if !place_unit(ctx, unit) {
            return false;
        }
        ctx.gate.sleep(Duration::from_millis(300));
    }

    ctx.status.emit(&format!("Unit Placement: Completed {} units", batch.len()));
    true
}

/// Places a single unit and runs its post-placement actions.
/// Returns `false` only when the run was cancelled.
pub fn place_unit(ctx: &mut RunContext, unit: &PlacementUnit) -> bool {
    let Some((x, y)) = unit.coordinates() else {
        ctx.status.emit(&format!(
            "Unit Placement: Unit {} has no coordinates, skipping",
            unit.index
        ));
        return true;
    };

    ctx.status.emit(&format!(
        "Unit Placement: Placing unit {} (slot {}) at ({}, {})",
        unit.index, unit.slot, x, y
    ));

    let Some(_panel) = confirm_placement(ctx, unit, x, y) else {
        return false;
    };

    if unit.auto_upgrade || unit.upgrade != UpgradeTarget::None {
        apply_auto_upgrade(ctx, unit.index);
    }
    if unit.upgrade != UpgradeTarget::None && !run_upgrades(ctx, unit.index, unit.upgrade) {
        return false;
    }

    close_panel(ctx);
    true
}

fn press_slot(ctx: &mut RunContext, unit: &PlacementUnit, times: u32) {
    let Some(key) = unit.slot_key() else { return };
    let pause = secs(ctx.config.slot_press_delay);
    for _ in 0..times {
        ctx.input.press_key(key);
        if !ctx.gate.sleep(pause) {
            return;
        }
    }
}

/// The unbounded confirmation loop: re-select the slot, re-click the saved
/// coordinates, and look for the upgrade panel after every click. Exits only
/// with the panel on screen or on cancellation.
fn confirm_placement(
    ctx: &mut RunContext,
    unit: &PlacementUnit,
    x: i32,
    y: i32,
) -> Option<MatchResult> {
    let move_duration = secs(ctx.config.placement_move_duration);
    let delay = secs(ctx.config.placement_delay);

    press_slot(ctx, unit, SLOT_REPEAT);
    ctx.input.move_to(x, y, move_duration);
    ctx.gate.sleep(delay);
    ctx.input.click(x, y);
    ctx.gate.sleep(delay);

    let mut attempts: u32 = 0;
    loop {
        if !ctx.gate.check() {
            return None;
        }
        attempts += 1;

        press_slot(ctx, unit, 1);
        ctx.input.move_to(x, y, move_duration);
        ctx.gate.sleep(delay);
        ctx.input.click(x, y);
        ctx.gate.sleep(delay);

        if let Some(panel) = ctx.find_landmark(&Landmark::UpgradePanel) {
            ctx.status.emit(&format!(
                "Unit Placement: Unit {} placed after {} confirm clicks",
                unit.index, attempts
            ));
            return Some(panel);
        }

        if attempts % LOG_EVERY == 0 {
            ctx.status
                .emit(&format!("Unit Placement: Confirm clicks: {}...", attempts));
        }
    }
}

/// Toggles the unit's auto-upgrade. The button image is preferred; when the
/// panel renders without it the hotkey does the same thing.
fn apply_auto_upgrade(ctx: &mut RunContext, unit_index: u32) {
    ctx.status.emit(&format!(
        "Unit Placement: Enabling auto-upgrade for unit {}...",
        unit_index
    ));
    // Let the panel finish its open animation before probing.
    ctx.gate.sleep(Duration::from_millis(500));

    match ctx.find_landmark(&Landmark::AutoUpgrade) {
        Some(found) => {
            let move_duration = secs(ctx.config.placement_move_duration);
            ctx.input.move_to(found.center.0, found.center.1, move_duration);
            ctx.gate.sleep(Duration::from_millis(150));
            ctx.input.click(found.center.0, found.center.1);
            ctx.gate.sleep(Duration::from_millis(500));
        }
        None => {
            ctx.status
                .emit("Unit Placement: Auto-upgrade button not found, using hotkey");
            ctx.input.press_key(AUTO_UPGRADE_KEY);
            ctx.gate.sleep(Duration::from_millis(500));
        }
    }
}

enum UpgradeExit {
    Reached,
    Defeat,
    Cancelled,
}

/// Presses the upgrade key until `stop_at` appears or defeat is detected.
/// The check runs before each press, so the press that produced the landmark
/// is never followed by another.
fn upgrade_until(ctx: &mut RunContext, stop_at: Landmark, delay: Duration) -> UpgradeExit {
    let mut presses: u32 = 0;
    loop {
        if !ctx.gate.check() {
            return UpgradeExit::Cancelled;
        }
        if ctx.find_landmark(&Landmark::Defeat).is_some() {
            ctx.status.emit("Unit Placement: Defeat detected, stopping upgrades");
            return UpgradeExit::Defeat;
        }
        if ctx.find_landmark(&stop_at).is_some() {
            ctx.status.emit(&format!(
                "Unit Placement: {:?} reached after {} upgrade presses",
                stop_at, presses
            ));
            return UpgradeExit::Reached;
        }

        ctx.input.press_key(UPGRADE_KEY);
        presses += 1;
        if presses % LOG_EVERY == 0 {
            ctx.status
                .emit(&format!("Unit Placement: Upgrade presses: {}...", presses));
        }
        if !ctx.gate.sleep(delay) {
            return UpgradeExit::Cancelled;
        }
    }
}

/// Runs the requested manual upgrades. Returns `false` on cancellation;
/// defeat aborts upgrading but lets the caller close the panel normally.
fn run_upgrades(ctx: &mut RunContext, unit_index: u32, target: UpgradeTarget) -> bool {
    let delay = secs(ctx.config.upgrade_press_delay);
    match target {
        UpgradeTarget::None => true,
        UpgradeTarget::Max => {
            ctx.status.emit(&format!(
                "Unit Placement: Upgrading unit {} to MAX...",
                unit_index
            ));
            !matches!(
                upgrade_until(ctx, Landmark::UpgradeMax, delay),
                UpgradeExit::Cancelled
            )
        }
        UpgradeTarget::Level(levels) => {
            for level in 1..=levels {
                ctx.status.emit(&format!(
                    "Unit Placement: Upgrading unit {} to level {}...",
                    unit_index, level
                ));
                match upgrade_until(ctx, Landmark::UpgradeLevel(level), delay) {
                    UpgradeExit::Reached => {}
                    UpgradeExit::Defeat => return true,
                    UpgradeExit::Cancelled => return false,
                }
            }
            true
        }
    }
}

/// Closes the unit's action panel: its close button when visible, otherwise
/// a click on a neutral point at the window center.
fn close_panel(ctx: &mut RunContext) {
    ctx.gate.sleep(Duration::from_millis(200));
    let move_duration = secs(ctx.config.placement_move_duration);

    let target = match ctx.find_landmark(&Landmark::CloseMenu) {
        Some(found) => found.center,
        None => ctx.region().center(),
    };
    ctx.input.move_to(target.0, target.1, move_duration);
    ctx.gate.sleep(Duration::from_millis(100));
    ctx.input.click(target.0, target.1);
    ctx.gate.sleep(Duration::from_millis(200));
}
