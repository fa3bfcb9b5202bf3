//! Menu navigation and pre-match positioning.
//!
//! Each mode is a deterministic "wait for landmark, click, settle" sequence
//! with a short scripted key-hold section to position the avatar/camera.
//! A landmark that never shows up aborts the navigation attempt, never the
//! process; the outer loop decides whether to retry.

use std::time::{Duration, Instant};

use crate::config::{Location, Mode, act_number, classify_location};
use crate::landmarks::Landmark;

use super::SEARCH_INTERVAL;
use super::context::RunContext;

const NAV_TIMEOUT: Duration = Duration::from_secs(30);
const WALK_SEARCH_TIMEOUT: Duration = Duration::from_secs(15);
/// Interval between landmark probes while a movement key is held.
const WALK_PROBE_INTERVAL: Duration = Duration::from_millis(200);

const SETTLE_SHORT: Duration = Duration::from_millis(500);
const SETTLE_LONG: Duration = Duration::from_secs(1);

/// Camera zoom key.
const ZOOM_KEY: char = 'o';

/// Scripted positioning sequences: (movement key, hold seconds) pairs,
/// each followed by a short settle.
const LEAF_POSITIONING: &[(char, f32)] = &[('a', 2.0), ('w', 1.8)];
const PLANET_POSITIONING: &[(char, f32)] = &[('s', 1.1), ('a', 0.2)];
const DARK_POSITIONING: &[(char, f32)] = &[('a', 1.2)];
const BLUE_POSITIONING: &[(char, f32)] = &[('w', 5.0)];

/// Positioning steps for a mode/location pair. Empty means no repositioning.
pub fn positioning_sequence(mode: Mode, location: Location) -> &'static [(char, f32)] {
    match (mode, location) {
        (Mode::Siege, Location::BlueDungeon) => BLUE_POSITIONING,
        (_, Location::LeafVillage) => LEAF_POSITIONING,
        (_, Location::PlanetNamek) => PLANET_POSITIONING,
        (_, Location::DarkHollow) => DARK_POSITIONING,
        _ => &[],
    }
}

/// Runs the positioning sequence for the given location name.
pub fn run_positioning(ctx: &mut RunContext, location_name: &str) {
    let location = classify_location(location_name);
    let sequence = positioning_sequence(ctx.config.mode, location);
    if sequence.is_empty() {
        return;
    }

    ctx.status
        .emit(&format!("Positioning: {} sequence...", location_name));
    for &(key, seconds) in sequence {
        if !ctx.gate.check() {
            return;
        }
        ctx.input.hold_key(key, Duration::from_secs_f32(seconds));
        ctx.gate.sleep(Duration::from_millis(300));
    }
    ctx.status.emit("Positioning: complete");
}

/// Zooms the camera out: right-drag down across the window, then the zoom
/// key. The drag distance tracks the window height so a resized client
/// still ends fully zoomed.
pub fn pre_match_zoom(ctx: &mut RunContext) {
    let region = ctx.region();
    let (cx, cy) = region.center();
    let distance = region.height() as i32 - 100;
    ctx.input.drag_down(cx, cy, distance, Duration::from_millis(300));
    ctx.gate.sleep(Duration::from_millis(300));
    ctx.input.hold_key(ZOOM_KEY, Duration::from_millis(500));
    ctx.gate.sleep(SETTLE_LONG);
}

/// Holds a movement key, then settles.
fn hold_direction(ctx: &mut RunContext, key: char, seconds: f32) {
    ctx.input.hold_key(key, Duration::from_secs_f32(seconds));
    ctx.gate.sleep(Duration::from_millis(300));
}

/// Holds a movement key while polling for a landmark, releasing on first
/// sight, timeout, or cancellation.
fn hold_until_landmark(
    ctx: &mut RunContext,
    key: char,
    landmark: Landmark,
    timeout: Duration,
) -> Option<(i32, i32)> {
    let region = ctx.window_region;
    let gate = ctx.gate.clone();
    let vision = &mut ctx.vision;
    let mut probe = || vision.find_landmark(&landmark, region).map(|m| m.center);
    ctx.input
        .hold_key_until(key, &mut probe, timeout, WALK_PROBE_INTERVAL, &|| {
            gate.is_running()
        })
}

/// Entry point: routes to the mode-specific sequence. Replay runs skip
/// navigation entirely; the lobby was never left.
pub fn navigate_to_game(ctx: &mut RunContext) -> bool {
    if ctx.replay {
        ctx.status.emit("Navigation: Skipping (replay)");
        return true;
    }

    let mode = ctx.config.mode;
    ctx.status.emit(&format!("Navigation: Mode = {:?}", mode));

    if !ctx.click_landmark_step("Navigation", Landmark::Areas, Some(NAV_TIMEOUT), SETTLE_LONG) {
        return false;
    }

    match mode {
        Mode::Raids => navigate_raid(ctx),
        Mode::Siege => navigate_siege(ctx),
        Mode::Story | Mode::Legend => {
            if !ctx.click_landmark_step("Navigation", Landmark::Story, None, SETTLE_LONG) {
                return false;
            }
            if !ctx.click_landmark_step("Navigation", Landmark::CloseMenu, None, SETTLE_SHORT) {
                return false;
            }
            ctx.status.emit("Navigation: Walking forward...");
            hold_direction(ctx, 'w', 3.0);

            if mode == Mode::Story {
                navigate_story(ctx)
            } else {
                navigate_legend(ctx)
            }
        }
        // Auto-Challenges has its own loop and never routes through here.
        Mode::AutoChallenges => true,
    }
}

/// Walks left until the match-creation dialog shows, then clicks through
/// stage, act, optional nightmare, and the two start confirmations.
fn navigate_story(ctx: &mut RunContext) -> bool {
    ctx.status.emit("Story Mode: Walking to Create Match...");
    let Some(create) = hold_until_landmark(ctx, 'a', Landmark::CreateMatch, NAV_TIMEOUT) else {
        if ctx.gate.is_running() {
            ctx.status.emit("Story Mode: Could not find Create Match");
        }
        return false;
    };
    ctx.hover_click(create, SETTLE_SHORT);

    if !select_stage(ctx, "Story Mode") {
        return false;
    }
    if !select_act(ctx, "Story Mode", None) {
        return false;
    }
    maybe_nightmare(ctx, "Story Mode");

    if !ctx.click_landmark_step("Story Mode", Landmark::Start, None, SETTLE_SHORT) {
        return false;
    }
    ctx.click_landmark_step("Story Mode", Landmark::OtherStart, None, SETTLE_SHORT)
}

/// Like Story, with the Legend queue selected after Create Match. Legend has
/// no Leaf Village stage.
fn navigate_legend(ctx: &mut RunContext) -> bool {
    ctx.status.emit("Legend Mode: Walking to Create Match...");
    let Some(create) = hold_until_landmark(ctx, 'a', Landmark::CreateMatch, NAV_TIMEOUT) else {
        if ctx.gate.is_running() {
            ctx.status.emit("Legend Mode: Could not find Create Match");
        }
        return false;
    };
    ctx.hover_click(create, SETTLE_SHORT);

    if !ctx.click_landmark_step(
        "Legend Mode",
        Landmark::Legend,
        Some(Duration::from_secs(10)),
        SETTLE_SHORT,
    ) {
        return false;
    }

    if classify_location(&ctx.config.location) == Location::LeafVillage {
        ctx.status
            .emit("Legend Mode: Leaf Village has no Legend stage, aborting");
        return false;
    }
    if !select_stage(ctx, "Legend Mode") {
        return false;
    }
    if !select_act(ctx, "Legend Mode", None) {
        return false;
    }
    maybe_nightmare(ctx, "Legend Mode");

    if !ctx.click_landmark_step("Legend Mode", Landmark::Start, None, SETTLE_SHORT) {
        return false;
    }
    ctx.click_landmark_step("Legend Mode", Landmark::OtherStart, None, SETTLE_SHORT)
}

/// Raid lobby sits forward-left of the area entrance; Frozen Gate gets an
/// extra pre-match walk once the ready prompt is up.
fn navigate_raid(ctx: &mut RunContext) -> bool {
    if !ctx.click_landmark_step("Raid Mode", Landmark::Raids, Some(NAV_TIMEOUT), SETTLE_LONG) {
        return false;
    }

    ctx.status.emit("Raid Mode: Walking to the raid gates...");
    hold_direction(ctx, 'w', 3.0);
    hold_direction(ctx, 'a', 3.0);

    if !ctx.click_landmark_step("Raid Mode", Landmark::CreateMatch, Some(NAV_TIMEOUT), SETTLE_LONG)
    {
        return false;
    }
    if !ctx.click_landmark_step("Raid Mode", Landmark::FrozenGate, Some(NAV_TIMEOUT), SETTLE_SHORT)
    {
        return false;
    }
    if !select_act(ctx, "Raid Mode", Some(NAV_TIMEOUT)) {
        return false;
    }
    if !ctx.click_landmark_step("Raid Mode", Landmark::Start, Some(NAV_TIMEOUT), SETTLE_SHORT) {
        return false;
    }
    if !ctx.click_landmark_step("Raid Mode", Landmark::OtherStart, Some(NAV_TIMEOUT), SETTLE_SHORT)
    {
        return false;
    }

    if classify_location(&ctx.config.location) == Location::FrozenGate {
        ctx.status.emit("Raid Mode: Waiting for the ready prompt...");
        let Some(yes) = ctx.wait_for_landmark(&Landmark::Yes, None) else {
            return false;
        };
        ctx.input.hold_key(ZOOM_KEY, Duration::from_millis(100));
        ctx.gate.sleep(Duration::from_millis(300));
        hold_direction(ctx, 'w', 2.0);
        ctx.hover_click(yes.center, SETTLE_SHORT);
    }

    ctx.status.emit("Raid Mode: Navigation complete");
    true
}

/// Siege walks right along the gate row until Create Match appears; if the
/// walk overshoots, a stationary re-search covers it.
fn navigate_siege(ctx: &mut RunContext) -> bool {
    if !ctx.click_landmark_step("Siege Mode", Landmark::Siege, Some(NAV_TIMEOUT), SETTLE_LONG) {
        return false;
    }

    ctx.status.emit("Siege Mode: Walking to the siege gates...");
    hold_direction(ctx, 'w', 1.5);

    ctx.status.emit("Siege Mode: Walking right until Create Match appears...");
    let mut create = hold_until_landmark(ctx, 'd', Landmark::CreateMatch, WALK_SEARCH_TIMEOUT);
    if !ctx.gate.check() {
        return false;
    }
    if create.is_none() {
        ctx.status.emit("Siege Mode: Not found while walking, searching in place...");
        create = ctx
            .wait_for_landmark(&Landmark::CreateMatch, Some(Duration::from_secs(10)))
            .map(|m| m.center);
    }
    let Some(create) = create else {
        ctx.status.emit("Siege Mode: Could not find Create Match");
        return false;
    };
    ctx.hover_click(create, SETTLE_LONG);

    if !ctx.click_landmark_step("Siege Mode", Landmark::BlueDungeon, Some(NAV_TIMEOUT), SETTLE_SHORT)
    {
        return false;
    }
    if !select_act(ctx, "Siege Mode", Some(NAV_TIMEOUT)) {
        return false;
    }
    if !ctx.click_landmark_step("Siege Mode", Landmark::Start, Some(NAV_TIMEOUT), SETTLE_SHORT) {
        return false;
    }
    if !ctx.click_landmark_step("Siege Mode", Landmark::OtherStart, Some(NAV_TIMEOUT), SETTLE_SHORT)
    {
        return false;
    }

    ctx.status.emit("Siege Mode: Navigation complete");
    true
}

/// Clicks the stage button for the configured location.
fn select_stage(ctx: &mut RunContext, label: &str) -> bool {
    let landmark = match classify_location(&ctx.config.location) {
        Location::LeafVillage => Landmark::Leaf,
        Location::PlanetNamek => Landmark::Planet,
        Location::DarkHollow => Landmark::Hollow,
        _ => {
            ctx.status.emit(&format!(
                "{}: No stage mapping for {:?}",
                label, ctx.config.location
            ));
            return false;
        }
    };
    ctx.click_landmark_step(label, landmark, None, SETTLE_SHORT)
}

/// Clicks the act button. The act art changes between game updates, so a
/// missed image probe falls back to reading the label text.
fn select_act(ctx: &mut RunContext, label: &str, timeout: Option<Duration>) -> bool {
    let act = act_number(&ctx.config.act);
    let phrase = format!("Act {}", act);
    ctx.status.emit(&format!("{}: Searching for {}...", label, phrase));

    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        if !ctx.gate.check() {
            return false;
        }
        if let Some(found) = ctx.find_landmark(&Landmark::Act(act)) {
            ctx.hover_click(found.center, SETTLE_SHORT);
            return true;
        }
        if let Some(found) = ctx.find_text(&phrase) {
            ctx.status.emit(&format!("{}: Matched {:?} by text", label, phrase));
            ctx.hover_click(found.center, SETTLE_SHORT);
            return true;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            ctx.status.emit(&format!("{}: Could not find {}", label, phrase));
            return false;
        }
        if !ctx.gate.sleep(SEARCH_INTERVAL) {
            return false;
        }
    }
}

/// Clicks the nightmare difficulty toggle when enabled. Missing is fine.
fn maybe_nightmare(ctx: &mut RunContext, label: &str) {
    if !ctx.config.nightmare {
        return;
    }
    ctx.status.emit(&format!("{}: Nightmare enabled, toggling...", label));
    match ctx.wait_for_landmark(&Landmark::Nightmare, Some(Duration::from_secs(10))) {
        Some(found) => {
            ctx.hover_click(found.center, SETTLE_SHORT);
        }
        None => {
            ctx.status
                .emit(&format!("{}: Nightmare button not found, continuing", label));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testkit::{RecordingInput, ScriptedVision, context, hit, running_gate};
    use super::*;

    #[test]
    fn positioning_tables() {
        assert_eq!(
            positioning_sequence(Mode::Story, Location::LeafVillage),
            &[('a', 2.0), ('w', 1.8)]
        );
        assert_eq!(
            positioning_sequence(Mode::Siege, Location::BlueDungeon),
            &[('w', 5.0)]
        );
        assert_eq!(
            positioning_sequence(Mode::Legend, Location::PlanetNamek),
            &[('s', 1.1), ('a', 0.2)]
        );
        assert!(positioning_sequence(Mode::Story, Location::Other).is_empty());
    }

    #[test]
    fn replay_skips_navigation() {
        let vision = ScriptedVision { on_landmark: |_: &Landmark| None };
        let input = RecordingInput::default();
        let mut ctx = context(vision, input.clone(), running_gate());
        ctx.replay = true;

        assert!(navigate_to_game(&mut ctx));
        assert!(input.log.borrow().clicks.is_empty());
    }

    #[test]
    fn cancellation_aborts_navigation() {
        let gate = running_gate();
        let stopper = gate.clone();
        let vision = ScriptedVision {
            on_landmark: move |_: &Landmark| {
                stopper.stop();
                None
            },
        };
        let mut ctx = context(vision, RecordingInput::default(), gate);
        assert!(!navigate_to_game(&mut ctx));
    }

    #[test]
    fn positioning_holds_keys_in_order() {
        let vision = ScriptedVision { on_landmark: |_: &Landmark| None };
        let input = RecordingInput::default();
        let mut ctx = context(vision, input.clone(), running_gate());

        run_positioning(&mut ctx, "Planet Namek");
        let holds: Vec<char> = input.log.borrow().holds.iter().map(|(k, _)| *k).collect();
        assert_eq!(holds, vec!['s', 'a']);
    }

    #[test]
    fn zoom_drags_across_the_window_then_zooms() {
        let vision = ScriptedVision { on_landmark: |_: &Landmark| None };
        let input = RecordingInput::default();
        let mut ctx = context(vision, input.clone(), running_gate());

        pre_match_zoom(&mut ctx);
        assert_eq!(input.log.borrow().drags, 1);
        assert_eq!(
            input.log.borrow().holds,
            vec![(ZOOM_KEY, Duration::from_millis(500))]
        );
    }

    #[test]
    fn select_act_falls_back_to_text() {
        struct TextVision;
        impl super::super::Perceive for TextVision {
            fn find_landmark(
                &mut self,
                _landmark: &Landmark,
                _region: Option<crate::capture::Region>,
            ) -> Option<crate::vision::MatchResult> {
                None
            }
            fn find_text(
                &mut self,
                phrase: &str,
                _region: Option<crate::capture::Region>,
            ) -> Option<crate::vision::MatchResult> {
                (phrase == "Act 3").then(|| hit(400, 300))
            }
            fn screenshot_png(
                &mut self,
                _region: Option<crate::capture::Region>,
            ) -> Option<Vec<u8>> {
                None
            }
            fn screen_region(&self) -> crate::capture::Region {
                crate::capture::Region::new(0, 0, 1920, 1080)
            }
        }

        let input = RecordingInput::default();
        let mut ctx = context(
            ScriptedVision { on_landmark: |_: &Landmark| None },
            input.clone(),
            running_gate(),
        );
        ctx.vision = Box::new(TextVision);
        ctx.config.act = "Act 3".into();

        assert!(select_act(&mut ctx, "Story Mode", Some(Duration::ZERO)));
        assert_eq!(input.log.borrow().clicks, vec![(400, 300)]);
    }

    #[test]
    fn select_act_times_out_as_phase_failure() {
        let vision = ScriptedVision { on_landmark: |_: &Landmark| None };
        let mut ctx = context(vision, RecordingInput::default(), running_gate());
        assert!(!select_act(&mut ctx, "Raid Mode", Some(Duration::ZERO)));
        assert!(ctx.gate.is_running());
    }
}
