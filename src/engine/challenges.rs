//! Auto-Challenges mode: run the timed challenge once per interval, farm the
//! selected stage in between. Its own phase enum, separate from the stage
//! loop, because the alternation (and the challenge timer) does not fit the
//! navigate-place-replay shape.

use std::time::{Duration, Instant};

use crate::landmarks::Landmark;

use super::context::RunContext;
use super::placement::{self, BatchTarget};
use super::{navigation, outcome};

/// Challenges reset on a 30 minute cadence.
const CHALLENGE_INTERVAL: Duration = Duration::from_secs(30 * 60);
const RETRY_PAUSE: Duration = Duration::from_secs(5);
/// Cap on the forward walk toward the challenge boards.
const WALK_CAP: Duration = Duration::from_secs(15);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChallengePhase {
    /// Navigate to and complete the timed challenge.
    Challenge,
    /// Navigate to the farming stage afterwards.
    NavigateFarm,
    /// Farm the selected stage until the next challenge is due.
    Farm,
}

pub fn run(ctx: &mut RunContext) -> anyhow::Result<()> {
    let challenge_location = ctx.config.challenge_location.clone();
    ctx.status.emit(&format!(
        "Auto-Challenges: Challenge map = {}",
        challenge_location
    ));

    let mut last_challenge: Option<Instant> = None;
    let mut phase = ChallengePhase::Challenge;

    while ctx.gate.check() {
        phase = match phase {
            ChallengePhase::Challenge => {
                ctx.status.emit("=== CHALLENGE TIME ===");
                ctx.replay = false;
                if !navigate_to_challenge(ctx) {
                    ctx.status.emit("Auto-Challenges: Challenge navigation failed");
                    ctx.gate.sleep(RETRY_PAUSE);
                    ChallengePhase::Challenge
                } else if !run_challenge_game(ctx) {
                    ctx.status.emit("Auto-Challenges: Challenge game failed");
                    ctx.gate.sleep(RETRY_PAUSE);
                    ChallengePhase::Challenge
                } else {
                    last_challenge = Some(Instant::now());
                    ctx.status.emit(
                        "Auto-Challenges: Challenge complete, farming until the next one",
                    );
                    ChallengePhase::NavigateFarm
                }
            }

            ChallengePhase::NavigateFarm => {
                if navigate_to_selected_stage(ctx) {
                    ChallengePhase::Farm
                } else {
                    ctx.status.emit("Auto-Challenges: Farm navigation failed");
                    ctx.gate.sleep(RETRY_PAUSE);
                    ChallengePhase::NavigateFarm
                }
            }

            ChallengePhase::Farm => {
                let due = last_challenge.is_none_or(|t| t.elapsed() >= CHALLENGE_INTERVAL);
                if due {
                    ctx.status
                        .emit("Auto-Challenges: Challenge due, returning to lobby...");
                    return_to_lobby(ctx);
                    ChallengePhase::Challenge
                } else {
                    if let Some(started) = last_challenge {
                        let remaining = CHALLENGE_INTERVAL.saturating_sub(started.elapsed());
                        ctx.status.emit(&format!(
                            "Auto-Challenges: {}m until next challenge",
                            remaining.as_secs() / 60
                        ));
                    }
                    if !run_farm_stage(ctx) && ctx.gate.is_running() {
                        ctx.status.emit("Auto-Challenges: Stage failed, retrying...");
                        ctx.gate.sleep(Duration::from_secs(2));
                    }
                    ChallengePhase::Farm
                }
            }
        };
    }
    Ok(())
}

/// Areas, Challenges, walk forward until the Regular board shows, then the
/// board's trait roll: hover the trait and click its slot 200px to the right.
fn navigate_to_challenge(ctx: &mut RunContext) -> bool {
    let timeout = Some(Duration::from_secs(30));
    if !ctx.click_landmark_step("Challenge Nav", Landmark::Areas, timeout, Duration::from_secs(1)) {
        return false;
    }
    if !ctx.click_landmark_step(
        "Challenge Nav",
        Landmark::Challenges,
        timeout,
        Duration::from_secs(1),
    ) {
        return false;
    }

    ctx.status.emit("Challenge Nav: Walking forward to find Regular...");
    let walk_start = Instant::now();
    let mut regular = None;
    while walk_start.elapsed() < WALK_CAP {
        if !ctx.gate.check() {
            return false;
        }
        if let Some(found) = ctx.find_landmark(&Landmark::Regular) {
            regular = Some(found);
            break;
        }
        ctx.input.hold_key('w', Duration::from_millis(500));
        ctx.gate.sleep(Duration::from_millis(100));
    }
    let Some(regular) = regular else {
        ctx.status.emit("Challenge Nav: Could not find Regular");
        return false;
    };
    ctx.hover_click(regular.center, Duration::from_secs(1));

    let Some(trait_button) =
        ctx.wait_for_landmark(&Landmark::Trait, Some(Duration::from_secs(15)))
    else {
        if ctx.gate.is_running() {
            ctx.status.emit("Challenge Nav: Could not find the trait button");
        }
        return false;
    };

    // Hovering the trait reveals the roll row; the usable slot sits a fixed
    // offset to its right.
    let (tx, ty) = trait_button.center;
    ctx.input.move_to(tx, ty, Duration::from_millis(300));
    ctx.gate.sleep(Duration::from_millis(300));
    ctx.input.move_to(tx + 200, ty, Duration::from_millis(200));
    ctx.gate.sleep(Duration::from_millis(200));
    ctx.input.click(tx + 200, ty);
    ctx.gate.sleep(Duration::from_millis(500));

    ctx.click_landmark_step(
        "Challenge Nav",
        Landmark::Start,
        Some(Duration::from_secs(15)),
        Duration::from_secs(1),
    )
}

/// Which challenge map loaded, from the per-map landmarks; falls back to the
/// configured challenge location.
fn detect_challenge_map(ctx: &mut RunContext) -> String {
    if ctx.find_landmark(&Landmark::ChallengeLeaf).is_some() {
        return "Leaf Village".to_string();
    }
    if ctx.find_landmark(&Landmark::ChallengePlanet).is_some() {
        return "Planet Namek".to_string();
    }
    if ctx.find_landmark(&Landmark::ChallengeDark).is_some() {
        return "Dark Hollow".to_string();
    }
    ctx.config.challenge_location.clone()
}

fn run_challenge_game(ctx: &mut RunContext) -> bool {
    ctx.status.emit("Challenge Game: Waiting for the ready prompt...");
    if ctx
        .wait_for_landmark(&Landmark::Yes, Some(Duration::from_secs(60)))
        .is_none()
    {
        if ctx.gate.is_running() {
            ctx.status.emit("Challenge Game: Ready prompt never appeared");
        }
        return false;
    }
    ctx.gate.sleep(Duration::from_secs(2));

    navigation::pre_match_zoom(ctx);
    let map = detect_challenge_map(ctx);
    ctx.status.emit(&format!("Challenge Game: Detected map = {}", map));
    navigation::run_positioning(ctx, &map);

    if let Some(yes) = ctx.find_landmark(&Landmark::Yes) {
        ctx.hover_click(yes.center, Duration::from_secs(1));
    }
    ctx.stage_start = Some(Instant::now());

    // Placement uses the challenge document for the *detected* map, not the
    // configured one; the rotation does not ask which map you wanted.
    placement::place_batch(
        ctx,
        false,
        Some(BatchTarget {
            mode_folder: "Challenges".to_string(),
            location: map,
            act: "Act 1".to_string(),
        }),
    );

    ctx.status.emit("Challenge Game: Waiting for the result...");
    let Some(result) = outcome::await_outcome(ctx) else {
        return false;
    };
    outcome::report_outcome(ctx, result);

    ctx.gate.sleep(Duration::from_secs(2));
    return_to_lobby(ctx)
}

/// Story-route navigation to the configured farming stage, act 1.
fn navigate_to_selected_stage(ctx: &mut RunContext) -> bool {
    ctx.status.emit("Stage Nav: Navigating to the farming stage...");
    let timeout = Some(Duration::from_secs(30));

    if !ctx.click_landmark_step("Stage Nav", Landmark::Areas, timeout, Duration::from_secs(1)) {
        return false;
    }
    if !ctx.click_landmark_step("Stage Nav", Landmark::Story, timeout, Duration::from_secs(1)) {
        return false;
    }
    if let Some(close) = ctx.wait_for_landmark(&Landmark::CloseMenu, Some(Duration::from_secs(30)))
    {
        ctx.hover_click(close.center, Duration::from_millis(500));
    }
    ctx.input.hold_key('w', Duration::from_secs(3));
    ctx.gate.sleep(Duration::from_millis(500));

    let stage = match crate::config::classify_location(&ctx.config.challenge_location) {
        crate::config::Location::PlanetNamek => Landmark::Planet,
        crate::config::Location::DarkHollow => Landmark::Hollow,
        _ => Landmark::Leaf,
    };
    if !ctx.click_landmark_step("Stage Nav", stage, timeout, Duration::from_millis(500)) {
        return false;
    }
    if let Some(act) = ctx.wait_for_landmark(&Landmark::Act(1), Some(Duration::from_secs(15))) {
        ctx.hover_click(act.center, Duration::from_millis(500));
    }
    true
}

/// One farming game, chained through the replay button.
fn run_farm_stage(ctx: &mut RunContext) -> bool {
    if ctx
        .wait_for_landmark(&Landmark::Yes, Some(Duration::from_secs(120)))
        .is_none()
    {
        return false;
    }
    ctx.gate.sleep(Duration::from_secs(2));

    if !ctx.replay {
        navigation::pre_match_zoom(ctx);
        let location = ctx.config.challenge_location.clone();
        navigation::run_positioning(ctx, &location);
    }

    if let Some(yes) = ctx.find_landmark(&Landmark::Yes) {
        ctx.hover_click(yes.center, Duration::from_secs(1));
    }
    ctx.stage_start = Some(Instant::now());

    placement::place_batch(
        ctx,
        false,
        Some(BatchTarget {
            mode_folder: "Story".to_string(),
            location: ctx.config.challenge_location.clone(),
            act: "Act 1".to_string(),
        }),
    );

    let Some(result) = outcome::await_outcome(ctx) else {
        return false;
    };
    outcome::report_outcome(ctx, result);

    ctx.gate.sleep(Duration::from_secs(2));
    outcome::click_replay(ctx);
    true
}

fn return_to_lobby(ctx: &mut RunContext) -> bool {
    ctx.replay = false;
    ctx.click_landmark_step(
        "Auto-Challenges",
        Landmark::ReturnToLobby,
        Some(Duration::from_secs(30)),
        Duration::from_secs(2),
    )
}
