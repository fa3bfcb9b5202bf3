//! One full stage: ready prompt, pre-match setup, placement, outcome wait,
//! replay. Expressed as an explicit phase enum stepped in a loop, with the
//! cancellation gate checked between phases.

use std::time::{Duration, Instant};

use crate::config::Config;
use crate::landmarks::Landmark;
use crate::notify::StageReport;

use super::context::RunContext;
use super::{SEARCH_INTERVAL, navigation, placement};

/// Bound on blind clicking while the reward prompt is up.
const SPAM_CLICK_LIMIT: u32 = 100;
const SPAM_CLICK_PAUSE: Duration = Duration::from_millis(100);
const REPLAY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameOutcome {
    Victory,
    Defeat,
}

/// Phases of a single stage, in order. `AwaitReady` blocks without a
/// timeout: matchmaking can take arbitrarily long and only a stop ends it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StagePhase {
    AwaitReady,
    PreMatch,
    Positioning,
    EarlyPlacement,
    ConfirmStart,
    Placement,
    AwaitOutcome,
    Replay,
    Done,
}

/// Plays one stage start to finish. `Ok(false)` means the run was cancelled.
pub fn play_one_stage(ctx: &mut RunContext) -> anyhow::Result<bool> {
    let mut phase = StagePhase::AwaitReady;
    loop {
        if !ctx.gate.check() {
            return Ok(false);
        }
        phase = match phase {
            StagePhase::AwaitReady => {
                ctx.status.emit("Phase 1: Waiting for the ready prompt...");
                if ctx.wait_for_landmark(&Landmark::Yes, None).is_none() {
                    return Ok(false);
                }
                ctx.gate.sleep(Duration::from_secs(2));
                StagePhase::PreMatch
            }

            StagePhase::PreMatch => {
                if ctx.replay {
                    // Camera and zoom carry over from the previous match.
                    ctx.status.emit("Phase 1.5: Skipping zoom (replay)");
                } else {
                    ctx.status.emit("Phase 1.5: Zooming out...");
                    navigation::pre_match_zoom(ctx);
                }
                StagePhase::Positioning
            }

            StagePhase::Positioning => {
                let location = ctx.config.location.clone();
                navigation::run_positioning(ctx, &location);
                StagePhase::EarlyPlacement
            }

            StagePhase::EarlyPlacement => {
                ctx.status.emit("Phase 1.7: Early placement units...");
                placement::place_batch(ctx, true, None);
                StagePhase::ConfirmStart
            }

            StagePhase::ConfirmStart => {
                // The prompt may have moved while units were placed over it.
                ctx.status.emit("Phase 1.8: Re-locating the ready prompt...");
                let found = ctx
                    .find_landmark(&Landmark::Yes)
                    .or_else(|| ctx.wait_for_landmark(&Landmark::Yes, None));
                match found {
                    Some(yes) => {
                        ctx.status.emit("Phase 1.9: Confirming start...");
                        ctx.hover_click(yes.center, Duration::from_millis(500));
                        ctx.stage_start = Some(Instant::now());
                    }
                    None => {
                        if !ctx.gate.is_running() {
                            return Ok(false);
                        }
                        ctx.status.emit("Phase 1.9: Ready prompt lost, continuing");
                    }
                }
                StagePhase::Placement
            }

            StagePhase::Placement => {
                ctx.status.emit("Phase 2: Unit placement...");
                placement::place_batch(ctx, false, None);
                StagePhase::AwaitOutcome
            }

            StagePhase::AwaitOutcome => {
                ctx.status.emit("Phase 3: Waiting for the game to end...");
                match await_outcome(ctx) {
                    Some(result) => {
                        report_outcome(ctx, result);
                        StagePhase::Replay
                    }
                    None => return Ok(false),
                }
            }

            StagePhase::Replay => {
                click_replay(ctx);
                StagePhase::Done
            }

            StagePhase::Done => return Ok(true),
        };
    }
}

/// Polls for victory/defeat. The reward prompt gets spam-clicked (bounded)
/// while victory is polled between clicks.
pub fn await_outcome(ctx: &mut RunContext) -> Option<GameOutcome> {
    loop {
        if !ctx.gate.check() {
            return None;
        }

        if ctx.find_landmark(&Landmark::Victory).is_some() {
            ctx.status.emit("Phase 3: Victory detected!");
            ctx.gate.sleep(Duration::from_secs(1));
            return Some(GameOutcome::Victory);
        }
        if ctx.find_landmark(&Landmark::Defeat).is_some() {
            ctx.status.emit("Phase 3: Defeat detected!");
            ctx.gate.sleep(Duration::from_secs(1));
            return Some(GameOutcome::Defeat);
        }

        if let Some(prompt) = ctx.find_landmark(&Landmark::ClickPrompt) {
            ctx.status.emit("Phase 3: Reward prompt detected, clicking through...");
            for _ in 0..SPAM_CLICK_LIMIT {
                if !ctx.gate.check() {
                    return None;
                }
                ctx.input.click(prompt.center.0, prompt.center.1);
                if !ctx.gate.sleep(SPAM_CLICK_PAUSE) {
                    return None;
                }
                if ctx.find_landmark(&Landmark::Victory).is_some() {
                    ctx.status.emit("Phase 3: Victory detected after clicking!");
                    return Some(GameOutcome::Victory);
                }
            }
        }

        if !ctx.gate.sleep(SEARCH_INTERVAL) {
            return None;
        }
    }
}

/// Records the result and notifies. The win/loss tally lives in the shared
/// config file, so it is re-read, bumped, and written back here rather than
/// taken from the run's snapshot; the webhook URL is re-read the same way.
pub fn report_outcome(ctx: &mut RunContext, outcome: GameOutcome) {
    let victory = outcome == GameOutcome::Victory;
    let seconds = ctx.stage_seconds();
    ctx.status.emit(&format!(
        "Phase 3: {} in {}s",
        if victory { "VICTORY" } else { "DEFEAT" },
        seconds
    ));

    let mut disk = Config::load(&ctx.config_path);
    if victory {
        disk.stats_wins += 1;
    } else {
        disk.stats_losses += 1;
    }
    if let Err(e) = disk.save(&ctx.config_path) {
        log::warn!("could not persist win/loss stats: {:#}", e);
    }

    let report = StageReport {
        victory,
        stage_seconds: seconds,
        wins: disk.stats_wins,
        losses: disk.stats_losses,
        mode: ctx.config.mode.label().to_string(),
        location: ctx.config.location.clone(),
        act: ctx.config.act.clone(),
    };

    let region = ctx.window_region;
    let screenshot = ctx.vision.screenshot_png(region);
    ctx.notifier.send(&disk.discord_webhook_url, &report, screenshot);
}

/// Clicks the replay button and marks the run as a replay so the next
/// iteration keeps the current camera. Missing replay is non-fatal; the
/// outer loop simply waits for the next ready prompt.
pub fn click_replay(ctx: &mut RunContext) -> bool {
    ctx.status.emit("Phase 4: Looking for the replay button...");
    match ctx.wait_for_landmark(&Landmark::Replay, Some(REPLAY_TIMEOUT)) {
        Some(found) => {
            ctx.status.emit("Phase 4: Replaying...");
            ctx.hover_click(found.center, Duration::from_secs(1));
            ctx.replay = true;
            true
        }
        None => {
            if ctx.gate.is_running() {
                ctx.status.emit("Phase 4: Replay button not found");
            }
            false
        }
    }
}
