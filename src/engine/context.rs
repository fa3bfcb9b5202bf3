//! Per-run state and the action-level helpers every phase shares.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::capture::Region;
use crate::config::Config;
use crate::input::InputControl;
use crate::landmarks::Landmark;
use crate::notify::Notifier;
use crate::status::StatusSink;
use crate::vision::MatchResult;
use crate::window::{WindowLocator, find_target_window};

use super::{Gate, Perceive, SEARCH_INTERVAL};

/// Title substring identifying the game client window.
const TARGET_WINDOW_TITLE: &str = "Roblox";

/// Settle time after opening the recovery link before the game is clickable.
const RECONNECT_SETTLE: Duration = Duration::from_secs(15);

/// Pointer travel time for hover-then-click landmark interactions.
const HOVER_DURATION: Duration = Duration::from_millis(300);

pub enum DisconnectCheck {
    /// No disconnect indicator on screen.
    Clear,
    /// Indicator seen, recovery link opened, window refocused.
    Recovered,
    /// Indicator seen and no recovery link configured.
    Unrecoverable,
}

/// Everything a run owns. Created by `start()`, dropped when the worker
/// exits; a restarted run always begins back at window discovery.
pub struct RunContext {
    pub config: Config,
    pub gate: Gate,
    pub status: StatusSink,
    pub vision: Box<dyn Perceive>,
    pub input: Box<dyn InputControl>,
    pub locator: Box<dyn WindowLocator>,
    pub notifier: Notifier,
    /// Config file on disk; webhook URL and win/loss counters are re-read
    /// and written here live during the run.
    pub config_path: PathBuf,
    pub placements_root: PathBuf,
    pub window_region: Option<Region>,
    /// Replay runs skip the zoom/positioning sequence; the camera is already
    /// where the previous match left it.
    pub replay: bool,
    pub stage_start: Option<Instant>,
    pub game_count: u32,
}

impl RunContext {
    /// The working region: the game window if found, else the full display.
    pub fn region(&self) -> Region {
        self.window_region.unwrap_or_else(|| self.vision.screen_region())
    }

    /// One-shot landmark probe bounded to the working region.
    pub fn find_landmark(&mut self, landmark: &Landmark) -> Option<MatchResult> {
        let region = self.window_region;
        self.vision.find_landmark(landmark, region)
    }

    /// One-shot phrase probe bounded to the working region.
    pub fn find_text(&mut self, phrase: &str) -> Option<MatchResult> {
        let region = self.window_region;
        self.vision.find_text(phrase, region)
    }

    /// Polls for a landmark until found, `timeout` elapses (`None` waits
    /// forever), or the run is cancelled. A timeout is a normal not-found
    /// outcome for the caller to act on.
    pub fn wait_for_landmark(
        &mut self,
        landmark: &Landmark,
        timeout: Option<Duration>,
    ) -> Option<MatchResult> {
        let start = Instant::now();
        loop {
            if !self.gate.check() {
                return None;
            }
            if let Some(hit) = self.find_landmark(landmark) {
                return Some(hit);
            }
            if timeout.is_some_and(|t| start.elapsed() >= t) {
                return None;
            }
            if !self.gate.sleep(SEARCH_INTERVAL) {
                return None;
            }
        }
    }

    /// Hover to a landmark hit, click it, and let the UI settle.
    pub fn hover_click(&mut self, center: (i32, i32), settle: Duration) {
        self.input.move_to(center.0, center.1, HOVER_DURATION);
        self.gate.sleep(Duration::from_millis(200));
        self.input.click(center.0, center.1);
        self.gate.sleep(settle);
    }

    /// Waits for a landmark and clicks it. Emits status for both outcomes;
    /// `false` means not found (or cancelled), which aborts the caller's
    /// phase attempt rather than the run.
    pub fn click_landmark_step(
        &mut self,
        label: &str,
        landmark: Landmark,
        timeout: Option<Duration>,
        settle: Duration,
    ) -> bool {
        self.status.emit(&format!("{}: Searching for {:?}...", label, landmark));
        let Some(found) = self.wait_for_landmark(&landmark, timeout) else {
            if self.gate.is_running() {
                self.status.emit(&format!("{}: Could not find {:?}", label, landmark));
            }
            return false;
        };
        self.status.emit(&format!("{}: Found {:?}, clicking...", label, landmark));
        self.hover_click(found.center, settle);
        true
    }

    /// Locates the game window, falling back to the whole primary display.
    /// Re-run after reconnects, since the window may have moved.
    pub fn discover_window(&mut self) {
        match find_target_window(self.locator.as_ref(), TARGET_WINDOW_TITLE) {
            Some(window) => {
                self.status.emit(&format!(
                    "Found game window at ({}, {}) size {}x{}",
                    window.region.left,
                    window.region.top,
                    window.region.width(),
                    window.region.height()
                ));
                self.window_region = Some(window.region);
            }
            None => {
                self.status.emit("Game window not found, using full screen");
                self.window_region = None;
            }
        }
    }

    /// Clicks into the window to give it input focus. Lands at 70% of the
    /// width to stay clear of the left-side UI column.
    pub fn focus_window(&mut self) {
        let region = self.region();
        let x = region.left + (region.width() as f32 * 0.7) as i32;
        let y = (region.top + region.bottom) / 2;
        self.input.click(x, y);
    }

    /// Checks for the disconnect indicator and attempts recovery through the
    /// configured private server link.
    pub fn check_disconnect(&mut self) -> DisconnectCheck {
        if self.find_landmark(&Landmark::Disconnect).is_none() {
            return DisconnectCheck::Clear;
        }

        self.status.emit("DISCONNECT DETECTED!");
        let link = self.config.private_server_link.clone();
        if link.is_empty() {
            self.status.emit("No private server link configured; stopping");
            return DisconnectCheck::Unrecoverable;
        }

        self.status.emit("Reconnecting through private server link...");
        if let Err(e) = open_url(&link) {
            self.status.emit(&format!("Could not open recovery link: {}", e));
            return DisconnectCheck::Unrecoverable;
        }

        self.status.emit("Waiting for the game to load...");
        if !self.gate.sleep(RECONNECT_SETTLE) {
            return DisconnectCheck::Unrecoverable;
        }

        // The window may have moved or respawned; find it again, then click
        // back into it.
        self.discover_window();
        self.focus_window();
        self.gate.sleep(Duration::from_secs(2));
        self.status.emit("Reconnection complete, resuming");
        DisconnectCheck::Recovered
    }

    /// Seconds since the current match was confirmed started.
    pub fn stage_seconds(&self) -> u64 {
        self.stage_start.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }
}

/// Opens a URL with the platform's default handler.
fn open_url(url: &str) -> std::io::Result<()> {
    use std::process::Command;

    #[cfg(target_os = "windows")]
    let mut command = {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", "", url]);
        c
    };
    #[cfg(target_os = "macos")]
    let mut command = {
        let mut c = Command::new("open");
        c.arg(url);
        c
    };
    #[cfg(all(unix, not(target_os = "macos")))]
    let mut command = {
        let mut c = Command::new("xdg-open");
        c.arg(url);
        c
    };

    command.spawn().map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::super::testkit::{RecordingInput, ScriptedVision, context, hit, running_gate};
    use super::*;

    #[test]
    fn wait_for_landmark_returns_after_scripted_misses() {
        let mut calls = 0;
        let vision = ScriptedVision {
            on_landmark: move |_: &Landmark| {
                calls += 1;
                (calls >= 3).then(|| hit(40, 50))
            },
        };
        let gate = running_gate();
        // Stop-aware search with zero effective waiting: the fake succeeds
        // on the third probe; the two misses each cost one SEARCH_INTERVAL.
        let mut ctx = context(vision, RecordingInput::default(), gate);
        let result = ctx.wait_for_landmark(&Landmark::Areas, Some(Duration::from_secs(10)));
        assert_eq!(result.unwrap().center, (40, 50));
    }

    #[test]
    fn wait_for_landmark_times_out_as_not_found() {
        let vision = ScriptedVision { on_landmark: |_: &Landmark| None };
        let mut ctx = context(vision, RecordingInput::default(), running_gate());
        let result = ctx.wait_for_landmark(&Landmark::Areas, Some(Duration::ZERO));
        assert!(result.is_none());
        assert!(ctx.gate.is_running(), "timeout is not a cancellation");
    }

    #[test]
    fn cancelled_wait_returns_none() {
        let gate = running_gate();
        gate.stop();
        let vision = ScriptedVision { on_landmark: |_: &Landmark| Some(hit(1, 1)) };
        let mut ctx = context(vision, RecordingInput::default(), gate.clone());
        ctx.gate = gate;
        assert!(ctx.wait_for_landmark(&Landmark::Areas, None).is_none());
    }

    #[test]
    fn focus_click_lands_right_of_center() {
        let input = RecordingInput::default();
        let vision = ScriptedVision { on_landmark: |_: &Landmark| None };
        let mut ctx = context(vision, input.clone(), running_gate());
        ctx.window_region = Some(Region::new(0, 0, 1000, 500));
        ctx.focus_window();
        assert_eq!(input.log.borrow().clicks, vec![(700, 250)]);
    }

    #[test]
    fn disconnect_without_link_is_unrecoverable() {
        let vision = ScriptedVision {
            on_landmark: |landmark: &Landmark| {
                (*landmark == Landmark::Disconnect).then(|| hit(10, 10))
            },
        };
        let mut ctx = context(vision, RecordingInput::default(), running_gate());
        ctx.config.private_server_link.clear();
        assert!(matches!(ctx.check_disconnect(), DisconnectCheck::Unrecoverable));
    }

    #[test]
    fn no_disconnect_indicator_is_clear() {
        let vision = ScriptedVision { on_landmark: |_: &Landmark| None };
        let mut ctx = context(vision, RecordingInput::default(), running_gate());
        assert!(matches!(ctx.check_disconnect(), DisconnectCheck::Clear));
    }
}
