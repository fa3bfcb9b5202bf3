//! The macro sequencer.
//!
//! Three levels of control: run-level (start/stop/pause/resume on a worker
//! thread), phase-level (explicit phase enums driving each stage loop), and
//! action-level (bounded or unbounded landmark searches followed by input).
//! Cancellation is cooperative: every loop polls the [`Gate`] at least as
//! often as its own action delay, so `stop()` lands within a poll interval.

pub mod challenges;
pub mod context;
pub mod navigation;
pub mod outcome;
pub mod perception;
pub mod placement;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::capture::{Region, ScreenCapturer};
use crate::config::{Config, Mode};
use crate::input::{EnigoBackend, InputControl, InputDriver};
use crate::landmarks::Landmark;
use crate::notify::Notifier;
use crate::status::{StatusCallback, StatusSink};
use crate::vision::MatchResult;
use crate::window::XcapWindowLocator;

use context::RunContext;
use perception::LiveVision;

/// Flag poll interval inside waits and sleeps.
pub const CANCEL_POLL: Duration = Duration::from_millis(100);
/// Interval between landmark search attempts while waiting.
pub const SEARCH_INTERVAL: Duration = Duration::from_millis(500);
/// Unbounded loops report progress every this many iterations.
pub const LOG_EVERY: u32 = 10;

/// Run failures that stop the run cleanly with a message, as opposed to
/// unexpected errors (which are logged with full context and also stop it).
#[derive(Debug, Error)]
pub enum RunError {
    #[error("disconnected and no private server link is configured")]
    DisconnectedNoRecovery,
}

/// Shared run/pause flags.
///
/// Written only by the controlling thread through start/stop/pause/resume;
/// read everywhere. A stale read costs at most one poll interval.
#[derive(Clone, Default)]
pub struct Gate {
    running: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the run live. Returns `true` when a run was already active.
    pub fn begin(&self) -> bool {
        self.paused.store(false, Ordering::SeqCst);
        self.running.swap(true, Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// The "still running" check every long loop calls at iteration
    /// boundaries. Blocks while paused without ending the run.
    pub fn check(&self) -> bool {
        while self.is_paused() && self.is_running() {
            std::thread::sleep(CANCEL_POLL);
        }
        self.is_running()
    }

    /// Cancellable sleep: all waiting routes through here so stop() is
    /// observed within [`CANCEL_POLL`] regardless of the requested duration.
    /// Returns whether the run is still live.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.check() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(CANCEL_POLL));
        }
    }
}

/// What the sequencer asks of the perception layer. One trait seam so tests
/// can script landmark appearances.
pub trait Perceive {
    /// One-shot landmark probe; absence is a normal outcome.
    fn find_landmark(&mut self, landmark: &Landmark, region: Option<Region>) -> Option<MatchResult>;
    /// One-shot phrase probe using multi-frame OCR consensus.
    fn find_text(&mut self, phrase: &str, region: Option<Region>) -> Option<MatchResult>;
    /// PNG-encoded screenshot for the outcome notification.
    fn screenshot_png(&mut self, region: Option<Region>) -> Option<Vec<u8>>;
    /// Primary display bounds.
    fn screen_region(&self) -> Region;
}

/// Public engine: the entire externally consumed API is start/stop/pause/
/// resume plus status callback registration.
pub struct MacroEngine {
    config: Config,
    gate: Gate,
    status_callback: Option<StatusCallback>,
    worker: Option<JoinHandle<()>>,
}

impl MacroEngine {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            gate: Gate::new(),
            status_callback: None,
            worker: None,
        }
    }

    pub fn set_status_callback(&mut self, callback: StatusCallback) {
        self.status_callback = Some(callback);
    }

    pub fn is_running(&self) -> bool {
        self.gate.is_running()
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    /// Spawns the sequencing loop on a dedicated thread. A no-op while a run
    /// is already active.
    pub fn start(&mut self) {
        if self.gate.begin() {
            return;
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let config = self.config.clone();
        let gate = self.gate.clone();
        let status = StatusSink::new(
            self.status_callback.clone(),
            Some(crate::paths::logs_dir().join("macro_session.log")),
        );

        self.worker = Some(std::thread::spawn(move || {
            worker_main(config, gate, status);
        }));
    }

    pub fn stop(&mut self) {
        self.gate.stop();
    }

    pub fn pause(&mut self) {
        self.gate.pause();
    }

    pub fn resume(&mut self) {
        self.gate.resume();
    }

    /// Waits for the worker to wind down after a stop.
    pub fn join(&mut self) {
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MacroEngine {
    fn drop(&mut self) {
        self.gate.stop();
        self.join();
    }
}

/// Worker entry: builds the live component stack, runs the macro, and
/// guarantees the running flag clears on every exit path.
fn worker_main(config: Config, gate: Gate, status: StatusSink) {
    status.emit("=== MACRO STARTED ===");

    let input: Box<dyn InputControl> = match EnigoBackend::new() {
        Ok(backend) => Box::new(InputDriver::new(backend)),
        Err(e) => {
            status.emit(&format!("Input device unavailable: {}", e));
            gate.stop();
            status.emit("=== MACRO STOPPED ===");
            return;
        }
    };

    let vision: Box<dyn Perceive> = Box::new(LiveVision::new(
        Box::new(ScreenCapturer::new()),
        &config,
        &status,
    ));

    let mut ctx = RunContext {
        config,
        gate: gate.clone(),
        status: status.clone(),
        vision,
        input,
        locator: Box::new(XcapWindowLocator),
        notifier: Notifier::new(),
        config_path: crate::paths::config_path(),
        placements_root: crate::paths::placements_dir(),
        window_region: None,
        replay: false,
        stage_start: None,
        game_count: 0,
    };

    // Any unexpected error lands here: logged, run stopped cleanly.
    if let Err(e) = run_macro(&mut ctx) {
        ctx.status.emit(&format!("Error: {:#}", e));
        log::error!("run aborted: {:#}", e);
    }

    gate.stop();
    status.emit("=== MACRO STOPPED ===");
}

/// Top-level run sequence: window discovery, focus, then the mode loop.
fn run_macro(ctx: &mut RunContext) -> anyhow::Result<()> {
    ctx.replay = false;

    ctx.status.emit("Step 1: Detecting game window...");
    ctx.discover_window();

    ctx.status.emit("Step 2: Focusing game window...");
    ctx.focus_window();
    if !ctx.gate.sleep(Duration::from_millis(500)) {
        return Ok(());
    }

    if ctx.config.mode == Mode::AutoChallenges {
        ctx.status.emit("=== AUTO-CHALLENGES MODE ===");
        return challenges::run(ctx);
    }

    ctx.status.emit("Step 3: Navigating to game...");
    if !navigation::navigate_to_game(ctx) {
        ctx.status.emit("Step 3: Navigation failed");
        return Ok(());
    }
    ctx.status.emit("Step 3: Navigation complete");

    run_stage_loop(ctx)
}

/// Repeats stages until stopped: disconnect check, one full stage, replay.
fn run_stage_loop(ctx: &mut RunContext) -> anyhow::Result<()> {
    while ctx.gate.check() {
        match ctx.check_disconnect() {
            context::DisconnectCheck::Clear => {}
            context::DisconnectCheck::Recovered => {
                ctx.status.emit("Re-navigating after reconnect...");
                ctx.replay = false;
                if !navigation::navigate_to_game(ctx) {
                    ctx.status.emit("Navigation failed after reconnect");
                    return Ok(());
                }
            }
            context::DisconnectCheck::Unrecoverable => {
                return Err(RunError::DisconnectedNoRecovery.into());
            }
        }

        ctx.game_count += 1;
        ctx.status.emit(&format!("=== GAME {} START ===", ctx.game_count));

        if !outcome::play_one_stage(ctx)? {
            return Ok(());
        }

        ctx.status.emit(&format!("=== GAME {} COMPLETE ===", ctx.game_count));
        if !ctx.gate.sleep(Duration::from_secs(2)) {
            return Ok(());
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testkit {
    //! Fakes for sequencer tests: scripted perception, recording input, and
    //! a ready-made context with all timing knobs zeroed. Unbounded loops in
    //! tests always get either a fake that eventually succeeds or a scripted
    //! cancellation, never real timing.

    use super::*;
    use crate::input::InputControl;
    use crate::window::{FixedRegionLocator, WindowLocator};
    use std::cell::RefCell;
    use std::rc::Rc;

    pub struct ScriptedVision<F>
    where
        F: FnMut(&Landmark) -> Option<MatchResult>,
    {
        pub on_landmark: F,
    }

    impl<F> Perceive for ScriptedVision<F>
    where
        F: FnMut(&Landmark) -> Option<MatchResult>,
    {
        fn find_landmark(
            &mut self,
            landmark: &Landmark,
            _region: Option<Region>,
        ) -> Option<MatchResult> {
            (self.on_landmark)(landmark)
        }

        fn find_text(&mut self, _phrase: &str, _region: Option<Region>) -> Option<MatchResult> {
            None
        }

        fn screenshot_png(&mut self, _region: Option<Region>) -> Option<Vec<u8>> {
            None
        }

        fn screen_region(&self) -> Region {
            Region::new(0, 0, 1920, 1080)
        }
    }

    pub fn hit(x: i32, y: i32) -> MatchResult {
        MatchResult { center: (x, y), confidence: 0.9 }
    }

    #[derive(Default)]
    pub struct InputLog {
        pub clicks: Vec<(i32, i32)>,
        pub key_presses: Vec<char>,
        pub holds: Vec<(char, Duration)>,
        pub drags: u32,
    }

    /// Records every high-level input call; never sleeps.
    #[derive(Clone, Default)]
    pub struct RecordingInput {
        pub log: Rc<RefCell<InputLog>>,
    }

    impl InputControl for RecordingInput {
        fn click(&mut self, x: i32, y: i32) {
            self.log.borrow_mut().clicks.push((x, y));
        }

        fn move_to(&mut self, _x: i32, _y: i32, _duration: Duration) {}

        fn drag_down(&mut self, _x: i32, _y: i32, _distance: i32, _duration: Duration) {
            self.log.borrow_mut().drags += 1;
        }

        fn press_key(&mut self, key: char) {
            self.log.borrow_mut().key_presses.push(key);
        }

        fn hold_key(&mut self, key: char, duration: Duration) {
            self.log.borrow_mut().holds.push((key, duration));
        }

        fn hold_key_until(
            &mut self,
            key: char,
            predicate: &mut dyn FnMut() -> Option<(i32, i32)>,
            _timeout: Duration,
            _interval: Duration,
            cancel: &dyn Fn() -> bool,
        ) -> Option<(i32, i32)> {
            self.log.borrow_mut().holds.push((key, Duration::ZERO));
            // Bounded probe so a scripted never-succeeds fake cannot spin.
            for _ in 0..100 {
                if !cancel() {
                    return None;
                }
                if let Some(hit) = predicate() {
                    return Some(hit);
                }
            }
            None
        }
    }

    pub fn zero_delay_config() -> Config {
        let mut config = Config::default();
        config.placement_delay = 0.0;
        config.placement_move_duration = 0.0;
        config.slot_press_delay = 0.0;
        config.upgrade_press_delay = 0.0;
        config
    }

    pub fn running_gate() -> Gate {
        let gate = Gate::new();
        gate.begin();
        gate
    }

    pub fn context<F>(vision: ScriptedVision<F>, input: RecordingInput, gate: Gate) -> RunContext
    where
        F: FnMut(&Landmark) -> Option<MatchResult> + 'static,
    {
        let locator: Box<dyn WindowLocator> = Box::new(FixedRegionLocator {
            title: "Roblox".into(),
            region: Region::new(0, 0, 1280, 720),
        });
        RunContext {
            config: zero_delay_config(),
            gate,
            status: StatusSink::default(),
            vision: Box::new(vision),
            input: Box::new(input),
            locator,
            notifier: Notifier::new(),
            config_path: std::env::temp_dir().join("paradox-macro-test-config.json"),
            placements_root: std::env::temp_dir().join("paradox-macro-test-settings"),
            window_region: Some(Region::new(0, 0, 1280, 720)),
            replay: false,
            stage_start: None,
            game_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_begin_is_idempotent_guard() {
        let gate = Gate::new();
        assert!(!gate.begin(), "first begin starts the run");
        assert!(gate.begin(), "second begin reports already running");
        gate.stop();
        assert!(!gate.is_running());
    }

    #[test]
    fn stop_clears_pause() {
        let gate = Gate::new();
        gate.begin();
        gate.pause();
        assert!(gate.is_paused());
        gate.stop();
        assert!(!gate.is_paused());
        assert!(!gate.is_running());
    }

    #[test]
    fn cancelled_sleep_returns_false_immediately() {
        let gate = Gate::new();
        gate.begin();
        gate.stop();
        let start = Instant::now();
        assert!(!gate.sleep(Duration::from_secs(60)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn zero_sleep_passes_through_when_running() {
        let gate = Gate::new();
        gate.begin();
        assert!(gate.sleep(Duration::ZERO));
    }

    #[test]
    fn stop_interrupts_a_long_sleep_within_a_poll_interval() {
        let gate = Gate::new();
        gate.begin();
        let sleeper = gate.clone();
        let start = Instant::now();
        let handle = std::thread::spawn(move || sleeper.sleep(Duration::from_secs(60)));
        std::thread::sleep(Duration::from_millis(50));
        gate.stop();
        assert!(!handle.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
