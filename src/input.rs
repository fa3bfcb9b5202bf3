//! Synthetic mouse and keyboard input.
//!
//! The game filters application-level synthetic events, so everything goes
//! through `enigo`, which injects at the hardware level. Pointer moves are
//! eased through intermediate points because the game's hover detection wants
//! traversal, not teleports. The [`InputBackend`] trait exists so tests can
//! count raw down/up events.

use std::time::{Duration, Instant};

use enigo::{Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// Raw input primitives. One virtual device; calls are never concurrent.
pub trait InputBackend {
    fn cursor_pos(&mut self) -> (i32, i32);
    fn move_abs(&mut self, x: i32, y: i32);
    fn button_down(&mut self, button: MouseButton);
    fn button_up(&mut self, button: MouseButton);
    fn key_down(&mut self, key: char);
    fn key_up(&mut self, key: char);
}

/// Hardware-level injection via `enigo`.
pub struct EnigoBackend {
    enigo: Enigo,
}

impl EnigoBackend {
    pub fn new() -> anyhow::Result<Self> {
        let enigo = Enigo::new(&Settings::default())?;
        Ok(Self { enigo })
    }
}

impl InputBackend for EnigoBackend {
    fn cursor_pos(&mut self) -> (i32, i32) {
        self.enigo.location().unwrap_or((0, 0))
    }

    fn move_abs(&mut self, x: i32, y: i32) {
        if let Err(e) = self.enigo.move_mouse(x, y, Coordinate::Abs) {
            log::warn!("mouse move failed: {}", e);
        }
    }

    fn button_down(&mut self, button: MouseButton) {
        let button = match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
        };
        if let Err(e) = self.enigo.button(button, Direction::Press) {
            log::warn!("button press failed: {}", e);
        }
    }

    fn button_up(&mut self, button: MouseButton) {
        let button = match button {
            MouseButton::Left => Button::Left,
            MouseButton::Right => Button::Right,
        };
        if let Err(e) = self.enigo.button(button, Direction::Release) {
            log::warn!("button release failed: {}", e);
        }
    }

    fn key_down(&mut self, key: char) {
        if let Err(e) = self.enigo.key(Key::Unicode(key), Direction::Press) {
            log::warn!("key down failed: {}", e);
        }
    }

    fn key_up(&mut self, key: char) {
        if let Err(e) = self.enigo.key(Key::Unicode(key), Direction::Release) {
            log::warn!("key up failed: {}", e);
        }
    }
}

/// High-level input operations the sequencer issues. Object-safe so engine
/// tests can substitute a counting fake.
pub trait InputControl {
    fn click(&mut self, x: i32, y: i32);
    fn move_to(&mut self, x: i32, y: i32, duration: Duration);
    fn drag_down(&mut self, x: i32, y: i32, distance: i32, duration: Duration);
    fn press_key(&mut self, key: char);
    fn hold_key(&mut self, key: char, duration: Duration);

    /// Depresses `key`, polls `predicate` every `interval` until it yields a
    /// hit, `timeout` elapses, or `cancel` returns false. The key is released
    /// in every exit path.
    fn hold_key_until(
        &mut self,
        key: char,
        predicate: &mut dyn FnMut() -> Option<(i32, i32)>,
        timeout: Duration,
        interval: Duration,
        cancel: &dyn Fn() -> bool,
    ) -> Option<(i32, i32)>;
}

/// Releases the held key when dropped, so an unwinding predicate or an early
/// return can never leave a movement key stuck down.
struct HeldKey<'a, B: InputBackend> {
    backend: &'a mut B,
    key: char,
}

impl<'a, B: InputBackend> HeldKey<'a, B> {
    fn press(backend: &'a mut B, key: char) -> Self {
        backend.key_down(key);
        Self { backend, key }
    }
}

impl<B: InputBackend> Drop for HeldKey<'_, B> {
    fn drop(&mut self) {
        self.backend.key_up(self.key);
    }
}

/// Driver layering click/move/hold semantics over a raw backend.
pub struct InputDriver<B: InputBackend> {
    backend: B,
}

const PRE_CLICK_SETTLE: Duration = Duration::from_millis(30);
const BUTTON_HOLD: Duration = Duration::from_millis(20);
const POST_CLICK_SETTLE: Duration = Duration::from_millis(100);
const KEY_TAP_HOLD: Duration = Duration::from_millis(15);

impl<B: InputBackend> InputDriver<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Ease-in-out interpolation from the current cursor position.
    fn smooth_move(&mut self, x: i32, y: i32, duration: Duration, steps: u32) {
        let (start_x, start_y) = self.backend.cursor_pos();
        let steps = steps.max(1);
        let pause = duration / steps;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let eased = t * t * (3.0 - 2.0 * t);
            let cx = start_x + ((x - start_x) as f32 * eased).round() as i32;
            let cy = start_y + ((y - start_y) as f32 * eased).round() as i32;
            self.backend.move_abs(cx, cy);
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
        }
    }
}

impl<B: InputBackend> InputControl for InputDriver<B> {
    fn click(&mut self, x: i32, y: i32) {
        self.backend.move_abs(x, y);
        std::thread::sleep(PRE_CLICK_SETTLE);
        self.backend.button_down(MouseButton::Left);
        std::thread::sleep(BUTTON_HOLD);
        self.backend.button_up(MouseButton::Left);
        std::thread::sleep(POST_CLICK_SETTLE);
    }

    fn move_to(&mut self, x: i32, y: i32, duration: Duration) {
        if duration.is_zero() {
            self.backend.move_abs(x, y);
        } else {
            let steps = (duration.as_secs_f32() * 50.0) as u32;
            self.smooth_move(x, y, duration, steps.max(10));
        }
    }

    fn drag_down(&mut self, x: i32, y: i32, distance: i32, duration: Duration) {
        self.smooth_move(x, y, Duration::from_millis(200), 15);
        std::thread::sleep(Duration::from_millis(100));

        self.backend.button_down(MouseButton::Right);
        std::thread::sleep(Duration::from_millis(150));

        let steps = ((duration.as_secs_f32() * 40.0) as u32).max(20);
        let pause = duration / steps;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            self.backend.move_abs(x, y + (distance as f32 * t).round() as i32);
            if !pause.is_zero() {
                std::thread::sleep(pause);
            }
        }

        std::thread::sleep(Duration::from_millis(100));
        self.backend.button_up(MouseButton::Right);
    }

    fn press_key(&mut self, key: char) {
        self.backend.key_down(key);
        std::thread::sleep(KEY_TAP_HOLD);
        self.backend.key_up(key);
        std::thread::sleep(KEY_TAP_HOLD);
    }

    fn hold_key(&mut self, key: char, duration: Duration) {
        let _held = HeldKey::press(&mut self.backend, key);
        std::thread::sleep(duration);
    }

    fn hold_key_until(
        &mut self,
        key: char,
        predicate: &mut dyn FnMut() -> Option<(i32, i32)>,
        timeout: Duration,
        interval: Duration,
        cancel: &dyn Fn() -> bool,
    ) -> Option<(i32, i32)> {
        let deadline = Instant::now() + timeout;
        let _held = HeldKey::press(&mut self.backend, key);

        let mut result = None;
        while Instant::now() < deadline {
            if !cancel() {
                break;
            }
            if let Some(hit) = predicate() {
                result = Some(hit);
                break;
            }
            std::thread::sleep(interval);
        }
        result
    }
}
