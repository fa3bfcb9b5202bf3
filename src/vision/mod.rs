//! Perception: template matching and text recognition over captured frames.

pub mod fuzzy;
pub mod ocr;
pub mod preprocess;
pub mod template;
pub mod text;

/// A located landmark: absolute screen center plus match strength in [0, 1].
///
/// Consumed immediately by the sequencer, never persisted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchResult {
    pub center: (i32, i32),
    pub confidence: f32,
}
