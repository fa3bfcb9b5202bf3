//! Phrase location: preprocessing sweep, fuzzy scoring, frame consensus.
//!
//! A single frame of animated UI often catches text mid-transition, so
//! anything the sequencer *waits* on goes through multi-frame consensus:
//! several rapid captures, detections bucketed into a coarse grid to absorb
//! jitter, and the most-voted cell wins. One matching frame out of N is
//! enough; unanimity is never required.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Result, anyhow};
use image::{GrayImage, RgbaImage};

use crate::capture::{FrameSource, Region};
use crate::vision::MatchResult;
use crate::vision::fuzzy::{FUZZY_MATCH_THRESHOLD, fuzzy_match};
use crate::vision::ocr::{OcrDetection, TextBackend};
use crate::vision::preprocess::TRANSFORMS;

/// Weight of the OCR confidence in the combined score.
const OCR_WEIGHT: f32 = 0.4;
/// Weight of the fuzzy score in the combined score.
const FUZZY_WEIGHT: f32 = 0.6;
/// The transform sweep relaxes the per-detection OCR floor by this factor;
/// the combined score does the final gating.
const SWEEP_RELAXATION: f32 = 0.8;

pub const CONSENSUS_FRAMES: usize = 5;
pub const CONSENSUS_FRAME_DELAY: Duration = Duration::from_millis(150);
/// Detections within the same 20px grid cell count as the same position.
const CONSENSUS_GRID: f32 = 20.0;

/// Best match for a phrase within one frame, in frame-local coordinates.
#[derive(Clone, Debug)]
pub struct TextHit {
    pub center: (i32, i32),
    pub text: String,
    pub ocr_confidence: f32,
    pub fuzzy_score: u32,
    pub combined: f32,
    pub transform: &'static str,
}

pub struct TextFinder {
    backends: Vec<Box<dyn TextBackend>>,
}

fn snap(v: i32) -> i32 {
    ((v as f32 / CONSENSUS_GRID).round() * CONSENSUS_GRID) as i32
}

fn to_match_result(hit: &TextHit, region: Option<Region>) -> MatchResult {
    let (ox, oy) = region.map(|r| (r.left, r.top)).unwrap_or((0, 0));
    MatchResult {
        center: (hit.center.0 + ox, hit.center.1 + oy),
        confidence: hit.combined,
    }
}

impl TextFinder {
    /// Builds a finder over a ranked backend list. An empty list is a
    /// configuration error surfaced here, once, not per call.
    pub fn new(backends: Vec<Box<dyn TextBackend>>) -> Result<Self> {
        if backends.is_empty() {
            return Err(anyhow!(
                "no OCR backend available; install Tesseract to enable text landmarks"
            ));
        }
        Ok(Self { backends })
    }

    /// Runs backends in rank order; the first that produces detections wins.
    fn recognize(&self, frame: &GrayImage) -> Vec<OcrDetection> {
        for backend in &self.backends {
            match backend.recognize(frame) {
                Ok(detections) if !detections.is_empty() => return detections,
                Ok(_) => continue,
                Err(e) => {
                    log::debug!("{} backend failed: {}", backend.name(), e);
                }
            }
        }
        Vec::new()
    }

    /// Sweeps every preprocessing transform over one frame and keeps the
    /// single best fuzzy-matching detection by combined score.
    pub fn find_in_frame(
        &self,
        frame: &RgbaImage,
        phrase: &str,
        ocr_threshold: f32,
    ) -> Option<TextHit> {
        let floor = ocr_threshold * SWEEP_RELAXATION;
        let mut best: Option<TextHit> = None;

        for transform in TRANSFORMS {
            let processed = transform.apply(frame);
            for detection in self.recognize(&processed) {
                if detection.confidence < floor {
                    continue;
                }
                let (matched, fuzzy) =
                    fuzzy_match(phrase, &detection.text, FUZZY_MATCH_THRESHOLD);
                if !matched {
                    continue;
                }
                let combined =
                    detection.confidence * OCR_WEIGHT + fuzzy as f32 / 100.0 * FUZZY_WEIGHT;
                if best.as_ref().is_none_or(|b| combined > b.combined) {
                    best = Some(TextHit {
                        center: detection.center,
                        text: detection.text.clone(),
                        ocr_confidence: detection.confidence,
                        fuzzy_score: fuzzy,
                        combined,
                        transform: transform.name(),
                    });
                }
            }
        }
        best
    }

    /// Single-capture phrase search. Returns absolute screen coordinates.
    pub fn find_text(
        &self,
        source: &dyn FrameSource,
        phrase: &str,
        region: Option<Region>,
        ocr_threshold: f32,
    ) -> Option<MatchResult> {
        let frame = source.capture(region).ok()?;
        let hit = self.find_in_frame(&frame, phrase, ocr_threshold)?;
        log::debug!(
            "[{}] matched {:?} -> {:?} (conf {:.2}, fuzzy {})",
            hit.transform,
            hit.text,
            phrase,
            hit.ocr_confidence,
            hit.fuzzy_score
        );
        Some(to_match_result(&hit, region))
    }

    /// Burst-capture consensus search. Captures `frames` frames
    /// `frame_delay` apart, then returns the best detection from the
    /// most-voted grid cell.
    pub fn find_text_consensus(
        &self,
        source: &dyn FrameSource,
        phrase: &str,
        region: Option<Region>,
        ocr_threshold: f32,
        frames: usize,
        frame_delay: Duration,
    ) -> Option<MatchResult> {
        let mut captured = Vec::with_capacity(frames);
        for i in 0..frames {
            if let Ok(frame) = source.capture(region) {
                captured.push(frame);
            }
            if i + 1 < frames && !frame_delay.is_zero() {
                std::thread::sleep(frame_delay);
            }
        }

        let hits: Vec<TextHit> = captured
            .iter()
            .filter_map(|frame| self.find_in_frame(frame, phrase, ocr_threshold))
            .collect();
        if hits.is_empty() {
            return None;
        }
        log::debug!(
            "consensus: {:?} seen in {}/{} frames",
            phrase,
            hits.len(),
            frames
        );

        let mut cells: HashMap<(i32, i32), (u32, f32)> = HashMap::new();
        for hit in &hits {
            let cell = (snap(hit.center.0), snap(hit.center.1));
            let entry = cells.entry(cell).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 = entry.1.max(hit.combined);
        }
        // Most votes wins; combined score breaks ties deterministically.
        let (&winning_cell, _) = cells
            .iter()
            .max_by(|a, b| {
                (a.1.0, a.1.1)
                    .partial_cmp(&(b.1.0, b.1.1))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;

        hits.iter()
            .filter(|hit| (snap(hit.center.0), snap(hit.center.1)) == winning_cell)
            .max_by(|a, b| {
                a.combined
                    .partial_cmp(&b.combined)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|hit| to_match_result(hit, region))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::cell::RefCell;

    /// Frames are told apart by width; transforms never change dimensions,
    /// so the scripted backend below can key its output on it.
    struct FrameScript {
        widths: RefCell<Vec<u32>>,
    }

    impl FrameScript {
        fn new(widths: Vec<u32>) -> Self {
            Self { widths: RefCell::new(widths) }
        }
    }

    impl FrameSource for FrameScript {
        fn screen_region(&self) -> Region {
            Region::new(0, 0, 1920, 1080)
        }

        fn capture(&self, _region: Option<Region>) -> anyhow::Result<RgbaImage> {
            let mut widths = self.widths.borrow_mut();
            let width = if widths.len() > 1 { widths.remove(0) } else { widths[0] };
            Ok(RgbaImage::from_pixel(width, 50, Rgba([128, 128, 128, 255])))
        }
    }

    /// Emits scripted detections depending on the frame width.
    struct ScriptedBackend {
        script: fn(u32) -> Vec<OcrDetection>,
    }

    impl TextBackend for ScriptedBackend {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn recognize(&self, frame: &GrayImage) -> Result<Vec<OcrDetection>> {
            Ok((self.script)(frame.width()))
        }
    }

    fn detection(text: &str, confidence: f32, center: (i32, i32)) -> OcrDetection {
        OcrDetection { text: text.to_string(), confidence, center }
    }

    fn finder(script: fn(u32) -> Vec<OcrDetection>) -> TextFinder {
        TextFinder::new(vec![Box::new(ScriptedBackend { script })]).unwrap()
    }

    #[test]
    fn empty_backend_list_is_a_construction_error() {
        assert!(TextFinder::new(Vec::new()).is_err());
    }

    #[test]
    fn garbled_text_is_matched_and_scored() {
        let finder = finder(|_| {
            vec![
                detection("Settings", 0.95, (10, 10)),
                detection("Creat Match", 0.9, (60, 30)),
            ]
        });
        let source = FrameScript::new(vec![100]);

        let result = finder.find_text(&source, "Create Match", None, 0.6).unwrap();
        assert_eq!(result.center, (60, 30));
        // combined = 0.9 * 0.4 + fuzzy/100 * 0.6, with fuzzy at 92.
        assert!((result.confidence - (0.36 + 0.92 * 0.6)).abs() < 0.01);
    }

    #[test]
    fn region_offset_translates_to_absolute_coordinates() {
        let finder = finder(|_| vec![detection("Victory", 0.9, (40, 20))]);
        let source = FrameScript::new(vec![100]);

        let region = Region::new(500, 300, 600, 350);
        let result = finder.find_text(&source, "Victory", Some(region), 0.6).unwrap();
        assert_eq!(result.center, (540, 320));
    }

    #[test]
    fn low_confidence_detections_are_dropped() {
        let finder = finder(|_| vec![detection("Victory", 0.3, (40, 20))]);
        let source = FrameScript::new(vec![100]);
        assert!(finder.find_text(&source, "Victory", None, 0.6).is_none());
    }

    #[test]
    fn secondary_backend_covers_for_an_empty_primary() {
        let primary = ScriptedBackend { script: |_| Vec::new() };
        let secondary = ScriptedBackend {
            script: |_| vec![detection("Victory", 0.9, (70, 10))],
        };
        let finder = TextFinder::new(vec![Box::new(primary), Box::new(secondary)]).unwrap();
        let source = FrameScript::new(vec![100]);

        let result = finder.find_text(&source, "Victory", None, 0.6).unwrap();
        assert_eq!(result.center, (70, 10));
    }

    #[test]
    fn consensus_returns_the_most_voted_cell() {
        // Five frames; the phrase renders only in frames 2 and 4 at nearly
        // the same spot. Frame 5 has a spurious high-confidence hit
        // elsewhere, which must lose to the two-vote cell.
        let finder = finder(|width| match width {
            102 => vec![detection("Victory", 0.80, (60, 60))],
            104 => vec![detection("Victory", 0.90, (62, 58))],
            105 => vec![detection("Victory!", 0.99, (300, 300))],
            _ => Vec::new(),
        });
        let source = FrameScript::new(vec![101, 102, 103, 104, 105]);

        let result = finder
            .find_text_consensus(&source, "Victory", None, 0.6, 5, Duration::ZERO)
            .unwrap();
        // Highest combined score within the winning cell: the frame-4 hit.
        assert_eq!(result.center, (62, 58));
    }

    #[test]
    fn consensus_needs_at_least_one_matching_frame() {
        let finder = finder(|_| Vec::new());
        let source = FrameScript::new(vec![100]);
        assert!(
            finder
                .find_text_consensus(&source, "Victory", None, 0.6, 5, Duration::ZERO)
                .is_none()
        );
    }

    #[test]
    fn single_matching_frame_is_sufficient() {
        let finder = finder(|width| match width {
            103 => vec![detection("Replay", 0.85, (120, 40))],
            _ => Vec::new(),
        });
        let source = FrameScript::new(vec![101, 102, 103, 104, 105]);

        let result = finder
            .find_text_consensus(&source, "Replay", None, 0.6, 5, Duration::ZERO)
            .unwrap();
        assert_eq!(result.center, (120, 40));
    }
}
