//! Live perception stack: template matching plus OCR over screen captures.

use std::collections::HashMap;
use std::rc::Rc;

use image::RgbaImage;

use crate::capture::{FrameSource, Region};
use crate::config::Config;
use crate::landmarks::Landmark;
use crate::status::StatusSink;
use crate::vision::MatchResult;
use crate::vision::ocr::available_backends;
use crate::vision::template::TemplateMatcher;
use crate::vision::text::{CONSENSUS_FRAME_DELAY, CONSENSUS_FRAMES, TextFinder};

use super::Perceive;

pub struct LiveVision {
    source: Box<dyn FrameSource>,
    matcher: TemplateMatcher,
    /// None when no OCR backend was found at startup; image landmarks still
    /// work, text landmarks report not-found.
    text: Option<TextFinder>,
    /// Loaded reference images by asset path. A failed load is cached too,
    /// so a missing asset is reported once rather than every poll.
    templates: HashMap<String, Option<Rc<RgbaImage>>>,
    template_confidence: f32,
    ocr_tolerance: f32,
}

impl LiveVision {
    pub fn new(source: Box<dyn FrameSource>, config: &Config, status: &StatusSink) -> Self {
        let text = match TextFinder::new(available_backends()) {
            Ok(finder) => Some(finder),
            Err(e) => {
                // Configuration condition, surfaced once at construction.
                status.emit(&format!("Text recognition disabled: {}", e));
                None
            }
        };

        Self {
            source,
            matcher: TemplateMatcher::new(),
            text,
            templates: HashMap::new(),
            template_confidence: config.template_confidence,
            ocr_tolerance: config.ocr_tolerance,
        }
    }

    fn template(&mut self, asset: &str) -> Option<Rc<RgbaImage>> {
        self.templates
            .entry(asset.to_string())
            .or_insert_with(|| {
                let path = crate::paths::landmark_path(asset);
                match image::open(&path) {
                    Ok(img) => Some(Rc::new(img.to_rgba8())),
                    Err(e) => {
                        log::warn!("cannot load landmark image {}: {}", path.display(), e);
                        None
                    }
                }
            })
            .clone()
    }
}

impl Perceive for LiveVision {
    fn find_landmark(&mut self, landmark: &Landmark, region: Option<Region>) -> Option<MatchResult> {
        let threshold = landmark.confidence(self.template_confidence);
        let template = self.template(&landmark.asset())?;
        self.matcher.locate(self.source.as_ref(), &template, region, threshold)
    }

    fn find_text(&mut self, phrase: &str, region: Option<Region>) -> Option<MatchResult> {
        self.text.as_ref()?.find_text_consensus(
            self.source.as_ref(),
            phrase,
            region,
            self.ocr_tolerance,
            CONSENSUS_FRAMES,
            CONSENSUS_FRAME_DELAY,
        )
    }

    fn screenshot_png(&mut self, region: Option<Region>) -> Option<Vec<u8>> {
        let frame = self.source.capture(region).ok()?;
        let mut buffer = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buffer);
        image::DynamicImage::ImageRgba8(frame)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .ok()?;
        Some(buffer)
    }

    fn screen_region(&self) -> Region {
        self.source.screen_region()
    }
}
