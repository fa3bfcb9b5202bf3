//! Landmark location via normalized cross-correlation template matching.

use image::{GrayImage, RgbaImage};
use imageproc::template_matching::{MatchTemplateMethod, find_extremes, match_template};

use crate::capture::{FrameSource, Region};
use crate::vision::MatchResult;

/// Both frame and template are reduced to intensity by default; color mode is
/// for landmarks whose only distinguishing feature is hue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MatchMode {
    #[default]
    Grayscale,
    Color,
}

/// Margin used to re-capture around a region after a near miss. Compensates
/// for a window that shifted slightly since its rectangle was computed.
const EXPAND_MARGIN: i32 = 40;

fn channel_plane(img: &RgbaImage, channel: usize) -> GrayImage {
    GrayImage::from_fn(img.width(), img.height(), |x, y| {
        image::Luma([img.get_pixel(x, y)[channel]])
    })
}

fn best_of_surface(surface: &imageproc::definitions::Image<image::Luma<f32>>) -> (u32, u32, f32) {
    let extremes = find_extremes(surface);
    let (x, y) = extremes.max_value_location;
    (x, y, extremes.max_value)
}

/// Finds the best template position in a frame.
///
/// Returns the top-left corner of the match plus the correlation score, or
/// `None` when the template does not fit inside the frame.
pub fn match_in_frame(
    frame: &RgbaImage,
    template: &RgbaImage,
    mode: MatchMode,
) -> Option<(u32, u32, f32)> {
    if template.width() > frame.width() || template.height() > frame.height() {
        return None;
    }

    match mode {
        MatchMode::Grayscale => {
            let frame_gray = image::imageops::grayscale(frame);
            let template_gray = image::imageops::grayscale(template);
            let surface = match_template(
                &frame_gray,
                &template_gray,
                MatchTemplateMethod::CrossCorrelationNormalized,
            );
            Some(best_of_surface(&surface))
        }
        MatchMode::Color => {
            // Correlate each channel separately and average the surfaces, so
            // a landmark that differs only in hue still separates.
            let mut combined: Option<imageproc::definitions::Image<image::Luma<f32>>> = None;
            for channel in 0..3 {
                let surface = match_template(
                    &channel_plane(frame, channel),
                    &channel_plane(template, channel),
                    MatchTemplateMethod::CrossCorrelationNormalized,
                );
                combined = Some(match combined {
                    None => surface,
                    Some(mut acc) => {
                        for (acc_px, px) in acc.pixels_mut().zip(surface.pixels()) {
                            acc_px[0] += px[0];
                        }
                        acc
                    }
                });
            }
            let mut combined = combined?;
            for px in combined.pixels_mut() {
                px[0] /= 3.0;
            }
            Some(best_of_surface(&combined))
        }
    }
}

pub struct TemplateMatcher {
    pub mode: MatchMode,
}

impl TemplateMatcher {
    pub fn new() -> Self {
        Self { mode: MatchMode::Grayscale }
    }

    /// Locates `template` inside `region` (full screen when `None`).
    ///
    /// A score below `threshold` is a normal not-found outcome. When a region
    /// was given and the first pass misses, one retry runs over the region
    /// padded by [`EXPAND_MARGIN`] and clamped to the screen.
    pub fn locate(
        &self,
        source: &dyn FrameSource,
        template: &RgbaImage,
        region: Option<Region>,
        threshold: f32,
    ) -> Option<MatchResult> {
        let capture_region = region.unwrap_or_else(|| source.screen_region());
        if let Some(result) = self.locate_once(source, template, capture_region, threshold) {
            return Some(result);
        }

        if region.is_some() {
            let expanded = capture_region.expanded(EXPAND_MARGIN, source.screen_region());
            if expanded != capture_region {
                return self.locate_once(source, template, expanded, threshold);
            }
        }
        None
    }

    fn locate_once(
        &self,
        source: &dyn FrameSource,
        template: &RgbaImage,
        region: Region,
        threshold: f32,
    ) -> Option<MatchResult> {
        let frame = match source.capture(Some(region)) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("capture failed: {}", e);
                return None;
            }
        };

        let (x, y, score) = match_in_frame(&frame, template, self.mode)?;
        if score < threshold {
            log::debug!("best match {:.2} below threshold {:.2}", score, threshold);
            return None;
        }

        let center_x = region.left + x as i32 + template.width() as i32 / 2;
        let center_y = region.top + y as i32 + template.height() as i32 / 2;
        Some(MatchResult { center: (center_x, center_y), confidence: score })
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::crop_to_region;
    use image::Rgba;

    struct FakeScreen {
        frame: RgbaImage,
    }

    impl FrameSource for FakeScreen {
        fn screen_region(&self) -> Region {
            Region::new(0, 0, self.frame.width() as i32, self.frame.height() as i32)
        }

        fn capture(&self, region: Option<Region>) -> anyhow::Result<RgbaImage> {
            match region {
                Some(r) => crop_to_region(&self.frame, 0, 0, r),
                None => Ok(self.frame.clone()),
            }
        }
    }

    fn checker(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        })
    }

    fn frame_with_template(template: &RgbaImage, at: (u32, u32)) -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(1000, 800, Rgba([128, 128, 128, 255]));
        image::imageops::overlay(&mut frame, template, at.0 as i64, at.1 as i64);
        frame
    }

    #[test]
    fn finds_template_at_known_offset() {
        let template = checker(40, 30);
        let screen = FakeScreen { frame: frame_with_template(&template, (120, 80)) };

        let matcher = TemplateMatcher::new();
        let result = matcher
            .locate(&screen, &template, Some(Region::new(0, 0, 1000, 800)), 0.65)
            .expect("template should be found");

        assert_eq!(result.center, (120 + 20, 80 + 15));
        assert!(result.confidence >= 0.65);
    }

    #[test]
    fn threshold_is_monotonic() {
        let template = checker(40, 30);
        // Corrupt a stripe of the pasted copy so the score drops below 1.
        let mut pasted = template.clone();
        for x in 0..pasted.width() {
            pasted.put_pixel(x, 0, Rgba([128, 128, 128, 255]));
            pasted.put_pixel(x, 1, Rgba([128, 128, 128, 255]));
        }
        let mut frame = RgbaImage::from_pixel(400, 300, Rgba([128, 128, 128, 255]));
        image::imageops::overlay(&mut frame, &pasted, 300, 200);
        let (x, y, score) = match_in_frame(&frame, &template, MatchMode::Grayscale).unwrap();
        assert_eq!((x, y), (300, 200));
        assert!(score < 1.0);

        let screen = FakeScreen { frame };
        let matcher = TemplateMatcher::new();
        assert!(matcher.locate(&screen, &template, None, score - 0.02).is_some());
        assert!(matcher.locate(&screen, &template, None, score + 0.02).is_none());
    }

    #[test]
    fn near_miss_retries_with_expanded_region() {
        let template = checker(20, 20);
        // Just outside the given region, but inside the 40px expansion.
        let screen = FakeScreen { frame: frame_with_template(&template, (110, 30)) };

        let matcher = TemplateMatcher::new();
        let result = matcher
            .locate(&screen, &template, Some(Region::new(0, 0, 100, 100)), 0.95)
            .expect("expanded retry should find the template");

        assert_eq!(result.center, (120, 40));
    }

    #[test]
    fn oversized_template_is_not_found() {
        let template = checker(64, 64);
        let frame = RgbaImage::from_pixel(32, 32, Rgba([128, 128, 128, 255]));
        assert!(match_in_frame(&frame, &template, MatchMode::Grayscale).is_none());
    }

    #[test]
    fn color_mode_locates_a_textured_patch() {
        // Texture in the red channel only; green/blue are flat everywhere.
        let patch = RgbaImage::from_fn(16, 16, |x, y| {
            let r = if (x + y) % 2 == 0 { 220 } else { 160 };
            Rgba([r, 40, 40, 255])
        });
        let mut frame = RgbaImage::from_pixel(200, 100, Rgba([40, 40, 40, 255]));
        image::imageops::overlay(&mut frame, &patch, 60, 30);

        let (x, y, _score) = match_in_frame(&frame, &patch, MatchMode::Color).unwrap();
        assert_eq!((x, y), (60, 30));
    }
}
