//! Screen capture.
//!
//! Frames come from the primary display via `xcap`; a rectangular sub-region
//! bounds both capture cost and match ambiguity. Everything downstream works
//! on plain `image` buffers, so tests can substitute synthetic frames through
//! the [`FrameSource`] trait.

use anyhow::{Result, anyhow};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// A rectangle in absolute screen pixel coordinates.
///
/// Invariant: `right > left` and `bottom > top`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Region {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        debug_assert!(right > left && bottom > top, "degenerate region");
        Self { left, top, right, bottom }
    }

    pub fn width(&self) -> u32 {
        (self.right - self.left).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom - self.top).max(0) as u32
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn center(&self) -> (i32, i32) {
        ((self.left + self.right) / 2, (self.top + self.bottom) / 2)
    }

    /// Pads the rectangle by `margin` on every side, clamped to `bounds`.
    pub fn expanded(&self, margin: i32, bounds: Region) -> Region {
        Region {
            left: (self.left - margin).max(bounds.left),
            top: (self.top - margin).max(bounds.top),
            right: (self.right + margin).min(bounds.right),
            bottom: (self.bottom + margin).min(bounds.bottom),
        }
    }
}

/// Source of screen frames. Implemented by the live capturer and by canned
/// frame sequences in tests.
pub trait FrameSource {
    /// Bounds of the primary display in screen coordinates.
    fn screen_region(&self) -> Region;

    /// Captures the given region, or the full primary display when `None`.
    fn capture(&self, region: Option<Region>) -> Result<RgbaImage>;
}

/// Crops `region` (screen coordinates) out of a frame whose top-left pixel
/// sits at screen position (`origin_x`, `origin_y`). The region is clamped to
/// the frame, so a window that hangs off-screen still yields a valid crop.
pub fn crop_to_region(
    frame: &RgbaImage,
    origin_x: i32,
    origin_y: i32,
    region: Region,
) -> Result<RgbaImage> {
    let x0 = (region.left - origin_x).max(0) as u32;
    let y0 = (region.top - origin_y).max(0) as u32;
    if x0 >= frame.width() || y0 >= frame.height() {
        return Err(anyhow!("capture region lies outside the frame"));
    }
    let w = region.width().min(frame.width() - x0);
    let h = region.height().min(frame.height() - y0);
    if w == 0 || h == 0 {
        return Err(anyhow!("capture region lies outside the frame"));
    }
    Ok(image::imageops::crop_imm(frame, x0, y0, w, h).to_image())
}

/// Live capturer for the primary display.
pub struct ScreenCapturer;

impl ScreenCapturer {
    pub fn new() -> Self {
        Self
    }

    fn primary_monitor() -> Result<xcap::Monitor> {
        let monitors = xcap::Monitor::all()?;
        monitors
            .into_iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .ok_or_else(|| anyhow!("no primary monitor found"))
    }
}

impl Default for ScreenCapturer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSource for ScreenCapturer {
    fn screen_region(&self) -> Region {
        match Self::primary_monitor() {
            Ok(m) => {
                let x = m.x().unwrap_or(0);
                let y = m.y().unwrap_or(0);
                let w = m.width().unwrap_or(1920) as i32;
                let h = m.height().unwrap_or(1080) as i32;
                Region::new(x, y, x + w, y + h)
            }
            Err(_) => Region::new(0, 0, 1920, 1080),
        }
    }

    fn capture(&self, region: Option<Region>) -> Result<RgbaImage> {
        let monitor = Self::primary_monitor()?;
        let frame = monitor.capture_image()?;
        match region {
            Some(r) => {
                let origin_x = monitor.x().unwrap_or(0);
                let origin_y = monitor.y().unwrap_or(0);
                crop_to_region(&frame, origin_x, origin_y, r)
            }
            None => Ok(frame),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn region_geometry() {
        let r = Region::new(10, 20, 110, 70);
        assert_eq!(r.width(), 100);
        assert_eq!(r.height(), 50);
        assert_eq!(r.center(), (60, 45));
        assert_eq!(r.area(), 5000);
    }

    #[test]
    fn expansion_clamps_to_bounds() {
        let bounds = Region::new(0, 0, 1920, 1080);
        let r = Region::new(10, 20, 1900, 1070);
        let e = r.expanded(40, bounds);
        assert_eq!(e, Region::new(0, 0, 1920, 1080));

        let inner = Region::new(100, 100, 200, 200);
        assert_eq!(inner.expanded(40, bounds), Region::new(60, 60, 240, 240));
    }

    #[test]
    fn crop_translates_and_clamps() {
        let frame: RgbaImage =
            RgbaImage::from_fn(100, 100, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let crop = crop_to_region(&frame, 0, 0, Region::new(10, 20, 30, 50)).unwrap();
        assert_eq!(crop.dimensions(), (20, 30));
        assert_eq!(crop.get_pixel(0, 0)[0], 10);
        assert_eq!(crop.get_pixel(0, 0)[1], 20);

        // Region extending past the frame is clamped.
        let crop = crop_to_region(&frame, 0, 0, Region::new(90, 90, 150, 150)).unwrap();
        assert_eq!(crop.dimensions(), (10, 10));

        // Fully outside is an error.
        assert!(crop_to_region(&frame, 0, 0, Region::new(200, 200, 300, 300)).is_err());
    }
}
