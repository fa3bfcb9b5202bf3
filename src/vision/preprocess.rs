//! Image transforms applied before OCR.
//!
//! Game text renders over animated backgrounds with both light-on-dark and
//! dark-on-light styling, and no single transform reads all of it. The text
//! finder runs every transform in [`TRANSFORMS`] order over the same frame
//! and keeps the best match.

use image::{GrayImage, Luma, RgbaImage};
use imageproc::contrast::{adaptive_threshold, equalize_histogram};
use imageproc::filter::{median_filter, sharpen3x3};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transform {
    /// Plain intensity conversion, no enhancement.
    Original,
    /// Histogram equalization for washed-out contrast.
    Contrast,
    Sharpen,
    /// Min-max stretch to the full intensity range.
    Stretch,
    /// Local thresholding for uneven lighting.
    Adaptive,
    /// Fixed threshold tuned for light text on dark backgrounds.
    BinaryLight,
    /// Fixed threshold tuned for dark text on light backgrounds.
    BinaryDark,
    Denoise,
}

/// Fixed order the text finder tries. Cheapest and most general first.
pub const TRANSFORMS: [Transform; 8] = [
    Transform::Original,
    Transform::Contrast,
    Transform::Sharpen,
    Transform::Stretch,
    Transform::Adaptive,
    Transform::BinaryLight,
    Transform::BinaryDark,
    Transform::Denoise,
];

const LIGHT_TEXT_THRESHOLD: u8 = 100;
const DARK_TEXT_THRESHOLD: u8 = 150;

fn binarize(gray: &GrayImage, cutoff: u8, above: u8, below: u8) -> GrayImage {
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y)[0] > cutoff {
            Luma([above])
        } else {
            Luma([below])
        }
    })
}

fn stretch(gray: &GrayImage) -> GrayImage {
    let mut min = u8::MAX;
    let mut max = u8::MIN;
    for px in gray.pixels() {
        min = min.min(px[0]);
        max = max.max(px[0]);
    }
    if max <= min {
        return gray.clone();
    }
    let span = (max - min) as u32;
    GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
        let v = (gray.get_pixel(x, y)[0] - min) as u32;
        Luma([(v * 255 / span) as u8])
    })
}

impl Transform {
    pub fn name(&self) -> &'static str {
        match self {
            Transform::Original => "original",
            Transform::Contrast => "contrast",
            Transform::Sharpen => "sharpen",
            Transform::Stretch => "stretch",
            Transform::Adaptive => "adaptive",
            Transform::BinaryLight => "binary_light",
            Transform::BinaryDark => "binary_dark",
            Transform::Denoise => "denoise",
        }
    }

    pub fn apply(&self, img: &RgbaImage) -> GrayImage {
        let gray = image::imageops::grayscale(img);
        match self {
            Transform::Original => gray,
            Transform::Contrast => equalize_histogram(&gray),
            Transform::Sharpen => sharpen3x3(&gray),
            Transform::Stretch => stretch(&gray),
            Transform::Adaptive => adaptive_threshold(&gray, 5),
            Transform::BinaryLight => binarize(&gray, LIGHT_TEXT_THRESHOLD, 255, 0),
            Transform::BinaryDark => binarize(&gray, DARK_TEXT_THRESHOLD, 255, 0),
            Transform::Denoise => median_filter(&gray, 1, 1),
        }
    }
}
