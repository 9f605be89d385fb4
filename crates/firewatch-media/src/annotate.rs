//! Drawing detections onto frames.
//!
//! Boxes are always drawn. Labels need a TrueType font; when none can be
//! loaded the [`Annotator`] draws boxes only.

use std::path::{Path, PathBuf};

use ab_glyph::{FontArc, PxScale};
use firewatch_models::{BoundingBox, Detection, FireClass};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};

pub const RED: Rgb<u8> = Rgb([255, 0, 0]);
pub const ORANGE: Rgb<u8> = Rgb([255, 165, 0]);
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Box stroke width in pixels.
pub const BOX_THICKNESS: u32 = 2;
/// Label font height in pixels.
pub const LABEL_FONT_SIZE: f32 = 20.0;
/// Padding around the label on upload overlays.
const PLATE_PAD: i32 = 3;
/// Upload labels never sit higher than this baseline.
const MIN_PLATE_BASELINE: i32 = 35;

/// Environment variable naming a `.ttf`/`.otf` file for labels.
pub const LABEL_FONT_ENV: &str = "LABEL_FONT_PATH";

/// Fonts tried when `LABEL_FONT_PATH` is unset.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Box colour for a detection's class.
pub fn class_color(detection: &Detection) -> Rgb<u8> {
    match detection.class() {
        Some(FireClass::Fire) => RED,
        Some(FireClass::Smoke) => ORANGE,
        _ => GREEN,
    }
}

/// Slack for f32 representation error, so 0.6 stays 0.60.
const CEIL_EPSILON: f64 = 1e-4;

/// Confidence rounded up to the next hundredth, as the upload pipeline
/// reports and filters it: 0.951 becomes 0.96, 0.2401 becomes 0.25.
pub fn ceil_confidence(confidence: f32) -> f32 {
    let hundredths = (f64::from(confidence) * 100.0 - CEIL_EPSILON).ceil();
    (hundredths / 100.0) as f32
}

/// Two-decimal confidence as shown on webcam labels.
pub fn format_confidence(confidence: f32) -> String {
    format!("{:.2}", confidence)
}

/// Two-decimal ceiled confidence as written to upload labels and CSV rows.
pub fn format_ceiled_confidence(confidence: f32) -> String {
    format!("{:.2}", ceil_confidence(confidence))
}

/// Webcam label, `"fire 0.93"`.
pub fn realtime_label(detection: &Detection) -> String {
    format!("{} {}", detection.label(), format_confidence(detection.confidence))
}

/// Upload label, `"fire 0.94"` for a raw 0.931.
pub fn vod_label(detection: &Detection) -> String {
    format!(
        "{} {}",
        detection.label(),
        format_ceiled_confidence(detection.confidence)
    )
}

/// Clipped rectangle with inclusive corners, or `None` when nothing is visible.
fn clipped_rect(image: &RgbImage, left: i32, top: i32, right: i32, bottom: i32) -> Option<Rect> {
    let width = image.width() as i32;
    let height = image.height() as i32;
    let left = left.max(0);
    let top = top.max(0);
    let right = right.min(width - 1);
    let bottom = bottom.min(height - 1);
    if right < left || bottom < top {
        return None;
    }
    Some(Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32))
}

/// Rectangle outline of the given thickness. Each ring is one pixel further in.
pub fn draw_box(image: &mut RgbImage, bbox: &BoundingBox, color: Rgb<u8>, thickness: u32) {
    let (x1, y1, x2, y2) = bbox.to_pixels();
    for inset in 0..thickness.max(1) as i32 {
        let (left, top, right, bottom) = (x1 + inset, y1 + inset, x2 - inset, y2 - inset);
        if right < left || bottom < top {
            break;
        }
        // hollow rects are clipped by imageproc; only the size must be non-zero
        let rect = Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Filled rectangle with inclusive corners, clipped to the frame.
pub fn fill_rect(image: &mut RgbImage, left: i32, top: i32, right: i32, bottom: i32, color: Rgb<u8>) {
    if let Some(rect) = clipped_rect(image, left, top, right, bottom) {
        draw_filled_rect_mut(image, rect, color);
    }
}

/// Draws detection overlays with an optional label font.
#[derive(Clone)]
pub struct Annotator {
    font: Option<FontArc>,
    scale: PxScale,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("has_font", &self.font.is_some())
            .field("scale", &self.scale.y)
            .finish()
    }
}

impl Annotator {
    /// Boxes without labels.
    pub fn boxes_only() -> Self {
        Self {
            font: None,
            scale: PxScale::from(LABEL_FONT_SIZE),
        }
    }

    pub fn with_font(font: FontArc) -> Self {
        Self {
            font: Some(font),
            scale: PxScale::from(LABEL_FONT_SIZE),
        }
    }

    /// Load a TrueType/OpenType font file.
    pub fn from_font_file(path: &Path) -> MediaResult<Self> {
        if !path.is_file() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| MediaError::internal(format!("invalid font {}: {}", path.display(), e)))?;
        Ok(Self::with_font(font))
    }

    /// Font from `LABEL_FONT_PATH`, else the first system font found, else boxes only.
    pub fn from_env() -> Self {
        let configured = std::env::var(LABEL_FONT_ENV).ok().map(PathBuf::from);
        let candidates = configured
            .into_iter()
            .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));

        for path in candidates {
            match Self::from_font_file(&path) {
                Ok(annotator) => {
                    info!(font = %path.display(), "Loaded label font");
                    return annotator;
                }
                Err(MediaError::FileNotFound(_)) => continue,
                Err(e) => warn!("Skipping label font: {}", e),
            }
        }

        warn!("No label font found, detections are drawn without text");
        Self::boxes_only()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Pixel size of `text`, `(0, 0)` without a font.
    pub fn label_size(&self, text: &str) -> (u32, u32) {
        match &self.font {
            Some(font) => text_size(self.scale, font, text),
            None => (0, 0),
        }
    }

    fn draw_label(&self, image: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
        if let Some(font) = &self.font {
            draw_text_mut(image, color, x, y, self.scale, font, text);
        }
    }

    /// Webcam overlay: red box with a red `fire 0.93` label above it.
    pub fn draw_realtime(&self, image: &mut RgbImage, detection: &Detection) {
        draw_box(image, &detection.bbox, RED, BOX_THICKNESS);

        let label = realtime_label(detection);
        let (_, text_h) = self.label_size(&label);
        let (x1, y1, _, _) = detection.bbox.to_pixels();
        let top = (y1 - 4 - text_h as i32).max(0);
        self.draw_label(image, x1.max(0), top, &label, RED);
    }

    /// Upload overlay: class-coloured box and a filled plate with white text
    /// whose baseline sits at `(max(0, x1), max(35, y1))`.
    pub fn draw_vod(&self, image: &mut RgbImage, detection: &Detection) {
        let color = class_color(detection);
        draw_box(image, &detection.bbox, color, BOX_THICKNESS);

        let label = vod_label(detection);
        if !self.has_font() {
            return;
        }
        let (text_w, text_h) = self.label_size(&label);
        let (x1, y1, _, _) = detection.bbox.to_pixels();
        let x = x1.max(0);
        let baseline = y1.max(MIN_PLATE_BASELINE);

        fill_rect(
            image,
            x,
            baseline - text_h as i32 - 2 * PLATE_PAD,
            x + text_w as i32 + 2 * PLATE_PAD,
            baseline,
            color,
        );
        self.draw_label(
            image,
            x + PLATE_PAD,
            baseline - text_h as i32 - PLATE_PAD,
            &label,
            WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(class_id: usize, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(10.0, 50.0, 40.0, 90.0), class_id, confidence)
    }

    fn system_annotator() -> Option<Annotator> {
        SYSTEM_FONT_CANDIDATES
            .iter()
            .find_map(|p| Annotator::from_font_file(Path::new(p)).ok())
    }

    #[test]
    fn test_ceil_confidence_rounds_up() {
        assert_eq!(format_ceiled_confidence(0.951), "0.96");
        assert_eq!(format_ceiled_confidence(0.2401), "0.25");
        assert_eq!(format_ceiled_confidence(0.6), "0.60");
        assert_eq!(format_ceiled_confidence(0.5), "0.50");
        assert_eq!(format_ceiled_confidence(1.0), "1.00");
        assert_eq!(format_ceiled_confidence(0.931), "0.94");
        assert!(ceil_confidence(0.2401) >= 0.25);
        assert_eq!(ceil_confidence(0.6), 0.6);
    }

    #[test]
    fn test_realtime_confidence_is_plain_two_decimals() {
        assert_eq!(format_confidence(0.934), "0.93");
        assert_eq!(format_confidence(0.5), "0.50");
    }

    #[test]
    fn test_labels() {
        assert_eq!(realtime_label(&det(0, 0.93)), "fire 0.93");
        assert_eq!(vod_label(&det(0, 0.931)), "fire 0.94");
        assert_eq!(vod_label(&det(1, 0.5)), "smoke 0.50");
        assert_eq!(vod_label(&det(9, 0.5)), "unknown 0.50");
    }

    #[test]
    fn test_class_colors() {
        assert_eq!(class_color(&det(0, 0.9)), RED);
        assert_eq!(class_color(&det(1, 0.9)), ORANGE);
        assert_eq!(class_color(&det(2, 0.9)), GREEN);
    }

    #[test]
    fn test_draw_box_outline_only() {
        let mut img = RgbImage::new(100, 100);
        draw_box(&mut img, &BoundingBox::new(10.0, 10.0, 30.0, 30.0), RED, 2);
        assert_eq!(*img.get_pixel(10, 10), RED);
        assert_eq!(*img.get_pixel(11, 20), RED);
        assert_eq!(*img.get_pixel(30, 30), RED);
        assert_eq!(*img.get_pixel(20, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_clips_out_of_bounds() {
        let mut img = RgbImage::new(20, 20);
        draw_box(&mut img, &BoundingBox::new(-5.0, -5.0, 10.0, 10.0), RED, 2);
        fill_rect(&mut img, 15, 15, 40, 40, WHITE);
        fill_rect(&mut img, 30, 30, 40, 40, GREEN);
        assert_eq!(*img.get_pixel(10, 0), RED);
        assert_eq!(*img.get_pixel(0, 10), RED);
        assert_eq!(*img.get_pixel(19, 19), WHITE);
    }

    #[test]
    fn test_boxes_only_skips_labels() {
        let annotator = Annotator::boxes_only();
        assert!(!annotator.has_font());
        assert_eq!(annotator.label_size("fire 0.90"), (0, 0));

        let mut img = RgbImage::new(200, 200);
        annotator.draw_vod(&mut img, &det(1, 0.8));
        assert_eq!(*img.get_pixel(10, 50), ORANGE);
        // no plate above the box
        assert_eq!(*img.get_pixel(12, 45), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_missing_font_file() {
        let err = Annotator::from_font_file(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[test]
    fn test_invalid_font_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").unwrap();
        assert!(Annotator::from_font_file(&path).is_err());
    }

    #[test]
    fn test_vod_plate_uses_class_color() {
        let Some(annotator) = system_annotator() else {
            return;
        };
        let mut img = RgbImage::new(200, 200);
        annotator.draw_vod(&mut img, &det(1, 0.8));
        // plate starts at x1 and ends on the baseline at max(35, y1) = 50
        assert_eq!(*img.get_pixel(10, 50), ORANGE);
        assert_eq!(*img.get_pixel(11, 49), ORANGE);
        let (w, h) = annotator.label_size("smoke 0.80");
        assert!(w > 0 && h > 0);
        // white glyph pixels land inside the plate
        let plate_top = 50 - h as u32 - 6;
        let has_text = (plate_top..50)
            .flat_map(|y| (13..13 + w).map(move |x| (x, y)))
            .any(|(x, y)| img.get_pixel(x, y)[2] > 100);
        assert!(has_text);
    }

    #[test]
    fn test_realtime_label_above_box() {
        let Some(annotator) = system_annotator() else {
            return;
        };
        let mut img = RgbImage::new(200, 200);
        annotator.draw_realtime(&mut img, &det(0, 0.95));
        assert_eq!(*img.get_pixel(10, 70), RED);
        let red_above = (0..46)
            .flat_map(|y| (10..120).map(move |x| (x, y)))
            .any(|(x, y)| img.get_pixel(x, y)[0] > 100);
        assert!(red_above);
    }
}
