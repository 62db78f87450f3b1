pub mod aggregator;
pub mod bounding_box_render;
pub mod display;
pub mod dnn_ocr;
pub mod frame_processor;
pub mod image_sink;
pub mod object_detector;
pub mod plate_text;
pub mod region;
pub mod session;
pub mod video_reader;

use std::path::Path;

use opencv::core::{Point, Rect};
use opencv::prelude::Mat;

use crate::error::Result;

/// Oriented box as returned by the detector: four corners in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionBox {
    pub points: [Point; 4],
}

impl DetectionBox {
    pub fn new(points: [Point; 4]) -> Self {
        Self { points }
    }

    /// Axis-aligned bounds of the corners, clamped to a `width` x `height` frame.
    ///
    /// Returns `None` when nothing of the box is left inside the frame.
    pub fn clamped_rect(&self, width: i32, height: i32) -> Option<Rect> {
        let xs = self.points.iter().map(|p| p.x);
        let ys = self.points.iter().map(|p| p.y);
        let x1 = xs.clone().min()?.max(0);
        let x2 = xs.max()?.min(width);
        let y1 = ys.clone().min()?.max(0);
        let y2 = ys.max()?.min(height);

        if x2 > x1 && y2 > y1 {
            Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }
}

/// One raw oriented detection.
#[derive(Clone, Debug)]
pub struct ObbDetection {
    pub confidence: f32,
    pub class_index: usize,
    pub polygon: DetectionBox,
}

/// A piece of text returned by the OCR engine.
#[derive(Clone, Debug, PartialEq)]
pub struct OcrFragment {
    pub text: String,
    /// Engine confidence in `[0, 1]`.
    pub confidence: f32,
}

impl OcrFragment {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Everything known about one plate seen in one frame.
///
/// Built once by the aggregator and never changed afterwards.
#[derive(Clone, Debug)]
pub struct PlateRecord {
    bbox: Rect,
    confidence: f32,
    class_name: String,
    raw_text: String,
    text: String,
    is_valid: bool,
    cropped: Mat,
    frame: Mat,
}

impl PlateRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bbox: Rect,
        confidence: f32,
        class_name: String,
        raw_text: String,
        text: String,
        is_valid: bool,
        cropped: Mat,
        frame: Mat,
    ) -> Self {
        Self {
            bbox,
            confidence,
            class_name,
            raw_text,
            text,
            is_valid,
            cropped,
            frame,
        }
    }

    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// OCR output with spaces removed, before validation.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Canonical plate text when valid, the raw text otherwise.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn cropped(&self) -> &Mat {
        &self.cropped
    }

    /// Snapshot of the unannotated source frame.
    pub fn frame(&self) -> &Mat {
        &self.frame
    }
}

/// Oriented plate detector.
pub trait PlateDetector {
    fn detect(&mut self, frame: &Mat, confidence_threshold: f32) -> Result<Vec<ObbDetection>>;
}

/// Text reader for preprocessed plate crops.
pub trait OcrEngine {
    fn read(&mut self, image: &Mat) -> Result<Vec<OcrFragment>>;
}

/// Source of BGR frames. `Ok(None)` means no more frames.
pub trait FrameSource {
    fn read(&mut self) -> Result<Option<Mat>>;
    fn release(&mut self) -> Result<()>;
}

pub trait DisplaySink {
    fn show(&mut self, frame: &Mat) -> Result<()>;
    /// Non-blocking key poll, `None` when nothing was pressed.
    fn poll_key(&mut self) -> Result<Option<i32>>;
    fn close_all(&mut self) -> Result<()>;
}

pub trait ImageSink {
    fn write(&mut self, path: &Path, image: &Mat) -> Result<()>;
}

impl<T: PlateDetector + ?Sized> PlateDetector for &mut T {
    fn detect(&mut self, frame: &Mat, confidence_threshold: f32) -> Result<Vec<ObbDetection>> {
        (**self).detect(frame, confidence_threshold)
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for &mut T {
    fn read(&mut self, image: &Mat) -> Result<Vec<OcrFragment>> {
        (**self).read(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(points: [(i32, i32); 4]) -> DetectionBox {
        DetectionBox::new(points.map(|(x, y)| Point::new(x, y)))
    }

    #[test]
    fn clamped_rect_covers_rotated_corners() {
        let plate = quad([(20, 10), (60, 14), (58, 30), (18, 26)]);
        assert_eq!(plate.clamped_rect(100, 100), Some(Rect::new(18, 10, 42, 20)));
    }

    #[test]
    fn clamped_rect_is_limited_to_frame() {
        let plate = quad([(-5, -5), (120, -5), (120, 40), (-5, 40)]);
        assert_eq!(plate.clamped_rect(100, 30), Some(Rect::new(0, 0, 100, 30)));
    }

    #[test]
    fn box_outside_frame_has_no_rect() {
        let right = quad([(110, 10), (150, 10), (150, 20), (110, 20)]);
        assert_eq!(right.clamped_rect(100, 100), None);

        let above = quad([(10, -40), (50, -40), (50, -10), (10, -10)]);
        assert_eq!(above.clamped_rect(100, 100), None);
    }

    #[test]
    fn flat_box_has_no_rect() {
        let line = quad([(10, 10), (50, 10), (50, 10), (10, 10)]);
        assert_eq!(line.clamped_rect(100, 100), None);
    }
}
