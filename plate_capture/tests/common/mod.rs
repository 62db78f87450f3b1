#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use opencv::core::{Point, Scalar, CV_8UC3};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConstManual;

use plate_capture::plate_detection::aggregator::DetectionAggregator;
use plate_capture::plate_detection::frame_processor::FrameProcessor;
use plate_capture::plate_detection::{
    DetectionBox, DisplaySink, FrameSource, ImageSink, ObbDetection, OcrEngine, OcrFragment,
    PlateDetector,
};
use plate_capture::{PlateError, Result};

pub fn frame() -> Mat {
    Mat::new_rows_cols_with_default(240, 320, CV_8UC3, Scalar::all(120.0)).unwrap()
}

pub fn bytes(image: &Mat) -> Vec<u8> {
    image.data_bytes().unwrap().to_vec()
}

pub fn plate_at(x: i32, y: i32, w: i32, h: i32, confidence: f32) -> ObbDetection {
    ObbDetection {
        confidence,
        class_index: 0,
        polygon: DetectionBox::new([
            Point::new(x, y),
            Point::new(x + w, y),
            Point::new(x + w, y + h),
            Point::new(x, y + h),
        ]),
    }
}

/// Returns the same detections on every call, or fails when `fail` is set.
#[derive(Default)]
pub struct FakeDetector {
    pub detections: Vec<ObbDetection>,
    pub fail: bool,
    pub calls: usize,
    pub last_threshold: Option<f32>,
}

impl FakeDetector {
    pub fn with(detections: Vec<ObbDetection>) -> Self {
        Self {
            detections,
            ..Default::default()
        }
    }
}

impl PlateDetector for FakeDetector {
    fn detect(&mut self, _frame: &Mat, confidence_threshold: f32) -> Result<Vec<ObbDetection>> {
        self.calls += 1;
        self.last_threshold = Some(confidence_threshold);
        if self.fail {
            return Err(PlateError::Detection("model exploded".to_string()));
        }
        Ok(self.detections.clone())
    }
}

/// Answers queued replies in call order, then `fallback` forever.
#[derive(Default)]
pub struct FakeOcr {
    pub replies: VecDeque<Result<Vec<OcrFragment>>>,
    pub fallback: Vec<OcrFragment>,
    pub calls: usize,
    pub widths: Vec<i32>,
}

impl FakeOcr {
    pub fn reading(texts: &[&str]) -> Self {
        Self {
            replies: texts
                .iter()
                .map(|t| Ok(vec![OcrFragment::new(*t, 0.9)]))
                .collect(),
            ..Default::default()
        }
    }

    pub fn always(text: &str) -> Self {
        Self {
            fallback: vec![OcrFragment::new(text, 0.9)],
            ..Default::default()
        }
    }
}

impl OcrEngine for FakeOcr {
    fn read(&mut self, image: &Mat) -> Result<Vec<OcrFragment>> {
        use opencv::prelude::MatTraitConst;

        self.calls += 1;
        self.widths.push(image.cols());
        match self.replies.pop_front() {
            Some(reply) => reply,
            None => Ok(self.fallback.clone()),
        }
    }
}

pub fn processor(detector: FakeDetector, ocr: FakeOcr) -> FrameProcessor<FakeDetector, FakeOcr> {
    FrameProcessor::new(
        detector,
        DetectionAggregator::new(ocr, vec!["license_plate".to_string()]),
    )
}

/// Hands out queued frames; an empty queue is end of stream.
#[derive(Default)]
pub struct FakeSource {
    pub frames: VecDeque<Result<Option<Mat>>>,
    pub reads: usize,
    pub releases: usize,
}

impl FakeSource {
    pub fn frames(count: usize) -> Self {
        Self {
            frames: (0..count).map(|_| Ok(Some(frame()))).collect(),
            ..Default::default()
        }
    }
}

impl FrameSource for FakeSource {
    fn read(&mut self) -> Result<Option<Mat>> {
        self.reads += 1;
        self.frames.pop_front().unwrap_or(Ok(None))
    }

    fn release(&mut self) -> Result<()> {
        self.releases += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDisplay {
    pub keys: VecDeque<i32>,
    pub shown: usize,
    pub closes: usize,
}

impl DisplaySink for FakeDisplay {
    fn show(&mut self, _frame: &Mat) -> Result<()> {
        self.shown += 1;
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<i32>> {
        Ok(self.keys.pop_front())
    }

    fn close_all(&mut self) -> Result<()> {
        self.closes += 1;
        Ok(())
    }
}

/// A copy of an image handed to a sink.
#[derive(Clone, Debug)]
pub struct SavedImage {
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub rows: i32,
    pub cols: i32,
}

/// Keeps written images in memory instead of touching the disk.
#[derive(Default)]
pub struct MemorySink {
    pub written: Vec<PathBuf>,
    pub images: Vec<SavedImage>,
    /// Fail every write.
    pub fail: bool,
    /// Fail writes whose path contains this.
    pub fail_on: Option<String>,
}

impl ImageSink for MemorySink {
    fn write(&mut self, path: &Path, image: &Mat) -> Result<()> {
        use opencv::prelude::MatTraitConst;

        let refused = self
            .fail_on
            .as_deref()
            .map_or(false, |part| path.to_string_lossy().contains(part));
        if self.fail || refused {
            return Err(PlateError::Persistence("disk full".to_string()));
        }
        self.written.push(path.to_path_buf());
        self.images.push(SavedImage {
            path: path.to_path_buf(),
            bytes: bytes(image),
            rows: image.rows(),
            cols: image.cols(),
        });
        Ok(())
    }
}
