use log::{debug, warn};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;

use super::aggregator::DetectionAggregator;
use super::bounding_box_render::draw_annotation;
use super::{OcrEngine, PlateDetector, PlateRecord};
use crate::error::Result;
use crate::metrics;

/// Detector plus aggregator: one frame in, annotated frame and plates out.
pub struct FrameProcessor<D, O> {
    detector: D,
    aggregator: DetectionAggregator<O>,
}

impl<D: PlateDetector, O: OcrEngine> FrameProcessor<D, O> {
    pub fn new(detector: D, aggregator: DetectionAggregator<O>) -> Self {
        Self {
            detector,
            aggregator,
        }
    }

    /// Runs the detector once at `confidence_threshold` and reads every plate.
    ///
    /// `frame` is left untouched; drawing happens on a copy. A frame with no
    /// detections comes back as an unmodified copy with no records.
    pub fn process(
        &mut self,
        frame: &Mat,
        confidence_threshold: f32,
    ) -> Result<(Mat, Vec<PlateRecord>)> {
        metrics::FRAMES_PROCESSED.inc();
        let mut annotated = frame.try_clone()?;

        let detections = self.detector.detect(frame, confidence_threshold)?;
        if detections.is_empty() {
            return Ok((annotated, Vec::new()));
        }
        debug!(
            "{} detection(s) in {}x{} frame",
            detections.len(),
            frame.cols(),
            frame.rows()
        );

        let plates = self.aggregator.aggregate(frame, &detections);
        let mut records = Vec::with_capacity(plates.len());
        for (record, annotation) in plates {
            if let Err(e) = draw_annotation(&mut annotated, &annotation) {
                warn!("cannot draw plate {:?}: {}", annotation.label, e);
            }
            records.push(record);
        }

        metrics::PLATES_DETECTED.inc_by(records.len() as u64);
        Ok((annotated, records))
    }
}
