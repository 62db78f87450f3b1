use log::{debug, warn};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;

use super::bounding_box_render::{detection_label, Annotation};
use super::{plate_text, region, ObbDetection, OcrEngine, OcrFragment, PlateRecord};
use crate::error::Result;
use crate::metrics;

/// Label used when the detector reports a class we have no name for.
pub const FALLBACK_CLASS: &str = "plate";

/// Turns raw detections of one frame into plate records and drawing specs.
pub struct DetectionAggregator<O> {
    ocr: O,
    class_names: Vec<String>,
    min_fragment_confidence: Option<f32>,
}

impl<O: OcrEngine> DetectionAggregator<O> {
    pub fn new(ocr: O, class_names: Vec<String>) -> Self {
        Self {
            ocr,
            class_names,
            min_fragment_confidence: None,
        }
    }

    /// Drops OCR fragments below `min` before they are joined. Off by default.
    pub fn with_min_fragment_confidence(mut self, min: Option<f32>) -> Self {
        self.min_fragment_confidence = min;
        self
    }

    pub fn class_name(&self, index: usize) -> &str {
        self.class_names
            .get(index)
            .map(String::as_str)
            .unwrap_or(FALLBACK_CLASS)
    }

    /// Reads every detection in order.
    ///
    /// Detections outside the frame are skipped. A detection that fails is
    /// logged and skipped; it never takes the rest of the frame down.
    pub fn aggregate(
        &mut self,
        frame: &Mat,
        detections: &[ObbDetection],
    ) -> Vec<(PlateRecord, Annotation)> {
        let mut plates = Vec::with_capacity(detections.len());
        for (idx, detection) in detections.iter().enumerate() {
            match self.read_detection(frame, detection) {
                Ok(Some(plate)) => plates.push(plate),
                Ok(None) => debug!("detection {} does not overlap the frame", idx),
                Err(e) => {
                    metrics::DETECTION_FAILURES.inc();
                    warn!("failed to process detection {}: {}", idx, e);
                }
            }
        }
        plates
    }

    fn read_detection(
        &mut self,
        frame: &Mat,
        detection: &ObbDetection,
    ) -> Result<Option<(PlateRecord, Annotation)>> {
        let class_name = self.class_name(detection.class_index).to_string();

        let Some(region) = region::extract(frame, &detection.polygon)? else {
            return Ok(None);
        };

        let fragments = self.ocr.read(&region.preprocessed)?;
        let raw_text = join_fragments(&fragments, self.min_fragment_confidence);

        let (is_valid, cleaned) = plate_text::validate(&raw_text);
        let text = if is_valid {
            plate_text::format(&cleaned)
        } else {
            raw_text.clone()
        };

        let label = detection_label(&class_name, detection.confidence, &text);
        let annotation = Annotation::new(detection.polygon, region.rect, label)?;

        let record = PlateRecord::new(
            region.rect,
            detection.confidence,
            class_name,
            raw_text,
            text,
            is_valid,
            region.crop,
            frame.try_clone()?,
        );
        Ok(Some((record, annotation)))
    }
}

/// Concatenates fragments in engine order and removes spaces.
pub fn join_fragments(fragments: &[OcrFragment], min_confidence: Option<f32>) -> String {
    fragments
        .iter()
        .filter(|f| min_confidence.map_or(true, |min| f.confidence >= min))
        .flat_map(|f| f.text.chars())
        .filter(|c| *c != ' ')
        .collect()
}
