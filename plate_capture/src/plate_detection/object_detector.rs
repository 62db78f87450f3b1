use log::{debug, info};
use opencv::core::{Point, Rect, Scalar, Size, Vector, CV_32F};
use opencv::dnn;
use opencv::dnn::blob_from_image;
use opencv::dnn::nms_boxes;
use opencv::dnn::Net;
use opencv::dnn::{DNN_BACKEND_CUDA, DNN_BACKEND_OPENCV, DNN_TARGET_CPU, DNN_TARGET_CUDA};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;
use opencv::prelude::NetTrait;
use opencv::prelude::NetTraitConst;

use super::{DetectionBox, ObbDetection, PlateDetector};
use crate::error::{PlateError, Result};

/// cx, cy, w, h before the class scores, angle after them.
const BOX_ATTRS: usize = 4;

/// Oriented plate detector running a YOLOv8-OBB ONNX export.
pub struct ObjectDetector {
    classifier: Net,
    input_size: i32,
    nms_threshold: f32,
}

/// A decoded prediction, before non-maximum suppression.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub confidence: f32,
    pub class_index: usize,
    pub corners: [Point; 4],
}

impl Candidate {
    fn bounds(&self) -> Rect {
        let x1 = self.corners.iter().map(|p| p.x).min().unwrap_or(0);
        let x2 = self.corners.iter().map(|p| p.x).max().unwrap_or(0);
        let y1 = self.corners.iter().map(|p| p.y).min().unwrap_or(0);
        let y2 = self.corners.iter().map(|p| p.y).max().unwrap_or(0);
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }
}

/// Corners of a `w` x `h` box centred on (`cx`, `cy`) and rotated by `angle` radians.
pub fn obb_corners(cx: f32, cy: f32, w: f32, h: f32, angle: f32) -> [(f32, f32); 4] {
    let (sin, cos) = angle.sin_cos();
    let (wx, wy) = (w / 2.0 * cos, w / 2.0 * sin);
    let (hx, hy) = (-h / 2.0 * sin, h / 2.0 * cos);
    [
        (cx + wx + hx, cy + wy + hy),
        (cx + wx - hx, cy + wy - hy),
        (cx - wx - hx, cy - wy - hy),
        (cx - wx + hx, cy - wy + hy),
    ]
}

/// Decodes a `[attrs, candidates]` row-major OBB head.
///
/// Network-space corners are scaled by `x_factor`/`y_factor` into frame
/// pixels and truncated. Candidates below `threshold` are dropped.
pub fn decode_predictions(
    data: &[f32],
    attrs: usize,
    candidates: usize,
    x_factor: f32,
    y_factor: f32,
    threshold: f32,
) -> Result<Vec<Candidate>> {
    if attrs < BOX_ATTRS + 2 {
        return Err(PlateError::Detection(format!(
            "OBB head needs at least {} attributes, got {}",
            BOX_ATTRS + 2,
            attrs
        )));
    }
    if data.len() < attrs * candidates {
        return Err(PlateError::Detection(format!(
            "OBB head has {} values, expected {}",
            data.len(),
            attrs * candidates
        )));
    }

    let classes = attrs - BOX_ATTRS - 1;
    let at = |attr: usize, j: usize| data[attr * candidates + j];

    let mut out = Vec::new();
    for j in 0..candidates {
        let (class_index, confidence) = (0..classes)
            .map(|c| (c, at(BOX_ATTRS + c, j)))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });
        if confidence < threshold {
            continue;
        }

        let angle = at(BOX_ATTRS + classes, j);
        let corners = obb_corners(at(0, j), at(1, j), at(2, j), at(3, j), angle)
            .map(|(x, y)| Point::new((x * x_factor) as i32, (y * y_factor) as i32));

        out.push(Candidate {
            confidence,
            class_index,
            corners,
        });
    }
    Ok(out)
}

impl ObjectDetector {
    pub fn from_onnx(model_path: &str, input_size: i32, nms_threshold: f32, use_gpu: bool) -> Result<Self> {
        let mut classifier = dnn::read_net_from_onnx(model_path)
            .map_err(|e| PlateError::ModelInit(format!("cannot load {}: {}", model_path, e)))?;

        if use_gpu {
            classifier.set_preferable_backend(DNN_BACKEND_CUDA)?;
            classifier.set_preferable_target(DNN_TARGET_CUDA)?;
        } else {
            classifier.set_preferable_backend(DNN_BACKEND_OPENCV)?;
            classifier.set_preferable_target(DNN_TARGET_CPU)?;
        }
        info!("plate detector loaded from {} (gpu: {})", model_path, use_gpu);

        Ok(ObjectDetector {
            classifier,
            input_size,
            nms_threshold,
        })
    }

    fn suppress(&self, candidates: Vec<Candidate>, threshold: f32) -> Result<Vec<ObbDetection>> {
        let boxes = Vector::<Rect>::from_iter(candidates.iter().map(Candidate::bounds));
        let scores = Vector::<f32>::from_iter(candidates.iter().map(|c| c.confidence));

        let mut indices = Vector::<i32>::default();
        nms_boxes(&boxes, &scores, threshold, self.nms_threshold, &mut indices, 1.0, 0)?;

        Ok(indices
            .iter()
            .filter_map(|i| candidates.get(i as usize))
            .map(|c| ObbDetection {
                confidence: c.confidence,
                class_index: c.class_index,
                polygon: DetectionBox::new(c.corners),
            })
            .collect())
    }
}

impl PlateDetector for ObjectDetector {
    fn detect(&mut self, image: &Mat, confidence_threshold: f32) -> Result<Vec<ObbDetection>> {
        let blob = blob_from_image(
            image,
            1.0 / 255.0,
            Size::new(self.input_size, self.input_size),
            Scalar::default(),
            true,
            false,
            CV_32F,
        )?;

        // Set the input of the network
        self.classifier
            .set_input(&blob, "", 1.0, Scalar::default())?;

        let output_names = self.classifier.get_unconnected_out_layers_names()?;
        let mut output_values = Vector::<Mat>::default();
        self.classifier.forward(&mut output_values, &output_names)?;

        let output = output_values.get(0)?;
        let dims = output.mat_size();
        if dims.len() != 3 {
            return Err(PlateError::Detection(format!(
                "unexpected OBB output shape {:?}",
                &*dims
            )));
        }

        let x_factor = image.cols() as f32 / self.input_size as f32;
        let y_factor = image.rows() as f32 / self.input_size as f32;
        let candidates = decode_predictions(
            output.data_typed::<f32>()?,
            dims[1] as usize,
            dims[2] as usize,
            x_factor,
            y_factor,
            confidence_threshold,
        )?;
        debug!("{} candidate(s) above {}", candidates.len(), confidence_threshold);

        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        self.suppress(candidates, confidence_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrotated_corners() {
        let corners = obb_corners(50.0, 20.0, 40.0, 10.0, 0.0);
        assert_eq!(
            corners,
            [(70.0, 25.0), (70.0, 15.0), (30.0, 15.0), (30.0, 25.0)]
        );
    }

    #[test]
    fn quarter_turn_swaps_extent() {
        let corners = obb_corners(0.0, 0.0, 40.0, 10.0, std::f32::consts::FRAC_PI_2);
        let max_x = corners.iter().map(|c| c.0).fold(f32::MIN, f32::max);
        let max_y = corners.iter().map(|c| c.1).fold(f32::MIN, f32::max);
        assert!((max_x - 5.0).abs() < 1e-4);
        assert!((max_y - 20.0).abs() < 1e-4);
    }

    // two candidates, one class: rows are cx, cy, w, h, score, angle
    fn head() -> Vec<f32> {
        vec![
            100.0, 300.0, // cx
            50.0, 200.0, // cy
            40.0, 60.0, // w
            10.0, 20.0, // h
            0.9, 0.1, // score
            0.0, 0.0, // angle
        ]
    }

    #[test]
    fn decodes_candidates_above_threshold() {
        let out = decode_predictions(&head(), 6, 2, 2.0, 0.5, 0.25).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_index, 0);
        assert!((out[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(
            out[0].bounds(),
            Rect::new(160, 22, 80, 5)
        );
    }

    #[test]
    fn picks_best_class() {
        // one candidate, two classes
        let data = vec![10.0, 10.0, 4.0, 2.0, 0.3, 0.7, 0.0];
        let out = decode_predictions(&data, 7, 1, 1.0, 1.0, 0.5).unwrap();
        assert_eq!(out[0].class_index, 1);
    }

    #[test]
    fn rejects_short_head() {
        assert!(decode_predictions(&[0.0; 5], 5, 1, 1.0, 1.0, 0.1).is_err());
        assert!(decode_predictions(&[0.0; 6], 6, 2, 1.0, 1.0, 0.1).is_err());
    }
}
