use opencv::core::{Rect, Size};
use opencv::imgproc::{cvt_color, equalize_hist, resize, COLOR_BGR2GRAY, COLOR_BGRA2GRAY, INTER_CUBIC};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;

use super::DetectionBox;
use crate::error::{PlateError, Result};

/// Crops narrower than this are upscaled before OCR.
pub const MIN_OCR_WIDTH: i32 = 200;

/// A plate cut out of a frame.
pub struct PlateRegion {
    pub rect: Rect,
    /// Colour crop, owned, independent of the frame.
    pub crop: Mat,
    /// Equalized greyscale crop ready for OCR.
    pub preprocessed: Mat,
}

/// Cuts the region covered by `polygon` out of `frame`.
///
/// Returns `Ok(None)` when the polygon does not overlap the frame.
pub fn extract(frame: &Mat, polygon: &DetectionBox) -> Result<Option<PlateRegion>> {
    let Some(rect) = polygon.clamped_rect(frame.cols(), frame.rows()) else {
        return Ok(None);
    };

    // roi shares pixels with the frame, copy it out
    let crop = frame
        .apply_1(rect)
        .and_then(|roi| roi.try_clone())
        .map_err(|e| PlateError::Extraction(format!("cannot crop {:?}: {}", rect, e)))?;
    let preprocessed = preprocess(&crop)?;

    Ok(Some(PlateRegion {
        rect,
        crop,
        preprocessed,
    }))
}

/// Greyscale, histogram equalization and upscaling to `MIN_OCR_WIDTH`.
pub fn preprocess(crop: &Mat) -> Result<Mat> {
    if crop.empty() {
        return Err(PlateError::Extraction("empty crop".to_string()));
    }

    let mut grey = Mat::default();
    match crop.channels() {
        1 => grey = crop.try_clone()?,
        4 => cvt_color(crop, &mut grey, COLOR_BGRA2GRAY, 0)?,
        _ => cvt_color(crop, &mut grey, COLOR_BGR2GRAY, 0)?,
    }

    let mut equalized = Mat::default();
    equalize_hist(&grey, &mut equalized)?;

    if equalized.cols() >= MIN_OCR_WIDTH {
        return Ok(equalized);
    }

    let scale = MIN_OCR_WIDTH as f64 / equalized.cols() as f64;
    let height = ((equalized.rows() as f64 * scale).round() as i32).max(1);
    let mut upscaled = Mat::default();
    resize(
        &equalized,
        &mut upscaled,
        Size::new(MIN_OCR_WIDTH, height),
        0.0,
        0.0,
        INTER_CUBIC,
    )?;
    Ok(upscaled)
}
