use std::ffi::CString;

use leptess::tesseract;
use leptess::tesseract::TessApi;
use log::debug;
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::MatTraitConstManual;

use super::{OcrEngine, OcrFragment};
use crate::error::{PlateError, Result};

/// Treat the image as a single line of text.
const PSM_SINGLE_LINE: &str = "7";

/// Tesseract reader for preprocessed plate crops.
pub struct TesseractOcr {
    ocr: TessApi,
}

fn set_variable(api: &mut TessApi, name: &str, value: &str) -> Result<()> {
    let name_c = CString::new(name).map_err(|e| PlateError::ModelInit(e.to_string()))?;
    let value_c = CString::new(value).map_err(|e| PlateError::ModelInit(e.to_string()))?;
    api.raw
        .set_variable(&name_c, &value_c)
        .map_err(|e| PlateError::ModelInit(format!("cannot set {}: {:?}", name, e)))
}

impl TesseractOcr {
    /// Loads `language` traineddata from `datapath`.
    pub fn new(datapath: &str, language: &str, whitelist: &str) -> Result<Self> {
        let mut api = tesseract::TessApi::new(Some(datapath), language).map_err(|e| {
            PlateError::ModelInit(format!(
                "tesseract {}/{}: {:?}",
                datapath, language, e
            ))
        })?;

        if !whitelist.is_empty() {
            set_variable(&mut api, "tessedit_char_whitelist", whitelist)?;
        }
        set_variable(&mut api, "tessedit_pageseg_mode", PSM_SINGLE_LINE)?;

        Ok(Self { ocr: api })
    }
}

/// One fragment per non-empty line of Tesseract output.
pub fn split_lines(text: &str, confidence: f32) -> Vec<OcrFragment> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| OcrFragment::new(line, confidence))
        .collect()
}

impl OcrEngine for TesseractOcr {
    fn read(&mut self, image: &Mat) -> Result<Vec<OcrFragment>> {
        // tesseract wants one contiguous buffer
        let contiguous;
        let image = if image.is_continuous() {
            image
        } else {
            contiguous = image.try_clone()?;
            &contiguous
        };

        let cols = image.cols();
        let rows = image.rows();
        let channels = image.channels();
        self.ocr
            .raw
            .set_image(image.data_bytes()?, cols, rows, channels, cols * channels)
            .map_err(|e| PlateError::Ocr(format!("cannot set image: {:?}", e)))?;

        let text = self
            .ocr
            .get_utf8_text()
            .map_err(|e| PlateError::Ocr(format!("{:?}", e)))?;
        let confidence = (self.ocr.mean_text_conf() as f32 / 100.0).clamp(0.0, 1.0);
        debug!("OCR {:?} ({:.2})", text.trim(), confidence);

        Ok(split_lines(&text, confidence))
    }
}
