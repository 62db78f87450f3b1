use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PlateError, Result};

const DEFAULT_CAMERA_INDEX: i32 = 0;
const DEFAULT_FRAME_WIDTH: i32 = 1280;
const DEFAULT_FRAME_HEIGHT: i32 = 720;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_MODEL_PATH: &str = "models/plate_detector_best.onnx";
const DEFAULT_INPUT_SIZE: i32 = 640;
const DEFAULT_NMS_THRESHOLD: f32 = 0.45;
const DEFAULT_CLASS_NAME: &str = "license_plate";
const DEFAULT_TESSDATA: &str = "models";
const DEFAULT_LANGUAGE: &str = "eng";
const DEFAULT_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-";
const DEFAULT_OUTPUT_DIR: &str = "img";
const DEFAULT_LOG_EVERY_FRAMES: u64 = 30;

pub const CONFIG_ENV: &str = "PLATE_CAPTURE_CONFIG";

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    camera_index: Option<i32>,
    video_path: Option<PathBuf>,
    frame_width: Option<i32>,
    frame_height: Option<i32>,
    confidence_threshold: Option<f32>,
    output_dir: Option<String>,
    log_every_frames: Option<u64>,
    max_fps: Option<u32>,
    detector: Option<DetectorConfigFile>,
    ocr: Option<OcrConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<String>,
    input_size: Option<i32>,
    nms_threshold: Option<f32>,
    use_gpu: Option<bool>,
    class_names: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct OcrConfigFile {
    datapath: Option<String>,
    language: Option<String>,
    whitelist: Option<String>,
    min_fragment_confidence: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct PlateCaptureConfig {
    pub camera_index: i32,
    /// Play a recorded video instead of opening the camera.
    pub video_path: Option<PathBuf>,
    pub frame_width: i32,
    pub frame_height: i32,
    pub confidence_threshold: f32,
    pub output_dir: String,
    pub log_every_frames: u64,
    pub max_fps: Option<u32>,
    pub detector: DetectorSettings,
    pub ocr: OcrSettings,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub model_path: String,
    pub input_size: i32,
    pub nms_threshold: f32,
    pub use_gpu: bool,
    pub class_names: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct OcrSettings {
    pub datapath: String,
    pub language: String,
    pub whitelist: String,
    pub min_fragment_confidence: Option<f32>,
}

impl Default for PlateCaptureConfig {
    fn default() -> Self {
        Self::from_file(ConfigFile::default())
    }
}

impl PlateCaptureConfig {
    /// Reads `path` (or `$PLATE_CAPTURE_CONFIG`) if given, then applies env overrides.
    ///
    /// Values are not range-checked here so command-line flags can still
    /// override them; call [`validate`](Self::validate) once they are applied.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => read_config_file(&path)?,
            None => ConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Self {
        let detector = file.detector.unwrap_or_default();
        let ocr = file.ocr.unwrap_or_default();

        Self {
            camera_index: file.camera_index.unwrap_or(DEFAULT_CAMERA_INDEX),
            video_path: file.video_path,
            frame_width: file.frame_width.unwrap_or(DEFAULT_FRAME_WIDTH),
            frame_height: file.frame_height.unwrap_or(DEFAULT_FRAME_HEIGHT),
            confidence_threshold: file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            output_dir: file
                .output_dir
                .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            log_every_frames: file.log_every_frames.unwrap_or(DEFAULT_LOG_EVERY_FRAMES),
            max_fps: file.max_fps,
            detector: DetectorSettings {
                model_path: detector
                    .model_path
                    .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
                input_size: detector.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                nms_threshold: detector.nms_threshold.unwrap_or(DEFAULT_NMS_THRESHOLD),
                use_gpu: detector.use_gpu.unwrap_or(false),
                class_names: detector
                    .class_names
                    .unwrap_or_else(|| vec![DEFAULT_CLASS_NAME.to_string()]),
            },
            ocr: OcrSettings {
                datapath: ocr.datapath.unwrap_or_else(|| DEFAULT_TESSDATA.to_string()),
                language: ocr.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                whitelist: ocr.whitelist.unwrap_or_else(|| DEFAULT_WHITELIST.to_string()),
                min_fragment_confidence: ocr.min_fragment_confidence,
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(camera) = std::env::var("PLATE_CAPTURE_CAMERA") {
            self.camera_index = camera.trim().parse().map_err(|_| {
                PlateError::Config("PLATE_CAPTURE_CAMERA must be an integer".to_string())
            })?;
        }
        if let Ok(threshold) = std::env::var("PLATE_CAPTURE_THRESHOLD") {
            self.confidence_threshold = threshold.trim().parse().map_err(|_| {
                PlateError::Config("PLATE_CAPTURE_THRESHOLD must be a number".to_string())
            })?;
        }
        if let Ok(model) = std::env::var("PLATE_CAPTURE_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model_path = model;
            }
        }
        if let Ok(dir) = std::env::var("PLATE_CAPTURE_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = dir;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(PlateError::Config(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if self.detector.input_size <= 0 {
            return Err(PlateError::Config("detector.input_size must be positive".to_string()));
        }
        if self.detector.class_names.is_empty() {
            return Err(PlateError::Config("detector.class_names must not be empty".to_string()));
        }
        if self.max_fps == Some(0) {
            return Err(PlateError::Config("max_fps must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        PlateError::Config(format!("failed to read config file {}: {}", path.display(), e))
    })?;
    toml::from_str(&raw)
        .map_err(|e| PlateError::Config(format!("invalid config file {}: {}", path.display(), e)))
}
