use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use plate_capture::config::PlateCaptureConfig;
use plate_capture::metrics;
use plate_capture::plate_detection::aggregator::DetectionAggregator;
use plate_capture::plate_detection::display::{HighGuiDisplay, WINDOW_NAME};
use plate_capture::plate_detection::dnn_ocr::TesseractOcr;
use plate_capture::plate_detection::frame_processor::FrameProcessor;
use plate_capture::plate_detection::image_sink::JpegSink;
use plate_capture::plate_detection::object_detector::ObjectDetector;
use plate_capture::plate_detection::session::{
    SessionController, SessionSettings, StopReason,
};
use plate_capture::plate_detection::video_reader::{CaptureTarget, VideoReader};

#[derive(Parser, Debug)]
#[command(name = "plate_capture", about = "Detect, read and save licence plates from a camera")]
struct Args {
    /// Camera index
    #[arg(long)]
    camera: Option<i32>,

    /// Detection confidence threshold
    #[arg(long)]
    threshold: Option<f32>,

    /// TOML config file
    #[arg(long, env = "PLATE_CAPTURE_CONFIG")]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = PlateCaptureConfig::load(args.config.as_deref())?;
    if let Some(camera) = args.camera {
        config.camera_index = camera;
    }
    if let Some(threshold) = args.threshold {
        config.confidence_threshold = threshold;
    }
    config.validate()?;

    let (stop_s, stop_r) = crossbeam::channel::bounded(1);
    ctrlc::set_handler(move || {
        let _ = stop_s.try_send(());
    })
    .context("error setting Ctrl-C handler")?;

    log::info!("loading plate detector...");
    let detector = ObjectDetector::from_onnx(
        &config.detector.model_path,
        config.detector.input_size,
        config.detector.nms_threshold,
        config.detector.use_gpu,
    )?;
    log::info!("loading OCR...");
    let ocr = TesseractOcr::new(&config.ocr.datapath, &config.ocr.language, &config.ocr.whitelist)?;
    let aggregator = DetectionAggregator::new(ocr, config.detector.class_names.clone())
        .with_min_fragment_confidence(config.ocr.min_fragment_confidence);
    let mut processor = FrameProcessor::new(detector, aggregator);

    let settings = SessionSettings::from_config(&config);
    settings.layout.create_dirs()?;

    let target = match &config.video_path {
        Some(path) => CaptureTarget::File(path.clone()),
        None => CaptureTarget::Camera(config.camera_index),
    };
    let mut source = VideoReader::open(&target, config.frame_width, config.frame_height)?;
    let mut display = HighGuiDisplay::open(WINDOW_NAME)?;
    let mut sink = JpegSink;

    log::info!(
        "confidence threshold {}, valid plates are saved under {}/",
        config.confidence_threshold,
        config.output_dir
    );
    log::info!("press 'q' or ESC in the window to quit");

    let mut session = SessionController::new(settings).with_stop_signal(stop_r);
    let summary = session.run(&mut source, &mut processor, &mut display, &mut sink)?;

    match summary.stop_reason {
        StopReason::Interrupted => log::info!("stopped by user"),
        StopReason::CaptureFailed => log::error!("capture device stopped delivering frames"),
        _ => {}
    }
    log::info!(
        "done: {} frame(s), {} plate(s) saved",
        summary.frames,
        summary.plates_saved
    );
    log::debug!("metrics:\n{}", metrics::render());
    Ok(())
}
