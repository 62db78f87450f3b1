use std::path::{Path, PathBuf};

use log::{info, warn};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;
use opencv::prelude::VideoCaptureTrait;
use opencv::prelude::VideoCaptureTraitConst;
use opencv::videoio::VideoCapture;
use opencv::videoio::{CAP_ANY, CAP_PROP_FRAME_HEIGHT, CAP_PROP_FRAME_WIDTH};

use super::FrameSource;
use crate::error::{PlateError, Result};

/// Where frames come from.
#[derive(Clone, Debug, PartialEq)]
pub enum CaptureTarget {
    Camera(i32),
    /// Recorded video, played once.
    File(PathBuf),
}

pub struct VideoReader {
    capture: VideoCapture,
    released: bool,
}

fn open_camera(index: i32) -> Result<VideoCapture> {
    let capture = VideoCapture::new(index, CAP_ANY)?;
    if capture.is_opened()? {
        return Ok(capture);
    }

    warn!("camera {} did not open, retrying once", index);
    let capture = VideoCapture::new(index, CAP_ANY)?;
    if capture.is_opened()? {
        Ok(capture)
    } else {
        Err(PlateError::Capture(format!("cannot open camera {}", index)))
    }
}

fn open_file(path: &Path) -> Result<VideoCapture> {
    let name = path
        .to_str()
        .ok_or_else(|| PlateError::Capture(format!("non UTF-8 path {}", path.display())))?;
    let capture = VideoCapture::from_file(name, CAP_ANY)?;
    if capture.is_opened()? {
        Ok(capture)
    } else {
        Err(PlateError::Capture(format!("cannot open video {}", name)))
    }
}

impl VideoReader {
    /// Opens `target`, asking cameras for a `width` x `height` stream.
    pub fn open(target: &CaptureTarget, width: i32, height: i32) -> Result<Self> {
        let capture = match target {
            CaptureTarget::Camera(index) => {
                let mut capture = open_camera(*index)?;
                // drivers may ignore the request, frames are used at whatever size arrives
                capture.set(CAP_PROP_FRAME_WIDTH, width as f64)?;
                capture.set(CAP_PROP_FRAME_HEIGHT, height as f64)?;
                capture
            }
            CaptureTarget::File(path) => open_file(path)?,
        };
        info!("capture opened: {:?}", target);

        Ok(Self {
            capture,
            released: false,
        })
    }
}

impl FrameSource for VideoReader {
    fn read(&mut self) -> Result<Option<Mat>> {
        let mut image = Mat::default();
        let grabbed = self.capture.read(&mut image)?;

        if !grabbed || image.empty() {
            return Ok(None);
        }
        Ok(Some(image))
    }

    fn release(&mut self) -> Result<()> {
        if !self.released {
            self.capture.release()?;
            self.released = true;
        }
        Ok(())
    }
}
