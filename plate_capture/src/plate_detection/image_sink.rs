use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use opencv::core::Vector;
use opencv::imgcodecs::imwrite;
use opencv::prelude::Mat;

use super::{plate_text, ImageSink};
use crate::error::{PlateError, Result};

const FULL_DIR: &str = "img_full";
const CROP_DIR: &str = "img_crop";

/// Where saved plates go: `<root>/img_full` and `<root>/img_crop`.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn full_path(&self, stem: &str) -> PathBuf {
        self.root.join(FULL_DIR).join(format!("{stem}.jpg"))
    }

    pub fn crop_path(&self, stem: &str) -> PathBuf {
        self.root.join(CROP_DIR).join(format!("{stem}.jpg"))
    }

    pub fn create_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.root.join(FULL_DIR))?;
        fs::create_dir_all(self.root.join(CROP_DIR))?;
        Ok(())
    }
}

/// `<plate without separators>_<YYYYMMDD_HHMMSS>`
pub fn snapshot_stem(plate: &str, at: &NaiveDateTime) -> String {
    format!(
        "{}_{}",
        plate_text::file_stem_text(plate),
        at.format("%Y%m%d_%H%M%S")
    )
}

/// Writes images with `imwrite`; the format follows the file extension.
#[derive(Default)]
pub struct JpegSink;

impl ImageSink for JpegSink {
    fn write(&mut self, path: &Path, image: &Mat) -> Result<()> {
        let target = path
            .to_str()
            .ok_or_else(|| PlateError::Persistence(format!("non UTF-8 path {}", path.display())))?;
        if imwrite(target, image, &Vector::<i32>::new())? {
            Ok(())
        } else {
            Err(PlateError::Persistence(format!("imwrite refused {}", target)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(12, 5, 7)
            .unwrap()
    }

    #[test]
    fn stem_has_plate_and_timestamp() {
        assert_eq!(snapshot_stem("30A-12345", &noon()), "30A12345_20240309_120507");
    }

    #[test]
    fn layout_paths() {
        let layout = OutputLayout::new("img");
        assert_eq!(
            layout.full_path("30A12345_20240309_120507"),
            PathBuf::from("img/img_full/30A12345_20240309_120507.jpg")
        );
        assert_eq!(
            layout.crop_path("30A12345_20240309_120507"),
            PathBuf::from("img/img_crop/30A12345_20240309_120507.jpg")
        );
    }

    #[test]
    fn writes_jpeg() {
        use opencv::core::{Scalar, CV_8UC3};

        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        layout.create_dirs().unwrap();

        let image = Mat::new_rows_cols_with_default(20, 40, CV_8UC3, Scalar::all(50.0)).unwrap();
        let path = layout.crop_path("TEST");
        JpegSink.write(&path, &image).unwrap();
        assert!(path.exists());
    }
}
