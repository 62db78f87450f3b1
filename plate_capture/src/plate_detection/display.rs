use opencv::highgui::{destroy_all_windows, imshow, named_window, wait_key, WINDOW_NORMAL};
use opencv::prelude::Mat;

use super::DisplaySink;
use crate::error::Result;

pub const WINDOW_NAME: &str = "License Plate Detection";

pub const KEY_QUIT: i32 = b'q' as i32;
pub const KEY_ESC: i32 = 27;

pub fn is_stop_key(key: i32) -> bool {
    key == KEY_QUIT || key == KEY_ESC
}

/// OpenCV window that shows annotated frames.
pub struct HighGuiDisplay {
    window: String,
    wait_ms: i32,
}

impl HighGuiDisplay {
    pub fn open(window: &str) -> Result<Self> {
        named_window(window, WINDOW_NORMAL)?;
        Ok(Self {
            window: window.to_string(),
            wait_ms: 1,
        })
    }
}

impl DisplaySink for HighGuiDisplay {
    fn show(&mut self, frame: &Mat) -> Result<()> {
        imshow(&self.window, frame)?;
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<i32>> {
        let key = wait_key(self.wait_ms)?;
        if key < 0 {
            Ok(None)
        } else {
            Ok(Some(key & 0xFF))
        }
    }

    fn close_all(&mut self) -> Result<()> {
        destroy_all_windows()?;
        Ok(())
    }
}
