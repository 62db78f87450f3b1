//! Live licence plate capture.
//!
//! Frames from a camera go through an oriented plate detector, each plate is
//! cropped and read with OCR, the text is checked against the plate grammar
//! and every valid plate is saved once per session as a full frame plus a
//! crop.

pub mod config;
pub mod error;
pub mod metrics;
pub mod plate_detection;
pub mod utils;

pub use error::{PlateError, Result};
