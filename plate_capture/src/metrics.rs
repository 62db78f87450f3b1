//! Process-wide counters.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

lazy_static! {
    pub static ref FRAMES_PROCESSED: IntCounter = register_int_counter!(
        "frames_processed_total",
        "Frames run through the plate pipeline"
    )
    .expect("frames_processed_total registers once");
    pub static ref PLATES_DETECTED: IntCounter = register_int_counter!(
        "plates_detected_total",
        "Plate records produced, valid or not"
    )
    .expect("plates_detected_total registers once");
    pub static ref PLATES_SAVED: IntCounter = register_int_counter!(
        "plates_saved_total",
        "New valid plates written to disk"
    )
    .expect("plates_saved_total registers once");
    pub static ref DETECTION_FAILURES: IntCounter = register_int_counter!(
        "detection_failures_total",
        "Detections dropped because extraction or OCR failed"
    )
    .expect("detection_failures_total registers once");
}

/// Text exposition of the default registry.
pub fn render() -> String {
    let mut buffer = Vec::new();
    if let Err(e) = TextEncoder::new().encode(&prometheus::gather(), &mut buffer) {
        log::warn!("cannot encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_metrics_list_counters() {
        FRAMES_PROCESSED.inc();
        let text = render();
        assert!(text.contains("frames_processed_total"));
    }
}
