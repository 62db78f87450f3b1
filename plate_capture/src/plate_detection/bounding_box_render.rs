use opencv::core::{Point, Rect, Scalar, Vector};
use opencv::imgproc::{
    get_text_size, polylines, put_text, rectangle, FONT_HERSHEY_SIMPLEX, LINE_8,
};
use opencv::prelude::Mat;
use opencv::prelude::MatTraitConst;

use super::{DetectionBox, PlateRecord};
use crate::error::Result;

const LABEL_SCALE: f64 = 0.6;
const HEADER_SCALE: f64 = 0.8;
const THICKNESS: i32 = 2;

pub fn green() -> Scalar {
    Scalar::from((0.0, 255.0, 0.0))
}

pub fn orange() -> Scalar {
    Scalar::from((0.0, 165.0, 255.0))
}

pub fn red() -> Scalar {
    Scalar::from((0.0, 0.0, 255.0))
}

fn white() -> Scalar {
    Scalar::from((255.0, 255.0, 255.0))
}

fn black() -> Scalar {
    Scalar::from((0.0, 0.0, 0.0))
}

/// What to draw for one detected plate.
#[derive(Clone, Debug)]
pub struct Annotation {
    pub polygon: DetectionBox,
    pub label: String,
    /// Filled box behind the label, sitting on top of the plate bounds.
    pub background: Rect,
    pub text_origin: Point,
}

impl Annotation {
    /// Lays out `label` above the top-left corner of `anchor`.
    pub fn new(polygon: DetectionBox, anchor: Rect, label: String) -> Result<Self> {
        let mut baseline = 0;
        let size = get_text_size(&label, FONT_HERSHEY_SIMPLEX, LABEL_SCALE, THICKNESS, &mut baseline)?;
        let background = Rect::new(
            anchor.x,
            anchor.y - size.height - 10,
            size.width + 10,
            size.height + 10,
        );
        let text_origin = Point::new(anchor.x + 5, anchor.y - 5);

        Ok(Self {
            polygon,
            label,
            background,
            text_origin,
        })
    }
}

/// `"<class>: <conf>%"`, followed by `" | <text>"` when there is text.
pub fn detection_label(class_name: &str, confidence: f32, text: &str) -> String {
    let mut label = format!("{}: {:.1}%", class_name, confidence * 100.0);
    if !text.is_empty() {
        label.push_str(" | ");
        label.push_str(text);
    }
    label
}

pub fn draw_annotation(image: &mut Mat, annotation: &Annotation) -> Result<()> {
    let outline = Vector::<Point>::from_iter(annotation.polygon.points);
    let outlines = Vector::<Vector<Point>>::from_iter([outline]);
    polylines(image, &outlines, true, green(), THICKNESS, LINE_8, 0)?;

    rectangle(image, annotation.background, green(), -1, LINE_8, 0)?;
    put_text(
        image,
        &annotation.label,
        annotation.text_origin,
        FONT_HERSHEY_SIMPLEX,
        LABEL_SCALE,
        black(),
        THICKNESS,
        LINE_8,
        false,
    )?;
    Ok(())
}

/// Status lines listed in the top-left corner, with their colours.
pub fn summary_lines(records: &[PlateRecord]) -> Vec<(String, Scalar)> {
    if records.is_empty() {
        return vec![("No plate detected".to_string(), red())];
    }

    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push((format!("Detected: {} plate(s)", records.len()), green()));
    for (i, plate) in records.iter().enumerate() {
        let (status, color) = if plate.is_valid() {
            ("VALID", green())
        } else {
            ("UNCLEAR", orange())
        };
        lines.push((
            format!(
                "  {}. Plate: {} ({:.1}%) - {}",
                i + 1,
                plate.text(),
                plate.confidence() * 100.0,
                status
            ),
            color,
        ));
    }
    lines
}

pub fn draw_summary(image: &mut Mat, records: &[PlateRecord], output_dir: &str) -> Result<()> {
    let mut y = 30;
    for (i, (line, color)) in summary_lines(records).into_iter().enumerate() {
        let scale = if i == 0 { HEADER_SCALE } else { LABEL_SCALE };
        put_text(
            image,
            &line,
            Point::new(10, y),
            FONT_HERSHEY_SIMPLEX,
            scale,
            color,
            THICKNESS,
            LINE_8,
            false,
        )?;
        y += if i == 0 { 35 } else { 28 };
    }

    let help = format!("Press 'q' to quit | valid plates are saved to {}/", output_dir);
    let bottom = image.rows() - 15;
    put_text(
        image,
        &help,
        Point::new(10, bottom),
        FONT_HERSHEY_SIMPLEX,
        LABEL_SCALE,
        white(),
        THICKNESS,
        LINE_8,
        false,
    )?;
    Ok(())
}
