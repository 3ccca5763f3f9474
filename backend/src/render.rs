use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};
use log::debug;
use shared::BoundingBox;
use thiserror::Error;

use crate::detection::filter_by_confidence;

const FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to decode image: {0}")]
    ImageDecode(#[source] image::ImageError),
    #[error("Failed to encode image: {0}")]
    ImageEncode(#[source] image::ImageError),
}

/// Paints an opaque box over every detection at or above `confidence_threshold`
/// and returns the result as PNG.
pub fn redact(
    image: &[u8],
    detections: &[BoundingBox],
    confidence_threshold: f32,
) -> Result<Vec<u8>, RenderError> {
    let mut canvas = image::load_from_memory(image)
        .map_err(RenderError::ImageDecode)?
        .to_rgba8();

    let mut painted = 0;
    for detection in filter_by_confidence(detections, confidence_threshold) {
        if fill_box(&mut canvas, &detection) {
            painted += 1;
        }
    }
    debug!(
        "Painted {} of {} detection(s) on {}x{} image",
        painted,
        detections.len(),
        canvas.width(),
        canvas.height()
    );

    let mut out = Cursor::new(Vec::new());
    canvas
        .write_to(&mut out, ImageFormat::Png)
        .map_err(RenderError::ImageEncode)?;
    Ok(out.into_inner())
}

/// Clamps the box to the canvas; returns false when nothing is left to paint.
fn fill_box(canvas: &mut RgbaImage, bbox: &BoundingBox) -> bool {
    let (width, height) = canvas.dimensions();
    let clamp = |v: i32, max: u32| v.clamp(0, max as i32) as u32;
    let (x1, x2) = (clamp(bbox.x1, width), clamp(bbox.x2, width));
    let (y1, y2) = (clamp(bbox.y1, height), clamp(bbox.y2, height));
    if x2 <= x1 || y2 <= y1 {
        return false;
    }
    for y in y1..y2 {
        for x in x1..x2 {
            canvas.put_pixel(x, y, FILL);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn white_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Jpeg).unwrap();
        out.into_inner()
    }

    fn bbox(x1: i32, y1: i32, x2: i32, y2: i32, confidence: f32) -> BoundingBox {
        BoundingBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_name: None,
        }
    }

    fn decode(png: &[u8]) -> RgbaImage {
        assert_eq!(image::guess_format(png).unwrap(), ImageFormat::Png);
        image::load_from_memory(png).unwrap().to_rgba8()
    }

    #[test]
    fn fills_only_boxes_above_threshold() {
        let input = white_jpeg(40, 40);
        let out = redact(
            &input,
            &[bbox(0, 0, 10, 10, 0.9), bbox(20, 20, 30, 30, 0.3)],
            0.5,
        )
        .unwrap();
        let img = decode(&out);

        assert_eq!(img.dimensions(), (40, 40));
        assert_eq!(*img.get_pixel(0, 0), FILL);
        assert_eq!(*img.get_pixel(9, 9), FILL);
        // Exclusive bottom-right edge.
        assert_ne!(*img.get_pixel(10, 10), FILL);
        // Below-threshold box untouched.
        assert_ne!(*img.get_pixel(25, 25), FILL);
    }

    #[test]
    fn out_of_bounds_boxes_are_clamped() {
        let out = redact(&white_jpeg(20, 20), &[bbox(-5, -5, 100, 3, 1.0)], 0.5).unwrap();
        let img = decode(&out);
        assert_eq!(*img.get_pixel(0, 0), FILL);
        assert_eq!(*img.get_pixel(19, 2), FILL);
        assert_ne!(*img.get_pixel(19, 3), FILL);
    }

    #[test]
    fn inverted_boxes_are_skipped() {
        let mut canvas = RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 255]));
        assert!(!fill_box(&mut canvas, &bbox(8, 8, 2, 2, 1.0)));
        assert!(!fill_box(&mut canvas, &bbox(3, 3, 3, 9, 1.0)));
        assert!(canvas.pixels().all(|p| *p != FILL));
    }

    #[test]
    fn undecodable_input_fails() {
        let err = redact(b"definitely not an image", &[], 0.5).unwrap_err();
        assert!(matches!(err, RenderError::ImageDecode(_)));
    }
}
