use std::io::Cursor;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

const WIDTH: u32 = 240;
const HEIGHT: u32 = 60;
const BAR_TOP: u32 = 5;
const BAR_BOTTOM: u32 = 55;
const BAR_OFFSET_X: f32 = 10.0;
const BAR_WIDTH: f32 = 2.5;

/// Fixed bar centers. Decorative only; they do not encode any digits.
const BAR_CENTERS: &[f32] = &[
    5.0, 10.0, 17.5, 22.5, 30.0, 40.0, 45.0, 55.0, 62.5, 70.0, 80.0, 87.5, 92.5, 100.0, 110.0,
    117.5, 125.0, 130.0, 140.0, 145.0, 155.0, 162.5, 167.5, 175.0, 185.0, 190.0, 200.0, 205.0,
    215.0, 220.0,
];

/// Vector fallback carrying the same bar layout.
const FALLBACK_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" width="240" height="60" viewBox="0 0 240 60"><rect width="240" height="60" fill="white"/><g transform="translate(10, 5)" stroke="black" stroke-width="2.5"><path d="M5 0V50 M10 0V50 M17.5 0V50 M22.5 0V50 M30 0V50 M40 0V50 M45 0V50 M55 0V50 M62.5 0V50 M70 0V50 M80 0V50 M87.5 0V50 M92.5 0V50 M100 0V50 M110 0V50 M117.5 0V50 M125 0V50 M130 0V50 M140 0V50 M145 0V50 M155 0V50 M162.5 0V50 M167.5 0V50 M175 0V50 M185 0V50 M190 0V50 M200 0V50 M205 0V50 M215 0V50 M220 0V50"/></g></svg>"#;

pub fn barcode_placeholder_image() -> RgbImage {
    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));
    for center in BAR_CENTERS {
        let left = (BAR_OFFSET_X + center - BAR_WIDTH / 2.0).round() as u32;
        let right = (BAR_OFFSET_X + center + BAR_WIDTH / 2.0).round() as u32;
        for x in left..right.min(WIDTH) {
            for y in BAR_TOP..BAR_BOTTOM {
                image.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
    }
    image
}

pub fn barcode_placeholder_png() -> image::ImageResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(barcode_placeholder_image()).write_to(&mut cursor, ImageFormat::Png)?;
    Ok(cursor.into_inner())
}

/// Image reference attached to barcode-only results.
pub fn barcode_placeholder_url() -> String {
    match barcode_placeholder_png() {
        Ok(bytes) => format!("data:image/png;base64,{}", BASE64.encode(bytes)),
        Err(err) => {
            tracing::warn!(error = %err, "placeholder PNG encoding failed; using SVG");
            format!("data:image/svg+xml;base64,{}", BASE64.encode(FALLBACK_SVG))
        }
    }
}
