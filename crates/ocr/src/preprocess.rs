use image::{imageops, DynamicImage, GrayImage, ImageBuffer, Luma};
use std::io::Cursor;
use thiserror::Error;

/// Contrast is stretched about the image mean by this factor.
const CONTRAST_FACTOR: f32 = 1.5;
const BRIGHTNESS_FACTOR: f32 = 1.1;
/// Tesseract struggles below roughly 600px; smaller inputs are upscaled.
const MIN_OCR_DIMENSION: u32 = 600;

/// PIL's SHARPEN kernel (scale 16), pre-divided for `filter3x3`.
const SHARPEN_KERNEL: [f32; 9] = [
    -0.125, -0.125, -0.125, //
    -0.125, 2.0, -0.125, //
    -0.125, -0.125, -0.125,
];

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Decode raw upload bytes (JPEG / PNG / WEBP / …) into an image.
pub fn decode(data: &[u8]) -> Result<DynamicImage, PreprocessError> {
    Ok(image::load_from_memory(data)?)
}

/// Process raw image bytes and return normalized PNG bytes ready for OCR.
pub fn prepare_for_ocr(data: &[u8]) -> Result<Vec<u8>, PreprocessError> {
    encode_as_png(&enhance(decode(data)?))
}

/// Apply the full normalization chain: grayscale, contrast, brightness,
/// sharpen, and a minimum-size upscale. Deterministic; the steps always
/// run in this order.
pub fn enhance(img: DynamicImage) -> GrayImage {
    let gray = img.to_luma8();
    let gray = scale_contrast(&gray, CONTRAST_FACTOR);
    let gray = scale_brightness(&gray, BRIGHTNESS_FACTOR);
    let gray = imageops::filter3x3(&gray, &SHARPEN_KERNEL);
    upscale_small(gray)
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Interpolate each pixel away from the image mean: `mean + factor·(px − mean)`.
fn scale_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let n = (gray.width() as u64 * gray.height() as u64) as f64;
    let mean = (gray.pixels().map(|p| p[0] as u64).sum::<u64>() as f64 / n) as f32;

    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0] as f32;
        Luma([clamp_u8(mean + factor * (p - mean))])
    })
}

fn scale_brightness(gray: &GrayImage, factor: f32) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0] as f32;
        Luma([clamp_u8(p * factor)])
    })
}

/// Uniformly upscale so both dimensions reach `MIN_OCR_DIMENSION`,
/// using the larger of the two required ratios.
fn upscale_small(gray: GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width >= MIN_OCR_DIMENSION && height >= MIN_OCR_DIMENSION {
        return gray;
    }

    let scale = f64::max(
        MIN_OCR_DIMENSION as f64 / width as f64,
        MIN_OCR_DIMENSION as f64 / height as f64,
    );
    // Round up: truncation can leave the driving dimension at 599.
    let new_width = (width as f64 * scale).ceil() as u32;
    let new_height = (height as f64 * scale).ceil() as u32;
    imageops::resize(&gray, new_width, new_height, imageops::FilterType::Lanczos3)
}

fn encode_as_png(gray: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(gray.clone())
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
