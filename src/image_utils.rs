use std::io::Cursor;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{otsu_level, threshold};
use imageproc::filter::gaussian_blur_f32;

use crate::answer_sheet::RegionFraction;
use crate::error::OmrError;
use crate::types::ImageSource;

pub const WHITE: Luma<u8> = Luma([u8::MAX]);
pub const BLACK: Luma<u8> = Luma([u8::MIN]);

pub const WHITE_RGB: Rgb<u8> = Rgb([255, 255, 255]);
pub const GREEN: Rgb<u8> = Rgb([0, 200, 0]);
pub const RED: Rgb<u8> = Rgb([220, 0, 0]);
pub const YELLOW: Rgb<u8> = Rgb([220, 200, 0]);
pub const BLUE: Rgb<u8> = Rgb([0, 0, 220]);
pub const CYAN: Rgb<u8> = Rgb([0, 200, 200]);
pub const PINK: Rgb<u8> = Rgb([230, 0, 180]);
pub const ORANGE: Rgb<u8> = Rgb([230, 140, 0]);

pub const RAINBOW: [Rgb<u8>; 6] = [RED, ORANGE, YELLOW, GREEN, BLUE, PINK];

/// Sigma matching the 5x5 Gaussian kernel the detection constants were
/// tuned against.
pub const GAUSSIAN_SIGMA: f32 = 1.1;

/// Resolves an image source into an owned RGB buffer.
pub fn decode_source(source: &ImageSource) -> Result<RgbImage, OmrError> {
    match source {
        ImageSource::Path(path) => Ok(image::open(path)
            .map_err(|source| OmrError::ImageRead {
                path: path.clone(),
                source,
            })?
            .to_rgb8()),
        ImageSource::Bytes(bytes) => Ok(image::load_from_memory(bytes)?.to_rgb8()),
    }
}

pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, OmrError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(image.clone())
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)?;
    Ok(bytes)
}

/// Grayscale plus Gaussian blur, the preparation shared by boundary and
/// mark detection.
pub fn prepare(image: &RgbImage) -> GrayImage {
    gaussian_blur_f32(&image::imageops::grayscale(image), GAUSSIAN_SIGMA)
}

/// Otsu threshold of the inverted image, so ink becomes foreground.
pub fn binarize_inverted(gray: &GrayImage) -> GrayImage {
    let mut binary = threshold(gray, otsu_level(gray));
    image::imageops::invert(&mut binary);
    binary
}

/// Determines the number of pixels in an image that match the given luma.
pub fn count_pixels(img: &GrayImage, luma: &Luma<u8>) -> u32 {
    img.pixels().filter(|p| *p == luma).count() as u32
}

/// Crops to a fractional page region, returning the crop together with the
/// pixel offset of its top-left corner in the source image.
pub fn crop_fraction(image: &GrayImage, region: &RegionFraction) -> (GrayImage, i32, i32) {
    let width = image.width() as f32;
    let height = image.height() as f32;
    let left = (region.left * width) as u32;
    let right = ((region.right * width) as u32).min(image.width());
    let top = (region.top * height) as u32;
    let bottom = ((region.bottom * height) as u32).min(image.height());
    let crop = image::imageops::crop_imm(
        image,
        left,
        top,
        right.saturating_sub(left).max(1),
        bottom.saturating_sub(top).max(1),
    )
    .to_image();
    (crop, left as i32, top as i32)
}
