//! Preprocessor - raw image bytes to model input tensor
//!
//! Reproduces the transform chain the classifier was trained with:
//! grayscale (ITU-R 601-2 luma) -> resize 28x28 (bilinear) -> [0, 1] -> normalize.
//! Any deviation here does not crash anything, it silently degrades accuracy.

use std::io::Cursor;

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageError, ImageReader, Limits, Luma};
use ndarray::Array4;
use thiserror::Error;

use super::model::layout::{INPUT_HEIGHT, INPUT_SHAPE, INPUT_WIDTH, MNIST_MEAN, MNIST_STD};

/// Resampling filter used for the 28x28 resize (matches PIL bilinear)
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Largest accepted source width/height; everything ends up 28x28
pub const MAX_IMAGE_DIMENSION: u32 = 4096;

#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Bytes are not a supported/parsable image
    #[error("{0}")]
    Decode(#[from] image::ImageError),

    #[error("image has zero size ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

// ============================================================================
// TENSOR
// ============================================================================

/// Model input: shape (1, 1, 28, 28), MNIST-normalized f32 values
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor(Array4<f32>);

impl NormalizedTensor {
    /// Wrap already-normalized values laid out row-major (H x W)
    pub fn from_normalized(values: Vec<f32>) -> Result<Self, ndarray::ShapeError> {
        Array4::from_shape_vec(INPUT_SHAPE, values).map(Self)
    }

    /// All-zero input, used to probe a freshly loaded model
    pub fn zeros() -> Self {
        Self(Array4::zeros(INPUT_SHAPE))
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.0
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }
}

// ============================================================================
// PIPELINE
// ============================================================================

/// Turn arbitrary encoded image bytes into a normalized model input.
pub fn preprocess(bytes: &[u8]) -> Result<NormalizedTensor, PreprocessError> {
    let image = decode_image(bytes)?;

    let (width, height) = (image.width(), image.height());
    if width == 0 || height == 0 {
        return Err(PreprocessError::EmptyImage { width, height });
    }

    let gray = to_grayscale(&image);
    let resized = imageops::resize(&gray, INPUT_WIDTH as u32, INPUT_HEIGHT as u32, RESIZE_FILTER);

    let values: Vec<f32> = resized.pixels().map(|p| normalize_pixel(p.0[0])).collect();

    Ok(NormalizedTensor::from_normalized(values)?)
}

/// Guess the format from magic bytes and decode under dimension limits
fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(ImageError::IoError)?;
    reader.limits(limits);
    reader.decode()
}

/// Scale a u8 intensity to [0, 1] then apply the MNIST affine normalization
#[inline]
pub fn normalize_pixel(value: u8) -> f32 {
    (value as f32 / 255.0 - MNIST_MEAN) / MNIST_STD
}

/// Single-channel intensity, discarding alpha.
fn to_grayscale(image: &DynamicImage) -> GrayImage {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.clone(),
        DynamicImage::ImageLumaA8(gray_alpha) => {
            GrayImage::from_fn(gray_alpha.width(), gray_alpha.height(), |x, y| {
                Luma([gray_alpha.get_pixel(x, y).0[0]])
            })
        }
        other => {
            let rgb = other.to_rgb8();
            GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let [r, g, b] = rgb.get_pixel(x, y).0;
                Luma([luma_601(r, g, b)])
            })
        }
    }
}

/// ITU-R 601-2 luma in 16-bit fixed point: L = R*299/1000 + G*587/1000 + B*114/1000
#[inline]
fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        image.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_black_png() {
        let bytes = encode(DynamicImage::ImageLuma8(GrayImage::new(28, 28)), ImageFormat::Png);
        let tensor = preprocess(&bytes).unwrap();

        assert_eq!(tensor.shape(), &[1, 1, 28, 28]);
        let expected = -MNIST_MEAN / MNIST_STD;
        assert!(tensor.as_array().iter().all(|v| (v - expected).abs() < 1e-6));
    }

    #[test]
    fn test_resizes_rgb_to_28x28() {
        let white = RgbImage::from_pixel(56, 40, Rgb([255, 255, 255]));
        let bytes = encode(DynamicImage::ImageRgb8(white), ImageFormat::Png);
        let tensor = preprocess(&bytes).unwrap();

        assert_eq!(tensor.shape(), &[1, 1, 28, 28]);
        let expected = normalize_pixel(255);
        assert!(tensor.as_array().iter().all(|v| (v - expected).abs() < 0.02));
    }

    #[test]
    fn test_normalization_constants() {
        assert!((normalize_pixel(0) + 0.4242).abs() < 1e-3);
        assert!((normalize_pixel(255) - 2.8215).abs() < 1e-3);
    }

    #[test]
    fn test_luma_matches_601_weights() {
        assert_eq!(luma_601(255, 0, 0), 76);
        assert_eq!(luma_601(0, 255, 0), 150);
        assert_eq!(luma_601(0, 0, 255), 29);
        assert_eq!(luma_601(255, 255, 255), 255);
        assert_eq!(luma_601(0, 0, 0), 0);
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let garbage: Vec<u8> = (0..512u32).map(|i| (i.wrapping_mul(2654435761) >> 13) as u8).collect();
        assert!(matches!(preprocess(&garbage), Err(PreprocessError::Decode(_))));
    }

    #[test]
    fn test_rejects_oversized_dimensions() {
        let wide = GrayImage::new(MAX_IMAGE_DIMENSION + 1, 1);
        let bytes = encode(DynamicImage::ImageLuma8(wide), ImageFormat::Png);

        assert!(matches!(
            preprocess(&bytes),
            Err(PreprocessError::Decode(ImageError::Limits(_)))
        ));
    }

    #[test]
    fn test_accepts_max_dimension() {
        let tall = GrayImage::new(1, MAX_IMAGE_DIMENSION);
        let bytes = encode(DynamicImage::ImageLuma8(tall), ImageFormat::Png);

        assert_eq!(preprocess(&bytes).unwrap().shape(), &[1, 1, 28, 28]);
    }

    #[test]
    fn test_rejects_truncated_png() {
        let bytes = encode(DynamicImage::ImageLuma8(GrayImage::new(28, 28)), ImageFormat::Png);
        assert!(preprocess(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_deterministic() {
        let img = RgbImage::from_fn(31, 17, |x, y| Rgb([(x * 8) as u8, (y * 15) as u8, 99]));
        let bytes = encode(DynamicImage::ImageRgb8(img), ImageFormat::Png);

        assert_eq!(preprocess(&bytes).unwrap(), preprocess(&bytes).unwrap());
    }

    #[test]
    fn test_from_normalized_wrong_len() {
        assert!(NormalizedTensor::from_normalized(vec![0.0; 10]).is_err());
    }
}
