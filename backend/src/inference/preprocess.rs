use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{Array4, ArrayView4};
use serde::{Deserialize, Serialize};

use crate::error::InvalidImageError;

/// Resampling filter used when the input does not already match the model size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Model input of shape `(1, H, W, 3)` with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedTensor {
    data: Array4<f32>,
}

impl PreprocessedTensor {
    pub fn height(&self) -> usize {
        self.data.shape()[1]
    }

    pub fn width(&self) -> usize {
        self.data.shape()[2]
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, self.height(), self.width(), 3]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// Row-major NHWC values. The array is always built in standard layout.
    pub fn as_slice(&self) -> &[f32] {
        self.data
            .as_slice()
            .expect("preprocessed tensors are always contiguous")
    }

    /// Rebuilds the 8-bit image the tensor was scaled from.
    pub fn to_rgb_image(&self) -> RgbImage {
        let (height, width) = (self.height() as u32, self.width() as u32);
        RgbImage::from_fn(width, height, |x, y| {
            let (y, x) = (y as usize, x as usize);
            Rgb([
                to_u8(self.data[[0, y, x, 0]]),
                to_u8(self.data[[0, y, x, 1]]),
                to_u8(self.data[[0, y, x, 2]]),
            ])
        })
    }
}

fn to_u8(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, InvalidImageError> {
    if bytes.is_empty() {
        return Err(InvalidImageError::Empty);
    }
    image::load_from_memory(bytes).map_err(|e| InvalidImageError::Decode(e.to_string()))
}

/// Normalizes an image into the tensor layout the model was calibrated against:
/// alpha composited over white, RGB, resized to `target_size` (height, width),
/// divided by 255, with a leading batch dimension.
pub fn preprocess(
    image: &DynamicImage,
    target_size: (u32, u32),
    filter: ResizeFilter,
) -> Result<PreprocessedTensor, InvalidImageError> {
    let (height, width) = target_size;
    if height == 0 || width == 0 {
        return Err(InvalidImageError::InvalidTargetSize { height, width });
    }
    let (src_width, src_height) = image.dimensions();
    if src_width == 0 || src_height == 0 {
        return Err(InvalidImageError::ZeroSized {
            width: src_width,
            height: src_height,
        });
    }

    let rgb = if image.color().has_alpha() {
        flatten_onto_white(image)
    } else {
        image.to_rgb8()
    };

    let resized = if rgb.dimensions() == (width, height) {
        rgb
    } else {
        image::imageops::resize(&rgb, width, height, filter.into())
    };

    let data = Array4::from_shape_fn(
        (1, height as usize, width as usize, 3),
        |(_, y, x, c)| resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0,
    );
    Ok(PreprocessedTensor { data })
}

fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = a as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        Rgb([blend(r), blend(g), blend(b)])
    })
}

#[cfg(test)]
pub(crate) fn tensor_from_rgb(image: &RgbImage) -> PreprocessedTensor {
    let (width, height) = image.dimensions();
    preprocess(
        &DynamicImage::ImageRgb8(image.clone()),
        (height, width),
        ResizeFilter::Nearest,
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    #[test]
    fn output_has_batch_of_one_and_target_shape() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 200, Rgb([10, 200, 30])));
        let tensor = preprocess(&img, (160, 224), ResizeFilter::Triangle).unwrap();

        assert_eq!(tensor.shape(), [1, 160, 224, 3]);
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn scales_by_255_without_standardization() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([0, 51, 255])));
        let tensor = preprocess(&img, (4, 4), ResizeFilter::Nearest).unwrap();
        let view = tensor.view();

        assert_eq!(view[[0, 2, 1, 0]], 0.0);
        assert_eq!(view[[0, 2, 1, 1]], 51.0 / 255.0);
        assert_eq!(view[[0, 2, 1, 2]], 1.0);
    }

    #[test]
    fn reapplying_to_target_sized_image_is_identical() {
        let img = RgbImage::from_fn(32, 32, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 90]));
        let first = tensor_from_rgb(&img);
        let rebuilt = first.to_rgb_image();
        let second = tensor_from_rgb(&rebuilt);

        assert_eq!(rebuilt, img);
        assert_eq!(first, second);
    }

    #[test]
    fn transparent_image_matches_white_image() {
        let transparent = DynamicImage::ImageRgba8(RgbaImage::from_pixel(20, 10, Rgba([0, 0, 0, 0])));
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([255, 255, 255])));

        let a = preprocess(&transparent, (8, 8), ResizeFilter::Triangle).unwrap();
        let b = preprocess(&white, (8, 8), ResizeFilter::Triangle).unwrap();
        assert_eq!(a, b);
        assert!(a.as_slice().iter().all(|v| *v == 1.0));
    }

    #[test]
    fn half_transparent_pixels_blend_toward_white() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 128])));
        let tensor = preprocess(&img, (2, 2), ResizeFilter::Nearest).unwrap();
        let expected = (255.0_f32 * (1.0 - 128.0 / 255.0)).round() / 255.0;

        assert!(tensor.as_slice().iter().all(|v| (*v - expected).abs() < 1e-6));
    }

    #[test]
    fn rejects_zero_target_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let err = preprocess(&img, (0, 4), ResizeFilter::Nearest).unwrap_err();
        assert!(matches!(err, InvalidImageError::InvalidTargetSize { .. }));
    }

    #[test]
    fn rejects_zero_sized_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 5));
        let err = preprocess(&img, (4, 4), ResizeFilter::Nearest).unwrap_err();
        assert!(matches!(err, InvalidImageError::ZeroSized { width: 0, height: 5 }));
    }

    #[test]
    fn decode_rejects_empty_and_corrupt_bytes() {
        assert!(matches!(decode_image(&[]), Err(InvalidImageError::Empty)));
        assert!(matches!(
            decode_image(b"\x89PNG\r\n\x1a\nnot really a png"),
            Err(InvalidImageError::Decode(_))
        ));
    }

    #[test]
    fn decodes_png_bytes() {
        let img = RgbImage::from_pixel(3, 2, Rgb([1, 2, 3]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();

        let decoded = decode_image(buf.get_ref()).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
    }
}
