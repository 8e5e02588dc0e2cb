//! Colour-based foliage check, independent of the classifier.
//!
//! A closed-set classifier will happily route a photo of a car into one of its
//! four disease classes. Counting green pixels catches those gross category
//! errors. It will also refuse heavily browned or yellowed leaves and shots under
//! unusual lighting; that false-reject rate is accepted.

use serde::{Deserialize, Serialize};

use super::preprocess::PreprocessedTensor;

/// Inclusive HSV band counted as "green". Hue is in degrees, saturation and
/// value on the 0-255 scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreenBand {
    pub hue_min_degrees: f32,
    pub hue_max_degrees: f32,
    pub min_saturation: u8,
    pub min_value: u8,
}

impl Default for GreenBand {
    fn default() -> Self {
        // OpenCV's 8-bit hue range 35..=85 is rounded half-degrees, which
        // admits roughly 69..=171 degrees.
        Self {
            hue_min_degrees: 69.0,
            hue_max_degrees: 171.0,
            min_saturation: 40,
            min_value: 40,
        }
    }
}

impl GreenBand {
    pub fn validate(&self) -> Result<(), String> {
        let valid_hue = |h: f32| h.is_finite() && (0.0..=360.0).contains(&h);
        if !valid_hue(self.hue_min_degrees) || !valid_hue(self.hue_max_degrees) {
            return Err("green band hue bounds must lie within 0..=360 degrees".into());
        }
        if self.hue_min_degrees > self.hue_max_degrees {
            return Err(format!(
                "green band hue_min_degrees ({}) exceeds hue_max_degrees ({})",
                self.hue_min_degrees, self.hue_max_degrees
            ));
        }
        Ok(())
    }

    fn contains(&self, [r, g, b]: [u8; 3]) -> bool {
        let (hue, saturation, value) = rgb_to_hsv(r, g, b);
        saturation >= self.min_saturation as f32
            && value >= self.min_value as f32
            && hue >= self.hue_min_degrees
            && hue <= self.hue_max_degrees
    }
}

/// Returns (hue in degrees `[0, 360)`, saturation `0..=255`, value `0..=255`).
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { 255.0 * delta / max } else { 0.0 };
    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let hue = if hue < 0.0 { hue + 360.0 } else { hue };

    (hue, saturation, max)
}

/// Fraction of pixels inside `band`.
pub fn green_ratio(tensor: &PreprocessedTensor, band: &GreenBand) -> f32 {
    let image = tensor.to_rgb_image();
    let total = image.width() as usize * image.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let green = image.pixels().filter(|px| band.contains(px.0)).count();
    green as f32 / total as f32
}

pub fn is_leaf_like(tensor: &PreprocessedTensor, min_green_ratio: f32, band: &GreenBand) -> bool {
    green_ratio(tensor, band) > min_green_ratio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::preprocess::tensor_from_rgb;
    use image::{Rgb, RgbImage};

    const LEAF_GREEN: Rgb<u8> = Rgb([34, 139, 34]);
    const GRAY: Rgb<u8> = Rgb([128, 128, 128]);

    fn mixed_image(green_pixels: u32) -> RgbImage {
        RgbImage::from_fn(10, 10, |x, y| if y * 10 + x < green_pixels { LEAF_GREEN } else { GRAY })
    }

    #[test]
    fn hsv_conversion_matches_known_colours() {
        let (h, s, v) = rgb_to_hsv(0, 255, 0);
        assert_eq!((h, s, v), (120.0, 255.0, 255.0));
        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert_eq!(h, 240.0);
        let (h, _, _) = rgb_to_hsv(255, 0, 128);
        assert!(h > 329.0 && h < 331.0);
        let (_, s, _) = rgb_to_hsv(128, 128, 128);
        assert_eq!(s, 0.0);
    }

    #[test]
    fn twenty_percent_green_is_leaf_like() {
        let tensor = tensor_from_rgb(&mixed_image(20));
        let band = GreenBand::default();

        assert!((green_ratio(&tensor, &band) - 0.2).abs() < 1e-6);
        assert!(is_leaf_like(&tensor, 0.15, &band));
    }

    #[test]
    fn ten_percent_green_is_not_leaf_like() {
        let tensor = tensor_from_rgb(&mixed_image(10));
        assert!(!is_leaf_like(&tensor, 0.15, &GreenBand::default()));
    }

    #[test]
    fn ratio_equal_to_threshold_is_not_leaf_like() {
        let tensor = tensor_from_rgb(&mixed_image(15));
        assert!(!is_leaf_like(&tensor, 0.15, &GreenBand::default()));
    }

    #[test]
    fn blue_and_dark_pixels_fall_outside_band() {
        let band = GreenBand::default();
        let blue = tensor_from_rgb(&RgbImage::from_pixel(8, 8, Rgb([20, 40, 220])));
        let dark_green = tensor_from_rgb(&RgbImage::from_pixel(8, 8, Rgb([0, 30, 0])));

        assert_eq!(green_ratio(&blue, &band), 0.0);
        assert_eq!(green_ratio(&dark_green, &band), 0.0);
    }

    #[test]
    fn hues_that_round_into_the_8bit_band_are_green() {
        let band = GreenBand::default();
        // Hue about 69.6 and 170.1 degrees, both rounding to 35 and 85 half-degrees.
        let lower_edge = tensor_from_rgb(&RgbImage::from_pixel(4, 4, Rgb([168, 200, 0])));
        let upper_edge = tensor_from_rgb(&RgbImage::from_pixel(4, 4, Rgb([0, 200, 167])));
        let yellowish = tensor_from_rgb(&RgbImage::from_pixel(4, 4, Rgb([180, 200, 0])));

        assert_eq!(green_ratio(&lower_edge, &band), 1.0);
        assert_eq!(green_ratio(&upper_edge, &band), 1.0);
        assert_eq!(green_ratio(&yellowish, &band), 0.0);
    }

    #[test]
    fn band_validation_catches_inverted_hue() {
        let band = GreenBand {
            hue_min_degrees: 200.0,
            hue_max_degrees: 100.0,
            ..GreenBand::default()
        };
        assert!(band.validate().is_err());
        assert!(GreenBand::default().validate().is_ok());
    }
}
