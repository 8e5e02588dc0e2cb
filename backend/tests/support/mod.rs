#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use leafcheck::inference::{ModelProvider, PreprocessedTensor};
use leafcheck::InferenceError;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub const LABELS: [&str; 4] = ["cordana", "healthy", "pestalotiopsis", "sigatoka"];

/// Returns a fixed probability vector, or a backend failure.
pub struct StubProvider {
    labels: Vec<String>,
    target_size: (u32, u32),
    output: Result<Vec<f32>, String>,
}

impl StubProvider {
    pub fn returning(output: &[f32]) -> Self {
        Self {
            labels: LABELS.iter().map(|s| s.to_string()).collect(),
            target_size: (32, 32),
            output: Ok(output.to_vec()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            output: Err(message.to_string()),
            ..Self::returning(&[])
        }
    }
}

impl ModelProvider for StubProvider {
    fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, tensor: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError> {
        let (height, width) = self.target_size;
        if tensor.shape() != [1, height as usize, width as usize, 3] {
            return Err(InferenceError::ShapeMismatch {
                expected: vec![1, height as usize, width as usize, 3],
                actual: tensor.shape().to_vec(),
            });
        }
        self.output.clone().map_err(InferenceError::Backend)
    }

    fn backend_name(&self) -> &str {
        "stub"
    }
}

/// Blocks in `predict` for a fixed delay and records how many calls overlap.
pub struct SlowProvider {
    labels: Vec<String>,
    delay: Duration,
    active: AtomicUsize,
    pub peak: Arc<AtomicUsize>,
    pub calls: Arc<AtomicUsize>,
}

impl SlowProvider {
    pub fn new(delay: Duration) -> Self {
        Self {
            labels: LABELS.iter().map(|s| s.to_string()).collect(),
            delay,
            active: AtomicUsize::new(0),
            peak: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ModelProvider for SlowProvider {
    fn target_size(&self) -> (u32, u32) {
        (32, 32)
    }

    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, _tensor: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![0.05, 0.85, 0.05, 0.05])
    }
}

/// A leaf-green ellipse on a pale background.
pub fn leaf_image() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(120, 80, |x, y| {
        let dx = (x as f32 - 60.0) / 52.0;
        let dy = (y as f32 - 40.0) / 30.0;
        if dx * dx + dy * dy < 1.0 {
            Rgb([56, 142, 60])
        } else {
            Rgb([240, 238, 232])
        }
    }))
}

pub fn solid_image(rgb: [u8; 3]) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(120, 80, Rgb(rgb)))
}

pub fn transparent_image() -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(120, 80, Rgba([0, 0, 0, 0])))
}

pub fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Builds a multipart/form-data body with a single file field.
pub fn multipart_body(field: &str, bytes: &[u8]) -> (String, Vec<u8>) {
    let boundary = "leafcheck-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"leaf.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
