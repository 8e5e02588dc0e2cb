use std::sync::Arc;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use shared::RejectionReason;

use super::leaf::{self, GreenBand};
use super::preprocess::{self, ResizeFilter};
use super::provider::ModelProvider;
use super::uncertainty;
use crate::error::{ClassifyError, ConfigError, InferenceError};

const SUM_TOLERANCE: f32 = 1e-3;

pub const REJECTION_MESSAGE: &str = "This image doesn't appear to be a banana leaf. \
     Please upload an image of a banana leaf for disease classification.";

/// Rejection policy. Set once when the engine is built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Reject when the top probability is below this.
    pub min_confidence: f32,
    /// Reject when the prediction entropy is above this.
    pub max_entropy: f32,
    /// Reject when the green-pixel fraction does not exceed this.
    pub min_green_ratio: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_confidence: 0.6,
            max_entropy: 1.2,
            min_green_ratio: 0.15,
        }
    }
}

impl Thresholds {
    pub fn new(min_confidence: f32, max_entropy: f32, min_green_ratio: f32) -> Result<Self, ConfigError> {
        let thresholds = Self {
            min_confidence,
            max_entropy,
            min_green_ratio,
        };
        thresholds.validate().map_err(ConfigError::Invalid)?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), String> {
        let unit = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        if !unit(self.min_confidence) {
            return Err(format!("min_confidence must be within 0..=1, got {}", self.min_confidence));
        }
        if !self.max_entropy.is_finite() || self.max_entropy < 0.0 {
            return Err(format!("max_entropy must be a non-negative number, got {}", self.max_entropy));
        }
        if !unit(self.min_green_ratio) {
            return Err(format!("min_green_ratio must be within 0..=1, got {}", self.min_green_ratio));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub predicted_class: String,
    pub confidence: f32,
    /// Every class with its probability, in model label order.
    pub all_probabilities: Vec<(String, f32)>,
    pub entropy: f32,
    pub green_ratio: f32,
    pub is_leaf_like: bool,
    pub is_rejected: bool,
    pub rejection_reasons: Vec<RejectionReason>,
    pub message: String,
}

impl ClassificationResult {
    pub fn probability_of(&self, label: &str) -> Option<f32> {
        self.all_probabilities
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
    }

    /// Maps entropy onto a 0..1 score where 1 means a fully certain prediction.
    pub fn certainty_score(&self) -> f32 {
        ((2.0 - self.entropy) / 2.0).max(0.0)
    }
}

/// Runs the full accept/reject pipeline over one image.
pub struct DecisionEngine {
    provider: Arc<dyn ModelProvider>,
    thresholds: Thresholds,
    green_band: GreenBand,
    resize_filter: ResizeFilter,
}

impl DecisionEngine {
    pub fn new(provider: Arc<dyn ModelProvider>, thresholds: Thresholds) -> Result<Self, ConfigError> {
        thresholds.validate().map_err(ConfigError::Invalid)?;
        if provider.class_labels().is_empty() {
            return Err(ConfigError::Invalid("model provider declares no class labels".into()));
        }
        let (height, width) = provider.target_size();
        if height == 0 || width == 0 {
            return Err(ConfigError::Invalid(format!(
                "model provider declares an empty input size {}x{}",
                height, width
            )));
        }
        Ok(Self {
            provider,
            thresholds,
            green_band: GreenBand::default(),
            resize_filter: ResizeFilter::default(),
        })
    }

    pub fn with_green_band(mut self, band: GreenBand) -> Result<Self, ConfigError> {
        band.validate().map_err(ConfigError::Invalid)?;
        self.green_band = band;
        Ok(self)
    }

    pub fn with_resize_filter(mut self, filter: ResizeFilter) -> Self {
        self.resize_filter = filter;
        self
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn green_band(&self) -> &GreenBand {
        &self.green_band
    }

    pub fn provider(&self) -> &dyn ModelProvider {
        self.provider.as_ref()
    }

    pub fn classify_bytes(&self, bytes: &[u8]) -> Result<ClassificationResult, ClassifyError> {
        let image = preprocess::decode_image(bytes)?;
        self.classify(&image)
    }

    pub fn classify(&self, image: &DynamicImage) -> Result<ClassificationResult, ClassifyError> {
        let tensor = preprocess::preprocess(image, self.provider.target_size(), self.resize_filter)?;
        let probabilities = self.provider.predict(&tensor)?;
        let labels = self.provider.class_labels();
        check_distribution(&probabilities, labels.len())?;

        let predicted_idx = uncertainty::argmax(&probabilities)
            .ok_or_else(|| InferenceError::InvalidDistribution("empty output".into()))?;
        let predicted_class = labels[predicted_idx].clone();
        let confidence = probabilities[predicted_idx];

        let entropy = uncertainty::entropy(&probabilities);
        let green_ratio = leaf::green_ratio(&tensor, &self.green_band);
        let is_leaf_like = green_ratio > self.thresholds.min_green_ratio;

        let mut rejection_reasons = Vec::new();
        if confidence < self.thresholds.min_confidence {
            rejection_reasons.push(RejectionReason::LowConfidence);
        }
        if entropy > self.thresholds.max_entropy {
            rejection_reasons.push(RejectionReason::HighUncertainty);
        }
        if !is_leaf_like {
            rejection_reasons.push(RejectionReason::NotLeafLike);
        }
        let is_rejected = !rejection_reasons.is_empty();

        let message = if is_rejected {
            REJECTION_MESSAGE.to_string()
        } else {
            format!("Detected: {} with {:.1}% confidence", predicted_class, confidence * 100.0)
        };

        Ok(ClassificationResult {
            predicted_class,
            confidence,
            all_probabilities: labels.iter().cloned().zip(probabilities).collect(),
            entropy,
            green_ratio,
            is_leaf_like,
            is_rejected,
            rejection_reasons,
            message,
        })
    }
}

fn check_distribution(probabilities: &[f32], num_classes: usize) -> Result<(), InferenceError> {
    if probabilities.len() != num_classes {
        return Err(InferenceError::ClassCountMismatch {
            expected: num_classes,
            actual: probabilities.len(),
        });
    }
    if let Some(bad) = probabilities.iter().find(|p| !p.is_finite() || **p < 0.0) {
        return Err(InferenceError::InvalidDistribution(format!(
            "probability {} is negative or not finite",
            bad
        )));
    }
    let sum: f32 = probabilities.iter().sum();
    if (sum - 1.0).abs() > SUM_TOLERANCE {
        return Err(InferenceError::InvalidDistribution(format!(
            "probabilities sum to {:.4}, expected 1",
            sum
        )));
    }
    Ok(())
}
