use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// Why a classification was refused. The display form is the text sent to clients.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter, EnumString,
)]
pub enum RejectionReason {
    #[strum(serialize = "low confidence")]
    #[serde(rename = "low confidence")]
    LowConfidence,
    #[strum(serialize = "high uncertainty")]
    #[serde(rename = "high uncertainty")]
    HighUncertainty,
    #[strum(serialize = "does not look like a leaf")]
    #[serde(rename = "does not look like a leaf")]
    NotLeafLike,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
pub enum Severity {
    None,
    Moderate,
    #[strum(serialize = "Moderate to High")]
    #[serde(rename = "Moderate to High")]
    ModerateToHigh,
    High,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DiseaseInfo {
    pub description: String,
    pub severity: Severity,
    pub recommendation: String,
    pub urgent: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LabelledProbability {
    pub label: String,
    pub probability: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LabelledPercentage {
    pub label: String,
    pub percentage: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictUrlRequest {
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PredictionResponse {
    pub success: bool,
    pub request_id: String,
    pub timestamp: String,
    pub image_sha256: String,
    pub is_rejected: bool,
    pub message: String,
    pub predicted_class: String,
    pub confidence_score: f32,
    /// Confidence formatted as a percentage, e.g. "85.00%".
    pub confidence: String,
    pub entropy: f32,
    pub certainty_score: f32,
    pub is_leaf_like: bool,
    pub green_ratio: f32,
    /// Class probabilities in model label order.
    pub raw_probabilities: Vec<LabelledProbability>,
    pub detailed_probabilities: Vec<LabelledPercentage>,
    pub rejection_reasons: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub disease_info: Option<DiseaseInfo>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub image_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ThresholdsInfo {
    pub min_confidence: f32,
    pub max_entropy: f32,
    pub min_green_ratio: f32,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct GreenBandInfo {
    pub hue_min_degrees: f32,
    pub hue_max_degrees: f32,
    pub min_saturation: u8,
    pub min_value: u8,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub diseases: Vec<String>,
    pub input_size: String,
    pub features: Vec<String>,
    pub thresholds: ThresholdsInfo,
    pub green_band: GreenBandInfo,
    pub rejection_criteria: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub backend: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ServiceInfoResponse {
    pub message: String,
    pub version: String,
    pub features: Vec<String>,
    pub diseases: Vec<String>,
    pub status: String,
    pub model_loaded: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
