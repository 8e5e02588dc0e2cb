#[derive(Debug, thiserror::Error)]
pub enum InvalidImageError {
    #[error("Image data is empty")]
    Empty,
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Image has zero size ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },
    #[error("Invalid target size {height}x{width}")]
    InvalidTargetSize { height: u32, width: u32 },
}

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("Input shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch { expected: Vec<usize>, actual: Vec<usize> },
    #[error("Model returned {actual} probabilities for {expected} classes")]
    ClassCountMismatch { expected: usize, actual: usize },
    #[error("Model output is not a probability distribution: {0}")]
    InvalidDistribution(String),
    #[error("Model backend error: {0}")]
    Backend(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error(transparent)]
    InvalidImage(#[from] InvalidImageError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Model file not found: {0}")]
    NotFound(String),
    #[error("Failed to load model: {0}")]
    Load(String),
    #[error("Model backend unavailable: {0}")]
    Unavailable(String),
}
