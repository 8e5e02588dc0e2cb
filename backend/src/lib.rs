pub mod config;
pub mod disease;
pub mod error;
pub mod fetch;
pub mod inference;
pub mod routes;

pub use error::{ClassifyError, InferenceError, InvalidImageError};
pub use inference::{ClassificationResult, DecisionEngine, ModelProvider, Thresholds};
