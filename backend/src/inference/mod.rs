//! Out-of-distribution aware leaf classification.
//!
//! Images are normalized into the model's input tensor, run through a
//! [`ModelProvider`], then scored twice more: prediction entropy and a
//! colour heuristic. [`DecisionEngine`] folds the three signals into a single
//! [`ClassificationResult`].

pub mod engine;
pub mod leaf;
pub mod preprocess;
pub mod provider;
#[cfg(feature = "libtorch")]
pub mod torch;
pub mod uncertainty;

pub use engine::{ClassificationResult, DecisionEngine, Thresholds};
pub use leaf::GreenBand;
pub use preprocess::{PreprocessedTensor, ResizeFilter};
pub use provider::ModelProvider;
#[cfg(feature = "libtorch")]
pub use torch::TorchModelProvider;
