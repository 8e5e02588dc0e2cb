use super::preprocess::PreprocessedTensor;
use crate::error::InferenceError;

/// A loaded classifier. Implementations must tolerate concurrent `predict`
/// calls; providers backed by a non thread-safe runtime serialize internally.
pub trait ModelProvider: Send + Sync {
    /// Expected spatial input size as (height, width).
    fn target_size(&self) -> (u32, u32);

    /// Class labels in the exact order of the model's output.
    fn class_labels(&self) -> &[String];

    /// One forward pass over a batch of one, returning class probabilities.
    fn predict(&self, tensor: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError>;

    /// Short name of the numeric backend, reported by health checks.
    fn backend_name(&self) -> &str {
        "unknown"
    }
}

#[cfg(feature = "libtorch")]
pub(crate) fn check_input_shape(
    tensor: &PreprocessedTensor,
    target_size: (u32, u32),
) -> Result<(), InferenceError> {
    let (height, width) = target_size;
    let expected = [1, height as usize, width as usize, 3];
    if tensor.shape() != expected {
        return Err(InferenceError::ShapeMismatch {
            expected: expected.to_vec(),
            actual: tensor.shape().to_vec(),
        });
    }
    Ok(())
}
