use std::path::Path;
use std::sync::Mutex;

use tch::{CModule, Device, Kind, Tensor};

use super::preprocess::PreprocessedTensor;
use super::provider::{check_input_shape, ModelProvider};
use crate::config::ModelConfig;
use crate::error::{InferenceError, ProviderError};

/// TorchScript classifier. libtorch modules are not safe to run concurrently
/// from several threads, so forward passes are serialized through a mutex.
pub struct TorchModelProvider {
    module: Mutex<CModule>,
    device: Device,
    target_size: (u32, u32),
    labels: Vec<String>,
    channels_first: bool,
    apply_softmax: bool,
}

impl TorchModelProvider {
    pub fn load(config: &ModelConfig) -> Result<Self, ProviderError> {
        let path = Path::new(&config.path);
        if !path.is_file() {
            return Err(ProviderError::NotFound(config.path.clone()));
        }

        let device = Device::cuda_if_available();
        let module = CModule::load_on_device(path, device)
            .map_err(|e| ProviderError::Load(format!("{}: {}", config.path, e)))?;

        Ok(Self {
            module: Mutex::new(module),
            device,
            target_size: config.target_size(),
            labels: config.labels.clone(),
            channels_first: config.channels_first,
            apply_softmax: config.apply_softmax,
        })
    }

    fn to_input(&self, tensor: &PreprocessedTensor) -> Tensor {
        let [batch, height, width, channels] = tensor.shape().map(|d| d as i64);
        let input = Tensor::from_slice(tensor.as_slice())
            .view([batch, height, width, channels])
            .to_device(self.device);
        if self.channels_first {
            input.permute([0, 3, 1, 2]).contiguous()
        } else {
            input
        }
    }
}

impl ModelProvider for TorchModelProvider {
    fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    fn class_labels(&self) -> &[String] {
        &self.labels
    }

    fn predict(&self, tensor: &PreprocessedTensor) -> Result<Vec<f32>, InferenceError> {
        check_input_shape(tensor, self.target_size)?;
        let input = self.to_input(tensor);

        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| InferenceError::Backend("model lock poisoned".into()))?;
            tch::no_grad(|| module.forward_ts(&[input]))
                .map_err(|e| InferenceError::Backend(e.to_string()))?
        };

        let output = if self.apply_softmax {
            output.softmax(-1, Kind::Float)
        } else {
            output.to_kind(Kind::Float)
        };
        let output_flat = output.to_device(Device::Cpu).view([-1]);
        let num_elements = output_flat.size()[0] as usize;
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.copy_data(&mut output_vec, num_elements);
        Ok(output_vec)
    }

    fn backend_name(&self) -> &str {
        "libtorch"
    }
}
