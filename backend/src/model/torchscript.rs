use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tch::{CModule, Device, Kind, Tensor};

use super::{InferenceError, ScoreModel};
use crate::config::DeviceKind;
use crate::preprocess::NormalizedTensor;

impl From<tch::TchError> for InferenceError {
    fn from(err: tch::TchError) -> Self {
        InferenceError::Backend(err.to_string())
    }
}

/// TorchScript export of the classifier, executed through libtorch.
pub struct TorchScriptModel {
    module: Mutex<CModule>,
    device: Device,
    name: String,
}

impl TorchScriptModel {
    pub fn load(path: &Path, device: DeviceKind) -> Result<Self, InferenceError> {
        if !path.exists() {
            return Err(InferenceError::ModelUnavailable(format!(
                "model artifact not found: {}",
                path.display()
            )));
        }

        let device = match device {
            DeviceKind::Cpu => Device::Cpu,
            DeviceKind::CudaIfAvailable => Device::cuda_if_available(),
        };
        log::info!("Loading model from {} on {:?}", path.display(), device);

        let mut module = CModule::load_on_device(path, device)
            .map_err(|e| InferenceError::ModelUnavailable(e.to_string()))?;
        module.set_eval();

        let name = file_name(path);
        Ok(Self {
            module: Mutex::new(module),
            device,
            name,
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| PathBuf::from(path).display().to_string())
}

impl ScoreModel for TorchScriptModel {
    fn forward(&self, input: &NormalizedTensor) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data = input.to_contiguous_vec();
        let tensor = Tensor::from_slice(&data)
            .f_reshape(shape.as_slice())?
            .to_device(self.device);

        let module = self
            .module
            .lock()
            .map_err(|_| InferenceError::ModelUnavailable("model lock poisoned".to_string()))?;
        let output = tch::no_grad(|| module.forward_ts(&[tensor]))?;

        let flat = output
            .to_kind(Kind::Float)
            .to_device(Device::Cpu)
            .f_reshape([-1])?;
        let len = flat.size()[0] as usize;
        let mut values = vec![0.0f32; len];
        flat.f_copy_data(&mut values, len)?;
        Ok(values)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
