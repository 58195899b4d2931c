use ndarray::Array4;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tch::{CModule, Device, Kind, Tensor};

use super::InferenceError;
use crate::config::TensorLayout;

/// A classifier head: takes a `[1, H, W, 3]` image batch, returns one score per class.
pub trait ScoreModel: Send + Sync {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// TorchScript module loaded once at startup and shared across workers.
#[derive(Clone)]
pub struct TorchModel {
    model: Arc<Mutex<CModule>>,
    device: Device,
    layout: TensorLayout,
}

impl TorchModel {
    pub fn load(path: &Path, layout: TensorLayout) -> Result<Self, InferenceError> {
        let device = Device::cuda_if_available();
        let model = CModule::load_on_device(path, device).map_err(|source| InferenceError::Load {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded model {} on {:?}", path.display(), device);
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            device,
            layout,
        })
    }

    fn to_tensor(&self, input: &Array4<f32>) -> Result<Tensor, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data = input.as_standard_layout();
        let slice = data
            .as_slice()
            .ok_or_else(|| InferenceError::Preprocessing("non-contiguous input".into()))?;
        let tensor = Tensor::f_from_slice(slice)?.f_reshape(shape)?;
        let tensor = match self.layout {
            TensorLayout::Nhwc => tensor,
            TensorLayout::Nchw => tensor.f_permute([0, 3, 1, 2])?,
        };
        Ok(tensor.to_device(self.device))
    }
}

impl ScoreModel for TorchModel {
    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let tensor = self.to_tensor(input)?;
        let output = {
            let model = self.model.lock().map_err(|_| InferenceError::LockPoisoned)?;
            tch::no_grad(|| model.forward_ts(&[tensor]))?
        };
        let output_flat = output.f_to_kind(Kind::Float)?.f_view([-1])?;
        let num_elements = output_flat.numel();
        let mut output_vec = vec![0.0f32; num_elements];
        output_flat.f_copy_data(&mut output_vec, num_elements)?;
        Ok(output_vec)
    }
}

/// Index of the highest score; ties go to the first occurrence.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in scores.iter().enumerate() {
        if score.is_nan() {
            continue;
        }
        if best.is_none_or(|(_, top)| score > top) {
            best = Some((index, score));
        }
    }
    best.map(|(index, _)| index)
}
