//! Pre-trained convolutional classifier for flower photos.
//!
//! Weights live in a `safetensors` file with the tensor names produced by
//! [`CnnNet::new`] (`conv1.weight`, `conv1.bias`, ..., `fc2.bias`). The network
//! takes NCHW input, so the NHWC batch from [`crate::preprocess`] is permuted
//! before the forward pass.

use std::path::Path;

use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{conv2d, linear, Conv2d, Conv2dConfig, Linear, VarBuilder, VarMap};
use model::Species;
use ndarray::{Array1, Array4};
use tracing::{debug, instrument};

use crate::error::{PredictionError, Result};
use crate::logistic::argmax;
use crate::preprocess::{CHANNELS, IMAGE_SIZE};

/// Anything that maps a preprocessed image batch to class probabilities.
pub trait ImageClassifier {
    /// Probabilities for the first image of the batch, in `Species::ALL` order.
    fn predict_proba(&self, batch: &Array4<f32>) -> Result<Vec<f32>>;

    fn classify(&self, batch: &Array4<f32>) -> Result<Species> {
        let probs = self.predict_proba(batch)?;
        if probs.len() != Species::ALL.len() {
            return Err(PredictionError::Inference(format!(
                "Model produced {} outputs, expected {}",
                probs.len(),
                Species::ALL.len()
            )));
        }
        let probs = Array1::from_iter(probs.into_iter().map(f64::from));
        Species::from_index(argmax(probs.view())).ok_or_else(|| {
            PredictionError::Inference("Prediction index out of range".to_string())
        })
    }
}

/// conv(3x3) -> relu -> maxpool(2), three times, then global average pooling
/// and two dense layers.
struct CnnNet {
    conv1: Conv2d,
    conv2: Conv2d,
    conv3: Conv2d,
    fc1: Linear,
    fc2: Linear,
}

impl CnnNet {
    fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let cfg = Conv2dConfig::default();
        Ok(Self {
            conv1: conv2d(CHANNELS, 16, 3, cfg, vb.pp("conv1"))?,
            conv2: conv2d(16, 32, 3, cfg, vb.pp("conv2"))?,
            conv3: conv2d(32, 64, 3, cfg, vb.pp("conv3"))?,
            fc1: linear(64, 64, vb.pp("fc1"))?,
            fc2: linear(64, Species::ALL.len(), vb.pp("fc2"))?,
        })
    }

    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let xs = self.conv1.forward(xs)?.relu()?.max_pool2d(2)?;
        let xs = self.conv2.forward(&xs)?.relu()?.max_pool2d(2)?;
        let xs = self.conv3.forward(&xs)?.relu()?.max_pool2d(2)?;
        let xs = xs.mean((2, 3))?;
        let xs = self.fc1.forward(&xs)?.relu()?;
        let logits = self.fc2.forward(&xs)?;
        candle_nn::ops::softmax_last_dim(&logits)
    }
}

/// The CNN loaded from a weights file, evaluated on the CPU.
pub struct CnnClassifier {
    net: CnnNet,
    device: Device,
}

impl CnnClassifier {
    #[instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let device = Device::Cpu;
        let tensors = candle_core::safetensors::load(path, &device).map_err(|e| {
            PredictionError::ModelLoad(format!("Cannot read {}: {}", path.display(), e))
        })?;
        debug!("Loaded {} tensors from {}", tensors.len(), path.display());

        let vb = VarBuilder::from_tensors(tensors, DType::F32, &device);
        let net = CnnNet::new(vb).map_err(|e| {
            PredictionError::ModelLoad(format!(
                "{} does not match the image network: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self { net, device })
    }
}

impl ImageClassifier for CnnClassifier {
    fn predict_proba(&self, batch: &Array4<f32>) -> Result<Vec<f32>> {
        let (n, h, w, c) = batch.dim();
        let side = IMAGE_SIZE as usize;
        if n == 0 || h != side || w != side || c != CHANNELS {
            return Err(PredictionError::MalformedInput(format!(
                "Expected a batch of {}x{}x{} images, got {:?}",
                side,
                side,
                CHANNELS,
                batch.shape()
            )));
        }

        let data: Vec<f32> = batch.iter().copied().collect();
        let probs = Tensor::from_vec(data, (n, h, w, c), &self.device)
            .and_then(|t| t.permute((0, 3, 1, 2)))
            .and_then(|t| t.contiguous())
            .and_then(|t| self.net.forward(&t))
            .and_then(|t| t.get(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| PredictionError::Inference(e.to_string()))?;
        debug!("Image class probabilities: {:?}", probs);
        Ok(probs)
    }
}

/// Write a freshly initialised (untrained) set of weights for the image network.
///
/// Useful as a starting point for training elsewhere and for exercising the
/// loading path without a real artefact.
pub fn write_initialized_weights(path: &Path) -> Result<()> {
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    CnnNet::new(vb).map_err(|e| PredictionError::ModelLoad(e.to_string()))?;
    varmap
        .save(path)
        .map_err(|e| PredictionError::ModelLoad(format!("Cannot write {}: {}", path.display(), e)))
}
