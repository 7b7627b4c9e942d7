use std::fs;
use std::path::Path;

use burn::backend::ndarray::NdArrayDevice;
use burn::backend::wgpu::WgpuDevice;
use burn::backend::{Autodiff, NdArray, Wgpu};
use burn::module::AutodiffModule;
use burn::optim::adaptor::OptimizerAdaptor;
use burn::optim::{Adam, AdamConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::record::DefaultRecorder;
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::TensorData;
use tracing::{debug, warn};

use crate::ai::model::{ModelSpec, ValueModel};
use crate::ai::networks::{QNetwork, QNetworkConfig};
use crate::error::ModelError;
use crate::training::Minibatch;

fn backend_error(e: impl std::fmt::Debug) -> ModelError {
    ModelError::Backend(format!("{e:?}"))
}

/// Online + target Q networks trained with Adam on squared TD error.
pub struct QNetworkModel<B: AutodiffBackend> {
    online: QNetwork<B>,
    target: QNetwork<B::InnerBackend>,
    optimizer: OptimizerAdaptor<Adam, QNetwork<B>, B>,
    spec: ModelSpec,
    device: B::Device,
    backend: &'static str,
    updates: usize,
}

impl<B: AutodiffBackend> QNetworkModel<B> {
    pub fn new(spec: ModelSpec, device: B::Device, backend: &'static str) -> Self {
        let net_config = QNetworkConfig::new(
            spec.history_length,
            spec.frame_height,
            spec.frame_width,
            spec.num_actions,
        );
        let online: QNetwork<B> = net_config.init(&device);
        let target = online.valid();
        let optimizer = AdamConfig::new().init();
        debug!(backend, flat = net_config.flat_size(), "Q network initialised");

        QNetworkModel {
            online,
            target,
            optimizer,
            spec,
            device,
            backend,
            updates: 0,
        }
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    fn states_tensor<BB: Backend>(
        &self,
        data: &[f32],
        batch: usize,
        device: &BB::Device,
    ) -> Result<Tensor<BB, 4>, ModelError> {
        let expected = batch * self.spec.state_len();
        if data.len() != expected {
            return Err(ModelError::ShapeMismatch {
                expected,
                got: data.len(),
            });
        }
        let shape = [
            batch,
            self.spec.history_length,
            self.spec.frame_height,
            self.spec.frame_width,
        ];
        Ok(Tensor::from_data(TensorData::new(data.to_vec(), shape), device))
    }
}

impl<B: AutodiffBackend> ValueModel for QNetworkModel<B> {
    fn backend(&self) -> &str {
        self.backend
    }

    fn num_actions(&self) -> usize {
        self.spec.num_actions
    }

    fn evaluate(&self, state: &[f32]) -> Result<Vec<f32>, ModelError> {
        let input = self.states_tensor::<B::InnerBackend>(state, 1, &self.device)?;
        let q_values = self.online.valid().forward(input);
        q_values.into_data().to_vec::<f32>().map_err(backend_error)
    }

    fn train(&mut self, batch: &Minibatch) -> Result<f32, ModelError> {
        let batch_size = batch.len();
        if batch_size == 0 {
            return Err(ModelError::EmptyBatch);
        }
        let num_actions = self.spec.num_actions;

        let states = self.states_tensor::<B>(&batch.states, batch_size, &self.device)?;
        let q_all = self.online.forward(states);

        let mut mask = vec![0.0f32; batch_size * num_actions];
        for (i, &a) in batch.actions.iter().enumerate() {
            mask[i * num_actions + a] = 1.0;
        }
        let mask = Tensor::<B, 2>::from_data(
            TensorData::new(mask, [batch_size, num_actions]),
            &self.device,
        );
        let q_taken = (q_all * mask).sum_dim(1);

        let next_states =
            self.states_tensor::<B::InnerBackend>(&batch.next_states, batch_size, &self.device)?;
        let next_q: Vec<f32> = self
            .target
            .forward(next_states)
            .into_data()
            .to_vec()
            .map_err(backend_error)?;

        let targets: Vec<f32> = (0..batch_size)
            .map(|i| {
                if batch.terminals[i] {
                    batch.rewards[i]
                } else {
                    let max_q = next_q[i * num_actions..(i + 1) * num_actions]
                        .iter()
                        .copied()
                        .fold(f32::NEG_INFINITY, f32::max);
                    batch.rewards[i] + self.spec.gamma * max_q
                }
            })
            .collect();
        let targets = Tensor::<B, 2>::from_data(
            TensorData::new(targets, [batch_size, 1]),
            &self.device,
        );

        let diff = q_taken - targets;
        let loss = (diff.clone() * diff).mean();
        let loss_val = loss
            .clone()
            .into_data()
            .to_vec::<f32>()
            .map_err(backend_error)?
            .first()
            .copied()
            .unwrap_or_default();

        let grads = GradientsParams::from_grads(loss.backward(), &self.online);
        self.online = self
            .optimizer
            .step(self.spec.learning_rate, self.online.clone(), grads);

        self.updates += 1;
        if self.updates % self.spec.target_update_interval == 0 {
            self.target = self.online.valid();
            debug!(updates = self.updates, "target network synchronised");
        }

        Ok(loss_val)
    }

    fn save(&self, dir: &Path) -> Result<(), ModelError> {
        let save_error = |reason: String| ModelError::Save {
            path: dir.to_path_buf(),
            reason,
        };
        fs::create_dir_all(dir).map_err(|e| save_error(e.to_string()))?;

        let recorder = DefaultRecorder::default();
        self.online
            .valid()
            .save_file(dir.join("q_network"), &recorder)
            .map_err(|e| save_error(e.to_string()))?;
        self.target
            .clone()
            .save_file(dir.join("target_network"), &recorder)
            .map_err(|e| save_error(e.to_string()))?;
        Ok(())
    }
}

/// CPU backend.
pub fn ndarray_factory(spec: &ModelSpec) -> Result<Box<dyn ValueModel>, ModelError> {
    if let Some(device) = spec.device {
        warn!(device, "ndarray backend ignores the device index");
    }
    Ok(Box::new(QNetworkModel::<Autodiff<NdArray>>::new(
        spec.clone(),
        NdArrayDevice::Cpu,
        "ndarray",
    )))
}

/// GPU backend; `device` selects a discrete adapter.
pub fn wgpu_factory(spec: &ModelSpec) -> Result<Box<dyn ValueModel>, ModelError> {
    let device = match spec.device {
        Some(index) => WgpuDevice::DiscreteGpu(index),
        None => WgpuDevice::DefaultDevice,
    };
    Ok(Box::new(QNetworkModel::<Autodiff<Wgpu>>::new(
        spec.clone(),
        device,
        "wgpu",
    )))
}
