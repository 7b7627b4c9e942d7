use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

/// Convolutional Q network over stacked grayscale frames.
///
/// ```text
/// Input:  [batch, history, height, width]
/// Conv1:  history -> 32 channels, 8x8 kernel, stride 4
/// ReLU
/// Conv2:  32 -> 64 channels, 4x4 kernel, stride 2
/// ReLU
/// Conv3:  64 -> 64 channels, 3x3 kernel, stride 1
/// ReLU
/// Flatten
/// FC1:    flat -> hidden, ReLU
/// FC2:    hidden -> num_actions
/// ```
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    conv3: Conv2d<B>,
    fc1: Linear<B>,
    fc2: Linear<B>,
    relu: Relu,
}

#[derive(Config, Debug)]
pub struct QNetworkConfig {
    pub history_length: usize,
    pub height: usize,
    pub width: usize,
    pub num_actions: usize,
    #[config(default = 512)]
    pub hidden: usize,
}

const CONV_LAYERS: [(usize, usize); 3] = [(8, 4), (4, 2), (3, 1)];

fn conv_out(size: usize) -> usize {
    CONV_LAYERS
        .iter()
        .fold(size, |s, &(kernel, stride)| s.saturating_sub(kernel) / stride + 1)
}

impl QNetworkConfig {
    /// Flattened size of the last convolution's output.
    pub fn flat_size(&self) -> usize {
        64 * conv_out(self.height) * conv_out(self.width)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> QNetwork<B> {
        let flat = self.flat_size();
        QNetwork {
            conv1: Conv2dConfig::new([self.history_length, 32], [8, 8])
                .with_stride([4, 4])
                .init(device),
            conv2: Conv2dConfig::new([32, 64], [4, 4])
                .with_stride([2, 2])
                .init(device),
            conv3: Conv2dConfig::new([64, 64], [3, 3]).init(device),
            fc1: LinearConfig::new(flat, self.hidden).init(device),
            fc2: LinearConfig::new(self.hidden, self.num_actions).init(device),
            relu: Relu::new(),
        }
    }
}

impl<B: Backend> QNetwork<B> {
    /// Forward pass: `[batch, history, height, width]` -> `[batch, num_actions]`.
    pub fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.relu.forward(self.conv1.forward(input));
        let x = self.relu.forward(self.conv2.forward(x));
        let x = self.relu.forward(self.conv3.forward(x));
        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);
        let x = self.relu.forward(self.fc1.forward(x));
        self.fc2.forward(x)
    }
}
