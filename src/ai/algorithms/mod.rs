mod dqn;

pub use dqn::{ndarray_factory, wgpu_factory, QNetworkModel};
