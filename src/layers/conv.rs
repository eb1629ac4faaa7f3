//! 1-D convolution and global pooling over sequence positions
//!
//! Convolutions use "valid" padding and stride 1, the usual motif-scanner
//! setup for one-hot DNA.

use super::activation::Activation;
use super::{glorot_uniform, load_weight};
use crate::error::{EffectError, Result};
use ndarray::{s, Array1, Array2, Array3, ArrayD, Axis, Ix3};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Constructor parameters of a `Conv1D` layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conv1DParams {
    pub filters: usize,
    pub kernel_size: usize,
    #[serde(default)]
    pub activation: Activation,
    #[serde(default = "default_true")]
    pub use_bias: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Convolution over `(rows, length, channels)` inputs
#[derive(Debug, Clone)]
pub struct Conv1D {
    pub params: Conv1DParams,
    /// `(kernel_size, in_channels, filters)`
    kernel: Array3<f32>,
    bias: Array1<f32>,
    output_length: usize,
}

impl Conv1D {
    /// Zero-initialized layer for inputs of shape `[length, channels]`
    pub fn new(params: Conv1DParams, input_shape: &[usize]) -> Result<Self> {
        let &[length, channels] = input_shape else {
            return Err(EffectError::config(format!(
                "Conv1D expects (length, channels) input, got shape {:?}",
                input_shape
            )));
        };
        if params.filters == 0 || params.kernel_size == 0 {
            return Err(EffectError::config(
                "Conv1D filters and kernel_size must be > 0",
            ));
        }
        if params.kernel_size > length {
            return Err(EffectError::config(format!(
                "Conv1D kernel_size {} exceeds sequence length {}",
                params.kernel_size, length
            )));
        }
        Ok(Self {
            kernel: Array3::zeros((params.kernel_size, channels, params.filters)),
            bias: Array1::zeros(params.filters),
            output_length: length - params.kernel_size + 1,
            params,
        })
    }

    pub fn output_shape(&self) -> Vec<usize> {
        vec![self.output_length, self.params.filters]
    }

    pub fn forward(&self, x: ArrayD<f32>) -> Result<ArrayD<f32>> {
        let x = x
            .into_dimensionality::<Ix3>()
            .map_err(|_| EffectError::config("Conv1D expects a (rows, length, channels) input"))?;
        let (rows, length, channels) = x.dim();
        let (width, in_channels, filters) = self.kernel.dim();
        if channels != in_channels || length != self.output_length + width - 1 {
            return Err(EffectError::shape(
                "Conv1D input",
                &[rows, self.output_length + width - 1, in_channels],
                &[rows, length, channels],
            ));
        }

        let kernel = self
            .kernel
            .view()
            .into_shape((width * in_channels, filters))
            .map_err(|e| EffectError::config(format!("Conv1D kernel layout: {}", e)))?;

        let mut out = Array3::<f32>::zeros((rows, self.output_length, filters));
        let mut patches = Array2::<f32>::zeros((self.output_length, width * in_channels));
        for (row, mut target) in out.axis_iter_mut(Axis(0)).enumerate() {
            for offset in 0..width {
                patches
                    .slice_mut(s![.., offset * in_channels..(offset + 1) * in_channels])
                    .assign(&x.slice(s![row, offset..offset + self.output_length, ..]));
            }
            target.assign(&patches.dot(&kernel));
            if self.params.use_bias {
                target += &self.bias;
            }
        }

        Ok(self.params.activation.apply(out.into_dyn()))
    }

    pub fn weights(&self) -> Vec<ArrayD<f32>> {
        let mut weights = vec![self.kernel.clone().into_dyn()];
        if self.params.use_bias {
            weights.push(self.bias.clone().into_dyn());
        }
        weights
    }

    pub fn load_weights<'a, I>(&mut self, weights: &mut I) -> Result<()>
    where
        I: Iterator<Item = &'a ArrayD<f32>>,
    {
        self.kernel = load_weight(weights, self.kernel.raw_dim(), "Conv1D kernel")?;
        if self.params.use_bias {
            self.bias = load_weight(weights, self.bias.raw_dim(), "Conv1D bias")?;
        }
        Ok(())
    }

    pub fn randomize(&mut self, rng: &mut StdRng) {
        let (width, in_channels, filters) = self.kernel.dim();
        self.kernel = glorot_uniform(
            self.kernel.raw_dim(),
            width * in_channels,
            width * filters,
            rng,
        );
        self.bias.fill(0.0);
    }
}

/// Maximum over the position axis: `(rows, length, channels)` to `(rows, channels)`
pub fn global_max_pool(x: ArrayD<f32>) -> Result<ArrayD<f32>> {
    if x.ndim() != 3 {
        return Err(EffectError::config(format!(
            "GlobalMaxPooling1D expects a 3-D input, got {}-D",
            x.ndim()
        )));
    }
    Ok(x.fold_axis(Axis(1), f32::NEG_INFINITY, |&acc, &v| acc.max(v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2, arr3};

    fn params(filters: usize, kernel_size: usize) -> Conv1DParams {
        Conv1DParams {
            filters,
            kernel_size,
            activation: Activation::Linear,
            use_bias: true,
            name: None,
        }
    }

    #[test]
    fn test_output_shape_valid_padding() {
        let conv = Conv1D::new(params(8, 3), &[10, 4]).unwrap();
        assert_eq!(conv.output_shape(), vec![8, 8]);
    }

    #[test]
    fn test_forward_sums_window() {
        // Single channel, single filter, kernel of ones: moving sum of width 2
        let mut conv = Conv1D::new(params(1, 2), &[4, 1]).unwrap();
        let kernel = Array3::<f32>::ones((2, 1, 1)).into_dyn();
        let bias = arr1(&[1.0f32]).into_dyn();
        conv.load_weights(&mut [kernel, bias].iter()).unwrap();

        let x = arr3(&[[[1.0f32], [2.0], [3.0], [4.0]]]).into_dyn();
        let out = conv.forward(x).unwrap();
        assert_eq!(out, arr3(&[[[4.0f32], [6.0], [8.0]]]).into_dyn());
    }

    #[test]
    fn test_kernel_longer_than_sequence() {
        assert!(Conv1D::new(params(1, 5), &[4, 4]).is_err());
    }

    #[test]
    fn test_global_max_pool() {
        let x = arr3(&[[[1.0f32, -2.0], [3.0, -1.0]]]).into_dyn();
        let out = global_max_pool(x).unwrap();
        assert_eq!(out, arr2(&[[3.0f32, -1.0]]).into_dyn());
    }
}
