//! Element-wise activation functions

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Activation applied after a layer's affine transform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub fn apply(self, x: ArrayD<f32>) -> ArrayD<f32> {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.mapv_into(|v| v.max(0.0)),
            Activation::Sigmoid => x.mapv_into(|v| 1.0 / (1.0 + (-v).exp())),
            Activation::Tanh => x.mapv_into(f32::tanh),
        }
    }
}

/// Parameters of a standalone `Activation` layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationParams {
    pub activation: Activation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, IxDyn};

    #[test]
    fn test_relu() {
        let x = arr1(&[-1.0f32, 0.0, 2.5]).into_dyn();
        assert_eq!(Activation::Relu.apply(x), arr1(&[0.0f32, 0.0, 2.5]).into_dyn());
    }

    #[test]
    fn test_sigmoid_midpoint() {
        let x = ArrayD::<f32>::zeros(IxDyn(&[3]));
        assert!(Activation::Sigmoid.apply(x).iter().all(|&v| v == 0.5));
    }

    #[test]
    fn test_parse_lowercase() {
        let a: Activation = serde_json::from_str("\"tanh\"").unwrap();
        assert_eq!(a, Activation::Tanh);
        assert!(serde_json::from_str::<Activation>("\"swish\"").is_err());
    }
}
