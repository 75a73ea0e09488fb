use std::str::FromStr;

use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

use crate::error::VQAError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub fn apply<D: Dimension>(&self, mut x: Array<f32, D>) -> Array<f32, D> {
        match self {
            Activation::Relu => x.mapv_inplace(|v| v.max(0.)),
            Activation::Sigmoid => x.mapv_inplace(sigmoid),
            Activation::Tanh => x.mapv_inplace(f32::tanh),
        }
        x
    }
}

// Names are matched case-insensitively, "ReLU" and "relu" are the same layer.
impl FromStr for Activation {
    type Err = VQAError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            other => Err(VQAError::Config(format!("unknown activation {}", other))),
        }
    }
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1. / (1. + (-x).exp())
}
