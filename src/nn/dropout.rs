use ndarray::{Array, Dimension};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{Result, VQAError};

/// Inverted dropout. Passing an rng turns on training behaviour, `None` is eval mode.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    p: f32,
}

impl Dropout {
    /// `p` must lie in `[0, 1)`.
    pub fn new(p: f32) -> Result<Self> {
        if !(0. ..1.).contains(&p) {
            return Err(VQAError::Config(format!("dropout probability {} is not in [0, 1)", p)));
        }
        Ok(Dropout { p })
    }

    pub fn p(&self) -> f32 {
        self.p
    }

    pub fn forward<D: Dimension>(&self, mut x: Array<f32, D>, rng: Option<&mut StdRng>) -> Array<f32, D> {
        let rng = match rng {
            Some(rng) if self.p > 0. => rng,
            _ => return x,
        };
        let keep = 1. - self.p;
        let scale = 1. / keep;
        x.mapv_inplace(|v| if rng.gen::<f32>() < keep { v * scale } else { 0. });
        x
    }
}
