use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::Result;
use crate::nn::activation::Activation;
use crate::nn::checkpoint::{join, Checkpoint, Parameters};
use crate::nn::dropout::Dropout;
use crate::nn::linear::WeightNormLinear;
use crate::nn::standard_layout;

/// dropout -> weight-normalized linear -> optional activation
#[derive(Debug, Clone)]
pub struct FcNet {
    lin: WeightNormLinear,
    drop: Dropout,
    activate: Option<Activation>,
}

impl FcNet {
    pub fn new<R: Rng>(
        in_size: usize,
        out_size: usize,
        activate: Option<Activation>,
        drop: f32,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(FcNet {
            lin: WeightNormLinear::new(in_size, out_size, rng),
            drop: Dropout::new(drop)?,
            activate,
        })
    }

    pub fn linear(&self) -> &WeightNormLinear {
        &self.lin
    }

    pub fn in_features(&self) -> usize {
        self.lin.in_features()
    }

    pub fn out_features(&self) -> usize {
        self.lin.out_features()
    }

    pub fn forward(&self, x: Array2<f32>, rng: Option<&mut StdRng>) -> Result<Array2<f32>> {
        let x = self.drop.forward(x, rng);
        let x = self.lin.forward(&x.view())?;
        Ok(match self.activate {
            Some(act) => act.apply(x),
            None => x,
        })
    }

    /// Applies the layer to every position of a `[batch, n, in]` tensor.
    pub fn forward3(&self, x: Array3<f32>, rng: Option<&mut StdRng>) -> Result<Array3<f32>> {
        let (batch, n, dim) = x.dim();
        let flat = standard_layout(x).into_shape((batch * n, dim))?;
        let out = self.forward(flat, rng)?;
        let out_dim = out.ncols();
        Ok(out.into_shape((batch, n, out_dim))?)
    }
}

impl Parameters for FcNet {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint) {
        self.lin.export(&join(prefix, "lin"), ckpt);
    }

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()> {
        self.lin.import(&join(prefix, "lin"), ckpt)
    }
}
