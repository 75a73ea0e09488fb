use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{Result, VQAError};
use crate::nn::checkpoint::{join, Checkpoint, Parameters};
use crate::nn::{Activation, FcNet};

/// Fuses pooled visual features with the question vector and scores every answer.
#[derive(Debug, Clone)]
pub struct Classifier {
    lin11: FcNet,
    lin12: FcNet,
    lin2: FcNet,
    lin3: FcNet,
}

impl Classifier {
    pub fn new<R: Rng>(
        v_features: usize,
        q_features: usize,
        mid_features: usize,
        out_features: usize,
        drop: f32,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Classifier {
            lin11: FcNet::new(v_features, mid_features, Some(Activation::Relu), 0., rng)?,
            lin12: FcNet::new(q_features, mid_features, Some(Activation::Relu), 0., rng)?,
            lin2: FcNet::new(mid_features, mid_features, Some(Activation::Relu), 0., rng)?,
            lin3: FcNet::new(mid_features, out_features, None, drop, rng)?,
        })
    }

    pub fn num_answers(&self) -> usize {
        self.lin3.out_features()
    }

    /// `v: [batch, v_features]`, `q: [batch, q_features]` -> unnormalized `[batch, answers]`
    pub fn forward(&self, v: Array2<f32>, q: Array2<f32>, mut rng: Option<&mut StdRng>) -> Result<Array2<f32>> {
        if v.nrows() != q.nrows() {
            return Err(VQAError::shape_mismatch("classifier question batch", &[v.nrows(), q.ncols()], q.shape()));
        }
        let x = self.lin11.forward(v, rng.as_deref_mut())? * &self.lin12.forward(q, rng.as_deref_mut())?;
        let x = self.lin2.forward(x, rng.as_deref_mut())?;
        self.lin3.forward(x, rng)
    }
}

impl Parameters for Classifier {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint) {
        self.lin11.export(&join(prefix, "lin11"), ckpt);
        self.lin12.export(&join(prefix, "lin12"), ckpt);
        self.lin2.export(&join(prefix, "lin2"), ckpt);
        self.lin3.export(&join(prefix, "lin3"), ckpt);
    }

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()> {
        self.lin11.import(&join(prefix, "lin11"), ckpt)?;
        self.lin12.import(&join(prefix, "lin12"), ckpt)?;
        self.lin2.import(&join(prefix, "lin2"), ckpt)?;
        self.lin3.import(&join(prefix, "lin3"), ckpt)
    }
}
