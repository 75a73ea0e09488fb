use ndarray::{s, Array2, Array3, ArrayView2};
use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Normal;

use crate::error::{Result, VQAError};
use crate::nn::checkpoint::{join, Checkpoint, Parameters};

/// Lookup table with a trailing padding row.
///
/// The table has `num_embeddings + 1` rows; index `num_embeddings` is the padding
/// index and its row starts out as zeros.
#[derive(Debug, Clone)]
pub struct Embedding {
    weight: Array2<f32>,
}

impl Embedding {
    pub fn new<R: Rng>(num_embeddings: usize, features: usize, rng: &mut R) -> Self {
        let normal = Normal::new(0., 1.).expect("standard normal parameters are valid");
        let mut weight = Array2::from_shape_simple_fn((num_embeddings + 1, features), || {
            normal.sample(rng) as f32
        });
        weight.row_mut(num_embeddings).fill(0.);
        Embedding { weight }
    }

    pub fn padding_idx(&self) -> usize {
        self.weight.nrows() - 1
    }

    pub fn features(&self) -> usize {
        self.weight.ncols()
    }

    pub fn weight(&self) -> &Array2<f32> {
        &self.weight
    }

    /// Overwrites the non-padding rows with pretrained vectors.
    pub fn load_pretrained(&mut self, init: &ArrayView2<f32>) -> Result<()> {
        let expected = [self.padding_idx(), self.features()];
        if init.shape() != expected {
            return Err(VQAError::shape_mismatch("embedding init", &expected, init.shape()));
        }
        self.weight.slice_mut(s![..self.padding_idx(), ..]).assign(init);
        Ok(())
    }

    /// `[batch, len] -> [batch, len, features]`
    pub fn forward(&self, indices: &ArrayView2<usize>) -> Result<Array3<f32>> {
        let (batch, len) = indices.dim();
        let mut out = Array3::zeros((batch, len, self.features()));
        for ((b, t), &idx) in indices.indexed_iter() {
            if idx >= self.weight.nrows() {
                return Err(VQAError::Config(format!(
                    "token index {} outside embedding table of {} rows",
                    idx,
                    self.weight.nrows()
                )));
            }
            out.slice_mut(s![b, t, ..]).assign(&self.weight.row(idx));
        }
        Ok(out)
    }
}

impl Parameters for Embedding {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint) {
        ckpt.insert(join(prefix, "weight"), self.weight.clone());
    }

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()> {
        let shape = [self.weight.nrows(), self.weight.ncols()];
        self.weight = ckpt.get(&join(prefix, "weight"), &shape)?;
        Ok(())
    }
}
