use ndarray::{Array1, Array2, ArrayView2};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::error::{Result, VQAError};
use crate::nn::checkpoint::{join, Checkpoint, Parameters};

/// Linear layer with weight normalization over the whole weight tensor.
///
/// The effective weight is `g * v / ||v||_F`, with a single scalar `g` rather than
/// one gain per output row. Weights are stored `[out_features, in_features]`.
#[derive(Debug, Clone)]
pub struct WeightNormLinear {
    weight_v: Array2<f32>,
    weight_g: f32,
    bias: Array1<f32>,
}

impl WeightNormLinear {
    /// Uniform `(-1/sqrt(in), 1/sqrt(in))` init for `v` and the bias, `g` set to `||v||_F`
    /// so the layer starts out equal to the plain linear layer.
    pub fn new<R: Rng>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let bound = 1. / (in_features as f32).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);
        let weight_v = Array2::from_shape_simple_fn((out_features, in_features), || dist.sample(rng));
        let bias = Array1::from_shape_simple_fn(out_features, || dist.sample(rng));
        let weight_g = frobenius(&weight_v.view());
        WeightNormLinear { weight_v, weight_g, bias }
    }

    pub fn from_parts(weight_v: Array2<f32>, weight_g: f32, bias: Array1<f32>) -> Result<Self> {
        if bias.len() != weight_v.nrows() {
            return Err(VQAError::shape_mismatch("weight-norm bias", &[weight_v.nrows()], bias.shape()));
        }
        Ok(WeightNormLinear { weight_v, weight_g, bias })
    }

    pub fn in_features(&self) -> usize {
        self.weight_v.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weight_v.nrows()
    }

    pub fn weight(&self) -> Array2<f32> {
        let norm = frobenius(&self.weight_v.view());
        let scale = if norm > 0. { self.weight_g / norm } else { 0. };
        &self.weight_v * scale
    }

    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    /// `x: [n, in] -> [n, out]`
    pub fn forward(&self, x: &ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.in_features() {
            return Err(VQAError::shape_mismatch(
                "linear input",
                &[x.nrows(), self.in_features()],
                x.shape(),
            ));
        }
        let mut out = x.dot(&self.weight().t());
        out += &self.bias;
        Ok(out)
    }
}

fn frobenius(w: &ArrayView2<f32>) -> f32 {
    w.iter().map(|v| v * v).sum::<f32>().sqrt()
}

impl Parameters for WeightNormLinear {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint) {
        ckpt.insert(join(prefix, "weight_v"), self.weight_v.clone());
        ckpt.insert(join(prefix, "weight_g"), ndarray::arr0(self.weight_g));
        ckpt.insert(join(prefix, "bias"), self.bias.clone());
    }

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()> {
        let shape = [self.out_features(), self.in_features()];
        self.weight_v = ckpt.get(&join(prefix, "weight_v"), &shape)?;
        self.weight_g = ckpt.get_scalar(&join(prefix, "weight_g"))?;
        self.bias = ckpt.get(&join(prefix, "bias"), &[self.out_features()])?;
        Ok(())
    }
}
