use ndarray::{s, Array1, Array2, Array3, ArrayView2, ArrayView3, Zip};
use rand::distributions::{Distribution, Uniform};
use rand::Rng;

use crate::error::{Result, VQAError};
use crate::nn::activation::sigmoid;
use crate::nn::checkpoint::{join, Checkpoint, Parameters};

/// Single-layer GRU, batch-first.
///
/// Gate rows are laid out `[r; z; n]`:
///
/// ```text
/// r  = sigmoid(W_ir x + b_ir + W_hr h + b_hr)
/// z  = sigmoid(W_iz x + b_iz + W_hz h + b_hz)
/// n  = tanh(W_in x + b_in + r * (W_hn h + b_hn))
/// h' = (1 - z) * n + z * h
/// ```
#[derive(Debug, Clone)]
pub struct Gru {
    weight_ih: Array2<f32>,
    weight_hh: Array2<f32>,
    bias_ih: Array1<f32>,
    bias_hh: Array1<f32>,
}

impl Gru {
    pub fn new<R: Rng>(input_size: usize, hidden_size: usize, rng: &mut R) -> Self {
        let bound = 1. / (hidden_size as f32).sqrt();
        let dist = Uniform::new_inclusive(-bound, bound);
        let gates = 3 * hidden_size;
        let weight_ih = Array2::from_shape_simple_fn((gates, input_size), || dist.sample(rng));
        let weight_hh = Array2::from_shape_simple_fn((gates, hidden_size), || dist.sample(rng));
        let bias_ih = Array1::from_shape_simple_fn(gates, || dist.sample(rng));
        let bias_hh = Array1::from_shape_simple_fn(gates, || dist.sample(rng));
        Gru { weight_ih, weight_hh, bias_ih, bias_hh }
    }

    pub fn input_size(&self) -> usize {
        self.weight_ih.ncols()
    }

    pub fn hidden_size(&self) -> usize {
        self.weight_hh.ncols()
    }

    fn step(&self, x: &ArrayView2<f32>, h: &ArrayView2<f32>) -> Array2<f32> {
        let hs = self.hidden_size();
        let gi = x.dot(&self.weight_ih.t()) + &self.bias_ih;
        let gh = h.dot(&self.weight_hh.t()) + &self.bias_hh;

        let r = (&gi.slice(s![.., ..hs]) + &gh.slice(s![.., ..hs])).mapv(sigmoid);
        let z = (&gi.slice(s![.., hs..2 * hs]) + &gh.slice(s![.., hs..2 * hs])).mapv(sigmoid);
        let n = (&gi.slice(s![.., 2 * hs..]) + &(&r * &gh.slice(s![.., 2 * hs..]))).mapv(f32::tanh);

        let mut out = Array2::zeros(h.raw_dim());
        Zip::from(&mut out)
            .and(&z)
            .and(&n)
            .and(h)
            .for_each(|o, &z, &n, &h_prev| *o = (1. - z) * n + z * h_prev);
        out
    }

    /// Runs every row for its own length only, as a packed sequence would, and
    /// returns the hidden state after each row's last valid step (`[batch, hidden]`).
    ///
    /// `lengths` must be sorted in descending order and lie in `1..=len`.
    pub fn forward_packed(&self, x: &ArrayView3<f32>, lengths: &[usize]) -> Result<Array2<f32>> {
        let (batch, len, _) = x.dim();
        validate_lengths(lengths, batch, len)?;
        let mut h = Array2::zeros((batch, self.hidden_size()));
        let max_len = lengths.first().copied().unwrap_or(0);
        for t in 0..max_len {
            // lengths are descending, so the rows still running form a prefix
            let active = lengths.iter().take_while(|&&l| l > t).count();
            let x_t = x.slice(s![..active, t, ..]);
            let h_new = self.step(&x_t, &h.slice(s![..active, ..]));
            h.slice_mut(s![..active, ..]).assign(&h_new);
        }
        Ok(h)
    }

    /// Runs all `len` steps for every row and returns all outputs (`[batch, len, hidden]`).
    pub fn forward_sequence(&self, x: &ArrayView3<f32>) -> Array3<f32> {
        let (batch, len, _) = x.dim();
        let mut h = Array2::zeros((batch, self.hidden_size()));
        let mut out = Array3::zeros((batch, len, self.hidden_size()));
        for t in 0..len {
            h = self.step(&x.slice(s![.., t, ..]), &h.view());
            out.slice_mut(s![.., t, ..]).assign(&h);
        }
        out
    }

    /// Imports weights named `prefix.weight_ih{suffix}` and so on, e.g. with suffix
    /// `_l0` for the first layer of a stacked recurrent module.
    pub fn import_layer(&mut self, prefix: &str, suffix: &str, ckpt: &Checkpoint) -> Result<()> {
        let gates = 3 * self.hidden_size();
        let name = |field: &str| join(prefix, &format!("{}{}", field, suffix));
        self.weight_ih = ckpt.get(&name("weight_ih"), &[gates, self.input_size()])?;
        self.weight_hh = ckpt.get(&name("weight_hh"), &[gates, self.hidden_size()])?;
        self.bias_ih = ckpt.get(&name("bias_ih"), &[gates])?;
        self.bias_hh = ckpt.get(&name("bias_hh"), &[gates])?;
        Ok(())
    }
}

pub fn validate_lengths(lengths: &[usize], batch: usize, len: usize) -> Result<()> {
    if lengths.len() != batch {
        return Err(VQAError::InvalidLengths(format!(
            "{} lengths for a batch of {}",
            lengths.len(),
            batch
        )));
    }
    if let Some(pos) = lengths.iter().position(|&l| l == 0 || l > len) {
        return Err(VQAError::InvalidLengths(format!(
            "length {} at position {} is outside 1..={}",
            lengths[pos], pos, len
        )));
    }
    if lengths.windows(2).any(|w| w[0] < w[1]) {
        return Err(VQAError::InvalidLengths(
            "lengths must be sorted in descending order".to_string(),
        ));
    }
    Ok(())
}

impl Parameters for Gru {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint) {
        ckpt.insert(join(prefix, "weight_ih"), self.weight_ih.clone());
        ckpt.insert(join(prefix, "weight_hh"), self.weight_hh.clone());
        ckpt.insert(join(prefix, "bias_ih"), self.bias_ih.clone());
        ckpt.insert(join(prefix, "bias_hh"), self.bias_hh.clone());
    }

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()> {
        self.import_layer(prefix, "", ckpt)
    }
}
