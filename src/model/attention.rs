use ndarray::{Array2, Array3, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{Result, VQAError};
use crate::nn::checkpoint::{join, Checkpoint, Parameters};
use crate::nn::{Activation, FcNet};

/// Question-guided attention over region slots, one distribution per glimpse.
#[derive(Debug, Clone)]
pub struct Attention {
    lin_v: FcNet,
    lin_q: FcNet,
    lin: FcNet,
}

impl Attention {
    pub fn new<R: Rng>(
        v_features: usize,
        q_features: usize,
        mid_features: usize,
        glimpses: usize,
        drop: f32,
        rng: &mut R,
    ) -> Result<Self> {
        Ok(Attention {
            lin_v: FcNet::new(v_features, mid_features, Some(Activation::Relu), 0., rng)?,
            lin_q: FcNet::new(q_features, mid_features, Some(Activation::Relu), 0., rng)?,
            lin: FcNet::new(mid_features, glimpses, None, drop, rng)?,
        })
    }

    pub fn glimpses(&self) -> usize {
        self.lin.out_features()
    }

    /// `v: [batch, objects, v_features]`, `q: [batch, q_features]` -> `[batch, objects, glimpses]`.
    ///
    /// The softmax runs over every object slot, padding included. Padding slots carry
    /// all-zero features so whatever weight they receive pools to nothing.
    pub fn forward(&self, v: Array3<f32>, q: Array2<f32>, mut rng: Option<&mut StdRng>) -> Result<Array3<f32>> {
        let (batch, num_obj, _) = v.dim();
        if q.nrows() != batch {
            return Err(VQAError::shape_mismatch("attention question batch", &[batch, q.ncols()], q.shape()));
        }
        let v = self.lin_v.forward3(v, rng.as_deref_mut())?;
        let q = self.lin_q.forward(q, rng.as_deref_mut())?;

        let x = v * &q.insert_axis(Axis(1));
        let mut x = self.lin.forward3(x, rng)?;
        debug_assert_eq!(x.dim().1, num_obj);
        softmax_axis1(&mut x);
        Ok(x)
    }
}

fn softmax_axis1(x: &mut Array3<f32>) {
    for mut lane in x.lanes_mut(Axis(1)) {
        let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
        lane.mapv_inplace(|v| (v - max).exp());
        let sum = lane.sum();
        lane.mapv_inplace(|v| v / sum);
    }
}

/// Pools region features with attention weights.
///
/// `input: [batch, dim, objects]`, `attention: [batch, objects, glimpses]` ->
/// `[batch, dim * glimpses]`, flattened row-major over `(dim, glimpses)`.
pub fn apply_attention(input: &ArrayView3<f32>, attention: &ArrayView3<f32>) -> Result<Array2<f32>> {
    let (batch, dim, num_obj) = input.dim();
    let (a_batch, a_obj, glimpses) = attention.dim();
    if a_batch != batch || a_obj != num_obj {
        return Err(VQAError::shape_mismatch(
            "attention weights",
            &[batch, num_obj, glimpses],
            attention.shape(),
        ));
    }
    let mut out = Array2::zeros((batch, dim * glimpses));
    for (mut row, (x, a)) in out
        .outer_iter_mut()
        .zip(input.outer_iter().zip(attention.outer_iter()))
    {
        let pooled = x.dot(&a);
        row.iter_mut().zip(pooled.iter()).for_each(|(o, &p)| *o = p);
    }
    Ok(out)
}

impl Parameters for Attention {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint) {
        self.lin_v.export(&join(prefix, "lin_v"), ckpt);
        self.lin_q.export(&join(prefix, "lin_q"), ckpt);
        self.lin.export(&join(prefix, "lin"), ckpt);
    }

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()> {
        self.lin_v.import(&join(prefix, "lin_v"), ckpt)?;
        self.lin_q.import(&join(prefix, "lin_q"), ckpt)?;
        self.lin.import(&join(prefix, "lin"), ckpt)
    }
}
