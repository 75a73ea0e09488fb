use std::path::Path;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::data::Batch;
use crate::error::{Result, VQAError};
use crate::model::attention::{apply_attention, Attention};
use crate::model::classifier::Classifier;
use crate::model::config::NetConfig;
use crate::model::text::{TextEncoder, TextEncoderOptions};
use crate::nn::checkpoint::{join, Checkpoint, Parameters};

/// Everything the model consumes for one batch.
///
/// Boxes and both masks are part of the interface but the baseline model does not
/// read them; invalid objects are expected to be zero-filled in `v`.
#[derive(Debug, Clone)]
pub struct NetInput<'a> {
    /// `[batch, objects, vision_features]`
    pub v: ArrayView3<'a, f32>,
    /// `[batch, objects, 4]`
    pub b: ArrayView3<'a, f32>,
    /// `[batch, max_q_len]`
    pub q: ArrayView2<'a, usize>,
    /// `[batch, objects]`
    pub v_mask: ArrayView2<'a, f32>,
    /// `[batch, max_q_len]`
    pub q_mask: ArrayView2<'a, f32>,
    /// sorted in descending order
    pub q_len: &'a [usize],
    /// replaces the embedding lookup when present, `[batch, max_q_len, embedding_features]`
    pub embedded: Option<Array3<f32>>,
}

impl<'a> NetInput<'a> {
    pub fn from_batch(batch: &'a Batch) -> Self {
        NetInput {
            v: batch.v.view(),
            b: batch.b.view(),
            q: batch.q.view(),
            v_mask: batch.v_mask.view(),
            q_mask: batch.q_mask.view(),
            q_len: &batch.q_len,
            embedded: None,
        }
    }

    fn check_shapes(&self, vision_features: usize) -> Result<()> {
        let (batch, num_obj, dim) = self.v.dim();
        if dim != vision_features {
            return Err(VQAError::shape_mismatch("region features", &[batch, num_obj, vision_features], self.v.shape()));
        }
        if self.b.dim() != (batch, num_obj, 4) {
            return Err(VQAError::shape_mismatch("boxes", &[batch, num_obj, 4], self.b.shape()));
        }
        if self.v_mask.dim() != (batch, num_obj) {
            return Err(VQAError::shape_mismatch("object mask", &[batch, num_obj], self.v_mask.shape()));
        }
        let q_dim = self.q.dim();
        if q_dim.0 != batch {
            return Err(VQAError::shape_mismatch("question batch", &[batch, q_dim.1], self.q.shape()));
        }
        if self.q_mask.dim() != q_dim {
            return Err(VQAError::shape_mismatch("question mask", &[q_dim.0, q_dim.1], self.q_mask.shape()));
        }
        Ok(())
    }
}

/// Bottom-up/top-down attention network.
#[derive(Debug, Clone)]
pub struct Net {
    config: NetConfig,
    text: TextEncoder,
    attention: Attention,
    classifier: Classifier,
}

impl Net {
    pub fn new(num_tokens: usize, config: NetConfig, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::with_rng(num_tokens, config, &mut rng)
    }

    pub fn with_rng<R: Rng>(num_tokens: usize, config: NetConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let text = TextEncoder::new(
            num_tokens,
            config.embedding_features,
            config.question_features,
            config.text_dropout,
            TextEncoderOptions {
                use_tanh: config.use_tanh,
                ..TextEncoderOptions::default()
            },
            rng,
        )?;
        let attention = Attention::new(
            config.vision_features,
            config.question_features,
            config.mid_features,
            config.glimpses,
            config.attention_dropout,
            rng,
        )?;
        let classifier = Classifier::new(
            config.glimpses * config.vision_features,
            config.question_features,
            config.mid_features,
            config.max_answers,
            config.classifier_dropout,
            rng,
        )?;
        Ok(Net {
            config,
            text,
            attention,
            classifier,
        })
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn text(&self) -> &TextEncoder {
        &self.text
    }

    pub fn text_mut(&mut self) -> &mut TextEncoder {
        &mut self.text
    }

    /// Unnormalized answer scores, `[batch, max_answers]`.
    ///
    /// `rng = None` runs in eval mode; passing an rng enables dropout.
    pub fn forward(&self, input: NetInput<'_>, mut rng: Option<&mut StdRng>) -> Result<Array2<f32>> {
        input.check_shapes(self.config.vision_features)?;
        let q = self
            .text
            .forward(&input.q, input.q_len, input.embedded, rng.as_deref_mut())?
            .into_hidden()?;

        let mut v = input.v.to_owned();
        if self.config.v_feat_norm {
            l2_normalize_objects(&mut v);
        }

        let a = self.attention.forward(v.clone(), q.clone(), rng.as_deref_mut())?;
        let pooled = apply_attention(&v.view().permuted_axes([0, 2, 1]), &a.view())?;
        self.classifier.forward(pooled, q, rng)
    }

    pub fn forward_batch(&self, batch: &Batch, rng: Option<&mut StdRng>) -> Result<Array2<f32>> {
        self.forward(NetInput::from_batch(batch), rng)
    }

    pub fn load_checkpoint(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let ckpt = Checkpoint::load(path)?;
        self.import("", &ckpt)
    }

    pub fn save_checkpoint(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut ckpt = Checkpoint::new();
        self.export("", &mut ckpt);
        ckpt.save(path)
    }
}

fn l2_normalize_objects(v: &mut Array3<f32>) {
    for mut obj in v.lanes_mut(Axis(2)) {
        let norm = obj.iter().map(|x| x * x).sum::<f32>().sqrt() + 1e-12;
        obj.mapv_inplace(|x| x / norm);
    }
}

impl Parameters for Net {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint) {
        self.text.export(&join(prefix, "text"), ckpt);
        self.attention.export(&join(prefix, "attention"), ckpt);
        self.classifier.export(&join(prefix, "classifier"), ckpt);
    }

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()> {
        self.text.import(&join(prefix, "text"), ckpt)?;
        self.attention.import(&join(prefix, "attention"), ckpt)?;
        self.classifier.import(&join(prefix, "classifier"), ckpt)
    }
}
