use ndarray::{Array2, Array3, ArrayView2};
use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{Result, VQAError};
use crate::nn::checkpoint::{join, Checkpoint, Parameters};
use crate::nn::{Dropout, Embedding, Gru};

#[derive(Debug, Clone, Copy)]
pub struct TextEncoderOptions {
    /// Return the last hidden state of the packed sequence instead of every output.
    pub use_hidden: bool,
    pub use_tanh: bool,
    /// Stop after the embedding step, no recurrent encoder is built.
    pub only_embed: bool,
}

impl Default for TextEncoderOptions {
    fn default() -> Self {
        Self {
            use_hidden: true,
            use_tanh: false,
            only_embed: false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum TextEncoding {
    /// `[batch, hidden]`
    Hidden(Array2<f32>),
    /// `[batch, len, hidden]`
    Sequence(Array3<f32>),
    /// `[batch, len, embedding]`
    Embedded(Array3<f32>),
}

impl TextEncoding {
    pub fn into_hidden(self) -> Result<Array2<f32>> {
        match self {
            TextEncoding::Hidden(h) => Ok(h),
            _ => Err(VQAError::Config(
                "text encoder is not configured to return a pooled hidden state".to_string(),
            )),
        }
    }
}

/// Question encoder: embedding lookup, dropout, optional tanh, single-layer GRU.
#[derive(Debug, Clone)]
pub struct TextEncoder {
    embed: Embedding,
    drop: Dropout,
    gru: Option<Gru>,
    options: TextEncoderOptions,
}

impl TextEncoder {
    /// `num_tokens` is the question vocabulary size; the embedding table gets one
    /// extra padding row at index `num_tokens`.
    pub fn new<R: Rng>(
        num_tokens: usize,
        embedding_features: usize,
        hidden_features: usize,
        drop: f32,
        options: TextEncoderOptions,
        rng: &mut R,
    ) -> Result<Self> {
        let drop = Dropout::new(drop)?;
        let embed = Embedding::new(num_tokens, embedding_features, rng);
        let gru = if options.only_embed {
            None
        } else {
            Some(Gru::new(embedding_features, hidden_features, rng))
        };
        Ok(TextEncoder {
            embed,
            drop,
            gru,
            options,
        })
    }

    pub fn embedding(&self) -> &Embedding {
        &self.embed
    }

    pub fn hidden_features(&self) -> Option<usize> {
        self.gru.as_ref().map(Gru::hidden_size)
    }

    /// Copies pretrained word vectors (`[num_tokens, embedding]`) into the table.
    pub fn load_embedding_init(&mut self, init: &ArrayView2<f32>) -> Result<()> {
        self.embed.load_pretrained(init)
    }

    /// Encodes a batch of index-encoded questions.
    ///
    /// `q_len` must be sorted in descending order when the pooled hidden state is
    /// requested; the collation step sorts batches that way. When `embedded` is given
    /// it replaces the lookup and `q` is only used for its shape.
    pub fn forward(
        &self,
        q: &ArrayView2<usize>,
        q_len: &[usize],
        embedded: Option<Array3<f32>>,
        mut rng: Option<&mut StdRng>,
    ) -> Result<TextEncoding> {
        let embedded = match embedded {
            Some(emb) => {
                let (batch, len) = q.dim();
                let expected = [batch, len, self.embed.features()];
                if emb.shape() != expected {
                    return Err(VQAError::shape_mismatch("precomputed embedding", &expected, emb.shape()));
                }
                emb
            }
            None => self.embed.forward(q)?,
        };
        let mut embedded = self.drop.forward(embedded, rng.as_deref_mut());
        if self.options.use_tanh {
            embedded.mapv_inplace(f32::tanh);
        }

        let gru = match &self.gru {
            Some(gru) => gru,
            None => return Ok(TextEncoding::Embedded(embedded)),
        };
        if self.options.use_hidden {
            Ok(TextEncoding::Hidden(gru.forward_packed(&embedded.view(), q_len)?))
        } else {
            Ok(TextEncoding::Sequence(gru.forward_sequence(&embedded.view())))
        }
    }
}

impl Parameters for TextEncoder {
    fn export(&self, prefix: &str, ckpt: &mut Checkpoint) {
        self.embed.export(&join(prefix, "embed"), ckpt);
        if let Some(gru) = &self.gru {
            gru.export(&join(prefix, "gru"), ckpt);
        }
    }

    fn import(&mut self, prefix: &str, ckpt: &Checkpoint) -> Result<()> {
        self.embed.import(&join(prefix, "embed"), ckpt)?;
        if let Some(gru) = &mut self.gru {
            let (gru_prefix, lstm_prefix) = (join(prefix, "gru"), join(prefix, "lstm"));
            // checkpoints of the reference model name the recurrent layer `lstm.*_l0`
            if !ckpt.contains(&join(&gru_prefix, "weight_ih"))
                && ckpt.contains(&join(&lstm_prefix, "weight_ih_l0"))
            {
                gru.import_layer(&lstm_prefix, "_l0", ckpt)?;
            } else {
                gru.import(&gru_prefix, ckpt)?;
            }
        }
        Ok(())
    }
}
