use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Upper bound on encoded question length; the dataset uses
    /// `min(max_q_length, longest question)`.
    pub max_q_length: usize,
    pub normalize_box: bool,
    /// Keep only questions with at least one answer in the answer vocabulary.
    pub answerable_only: bool,
    /// Fraction of the answerable questions to keep.
    pub frac: f64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_q_length: 14,
            normalize_box: true,
            answerable_only: false,
            frac: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub batch_size: usize,
    /// 0 loads batches on the calling thread.
    pub num_workers: usize,
    /// Batches each worker may have loaded ahead of the consumer.
    pub prefetch_factor: usize,
    pub shuffle: bool,
    pub seed: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            num_workers: 4,
            prefetch_factor: 2,
            shuffle: false,
            seed: None,
        }
    }
}
