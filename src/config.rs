use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use crate::dataset::config::{DatasetConfig, LoaderConfig};
pub use crate::model::config::NetConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSetupConfig {
    #[serde(default)]
    pub net: NetConfig,
    /// `.npz` weights; the model keeps its random init when absent.
    pub checkpoint: Option<PathBuf>,
    /// `.npy` embedding init for the question vocabulary, ignored when a checkpoint is given.
    pub embedding_init: Option<PathBuf>,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesSetupConfig {
    pub vocabulary_path: PathBuf,
    pub features_path: Option<PathBuf>,
    pub load_model: Option<ModelSetupConfig>,
}
