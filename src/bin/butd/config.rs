use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use butd_vqa::config::{DatasetConfig, LoaderConfig, ResourcesSetupConfig};

#[derive(Debug, Clone)]
#[derive(Serialize, Deserialize)]
pub struct SplitConfig {
    pub questions: PathBuf,
    // test splits come without annotations
    pub answers: Option<PathBuf>,
    pub adversarial_questions: Option<PathBuf>,
}

#[derive(Debug, Clone)]
#[derive(Serialize, Deserialize)]
pub struct ButdConfig {
    pub resources: ResourcesSetupConfig,
    pub split: SplitConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Where to write `[{question_id, answer}]`; overridden by `--output`.
    pub predictions_path: Option<PathBuf>,
}
