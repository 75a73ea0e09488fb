use std::sync::Arc;

use crate::config::{ModelSetupConfig, ResourcesSetupConfig};
use crate::dataset::features::FeatureIndex;
use crate::dataset::vocab::Vocabulary;
use crate::error::Result;
use crate::model::Net;
use crate::utils::expand_path;
use crate::word_embedding::load_embedding_init;

/// Vocabulary, feature-store index and model, set up once and shared by every split.
#[derive(Debug)]
pub struct Resources {
    pub vocab: Arc<Vocabulary>,
    pub features: Option<Arc<FeatureIndex>>,
    pub model: Option<Net>,
}

impl Resources {
    pub fn new(config: ResourcesSetupConfig) -> Result<Self> {
        let vocab = Arc::new(Vocabulary::load(expand_path(&config.vocabulary_path))?);

        let features = match config.features_path {
            Some(path) => Some(Arc::new(FeatureIndex::open(expand_path(path))?)),
            None => None,
        };

        let model = match config.load_model {
            Some(config) => Some(setup_model(config, &vocab)?),
            None => None,
        };

        Ok(Resources { vocab, features, model })
    }
}

fn setup_model(config: ModelSetupConfig, vocab: &Vocabulary) -> Result<Net> {
    let mut net = Net::new(vocab.num_tokens(), config.net, config.seed)?;
    match (config.checkpoint, config.embedding_init) {
        (Some(checkpoint), _) => net.load_checkpoint(expand_path(checkpoint))?,
        (None, Some(init)) => {
            let init = load_embedding_init(expand_path(init))?;
            net.text_mut().load_embedding_init(&init.view())?;
        }
        (None, None) => log::warn!("no checkpoint given, model weights are randomly initialized"),
    }
    Ok(net)
}
