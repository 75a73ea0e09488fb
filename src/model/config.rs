use serde::{Deserialize, Serialize};

use crate::error::{Result, VQAError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    pub embedding_features: usize,
    pub question_features: usize,
    pub vision_features: usize,
    pub mid_features: usize,
    pub glimpses: usize,
    pub max_answers: usize,
    pub text_dropout: f32,
    pub attention_dropout: f32,
    pub classifier_dropout: f32,
    pub use_tanh: bool,
    // L2-normalize every region feature before attention
    pub v_feat_norm: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            embedding_features: 300,
            question_features: 1024,
            vision_features: 2048,
            mid_features: 1024,
            glimpses: 2,
            max_answers: 3000,
            text_dropout: 0.0,
            attention_dropout: 0.2,
            classifier_dropout: 0.5,
            use_tanh: false,
            v_feat_norm: false,
        }
    }
}

impl NetConfig {
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("embedding_features", self.embedding_features),
            ("question_features", self.question_features),
            ("vision_features", self.vision_features),
            ("mid_features", self.mid_features),
            ("glimpses", self.glimpses),
            ("max_answers", self.max_answers),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(VQAError::Config(format!("{} must be positive", name)));
        }
        let drops = [
            ("text_dropout", self.text_dropout),
            ("attention_dropout", self.attention_dropout),
            ("classifier_dropout", self.classifier_dropout),
        ];
        if let Some((name, p)) = drops.iter().find(|(_, p)| !(0. ..1.).contains(p)) {
            return Err(VQAError::Config(format!("{} = {} is not in [0, 1)", name, p)));
        }
        Ok(())
    }
}
