use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VQAError};
use crate::utils::read_json;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VocabularyFile {
    question: HashMap<String, usize>,
    answer: HashMap<String, usize>,
}

/// Question-token and answer vocabularies, immutable once built.
///
/// Question indices run over `0..num_tokens`; `num_tokens - 1` doubles as the
/// out-of-vocabulary slot and `num_tokens` is the padding index.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_index: HashMap<String, usize>,
    answer_to_index: HashMap<String, usize>,
    index_to_answer: Vec<String>,
}

impl Vocabulary {
    pub fn new(token_to_index: HashMap<String, usize>, answer_to_index: HashMap<String, usize>) -> Result<Self> {
        if token_to_index.is_empty() {
            return Err(VQAError::Config("question vocabulary is empty".to_string()));
        }
        check_range("question", &token_to_index, token_to_index.len() + 1)?;
        check_range("answer", &answer_to_index, answer_to_index.len())?;

        let mut index_to_answer = vec![String::new(); answer_to_index.len()];
        for (answer, &idx) in &answer_to_index {
            index_to_answer[idx] = answer.clone();
        }
        Ok(Vocabulary {
            token_to_index,
            answer_to_index,
            index_to_answer,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file: VocabularyFile = read_json(path.as_ref())?;
        let vocab = Self::new(file.question, file.answer)?;
        log::info!(
            "loaded vocabulary from {}: {} question tokens, {} answers",
            path.as_ref().display(),
            vocab.num_tokens(),
            vocab.num_answers()
        );
        Ok(vocab)
    }

    pub fn num_tokens(&self) -> usize {
        self.token_to_index.len()
    }

    pub fn num_answers(&self) -> usize {
        self.answer_to_index.len()
    }

    pub fn oov_index(&self) -> usize {
        self.num_tokens() - 1
    }

    pub fn pad_index(&self) -> usize {
        self.num_tokens()
    }

    pub fn token_index(&self, token: &str) -> Option<usize> {
        self.token_to_index.get(token).copied()
    }

    pub fn answer_index(&self, answer: &str) -> Option<usize> {
        self.answer_to_index.get(answer).copied()
    }

    pub fn answer(&self, index: usize) -> Option<&str> {
        self.index_to_answer.get(index).map(String::as_str)
    }

    /// Question tokens ordered by their index.
    pub fn tokens(&self) -> Vec<&str> {
        let mut tokens = vec![""; self.num_tokens() + 1];
        for (token, &idx) in &self.token_to_index {
            tokens[idx] = token.as_str();
        }
        tokens.truncate(self.num_tokens());
        tokens
    }
}

// Question indices may reach `len` (the embedding table has one extra row), answer
// indices must address a slot of the `len`-sized answer vector.
fn check_range(name: &str, map: &HashMap<String, usize>, limit: usize) -> Result<()> {
    match map.iter().find(|(_, &idx)| idx >= limit) {
        Some((key, idx)) => Err(VQAError::Config(format!(
            "{} vocabulary index {} for {:?} is out of range 0..{}",
            name, idx, key, limit
        ))),
        None => Ok(()),
    }
}
