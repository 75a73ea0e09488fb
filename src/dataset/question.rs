use ndarray::Array1;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dataset::vocab::Vocabulary;

static SPECIAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new("[^a-z0-9 ]").unwrap());

/// A question as fixed-length vocabulary indices plus its true length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedQuestion {
    pub indices: Array1<usize>,
    pub len: usize,
}

impl EncodedQuestion {
    /// 1.0 for the first `len` positions, 0.0 for padding.
    pub fn mask(&self) -> Array1<f32> {
        Array1::from_shape_fn(self.indices.len(), |i| if i < self.len { 1. } else { 0. })
    }
}

/// Tokenizes a raw question: lowercase, drop the last character (the question mark),
/// remove everything outside `[a-z0-9 ]`, split on single spaces.
///
/// The last character is dropped unconditionally, so a question missing its `?`
/// loses a letter, the same as the token ids the vocabulary was built from.
pub fn prepare_question(question: &str) -> Vec<String> {
    let mut question = question.to_lowercase();
    question.pop();
    let question = SPECIAL_CHARS.replace_all(&question, "");
    question.split(' ').map(str::to_string).collect()
}

/// Maps tokens to indices, unknown tokens to the OOV slot, and pads with the padding
/// index up to `max_length`. Tokens past `max_length` are dropped.
pub fn encode_question(tokens: &[String], vocab: &Vocabulary, max_length: usize) -> EncodedQuestion {
    let mut indices = Array1::from_elem(max_length, vocab.pad_index());
    for (slot, token) in indices.iter_mut().zip(tokens) {
        *slot = vocab.token_index(token).unwrap_or_else(|| vocab.oov_index());
    }
    EncodedQuestion {
        indices,
        len: tokens.len().min(max_length),
    }
}
