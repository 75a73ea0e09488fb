use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use ndarray::{Array2, ArrayView1};
use ndarray_npy::{read_npy, write_npy};
use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::Normal;

use crate::dataset::vocab::Vocabulary;
use crate::error::{Result, VQAError};
use crate::utils::{read_json, write_json};

/// Pretrained word vectors, one row per token.
#[derive(Debug, Clone)]
pub struct WordVectors {
    index: HashMap<String, usize>,
    vectors: Array2<f32>,
}

impl WordVectors {
    pub fn new(tokens: Vec<String>, vectors: Array2<f32>) -> Result<Self> {
        if tokens.len() != vectors.nrows() {
            return Err(VQAError::shape_mismatch(
                "word vectors",
                &[tokens.len(), vectors.ncols()],
                vectors.shape(),
            ));
        }
        let index = tokens.into_iter().enumerate().map(|(i, t)| (t, i)).collect();
        Ok(WordVectors { index, vectors })
    }

    /// Reads a GloVe text file: a token followed by its space-separated values per line.
    /// Lines whose token is not valid UTF-8 are skipped; lines whose width differs from
    /// the first line are rejected.
    pub fn from_glove_txt(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| VQAError::io(path, e))?;
        let mut tokens = Vec::new();
        let mut values = Vec::new();
        let mut dim = None;
        let mut skipped = 0;
        for (lineno, line) in BufReader::new(file).split(b'\n').enumerate() {
            let line = line.map_err(|e| VQAError::io(path, e))?;
            let line = line.trim_ascii();
            if line.is_empty() {
                continue;
            }
            let mut entries = line.split(|&b| b == b' ');
            let token = match std::str::from_utf8(entries.next().unwrap_or_default()) {
                Ok(token) => token.to_string(),
                Err(_) => {
                    log::warn!("{}:{}: non-UTF8 token ignored", path.display(), lineno + 1);
                    skipped += 1;
                    continue;
                }
            };
            let row = entries
                .map(|x| String::from_utf8_lossy(x).parse::<f32>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| {
                    VQAError::Config(format!("{}:{}: {}", path.display(), lineno + 1, e))
                })?;
            let dim = *dim.get_or_insert(row.len());
            if row.len() != dim {
                return Err(VQAError::Config(format!(
                    "{}:{}: expected {} values, found {}",
                    path.display(),
                    lineno + 1,
                    dim,
                    row.len()
                )));
            }
            tokens.push(token);
            values.extend(row);
        }
        let dim = dim.unwrap_or(0);
        let vectors = Array2::from_shape_vec((tokens.len(), dim), values)?;
        log::info!(
            "read {} word vectors of dim {} from {} ({} skipped)",
            tokens.len(),
            dim,
            path.display(),
            skipped
        );
        Self::new(tokens, vectors)
    }

    /// Reads vectors from `<stem>.npy` and `<stem>.tokens.json` next to the text file
    /// when both exist, otherwise parses the text file and writes that cache.
    pub fn load_cached(txt_path: impl AsRef<Path>) -> Result<Self> {
        let txt_path = txt_path.as_ref();
        let (npy, tokens_json) = cache_paths(txt_path);
        if npy.is_file() && tokens_json.is_file() {
            let vectors: Array2<f32> = read_npy(&npy).map_err(|source| VQAError::ReadNpy {
                name: npy.display().to_string(),
                source,
            })?;
            let tokens: Vec<String> = read_json(&tokens_json)?;
            log::info!("loading word vectors from {}", npy.display());
            return Self::new(tokens, vectors);
        }
        let wv = Self::from_glove_txt(txt_path)?;
        write_npy(&npy, &wv.vectors)?;
        write_json(&tokens_json, &wv.tokens())?;
        Ok(wv)
    }

    pub fn dim(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, token: &str) -> Option<ArrayView1<'_, f32>> {
        self.index.get(token).map(|&i| self.vectors.row(i))
    }

    fn tokens(&self) -> Vec<&str> {
        let mut tokens = vec![""; self.len()];
        for (token, &i) in &self.index {
            tokens[i] = token.as_str();
        }
        tokens
    }
}

fn cache_paths(txt_path: &Path) -> (PathBuf, PathBuf) {
    (txt_path.with_extension("npy"), txt_path.with_extension("tokens.json"))
}

/// Embedding rows for a list of names, plus the names no vector was found for.
#[derive(Debug, Clone)]
pub struct EmbeddingInit {
    pub vectors: Array2<f32>,
    pub failed_tokens: Vec<String>,
}

impl EmbeddingInit {
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_npy(path, &self.vectors)?;
        Ok(())
    }
}

/// Builds one row per name: the exact vector if present, else the vector of the
/// longest space-separated word (first one on ties). Rows without a match keep
/// their standard-normal initialization.
pub fn build_embedding_init<R: Rng, S: AsRef<str>>(names: &[S], wv: &WordVectors, rng: &mut R) -> EmbeddingInit {
    let normal = Normal::new(0., 1.).expect("standard normal parameters are valid");
    let mut vectors = Array2::from_shape_simple_fn((names.len(), wv.dim()), || normal.sample(rng) as f32);
    let mut failed_tokens = Vec::new();

    for (mut row, name) in vectors.rows_mut().into_iter().zip(names) {
        let name = name.as_ref();
        match wv.get(name).or_else(|| wv.get(longest_word(name))) {
            Some(vector) => row.assign(&vector),
            None => failed_tokens.push(name.to_string()),
        }
    }
    if !failed_tokens.is_empty() {
        log::warn!("no word vector for {} of {} tokens", failed_tokens.len(), names.len());
    }
    EmbeddingInit { vectors, failed_tokens }
}

fn longest_word(name: &str) -> &str {
    name.split(' ')
        .fold("", |longest, w| {
            if w.chars().count() > longest.chars().count() {
                w
            } else {
                longest
            }
        })
}

/// Embedding init for the question vocabulary, in token-index order.
pub fn question_embedding_init<R: Rng>(vocab: &Vocabulary, wv: &WordVectors, rng: &mut R) -> EmbeddingInit {
    build_embedding_init(&vocab.tokens(), wv, rng)
}

pub fn load_embedding_init(path: impl AsRef<Path>) -> Result<Array2<f32>> {
    let path = path.as_ref();
    read_npy(path).map_err(|source| VQAError::ReadNpy {
        name: path.display().to_string(),
        source,
    })
}
