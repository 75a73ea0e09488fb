use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading VQA data or running the model.
#[derive(Debug, Error)]
pub enum VQAError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read npy array {name}: {source}")]
    ReadNpy {
        name: String,
        #[source]
        source: ndarray_npy::ReadNpyError,
    },

    #[error("failed to map npy array {name}: {source}")]
    ViewNpy {
        name: String,
        #[source]
        source: ndarray_npy::ViewNpyError,
    },

    #[error("failed to write npy array: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    #[error("failed to read checkpoint: {0}")]
    ReadNpz(#[from] ndarray_npy::ReadNpzError),

    #[error("failed to write checkpoint: {0}")]
    WriteNpz(#[from] ndarray_npy::WriteNpzError),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// Question and answer files disagree with each other.
    #[error("data integrity check failed: {0}")]
    Integrity(String),

    /// The feature store holds no row for this image id.
    #[error("image id {0} is not present in the region-feature store")]
    UnknownImage(i64),

    #[error("invalid question lengths: {0}")]
    InvalidLengths(String),

    #[error("shape mismatch in {context}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("checkpoint has no parameter named {0}")]
    MissingParameter(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, VQAError>;

impl VQAError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        VQAError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn shape_mismatch(context: &'static str, expected: &[usize], actual: &[usize]) -> Self {
        VQAError::ShapeMismatch {
            context,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}
