pub mod activation;
pub mod checkpoint;
pub mod dropout;
pub mod embedding;
pub mod fc;
pub mod gru;
pub mod linear;

pub use activation::Activation;
pub use checkpoint::{Checkpoint, Parameters};
pub use dropout::Dropout;
pub use embedding::Embedding;
pub use fc::FcNet;
pub use gru::Gru;
pub use linear::WeightNormLinear;

use ndarray::{Array, Dimension};

/// Returns `arr` in row-major layout, copying only when it is not already.
pub(crate) fn standard_layout<A: Clone, D: Dimension>(arr: Array<A, D>) -> Array<A, D> {
    if arr.is_standard_layout() {
        arr
    } else {
        arr.as_standard_layout().into_owned()
    }
}
