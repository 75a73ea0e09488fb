pub mod error;
pub mod utils;
pub mod nn;
pub mod model;
pub mod dataset;
pub mod word_embedding;
pub mod eval;
pub mod resources;
pub mod config;

pub use error::{Result, VQAError};
pub use dataset::{Batch, DataLoader, SplitPaths, VQADataset, Vocabulary};
pub use model::{Net, NetInput};
pub use resources::Resources;
