pub mod answer;
pub mod config;
pub mod data;
pub mod features;
pub mod loader;
pub mod question;
pub mod vocab;
pub mod vqa;

pub use answer::{encode_answers, prepare_answers, process_punctuation};
pub use config::{DatasetConfig, LoaderConfig};
pub use data::{collate, Batch, Sample};
pub use features::{FeatureIndex, FeatureReader, RegionFeatures};
pub use loader::{BatchIter, DataLoader};
pub use question::{encode_question, prepare_question, EncodedQuestion};
pub use vocab::Vocabulary;
pub use vqa::{SplitPaths, VQADataset};
