#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array1, Array3};
use ndarray_npy::write_npy;
use serde_json::json;
use tempfile::TempDir;

use butd_vqa::dataset::{DatasetConfig, FeatureIndex, SplitPaths, VQADataset, Vocabulary};
use butd_vqa::model::NetConfig;

pub const IMAGE_IDS: [i64; 3] = [10, 20, 30];
pub const WIDTHS: [i32; 3] = [100, 200, 50];
pub const HEIGHTS: [i32; 3] = [80, 100, 40];
pub const DIM: usize = 4;
pub const OBJECTS: usize = 3;

/// A small on-disk split: vocabulary, questions, annotations and a feature store.
pub struct Fixture {
    pub dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let fixture = Fixture { dir };
        fixture.write_vocab();
        fixture.write_questions();
        fixture.write_annotations();
        fixture.write_features();
        fixture
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn vocab_path(&self) -> PathBuf {
        self.path("vocab.json")
    }

    pub fn features_root(&self) -> PathBuf {
        self.path("features")
    }

    pub fn split_paths(&self) -> SplitPaths {
        SplitPaths::new(self.path("questions.json"), Some(self.path("annotations.json").as_path()))
    }

    pub fn vocab(&self) -> Arc<Vocabulary> {
        Arc::new(Vocabulary::load(self.vocab_path()).unwrap())
    }

    pub fn index(&self) -> Arc<FeatureIndex> {
        Arc::new(FeatureIndex::open(self.features_root()).unwrap())
    }

    pub fn dataset(&self, config: DatasetConfig) -> VQADataset {
        VQADataset::new(&self.split_paths(), self.index(), self.vocab(), config).unwrap()
    }

    fn write_vocab(&self) {
        let vocab = json!({
            "question": {
                "is": 0, "the": 1, "sky": 2, "blue": 3, "what": 4, "color": 5, "<unk>": 6
            },
            "answer": {
                "a0": 0, "a1": 1, "a2": 2, "yes": 3, "a4": 4,
                "a5": 5, "a6": 6, "no": 7, "1234": 8, "dont": 9
            }
        });
        write(&self.vocab_path(), &vocab);
    }

    fn write_questions(&self) {
        let questions = json!({
            "data_type": "mscoco",
            "data_subtype": "val2014",
            "questions": [
                {"question_id": 100, "image_id": 10, "question": "Is the sky blue?"},
                {"question_id": 101, "image_id": 20, "question": "What color is the sky?"},
                {"question_id": 102, "image_id": 30, "question": "Is it?"},
                {"question_id": 103, "image_id": 10, "question": "What?"}
            ]
        });
        write(&self.path("questions.json"), &questions);
    }

    fn write_annotations(&self) {
        let annotations = json!({
            "data_type": "mscoco",
            "data_subtype": "val2014",
            "annotations": [
                {"question_id": 100, "image_id": 10, "answers": [{"answer": "yes"}, {"answer": "yes"}, {"answer": "no"}]},
                {"question_id": 101, "image_id": 20, "answers": [{"answer": "Blue!"}, {"answer": "light blue"}]},
                {"question_id": 102, "image_id": 30, "answers": [{"answer": "don't"}]},
                {"question_id": 103, "image_id": 10, "answers": [{"answer": "1,234"}, {"answer": "no"}]}
            ]
        });
        write(&self.path("annotations.json"), &annotations);
    }

    fn write_features(&self) {
        let root = self.features_root();
        std::fs::create_dir_all(&root).unwrap();
        let n = IMAGE_IDS.len();
        let mut features = Array3::<f32>::from_shape_fn((n, DIM, OBJECTS), |(i, d, k)| {
            0.1 * ((i + 1) * (d + 1) * (k + 1)) as f32
        });
        // the last object slot of image 30 is padding
        for d in 0..DIM {
            features[[2, d, 2]] = 0.;
        }
        let boxes = Array3::<f32>::from_shape_fn((n, 4, OBJECTS), |(i, c, k)| {
            // (x1, y1) is half of (x2, y2), every box inside its image
            let extent = (if c % 2 == 0 { WIDTHS[i] } else { HEIGHTS[i] }) as f32;
            let corner = extent * (k as f32 + 1.) / (OBJECTS as f32 + 1.);
            if c < 2 {
                corner / 2.
            } else {
                corner
            }
        });
        write_npy(root.join("ids.npy"), &Array1::from(IMAGE_IDS.to_vec())).unwrap();
        write_npy(root.join("features.npy"), &features).unwrap();
        write_npy(root.join("boxes.npy"), &boxes).unwrap();
        write_npy(root.join("widths.npy"), &Array1::from(WIDTHS.to_vec())).unwrap();
        write_npy(root.join("heights.npy"), &Array1::from(HEIGHTS.to_vec())).unwrap();
    }
}

pub fn write(path: &Path, value: &serde_json::Value) {
    std::fs::write(path, serde_json::to_vec(value).unwrap()).unwrap();
}

/// A model small enough to match the fixture's feature dimension and vocabulary.
pub fn small_net_config() -> NetConfig {
    NetConfig {
        embedding_features: 4,
        question_features: 5,
        vision_features: DIM,
        mid_features: 6,
        glimpses: 2,
        max_answers: 10,
        ..NetConfig::default()
    }
}
