use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array1;

use crate::dataset::answer::{encode_answers, prepare_answers};
use crate::dataset::config::DatasetConfig;
use crate::dataset::data::Sample;
use crate::dataset::features::{FeatureIndex, FeatureReader};
use crate::dataset::question::{encode_question, prepare_question, EncodedQuestion};
use crate::dataset::vocab::Vocabulary;
use crate::error::{Result, VQAError};
use crate::utils::{check_integrity, read_annotations, read_questions, AnnotationsFile, QuestionsFile};

/// Files making up one split.
#[derive(Debug, Clone)]
pub struct SplitPaths {
    pub questions: PathBuf,
    /// `None` for splits without ground truth (test).
    pub answers: Option<PathBuf>,
    /// Rephrased questions aligned one-to-one with `questions`.
    pub adversarial_questions: Option<PathBuf>,
}

impl SplitPaths {
    pub fn new(questions: impl AsRef<Path>, answers: Option<&Path>) -> Self {
        SplitPaths {
            questions: questions.as_ref().to_path_buf(),
            answers: answers.map(Path::to_path_buf),
            adversarial_questions: None,
        }
    }
}

// Everything computed once at construction and shared by all worker views.
#[derive(Debug)]
struct EncodedSplit {
    config: DatasetConfig,
    vocab: Arc<Vocabulary>,
    question_ids: Vec<i64>,
    image_ids: Vec<i64>,
    question_strs: Vec<String>,
    questions: Vec<EncodedQuestion>,
    questions_adv: Option<Vec<EncodedQuestion>>,
    answers: Option<Vec<Array1<f32>>>,
    answerable: Option<Vec<usize>>,
    max_question_length: usize,
}

/// Open-ended VQA split joined with a region-feature store.
#[derive(Debug)]
pub struct VQADataset {
    split: Arc<EncodedSplit>,
    features: FeatureReader,
}

impl VQADataset {
    pub fn new(
        paths: &SplitPaths,
        features: Arc<FeatureIndex>,
        vocab: Arc<Vocabulary>,
        config: DatasetConfig,
    ) -> Result<Self> {
        let questions = read_questions(&paths.questions)?;
        let answers = paths.answers.as_ref().map(|p| read_annotations(p)).transpose()?;
        let adversarial = paths.adversarial_questions.as_ref().map(|p| read_questions(p)).transpose()?;
        Self::from_records(questions, answers, adversarial, features, vocab, config)
    }

    pub fn from_records(
        questions_json: QuestionsFile,
        answers_json: Option<AnnotationsFile>,
        adversarial_json: Option<QuestionsFile>,
        features: Arc<FeatureIndex>,
        vocab: Arc<Vocabulary>,
        config: DatasetConfig,
    ) -> Result<Self> {
        if let Some(answers_json) = &answers_json {
            check_integrity(&questions_json, answers_json)?;
        }
        if config.answerable_only && answers_json.is_none() {
            return Err(VQAError::Config("answerable_only requires an answer file".to_string()));
        }
        if !(0. ..=1.).contains(&config.frac) {
            return Err(VQAError::Config(format!("frac = {} is not in [0, 1]", config.frac)));
        }

        let question_ids = questions_json.questions.iter().map(|q| q.question_id).collect::<Vec<_>>();
        let image_ids = questions_json.questions.iter().map(|q| q.image_id).collect::<Vec<_>>();
        let question_strs = questions_json
            .questions
            .iter()
            .map(|q| q.question.clone())
            .collect::<Vec<_>>();
        let tokenized = question_strs.iter().map(|q| prepare_question(q)).collect::<Vec<_>>();

        let data_max_length = tokenized.iter().map(Vec::len).max().unwrap_or(0);
        let max_question_length = config.max_q_length.min(data_max_length);

        let questions_adv = match adversarial_json {
            Some(adv) => {
                if adv.questions.len() != question_ids.len() {
                    return Err(VQAError::Integrity(format!(
                        "{} adversarial questions for {} questions",
                        adv.questions.len(),
                        question_ids.len()
                    )));
                }
                Some(
                    adv.questions
                        .iter()
                        .map(|q| encode_question(&prepare_question(&q.question), &vocab, max_question_length))
                        .collect(),
                )
            }
            None => None,
        };
        let questions = tokenized
            .iter()
            .map(|q| encode_question(q, &vocab, max_question_length))
            .collect::<Vec<_>>();
        let answers = answers_json.map(|answers_json| {
            answers_json
                .annotations
                .iter()
                .map(|ann| {
                    let raw = ann.answers.iter().map(|a| a.answer.clone()).collect::<Vec<_>>();
                    encode_answers(&prepare_answers(&raw), &vocab)
                })
                .collect::<Vec<_>>()
        });

        let answerable = match (&answers, config.answerable_only) {
            (Some(answers), true) => {
                let mut answerable = find_answerable(answers);
                let keep = (answerable.len() as f64 * config.frac) as usize;
                answerable.truncate(keep);
                Some(answerable)
            }
            _ => None,
        };

        log::info!(
            "encoded {} questions (max length {}), {} usable",
            questions.len(),
            max_question_length,
            answerable.as_ref().map_or(questions.len(), Vec::len)
        );

        let split = EncodedSplit {
            config,
            vocab,
            question_ids,
            image_ids,
            question_strs,
            questions,
            questions_adv,
            answers,
            answerable,
            max_question_length,
        };
        Ok(VQADataset {
            split: Arc::new(split),
            features: FeatureReader::new(features),
        })
    }

    /// A view sharing all encoded data, with its own unopened feature-store handle.
    /// Every loader worker gets one.
    pub fn fork(&self) -> Self {
        VQADataset {
            split: self.split.clone(),
            features: self.features.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.split.answerable {
            Some(answerable) => answerable.len(),
            None => self.split.questions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_question_length(&self) -> usize {
        self.split.max_question_length
    }

    pub fn num_tokens(&self) -> usize {
        self.split.vocab.num_tokens()
    }

    pub fn vocab(&self) -> &Arc<Vocabulary> {
        &self.split.vocab
    }

    pub fn features(&self) -> &FeatureReader {
        &self.features
    }

    pub fn has_answers(&self) -> bool {
        self.split.answers.is_some()
    }

    pub fn encoded_question(&self, item: usize) -> Option<&EncodedQuestion> {
        self.split.questions.get(item)
    }

    pub fn encoded_answers(&self, item: usize) -> Option<&Array1<f32>> {
        self.split.answers.as_ref().and_then(|a| a.get(item))
    }

    /// Maps a dataset position to the index into the question file.
    pub fn item_index(&self, index: usize) -> Result<usize> {
        let item = match &self.split.answerable {
            Some(answerable) => answerable.get(index).copied(),
            None => Some(index).filter(|&i| i < self.split.questions.len()),
        };
        item.ok_or_else(|| VQAError::Config(format!("index {} out of range for {} samples", index, self.len())))
    }

    pub fn get(&self, index: usize) -> Result<Sample> {
        let split = &*self.split;
        let item = self.item_index(index)?;
        let q = split.questions[item].clone();
        let q_mask = q.mask();
        let image_id = split.image_ids[item];

        let mut region = self.features.load(image_id)?;
        if split.config.normalize_box {
            region.normalize_boxes();
        }

        Ok(Sample {
            v: region.features,
            b: region.boxes,
            v_mask: region.obj_mask,
            q,
            q_mask,
            q_adv: split.questions_adv.as_ref().map(|adv| adv[item].clone()),
            question: split.question_strs[item].clone(),
            a: split.answers.as_ref().map(|a| a[item].clone()),
            item,
            image_id,
            question_id: split.question_ids[item],
        })
    }
}

fn find_answerable(answers: &[Array1<f32>]) -> Vec<usize> {
    answers
        .iter()
        .enumerate()
        .filter(|(_, a)| a.iter().any(|&c| c != 0.))
        .map(|(i, _)| i)
        .collect()
}
