use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use shellexpand::tilde;

use crate::error::{Result, VQAError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question_id: i64,
    pub image_id: i64,
    pub question: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsFile {
    pub questions: Vec<QuestionRecord>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub data_subtype: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub question_id: i64,
    pub image_id: i64,
    pub answers: Vec<AnswerRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotationsFile {
    pub annotations: Vec<AnnotationRecord>,
    #[serde(default)]
    pub data_type: Option<String>,
    #[serde(default)]
    pub data_subtype: Option<String>,
}

pub fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| VQAError::io(path, e))?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| VQAError::io(path, e))?;
    serde_json::to_writer(file, value)?;
    Ok(())
}

pub fn read_questions(path: impl AsRef<Path>) -> Result<QuestionsFile> {
    read_json(path)
}

pub fn read_annotations(path: impl AsRef<Path>) -> Result<AnnotationsFile> {
    read_json(path)
}

/// Expands a leading `~` in user-supplied paths.
pub fn expand_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref().to_string_lossy();
    PathBuf::from(tilde(&path).into_owned())
}

/// Verifies that questions and annotations describe the same items in the same order.
pub fn check_integrity(questions: &QuestionsFile, answers: &AnnotationsFile) -> Result<()> {
    if questions.questions.len() != answers.annotations.len() {
        return Err(VQAError::Integrity(format!(
            "{} questions but {} annotations",
            questions.questions.len(),
            answers.annotations.len()
        )));
    }
    for (i, (q, a)) in questions.questions.iter().zip(&answers.annotations).enumerate() {
        if q.question_id != a.question_id {
            return Err(VQAError::Integrity(format!(
                "questions not aligned with answers at position {}: question_id {} vs {}",
                i, q.question_id, a.question_id
            )));
        }
        if q.image_id != a.image_id {
            return Err(VQAError::Integrity(format!(
                "image id of question {} and answer don't match: {} vs {}",
                q.question_id, q.image_id, a.image_id
            )));
        }
    }
    if questions.data_type != answers.data_type {
        return Err(VQAError::Integrity(format!(
            "mismatched data types: {:?} vs {:?}",
            questions.data_type, answers.data_type
        )));
    }
    if questions.data_subtype != answers.data_subtype {
        return Err(VQAError::Integrity(format!(
            "mismatched data subtypes: {:?} vs {:?}",
            questions.data_subtype, answers.data_subtype
        )));
    }
    Ok(())
}
