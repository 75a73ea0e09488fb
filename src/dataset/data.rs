use ndarray::{stack, Array1, Array2, Array3, Axis};

use crate::dataset::question::EncodedQuestion;
use crate::error::{Result, VQAError};

/// One question with its image, as produced by the dataset.
#[derive(Debug, Clone)]
pub struct Sample {
    /// `[objects, dim]`
    pub v: Array2<f32>,
    /// `[objects, 4]`
    pub b: Array2<f32>,
    /// `[objects]`
    pub v_mask: Array1<f32>,
    pub q: EncodedQuestion,
    /// `[max_q_len]`
    pub q_mask: Array1<f32>,
    pub q_adv: Option<EncodedQuestion>,
    /// Raw question string.
    pub question: String,
    /// Annotator counts per answer, absent for splits without answers.
    pub a: Option<Array1<f32>>,
    /// Position of the question in the question file. Batches are reordered by
    /// length, this restores the original order.
    pub item: usize,
    pub image_id: i64,
    pub question_id: i64,
}

/// Stacked samples, sorted by descending question length.
#[derive(Debug, Clone)]
pub struct Batch {
    pub v: Array3<f32>,
    pub b: Array3<f32>,
    pub v_mask: Array2<f32>,
    pub q: Array2<usize>,
    pub q_mask: Array2<f32>,
    pub q_len: Vec<usize>,
    pub q_adv: Option<(Array2<usize>, Vec<usize>)>,
    pub questions: Vec<String>,
    pub a: Option<Array2<f32>>,
    pub items: Vec<usize>,
    pub image_ids: Vec<i64>,
    pub question_ids: Vec<i64>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sorts samples by descending question length, as packed sequences need, and
/// stacks them into a batch.
pub fn collate(mut samples: Vec<Sample>) -> Result<Batch> {
    if samples.is_empty() {
        return Err(VQAError::Config("cannot collate an empty batch".to_string()));
    }
    samples.sort_by(|x, y| y.q.len.cmp(&x.q.len));

    let v = stack(Axis(0), &samples.iter().map(|s| s.v.view()).collect::<Vec<_>>())?;
    let b = stack(Axis(0), &samples.iter().map(|s| s.b.view()).collect::<Vec<_>>())?;
    let v_mask = stack(Axis(0), &samples.iter().map(|s| s.v_mask.view()).collect::<Vec<_>>())?;
    let q = stack(Axis(0), &samples.iter().map(|s| s.q.indices.view()).collect::<Vec<_>>())?;
    let q_mask = stack(Axis(0), &samples.iter().map(|s| s.q_mask.view()).collect::<Vec<_>>())?;

    let q_adv = if samples.iter().all(|s| s.q_adv.is_some()) {
        let encoded: Vec<&EncodedQuestion> = samples.iter().filter_map(|s| s.q_adv.as_ref()).collect();
        let indices = stack(Axis(0), &encoded.iter().map(|q| q.indices.view()).collect::<Vec<_>>())?;
        Some((indices, encoded.iter().map(|q| q.len).collect()))
    } else {
        None
    };
    let a = if samples.iter().all(|s| s.a.is_some()) {
        let answers: Vec<_> = samples.iter().filter_map(|s| s.a.as_ref().map(|a| a.view())).collect();
        Some(stack(Axis(0), &answers)?)
    } else {
        None
    };

    Ok(Batch {
        v,
        b,
        v_mask,
        q,
        q_mask,
        q_len: samples.iter().map(|s| s.q.len).collect(),
        q_adv,
        questions: samples.iter().map(|s| s.question.clone()).collect(),
        a,
        items: samples.iter().map(|s| s.item).collect(),
        image_ids: samples.iter().map(|s| s.image_id).collect(),
        question_ids: samples.iter().map(|s| s.question_id).collect(),
    })
}
