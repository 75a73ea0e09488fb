use ndarray::{ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::dataset::vocab::Vocabulary;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub question_id: i64,
    pub answer: String,
}

/// Index of the highest score; the first one on ties.
pub fn argmax(scores: &ArrayView1<f32>) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}

/// Decodes the arg-max answer of every row of `scores`.
pub fn answer_from_scores(scores: &ArrayView2<f32>, vocab: &Vocabulary) -> Vec<Option<String>> {
    scores
        .axis_iter(Axis(0))
        .map(|row| argmax(&row).and_then(|i| vocab.answer(i)).map(str::to_string))
        .collect()
}

/// VQA accuracy of predicting `answer` given annotator counts: `min(1, 0.3 * count)`.
pub fn vqa_accuracy(counts: &ArrayView1<f32>, answer: usize) -> f32 {
    counts.get(answer).map_or(0., |&c| (0.3 * c).min(1.))
}

/// Sum of per-question accuracies of the arg-max predictions.
pub fn batch_accuracy(scores: &ArrayView2<f32>, counts: &ArrayView2<f32>) -> f32 {
    scores
        .axis_iter(Axis(0))
        .zip(counts.axis_iter(Axis(0)))
        .map(|(s, c)| argmax(&s).map_or(0., |i| vqa_accuracy(&c, i)))
        .sum()
}
