use ndarray::Array1;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dataset::vocab::Vocabulary;

// Punctuation handled by the VQA evaluation normalization. The period is treated
// separately and only stripped once some other punctuation triggered normalization.
const PUNCTUATION: &[char] = &[
    ';', '/', '[', ']', '"', '{', '}', '(', ')', '=', '+', '\\', '_', '-', '>', '<', '@', '`', ',', '?', '!',
];

static COMMA_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9],[0-9]").unwrap());

fn is_punctuation(c: char) -> bool {
    PUNCTUATION.contains(&c)
}

/// Normalizes a human answer the way VQA evaluation does.
///
/// Answers without punctuation are returned untouched. Otherwise:
/// punctuation next to a space is removed, every comma is removed when a
/// digit-comma-digit pattern is present, remaining punctuation becomes a space,
/// apostrophes are removed, periods not followed by a digit are removed, and the
/// result is trimmed. Applying it twice gives the same result as applying it once.
pub fn process_punctuation(answer: &str) -> String {
    if !answer.chars().any(|c| is_punctuation(c) || c == '\'') {
        return answer.to_string();
    }

    let chars: Vec<char> = answer.chars().collect();
    let mut s: String = chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| {
            let touches_space = (i > 0 && chars[i - 1] == ' ') || chars.get(i + 1) == Some(&' ');
            !(is_punctuation(c) && touches_space)
        })
        .map(|(_, &c)| c)
        .collect();

    if COMMA_STRIP.is_match(&s) {
        s = s.replace(',', "");
    }

    let s: String = s
        .chars()
        .filter(|&c| c != '\'')
        .map(|c| if is_punctuation(c) { ' ' } else { c })
        .collect();

    strip_periods(&s).trim().to_string()
}

fn strip_periods(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| c != '.' || chars.get(i + 1).map_or(false, |n| n.is_ascii_digit()))
        .map(|(_, &c)| c)
        .collect()
}

pub fn prepare_answers(answers: &[String]) -> Vec<String> {
    answers.iter().map(|a| process_punctuation(a)).collect()
}

/// Counts how many annotators gave each in-vocabulary answer. Unknown answers are
/// skipped.
pub fn encode_answers(answers: &[String], vocab: &Vocabulary) -> Array1<f32> {
    let mut answer_vec = Array1::zeros(vocab.num_answers());
    for index in answers.iter().filter_map(|a| vocab.answer_index(a)) {
        answer_vec[index] += 1.;
    }
    answer_vec
}
