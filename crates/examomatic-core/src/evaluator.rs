//! Answer evaluation.
//!
//! Correctness is plain set equality over option labels: no partial credit,
//! and extra selections are penalized.

use std::collections::BTreeSet;

use crate::model::Question;

/// Returns `true` if the question expects more than one label.
///
/// A question without an answer key is treated as single-choice.
pub fn is_multiple_choice(question: &Question) -> bool {
    question
        .correct_answer
        .as_ref()
        .is_some_and(|key| key.len() > 1)
}

/// Returns `true` iff the user's labels equal the correct labels as sets.
///
/// An empty correct set never evaluates as correct.
pub fn evaluate(correct: &BTreeSet<String>, user: &BTreeSet<String>) -> bool {
    !correct.is_empty() && correct == user
}

/// Split a comma-joined label string into a normalized label set.
///
/// Labels are trimmed and upper-cased; empty segments are dropped and
/// duplicates collapse.
pub fn parse_labels(raw: &str) -> BTreeSet<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|label| !label.is_empty())
        .map(str::to_uppercase)
        .collect()
}

/// Join labels into the sorted, comma-joined wire form.
pub fn join_labels(labels: &BTreeSet<String>) -> String {
    labels.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}
