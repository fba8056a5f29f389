//! Core data model types for examomatic.
//!
//! Questions, test banks, and result records as delivered by the
//! question-bank service. The wire shapes follow the service's JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::evaluator::{join_labels, parse_labels};

/// Identifier of a question inside the question bank.
pub type QuestionId = u64;

/// Identifier of a test bank.
pub type TestBankId = u64;

/// Why a question's answer key cannot be used for scoring.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerKeyError {
    #[error("correct answer is missing")]
    Missing,
    #[error("correct answer references unknown option '{0}'")]
    UnknownLabel(String),
}

/// The set of option labels that make up a correct answer.
///
/// Never empty. Serialized as a sorted, comma-joined string (`"A,C"`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerKey(BTreeSet<String>);

impl AnswerKey {
    /// Build a key from a set of labels. Returns `None` for an empty set.
    pub fn new(labels: BTreeSet<String>) -> Option<Self> {
        if labels.is_empty() {
            None
        } else {
            Some(Self(labels))
        }
    }

    /// Parse a comma-joined label string such as `"A, c"`.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::new(parse_labels(raw))
    }

    pub fn labels(&self) -> &BTreeSet<String> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains(label)
    }
}

impl fmt::Display for AnswerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_labels(&self.0))
    }
}

impl Serialize for AnswerKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Absent, null, or blank answer strings all become `None`, so the
/// session can report the broken question instead of failing the whole load.
fn deserialize_answer_key<'de, D>(deserializer: D) -> Result<Option<AnswerKey>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(AnswerKey::parse))
}

/// A single exam question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    /// The question body; may contain `[image<N>]` placeholders.
    pub question: String,
    /// Option label → option text. Display order is label order.
    pub options: BTreeMap<String, String>,
    /// Option label → image reference, for options that carry a picture.
    #[serde(default)]
    pub option_images: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "deserialize_answer_key")]
    pub correct_answer: Option<AnswerKey>,
    /// Explanation body; may contain `[explanation_image<N>]` placeholders.
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub question_images: Vec<String>,
    #[serde(default)]
    pub explanation_images: Vec<String>,
}

impl Question {
    /// The answer key, with each label resolved to this question's option labels.
    pub fn answer_key(&self) -> Result<AnswerKey, AnswerKeyError> {
        let key = self.correct_answer.as_ref().ok_or(AnswerKeyError::Missing)?;
        let labels = key
            .labels()
            .iter()
            .map(|label| {
                self.resolve_label(label)
                    .map(str::to_string)
                    .ok_or_else(|| AnswerKeyError::UnknownLabel(label.clone()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;
        AnswerKey::new(labels).ok_or(AnswerKeyError::Missing)
    }

    /// The option label matching `raw`: exact first, then ignoring ASCII case.
    pub fn resolve_label(&self, raw: &str) -> Option<&str> {
        let raw = raw.trim();
        if let Some((label, _)) = self.options.get_key_value(raw) {
            return Some(label);
        }
        self.options
            .keys()
            .find(|label| label.eq_ignore_ascii_case(raw))
            .map(String::as_str)
    }

    /// Option text for a label, if the label exists.
    pub fn option_text(&self, label: &str) -> Option<&str> {
        self.options.get(label).map(String::as_str)
    }
}

/// Summary of a test bank as listed by the question-bank service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestBank {
    pub id: TestBankId,
    pub name: String,
    pub exam_code: String,
    #[serde(default)]
    pub question_count: u32,
    /// Recent score percentages, most recent first.
    #[serde(default, alias = "last_three_scores")]
    pub recent_scores: Vec<Option<f64>>,
    #[serde(default)]
    pub last_score: Option<f64>,
}

impl TestBank {
    /// The most recent score percentage, if the bank was ever attempted.
    pub fn latest_score(&self) -> Option<f64> {
        self.recent_scores
            .first()
            .copied()
            .flatten()
            .or(self.last_score)
    }
}

/// A persisted exam result, as returned by the history endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResultRecord {
    pub score: u32,
    pub total_questions: u32,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ExamResultRecord {
    pub fn new(score: u32, total_questions: u32, timestamp: DateTime<Utc>) -> Self {
        Self {
            score,
            total_questions,
            timestamp,
        }
    }

    /// Score as a whole-number percentage.
    pub fn percentage(&self) -> u32 {
        percentage(self.score, self.total_questions)
    }
}

/// `score / total * 100`, rounded to the nearest integer.
///
/// Returns 0 when `total` is 0 and never exceeds 100.
pub fn percentage(score: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (f64::from(score) / f64::from(total) * 100.0).round();
    pct.clamp(0.0, 100.0) as u32
}

/// Parse a timestamp emitted by the service.
///
/// Accepts RFC 3339 as well as the naive `YYYY-MM-DDTHH:MM:SS[.f]` and
/// `YYYY-MM-DD HH:MM:SS` forms produced by SQLite, which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("unrecognized timestamp: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn question_json(correct: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "id": 7,
            "question": "Which regions are in the EU?",
            "options": {"B": "us-east-1", "A": "eu-west-1", "C": "eu-central-1"},
            "correct_answer": correct,
            "explanation": "Both start with eu-"
        })
    }

    #[test]
    fn question_parses_comma_joined_answer() {
        let q: Question = serde_json::from_value(question_json("C, a".into())).unwrap();
        let key = q.answer_key().unwrap();
        assert_eq!(key.to_string(), "A,C");
        assert_eq!(key.len(), 2);
        let labels: Vec<_> = q.options.keys().cloned().collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
        assert!(q.question_images.is_empty());
    }

    #[test]
    fn blank_or_null_answer_is_missing() {
        let blank: Question = serde_json::from_value(question_json("  ".into())).unwrap();
        assert_eq!(blank.answer_key().unwrap_err(), AnswerKeyError::Missing);

        let null: Question =
            serde_json::from_value(question_json(serde_json::Value::Null)).unwrap();
        assert!(null.correct_answer.is_none());
    }

    #[test]
    fn answer_key_must_reference_existing_options() {
        let q: Question = serde_json::from_value(question_json("A,E".into())).unwrap();
        assert_eq!(
            q.answer_key().unwrap_err(),
            AnswerKeyError::UnknownLabel("E".into())
        );
    }

    #[test]
    fn answer_key_follows_option_label_case() {
        let q: Question = serde_json::from_value(serde_json::json!({
            "id": 3,
            "question": "Lower-case options",
            "options": {"a": "one", "b": "two", "c": "three"},
            "correct_answer": "b,C"
        }))
        .unwrap();

        let key = q.answer_key().unwrap();
        assert_eq!(key.to_string(), "b,c");
        assert_eq!(q.resolve_label("A"), Some("a"));
        assert_eq!(q.resolve_label(" c "), Some("c"));
        assert_eq!(q.resolve_label("d"), None);
    }

    #[test]
    fn percentage_rounds_to_nearest() {
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(5, 5), 100);
        assert_eq!(percentage(3, 0), 0);
    }

    #[test]
    fn timestamps_in_service_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-09T14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-09 14:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-09T14:30:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn result_record_from_history_payload() {
        let record: ExamResultRecord = serde_json::from_value(serde_json::json!({
            "score": 7,
            "total_questions": 9,
            "timestamp": "2024-03-09 14:30:00",
            "percentage": 77.77777
        }))
        .unwrap();
        assert_eq!(record.percentage(), 78);
    }

    #[test]
    fn test_bank_latest_score() {
        let bank: TestBank = serde_json::from_value(serde_json::json!({
            "id": 1,
            "name": "AWS SAA",
            "exam_code": "SAA-C03",
            "question_count": 65,
            "last_three_scores": [null, 80.0]
        }))
        .unwrap();
        assert_eq!(bank.latest_score(), None);

        let bank: TestBank = serde_json::from_value(serde_json::json!({
            "id": 2,
            "name": "AZ-900",
            "exam_code": "AZ-900",
            "last_score": 72.5
        }))
        .unwrap();
        assert_eq!(bank.latest_score(), Some(72.5));
    }
}
