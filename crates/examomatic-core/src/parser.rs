//! Question import file parser.
//!
//! Reads the JSON import format accepted by the question-bank service and
//! validates it before upload.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{AnswerKey, Question, QuestionId};
use crate::placeholder::{unresolved, PlaceholderKind};

/// Option letters recognized in import files (`option_a` .. `option_m`).
pub const OPTION_LETTERS: &str = "ABCDEFGHIJKLM";

/// Intermediate JSON structure of an import file.
#[derive(Debug, Deserialize)]
struct JsonImportFile {
    #[serde(default)]
    exam_name: Option<String>,
    #[serde(default)]
    exam_code: Option<String>,
    #[serde(default)]
    questions: Vec<JsonQuestion>,
}

#[derive(Debug, Deserialize)]
struct JsonQuestion {
    question: String,
    #[serde(default)]
    correct_answer: Option<StringOrList>,
    #[serde(default)]
    explanation: Option<StringOrList>,
    #[serde(default)]
    question_images: Vec<String>,
    #[serde(default)]
    explanation_images: Vec<String>,
    /// `option_a` .. `option_m`, plus anything else we ignore.
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrList {
    One(String),
    Many(Vec<serde_json::Value>),
}

impl StringOrList {
    fn join(self, separator: &str) -> String {
        match self {
            StringOrList::One(s) => s,
            StringOrList::Many(items) => items
                .into_iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(separator),
        }
    }
}

/// A parsed import file.
#[derive(Debug, Clone)]
pub struct ImportSet {
    pub exam_name: String,
    pub exam_code: String,
    pub questions: Vec<ImportQuestion>,
}

/// One question from an import file.
#[derive(Debug, Clone)]
pub struct ImportQuestion {
    pub question: String,
    pub options: BTreeMap<String, String>,
    pub correct_answer: AnswerKey,
    pub explanation: Option<String>,
    pub question_images: Vec<String>,
    pub explanation_images: Vec<String>,
}

impl ImportQuestion {
    /// Materialize as a bank question with the given id.
    pub fn to_question(&self, id: QuestionId) -> Question {
        Question {
            id,
            question: self.question.clone(),
            options: self.options.clone(),
            option_images: BTreeMap::new(),
            correct_answer: Some(self.correct_answer.clone()),
            explanation: self.explanation.clone(),
            question_images: self.question_images.clone(),
            explanation_images: self.explanation_images.clone(),
        }
    }
}

/// Parse an import file from disk.
pub fn parse_import_file(path: &Path) -> Result<ImportSet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read import file: {}", path.display()))?;

    parse_import_str(&content, path)
}

/// Parse import JSON (useful for testing).
pub fn parse_import_str(content: &str, source_path: &Path) -> Result<ImportSet> {
    let parsed: JsonImportFile = serde_json::from_str(content)
        .with_context(|| format!("failed to parse JSON: {}", source_path.display()))?;

    let (Some(exam_name), Some(exam_code)) = (non_blank(parsed.exam_name), non_blank(parsed.exam_code))
    else {
        anyhow::bail!(
            "{}: import file must include exam_name, exam_code, and questions",
            source_path.display()
        );
    };
    if parsed.questions.is_empty() {
        anyhow::bail!(
            "{}: import file must include exam_name, exam_code, and questions",
            source_path.display()
        );
    }

    let questions = parsed
        .questions
        .into_iter()
        .enumerate()
        .map(|(i, q)| {
            convert_question(q)
                .with_context(|| format!("{}: question {}", source_path.display(), i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ImportSet {
        exam_name,
        exam_code,
        questions,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn convert_question(q: JsonQuestion) -> Result<ImportQuestion> {
    let raw_answer = q
        .correct_answer
        .context("'correct_answer' is null or missing")?
        .join(",");
    let correct_answer = AnswerKey::parse(&raw_answer).context("'correct_answer' is empty")?;

    let explanation = q
        .explanation
        .map(|e| e.join(" "))
        .filter(|e| !e.trim().is_empty());

    let options = OPTION_LETTERS
        .chars()
        .filter_map(|letter| {
            let key = format!("option_{}", letter.to_ascii_lowercase());
            match q.rest.get(&key) {
                Some(serde_json::Value::String(text)) => Some((letter.to_string(), text.clone())),
                Some(serde_json::Value::Null) | None => None,
                Some(other) => Some((letter.to_string(), other.to_string())),
            }
        })
        .collect();

    Ok(ImportQuestion {
        question: q.question,
        options,
        correct_answer,
        explanation,
        question_images: q.question_images,
        explanation_images: q.explanation_images,
    })
}

/// A warning from import validation.
#[derive(Debug, Clone)]
pub struct ImportWarning {
    /// 1-based question position (if applicable).
    pub question_number: Option<usize>,
    /// Warning message.
    pub message: String,
}

/// Validate an import set for common issues.
pub fn validate_import_set(set: &ImportSet) -> Vec<ImportWarning> {
    let mut warnings = Vec::new();

    for (i, q) in set.questions.iter().enumerate() {
        let mut warn = |message: String| {
            warnings.push(ImportWarning {
                question_number: Some(i + 1),
                message,
            });
        };

        if q.question.trim().is_empty() {
            warn("question text is empty".into());
        }

        if q.options.len() < 2 {
            warn(format!("only {} option(s) provided", q.options.len()));
        }

        for label in q.correct_answer.labels() {
            if !q.options.contains_key(label) {
                warn(format!("correct answer '{label}' is not among the options"));
            }
        }

        for placeholder in unresolved(&q.question, &q.question_images, PlaceholderKind::Question) {
            warn(format!("{placeholder} in question has no matching image"));
        }

        if let Some(explanation) = &q.explanation {
            for placeholder in
                unresolved(explanation, &q.explanation_images, PlaceholderKind::Explanation)
            {
                warn(format!("{placeholder} in explanation has no matching image"));
            }
        }
    }

    warnings
}
