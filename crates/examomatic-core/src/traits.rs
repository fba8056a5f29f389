//! Collaborator trait definitions.
//!
//! The engine never talks to a transport directly. These async traits are
//! implemented by the `examomatic-client` crate (HTTP and in-memory).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::evaluator::parse_labels;
use crate::model::{ExamResultRecord, Question, QuestionId, TestBank, TestBankId};

// ---------------------------------------------------------------------------
// Question bank
// ---------------------------------------------------------------------------

/// Source of test banks and their questions.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// List every test bank with its question count and recent scores.
    async fn list_test_banks(&self) -> anyhow::Result<Vec<TestBank>>;

    /// Fetch the questions of a test bank, optionally shuffled.
    async fn list_questions(
        &self,
        test_bank_id: TestBankId,
        shuffle: bool,
    ) -> anyhow::Result<Vec<Question>>;

    /// Delete a test bank and its questions.
    async fn delete_test_bank(&self, test_bank_id: TestBankId) -> anyhow::Result<()>;

    /// Upload an import file.
    async fn import_questions(&self, file: ImportFile) -> anyhow::Result<ImportReceipt>;
}

/// A question file to import.
#[derive(Debug, Clone)]
pub struct ImportFile {
    /// Original file name; the service uses the extension to pick a format.
    pub file_name: String,
    pub contents: Vec<u8>,
}

/// Service acknowledgement for an import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReceipt {
    pub message: String,
}

// ---------------------------------------------------------------------------
// Answer checking
// ---------------------------------------------------------------------------

/// Server-side answer confirmation. Optional: local evaluation works without it.
#[async_trait]
pub trait AnswerChecker: Send + Sync {
    /// Check `selected` (comma-joined labels) against the stored answer.
    async fn check_answer(
        &self,
        question_id: QuestionId,
        selected: &str,
    ) -> anyhow::Result<AnswerCheck>;
}

/// Result of a server-side answer check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerCheck {
    pub correct: bool,
    /// Comma-joined correct labels.
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub explanation_images: Vec<String>,
}

impl AnswerCheck {
    pub fn correct_labels(&self) -> BTreeSet<String> {
        parse_labels(&self.correct_answer)
    }
}

// ---------------------------------------------------------------------------
// Result persistence
// ---------------------------------------------------------------------------

/// Persistence for finished exam results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record a finished attempt.
    async fn save_result(
        &self,
        test_bank_id: TestBankId,
        score: u32,
        total_questions: u32,
    ) -> anyhow::Result<SaveAck>;

    /// All recorded attempts for a test bank, in whatever order the store keeps them.
    async fn get_history(&self, test_bank_id: TestBankId) -> anyhow::Result<Vec<ExamResultRecord>>;
}

/// Acknowledgement for a saved result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveAck {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub message: String,
}
