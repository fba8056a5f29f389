//! In-memory question bank for tests and offline use.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rand::rng;
use rand::seq::SliceRandom;

use examomatic_core::evaluator::{evaluate, join_labels, parse_labels};
use examomatic_core::model::{
    percentage, AnswerKey, ExamResultRecord, Question, QuestionId, TestBank, TestBankId,
};
use examomatic_core::parser::{parse_import_str, ImportSet};
use examomatic_core::traits::{
    AnswerCheck, AnswerChecker, ImportFile, ImportReceipt, QuestionBank, ResultStore, SaveAck,
};

use crate::error::ServiceError;

#[derive(Debug, Clone)]
struct StoredBank {
    name: String,
    exam_code: String,
    questions: Vec<Question>,
}

#[derive(Debug, Clone)]
struct StoredResult {
    test_bank_id: TestBankId,
    record: ExamResultRecord,
}

#[derive(Debug)]
struct State {
    banks: BTreeMap<TestBankId, StoredBank>,
    results: Vec<StoredResult>,
    next_bank_id: TestBankId,
    next_question_id: QuestionId,
    next_result_id: u64,
}

impl State {
    fn find_question(&self, question_id: QuestionId) -> Option<&Question> {
        self.banks
            .values()
            .flat_map(|bank| bank.questions.iter())
            .find(|q| q.id == question_id)
    }

    /// Results for a bank, most recent first.
    fn history(&self, test_bank_id: TestBankId) -> Vec<ExamResultRecord> {
        let mut records: Vec<_> = self
            .results
            .iter()
            .filter(|r| r.test_bank_id == test_bank_id)
            .map(|r| r.record.clone())
            .collect();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records
    }

    fn append_questions(&mut self, test_bank_id: TestBankId, questions: Vec<Question>) {
        let mut renumbered = Vec::with_capacity(questions.len());
        for mut question in questions {
            question.id = self.next_question_id;
            self.next_question_id += 1;
            renumbered.push(question);
        }
        if let Some(bank) = self.banks.get_mut(&test_bank_id) {
            bank.questions.extend(renumbered);
        }
    }
}

/// A question bank, answer checker, and result store held in memory.
///
/// Behaves like the REST service: shuffling reorders questions and option
/// texts while keeping the answer key pointing at the same texts.
pub struct InMemoryQuestionBank {
    state: Mutex<State>,
    failing_loads: AtomicU32,
    load_count: AtomicU32,
    check_count: AtomicU32,
    save_count: AtomicU32,
}

impl Default for InMemoryQuestionBank {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryQuestionBank {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                banks: BTreeMap::new(),
                results: Vec::new(),
                next_bank_id: 1,
                next_question_id: 1,
                next_result_id: 1,
            }),
            failing_loads: AtomicU32::new(0),
            load_count: AtomicU32::new(0),
            check_count: AtomicU32::new(0),
            save_count: AtomicU32::new(0),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a test bank. Question ids are reassigned.
    pub fn add_bank(&self, name: &str, exam_code: &str, questions: Vec<Question>) -> TestBankId {
        let mut state = self.state();
        let id = state.next_bank_id;
        state.next_bank_id += 1;
        state.banks.insert(
            id,
            StoredBank {
                name: name.to_string(),
                exam_code: exam_code.to_string(),
                questions: Vec::new(),
            },
        );
        state.append_questions(id, questions);
        id
    }

    /// Add a test bank from a parsed import file.
    pub fn add_import_set(&self, set: &ImportSet) -> TestBankId {
        let questions = set.questions.iter().map(|q| q.to_question(0)).collect();
        self.add_bank(&set.exam_name, &set.exam_code, questions)
    }

    /// Make the next `n` question loads fail with a network error.
    pub fn fail_next_loads(&self, n: u32) {
        self.failing_loads.store(n, Ordering::SeqCst);
    }

    /// Number of `list_questions` calls made.
    pub fn load_count(&self) -> u32 {
        self.load_count.load(Ordering::SeqCst)
    }

    /// Number of `check_answer` calls made.
    pub fn check_count(&self) -> u32 {
        self.check_count.load(Ordering::SeqCst)
    }

    /// Number of `save_result` calls made.
    pub fn save_count(&self) -> u32 {
        self.save_count.load(Ordering::SeqCst)
    }
}

/// Shuffle option texts and remap the answer key to follow them.
///
/// Labels stay in place (`A`, `B`, ...); the texts move between them.
fn shuffle_options(question: &mut Question) {
    let labels: Vec<String> = question.options.keys().cloned().collect();
    let mut moved = labels.clone();
    moved.shuffle(&mut rng());

    // old label -> new label
    let mapping: BTreeMap<&String, &String> = moved.iter().zip(labels.iter()).collect();

    let mut options = BTreeMap::new();
    let mut option_images = BTreeMap::new();
    for (old, new) in &mapping {
        if let Some(text) = question.options.get(*old) {
            options.insert((*new).clone(), text.clone());
        }
        if let Some(image) = question.option_images.get(*old) {
            option_images.insert((*new).clone(), image.clone());
        }
    }

    let remapped_key = question.correct_answer.as_ref().and_then(|key| {
        let labels: BTreeSet<String> = key
            .labels()
            .iter()
            .map(|l| mapping.get(l).map_or_else(|| l.clone(), |n| (*n).clone()))
            .collect();
        AnswerKey::new(labels)
    });

    question.options = options;
    question.option_images = option_images;
    question.correct_answer = remapped_key;
}

#[async_trait]
impl QuestionBank for InMemoryQuestionBank {
    async fn list_test_banks(&self) -> anyhow::Result<Vec<TestBank>> {
        let state = self.state();
        Ok(state
            .banks
            .iter()
            .map(|(id, bank)| {
                let recent_scores: Vec<Option<f64>> = state
                    .history(*id)
                    .iter()
                    .take(3)
                    .map(|r| Some(f64::from(percentage(r.score, r.total_questions))))
                    .collect();
                TestBank {
                    id: *id,
                    name: bank.name.clone(),
                    exam_code: bank.exam_code.clone(),
                    question_count: u32::try_from(bank.questions.len()).unwrap_or(u32::MAX),
                    last_score: recent_scores.first().copied().flatten(),
                    recent_scores,
                }
            })
            .collect())
    }

    async fn list_questions(
        &self,
        test_bank_id: TestBankId,
        shuffle: bool,
    ) -> anyhow::Result<Vec<Question>> {
        self.load_count.fetch_add(1, Ordering::SeqCst);

        let pending = self.failing_loads.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_loads.store(pending - 1, Ordering::SeqCst);
            return Err(ServiceError::NetworkError("simulated outage".into()).into());
        }

        let mut questions = self
            .state()
            .banks
            .get(&test_bank_id)
            .map(|bank| bank.questions.clone())
            .ok_or_else(|| ServiceError::NotFound("Test bank not found.".into()))?;

        if shuffle {
            questions.shuffle(&mut rng());
            questions.iter_mut().for_each(shuffle_options);
        }

        Ok(questions)
    }

    async fn delete_test_bank(&self, test_bank_id: TestBankId) -> anyhow::Result<()> {
        self.state()
            .banks
            .remove(&test_bank_id)
            .map(|_| ())
            .ok_or_else(|| ServiceError::NotFound("Test bank not found".into()).into())
    }

    async fn import_questions(&self, file: ImportFile) -> anyhow::Result<ImportReceipt> {
        if !file.file_name.ends_with(".json") {
            return Err(ServiceError::ApiError {
                status: 400,
                message: "Unsupported file type. Please upload a JSON file.".into(),
            }
            .into());
        }

        let set = std::str::from_utf8(&file.contents)
            .map_err(anyhow::Error::from)
            .and_then(|content| parse_import_str(content, Path::new(&file.file_name)))
            .map_err(|e| ServiceError::ApiError {
                status: 400,
                message: format!("Failed to process file: {e:#}"),
            })?;

        let mut state = self.state();
        let existing = state
            .banks
            .iter()
            .find(|(_, bank)| bank.name == set.exam_name || bank.exam_code == set.exam_code)
            .map(|(id, _)| *id);

        let bank_id = match existing {
            Some(id) => id,
            None => {
                let id = state.next_bank_id;
                state.next_bank_id += 1;
                state.banks.insert(
                    id,
                    StoredBank {
                        name: set.exam_name.clone(),
                        exam_code: set.exam_code.clone(),
                        questions: Vec::new(),
                    },
                );
                id
            }
        };

        let questions = set.questions.iter().map(|q| q.to_question(0)).collect();
        state.append_questions(bank_id, questions);

        Ok(ImportReceipt {
            message: format!(
                "Successfully imported questions into {} ({})",
                set.exam_name, set.exam_code
            ),
        })
    }
}

#[async_trait]
impl AnswerChecker for InMemoryQuestionBank {
    async fn check_answer(
        &self,
        question_id: QuestionId,
        selected: &str,
    ) -> anyhow::Result<AnswerCheck> {
        self.check_count.fetch_add(1, Ordering::SeqCst);

        let state = self.state();
        let question = state
            .find_question(question_id)
            .ok_or_else(|| ServiceError::NotFound("Question not found.".into()))?;
        let key = question.answer_key().map_err(|e| ServiceError::ApiError {
            status: 500,
            message: e.to_string(),
        })?;

        let selected: BTreeSet<String> = parse_labels(selected)
            .iter()
            .map(|label| {
                question
                    .resolve_label(label)
                    .map_or_else(|| label.clone(), str::to_string)
            })
            .collect();

        Ok(AnswerCheck {
            correct: evaluate(key.labels(), &selected),
            correct_answer: join_labels(key.labels()),
            explanation: question.explanation.clone(),
            explanation_images: question.explanation_images.clone(),
        })
    }
}

#[async_trait]
impl ResultStore for InMemoryQuestionBank {
    async fn save_result(
        &self,
        test_bank_id: TestBankId,
        score: u32,
        total_questions: u32,
    ) -> anyhow::Result<SaveAck> {
        self.save_count.fetch_add(1, Ordering::SeqCst);

        let mut state = self.state();
        let id = state.next_result_id;
        state.next_result_id += 1;
        state.results.push(StoredResult {
            test_bank_id,
            record: ExamResultRecord::new(score, total_questions, Utc::now()),
        });

        Ok(SaveAck {
            id: Some(id),
            message: "Result saved successfully".into(),
        })
    }

    async fn get_history(&self, test_bank_id: TestBankId) -> anyhow::Result<Vec<ExamResultRecord>> {
        Ok(self.state().history(test_bank_id))
    }
}
