//! Exam session state machine.
//!
//! A `Session` owns one attempt over an immutable question list: the current
//! index, the selection, the per-question submission flag, the running score,
//! and the wrong-answer log. Every transition is an explicit method call;
//! observers read immutable [`SessionSnapshot`]s.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::evaluator::{evaluate, is_multiple_choice};
use crate::model::{percentage, Question, QuestionId, TestBankId};
use crate::traits::AnswerCheck;

/// How per-question correctness is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvaluationMode {
    /// Correctness is computed locally from the loaded answer keys.
    #[default]
    Local,
    /// Correctness and explanation come from the answer-check service.
    #[serde(rename = "server")]
    ServerConfirmed,
}

/// Overall session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

/// Status of the current question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPhase {
    Unanswered,
    Submitted,
}

/// A question the user got wrong, kept for the end-of-exam review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrongAnswerRecord {
    /// 1-based position of the question in the exam.
    pub question_number: usize,
    pub question: String,
    pub user_answer: Vec<String>,
    pub correct_answer: Vec<String>,
    pub options: BTreeMap<String, String>,
}

impl WrongAnswerRecord {
    /// Render labels with their option text, e.g. `A) eu-west-1, C) eu-central-1`.
    pub fn describe(&self, labels: &[String]) -> String {
        if labels.is_empty() {
            return "(no answer)".to_string();
        }
        labels
            .iter()
            .map(|label| match self.options.get(label) {
                Some(text) => format!("{label}) {text}"),
                None => format!("{label}) ?"),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Final result of a completed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamOutcome {
    pub test_bank_id: TestBankId,
    pub score: u32,
    pub total: u32,
}

impl ExamOutcome {
    pub fn percentage(&self) -> u32 {
        percentage(self.score, self.total)
    }
}

/// What `next_question` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved on to the question at `index`.
    Next { index: usize },
    /// That was the last question.
    Completed(ExamOutcome),
}

/// Aggregated view of session progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    pub is_complete: bool,
}

/// Immutable copy of everything a presentation layer needs to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub attempt_id: Uuid,
    pub test_bank_id: TestBankId,
    pub status: SessionStatus,
    pub mode: EvaluationMode,
    pub index: usize,
    pub total: usize,
    pub question_id: Option<QuestionId>,
    pub phase: Option<QuestionPhase>,
    pub multiple_choice: bool,
    pub selection: Vec<String>,
    pub correct: Option<bool>,
    pub score: u32,
    pub wrong_answers: usize,
}

/// Receives state changes from the exam engine.
pub trait SessionObserver: Send + Sync {
    fn on_state_change(&self, snapshot: &SessionSnapshot);
    fn on_completed(&self, outcome: &ExamOutcome);
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_state_change(&self, _: &SessionSnapshot) {}
    fn on_completed(&self, _: &ExamOutcome) {}
}

/// One attempt over a fixed list of questions.
#[derive(Debug, Clone)]
pub struct Session {
    attempt_id: Uuid,
    test_bank_id: TestBankId,
    questions: Arc<[Question]>,
    mode: EvaluationMode,
    index: usize,
    selection: BTreeSet<String>,
    submitted: bool,
    score: u32,
    wrong_answers: Vec<WrongAnswerRecord>,
    /// Server check response, tagged with the question index it answers.
    check_response: Option<(usize, AnswerCheck)>,
}

impl Session {
    /// Start a session at the first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoQuestions` if `questions` is empty.
    pub fn new(
        test_bank_id: TestBankId,
        questions: Vec<Question>,
        mode: EvaluationMode,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        Ok(Self {
            attempt_id: Uuid::new_v4(),
            test_bank_id,
            questions: questions.into(),
            mode,
            index: 0,
            selection: BTreeSet::new(),
            submitted: false,
            score: 0,
            wrong_answers: Vec::new(),
            check_response: None,
        })
    }

    pub fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    pub fn test_bank_id(&self) -> TestBankId {
        self.test_bank_id
    }

    pub fn mode(&self) -> EvaluationMode {
        self.mode
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    /// Index of the current question; equals `total()` once completed.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn selection(&self) -> &BTreeSet<String> {
        &self.selection
    }

    pub fn wrong_answers(&self) -> &[WrongAnswerRecord] {
        &self.wrong_answers
    }

    pub fn status(&self) -> SessionStatus {
        if self.index >= self.questions.len() {
            SessionStatus::Completed
        } else {
            SessionStatus::InProgress
        }
    }

    pub fn is_complete(&self) -> bool {
        self.status() == SessionStatus::Completed
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.index)
    }

    pub fn phase(&self) -> Option<QuestionPhase> {
        self.current_question().map(|_| {
            if self.submitted {
                QuestionPhase::Submitted
            } else {
                QuestionPhase::Unanswered
            }
        })
    }

    /// Whether the current question accepts several labels.
    pub fn is_multiple_choice(&self) -> bool {
        self.current_question().is_some_and(is_multiple_choice)
    }

    /// The cached server response for the current question, if any.
    pub fn check_response(&self) -> Option<&AnswerCheck> {
        self.check_response
            .as_ref()
            .filter(|(index, _)| *index == self.index)
            .map(|(_, response)| response)
    }

    /// Toggle an option label on the current question.
    ///
    /// Multi-select questions flip membership; single-select questions
    /// replace the selection.
    ///
    /// # Errors
    ///
    /// Fails once the exam is completed, once the question is submitted,
    /// or when the label is not an option of the current question.
    pub fn toggle_answer(&mut self, label: &str) -> Result<&BTreeSet<String>, SessionError> {
        let index = self.index;
        let question = self.current_question().ok_or(SessionError::Completed)?;
        if self.submitted {
            return Err(SessionError::AlreadySubmitted { index });
        }

        let label = question
            .resolve_label(label)
            .map(str::to_string)
            .ok_or_else(|| SessionError::UnknownOption {
                index,
                label: label.to_string(),
            })?;

        if is_multiple_choice(question) {
            if !self.selection.remove(&label) {
                self.selection.insert(label);
            }
        } else {
            self.selection.clear();
            self.selection.insert(label);
        }

        Ok(&self.selection)
    }

    /// Mark the current question as submitted. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Completed` after the last question.
    pub fn check_answer(&mut self) -> Result<(), SessionError> {
        if self.is_complete() {
            return Err(SessionError::Completed);
        }
        self.submitted = true;
        Ok(())
    }

    /// Store a server check response for display.
    ///
    /// The response is dropped when it belongs to another attempt or another
    /// question, or when the question has not been submitted. Returns whether
    /// it was kept.
    pub fn cache_check_response(
        &mut self,
        attempt_id: Uuid,
        index: usize,
        response: AnswerCheck,
    ) -> bool {
        if attempt_id != self.attempt_id || index != self.index || !self.submitted {
            tracing::debug!(
                %attempt_id,
                index,
                current_index = self.index,
                "discarding stale answer check"
            );
            return false;
        }
        self.check_response = Some((index, response));
        true
    }

    /// Correctness of the current question, available once submitted.
    ///
    /// In server-confirmed mode a cached server response wins; otherwise
    /// the answer is evaluated locally.
    pub fn current_correctness(&self) -> Option<bool> {
        if !self.submitted {
            return None;
        }
        if self.mode == EvaluationMode::ServerConfirmed {
            if let Some(response) = self.check_response() {
                return Some(response.correct);
            }
        }
        self.local_correctness()
    }

    /// Correctness of the current question against the loaded answer key.
    ///
    /// This is what `next_question` scores, whatever the evaluation mode.
    pub fn local_correctness(&self) -> Option<bool> {
        if !self.submitted {
            return None;
        }
        let key = self.current_question()?.answer_key().ok()?;
        Some(evaluate(key.labels(), &self.selection))
    }

    /// Whether a cached server verdict contradicts the local answer key.
    pub fn verdicts_disagree(&self) -> bool {
        match (self.check_response(), self.local_correctness()) {
            (Some(response), Some(local)) => response.correct != local,
            _ => false,
        }
    }

    /// Score the current question and move on.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidQuestionState` without changing any
    /// state when the current question has no usable answer key, and
    /// `SessionError::Completed` after the last question.
    pub fn next_question(&mut self) -> Result<Advance, SessionError> {
        let index = self.index;
        let question = self.current_question().ok_or(SessionError::Completed)?;
        let key = question
            .answer_key()
            .map_err(|e| SessionError::InvalidQuestionState {
                index,
                reason: e.to_string(),
            })?;

        if evaluate(key.labels(), &self.selection) {
            self.score += 1;
        } else {
            let record = WrongAnswerRecord {
                question_number: index + 1,
                question: question.question.clone(),
                user_answer: self.selection.iter().cloned().collect(),
                correct_answer: key.labels().iter().cloned().collect(),
                options: question.options.clone(),
            };
            self.wrong_answers.push(record);
        }

        self.selection.clear();
        self.submitted = false;
        self.check_response = None;
        self.index += 1;

        if self.index < self.questions.len() {
            Ok(Advance::Next { index: self.index })
        } else {
            Ok(Advance::Completed(self.outcome()))
        }
    }

    /// Start over from the first question with the same question list.
    pub fn restart(&mut self) {
        self.attempt_id = Uuid::new_v4();
        self.index = 0;
        self.selection.clear();
        self.submitted = false;
        self.score = 0;
        self.wrong_answers.clear();
        self.check_response = None;
    }

    /// Score so far, as an outcome.
    pub fn outcome(&self) -> ExamOutcome {
        ExamOutcome {
            test_bank_id: self.test_bank_id,
            score: self.score,
            total: u32::try_from(self.questions.len()).unwrap_or(u32::MAX),
        }
    }

    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.total(),
            answered: self.index,
            remaining: self.total().saturating_sub(self.index),
            is_complete: self.is_complete(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            attempt_id: self.attempt_id,
            test_bank_id: self.test_bank_id,
            status: self.status(),
            mode: self.mode,
            index: self.index,
            total: self.total(),
            question_id: self.current_question().map(|q| q.id),
            phase: self.phase(),
            multiple_choice: self.is_multiple_choice(),
            selection: self.selection.iter().cloned().collect(),
            correct: self.current_correctness(),
            score: self.score,
            wrong_answers: self.wrong_answers.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerKey;

    fn question(id: u64, answer: Option<&str>) -> Question {
        Question {
            id,
            question: format!("Question {id}"),
            options: BTreeMap::from([
                ("A".to_string(), "alpha".to_string()),
                ("B".to_string(), "bravo".to_string()),
                ("C".to_string(), "charlie".to_string()),
            ]),
            option_images: BTreeMap::new(),
            correct_answer: answer.and_then(AnswerKey::parse),
            explanation: Some("because".into()),
            question_images: vec![],
            explanation_images: vec![],
        }
    }

    fn two_question_session() -> Session {
        Session::new(
            1,
            vec![question(10, Some("B")), question(11, Some("A,C"))],
            EvaluationMode::Local,
        )
        .unwrap()
    }

    fn selection(session: &Session) -> Vec<&str> {
        session.selection().iter().map(String::as_str).collect()
    }

    #[test]
    fn empty_question_list_is_rejected() {
        let err = Session::new(1, vec![], EvaluationMode::Local).unwrap_err();
        assert_eq!(err, SessionError::NoQuestions);
    }

    #[test]
    fn full_session_scores_and_logs_wrong_answers() {
        let mut session = two_question_session();
        assert_eq!(session.status(), SessionStatus::InProgress);

        session.toggle_answer("B").unwrap();
        session.check_answer().unwrap();
        assert_eq!(session.current_correctness(), Some(true));
        assert_eq!(session.next_question().unwrap(), Advance::Next { index: 1 });

        session.toggle_answer("A").unwrap();
        session.check_answer().unwrap();
        assert_eq!(session.current_correctness(), Some(false));
        let advance = session.next_question().unwrap();

        assert_eq!(
            advance,
            Advance::Completed(ExamOutcome {
                test_bank_id: 1,
                score: 1,
                total: 2
            })
        );
        assert_eq!(session.score(), 1);
        assert_eq!(session.status(), SessionStatus::Completed);
        assert_eq!(session.index(), 2);

        let wrong = session.wrong_answers();
        assert_eq!(wrong.len(), 1);
        assert_eq!(wrong[0].question_number, 2);
        assert_eq!(wrong[0].question, "Question 11");
        assert_eq!(wrong[0].user_answer, vec!["A"]);
        assert_eq!(wrong[0].correct_answer, vec!["A", "C"]);
        assert_eq!(
            wrong[0].describe(&wrong[0].correct_answer),
            "A) alpha, C) charlie"
        );
    }

    #[test]
    fn multi_select_toggle_twice_restores_selection() {
        let mut session =
            Session::new(1, vec![question(1, Some("A,C"))], EvaluationMode::Local).unwrap();
        session.toggle_answer("A").unwrap();
        let before = session.selection().clone();

        for label in ["B", "C", "A"] {
            session.toggle_answer(label).unwrap();
            session.toggle_answer(label).unwrap();
            assert_eq!(session.selection(), &before);
        }
    }

    #[test]
    fn single_select_replaces_selection() {
        let mut session = two_question_session();
        session.toggle_answer("A").unwrap();
        session.toggle_answer("c").unwrap();
        assert_eq!(selection(&session), vec!["C"]);
        session.toggle_answer("C").unwrap();
        assert_eq!(selection(&session), vec!["C"]);
    }

    #[test]
    fn toggling_after_submission_is_rejected() {
        let mut session = two_question_session();
        session.toggle_answer("B").unwrap();
        session.check_answer().unwrap();

        let err = session.toggle_answer("A").unwrap_err();
        assert_eq!(err, SessionError::AlreadySubmitted { index: 0 });
        assert_eq!(selection(&session), vec!["B"]);
    }

    #[test]
    fn unknown_option_is_rejected() {
        let mut session = two_question_session();
        let err = session.toggle_answer("Z").unwrap_err();
        assert!(matches!(err, SessionError::UnknownOption { index: 0, .. }));
        assert!(session.selection().is_empty());
    }

    #[test]
    fn missing_answer_key_blocks_advancing() {
        let mut session = Session::new(
            1,
            vec![question(1, None), question(2, Some("A"))],
            EvaluationMode::Local,
        )
        .unwrap();
        session.toggle_answer("A").unwrap();

        let err = session.next_question().unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidQuestionState { index: 0, .. }
        ));
        assert_eq!(session.index(), 0);
        assert_eq!(session.score(), 0);
        assert!(session.wrong_answers().is_empty());
        assert_eq!(selection(&session), vec!["A"]);
    }

    #[test]
    fn answer_key_with_unknown_label_blocks_advancing() {
        let mut session =
            Session::new(1, vec![question(1, Some("A,F"))], EvaluationMode::Local).unwrap();
        let err = session.next_question().unwrap_err();
        match err {
            SessionError::InvalidQuestionState { reason, .. } => {
                assert!(reason.contains("'F'"), "reason was: {reason}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn lower_case_option_labels_are_scored() {
        let mut q = question(1, Some("A,C"));
        q.options = BTreeMap::from([
            ("a".to_string(), "alpha".to_string()),
            ("b".to_string(), "bravo".to_string()),
            ("c".to_string(), "charlie".to_string()),
        ]);
        let mut session = Session::new(1, vec![q], EvaluationMode::Local).unwrap();

        session.toggle_answer("A").unwrap();
        session.toggle_answer("c").unwrap();
        assert_eq!(selection(&session), vec!["a", "c"]);
        session.check_answer().unwrap();
        assert_eq!(session.current_correctness(), Some(true));

        let advance = session.next_question().unwrap();
        assert!(matches!(advance, Advance::Completed(o) if o.score == 1));
        assert!(session.wrong_answers().is_empty());
    }

    #[test]
    fn empty_selection_counts_as_wrong() {
        let mut session =
            Session::new(1, vec![question(1, Some("B"))], EvaluationMode::Local).unwrap();
        session.next_question().unwrap();
        assert_eq!(session.score(), 0);
        assert_eq!(session.wrong_answers()[0].user_answer, Vec::<String>::new());
    }

    #[test]
    fn completed_session_rejects_further_transitions() {
        let mut session =
            Session::new(1, vec![question(1, Some("B"))], EvaluationMode::Local).unwrap();
        session.toggle_answer("B").unwrap();
        session.next_question().unwrap();

        assert_eq!(session.toggle_answer("A").unwrap_err(), SessionError::Completed);
        assert_eq!(session.check_answer().unwrap_err(), SessionError::Completed);
        assert_eq!(session.next_question().unwrap_err(), SessionError::Completed);
        assert!(session.current_question().is_none());
    }

    #[test]
    fn advancing_clears_selection_and_submission() {
        let mut session = two_question_session();
        session.toggle_answer("B").unwrap();
        session.check_answer().unwrap();
        session.next_question().unwrap();

        assert!(session.selection().is_empty());
        assert!(!session.is_submitted());
        assert_eq!(session.phase(), Some(QuestionPhase::Unanswered));
        assert!(session.is_multiple_choice());
    }

    #[test]
    fn restart_resets_everything() {
        let mut session = two_question_session();
        let first_attempt = session.attempt_id();
        session.toggle_answer("A").unwrap();
        session.next_question().unwrap();
        session.next_question().unwrap();
        assert!(session.is_complete());

        session.restart();
        assert_eq!(session.index(), 0);
        assert_eq!(session.score(), 0);
        assert!(session.wrong_answers().is_empty());
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_ne!(session.attempt_id(), first_attempt);
        assert_eq!(session.total(), 2);
    }

    #[test]
    fn server_response_is_cached_until_advance() {
        let mut session = Session::new(
            1,
            vec![question(1, Some("B")), question(2, Some("A"))],
            EvaluationMode::ServerConfirmed,
        )
        .unwrap();
        let attempt = session.attempt_id();
        session.toggle_answer("A").unwrap();
        session.check_answer().unwrap();

        let response = AnswerCheck {
            correct: false,
            correct_answer: "B".into(),
            explanation: Some("B is right".into()),
            explanation_images: vec![],
        };
        assert!(session.cache_check_response(attempt, 0, response));
        assert_eq!(session.current_correctness(), Some(false));
        assert_eq!(
            session.check_response().and_then(|r| r.explanation.as_deref()),
            Some("B is right")
        );

        assert!(!session.verdicts_disagree());

        session.next_question().unwrap();
        assert!(session.check_response().is_none());
    }

    #[test]
    fn server_verdict_can_contradict_local_score() {
        let mut session = Session::new(
            1,
            vec![question(1, Some("A,C"))],
            EvaluationMode::ServerConfirmed,
        )
        .unwrap();
        let attempt = session.attempt_id();
        session.toggle_answer("A").unwrap();
        session.toggle_answer("C").unwrap();
        session.check_answer().unwrap();

        let response = AnswerCheck {
            correct: false,
            correct_answer: "A,C".into(),
            explanation: None,
            explanation_images: vec![],
        };
        assert!(session.cache_check_response(attempt, 0, response));
        assert_eq!(session.current_correctness(), Some(false));
        assert_eq!(session.local_correctness(), Some(true));
        assert!(session.verdicts_disagree());

        let advance = session.next_question().unwrap();
        assert!(matches!(advance, Advance::Completed(o) if o.score == 1));
    }

    #[test]
    fn stale_server_responses_are_discarded() {
        let mut session = Session::new(
            1,
            vec![question(1, Some("B")), question(2, Some("A"))],
            EvaluationMode::ServerConfirmed,
        )
        .unwrap();
        let old_attempt = session.attempt_id();
        let response = AnswerCheck {
            correct: true,
            correct_answer: "B".into(),
            explanation: None,
            explanation_images: vec![],
        };

        // Not submitted yet.
        assert!(!session.cache_check_response(old_attempt, 0, response.clone()));

        session.check_answer().unwrap();
        // Wrong question.
        assert!(!session.cache_check_response(old_attempt, 1, response.clone()));

        session.restart();
        session.check_answer().unwrap();
        // Previous attempt.
        assert!(!session.cache_check_response(old_attempt, 0, response));
        assert!(session.check_response().is_none());
    }

    #[test]
    fn snapshot_reflects_state() {
        let mut session = two_question_session();
        session.toggle_answer("B").unwrap();
        session.check_answer().unwrap();

        let snap = session.snapshot();
        assert_eq!(snap.status, SessionStatus::InProgress);
        assert_eq!(snap.question_id, Some(10));
        assert_eq!(snap.phase, Some(QuestionPhase::Submitted));
        assert_eq!(snap.selection, vec!["B"]);
        assert_eq!(snap.correct, Some(true));
        assert!(!snap.multiple_choice);

        let progress = session.progress();
        assert_eq!(progress.remaining, 2);
        assert!(!progress.is_complete);
    }

    #[test]
    fn evaluation_mode_config_names() {
        let mode: EvaluationMode = serde_json::from_str("\"server\"").unwrap();
        assert_eq!(mode, EvaluationMode::ServerConfirmed);
        let mode: EvaluationMode = serde_json::from_str("\"local\"").unwrap();
        assert_eq!(mode, EvaluationMode::Local);
    }
}
