//! Async exam engine.
//!
//! Wraps a [`Session`] with the `Loading / Failed / Ready` lifecycle and the
//! collaborator calls around it: loading questions, optional server-side
//! answer checks, the fire-and-forget result save, and history loading.

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::EngineError;
use crate::evaluator::join_labels;
use crate::history::{to_series, SeriesOrder, SeriesPoint};
use crate::model::{ExamResultRecord, TestBankId};
use crate::session::{
    Advance, EvaluationMode, ExamOutcome, NoopObserver, Session, SessionObserver,
};
use crate::traits::{AnswerChecker, QuestionBank, ResultStore};

/// Configuration for the exam engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How per-question correctness is confirmed.
    pub mode: EvaluationMode,
    /// Ask the question bank to shuffle questions and options.
    pub shuffle: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EvaluationMode::Local,
            shuffle: true,
        }
    }
}

/// Lifecycle of one exam screen.
#[derive(Debug)]
pub enum ExamState {
    Loading,
    Failed { message: String },
    Ready(Session),
}

/// Drives one exam over a test bank.
pub struct ExamEngine {
    test_bank_id: TestBankId,
    bank: Arc<dyn QuestionBank>,
    store: Arc<dyn ResultStore>,
    checker: Option<Arc<dyn AnswerChecker>>,
    observer: Arc<dyn SessionObserver>,
    config: EngineConfig,
    state: ExamState,
    pending_saves: Vec<JoinHandle<()>>,
}

impl ExamEngine {
    pub fn new(
        test_bank_id: TestBankId,
        bank: Arc<dyn QuestionBank>,
        store: Arc<dyn ResultStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            test_bank_id,
            bank,
            store,
            checker: None,
            observer: Arc::new(NoopObserver),
            config,
            state: ExamState::Loading,
            pending_saves: Vec::new(),
        }
    }

    /// Use `checker` for server-confirmed evaluation.
    pub fn with_checker(mut self, checker: Arc<dyn AnswerChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn test_bank_id(&self) -> TestBankId {
        self.test_bank_id
    }

    pub fn state(&self) -> &ExamState {
        &self.state
    }

    /// The running session, once questions are loaded.
    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            ExamState::Ready(session) => Some(session),
            _ => None,
        }
    }

    fn session_mut(&mut self) -> Result<&mut Session, EngineError> {
        match &mut self.state {
            ExamState::Ready(session) => Ok(session),
            ExamState::Loading => Err(EngineError::NotReady("questions are still loading")),
            ExamState::Failed { .. } => Err(EngineError::NotReady("loading questions failed")),
        }
    }

    fn notify(&self) {
        if let Some(session) = self.session() {
            self.observer.on_state_change(&session.snapshot());
        }
    }

    /// Fetch the questions and start a session.
    ///
    /// On failure the engine moves to `ExamState::Failed`; calling `load`
    /// again retries.
    pub async fn load(&mut self) -> Result<(), EngineError> {
        self.state = ExamState::Loading;

        let questions = match self
            .bank
            .list_questions(self.test_bank_id, self.config.shuffle)
            .await
        {
            Ok(questions) => questions,
            Err(e) => {
                tracing::error!(test_bank_id = self.test_bank_id, "failed to load questions: {e:#}");
                self.state = ExamState::Failed {
                    message: format!("{e:#}"),
                };
                return Err(EngineError::Load(e));
            }
        };

        let session = match Session::new(self.test_bank_id, questions, self.config.mode) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(test_bank_id = self.test_bank_id, "{e}");
                self.state = ExamState::Failed {
                    message: e.to_string(),
                };
                return Err(e.into());
            }
        };

        tracing::info!(
            test_bank_id = self.test_bank_id,
            questions = session.total(),
            attempt_id = %session.attempt_id(),
            "exam session started"
        );
        self.state = ExamState::Ready(session);
        self.notify();
        Ok(())
    }

    pub fn toggle_answer(&mut self, label: &str) -> Result<(), EngineError> {
        self.session_mut()?.toggle_answer(label)?;
        self.notify();
        Ok(())
    }

    /// Submit the current question and return its correctness.
    ///
    /// In server-confirmed mode the answer checker is consulted; if it fails
    /// the local evaluation is used instead.
    pub async fn check_answer(&mut self) -> Result<Option<bool>, EngineError> {
        let checker = self.checker.clone();
        let mode = self.config.mode;
        let session = self.session_mut()?;
        session.check_answer()?;

        if let (EvaluationMode::ServerConfirmed, Some(checker)) = (mode, checker) {
            let attempt_id = session.attempt_id();
            let index = session.index();
            let question_id = session.current_question().map(|q| q.id);
            let selected = join_labels(session.selection());

            if let Some(question_id) = question_id {
                match checker.check_answer(question_id, &selected).await {
                    Ok(response) => {
                        self.session_mut()?
                            .cache_check_response(attempt_id, index, response);
                    }
                    Err(e) => {
                        tracing::warn!(
                            question_id,
                            "answer check failed, using local evaluation: {e:#}"
                        );
                    }
                }
            }
        }

        self.notify();
        Ok(self.session().and_then(Session::current_correctness))
    }

    /// Score the current question and advance.
    ///
    /// When the exam completes, the result is saved on a background task of
    /// the current Tokio runtime. Without a runtime the last question is
    /// refused with `EngineError::NoRuntime` and the session is left as is.
    pub fn next_question(&mut self) -> Result<Advance, EngineError> {
        let runtime = Handle::try_current().ok();
        let session = self.session_mut()?;
        if runtime.is_none() && session.index() + 1 == session.total() {
            return Err(EngineError::NoRuntime);
        }

        let advance = session.next_question()?;
        self.notify();

        if let Advance::Completed(outcome) = advance {
            tracing::info!(
                test_bank_id = outcome.test_bank_id,
                score = outcome.score,
                total = outcome.total,
                "exam completed"
            );
            self.observer.on_completed(&outcome);
            if let Some(runtime) = runtime {
                self.spawn_save(&runtime, outcome);
            }
        }

        Ok(advance)
    }

    fn spawn_save(&mut self, runtime: &Handle, outcome: ExamOutcome) {
        let store = Arc::clone(&self.store);
        self.pending_saves.retain(|handle| !handle.is_finished());
        self.pending_saves.push(runtime.spawn(async move {
            match store
                .save_result(outcome.test_bank_id, outcome.score, outcome.total)
                .await
            {
                Ok(ack) => tracing::info!(id = ?ack.id, "exam result saved"),
                Err(e) => tracing::error!(
                    test_bank_id = outcome.test_bank_id,
                    "failed to save exam result: {e:#}"
                ),
            }
        }));
    }

    /// Start the same exam over without reloading questions.
    pub fn restart(&mut self) -> Result<(), EngineError> {
        self.session_mut()?.restart();
        self.notify();
        Ok(())
    }

    /// Wait for outstanding result saves to finish.
    pub async fn flush_pending_save(&mut self) {
        for handle in self.pending_saves.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!("result save task failed: {e}");
            }
        }
    }

    /// Recorded attempts for this test bank; empty if they cannot be loaded.
    pub async fn history(&self) -> Vec<ExamResultRecord> {
        match self.store.get_history(self.test_bank_id).await {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!(
                    test_bank_id = self.test_bank_id,
                    "failed to load exam history: {e:#}"
                );
                Vec::new()
            }
        }
    }

    /// Performance series for this test bank.
    pub async fn history_series(&self, order: SeriesOrder) -> Vec<SeriesPoint> {
        to_series(&self.history().await, order)
    }
}
