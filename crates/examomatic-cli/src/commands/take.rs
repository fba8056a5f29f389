//! The `examomatic take` command.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use examomatic_client::{create_service, load_config_from};
use examomatic_core::engine::ExamEngine;
use examomatic_core::evaluator::parse_labels;
use examomatic_core::history::SeriesOrder;
use examomatic_core::model::{Question, TestBankId};
use examomatic_core::placeholder::{expand, render_plain, PlaceholderKind};
use examomatic_core::session::{
    Advance, EvaluationMode, ExamOutcome, SessionObserver, SessionSnapshot,
};

/// Mirrors session transitions into the debug log.
struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_state_change(&self, snapshot: &SessionSnapshot) {
        tracing::debug!(
            index = snapshot.index,
            total = snapshot.total,
            selection = ?snapshot.selection,
            score = snapshot.score,
            "session state changed"
        );
    }

    fn on_completed(&self, outcome: &ExamOutcome) {
        tracing::debug!(score = outcome.score, total = outcome.total, "session completed");
    }
}

pub async fn execute(
    bank: TestBankId,
    practice: bool,
    no_shuffle: bool,
    server_check: bool,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let service = Arc::new(create_service(&config)?);

    let mut engine_config = config.engine_config();
    if no_shuffle {
        engine_config.shuffle = false;
    }
    if server_check {
        engine_config.mode = EvaluationMode::ServerConfirmed;
    }

    let mut engine = ExamEngine::new(bank, service.clone(), service.clone(), engine_config)
        .with_checker(service)
        .with_observer(Arc::new(LogObserver));
    engine.load().await?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let mut output = std::io::stdout();
    run_exam(&mut engine, &mut input, &mut output, practice).await
}

/// Drive a loaded engine from line-based input until the user stops.
pub(crate) async fn run_exam<R: BufRead, W: Write>(
    engine: &mut ExamEngine,
    input: &mut R,
    out: &mut W,
    practice: bool,
) -> Result<()> {
    loop {
        let Some(outcome) = answer_questions(engine, input, out, practice).await? else {
            writeln!(out, "\nExam abandoned; no result recorded.")?;
            return Ok(());
        };

        print_summary(engine, &outcome, out)?;
        engine.flush_pending_save().await;

        let recent = engine.history_series(SeriesOrder::MostRecentFirst).await;
        if !recent.is_empty() {
            writeln!(out, "\nRecent attempts:")?;
            for point in recent.iter().take(5) {
                writeln!(out, "  {}  {}%", point.label, point.value)?;
            }
        }

        if !ask(input, out, "\nRetake this exam? [y/N] ")? {
            return Ok(());
        }
        engine.restart()?;
    }
}

/// Returns `None` if the user quits before the last question.
async fn answer_questions<R: BufRead, W: Write>(
    engine: &mut ExamEngine,
    input: &mut R,
    out: &mut W,
    practice: bool,
) -> Result<Option<ExamOutcome>> {
    loop {
        let Some(session) = engine.session() else {
            anyhow::bail!("exam is not loaded");
        };
        let Some(question) = session.current_question().cloned() else {
            anyhow::bail!("exam already completed");
        };
        let multiple = session.is_multiple_choice();
        print_question(out, session.index(), session.total(), &question, multiple)?;

        let labels = loop {
            if multiple {
                write!(out, "Select all that apply (e.g. A,C), q to quit: ")?;
            } else {
                write!(out, "Your answer, q to quit: ")?;
            }
            out.flush()?;

            let Some(line) = read_line(input)? else {
                return Ok(None);
            };
            let line = line.trim();
            if line.eq_ignore_ascii_case("q") {
                return Ok(None);
            }
            match parse_answer(line, &question, multiple) {
                Ok(labels) => break labels,
                Err(message) => writeln!(out, "  {message}")?,
            }
        };

        for label in &labels {
            engine.toggle_answer(label)?;
        }

        if practice {
            let correct = engine.check_answer().await?;
            print_feedback(engine, &question, correct, out)?;
        }

        match engine.next_question()? {
            Advance::Next { .. } => {}
            Advance::Completed(outcome) => return Ok(Some(outcome)),
        }
    }
}

fn print_question<W: Write>(
    out: &mut W,
    index: usize,
    total: usize,
    question: &Question,
    multiple: bool,
) -> Result<()> {
    let hint = if multiple { " (select all that apply)" } else { "" };
    writeln!(out, "\nQuestion {}/{}{hint}", index + 1, total)?;
    writeln!(out, "{}", render_plain(&question.question_parts()))?;
    for (label, text) in &question.options {
        match question.option_images.get(label) {
            Some(image) => writeln!(out, "  {label}) {text} [image: {image}]")?,
            None => writeln!(out, "  {label}) {text}")?,
        }
    }
    Ok(())
}

/// Validate a typed answer against the current question.
fn parse_answer(line: &str, question: &Question, multiple: bool) -> Result<Vec<String>, String> {
    let raw = parse_labels(line);
    if raw.is_empty() {
        return Err("Enter at least one option label.".to_string());
    }
    let mut labels = BTreeSet::new();
    for label in &raw {
        match question.resolve_label(label) {
            Some(resolved) => labels.insert(resolved.to_string()),
            None => return Err(format!("'{label}' is not an option.")),
        };
    }
    if !multiple && labels.len() > 1 {
        return Err("This question takes a single answer.".to_string());
    }
    Ok(labels.into_iter().collect())
}

fn describe_labels<'a>(question: &Question, labels: impl IntoIterator<Item = &'a String>) -> String {
    labels
        .into_iter()
        .map(|label| {
            let resolved = question.resolve_label(label).unwrap_or(label);
            match question.option_text(resolved) {
                Some(text) => format!("{resolved}) {text}"),
                None => label.clone(),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn print_feedback<W: Write>(
    engine: &ExamEngine,
    question: &Question,
    correct: Option<bool>,
    out: &mut W,
) -> Result<()> {
    let server = engine.session().and_then(|s| s.check_response());

    let correct_labels = match server {
        Some(response) => response.correct_labels(),
        None => question
            .answer_key()
            .map(|key| key.labels().clone())
            .unwrap_or_default(),
    };

    match correct {
        Some(true) => writeln!(out, "  Correct!")?,
        Some(false) => writeln!(
            out,
            "  Incorrect. Correct answer: {}",
            describe_labels(question, &correct_labels)
        )?,
        None => writeln!(out, "  No answer key available for this question.")?,
    }
    if engine.session().is_some_and(|s| s.verdicts_disagree()) {
        writeln!(
            out,
            "  Note: the service verdict differs from the answer key; the score follows the answer key."
        )?;
    }

    let explanation = match server.and_then(|r| r.explanation.as_deref().map(|e| (e, r))) {
        Some((text, response)) => render_plain(&expand(
            text,
            &response.explanation_images,
            PlaceholderKind::Explanation,
        )),
        None => render_plain(&question.explanation_parts()),
    };
    if !explanation.trim().is_empty() {
        writeln!(out, "  Explanation: {explanation}")?;
    }
    Ok(())
}

fn print_summary<W: Write>(engine: &ExamEngine, outcome: &ExamOutcome, out: &mut W) -> Result<()> {
    writeln!(
        out,
        "\nScore: {}/{} ({}%)",
        outcome.score,
        outcome.total,
        outcome.percentage()
    )?;

    let wrong = engine
        .session()
        .map(|s| s.wrong_answers().to_vec())
        .unwrap_or_default();
    if wrong.is_empty() {
        return Ok(());
    }

    writeln!(out, "\nReview:")?;
    for record in &wrong {
        writeln!(out, "Question {}: {}", record.question_number, record.question)?;
        writeln!(out, "  Your answer:    {}", record.describe(&record.user_answer))?;
        writeln!(out, "  Correct answer: {}", record.describe(&record.correct_answer))?;
    }
    Ok(())
}

fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut buf = String::new();
    if input.read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    Ok(Some(buf))
}

fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> Result<bool> {
    write!(out, "{prompt}")?;
    out.flush()?;
    let answer = read_line(input)?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
