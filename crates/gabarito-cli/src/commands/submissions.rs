//! The `gabarito submit`, `correct` and `result` commands.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use comfy_table::{Cell, Table};

use gabarito_core::access::Route;
use gabarito_core::backend::ExamBackend;
use gabarito_core::display::CorrectionSummary;
use gabarito_core::error::Rejection;
use gabarito_core::labels::fallback;
use gabarito_core::model::{Exam, Role, Session};
use gabarito_core::view::{
    CorrectionState, CorrectionView, ExamDetailView, PollPolicy, ViewState,
};

use super::context::Context;
use super::{band_color, fail, parse_answers};

async fn open_exam(ctx: &Context, session: &Session, exam_id: String) -> Result<ExamDetailView> {
    let mut view = ExamDetailView::new(exam_id);
    view.load(&ctx.backend, session).await;
    match view.state() {
        ViewState::Ready(_) => Ok(view),
        ViewState::Failed(message) => anyhow::bail!("{message}"),
        ViewState::Loading => anyhow::bail!(fallback::LOAD_EXAM),
    }
}

pub async fn submit(config: Option<PathBuf>, exam_id: String, answers: Vec<String>) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::ExamDetail {
        exam_id: exam_id.clone(),
    })?;
    let mut view = open_exam(&ctx, session, exam_id).await?;

    let answers = match view.detail() {
        Some(detail) => parse_answers(&detail.exam, &answers)?,
        None => anyhow::bail!(fallback::LOAD_EXAM),
    };
    let submission = view
        .submit(&ctx.backend, session, answers, Utc::now())
        .await
        .map_err(fail(fallback::SUBMIT))?;

    println!("Submission {} sent.", submission.id);
    println!("Check the result with `gabarito result {}`.", submission.id);
    Ok(())
}

pub async fn correct(config: Option<PathBuf>, submission_id: String) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::CorrectionResult {
        submission_id: submission_id.clone(),
    })?;
    if session.role() != Role::Professor {
        return Err(fail(fallback::CORRECT)(Rejection::ProfessorOnly.into()));
    }

    let submission = ctx
        .backend
        .get_submission(&session.token, &submission_id)
        .await
        .map_err(fail(fallback::CORRECT))?;
    let mut view = open_exam(&ctx, session, submission.exam_id).await?;

    let state = view
        .correct(&ctx.backend, session, &submission_id)
        .await
        .map_err(fail(fallback::CORRECT))?;
    match state {
        CorrectionState::Ready(result) => {
            let exam = view.detail().map(|d| &d.exam);
            print_summary(&CorrectionSummary::new(&result, exam));
        }
        CorrectionState::Pending => {
            println!("Correction requested. Check later with `gabarito result {submission_id} --wait`.");
        }
    }
    Ok(())
}

pub async fn result(
    config: Option<PathBuf>,
    submission_id: String,
    wait: bool,
    attempts: u32,
    interval: u64,
) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::CorrectionResult {
        submission_id: submission_id.clone(),
    })?;

    let mut view = CorrectionView::new(submission_id.clone());
    if wait {
        let policy = PollPolicy {
            attempts,
            interval: Duration::from_secs(interval),
        };
        view.wait(&ctx.backend, session, policy).await;
    } else {
        view.load(&ctx.backend, session).await;
    }

    match view.state() {
        ViewState::Ready(CorrectionState::Pending) => {
            println!("{}", fallback::RESULT);
            Ok(())
        }
        ViewState::Ready(CorrectionState::Ready(_)) => {
            let exam = exam_of(&ctx, session, &submission_id).await;
            if let Some(summary) = view.summary(exam.as_ref()) {
                print_summary(&summary);
            }
            Ok(())
        }
        ViewState::Failed(message) => anyhow::bail!("{message}"),
        ViewState::Loading => anyhow::bail!(fallback::RESULT),
    }
}

/// The exam a submission belongs to, for question numbering. Best effort.
async fn exam_of(ctx: &Context, session: &Session, submission_id: &str) -> Option<Exam> {
    let submission = ctx
        .backend
        .get_submission(&session.token, submission_id)
        .await
        .ok()?;
    ctx.backend
        .get_exam(&session.token, &submission.exam_id)
        .await
        .ok()
}

fn print_summary(summary: &CorrectionSummary) {
    println!(
        "Correct: {}  Incorrect: {}  Grade: {}",
        summary.correct, summary.incorrect, summary.final_grade
    );

    let mut table = Table::new();
    table.set_header(vec!["Question", "Answer", "Expected", "Points"]);
    for row in &summary.rows {
        let answer = row.student_answer.as_deref().unwrap_or("-");
        table.add_row(vec![
            Cell::new(&row.label),
            Cell::new(if row.correct {
                format!("{answer} (correct)")
            } else {
                answer.to_string()
            }),
            Cell::new(row.expected_answer.as_deref().unwrap_or("")),
            Cell::new(row.points),
        ]);
    }
    println!("{table}");

    let mut performance = Table::new();
    performance.add_row(vec![
        Cell::new("Performance"),
        Cell::new(format!("{}%", summary.percent)).fg(band_color(summary.band)),
    ]);
    println!("{performance}");
}
