//! The `gabarito answer-key` commands.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use gabarito_core::access::Route;
use gabarito_core::labels::fallback;
use gabarito_core::lifecycle::ExamController;
use gabarito_core::model::Session;
use gabarito_core::view::{AnswerKeyView, ViewState};

use super::context::Context;
use super::{fail, parse_answers};

async fn open(ctx: &Context, session: &Session, exam_id: String) -> Result<AnswerKeyView> {
    let mut view = AnswerKeyView::new(exam_id);
    view.load(&ctx.backend, session).await;
    match view.state() {
        ViewState::Ready(_) => Ok(view),
        ViewState::Failed(message) => anyhow::bail!("{message}"),
        ViewState::Loading => anyhow::bail!(fallback::LOAD),
    }
}

pub async fn show(config: Option<PathBuf>, exam_id: String) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::AnswerKey {
        exam_id: exam_id.clone(),
    })?;
    let view = open(&ctx, session, exam_id).await?;

    let (Some(exam), Some(key)) = (view.exam(), view.answer_key()) else {
        println!("No answer key yet. Set one with `gabarito answer-key set`.");
        return Ok(());
    };

    let mut table = Table::new();
    table.set_header(vec!["#", "Question", "Answer"]);
    for question in exam.ordered_questions() {
        table.add_row(vec![
            Cell::new(question.order),
            Cell::new(&question.statement),
            Cell::new(key.answers.get(&question.id).map(String::as_str).unwrap_or("-")),
        ]);
    }
    println!("{table}");

    let missing = key.missing_questions(exam);
    if !missing.is_empty() {
        println!("\nMissing answers for {} question(s).", missing.len());
    }
    Ok(())
}

pub async fn set(config: Option<PathBuf>, exam_id: String, answers: Vec<String>) -> Result<()> {
    if answers.is_empty() {
        anyhow::bail!("no answers given, use --answer QUESTION=ALTERNATIVE");
    }
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::AnswerKey {
        exam_id: exam_id.clone(),
    })?;
    let mut view = open(&ctx, session, exam_id).await?;

    let replacing = view.answer_key().is_some();
    let answers = match view.exam() {
        Some(exam) => parse_answers(exam, &answers)?,
        None => anyhow::bail!(fallback::LOAD),
    };
    let controller = ExamController::new(&ctx.backend, session);
    let key = view
        .save(&controller, answers)
        .await
        .map_err(fail(fallback::SAVE_ANSWER_KEY))?;

    let verb = if replacing { "updated" } else { "created" };
    println!("Answer key {verb} with {} answer(s).", key.answers.len());
    Ok(())
}
