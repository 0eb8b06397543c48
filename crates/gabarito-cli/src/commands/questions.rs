//! The `gabarito questions` commands.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use comfy_table::{Cell, Table};

use gabarito_core::access::Route;
use gabarito_core::backend::ExamBackend;
use gabarito_core::labels::{fallback, question_type_label};
use gabarito_core::lifecycle::{ExamCommand, ExamController};
use gabarito_core::model::{Exam, QuestionDraft, QuestionType, Session};

use super::context::Context;
use super::fail;

/// Fields to change on an existing question. `None` keeps the current value.
pub struct QuestionEdit {
    pub statement: Option<String>,
    pub kind: Option<String>,
    pub alternatives: Vec<String>,
    pub score: Option<f64>,
    pub order: Option<u32>,
}

fn parse_kind(kind: &str) -> Result<QuestionType> {
    kind.parse().map_err(anyhow::Error::msg)
}

async fn load_exam(ctx: &Context, session: &Session, exam_id: &str) -> Result<Exam> {
    ctx.backend
        .get_exam(&session.token, exam_id)
        .await
        .map_err(fail(fallback::LOAD_EXAM))
}

pub async fn list(config: Option<PathBuf>, exam_id: String) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::Questions {
        exam_id: exam_id.clone(),
    })?;

    let mut questions = ctx
        .backend
        .list_questions(&session.token, &exam_id)
        .await
        .map_err(fail(fallback::LOAD))?;
    questions.sort_by_key(|q| q.order);

    if questions.is_empty() {
        println!("No questions yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "ID", "Statement", "Type", "Alternatives", "Score"]);
    for question in &questions {
        table.add_row(vec![
            Cell::new(question.order),
            Cell::new(&question.id),
            Cell::new(&question.statement),
            Cell::new(question_type_label(question.kind)),
            Cell::new(question.alternatives.join(", ")),
            Cell::new(question.score),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn add(
    config: Option<PathBuf>,
    exam_id: String,
    statement: String,
    kind: String,
    alternatives: Vec<String>,
    score: f64,
    order: Option<u32>,
) -> Result<()> {
    let kind = parse_kind(&kind)?;
    if statement.trim().is_empty() {
        anyhow::bail!("statement must not be blank");
    }

    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::Questions {
        exam_id: exam_id.clone(),
    })?;
    let exam = load_exam(&ctx, session, &exam_id).await?;

    let order = order.unwrap_or_else(|| {
        exam.questions.iter().map(|q| q.order).max().unwrap_or(0) + 1
    });
    let draft = QuestionDraft {
        statement,
        kind,
        alternatives,
        score,
        order,
    };
    let outcome = ExamController::new(&ctx.backend, session)
        .execute(&exam, ExamCommand::AddQuestion(draft))
        .await
        .map_err(fail(fallback::ADD_QUESTION))?;

    let total = outcome.exam().map(|e| e.questions.len()).unwrap_or_default();
    println!("Question {order} added. The exam now has {total} question(s).");
    Ok(())
}

pub async fn update(
    config: Option<PathBuf>,
    exam_id: String,
    question_id: String,
    edit: QuestionEdit,
) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::Questions {
        exam_id: exam_id.clone(),
    })?;
    let exam = load_exam(&ctx, session, &exam_id).await?;
    let current = exam
        .question(&question_id)
        .with_context(|| format!("unknown question: {question_id}"))?;

    let draft = QuestionDraft {
        statement: edit.statement.unwrap_or_else(|| current.statement.clone()),
        kind: match edit.kind {
            Some(kind) => parse_kind(&kind)?,
            None => current.kind,
        },
        alternatives: if edit.alternatives.is_empty() {
            current.alternatives.clone()
        } else {
            edit.alternatives
        },
        score: edit.score.unwrap_or(current.score),
        order: edit.order.unwrap_or(current.order),
    };

    ExamController::new(&ctx.backend, session)
        .execute(
            &exam,
            ExamCommand::UpdateQuestion {
                question_id: question_id.clone(),
                draft,
            },
        )
        .await
        .map_err(fail(fallback::SAVE))?;
    println!("Question {question_id} updated.");
    Ok(())
}

pub async fn remove(config: Option<PathBuf>, exam_id: String, question_id: String) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::Questions {
        exam_id: exam_id.clone(),
    })?;
    let exam = load_exam(&ctx, session, &exam_id).await?;

    ExamController::new(&ctx.backend, session)
        .execute(
            &exam,
            ExamCommand::RemoveQuestion {
                question_id: question_id.clone(),
            },
        )
        .await
        .map_err(fail(fallback::DELETE))?;
    println!("Question {question_id} removed.");
    Ok(())
}
