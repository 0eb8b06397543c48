//! The `gabarito exams` commands.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Table};

use gabarito_core::access::Route;
use gabarito_core::backend::ExamBackend;
use gabarito_core::labels::{fallback, question_type_label, status_label};
use gabarito_core::lifecycle::{ExamAction, ExamCommand, ExamController};
use gabarito_core::model::{ExamDraft, Role};
use gabarito_core::view::{visible_exams, ExamDetail, ExamDetailView, ViewState};

use super::context::Context;
use super::{fail, format_date};

pub async fn list(config: Option<PathBuf>) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::ExamList)?;

    let exams = ctx
        .backend
        .list_exams(&session.token)
        .await
        .map_err(fail(fallback::LOAD_EXAMS))?;
    let exams = visible_exams(exams, session.role());

    if exams.is_empty() {
        println!("No exams found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Status", "Questions", "Start", "End"]);
    for exam in &exams {
        table.add_row(vec![
            Cell::new(&exam.id),
            Cell::new(&exam.title),
            Cell::new(status_label(exam.status)),
            Cell::new(exam.questions.len()),
            Cell::new(format_date(exam.start_date)),
            Cell::new(format_date(exam.end_date)),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn show(config: Option<PathBuf>, exam_id: String) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::ExamDetail {
        exam_id: exam_id.clone(),
    })?;

    let mut view = ExamDetailView::new(exam_id);
    view.load(&ctx.backend, session).await;
    match view.state() {
        ViewState::Ready(detail) => {
            print_detail(detail, session.role());
            Ok(())
        }
        ViewState::Failed(message) => anyhow::bail!("{message}"),
        ViewState::Loading => anyhow::bail!(fallback::LOAD_EXAM),
    }
}

fn print_detail(detail: &ExamDetail, role: Role) {
    let exam = &detail.exam;
    println!("{} [{}]", exam.title, status_label(exam.status));
    if let Some(description) = exam.description.as_deref().filter(|d| !d.trim().is_empty()) {
        println!("{description}");
    }
    println!(
        "Window: {} to {}",
        format_date(exam.start_date),
        format_date(exam.end_date)
    );

    if !exam.questions.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["#", "ID", "Statement", "Type", "Alternatives", "Score"]);
        for question in exam.ordered_questions() {
            table.add_row(vec![
                Cell::new(question.order),
                Cell::new(&question.id),
                Cell::new(&question.statement),
                Cell::new(question_type_label(question.kind)),
                Cell::new(question.alternatives.join(", ")),
                Cell::new(question.score),
            ]);
        }
        println!("\n{table}");
    }

    match role {
        Role::Professor => {
            if detail.submissions.is_empty() {
                println!("\nNo submissions yet.");
            } else {
                let mut table = Table::new();
                table.set_header(vec!["Submission", "Student", "Sent", "Grade", "Action"]);
                for submission in &detail.submissions {
                    let action = detail
                        .submission_action(submission)
                        .map(|a| a.to_string())
                        .unwrap_or_default();
                    table.add_row(vec![
                        Cell::new(&submission.id),
                        Cell::new(
                            submission
                                .student_name
                                .as_deref()
                                .unwrap_or(&submission.student_id),
                        ),
                        Cell::new(format_date(submission.submitted_at)),
                        Cell::new(
                            submission
                                .grade
                                .map(|g| g.to_string())
                                .unwrap_or_else(|| "-".into()),
                        ),
                        Cell::new(action),
                    ]);
                }
                println!("\n{table}");
            }
        }
        Role::Student => {
            if let Some(own) = detail.own_submission() {
                println!("\nYour submission: {}", own.id);
            }
        }
    }

    let actions: Vec<String> = detail
        .affordances
        .iter()
        .filter(|a| !matches!(a, ExamAction::ViewResult | ExamAction::Correct))
        .map(|a| a.to_string())
        .collect();
    if !actions.is_empty() {
        println!("\nAvailable: {}", actions.join(", "));
    }
}

pub async fn create(
    config: Option<PathBuf>,
    title: String,
    description: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<()> {
    if title.trim().is_empty() {
        anyhow::bail!("title must not be blank");
    }
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::NewExam)?;

    let draft = ExamDraft {
        title,
        description,
        start_date: start,
        end_date: end,
    };
    let exam = ExamController::new(&ctx.backend, session)
        .create(&draft)
        .await
        .map_err(fail(fallback::SAVE))?;

    println!("Created exam {} ({})", exam.id, status_label(exam.status));
    Ok(())
}

pub async fn edit(
    config: Option<PathBuf>,
    exam_id: String,
    title: Option<String>,
    description: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::EditExam {
        exam_id: exam_id.clone(),
    })?;

    let exam = ctx
        .backend
        .get_exam(&session.token, &exam_id)
        .await
        .map_err(fail(fallback::LOAD_EXAM))?;
    let mut draft = ExamDraft::from(&exam);
    if let Some(title) = title {
        draft.title = title;
    }
    if description.is_some() {
        draft.description = description;
    }
    if start.is_some() {
        draft.start_date = start;
    }
    if end.is_some() {
        draft.end_date = end;
    }

    ExamController::new(&ctx.backend, session)
        .execute(&exam, ExamCommand::UpdateDetails(draft))
        .await
        .map_err(fail(fallback::SAVE))?;
    println!("Exam {exam_id} updated.");
    Ok(())
}

pub async fn delete(config: Option<PathBuf>, exam_id: String) -> Result<()> {
    transition(config, exam_id, ExamCommand::Delete, fallback::DELETE).await
}

pub async fn publish(config: Option<PathBuf>, exam_id: String) -> Result<()> {
    transition(config, exam_id, ExamCommand::Publish, fallback::PUBLISH).await
}

pub async fn close(config: Option<PathBuf>, exam_id: String) -> Result<()> {
    transition(config, exam_id, ExamCommand::Close, fallback::CLOSE).await
}

async fn transition(
    config: Option<PathBuf>,
    exam_id: String,
    command: ExamCommand,
    fallback_message: &'static str,
) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::EditExam {
        exam_id: exam_id.clone(),
    })?;

    let exam = ctx
        .backend
        .get_exam(&session.token, &exam_id)
        .await
        .map_err(fail(fallback::LOAD_EXAM))?;
    let outcome = ExamController::new(&ctx.backend, session)
        .execute(&exam, command)
        .await
        .map_err(fail(fallback_message))?;

    match outcome.exam() {
        Some(updated) => println!("Exam {exam_id} is now {}.", status_label(updated.status)),
        None => println!("Exam {exam_id} deleted."),
    }
    Ok(())
}
