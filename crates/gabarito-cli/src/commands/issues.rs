//! The `gabarito issues` commands.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use gabarito_core::access::Route;
use gabarito_core::labels::{fallback, origin_label, severity_label, NO_ISSUES};
use gabarito_core::model::{IssueDraft, Severity};
use gabarito_core::view::IssuesView;

use super::context::Context;
use super::{fail, format_date};

pub async fn list(config: Option<PathBuf>, exam_id: String, question_id: String) -> Result<()> {
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::QuestionIssues {
        exam_id,
        question_id: question_id.clone(),
    })?;

    let mut view = IssuesView::new(question_id);
    view.load(&ctx.backend, session).await;
    print_issues(&view);
    Ok(())
}

pub async fn add(
    config: Option<PathBuf>,
    exam_id: String,
    question_id: String,
    problem_type: String,
    severity: String,
    description: String,
) -> Result<()> {
    let severity: Severity = severity.parse().map_err(anyhow::Error::msg)?;
    let ctx = Context::load(config)?;
    let session = ctx.enter(&Route::QuestionIssues {
        exam_id,
        question_id: question_id.clone(),
    })?;

    let draft = IssueDraft {
        problem_type,
        severity,
        description,
    };
    let mut view = IssuesView::new(question_id);
    let issue = view
        .create(&ctx.backend, session, &draft)
        .await
        .map_err(fail(fallback::ISSUE))?;

    println!("Issue {} registered.", issue.id);
    print_issues(&view);
    Ok(())
}

fn print_issues(view: &IssuesView) {
    if view.issues().is_empty() {
        println!("{NO_ISSUES}");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["Type", "Severity", "Description", "Origin", "Date"]);
    for issue in view.issues() {
        table.add_row(vec![
            Cell::new(&issue.problem_type),
            Cell::new(severity_label(issue.severity)),
            Cell::new(&issue.description),
            Cell::new(origin_label(issue.origin)),
            Cell::new(format_date(issue.identified_at)),
        ]);
    }
    println!("{table}");
}
