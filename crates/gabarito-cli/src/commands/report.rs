//! The `gabarito report` command.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use gabarito_core::access::Route;
use gabarito_core::backend::ExamBackend;
use gabarito_core::labels::{fallback, NO_REPORT_DATA};
use gabarito_core::model::Exam;
use gabarito_core::view::{ReportData, ReportView};

use super::band_color;
use super::context::Context;

pub async fn execute(config: Option<PathBuf>, exam_id: String, statistics_only: bool) -> Result<()> {
    let route = if statistics_only {
        Route::Statistics {
            exam_id: exam_id.clone(),
        }
    } else {
        Route::Report {
            exam_id: exam_id.clone(),
        }
    };
    let ctx = Context::load(config)?;
    let session = ctx.enter(&route)?;

    let mut view = ReportView::new(exam_id.clone());
    view.load(&ctx.backend, session).await;
    let Some(data) = view.data() else {
        anyhow::bail!(fallback::REPORT);
    };

    if let Some(error) = &data.error {
        anyhow::bail!("{error}");
    }
    if data.has_no_data() {
        println!("{NO_REPORT_DATA}");
        return Ok(());
    }

    // Questions are only needed for labels; a failure leaves raw ids.
    let exam = ctx.backend.get_exam(&session.token, &exam_id).await.ok();

    if !statistics_only {
        print_report(data);
    }
    print_statistics(data, exam.as_ref());
    Ok(())
}

fn print_report(data: &ReportData) {
    let Some(report) = &data.report else {
        return;
    };
    let mut table = Table::new();
    table.set_header(vec!["Average", "Highest", "Lowest", "Submissions"]);
    table.add_row(vec![
        Cell::new(format!("{:.2}", report.average_grade)),
        Cell::new(report.highest_grade),
        Cell::new(report.lowest_grade),
        Cell::new(report.total_submissions),
    ]);
    println!("{table}");
}

fn print_statistics(data: &ReportData, exam: Option<&Exam>) {
    let rows = data.accuracy_rows(exam);
    if !rows.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Question", "Accuracy", "Flagged"]);
        for row in &rows {
            table.add_row(vec![
                Cell::new(&row.label),
                Cell::new(format!("{:.1}%", row.percent)).fg(band_color(row.band)),
                Cell::new(if row.flagged { "yes" } else { "" }),
            ]);
        }
        println!("\n{table}");
    }

    let distribution = data.distribution_rows();
    if !distribution.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Grade range", "Submissions"]);
        for (bucket, count) in &distribution {
            table.add_row(vec![Cell::new(bucket), Cell::new(count)]);
        }
        println!("\n{table}");
    }
}
