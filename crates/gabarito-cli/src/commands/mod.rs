pub mod answer_key;
pub mod auth;
pub mod context;
pub mod exams;
pub mod init;
pub mod issues;
pub mod questions;
pub mod report;
pub mod submissions;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use comfy_table::Color;

use gabarito_core::display::Band;
use gabarito_core::error::ClientError;
use gabarito_core::model::{Answers, Exam};

/// Turn a backend error into the message a user should see.
pub fn fail(fallback: &'static str) -> impl FnOnce(ClientError) -> anyhow::Error {
    move |e| anyhow::anyhow!(e.user_message(fallback))
}

/// Parse `QUESTION=ALTERNATIVE` pairs. `QUESTION` is an id or the question's
/// number in the exam.
pub fn parse_answers(exam: &Exam, pairs: &[String]) -> Result<Answers> {
    let mut answers = Answers::new();
    for pair in pairs {
        let Some((question, alternative)) = pair.split_once('=') else {
            bail!("invalid answer '{pair}', expected QUESTION=ALTERNATIVE");
        };
        let question = question.trim();
        let id = match exam.question(question) {
            Some(q) => q.id.clone(),
            None => match question.parse::<u32>() {
                Ok(order) => exam
                    .questions
                    .iter()
                    .find(|q| q.order == order)
                    .map(|q| q.id.clone())
                    .unwrap_or_else(|| question.to_string()),
                Err(_) => question.to_string(),
            },
        };
        answers.insert(id, alternative.trim().to_string());
    }
    Ok(answers)
}

pub fn band_color(band: Band) -> Color {
    match band {
        Band::High => Color::Green,
        Band::Medium => Color::Yellow,
        Band::Low => Color::Red,
    }
}

pub fn format_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%d/%m/%Y %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
