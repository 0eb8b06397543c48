//! Presentation helpers over backend-computed results.
//!
//! Nothing here grades anything. Correction results, reports and statistics
//! arrive already computed; these functions only order, label and band them.

use serde::Serialize;

use crate::model::{CorrectionResult, Exam, ExamStatistics, QuestionDetail};

/// Coarse rating used to colour a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Band {
    Low,
    Medium,
    High,
}

/// Overall performance as a whole percentage.
///
/// Zero when nothing was answered.
pub fn performance_percent(correct: u32, incorrect: u32) -> u32 {
    let total = correct + incorrect;
    if total == 0 {
        return 0;
    }
    (f64::from(correct) / f64::from(total) * 100.0).round() as u32
}

/// Band for a student's overall performance: high from 70, medium from 50.
pub fn performance_band(percent: u32) -> Band {
    match percent {
        p if p >= 70 => Band::High,
        p if p >= 50 => Band::Medium,
        _ => Band::Low,
    }
}

/// Band for a question's accuracy across submissions: high from 70, medium from 40.
pub fn accuracy_band(percent: f64) -> Band {
    if percent >= 70.0 {
        Band::High
    } else if percent >= 40.0 {
        Band::Medium
    } else {
        Band::Low
    }
}

// ---------------------------------------------------------------------------
// Correction results
// ---------------------------------------------------------------------------

/// One row of a correction result, ready to print.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub label: String,
    pub question_id: String,
    pub correct: bool,
    /// `None` when the question was left blank.
    pub student_answer: Option<String>,
    /// Only shown for wrong answers.
    pub expected_answer: Option<String>,
    pub points: f64,
}

/// A correction result with its derived display values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionSummary {
    pub correct: u32,
    pub incorrect: u32,
    pub final_grade: f64,
    pub percent: u32,
    pub band: Band,
    pub rows: Vec<DetailRow>,
}

impl CorrectionSummary {
    /// Summarise `result`. With the exam at hand, rows follow question order
    /// and carry the question number; otherwise they keep backend order.
    pub fn new(result: &CorrectionResult, exam: Option<&Exam>) -> Self {
        let percent = performance_percent(result.correct_count, result.incorrect_count);

        let mut details: Vec<&QuestionDetail> = result.per_question_detail.iter().collect();
        if let Some(exam) = exam {
            details.sort_by_key(|d| {
                exam.question(&d.question_id)
                    .map(|q| q.order)
                    .unwrap_or(u32::MAX)
            });
        }

        let rows = details
            .into_iter()
            .enumerate()
            .map(|(idx, d)| DetailRow {
                label: question_label(exam, &d.question_id, idx),
                question_id: d.question_id.clone(),
                correct: d.correct,
                student_answer: d.student_answer.clone().filter(|a| !a.is_empty()),
                expected_answer: if d.correct {
                    None
                } else {
                    d.expected_answer.clone()
                },
                points: d.points_earned,
            })
            .collect();

        Self {
            correct: result.correct_count,
            incorrect: result.incorrect_count,
            final_grade: result.final_grade,
            percent,
            band: performance_band(percent),
            rows,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Accuracy of one question across corrected submissions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyRow {
    pub label: String,
    pub question_id: String,
    pub percent: f64,
    pub band: Band,
    /// An issue has been registered for this question.
    pub flagged: bool,
}

/// Per-question accuracy rows.
///
/// Ordered by question order when the exam is known, by question id otherwise.
pub fn accuracy_rows(stats: &ExamStatistics, exam: Option<&Exam>) -> Vec<AccuracyRow> {
    let mut entries: Vec<(&String, f64)> = stats
        .per_question_accuracy
        .iter()
        .map(|(id, pct)| (id, *pct))
        .collect();
    if let Some(exam) = exam {
        entries.sort_by_key(|(id, _)| exam.question(id).map(|q| q.order).unwrap_or(u32::MAX));
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(idx, (id, percent))| AccuracyRow {
            label: question_label(exam, id, idx),
            question_id: id.clone(),
            percent,
            band: accuracy_band(percent),
            flagged: stats.flagged_questions.contains(id),
        })
        .collect()
}

/// Grade distribution buckets ordered by their lower bound ("0-10%", "10-20%", ...).
pub fn distribution_rows(stats: &ExamStatistics) -> Vec<(String, u32)> {
    let mut rows: Vec<(String, u32)> = stats
        .grade_distribution
        .iter()
        .map(|(bucket, count)| (bucket.clone(), *count))
        .collect();
    rows.sort_by_key(|(bucket, _)| bucket_floor(bucket));
    rows
}

fn bucket_floor(bucket: &str) -> u32 {
    bucket
        .split(['-', '%'])
        .next()
        .and_then(|n| n.trim().parse().ok())
        .unwrap_or(u32::MAX)
}

fn question_label(exam: Option<&Exam>, question_id: &str, idx: usize) -> String {
    let number = exam
        .and_then(|e| e.question(question_id))
        .map(|q| q.order as usize)
        .unwrap_or(idx + 1);
    format!("Questão {number}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamStatus, Question, QuestionType};
    use std::collections::BTreeMap;

    fn exam() -> Exam {
        let question = |id: &str, order| Question {
            id: id.into(),
            exam_id: None,
            order,
            statement: String::new(),
            kind: QuestionType::Objective,
            alternatives: vec!["a".into(), "b".into()],
            score: 1.0,
        };
        Exam {
            id: "e".into(),
            title: "t".into(),
            description: None,
            professor_id: None,
            status: ExamStatus::Closed,
            start_date: None,
            end_date: None,
            questions: vec![question("zz", 1), question("aa", 2)],
            created_at: None,
        }
    }

    #[test]
    fn performance_percent_rounds_and_handles_zero() {
        assert_eq!(performance_percent(0, 0), 0);
        assert_eq!(performance_percent(2, 1), 67);
        assert_eq!(performance_percent(1, 1), 50);
        assert_eq!(performance_percent(3, 0), 100);
    }

    #[test]
    fn bands_use_their_own_thresholds() {
        assert_eq!(performance_band(70), Band::High);
        assert_eq!(performance_band(69), Band::Medium);
        assert_eq!(performance_band(50), Band::Medium);
        assert_eq!(performance_band(49), Band::Low);

        assert_eq!(accuracy_band(70.0), Band::High);
        assert_eq!(accuracy_band(45.0), Band::Medium);
        assert_eq!(accuracy_band(39.9), Band::Low);
    }

    #[test]
    fn correction_summary_orders_by_question() {
        let result = CorrectionResult {
            id: None,
            submission_id: Some("s".into()),
            correct_count: 1,
            incorrect_count: 1,
            final_grade: 1.0,
            per_question_detail: vec![
                QuestionDetail {
                    question_id: "aa".into(),
                    correct: false,
                    student_answer: Some("a".into()),
                    expected_answer: Some("b".into()),
                    points_earned: 0.0,
                },
                QuestionDetail {
                    question_id: "zz".into(),
                    correct: true,
                    student_answer: Some("a".into()),
                    expected_answer: Some("a".into()),
                    points_earned: 1.0,
                },
            ],
        };
        let exam = exam();
        let summary = CorrectionSummary::new(&result, Some(&exam));
        assert_eq!(summary.percent, 50);
        assert_eq!(summary.band, Band::Medium);
        assert_eq!(summary.rows[0].label, "Questão 1");
        assert_eq!(summary.rows[0].question_id, "zz");
        assert_eq!(summary.rows[0].expected_answer, None);
        assert_eq!(summary.rows[1].expected_answer.as_deref(), Some("b"));

        let unordered = CorrectionSummary::new(&result, None);
        assert_eq!(unordered.rows[0].question_id, "aa");
        assert_eq!(unordered.rows[0].label, "Questão 1");
    }

    #[test]
    fn statistics_rows() {
        let stats = ExamStatistics {
            exam_id: Some("e".into()),
            per_question_accuracy: BTreeMap::from([("aa".into(), 30.0), ("zz".into(), 80.0)]),
            grade_distribution: BTreeMap::from([
                ("10-20%".into(), 1),
                ("0-10%".into(), 0),
                ("90-100%".into(), 2),
                ("100-110%".into(), 0),
            ]),
            flagged_questions: vec!["aa".into()],
        };
        let exam = exam();
        let rows = accuracy_rows(&stats, Some(&exam));
        assert_eq!(rows[0].question_id, "zz");
        assert_eq!(rows[0].band, Band::High);
        assert!(!rows[0].flagged);
        assert_eq!(rows[1].label, "Questão 2");
        assert_eq!(rows[1].band, Band::Low);
        assert!(rows[1].flagged);

        let buckets: Vec<String> = distribution_rows(&stats).into_iter().map(|(b, _)| b).collect();
        assert_eq!(buckets, vec!["0-10%", "10-20%", "90-100%", "100-110%"]);
    }
}
