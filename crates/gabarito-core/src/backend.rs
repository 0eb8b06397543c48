//! The backend seam.
//!
//! `ExamBackend` is implemented by the HTTP client and the in-memory backend
//! in `gabarito-client`. Every authenticated call takes the bearer token
//! explicitly; nothing here reads global session state.

use async_trait::async_trait;

use crate::error::ClientResult;
use crate::model::{
    AnswerKey, AnswerKeyDraft, CorrectionResult, Credentials, Exam, ExamDraft, ExamReport,
    ExamStatistics, Issue, IssueDraft, Profile, Question, QuestionDraft, Registration, Session,
    Submission, SubmissionDraft,
};

// ---------------------------------------------------------------------------
// Exam backend trait
// ---------------------------------------------------------------------------

/// One method per REST call the client makes.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// Human-readable backend name (e.g. "http").
    fn name(&self) -> &str;

    // -- auth ---------------------------------------------------------------

    async fn login(&self, credentials: &Credentials) -> ClientResult<Session>;

    async fn register(&self, registration: &Registration) -> ClientResult<Session>;

    async fn me(&self, token: &str) -> ClientResult<Profile>;

    async fn logout(&self, token: &str) -> ClientResult<()>;

    // -- exams --------------------------------------------------------------

    async fn list_exams(&self, token: &str) -> ClientResult<Vec<Exam>>;

    async fn get_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam>;

    async fn create_exam(&self, token: &str, draft: &ExamDraft) -> ClientResult<Exam>;

    async fn update_exam(&self, token: &str, exam_id: &str, draft: &ExamDraft)
        -> ClientResult<Exam>;

    async fn delete_exam(&self, token: &str, exam_id: &str) -> ClientResult<()>;

    async fn publish_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam>;

    async fn close_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam>;

    // -- questions ----------------------------------------------------------

    async fn list_questions(&self, token: &str, exam_id: &str) -> ClientResult<Vec<Question>>;

    async fn add_question(
        &self,
        token: &str,
        exam_id: &str,
        draft: &QuestionDraft,
    ) -> ClientResult<Question>;

    async fn update_question(
        &self,
        token: &str,
        question_id: &str,
        draft: &QuestionDraft,
    ) -> ClientResult<Question>;

    async fn delete_question(&self, token: &str, question_id: &str) -> ClientResult<()>;

    // -- answer key ---------------------------------------------------------

    async fn get_answer_key(&self, token: &str, exam_id: &str) -> ClientResult<AnswerKey>;

    async fn create_answer_key(
        &self,
        token: &str,
        exam_id: &str,
        draft: &AnswerKeyDraft,
    ) -> ClientResult<AnswerKey>;

    async fn update_answer_key(
        &self,
        token: &str,
        exam_id: &str,
        draft: &AnswerKeyDraft,
    ) -> ClientResult<AnswerKey>;

    // -- submissions and correction -----------------------------------------

    /// Professors see every submission; students only their own.
    async fn list_submissions(&self, token: &str, exam_id: &str) -> ClientResult<Vec<Submission>>;

    async fn get_submission(&self, token: &str, submission_id: &str) -> ClientResult<Submission>;

    async fn create_submission(
        &self,
        token: &str,
        exam_id: &str,
        draft: &SubmissionDraft,
    ) -> ClientResult<Submission>;

    /// Ask the backend to correct a submission.
    ///
    /// `None` means the request was accepted but no result is available yet.
    async fn correct_submission(
        &self,
        token: &str,
        submission_id: &str,
    ) -> ClientResult<Option<CorrectionResult>>;

    async fn get_correction_result(
        &self,
        token: &str,
        submission_id: &str,
    ) -> ClientResult<CorrectionResult>;

    // -- reporting ----------------------------------------------------------

    async fn get_report(&self, token: &str, exam_id: &str) -> ClientResult<ExamReport>;

    async fn get_statistics(&self, token: &str, exam_id: &str) -> ClientResult<ExamStatistics>;

    async fn list_issues(&self, token: &str, question_id: &str) -> ClientResult<Vec<Issue>>;

    async fn create_issue(
        &self,
        token: &str,
        question_id: &str,
        draft: &IssueDraft,
    ) -> ClientResult<Issue>;
}
