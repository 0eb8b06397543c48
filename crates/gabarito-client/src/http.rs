//! REST implementation of `ExamBackend`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use gabarito_core::backend::ExamBackend;
use gabarito_core::error::{ClientError, ClientResult, ErrorBody};
use gabarito_core::model::{
    AnswerKey, AnswerKeyDraft, AuthResponse, CorrectionResult, Credentials, Exam, ExamDraft,
    ExamReport, ExamStatistics, Issue, IssueDraft, Profile, Question, QuestionDraft, Registration,
    Session, Submission, SubmissionDraft,
};

/// Client for the exam-correction REST API.
pub struct HttpBackend {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout_secs,
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let request_id = Uuid::new_v4().to_string();
        debug!(%method, path, request_id = %request_id, "request");
        let req = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-Request-Id", request_id);
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> ClientResult<Response> {
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ClientError::Timeout(self.timeout_secs)
            } else {
                ClientError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let text = response.text().await.unwrap_or_default();
            let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();
            warn!(
                status = status.as_u16(),
                code = body.code.as_deref().unwrap_or(""),
                trace_id = body.trace_id.as_deref().unwrap_or(""),
                "request failed"
            );
            return Err(ClientError::from_status(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(format!("failed to parse response: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, token: &str) -> ClientResult<T> {
        let response = self.send(self.request(Method::GET, path, Some(token))).await?;
        Self::decode(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: Option<&str>,
        body: &B,
    ) -> ClientResult<T> {
        let response = self
            .send(self.request(Method::POST, path, token).json(body))
            .await?;
        Self::decode(response).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> ClientResult<T> {
        let response = self
            .send(self.request(Method::PUT, path, Some(token)).json(body))
            .await?;
        Self::decode(response).await
    }

    /// POST without a body, e.g. status transitions.
    async fn post_empty<T: DeserializeOwned>(&self, path: &str, token: &str) -> ClientResult<T> {
        let response = self.send(self.request(Method::POST, path, Some(token))).await?;
        Self::decode(response).await
    }

    async fn delete(&self, path: &str, token: &str) -> ClientResult<()> {
        self.send(self.request(Method::DELETE, path, Some(token)))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ExamBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> ClientResult<Session> {
        let auth: AuthResponse = self.post("/auth/login", None, credentials).await?;
        Ok(auth.into())
    }

    #[instrument(skip(self, registration), fields(email = %registration.email, role = %registration.role))]
    async fn register(&self, registration: &Registration) -> ClientResult<Session> {
        let auth: AuthResponse = self.post("/auth/register", None, registration).await?;
        Ok(auth.into())
    }

    #[instrument(skip(self, token))]
    async fn me(&self, token: &str) -> ClientResult<Profile> {
        self.get("/auth/me", token).await
    }

    #[instrument(skip(self, token))]
    async fn logout(&self, token: &str) -> ClientResult<()> {
        self.send(self.request(Method::POST, "/auth/logout", Some(token)))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, token))]
    async fn list_exams(&self, token: &str) -> ClientResult<Vec<Exam>> {
        self.get("/exams", token).await
    }

    #[instrument(skip(self, token))]
    async fn get_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam> {
        self.get(&format!("/exams/{exam_id}"), token).await
    }

    #[instrument(skip(self, token, draft), fields(title = %draft.title))]
    async fn create_exam(&self, token: &str, draft: &ExamDraft) -> ClientResult<Exam> {
        self.post("/exams", Some(token), draft).await
    }

    #[instrument(skip(self, token, draft))]
    async fn update_exam(
        &self,
        token: &str,
        exam_id: &str,
        draft: &ExamDraft,
    ) -> ClientResult<Exam> {
        self.put(&format!("/exams/{exam_id}"), token, draft).await
    }

    #[instrument(skip(self, token))]
    async fn delete_exam(&self, token: &str, exam_id: &str) -> ClientResult<()> {
        self.delete(&format!("/exams/{exam_id}"), token).await
    }

    #[instrument(skip(self, token))]
    async fn publish_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam> {
        self.post_empty(&format!("/exams/{exam_id}/publish"), token)
            .await
    }

    #[instrument(skip(self, token))]
    async fn close_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam> {
        self.post_empty(&format!("/exams/{exam_id}/close"), token)
            .await
    }

    #[instrument(skip(self, token))]
    async fn list_questions(&self, token: &str, exam_id: &str) -> ClientResult<Vec<Question>> {
        self.get(&format!("/exams/{exam_id}/questions"), token).await
    }

    #[instrument(skip(self, token, draft))]
    async fn add_question(
        &self,
        token: &str,
        exam_id: &str,
        draft: &QuestionDraft,
    ) -> ClientResult<Question> {
        self.post(&format!("/exams/{exam_id}/questions"), Some(token), draft)
            .await
    }

    #[instrument(skip(self, token, draft))]
    async fn update_question(
        &self,
        token: &str,
        question_id: &str,
        draft: &QuestionDraft,
    ) -> ClientResult<Question> {
        self.put(&format!("/questions/{question_id}"), token, draft)
            .await
    }

    #[instrument(skip(self, token))]
    async fn delete_question(&self, token: &str, question_id: &str) -> ClientResult<()> {
        self.delete(&format!("/questions/{question_id}"), token).await
    }

    #[instrument(skip(self, token))]
    async fn get_answer_key(&self, token: &str, exam_id: &str) -> ClientResult<AnswerKey> {
        self.get(&format!("/exams/{exam_id}/answer-key"), token).await
    }

    #[instrument(skip(self, token, draft))]
    async fn create_answer_key(
        &self,
        token: &str,
        exam_id: &str,
        draft: &AnswerKeyDraft,
    ) -> ClientResult<AnswerKey> {
        self.post(&format!("/exams/{exam_id}/answer-key"), Some(token), draft)
            .await
    }

    #[instrument(skip(self, token, draft))]
    async fn update_answer_key(
        &self,
        token: &str,
        exam_id: &str,
        draft: &AnswerKeyDraft,
    ) -> ClientResult<AnswerKey> {
        self.put(&format!("/exams/{exam_id}/answer-key"), token, draft)
            .await
    }

    #[instrument(skip(self, token))]
    async fn list_submissions(&self, token: &str, exam_id: &str) -> ClientResult<Vec<Submission>> {
        self.get(&format!("/exams/{exam_id}/submissions"), token)
            .await
    }

    #[instrument(skip(self, token))]
    async fn get_submission(&self, token: &str, submission_id: &str) -> ClientResult<Submission> {
        self.get(&format!("/submissions/{submission_id}"), token)
            .await
    }

    #[instrument(skip(self, token, draft), fields(answers = draft.answers.len()))]
    async fn create_submission(
        &self,
        token: &str,
        exam_id: &str,
        draft: &SubmissionDraft,
    ) -> ClientResult<Submission> {
        self.post(&format!("/exams/{exam_id}/submissions"), Some(token), draft)
            .await
    }

    #[instrument(skip(self, token))]
    async fn correct_submission(
        &self,
        token: &str,
        submission_id: &str,
    ) -> ClientResult<Option<CorrectionResult>> {
        let response = self
            .send(self.request(
                Method::POST,
                &format!("/submissions/{submission_id}/correct"),
                Some(token),
            ))
            .await?;

        // Accepted for later processing.
        if matches!(response.status(), StatusCode::ACCEPTED | StatusCode::NO_CONTENT) {
            return Ok(None);
        }
        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| ClientError::Decode(format!("failed to parse response: {e}")))
    }

    #[instrument(skip(self, token))]
    async fn get_correction_result(
        &self,
        token: &str,
        submission_id: &str,
    ) -> ClientResult<CorrectionResult> {
        self.get(&format!("/submissions/{submission_id}/correction-result"), token)
            .await
    }

    #[instrument(skip(self, token))]
    async fn get_report(&self, token: &str, exam_id: &str) -> ClientResult<ExamReport> {
        self.get(&format!("/exams/{exam_id}/report"), token).await
    }

    #[instrument(skip(self, token))]
    async fn get_statistics(&self, token: &str, exam_id: &str) -> ClientResult<ExamStatistics> {
        self.get(&format!("/exams/{exam_id}/statistics"), token)
            .await
    }

    #[instrument(skip(self, token))]
    async fn list_issues(&self, token: &str, question_id: &str) -> ClientResult<Vec<Issue>> {
        self.get(&format!("/questions/{question_id}/issues"), token)
            .await
    }

    #[instrument(skip(self, token, draft), fields(severity = ?draft.severity))]
    async fn create_issue(
        &self,
        token: &str,
        question_id: &str,
        draft: &IssueDraft,
    ) -> ClientResult<Issue> {
        self.post(&format!("/questions/{question_id}/issues"), Some(token), draft)
            .await
    }
}
