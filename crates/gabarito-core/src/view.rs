//! View models.
//!
//! Each view owns its loaded state and a [`Mount`]. A load takes a [`Ticket`]
//! before its requests go out and applies the responses only if the ticket is
//! still current, so a view that was unmounted meanwhile ignores them.
//! Requests that run side by side (exam and submissions, report and
//! statistics) are joined and reconciled independently.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

use crate::backend::ExamBackend;
use crate::display::{self, AccuracyRow, CorrectionSummary};
use crate::error::{ClientError, ClientResult, Rejection};
use crate::labels::fallback;
use crate::lifecycle::{permit, Affordances, CommandOutcome, ExamAction, ExamCommand, ExamController};
use crate::model::{
    AnswerKey, Answers, CorrectionResult, Exam, ExamReport, ExamStatistics, Issue, IssueDraft,
    Role, Session, Submission, SubmissionDraft, WindowState,
};

/// Error code the backend sends when a submission has no correction yet.
pub const CORRECTION_NOT_FOUND: &str = "CORRECTION_NOT_FOUND";

/// Error code the backend sends when correcting twice.
pub const ALREADY_CORRECTED: &str = "ALREADY_CORRECTED";

// ---------------------------------------------------------------------------
// Mount epochs
// ---------------------------------------------------------------------------

/// Mount state of a view. Clones share the same epoch.
#[derive(Debug, Clone, Default)]
pub struct Mount {
    epoch: Arc<AtomicU64>,
}

impl Mount {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket for a request issued now.
    pub fn ticket(&self) -> Ticket {
        Ticket {
            epoch: self.epoch.load(Ordering::SeqCst),
            mount: Arc::clone(&self.epoch),
        }
    }

    /// Invalidate every outstanding ticket.
    pub fn unmount(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

/// Proof that a response belongs to the current mount.
#[derive(Debug, Clone)]
pub struct Ticket {
    epoch: u64,
    mount: Arc<AtomicU64>,
}

impl Ticket {
    pub fn is_current(&self) -> bool {
        self.mount.load(Ordering::SeqCst) == self.epoch
    }
}

/// Whether a load changed the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    Applied,
    /// The view was unmounted before the response arrived.
    Discarded,
}

/// What a view currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState<T> {
    Loading,
    Ready(T),
    /// User-facing error message.
    Failed(String),
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        ViewState::Loading
    }
}

impl<T> ViewState<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            ViewState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ViewState::Failed(message) => Some(message),
            _ => None,
        }
    }

    fn from_result(result: ClientResult<T>, fallback: &str) -> Self {
        match result {
            Ok(value) => ViewState::Ready(value),
            Err(e) => {
                warn!("load failed: {e}");
                ViewState::Failed(e.user_message(fallback))
            }
        }
    }
}

fn stale(view: &str) -> Load {
    debug!(view, "discarding response for unmounted view");
    Load::Discarded
}

// ---------------------------------------------------------------------------
// Exam list
// ---------------------------------------------------------------------------

/// Exams the viewer may see. Students never see drafts.
pub fn visible_exams(exams: Vec<Exam>, role: Role) -> Vec<Exam> {
    exams
        .into_iter()
        .filter(|e| Affordances::compute(e.status, role, false).visible)
        .collect()
}

// ---------------------------------------------------------------------------
// Exam detail
// ---------------------------------------------------------------------------

/// An exam with its submissions as seen by one user.
#[derive(Debug, Clone, PartialEq)]
pub struct ExamDetail {
    pub exam: Exam,
    /// Every submission for professors, the viewer's own for students.
    pub submissions: Vec<Submission>,
    pub affordances: Affordances,
    viewer_id: String,
    viewer_role: Role,
}

impl ExamDetail {
    pub fn new(exam: Exam, submissions: Vec<Submission>, session: &Session) -> Self {
        let mut detail = Self {
            affordances: Affordances::compute(exam.status, session.role(), false),
            exam,
            submissions,
            viewer_id: session.user.id.clone(),
            viewer_role: session.role(),
        };
        detail.refresh_affordances();
        detail
    }

    /// The viewing student's submission.
    pub fn own_submission(&self) -> Option<&Submission> {
        if self.viewer_role != Role::Student {
            return None;
        }
        self.submissions
            .iter()
            .find(|s| s.student_id == self.viewer_id)
            .or_else(|| self.submissions.first())
    }

    pub fn already_submitted(&self) -> bool {
        self.own_submission().is_some()
    }

    /// The action offered next to one submission in the list.
    pub fn submission_action(&self, submission: &Submission) -> Option<ExamAction> {
        match self.viewer_role {
            Role::Professor if submission.corrected => Some(ExamAction::ViewResult)
                .filter(|a| self.affordances.allows(*a)),
            Role::Professor => Some(ExamAction::Correct).filter(|a| self.affordances.allows(*a)),
            Role::Student => Some(ExamAction::ViewResult).filter(|a| self.affordances.allows(*a)),
        }
    }

    fn refresh_affordances(&mut self) {
        let has_submission = self.already_submitted();
        self.affordances = Affordances::compute(self.exam.status, self.viewer_role, has_submission);
    }
}

/// Fetch an exam and its submissions concurrently.
///
/// A failed submissions request yields an empty list; only the exam request
/// can fail the load.
pub async fn fetch_exam_detail(
    backend: &dyn ExamBackend,
    session: &Session,
    exam_id: &str,
) -> ClientResult<ExamDetail> {
    let token = session.token.as_str();
    let (exam, submissions) = futures::join!(
        backend.get_exam(token, exam_id),
        backend.list_submissions(token, exam_id),
    );
    let exam = exam?;
    let submissions = submissions.unwrap_or_else(|e| {
        debug!(exam = exam_id, "no submissions loaded: {e}");
        Vec::new()
    });
    Ok(ExamDetail::new(exam, submissions, session))
}

/// Local mirror of the backend's submission rules.
pub fn check_submission(
    exam: &Exam,
    role: Role,
    already_submitted: bool,
    answers: &Answers,
    now: DateTime<Utc>,
) -> Result<(), Rejection> {
    permit(exam.status, role, ExamAction::Submit, false)?;

    match exam.window_state(now) {
        WindowState::NotStarted => return Err(Rejection::NotStarted),
        WindowState::Expired => return Err(Rejection::Expired),
        WindowState::Open => {}
    }

    if already_submitted {
        return Err(Rejection::AlreadySubmitted);
    }

    for (question_id, answer) in answers {
        let question = exam
            .question(question_id)
            .ok_or_else(|| Rejection::UnknownQuestion(question_id.clone()))?;
        if !question.offers(answer) {
            return Err(Rejection::UnknownAlternative {
                question_id: question_id.clone(),
                answer: answer.clone(),
            });
        }
    }
    Ok(())
}

/// The exam detail screen.
#[derive(Debug)]
pub struct ExamDetailView {
    exam_id: String,
    mount: Mount,
    state: ViewState<ExamDetail>,
}

impl ExamDetailView {
    pub fn new(exam_id: impl Into<String>) -> Self {
        Self {
            exam_id: exam_id.into(),
            mount: Mount::new(),
            state: ViewState::Loading,
        }
    }

    pub fn exam_id(&self) -> &str {
        &self.exam_id
    }

    pub fn mount(&self) -> &Mount {
        &self.mount
    }

    pub fn state(&self) -> &ViewState<ExamDetail> {
        &self.state
    }

    pub fn detail(&self) -> Option<&ExamDetail> {
        self.state.ready()
    }

    #[instrument(skip(self, backend, session), fields(exam = %self.exam_id))]
    pub async fn load(&mut self, backend: &dyn ExamBackend, session: &Session) -> Load {
        let ticket = self.mount.ticket();
        let fetched = fetch_exam_detail(backend, session, &self.exam_id).await;
        if !ticket.is_current() {
            return stale("exam detail");
        }
        self.state = ViewState::from_result(fetched, fallback::LOAD_EXAM);
        Load::Applied
    }

    /// Submit the viewing student's answers.
    ///
    /// On success the submission joins the list, which hides the submit
    /// action and offers the result instead.
    #[instrument(skip(self, backend, session, answers), fields(exam = %self.exam_id))]
    pub async fn submit(
        &mut self,
        backend: &dyn ExamBackend,
        session: &Session,
        answers: Answers,
        now: DateTime<Utc>,
    ) -> ClientResult<Submission> {
        let detail = self.detail().ok_or(Rejection::NotLoaded)?;
        check_submission(
            &detail.exam,
            session.role(),
            detail.already_submitted(),
            &answers,
            now,
        )?;

        let ticket = self.mount.ticket();
        let submission = backend
            .create_submission(&session.token, &self.exam_id, &SubmissionDraft { answers })
            .await?;
        info!(submission = %submission.id, "submission sent");

        if ticket.is_current() {
            if let ViewState::Ready(detail) = &mut self.state {
                detail.submissions.push(submission.clone());
                detail.refresh_affordances();
            }
        }
        Ok(submission)
    }

    /// Correct one submission from the professor's list.
    #[instrument(skip(self, backend, session), fields(exam = %self.exam_id))]
    pub async fn correct(
        &mut self,
        backend: &dyn ExamBackend,
        session: &Session,
        submission_id: &str,
    ) -> ClientResult<CorrectionState> {
        let detail = self.detail().ok_or(Rejection::NotLoaded)?;
        permit(detail.exam.status, session.role(), ExamAction::Correct, false)?;
        if detail
            .submissions
            .iter()
            .any(|s| s.id == submission_id && s.corrected)
        {
            return Err(Rejection::AlreadyCorrected.into());
        }

        let ticket = self.mount.ticket();
        let state = request_correction(backend, session, submission_id).await?;

        if let (true, CorrectionState::Ready(result), ViewState::Ready(detail)) =
            (ticket.is_current(), &state, &mut self.state)
        {
            if let Some(submission) = detail.submissions.iter_mut().find(|s| s.id == submission_id) {
                submission.corrected = true;
                submission.grade = Some(result.final_grade);
            }
        }
        Ok(state)
    }

    /// Run a lifecycle command and adopt the exam snapshot it returns.
    ///
    /// A deleted exam leaves the view with nothing loaded.
    pub async fn execute(
        &mut self,
        controller: &ExamController<'_>,
        command: ExamCommand,
    ) -> ClientResult<CommandOutcome> {
        let exam = self
            .detail()
            .map(|d| d.exam.clone())
            .ok_or(Rejection::NotLoaded)?;

        let ticket = self.mount.ticket();
        let outcome = controller.execute(&exam, command).await?;

        if ticket.is_current() {
            match (&outcome, &mut self.state) {
                (CommandOutcome::Deleted, state) => *state = ViewState::Loading,
                (CommandOutcome::Exam(updated), ViewState::Ready(detail)) => {
                    detail.exam = updated.clone();
                    detail.refresh_affordances();
                }
                _ => {}
            }
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Correction
// ---------------------------------------------------------------------------

/// A correction result, or the fact that there is none yet.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrectionState {
    Ready(CorrectionResult),
    Pending,
}

impl CorrectionState {
    pub fn result(&self) -> Option<&CorrectionResult> {
        match self {
            CorrectionState::Ready(result) => Some(result),
            CorrectionState::Pending => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, CorrectionState::Pending)
    }
}

fn is_missing_correction(err: &ClientError) -> bool {
    match err {
        ClientError::NotFound { code, .. } => code.is_empty() || code == CORRECTION_NOT_FOUND,
        _ => false,
    }
}

/// Read the correction result. "Not corrected yet" is [`CorrectionState::Pending`].
pub async fn fetch_result(
    backend: &dyn ExamBackend,
    token: &str,
    submission_id: &str,
) -> ClientResult<CorrectionState> {
    match backend.get_correction_result(token, submission_id).await {
        Ok(result) => Ok(CorrectionState::Ready(result)),
        Err(e) if is_missing_correction(&e) => {
            debug!(submission = submission_id, "correction not available yet");
            Ok(CorrectionState::Pending)
        }
        Err(e) => Err(e),
    }
}

/// Ask the backend to correct a submission.
///
/// A submission that turns out to be corrected already yields its existing
/// result.
pub async fn request_correction(
    backend: &dyn ExamBackend,
    session: &Session,
    submission_id: &str,
) -> ClientResult<CorrectionState> {
    if session.role() != Role::Professor {
        return Err(Rejection::ProfessorOnly.into());
    }
    match backend.correct_submission(&session.token, submission_id).await {
        Ok(Some(result)) => {
            info!(submission = submission_id, grade = result.final_grade, "submission corrected");
            Ok(CorrectionState::Ready(result))
        }
        Ok(None) => Ok(CorrectionState::Pending),
        Err(e) if e.code() == Some(ALREADY_CORRECTED) => {
            fetch_result(backend, &session.token, submission_id).await
        }
        Err(e) => Err(e),
    }
}

/// How long [`await_result`] keeps asking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_secs(2),
        }
    }
}

/// Poll for a result until it is ready or the attempts run out.
pub async fn await_result(
    backend: &dyn ExamBackend,
    token: &str,
    submission_id: &str,
    policy: PollPolicy,
) -> ClientResult<CorrectionState> {
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        let state = fetch_result(backend, token, submission_id).await?;
        if !state.is_pending() || attempt == attempts {
            return Ok(state);
        }
        debug!(submission = submission_id, attempt, "result pending, waiting");
        tokio::time::sleep(policy.interval).await;
    }
    Ok(CorrectionState::Pending)
}

/// The correction result screen.
#[derive(Debug)]
pub struct CorrectionView {
    submission_id: String,
    mount: Mount,
    state: ViewState<CorrectionState>,
}

impl CorrectionView {
    pub fn new(submission_id: impl Into<String>) -> Self {
        Self {
            submission_id: submission_id.into(),
            mount: Mount::new(),
            state: ViewState::Loading,
        }
    }

    pub fn mount(&self) -> &Mount {
        &self.mount
    }

    pub fn state(&self) -> &ViewState<CorrectionState> {
        &self.state
    }

    pub async fn load(&mut self, backend: &dyn ExamBackend, session: &Session) -> Load {
        let ticket = self.mount.ticket();
        let fetched = fetch_result(backend, &session.token, &self.submission_id).await;
        if !ticket.is_current() {
            return stale("correction");
        }
        self.state = ViewState::from_result(fetched, fallback::RESULT);
        Load::Applied
    }

    /// Like [`CorrectionView::load`], but keeps polling while pending.
    pub async fn wait(
        &mut self,
        backend: &dyn ExamBackend,
        session: &Session,
        policy: PollPolicy,
    ) -> Load {
        let ticket = self.mount.ticket();
        let fetched = await_result(backend, &session.token, &self.submission_id, policy).await;
        if !ticket.is_current() {
            return stale("correction");
        }
        self.state = ViewState::from_result(fetched, fallback::RESULT);
        Load::Applied
    }

    pub fn summary(&self, exam: Option<&Exam>) -> Option<CorrectionSummary> {
        self.state
            .ready()
            .and_then(CorrectionState::result)
            .map(|result| CorrectionSummary::new(result, exam))
    }
}

// ---------------------------------------------------------------------------
// Report and statistics
// ---------------------------------------------------------------------------

/// Report page contents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportData {
    pub report: Option<ExamReport>,
    pub statistics: Option<ExamStatistics>,
    /// Why the report could not be loaded.
    pub error: Option<String>,
}

impl ReportData {
    /// Nothing to show and nothing went wrong.
    pub fn has_no_data(&self) -> bool {
        self.report.is_none() && self.error.is_none()
    }

    pub fn accuracy_rows(&self, exam: Option<&Exam>) -> Vec<AccuracyRow> {
        self.statistics
            .as_ref()
            .map(|s| display::accuracy_rows(s, exam))
            .unwrap_or_default()
    }

    pub fn distribution_rows(&self) -> Vec<(String, u32)> {
        self.statistics
            .as_ref()
            .map(display::distribution_rows)
            .unwrap_or_default()
    }
}

/// Load report and statistics side by side.
///
/// A report failure is reported; a statistics failure just leaves them out.
pub async fn fetch_report(backend: &dyn ExamBackend, token: &str, exam_id: &str) -> ReportData {
    let (report, statistics) = futures::join!(
        backend.get_report(token, exam_id),
        backend.get_statistics(token, exam_id),
    );

    let mut data = ReportData::default();
    match report {
        Ok(report) => data.report = Some(report),
        Err(e) => data.error = Some(e.user_message(fallback::REPORT)),
    }
    match statistics {
        Ok(statistics) => data.statistics = Some(statistics),
        Err(e) => debug!(exam = exam_id, "statistics unavailable: {e}"),
    }
    data
}

/// The report and statistics screen.
#[derive(Debug)]
pub struct ReportView {
    exam_id: String,
    mount: Mount,
    data: Option<ReportData>,
}

impl ReportView {
    pub fn new(exam_id: impl Into<String>) -> Self {
        Self {
            exam_id: exam_id.into(),
            mount: Mount::new(),
            data: None,
        }
    }

    pub fn mount(&self) -> &Mount {
        &self.mount
    }

    pub fn data(&self) -> Option<&ReportData> {
        self.data.as_ref()
    }

    pub async fn load(&mut self, backend: &dyn ExamBackend, session: &Session) -> Load {
        let ticket = self.mount.ticket();
        let data = fetch_report(backend, &session.token, &self.exam_id).await;
        if !ticket.is_current() {
            return stale("report");
        }
        self.data = Some(data);
        Load::Applied
    }
}

// ---------------------------------------------------------------------------
// Answer key
// ---------------------------------------------------------------------------

/// The answer key editor: the exam plus its key, if one exists.
#[derive(Debug)]
pub struct AnswerKeyView {
    exam_id: String,
    mount: Mount,
    state: ViewState<(Exam, Option<AnswerKey>)>,
}

impl AnswerKeyView {
    pub fn new(exam_id: impl Into<String>) -> Self {
        Self {
            exam_id: exam_id.into(),
            mount: Mount::new(),
            state: ViewState::Loading,
        }
    }

    pub fn mount(&self) -> &Mount {
        &self.mount
    }

    pub fn state(&self) -> &ViewState<(Exam, Option<AnswerKey>)> {
        &self.state
    }

    pub fn exam(&self) -> Option<&Exam> {
        self.state.ready().map(|(exam, _)| exam)
    }

    pub fn answer_key(&self) -> Option<&AnswerKey> {
        self.state.ready().and_then(|(_, key)| key.as_ref())
    }

    /// Load the exam and its key. A missing key is not an error.
    pub async fn load(&mut self, backend: &dyn ExamBackend, session: &Session) -> Load {
        let ticket = self.mount.ticket();
        let token = session.token.as_str();
        let (exam, key) = futures::join!(
            backend.get_exam(token, &self.exam_id),
            backend.get_answer_key(token, &self.exam_id),
        );
        if !ticket.is_current() {
            return stale("answer key");
        }

        let key = match key {
            Ok(key) => Some(key),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(exam = %self.exam_id, "answer key not loaded: {e}");
                }
                None
            }
        };
        self.state = ViewState::from_result(exam.map(|exam| (exam, key)), fallback::LOAD);
        Load::Applied
    }

    /// Save the key, replacing it when one was loaded.
    pub async fn save(
        &mut self,
        controller: &ExamController<'_>,
        answers: Answers,
    ) -> ClientResult<AnswerKey> {
        let (exam, existing) = self.state.ready().ok_or(Rejection::NotLoaded)?;
        let command = ExamCommand::SaveAnswerKey {
            answers,
            replace: existing.is_some(),
        };

        let ticket = self.mount.ticket();
        let outcome = controller.execute(exam, command).await?;
        let CommandOutcome::AnswerKey(key) = outcome else {
            return Err(ClientError::Decode("expected an answer key".into()));
        };

        if ticket.is_current() {
            if let ViewState::Ready((_, slot)) = &mut self.state {
                *slot = Some(key.clone());
            }
        }
        Ok(key)
    }
}

// ---------------------------------------------------------------------------
// Question issues
// ---------------------------------------------------------------------------

/// Issues registered for one question.
#[derive(Debug)]
pub struct IssuesView {
    question_id: String,
    mount: Mount,
    issues: Vec<Issue>,
}

impl IssuesView {
    pub fn new(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            mount: Mount::new(),
            issues: Vec::new(),
        }
    }

    pub fn mount(&self) -> &Mount {
        &self.mount
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// Load the issue list. A failed request shows an empty list.
    pub async fn load(&mut self, backend: &dyn ExamBackend, session: &Session) -> Load {
        let ticket = self.mount.ticket();
        let fetched = backend.list_issues(&session.token, &self.question_id).await;
        if !ticket.is_current() {
            return stale("issues");
        }
        self.issues = fetched.unwrap_or_else(|e| {
            debug!(question = %self.question_id, "issues unavailable: {e}");
            Vec::new()
        });
        Load::Applied
    }

    /// Register an issue by hand, then reload the list.
    pub async fn create(
        &mut self,
        backend: &dyn ExamBackend,
        session: &Session,
        draft: &IssueDraft,
    ) -> ClientResult<Issue> {
        if session.role() != Role::Professor {
            return Err(Rejection::ProfessorOnly.into());
        }
        if draft.problem_type.trim().is_empty() {
            return Err(Rejection::Blank("problem type").into());
        }
        if draft.description.trim().is_empty() {
            return Err(Rejection::Blank("description").into());
        }

        let issue = backend
            .create_issue(&session.token, &self.question_id, draft)
            .await?;
        info!(issue = %issue.id, question = %self.question_id, "issue registered");
        self.load(backend, session).await;
        Ok(issue)
    }
}
