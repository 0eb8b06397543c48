//! In-memory backend for tests and offline demos.
//!
//! Enforces the same status, ownership and uniqueness rules as the real
//! backend and answers with the same error codes, so view models can be
//! exercised end to end without a server.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use gabarito_core::backend::ExamBackend;
use gabarito_core::error::{ClientError, ClientResult};
use gabarito_core::model::{
    AnswerKey, AnswerKeyDraft, CorrectionResult, Credentials, Exam, ExamDraft, ExamReport,
    ExamStatistics, ExamStatus, Issue, IssueDraft, IssueOrigin, Profile, Question, QuestionDetail,
    QuestionDraft, QuestionType, Registration, Role, Session, Submission, SubmissionDraft, User,
    WindowState,
};

struct Account {
    user: User,
    password: String,
}

#[derive(Default)]
struct State {
    accounts: Vec<Account>,
    tokens: HashMap<String, String>,
    exams: BTreeMap<String, Exam>,
    answer_keys: HashMap<String, AnswerKey>,
    submissions: BTreeMap<String, Submission>,
    corrections: HashMap<String, CorrectionResult>,
    pending: HashSet<String>,
    issues: Vec<Issue>,
}

/// A backend that keeps everything in memory.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
    /// Corrections are queued instead of computed on request.
    deferred_correction: bool,
    /// Artificial delay before every call.
    latency: Option<Duration>,
    fail_submission_list: AtomicBool,
    fail_statistics: AtomicBool,
    call_count: AtomicU32,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn not_found(code: &str, message: &str) -> ClientError {
    ClientError::NotFound {
        code: code.into(),
        message: message.into(),
    }
}

fn forbidden(message: &str) -> ClientError {
    ClientError::Forbidden {
        code: "ACCESS_DENIED".into(),
        message: message.into(),
    }
}

fn conflict(code: &str, message: &str) -> ClientError {
    ClientError::Conflict {
        code: code.into(),
        message: message.into(),
    }
}

/// Business rule violation (HTTP 422).
fn rule(code: &str, message: impl Into<String>) -> ClientError {
    ClientError::Api {
        status: 422,
        code: code.into(),
        message: message.into(),
    }
}

fn bad_request(code: &str, message: impl Into<String>) -> ClientError {
    ClientError::Api {
        status: 400,
        code: code.into(),
        message: message.into(),
    }
}

fn unavailable() -> ClientError {
    ClientError::Api {
        status: 503,
        code: String::new(),
        message: String::new(),
    }
}

impl State {
    fn user(&self, token: &str) -> ClientResult<User> {
        self.tokens
            .get(token)
            .and_then(|id| self.accounts.iter().find(|a| &a.user.id == id))
            .map(|a| a.user.clone())
            .ok_or_else(|| ClientError::Unauthorized("Token inválido ou expirado.".into()))
    }

    fn professor(&self, token: &str) -> ClientResult<User> {
        let user = self.user(token)?;
        if user.role != Role::Professor {
            return Err(forbidden("Acesso negado."));
        }
        Ok(user)
    }

    fn start_session(&mut self, user: User) -> Session {
        let token = format!("tok-{}", new_id());
        self.tokens.insert(token.clone(), user.id.clone());
        Session { token, user }
    }

    fn exam(&self, exam_id: &str) -> ClientResult<&Exam> {
        self.exams
            .get(exam_id)
            .ok_or_else(|| not_found("EXAM_NOT_FOUND", "Prova não encontrada com o ID informado."))
    }

    fn exam_mut(&mut self, exam_id: &str) -> ClientResult<&mut Exam> {
        self.exams
            .get_mut(exam_id)
            .ok_or_else(|| not_found("EXAM_NOT_FOUND", "Prova não encontrada com o ID informado."))
    }

    /// Exam readable by `user`: owned drafts for professors, no drafts for students.
    fn readable_exam(&self, exam_id: &str, user: &User) -> ClientResult<&Exam> {
        let exam = self.exam(exam_id)?;
        match user.role {
            Role::Professor if exam.professor_id.as_deref() != Some(user.id.as_str()) => Err(
                forbidden("Você não tem permissão para acessar esta prova."),
            ),
            Role::Student if exam.status == ExamStatus::Draft => {
                Err(not_found("EXAM_NOT_FOUND", "Prova não encontrada."))
            }
            _ => Ok(exam),
        }
    }

    /// Exam owned by `user`, required to be in `status`.
    fn owned_exam_mut(
        &mut self,
        exam_id: &str,
        user: &User,
        status: ExamStatus,
        message: &str,
    ) -> ClientResult<&mut Exam> {
        let exam = self.exam_mut(exam_id)?;
        if exam.professor_id.as_deref() != Some(user.id.as_str()) {
            return Err(forbidden("Você não tem permissão para acessar esta prova."));
        }
        if exam.status != status {
            return Err(rule("INVALID_EXAM_STATUS", message));
        }
        Ok(exam)
    }

    fn exam_id_of_question(&self, question_id: &str) -> ClientResult<String> {
        self.exams
            .values()
            .find(|e| e.questions.iter().any(|q| q.id == question_id))
            .map(|e| e.id.clone())
            .ok_or_else(|| {
                not_found("QUESTION_NOT_FOUND", "Questão não encontrada em nenhuma prova.")
            })
    }

    fn submission(&self, submission_id: &str, user: &User) -> ClientResult<&Submission> {
        let submission = self
            .submissions
            .get(submission_id)
            .ok_or_else(|| not_found("SUBMISSION_NOT_FOUND", "Submissão não encontrada."))?;
        match user.role {
            Role::Student if submission.student_id != user.id => Err(forbidden(
                "Você só pode acessar suas próprias submissões.",
            )),
            Role::Professor => {
                let exam = self.exam(&submission.exam_id)?;
                if exam.professor_id.as_deref() != Some(user.id.as_str()) {
                    return Err(forbidden("Acesso negado."));
                }
                Ok(submission)
            }
            Role::Student => Ok(submission),
        }
    }

    fn run_correction(&mut self, submission_id: &str) -> ClientResult<CorrectionResult> {
        let submission = self
            .submissions
            .get(submission_id)
            .cloned()
            .ok_or_else(|| not_found("SUBMISSION_NOT_FOUND", "Submissão não encontrada."))?;
        let exam = self.exam(&submission.exam_id)?.clone();
        let key = self
            .answer_keys
            .get(&exam.id)
            .ok_or_else(|| rule("ANSWER_KEY_NOT_FOUND", "Gabarito não encontrado para correção."))?;

        let mut correct_count = 0;
        let mut incorrect_count = 0;
        let mut final_grade = 0.0;
        let mut details = Vec::with_capacity(exam.questions.len());

        for question in &exam.questions {
            let expected = key.answers.get(&question.id).cloned();
            let given = submission.answers.get(&question.id).cloned();
            let correct = given.is_some() && given == expected;
            if correct {
                correct_count += 1;
                final_grade += question.score;
            } else if given.is_some() {
                // Blank answers count as neither right nor wrong.
                incorrect_count += 1;
            }
            details.push(QuestionDetail {
                question_id: question.id.clone(),
                correct,
                student_answer: given,
                expected_answer: expected,
                points_earned: if correct { question.score } else { 0.0 },
            });
        }

        let result = CorrectionResult {
            id: Some(new_id()),
            submission_id: Some(submission_id.to_string()),
            correct_count,
            incorrect_count,
            final_grade,
            per_question_detail: details,
        };

        self.pending.remove(submission_id);
        self.corrections
            .insert(submission_id.to_string(), result.clone());
        if let Some(stored) = self.submissions.get_mut(submission_id) {
            stored.corrected = true;
            stored.grade = Some(final_grade);
        }
        Ok(result)
    }

    fn corrected_submissions(&self, exam_id: &str) -> Vec<&Submission> {
        self.submissions
            .values()
            .filter(|s| s.exam_id == exam_id && s.corrected)
            .collect()
    }
}

fn check_question_draft(draft: &QuestionDraft) -> ClientResult<()> {
    if draft.kind == QuestionType::TrueFalse && draft.alternatives.len() != 2 {
        return Err(rule(
            "INVALID_ALTERNATIVES",
            "Questões VERDADEIRO_FALSO devem ter exatamente 2 alternativas.",
        ));
    }
    Ok(())
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue corrections; results appear after [`complete_pending_corrections`].
    ///
    /// [`complete_pending_corrections`]: InMemoryBackend::complete_pending_corrections
    pub fn with_deferred_correction(mut self) -> Self {
        self.deferred_correction = true;
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the submission listing fail.
    pub fn fail_submission_list(&self, fail: bool) {
        self.fail_submission_list.store(fail, Ordering::Relaxed);
    }

    /// Make statistics fail.
    pub fn fail_statistics(&self, fail: bool) {
        self.fail_statistics.store(fail, Ordering::Relaxed);
    }

    /// Number of backend calls made.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Create an account directly, bypassing registration.
    pub fn add_user(&self, name: &str, email: &str, password: &str, role: Role) -> User {
        let user = User {
            id: new_id(),
            name: name.into(),
            email: email.into(),
            role,
        };
        self.lock().accounts.push(Account {
            user: user.clone(),
            password: password.into(),
        });
        user
    }

    /// Run every queued correction. Returns how many completed.
    pub fn complete_pending_corrections(&self) -> usize {
        let mut state = self.lock();
        let pending: Vec<String> = state.pending.iter().cloned().collect();
        let mut completed = 0;
        for id in &pending {
            if state.run_correction(id).is_ok() {
                completed += 1;
            }
        }
        completed
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, call: &str) {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        debug!(call, "in-memory backend call");
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ExamBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn login(&self, credentials: &Credentials) -> ClientResult<Session> {
        self.enter("login").await;
        let mut state = self.lock();
        let user = state
            .accounts
            .iter()
            .find(|a| a.user.email == credentials.email && a.password == credentials.password)
            .map(|a| a.user.clone())
            .ok_or_else(|| ClientError::Unauthorized("Email ou senha inválidos.".into()))?;
        Ok(state.start_session(user))
    }

    async fn register(&self, registration: &Registration) -> ClientResult<Session> {
        self.enter("register").await;
        let mut state = self.lock();
        if state
            .accounts
            .iter()
            .any(|a| a.user.email == registration.email)
        {
            return Err(conflict(
                "EMAIL_ALREADY_EXISTS",
                "Já existe um usuário com este email.",
            ));
        }
        let user = User {
            id: new_id(),
            name: registration.name.clone(),
            email: registration.email.clone(),
            role: registration.role,
        };
        state.accounts.push(Account {
            user: user.clone(),
            password: registration.password.clone(),
        });
        Ok(state.start_session(user))
    }

    async fn me(&self, token: &str) -> ClientResult<Profile> {
        self.enter("me").await;
        let user = self.lock().user(token)?;
        Ok(Profile {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            active: true,
        })
    }

    async fn logout(&self, token: &str) -> ClientResult<()> {
        self.enter("logout").await;
        self.lock().tokens.remove(token);
        Ok(())
    }

    async fn list_exams(&self, token: &str) -> ClientResult<Vec<Exam>> {
        self.enter("list_exams").await;
        let state = self.lock();
        let user = state.user(token)?;
        Ok(state
            .exams
            .values()
            .filter(|e| match user.role {
                Role::Professor => e.professor_id.as_deref() == Some(user.id.as_str()),
                Role::Student => e.status != ExamStatus::Draft,
            })
            .cloned()
            .collect())
    }

    async fn get_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam> {
        self.enter("get_exam").await;
        let state = self.lock();
        let user = state.user(token)?;
        state.readable_exam(exam_id, &user).cloned()
    }

    async fn create_exam(&self, token: &str, draft: &ExamDraft) -> ClientResult<Exam> {
        self.enter("create_exam").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        let exam = Exam {
            id: new_id(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            professor_id: Some(user.id),
            status: ExamStatus::Draft,
            start_date: draft.start_date,
            end_date: draft.end_date,
            questions: Vec::new(),
            created_at: Some(Utc::now()),
        };
        state.exams.insert(exam.id.clone(), exam.clone());
        Ok(exam)
    }

    async fn update_exam(
        &self,
        token: &str,
        exam_id: &str,
        draft: &ExamDraft,
    ) -> ClientResult<Exam> {
        self.enter("update_exam").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        let exam = state.owned_exam_mut(
            exam_id,
            &user,
            ExamStatus::Draft,
            "Apenas provas em RASCUNHO podem ser editadas.",
        )?;
        exam.title = draft.title.clone();
        exam.description = draft.description.clone();
        exam.start_date = draft.start_date;
        exam.end_date = draft.end_date;
        Ok(exam.clone())
    }

    async fn delete_exam(&self, token: &str, exam_id: &str) -> ClientResult<()> {
        self.enter("delete_exam").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        state.owned_exam_mut(
            exam_id,
            &user,
            ExamStatus::Draft,
            "Apenas provas em RASCUNHO podem ser deletadas.",
        )?;
        state.exams.remove(exam_id);
        state.answer_keys.remove(exam_id);
        Ok(())
    }

    async fn publish_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam> {
        self.enter("publish_exam").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        let key = state.answer_keys.get(exam_id).cloned();
        let exam = state.owned_exam_mut(
            exam_id,
            &user,
            ExamStatus::Draft,
            "Apenas provas em RASCUNHO podem ser publicadas.",
        )?;
        if exam.questions.is_empty() {
            return Err(rule(
                "EXAM_NO_QUESTIONS",
                "A prova deve ter pelo menos 1 questão para ser publicada.",
            ));
        }
        let key = key.ok_or_else(|| {
            rule(
                "ANSWER_KEY_REQUIRED",
                "É necessário criar um gabarito antes de publicar a prova.",
            )
        })?;
        if let Some(missing) = key.missing_questions(exam).first() {
            return Err(rule(
                "ANSWER_KEY_INCOMPLETE",
                format!("O gabarito não cobre todas as questões da prova. Faltando: {missing}"),
            ));
        }
        exam.status = ExamStatus::Published;
        Ok(exam.clone())
    }

    async fn close_exam(&self, token: &str, exam_id: &str) -> ClientResult<Exam> {
        self.enter("close_exam").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        let exam = state.owned_exam_mut(
            exam_id,
            &user,
            ExamStatus::Published,
            "Apenas provas PUBLICADAS podem ser encerradas.",
        )?;
        exam.status = ExamStatus::Closed;
        Ok(exam.clone())
    }

    async fn list_questions(&self, token: &str, exam_id: &str) -> ClientResult<Vec<Question>> {
        self.enter("list_questions").await;
        let state = self.lock();
        let user = state.user(token)?;
        Ok(state.readable_exam(exam_id, &user)?.questions.clone())
    }

    async fn add_question(
        &self,
        token: &str,
        exam_id: &str,
        draft: &QuestionDraft,
    ) -> ClientResult<Question> {
        self.enter("add_question").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        let exam = state.owned_exam_mut(
            exam_id,
            &user,
            ExamStatus::Draft,
            "Questões só podem ser adicionadas em provas RASCUNHO.",
        )?;
        check_question_draft(draft)?;
        let question = Question {
            id: new_id(),
            exam_id: Some(exam_id.to_string()),
            order: draft.order,
            statement: draft.statement.clone(),
            kind: draft.kind,
            alternatives: draft.alternatives.clone(),
            score: draft.score,
        };
        exam.questions.push(question.clone());
        Ok(question)
    }

    async fn update_question(
        &self,
        token: &str,
        question_id: &str,
        draft: &QuestionDraft,
    ) -> ClientResult<Question> {
        self.enter("update_question").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        let exam_id = state.exam_id_of_question(question_id)?;
        let exam = state.owned_exam_mut(
            &exam_id,
            &user,
            ExamStatus::Draft,
            "Questões só podem ser editadas em provas RASCUNHO.",
        )?;
        check_question_draft(draft)?;
        let question = exam
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .ok_or_else(|| not_found("QUESTION_NOT_FOUND", "Questão não encontrada."))?;
        question.statement = draft.statement.clone();
        question.kind = draft.kind;
        question.alternatives = draft.alternatives.clone();
        question.score = draft.score;
        question.order = draft.order;
        Ok(question.clone())
    }

    async fn delete_question(&self, token: &str, question_id: &str) -> ClientResult<()> {
        self.enter("delete_question").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        let exam_id = state.exam_id_of_question(question_id)?;
        let exam = state.owned_exam_mut(
            &exam_id,
            &user,
            ExamStatus::Draft,
            "Questões só podem ser removidas em provas RASCUNHO.",
        )?;
        exam.questions.retain(|q| q.id != question_id);
        Ok(())
    }

    async fn get_answer_key(&self, token: &str, exam_id: &str) -> ClientResult<AnswerKey> {
        self.enter("get_answer_key").await;
        let state = self.lock();
        let user = state.professor(token)?;
        state.readable_exam(exam_id, &user)?;
        state
            .answer_keys
            .get(exam_id)
            .cloned()
            .ok_or_else(|| not_found("ANSWER_KEY_NOT_FOUND", "Gabarito não encontrado."))
    }

    async fn create_answer_key(
        &self,
        token: &str,
        exam_id: &str,
        draft: &AnswerKeyDraft,
    ) -> ClientResult<AnswerKey> {
        self.enter("create_answer_key").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        state.readable_exam(exam_id, &user)?;
        if state.answer_keys.contains_key(exam_id) {
            return Err(conflict(
                "ANSWER_KEY_ALREADY_EXISTS",
                "Já existe um gabarito para esta prova. Use PUT para atualizar.",
            ));
        }
        let now = Utc::now();
        let key = AnswerKey {
            id: Some(new_id()),
            exam_id: exam_id.to_string(),
            answers: draft.answers.clone(),
            created_at: Some(now),
            updated_at: Some(now),
        };
        state.answer_keys.insert(exam_id.to_string(), key.clone());
        Ok(key)
    }

    async fn update_answer_key(
        &self,
        token: &str,
        exam_id: &str,
        draft: &AnswerKeyDraft,
    ) -> ClientResult<AnswerKey> {
        self.enter("update_answer_key").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        state.readable_exam(exam_id, &user)?;
        if state.submissions.values().any(|s| s.exam_id == exam_id) {
            return Err(rule(
                "ANSWER_KEY_LOCKED",
                "O gabarito não pode ser alterado após submissões.",
            ));
        }
        let key = state
            .answer_keys
            .get_mut(exam_id)
            .ok_or_else(|| not_found("ANSWER_KEY_NOT_FOUND", "Gabarito não encontrado."))?;
        key.answers = draft.answers.clone();
        key.updated_at = Some(Utc::now());
        Ok(key.clone())
    }

    async fn list_submissions(&self, token: &str, exam_id: &str) -> ClientResult<Vec<Submission>> {
        self.enter("list_submissions").await;
        if self.fail_submission_list.load(Ordering::Relaxed) {
            return Err(unavailable());
        }
        let state = self.lock();
        let user = state.user(token)?;
        let exam = state.exam(exam_id)?;
        if user.role == Role::Professor && exam.professor_id.as_deref() != Some(user.id.as_str()) {
            return Err(forbidden("Acesso negado."));
        }
        Ok(state
            .submissions
            .values()
            .filter(|s| s.exam_id == exam_id)
            .filter(|s| user.role == Role::Professor || s.student_id == user.id)
            .cloned()
            .collect())
    }

    async fn get_submission(&self, token: &str, submission_id: &str) -> ClientResult<Submission> {
        self.enter("get_submission").await;
        let state = self.lock();
        let user = state.user(token)?;
        state.submission(submission_id, &user).cloned()
    }

    async fn create_submission(
        &self,
        token: &str,
        exam_id: &str,
        draft: &SubmissionDraft,
    ) -> ClientResult<Submission> {
        self.enter("create_submission").await;
        let mut state = self.lock();
        let user = state.user(token)?;
        if user.role != Role::Student {
            return Err(forbidden("Acesso negado."));
        }
        let exam = state.exam(exam_id)?;
        if exam.status != ExamStatus::Published {
            return Err(rule(
                "EXAM_NOT_PUBLISHED",
                "A prova não está publicada para submissões.",
            ));
        }
        match exam.window_state(Utc::now()) {
            WindowState::NotStarted => {
                return Err(rule(
                    "EXAM_NOT_STARTED",
                    "A prova ainda não está disponível para submissões.",
                ))
            }
            WindowState::Expired => {
                return Err(rule(
                    "EXAM_EXPIRED",
                    "O prazo para submissões desta prova já encerrou.",
                ))
            }
            WindowState::Open => {}
        }
        if state
            .submissions
            .values()
            .any(|s| s.exam_id == exam_id && s.student_id == user.id)
        {
            return Err(conflict(
                "SUBMISSION_ALREADY_EXISTS",
                "Você já enviou uma submissão para esta prova.",
            ));
        }
        for (question_id, answer) in &draft.answers {
            let question = exam.question(question_id).ok_or_else(|| {
                bad_request("INVALID_QUESTION_ID", format!("Questão inválida: {question_id}"))
            })?;
            if !question.offers(answer) {
                return Err(bad_request(
                    "INVALID_ALTERNATIVE",
                    format!("Alternativa inválida para questão {question_id}: {answer}"),
                ));
            }
        }

        let submission = Submission {
            id: new_id(),
            exam_id: exam_id.to_string(),
            student_id: user.id.clone(),
            student_name: Some(user.name.clone()),
            answers: draft.answers.clone(),
            grade: None,
            corrected: false,
            submitted_at: Some(Utc::now()),
        };
        state
            .submissions
            .insert(submission.id.clone(), submission.clone());
        Ok(submission)
    }

    async fn correct_submission(
        &self,
        token: &str,
        submission_id: &str,
    ) -> ClientResult<Option<CorrectionResult>> {
        self.enter("correct_submission").await;
        let mut state = self.lock();
        let user = state.professor(token)?;
        state.submission(submission_id, &user)?;
        if state.corrections.contains_key(submission_id) {
            return Err(rule("ALREADY_CORRECTED", "Esta submissão já foi corrigida."));
        }
        if self.deferred_correction {
            state.pending.insert(submission_id.to_string());
            return Ok(None);
        }
        state.run_correction(submission_id).map(Some)
    }

    async fn get_correction_result(
        &self,
        token: &str,
        submission_id: &str,
    ) -> ClientResult<CorrectionResult> {
        self.enter("get_correction_result").await;
        let state = self.lock();
        let user = state.user(token)?;
        state.submission(submission_id, &user)?;
        state.corrections.get(submission_id).cloned().ok_or_else(|| {
            not_found(
                "CORRECTION_NOT_FOUND",
                "Resultado de correção não encontrado.",
            )
        })
    }

    async fn get_report(&self, token: &str, exam_id: &str) -> ClientResult<ExamReport> {
        self.enter("get_report").await;
        let state = self.lock();
        let user = state.professor(token)?;
        state.readable_exam(exam_id, &user)?;

        let grades: Vec<f64> = state
            .corrected_submissions(exam_id)
            .iter()
            .filter_map(|s| s.grade)
            .collect();
        if grades.is_empty() {
            return Err(rule(
                "NO_CORRECTED_SUBMISSIONS",
                "Não há submissões corrigidas para gerar relatório.",
            ));
        }
        let average = grades.iter().sum::<f64>() / grades.len() as f64;
        Ok(ExamReport {
            exam_id: Some(exam_id.to_string()),
            average_grade: (average * 100.0).round() / 100.0,
            highest_grade: grades.iter().copied().fold(f64::MIN, f64::max),
            lowest_grade: grades.iter().copied().fold(f64::MAX, f64::min),
            total_submissions: grades.len() as u32,
        })
    }

    async fn get_statistics(&self, token: &str, exam_id: &str) -> ClientResult<ExamStatistics> {
        self.enter("get_statistics").await;
        if self.fail_statistics.load(Ordering::Relaxed) {
            return Err(unavailable());
        }
        let state = self.lock();
        let user = state.professor(token)?;
        let exam = state.readable_exam(exam_id, &user)?;
        let corrected = state.corrected_submissions(exam_id);
        if corrected.is_empty() {
            return Err(rule(
                "NO_CORRECTED_SUBMISSIONS",
                "Não há submissões corrigidas para gerar estatísticas.",
            ));
        }
        let total = corrected.len() as f64;

        let mut accuracy = BTreeMap::new();
        for question in &exam.questions {
            let hits = corrected
                .iter()
                .filter_map(|s| state.corrections.get(&s.id))
                .filter(|c| {
                    c.per_question_detail
                        .iter()
                        .any(|d| d.question_id == question.id && d.correct)
                })
                .count() as f64;
            let pct = (hits * 100.0 / total * 100.0).round() / 100.0;
            accuracy.insert(question.id.clone(), pct);
        }

        let max_grade: f64 = exam.questions.iter().map(|q| q.score).sum();
        let mut distribution: BTreeMap<String, u32> = (0..10)
            .map(|i| (format!("{}-{}%", i * 10, (i + 1) * 10), 0))
            .collect();
        for submission in &corrected {
            let pct = if max_grade > 0.0 {
                submission.grade.unwrap_or(0.0) / max_grade * 100.0
            } else {
                0.0
            };
            let bucket = ((pct / 10.0) as u32).min(9);
            *distribution
                .entry(format!("{}-{}%", bucket * 10, (bucket + 1) * 10))
                .or_default() += 1;
        }

        let mut flagged: Vec<String> = Vec::new();
        for issue in state.issues.iter().filter(|i| i.exam_id.as_deref() == Some(exam_id)) {
            if !flagged.contains(&issue.question_id) {
                flagged.push(issue.question_id.clone());
            }
        }

        Ok(ExamStatistics {
            exam_id: Some(exam_id.to_string()),
            per_question_accuracy: accuracy,
            grade_distribution: distribution,
            flagged_questions: flagged,
        })
    }

    async fn list_issues(&self, token: &str, question_id: &str) -> ClientResult<Vec<Issue>> {
        self.enter("list_issues").await;
        let state = self.lock();
        state.user(token)?;
        Ok(state
            .issues
            .iter()
            .filter(|i| i.question_id == question_id)
            .cloned()
            .collect())
    }

    async fn create_issue(
        &self,
        token: &str,
        question_id: &str,
        draft: &IssueDraft,
    ) -> ClientResult<Issue> {
        self.enter("create_issue").await;
        let mut state = self.lock();
        state.professor(token)?;
        let exam_id = state.exam_id_of_question(question_id)?;
        let issue = Issue {
            id: new_id(),
            question_id: question_id.to_string(),
            exam_id: Some(exam_id),
            problem_type: draft.problem_type.clone(),
            severity: draft.severity,
            description: draft.description.clone(),
            origin: IssueOrigin::Manual,
            identified_at: Some(Utc::now()),
        };
        state.issues.push(issue.clone());
        Ok(issue)
    }
}
