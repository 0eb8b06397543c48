//! Core data model types for gabarito.
//!
//! These mirror the JSON shapes the exam-correction backend speaks. Field and
//! variant names are English; the `serde` attributes carry the wire names.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Users and sessions
// ---------------------------------------------------------------------------

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "PROFESSOR")]
    Professor,
    #[serde(rename = "ALUNO")]
    Student,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Professor => write!(f, "PROFESSOR"),
            Role::Student => write!(f, "ALUNO"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "professor" | "teacher" => Ok(Role::Professor),
            "aluno" | "student" => Ok(Role::Student),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Identity of the logged-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

/// An authenticated session: bearer token plus the user it belongs to.
///
/// `Debug` masks the token so sessions can be logged safely.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    /// A session only counts as authenticated when it carries a token.
    pub fn is_authenticated(&self) -> bool {
        !self.token.trim().is_empty()
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &"***")
            .field("user", &self.user)
            .finish()
    }
}

/// Body returned by `/auth/login` and `/auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
}

impl From<AuthResponse> for Session {
    fn from(auth: AuthResponse) -> Self {
        Session {
            token: auth.token,
            user: User {
                id: auth.user_id,
                name: auth.name,
                email: auth.email,
                role: auth.role,
            },
        }
    }
}

/// Body returned by `/auth/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub role: Role,
    #[serde(rename = "ativo", default = "default_true")]
    pub active: bool,
}

impl From<Profile> for User {
    fn from(profile: Profile) -> Self {
        User {
            id: profile.id,
            name: profile.name,
            email: profile.email,
            role: profile.role,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Login form.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// Registration form.
#[derive(Clone, Serialize, Deserialize)]
pub struct Registration {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(rename = "senha")]
    pub password: String,
    pub role: Role,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"***")
            .field("role", &self.role)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Exams and questions
// ---------------------------------------------------------------------------

/// Lifecycle status of an exam. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ExamStatus {
    #[serde(rename = "RASCUNHO")]
    Draft,
    #[serde(rename = "PUBLICADA")]
    Published,
    #[serde(rename = "ENCERRADA")]
    Closed,
}

impl fmt::Display for ExamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExamStatus::Draft => write!(f, "RASCUNHO"),
            ExamStatus::Published => write!(f, "PUBLICADA"),
            ExamStatus::Closed => write!(f, "ENCERRADA"),
        }
    }
}

/// Kind of question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionType {
    #[serde(rename = "OBJETIVA")]
    Objective,
    #[serde(rename = "VERDADEIRO_FALSO")]
    TrueFalse,
    #[serde(rename = "DISSERTATIVA")]
    Essay,
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionType::Objective => write!(f, "OBJETIVA"),
            QuestionType::TrueFalse => write!(f, "VERDADEIRO_FALSO"),
            QuestionType::Essay => write!(f, "DISSERTATIVA"),
        }
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "objective" | "objetiva" => Ok(QuestionType::Objective),
            "true_false" | "truefalse" | "verdadeiro_falso" => Ok(QuestionType::TrueFalse),
            "essay" | "dissertativa" => Ok(QuestionType::Essay),
            other => Err(format!("unknown question type: {other}")),
        }
    }
}

/// A question inside an exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    /// Owning exam. The backend embeds questions in the exam document and
    /// does not always echo this back.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exam_id: Option<String>,
    #[serde(rename = "ordem")]
    pub order: u32,
    #[serde(rename = "enunciado")]
    pub statement: String,
    #[serde(rename = "tipo")]
    pub kind: QuestionType,
    #[serde(rename = "alternativas", default)]
    pub alternatives: Vec<String>,
    #[serde(rename = "pontuacao")]
    pub score: f64,
}

impl Question {
    pub fn offers(&self, alternative: &str) -> bool {
        self.alternatives.iter().any(|a| a == alternative)
    }
}

/// An exam as returned by `/exams/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exam {
    pub id: String,
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub professor_id: Option<String>,
    pub status: ExamStatus,
    #[serde(rename = "dataInicio", default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(rename = "dataFim", default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(rename = "dataCriacao", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Exam {
    /// Questions in presentation order.
    pub fn ordered_questions(&self) -> Vec<&Question> {
        let mut questions: Vec<&Question> = self.questions.iter().collect();
        questions.sort_by_key(|q| q.order);
        questions
    }

    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Whether `now` falls inside the optional submission window.
    pub fn window_state(&self, now: DateTime<Utc>) -> WindowState {
        if self.start_date.is_some_and(|start| now < start) {
            WindowState::NotStarted
        } else if self.end_date.is_some_and(|end| now > end) {
            WindowState::Expired
        } else {
            WindowState::Open
        }
    }
}

/// Where a point in time sits relative to an exam's submission window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    NotStarted,
    Open,
    Expired,
}

/// Create/update body for an exam.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExamDraft {
    #[serde(rename = "titulo")]
    pub title: String,
    #[serde(rename = "descricao", default)]
    pub description: Option<String>,
    #[serde(rename = "dataInicio", default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(rename = "dataFim", default)]
    pub end_date: Option<DateTime<Utc>>,
}

impl From<&Exam> for ExamDraft {
    fn from(exam: &Exam) -> Self {
        ExamDraft {
            title: exam.title.clone(),
            description: exam.description.clone(),
            start_date: exam.start_date,
            end_date: exam.end_date,
        }
    }
}

/// Create/update body for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
    #[serde(rename = "enunciado")]
    pub statement: String,
    #[serde(rename = "tipo")]
    pub kind: QuestionType,
    #[serde(rename = "alternativas")]
    pub alternatives: Vec<String>,
    #[serde(rename = "pontuacao")]
    pub score: f64,
    #[serde(rename = "ordem")]
    pub order: u32,
}

/// Mapping of question id to the correct alternative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerKey {
    #[serde(default)]
    pub id: Option<String>,
    pub exam_id: String,
    #[serde(rename = "respostas", default)]
    pub answers: BTreeMap<String, String>,
    #[serde(rename = "dataCriacao", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "dataAtualizacao", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AnswerKey {
    /// Ids of exam questions the key has no answer for.
    pub fn missing_questions<'a>(&self, exam: &'a Exam) -> Vec<&'a str> {
        exam.questions
            .iter()
            .filter(|q| !self.answers.contains_key(&q.id))
            .map(|q| q.id.as_str())
            .collect()
    }
}

/// Body for creating or replacing an answer key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerKeyDraft {
    #[serde(rename = "respostas")]
    pub answers: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Submissions and corrections
// ---------------------------------------------------------------------------

/// Answers chosen by a student, keyed by question id.
pub type Answers = BTreeMap<String, String>;

/// A student's single attempt at an exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub exam_id: String,
    #[serde(rename = "alunoId")]
    pub student_id: String,
    #[serde(rename = "alunoNome", default)]
    pub student_name: Option<String>,
    #[serde(rename = "respostas", default)]
    pub answers: Answers,
    #[serde(rename = "nota", default)]
    pub grade: Option<f64>,
    #[serde(rename = "corrigida", default)]
    pub corrected: bool,
    #[serde(rename = "dataEnvio", default)]
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Body for creating a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDraft {
    #[serde(rename = "respostas")]
    pub answers: Answers,
}

/// Per-question line of a correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDetail {
    pub question_id: String,
    #[serde(rename = "correta")]
    pub correct: bool,
    #[serde(rename = "respostaAluno", default)]
    pub student_answer: Option<String>,
    #[serde(rename = "respostaEsperada", default)]
    pub expected_answer: Option<String>,
    #[serde(rename = "pontuacaoObtida", default)]
    pub points_earned: f64,
}

/// Outcome of correcting a submission. Read-only, produced by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionResult {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub submission_id: Option<String>,
    #[serde(rename = "acertos")]
    pub correct_count: u32,
    #[serde(rename = "erros")]
    pub incorrect_count: u32,
    #[serde(rename = "notaFinal")]
    pub final_grade: f64,
    #[serde(rename = "detalhesPorQuestao", default)]
    pub per_question_detail: Vec<QuestionDetail>,
}

// ---------------------------------------------------------------------------
// Reports, statistics and issues
// ---------------------------------------------------------------------------

/// Grade summary for an exam.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamReport {
    #[serde(default)]
    pub exam_id: Option<String>,
    #[serde(rename = "mediaNotas")]
    pub average_grade: f64,
    #[serde(rename = "maiorNota")]
    pub highest_grade: f64,
    #[serde(rename = "menorNota")]
    pub lowest_grade: f64,
    #[serde(rename = "totalSubmissoes")]
    pub total_submissions: u32,
}

/// Backend-computed per-exam statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamStatistics {
    #[serde(default)]
    pub exam_id: Option<String>,
    /// Question id to percentage of correct answers.
    #[serde(rename = "percentualAcertoPorQuestao", default)]
    pub per_question_accuracy: BTreeMap<String, f64>,
    /// Grade bucket label to number of submissions.
    #[serde(rename = "distribuicaoNotas", default)]
    pub grade_distribution: BTreeMap<String, u32>,
    #[serde(rename = "questoesComProblema", default)]
    pub flagged_questions: Vec<String>,
}

/// How serious an issue is.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Severity {
    #[serde(rename = "BAIXA")]
    Low,
    #[default]
    #[serde(rename = "MEDIA")]
    Medium,
    #[serde(rename = "ALTA")]
    High,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" | "baixa" => Ok(Severity::Low),
            "medium" | "media" | "média" => Ok(Severity::Medium),
            "high" | "alta" => Ok(Severity::High),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// Who raised an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueOrigin {
    /// Registered by a professor. Some backends send `PROFESSOR`.
    #[serde(rename = "MANUAL", alias = "PROFESSOR")]
    Manual,
    /// Raised by the backend's statistics run. Some backends send `SISTEMA`.
    #[serde(rename = "AUTOMATICO", alias = "SISTEMA")]
    Automatic,
}

/// A flagged problem on a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub question_id: String,
    #[serde(default)]
    pub exam_id: Option<String>,
    #[serde(rename = "tipoProblema")]
    pub problem_type: String,
    #[serde(rename = "severidade")]
    pub severity: Severity,
    #[serde(rename = "descricao")]
    pub description: String,
    #[serde(rename = "geradoPor")]
    pub origin: IssueOrigin,
    #[serde(rename = "dataIdentificacao", default)]
    pub identified_at: Option<DateTime<Utc>>,
}

/// Body for registering an issue by hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueDraft {
    #[serde(rename = "tipoProblema")]
    pub problem_type: String,
    #[serde(rename = "severidade", default)]
    pub severity: Severity,
    #[serde(rename = "descricao")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_display_and_parse() {
        assert_eq!(Role::Student.to_string(), "ALUNO");
        assert_eq!("professor".parse::<Role>().unwrap(), Role::Professor);
        assert_eq!("ALUNO".parse::<Role>().unwrap(), Role::Student);
        assert_eq!("student".parse::<Role>().unwrap(), Role::Student);
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn auth_response_becomes_session() {
        let json = r#"{"token":"t-1","userId":"u-1","nome":"Ana","email":"ana@x.io","role":"ALUNO"}"#;
        let auth: AuthResponse = serde_json::from_str(json).unwrap();
        let session = Session::from(auth);
        assert!(session.is_authenticated());
        assert_eq!(session.user.id, "u-1");
        assert_eq!(session.role(), Role::Student);
    }

    #[test]
    fn session_debug_masks_token() {
        let session = Session {
            token: "secret-token".into(),
            user: User {
                id: "u".into(),
                name: "n".into(),
                email: String::new(),
                role: Role::Professor,
            },
        };
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn blank_token_is_unauthenticated() {
        let session = Session {
            token: "  ".into(),
            user: User {
                id: "u".into(),
                name: "n".into(),
                email: String::new(),
                role: Role::Professor,
            },
        };
        assert!(!session.is_authenticated());
    }

    #[test]
    fn exam_decodes_wire_names() {
        let json = r#"{
            "id": "e1",
            "titulo": "Prova 1",
            "descricao": null,
            "professorId": "p1",
            "status": "PUBLICADA",
            "questions": [
                {"id": "q2", "ordem": 2, "enunciado": "B?", "tipo": "VERDADEIRO_FALSO",
                 "alternativas": ["V", "F"], "pontuacao": 1.0},
                {"id": "q1", "ordem": 1, "enunciado": "A?", "tipo": "OBJETIVA",
                 "alternativas": ["a", "b", "c"], "pontuacao": 2.5}
            ],
            "dataCriacao": "2025-03-01T12:00:00Z"
        }"#;
        let exam: Exam = serde_json::from_str(json).unwrap();
        assert_eq!(exam.status, ExamStatus::Published);
        let ordered: Vec<&str> = exam.ordered_questions().iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ordered, vec!["q1", "q2"]);
        assert!(exam.question("q1").unwrap().offers("b"));
        assert!(!exam.question("q2").unwrap().offers("b"));
    }

    #[test]
    fn window_state_respects_dates() {
        let now: DateTime<Utc> = "2025-06-01T10:00:00Z".parse().unwrap();
        let mut exam = Exam {
            id: "e".into(),
            title: "t".into(),
            description: None,
            professor_id: None,
            status: ExamStatus::Published,
            start_date: None,
            end_date: None,
            questions: vec![],
            created_at: None,
        };
        assert_eq!(exam.window_state(now), WindowState::Open);

        exam.start_date = Some("2025-06-02T00:00:00Z".parse().unwrap());
        assert_eq!(exam.window_state(now), WindowState::NotStarted);

        exam.start_date = None;
        exam.end_date = Some("2025-05-31T00:00:00Z".parse().unwrap());
        assert_eq!(exam.window_state(now), WindowState::Expired);
    }

    #[test]
    fn credentials_serialize_with_wire_names() {
        let creds = Credentials {
            email: "a@b.c".into(),
            password: "pw".into(),
        };
        let value = serde_json::to_value(&creds).unwrap();
        assert_eq!(value["senha"], "pw");
        assert!(!format!("{creds:?}").contains("pw\""));
    }

    #[test]
    fn issue_origin_accepts_backend_spellings() {
        let a: IssueOrigin = serde_json::from_str(r#""AUTOMATICO""#).unwrap();
        let b: IssueOrigin = serde_json::from_str(r#""SISTEMA""#).unwrap();
        let c: IssueOrigin = serde_json::from_str(r#""PROFESSOR""#).unwrap();
        assert_eq!(a, IssueOrigin::Automatic);
        assert_eq!(b, IssueOrigin::Automatic);
        assert_eq!(c, IssueOrigin::Manual);
    }

    #[test]
    fn issue_draft_defaults_to_medium() {
        let draft: IssueDraft =
            serde_json::from_str(r#"{"tipoProblema":"ambígua","descricao":"duas corretas"}"#).unwrap();
        assert_eq!(draft.severity, Severity::Medium);
    }
}
