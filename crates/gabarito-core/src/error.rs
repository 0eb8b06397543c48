//! Client error types.
//!
//! Defined in `gabarito-core` so view models can classify backend failures
//! (not found, conflict, network) without string matching.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lifecycle::ExamAction;
use crate::model::ExamStatus;

/// Result alias used across the backend seam.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// JSON error body sent by the backend on every non-2xx response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
    #[serde(default)]
    pub trace_id: Option<String>,
}

/// Errors that can occur while talking to the exam backend, or while checking
/// an action locally before talking to it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No authenticated session is available for a call that needs one.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The backend rejected the credentials or the token (HTTP 401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The backend refused access (HTTP 403).
    #[error("forbidden: {message}")]
    Forbidden { code: String, message: String },

    /// The resource does not exist, or is not visible to this user (HTTP 404).
    #[error("not found: {message}")]
    NotFound { code: String, message: String },

    /// A uniqueness rule failed, e.g. a second submission (HTTP 409).
    #[error("conflict: {message}")]
    Conflict { code: String, message: String },

    /// Any other error response.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// The action was refused locally, before any request was sent.
    #[error("rejected: {0}")]
    Rejected(Rejection),

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),

    /// The session could not be written to or removed from local storage.
    #[error("session storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Build the error for a non-2xx status and its (possibly empty) body.
    pub fn from_status(status: u16, body: ErrorBody) -> Self {
        let code = body.code.unwrap_or_default();
        let message = body.message.unwrap_or_default();
        match status {
            401 => ClientError::Unauthorized(message),
            403 => ClientError::Forbidden { code, message },
            404 => ClientError::NotFound { code, message },
            409 => ClientError::Conflict { code, message },
            _ => ClientError::Api {
                status,
                code,
                message,
            },
        }
    }

    /// Machine-readable code sent by the backend, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Forbidden { code, .. }
            | ClientError::NotFound { code, .. }
            | ClientError::Conflict { code, .. }
            | ClientError::Api { code, .. }
                if !code.is_empty() =>
            {
                Some(code.as_str())
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound { .. })
    }

    /// Message to show the user.
    ///
    /// Backend-provided messages and local rejections are shown verbatim.
    /// Transport failures and empty bodies fall back to the generic
    /// `fallback` text for the operation.
    pub fn user_message(&self, fallback: &str) -> String {
        let verbatim = match self {
            ClientError::Unauthorized(message)
            | ClientError::Forbidden { message, .. }
            | ClientError::NotFound { message, .. }
            | ClientError::Conflict { message, .. }
            | ClientError::Api { message, .. } => Some(message.as_str()),
            ClientError::Rejected(rejection) => return rejection.to_string(),
            ClientError::NotAuthenticated
            | ClientError::Timeout(_)
            | ClientError::Network(_)
            | ClientError::Decode(_)
            | ClientError::Storage(_) => None,
        };
        match verbatim {
            Some(message) if !message.trim().is_empty() => message.to_string(),
            _ => fallback.to_string(),
        }
    }
}

/// Why an action was refused before reaching the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// The action is not available for this role in this exam status.
    ActionNotAllowed {
        action: ExamAction,
        status: ExamStatus,
    },
    /// Only professors may do this.
    ProfessorOnly,
    /// The status change would move the exam backwards or skip a step.
    InvalidTransition { from: ExamStatus, to: ExamStatus },
    /// The student already has a submission for this exam.
    AlreadySubmitted,
    /// The exam has not opened for submissions yet.
    NotStarted,
    /// The submission window has closed.
    Expired,
    /// An answer refers to a question the exam does not have.
    UnknownQuestion(String),
    /// An answer picks an alternative the question does not offer.
    UnknownAlternative { question_id: String, answer: String },
    /// The exam has no questions and cannot be published.
    NoQuestions,
    /// The answer key leaves these questions unanswered.
    AnswerKeyIncomplete(Vec<String>),
    /// A submission was already corrected.
    AlreadyCorrected,
    /// A required field was left empty.
    Blank(&'static str),
    /// The view has no loaded data to act on.
    NotLoaded,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::ActionNotAllowed { action, status } => {
                write!(f, "action '{action}' is not available while the exam is {status}")
            }
            Rejection::ProfessorOnly => write!(f, "only professors can do this"),
            Rejection::InvalidTransition { from, to } => {
                write!(f, "exam status cannot change from {from} to {to}")
            }
            Rejection::AlreadySubmitted => write!(f, "a submission for this exam already exists"),
            Rejection::NotStarted => write!(f, "the exam is not open for submissions yet"),
            Rejection::Expired => write!(f, "the submission window for this exam has closed"),
            Rejection::UnknownQuestion(id) => write!(f, "unknown question: {id}"),
            Rejection::UnknownAlternative {
                question_id,
                answer,
            } => write!(f, "invalid alternative for question {question_id}: {answer}"),
            Rejection::NoQuestions => write!(f, "the exam needs at least one question"),
            Rejection::AnswerKeyIncomplete(missing) => {
                write!(f, "the answer key is missing questions: {}", missing.join(", "))
            }
            Rejection::AlreadyCorrected => write!(f, "this submission was already corrected"),
            Rejection::Blank(field) => write!(f, "{field} must not be blank"),
            Rejection::NotLoaded => write!(f, "nothing loaded yet"),
        }
    }
}

impl From<Rejection> for ClientError {
    fn from(rejection: Rejection) -> Self {
        ClientError::Rejected(rejection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: &str, message: &str) -> ErrorBody {
        ErrorBody {
            code: Some(code.into()),
            message: Some(message.into()),
            details: None,
            trace_id: Some("trace-1".into()),
        }
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            ClientError::from_status(401, ErrorBody::default()),
            ClientError::Unauthorized(_)
        ));
        assert!(ClientError::from_status(404, body("EXAM_NOT_FOUND", "x")).is_not_found());
        assert!(matches!(
            ClientError::from_status(409, body("SUBMISSION_ALREADY_EXISTS", "x")),
            ClientError::Conflict { .. }
        ));
        assert!(matches!(
            ClientError::from_status(422, body("INVALID_EXAM_STATUS", "x")),
            ClientError::Api { status: 422, .. }
        ));
    }

    #[test]
    fn backend_message_is_shown_verbatim() {
        let err = ClientError::from_status(
            400,
            body("INVALID_EXAM_STATUS", "Apenas provas PUBLICADAS podem ser encerradas."),
        );
        assert_eq!(
            err.user_message("Erro ao encerrar."),
            "Apenas provas PUBLICADAS podem ser encerradas."
        );
        assert_eq!(err.code(), Some("INVALID_EXAM_STATUS"));
    }

    #[test]
    fn transport_failures_fall_back() {
        let fallback = "Erro ao carregar prova.";
        assert_eq!(ClientError::Network("refused".into()).user_message(fallback), fallback);
        assert_eq!(ClientError::Timeout(30).user_message(fallback), fallback);
        // An expired token comes back as a bare 401.
        assert_eq!(
            ClientError::from_status(401, ErrorBody::default()).user_message(fallback),
            fallback
        );
        assert_eq!(
            ClientError::from_status(500, ErrorBody::default()).user_message(fallback),
            fallback
        );
    }

    #[test]
    fn invalid_credentials_message_is_shown() {
        let err = ClientError::from_status(
            401,
            body("INVALID_CREDENTIALS", "Email ou senha inválidos."),
        );
        assert_eq!(err.user_message("Erro ao fazer login."), "Email ou senha inválidos.");
    }

    #[test]
    fn rejection_message_is_shown() {
        let err = ClientError::from(Rejection::AlreadySubmitted);
        assert_eq!(
            err.user_message("ignored"),
            "a submission for this exam already exists"
        );
        assert_eq!(err.code(), None);
    }
}
