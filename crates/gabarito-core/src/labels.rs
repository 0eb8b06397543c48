//! Portuguese display labels and the generic error messages shown when the
//! backend gives no usable message.

use crate::model::{ExamStatus, IssueOrigin, QuestionType, Role, Severity};

pub fn status_label(status: ExamStatus) -> &'static str {
    match status {
        ExamStatus::Draft => "Rascunho",
        ExamStatus::Published => "Publicada",
        ExamStatus::Closed => "Encerrada",
    }
}

pub fn question_type_label(kind: QuestionType) -> &'static str {
    match kind {
        QuestionType::Objective => "Objetiva",
        QuestionType::TrueFalse => "Verdadeiro / Falso",
        QuestionType::Essay => "Dissertativa",
    }
}

pub fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "Alta",
        Severity::Medium => "Média",
        Severity::Low => "Baixa",
    }
}

pub fn role_label(role: Role) -> &'static str {
    match role {
        Role::Professor => "Professor",
        Role::Student => "Aluno",
    }
}

pub fn origin_label(origin: IssueOrigin) -> &'static str {
    match origin {
        IssueOrigin::Manual => "Manual",
        IssueOrigin::Automatic => "Automático",
    }
}

const RAW_LABELS: &[(&str, &str)] = &[
    ("RASCUNHO", "Rascunho"),
    ("PUBLICADA", "Publicada"),
    ("ENCERRADA", "Encerrada"),
    ("OBJETIVA", "Objetiva"),
    ("VERDADEIRO_FALSO", "Verdadeiro / Falso"),
    ("DISSERTATIVA", "Dissertativa"),
    ("ALTA", "Alta"),
    ("MEDIA", "Média"),
    ("BAIXA", "Baixa"),
    ("PROFESSOR", "Professor"),
    ("ALUNO", "Aluno"),
    ("MANUAL", "Manual"),
    ("AUTOMATICO", "Automático"),
];

/// Label for a raw wire value. Unknown values are returned unchanged.
pub fn label(raw: &str) -> &str {
    RAW_LABELS
        .iter()
        .find(|(wire, _)| *wire == raw)
        .map(|(_, label)| *label)
        .unwrap_or(raw)
}

/// Per-operation messages for failures the backend did not explain.
pub mod fallback {
    pub const LOGIN: &str = "Erro ao fazer login.";
    pub const REGISTER: &str = "Erro ao cadastrar.";
    pub const LOAD_EXAMS: &str = "Erro ao carregar provas.";
    pub const LOAD_EXAM: &str = "Erro ao carregar prova.";
    pub const SAVE: &str = "Erro ao salvar.";
    pub const DELETE: &str = "Erro ao excluir.";
    pub const PUBLISH: &str = "Erro ao publicar.";
    pub const CLOSE: &str = "Erro ao encerrar.";
    pub const ADD_QUESTION: &str = "Erro ao adicionar.";
    pub const LOAD: &str = "Erro ao carregar.";
    pub const SAVE_ANSWER_KEY: &str = "Erro ao salvar gabarito.";
    pub const SUBMIT: &str = "Erro ao enviar submissão.";
    pub const CORRECT: &str = "Erro ao corrigir.";
    pub const RESULT: &str = "Resultado não disponível ainda.";
    pub const REPORT: &str = "Erro ao carregar relatório.";
    pub const ISSUE: &str = "Erro.";
}

/// Shown when an exam has neither report nor error to display.
pub const NO_REPORT_DATA: &str =
    "Nenhum dado disponível. Os relatórios são gerados após envios corrigidos.";

/// Shown when a question has no registered issues.
pub const NO_ISSUES: &str = "Nenhuma issue registrada.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_and_raw_labels_agree() {
        assert_eq!(label(&ExamStatus::Published.to_string()), status_label(ExamStatus::Published));
        assert_eq!(label(&QuestionType::TrueFalse.to_string()), "Verdadeiro / Falso");
        assert_eq!(label(&Role::Student.to_string()), role_label(Role::Student));
        assert_eq!(label("MEDIA"), severity_label(Severity::Medium));
        assert_eq!(label("AUTOMATICO"), origin_label(IssueOrigin::Automatic));
    }

    #[test]
    fn unknown_values_pass_through() {
        assert_eq!(label("ARQUIVADA"), "ARQUIVADA");
        assert_eq!(label(""), "");
    }
}
