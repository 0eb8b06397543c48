//! Exam lifecycle controller.
//!
//! Status only moves forward: `Draft -> Published -> Closed`. Which actions a
//! user sees depends on that status and on their role; [`permit`] is the single
//! rule table, [`Affordances`] the set a view renders, and [`ExamController`]
//! runs [`ExamCommand`]s against the backend after checking them locally.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info, instrument};

use crate::backend::ExamBackend;
use crate::error::{ClientResult, Rejection};
use crate::model::{
    AnswerKey, AnswerKeyDraft, Answers, Exam, ExamDraft, ExamStatus, QuestionDraft, Role, Session,
};

impl ExamStatus {
    /// The only status this one may move to.
    pub fn next(self) -> Option<ExamStatus> {
        match self {
            ExamStatus::Draft => Some(ExamStatus::Published),
            ExamStatus::Published => Some(ExamStatus::Closed),
            ExamStatus::Closed => None,
        }
    }

    pub fn can_transition_to(self, to: ExamStatus) -> bool {
        self.next() == Some(to)
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

/// Something a user can do with an exam.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExamAction {
    Edit,
    ManageQuestions,
    ManageAnswerKey,
    Publish,
    Close,
    Delete,
    Submit,
    Correct,
    ViewSubmissions,
    ViewReport,
    ViewStatistics,
    ViewIssues,
    ViewResult,
}

impl ExamAction {
    pub const ALL: [ExamAction; 13] = [
        ExamAction::Edit,
        ExamAction::ManageQuestions,
        ExamAction::ManageAnswerKey,
        ExamAction::Publish,
        ExamAction::Close,
        ExamAction::Delete,
        ExamAction::Submit,
        ExamAction::Correct,
        ExamAction::ViewSubmissions,
        ExamAction::ViewReport,
        ExamAction::ViewStatistics,
        ExamAction::ViewIssues,
        ExamAction::ViewResult,
    ];

    /// Actions that change exam content or status.
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            ExamAction::Edit
                | ExamAction::ManageQuestions
                | ExamAction::ManageAnswerKey
                | ExamAction::Publish
                | ExamAction::Close
                | ExamAction::Delete
        )
    }
}

impl fmt::Display for ExamAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExamAction::Edit => "edit",
            ExamAction::ManageQuestions => "manage questions",
            ExamAction::ManageAnswerKey => "manage answer key",
            ExamAction::Publish => "publish",
            ExamAction::Close => "close",
            ExamAction::Delete => "delete",
            ExamAction::Submit => "submit",
            ExamAction::Correct => "correct",
            ExamAction::ViewSubmissions => "view submissions",
            ExamAction::ViewReport => "view report",
            ExamAction::ViewStatistics => "view statistics",
            ExamAction::ViewIssues => "view issues",
            ExamAction::ViewResult => "view result",
        };
        f.write_str(name)
    }
}

/// Whether `role` may perform `action` on an exam in `status`.
///
/// `has_submission` is whether the viewing student already submitted.
pub fn permit(
    status: ExamStatus,
    role: Role,
    action: ExamAction,
    has_submission: bool,
) -> Result<(), Rejection> {
    use ExamAction::*;
    use ExamStatus::*;

    let allowed = match role {
        Role::Professor => match action {
            Edit | ManageQuestions | Delete | Publish => status == Draft,
            ManageAnswerKey => status != Closed,
            Close => status == Published,
            Correct => status != Draft,
            ViewSubmissions | ViewReport | ViewStatistics | ViewIssues => true,
            ViewResult => status != Draft,
            Submit => false,
        },
        Role::Student => match action {
            Submit if status == Published && has_submission => {
                return Err(Rejection::AlreadySubmitted)
            }
            Submit => status == Published,
            ViewResult => status != Draft && has_submission,
            _ => false,
        },
    };

    if allowed {
        Ok(())
    } else {
        Err(Rejection::ActionNotAllowed { action, status })
    }
}

/// The actions a viewer can take on one exam right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Affordances {
    /// Students never see draft exams.
    pub visible: bool,
    actions: BTreeSet<ExamAction>,
}

impl Affordances {
    pub fn compute(status: ExamStatus, role: Role, has_submission: bool) -> Self {
        let visible = role == Role::Professor || status != ExamStatus::Draft;
        let actions = if visible {
            ExamAction::ALL
                .into_iter()
                .filter(|a| permit(status, role, *a, has_submission).is_ok())
                .collect()
        } else {
            BTreeSet::new()
        };
        Self { visible, actions }
    }

    pub fn allows(&self, action: ExamAction) -> bool {
        self.actions.contains(&action)
    }

    pub fn iter(&self) -> impl Iterator<Item = ExamAction> + '_ {
        self.actions.iter().copied()
    }

    /// Whether any edit control is shown.
    pub fn can_edit_content(&self) -> bool {
        self.allows(ExamAction::Edit) || self.allows(ExamAction::ManageQuestions)
    }
}

/// Local pre-check for publishing, mirroring the backend rules.
///
/// The answer key is only checked when the caller already has it.
pub fn publish_readiness(exam: &Exam, answer_key: Option<&AnswerKey>) -> Result<(), Rejection> {
    if exam.questions.is_empty() {
        return Err(Rejection::NoQuestions);
    }
    if let Some(key) = answer_key {
        let missing = key.missing_questions(exam);
        if !missing.is_empty() {
            return Err(Rejection::AnswerKeyIncomplete(
                missing.into_iter().map(str::to_string).collect(),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// A professor's request to change an exam.
#[derive(Debug, Clone, PartialEq)]
pub enum ExamCommand {
    UpdateDetails(ExamDraft),
    AddQuestion(QuestionDraft),
    UpdateQuestion {
        question_id: String,
        draft: QuestionDraft,
    },
    RemoveQuestion {
        question_id: String,
    },
    /// Create the answer key, or replace it when `replace` is set.
    SaveAnswerKey {
        answers: Answers,
        replace: bool,
    },
    Publish,
    Close,
    Delete,
}

impl ExamCommand {
    pub fn action(&self) -> ExamAction {
        match self {
            ExamCommand::UpdateDetails(_) => ExamAction::Edit,
            ExamCommand::AddQuestion(_)
            | ExamCommand::UpdateQuestion { .. }
            | ExamCommand::RemoveQuestion { .. } => ExamAction::ManageQuestions,
            ExamCommand::SaveAnswerKey { .. } => ExamAction::ManageAnswerKey,
            ExamCommand::Publish => ExamAction::Publish,
            ExamCommand::Close => ExamAction::Close,
            ExamCommand::Delete => ExamAction::Delete,
        }
    }

    /// Status the exam moves to, for transition commands.
    pub fn target_status(&self) -> Option<ExamStatus> {
        match self {
            ExamCommand::Publish => Some(ExamStatus::Published),
            ExamCommand::Close => Some(ExamStatus::Closed),
            _ => None,
        }
    }
}

/// Fresh state handed back by a successful command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// The exam as the backend now has it.
    Exam(Exam),
    /// The saved answer key. The exam itself did not change.
    AnswerKey(AnswerKey),
    /// The exam no longer exists.
    Deleted,
}

impl CommandOutcome {
    pub fn exam(&self) -> Option<&Exam> {
        match self {
            CommandOutcome::Exam(exam) => Some(exam),
            _ => None,
        }
    }
}

/// Runs exam commands for one session.
pub struct ExamController<'a> {
    backend: &'a dyn ExamBackend,
    session: &'a Session,
}

impl<'a> ExamController<'a> {
    pub fn new(backend: &'a dyn ExamBackend, session: &'a Session) -> Self {
        Self { backend, session }
    }

    /// Create a new exam. It always starts as a draft.
    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create(&self, draft: &ExamDraft) -> ClientResult<Exam> {
        if self.session.role() != Role::Professor {
            return Err(Rejection::ProfessorOnly.into());
        }
        let exam = self.backend.create_exam(&self.session.token, draft).await?;
        info!(exam = %exam.id, "exam created");
        Ok(exam)
    }

    /// Check `command` against `exam` locally, then send it.
    ///
    /// On failure nothing about `exam` changes; on success the returned
    /// outcome carries the authoritative snapshot.
    #[instrument(skip(self, exam, command), fields(exam = %exam.id, action = %command.action()))]
    pub async fn execute(&self, exam: &Exam, command: ExamCommand) -> ClientResult<CommandOutcome> {
        self.check(exam, &command)?;

        let token = self.session.token.as_str();
        let backend = self.backend;
        let outcome = match command {
            ExamCommand::UpdateDetails(draft) => {
                CommandOutcome::Exam(backend.update_exam(token, &exam.id, &draft).await?)
            }
            ExamCommand::AddQuestion(draft) => {
                let question = backend.add_question(token, &exam.id, &draft).await?;
                debug!(question = %question.id, "question added");
                CommandOutcome::Exam(backend.get_exam(token, &exam.id).await?)
            }
            ExamCommand::UpdateQuestion { question_id, draft } => {
                backend.update_question(token, &question_id, &draft).await?;
                CommandOutcome::Exam(backend.get_exam(token, &exam.id).await?)
            }
            ExamCommand::RemoveQuestion { question_id } => {
                backend.delete_question(token, &question_id).await?;
                CommandOutcome::Exam(backend.get_exam(token, &exam.id).await?)
            }
            ExamCommand::SaveAnswerKey { answers, replace } => {
                let draft = AnswerKeyDraft { answers };
                let key = if replace {
                    backend.update_answer_key(token, &exam.id, &draft).await?
                } else {
                    backend.create_answer_key(token, &exam.id, &draft).await?
                };
                CommandOutcome::AnswerKey(key)
            }
            ExamCommand::Publish => {
                CommandOutcome::Exam(backend.publish_exam(token, &exam.id).await?)
            }
            ExamCommand::Close => CommandOutcome::Exam(backend.close_exam(token, &exam.id).await?),
            ExamCommand::Delete => {
                backend.delete_exam(token, &exam.id).await?;
                CommandOutcome::Deleted
            }
        };

        if let CommandOutcome::Exam(updated) = &outcome {
            if updated.status != exam.status {
                info!(from = %exam.status, to = %updated.status, "exam status changed");
            }
        }
        Ok(outcome)
    }

    fn check(&self, exam: &Exam, command: &ExamCommand) -> Result<(), Rejection> {
        permit(exam.status, self.session.role(), command.action(), false)?;

        if let Some(to) = command.target_status() {
            if !exam.status.can_transition_to(to) {
                return Err(Rejection::InvalidTransition {
                    from: exam.status,
                    to,
                });
            }
        }

        match command {
            ExamCommand::Publish => publish_readiness(exam, None),
            ExamCommand::UpdateQuestion { question_id, .. }
            | ExamCommand::RemoveQuestion { question_id }
                if exam.question(question_id).is_none() =>
            {
                Err(Rejection::UnknownQuestion(question_id.clone()))
            }
            ExamCommand::SaveAnswerKey { answers, .. } => {
                for (question_id, answer) in answers {
                    let Some(question) = exam.question(question_id) else {
                        return Err(Rejection::UnknownQuestion(question_id.clone()));
                    };
                    if !question.offers(answer) {
                        return Err(Rejection::UnknownAlternative {
                            question_id: question_id.clone(),
                            answer: answer.clone(),
                        });
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Question, QuestionType};
    use ExamAction::*;
    use ExamStatus::*;

    const STATUSES: [ExamStatus; 3] = [Draft, Published, Closed];

    fn exam(status: ExamStatus, questions: usize) -> Exam {
        Exam {
            id: "e1".into(),
            title: "Prova".into(),
            description: None,
            professor_id: Some("p1".into()),
            status,
            start_date: None,
            end_date: None,
            questions: (0..questions)
                .map(|i| Question {
                    id: format!("q{i}"),
                    exam_id: None,
                    order: i as u32 + 1,
                    statement: format!("Q{i}?"),
                    kind: QuestionType::Objective,
                    alternatives: vec!["a".into(), "b".into()],
                    score: 1.0,
                })
                .collect(),
            created_at: None,
        }
    }

    #[test]
    fn transitions_are_monotonic() {
        assert!(Draft.can_transition_to(Published));
        assert!(Published.can_transition_to(Closed));
        for from in STATUSES {
            for to in STATUSES {
                if to <= from {
                    assert!(!from.can_transition_to(to), "{from} -> {to}");
                }
            }
        }
        assert!(!Draft.can_transition_to(Closed));
        assert!(Closed.is_terminal());
    }

    #[test]
    fn draft_never_offers_submit_to_students() {
        for has_submission in [false, true] {
            let aff = Affordances::compute(Draft, Role::Student, has_submission);
            assert!(!aff.visible);
            assert!(!aff.allows(Submit));
            assert_eq!(aff.iter().count(), 0);
        }
    }

    #[test]
    fn published_submit_disappears_after_submission() {
        let before = Affordances::compute(Published, Role::Student, false);
        assert!(before.allows(Submit));
        assert!(!before.allows(ViewResult));

        let after = Affordances::compute(Published, Role::Student, true);
        assert!(!after.allows(Submit));
        assert!(after.allows(ViewResult));
        assert_eq!(
            permit(Published, Role::Student, Submit, true),
            Err(Rejection::AlreadySubmitted)
        );
    }

    #[test]
    fn closed_is_terminal_for_everyone() {
        let professor = Affordances::compute(Closed, Role::Professor, false);
        assert!(!professor.iter().any(ExamAction::is_mutation));
        assert!(professor.allows(ViewReport));
        assert!(professor.allows(Correct));

        let student = Affordances::compute(Closed, Role::Student, false);
        assert!(!student.allows(Submit));
    }

    #[test]
    fn professor_affordances_follow_status() {
        let draft = Affordances::compute(Draft, Role::Professor, false);
        for action in [Edit, ManageQuestions, ManageAnswerKey, Publish, Delete] {
            assert!(draft.allows(action), "{action}");
        }
        assert!(!draft.allows(Close));
        assert!(!draft.allows(Correct));

        let published = Affordances::compute(Published, Role::Professor, false);
        assert!(published.allows(Close));
        assert!(published.allows(ManageAnswerKey));
        assert!(!published.can_edit_content());
        assert!(!published.allows(Publish));
        assert!(!published.allows(Submit));
    }

    #[test]
    fn students_cannot_mutate() {
        for status in STATUSES {
            for action in ExamAction::ALL.into_iter().filter(|a| a.is_mutation()) {
                assert!(permit(status, Role::Student, action, false).is_err());
            }
        }
    }

    #[test]
    fn publish_readiness_checks() {
        assert_eq!(
            publish_readiness(&exam(Draft, 0), None),
            Err(Rejection::NoQuestions)
        );
        let draft = exam(Draft, 2);
        assert_eq!(publish_readiness(&draft, None), Ok(()));

        let key = AnswerKey {
            id: None,
            exam_id: "e1".into(),
            answers: [("q0".to_string(), "a".to_string())].into_iter().collect(),
            created_at: None,
            updated_at: None,
        };
        assert_eq!(
            publish_readiness(&draft, Some(&key)),
            Err(Rejection::AnswerKeyIncomplete(vec!["q1".into()]))
        );
    }

    #[test]
    fn command_actions_and_targets() {
        assert_eq!(ExamCommand::Publish.target_status(), Some(Published));
        assert_eq!(ExamCommand::Close.target_status(), Some(Closed));
        assert_eq!(ExamCommand::Delete.target_status(), None);
        assert_eq!(
            ExamCommand::RemoveQuestion {
                question_id: "q".into()
            }
            .action(),
            ManageQuestions
        );
    }
}
