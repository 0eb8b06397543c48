//! Authorization gate.
//!
//! Every screen of the client is a [`Route`]. [`check`] decides, from the
//! route and the current session alone, whether the user may see it or where
//! they should be sent instead.

use std::fmt;

use crate::model::{Role, Session};

/// A navigable screen.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Register,
    /// Default view for authenticated users.
    ExamList,
    NewExam,
    EditExam { exam_id: String },
    ExamDetail { exam_id: String },
    Questions { exam_id: String },
    AnswerKey { exam_id: String },
    Report { exam_id: String },
    Statistics { exam_id: String },
    QuestionIssues { exam_id: String, question_id: String },
    CorrectionResult { submission_id: String },
}

const PROFESSOR_ONLY: &[Role] = &[Role::Professor];

impl Route {
    /// Routes reachable without a session.
    pub fn is_public(&self) -> bool {
        matches!(self, Route::Login | Route::Register)
    }

    /// Roles allowed on this route. `None` means any authenticated user.
    pub fn allowed_roles(&self) -> Option<&'static [Role]> {
        match self {
            Route::NewExam
            | Route::EditExam { .. }
            | Route::Questions { .. }
            | Route::AnswerKey { .. }
            | Route::Report { .. }
            | Route::Statistics { .. }
            | Route::QuestionIssues { .. } => Some(PROFESSOR_ONLY),
            Route::Login
            | Route::Register
            | Route::ExamList
            | Route::ExamDetail { .. }
            | Route::CorrectionResult { .. } => None,
        }
    }

    /// Resolve a path. Unknown paths land on the default view.
    pub fn parse(path: &str) -> Route {
        let segments: Vec<&str> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();

        match segments.as_slice() {
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            [] => Route::ExamList,
            ["exams", "new"] => Route::NewExam,
            ["exams", id] => Route::ExamDetail {
                exam_id: id.to_string(),
            },
            ["exams", id, "edit"] => Route::EditExam {
                exam_id: id.to_string(),
            },
            ["exams", id, "questions"] => Route::Questions {
                exam_id: id.to_string(),
            },
            ["exams", id, "answer-key"] => Route::AnswerKey {
                exam_id: id.to_string(),
            },
            ["exams", id, "report"] => Route::Report {
                exam_id: id.to_string(),
            },
            ["exams", id, "statistics"] => Route::Statistics {
                exam_id: id.to_string(),
            },
            ["exams", exam, "questions", question, "issues"] => Route::QuestionIssues {
                exam_id: exam.to_string(),
                question_id: question.to_string(),
            },
            ["submissions", id, "result"] => Route::CorrectionResult {
                submission_id: id.to_string(),
            },
            _ => Route::ExamList,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".into(),
            Route::Register => "/register".into(),
            Route::ExamList => "/".into(),
            Route::NewExam => "/exams/new".into(),
            Route::EditExam { exam_id } => format!("/exams/{exam_id}/edit"),
            Route::ExamDetail { exam_id } => format!("/exams/{exam_id}"),
            Route::Questions { exam_id } => format!("/exams/{exam_id}/questions"),
            Route::AnswerKey { exam_id } => format!("/exams/{exam_id}/answer-key"),
            Route::Report { exam_id } => format!("/exams/{exam_id}/report"),
            Route::Statistics { exam_id } => format!("/exams/{exam_id}/statistics"),
            Route::QuestionIssues {
                exam_id,
                question_id,
            } => format!("/exams/{exam_id}/questions/{question_id}/issues"),
            Route::CorrectionResult { submission_id } => {
                format!("/submissions/{submission_id}/result")
            }
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(Route),
}

/// Decide whether `session` may open `route`.
pub fn check(route: &Route, session: Option<&Session>) -> Access {
    let session = session.filter(|s| s.is_authenticated());

    match session {
        None if route.is_public() => Access::Allow,
        None => Access::Redirect(Route::Login),
        // Logged-in users have no business on the login/register screens.
        Some(_) if route.is_public() => Access::Redirect(Route::ExamList),
        Some(session) => match route.allowed_roles() {
            Some(roles) if !roles.contains(&session.role()) => Access::Redirect(Route::ExamList),
            _ => Access::Allow,
        },
    }
}

pub fn can_access(route: &Route, session: Option<&Session>) -> bool {
    check(route, session) == Access::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::User;

    fn session(role: Role, token: &str) -> Session {
        Session {
            token: token.into(),
            user: User {
                id: "u".into(),
                name: "n".into(),
                email: String::new(),
                role,
            },
        }
    }

    fn all_routes() -> Vec<Route> {
        vec![
            Route::Login,
            Route::Register,
            Route::ExamList,
            Route::NewExam,
            Route::EditExam { exam_id: "e".into() },
            Route::ExamDetail { exam_id: "e".into() },
            Route::Questions { exam_id: "e".into() },
            Route::AnswerKey { exam_id: "e".into() },
            Route::Report { exam_id: "e".into() },
            Route::Statistics { exam_id: "e".into() },
            Route::QuestionIssues {
                exam_id: "e".into(),
                question_id: "q".into(),
            },
            Route::CorrectionResult {
                submission_id: "s".into(),
            },
        ]
    }

    #[test]
    fn anonymous_only_reaches_login_and_register() {
        for route in all_routes() {
            let expected = if route.is_public() {
                Access::Allow
            } else {
                Access::Redirect(Route::Login)
            };
            assert_eq!(check(&route, None), expected, "route {route}");
        }
    }

    #[test]
    fn tokenless_session_counts_as_anonymous() {
        let empty = session(Role::Professor, "");
        for route in all_routes() {
            assert_eq!(can_access(&route, Some(&empty)), route.is_public(), "route {route}");
        }
    }

    #[test]
    fn student_is_redirected_from_professor_routes() {
        let student = session(Role::Student, "tok");
        for route in all_routes() {
            let access = check(&route, Some(&student));
            if route.allowed_roles().is_some() {
                assert_eq!(access, Access::Redirect(Route::ExamList), "route {route}");
            }
        }
        assert!(can_access(&Route::ExamList, Some(&student)));
        assert!(can_access(
            &Route::ExamDetail { exam_id: "e".into() },
            Some(&student)
        ));
        assert!(can_access(
            &Route::CorrectionResult {
                submission_id: "s".into()
            },
            Some(&student)
        ));
    }

    #[test]
    fn professor_reaches_every_private_route() {
        let professor = session(Role::Professor, "tok");
        for route in all_routes().into_iter().filter(|r| !r.is_public()) {
            assert!(can_access(&route, Some(&professor)), "route {route}");
        }
    }

    #[test]
    fn logged_in_user_is_bounced_from_login() {
        let student = session(Role::Student, "tok");
        assert_eq!(
            check(&Route::Login, Some(&student)),
            Access::Redirect(Route::ExamList)
        );
        assert_eq!(
            check(&Route::Register, Some(&student)),
            Access::Redirect(Route::ExamList)
        );
    }

    #[test]
    fn parse_and_path_agree() {
        for route in all_routes() {
            assert_eq!(Route::parse(&route.path()), route);
        }
    }

    #[test]
    fn unknown_paths_fall_back_to_exam_list() {
        assert_eq!(Route::parse("/nowhere"), Route::ExamList);
        assert_eq!(Route::parse("/exams/1/unknown"), Route::ExamList);
        assert_eq!(Route::parse(""), Route::ExamList);
    }
}
