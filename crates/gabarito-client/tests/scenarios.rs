//! Full client flows against the in-memory backend.
//!
//! Each test drives the view models the way a user would: log in, open a
//! screen, act on it, and check what the screen offers afterwards.

use std::time::Duration;

use chrono::Utc;
use gabarito_client::InMemoryBackend;
use gabarito_core::access::{check, Access, Route};
use gabarito_core::backend::ExamBackend;
use gabarito_core::error::{ClientError, Rejection};
use gabarito_core::lifecycle::{CommandOutcome, ExamAction, ExamCommand, ExamController};
use gabarito_core::model::{
    Answers, Credentials, Exam, ExamDraft, ExamStatus, IssueDraft, IssueOrigin, QuestionDraft,
    QuestionType, Role, Session, Severity, SubmissionDraft,
};
use gabarito_core::session::{MemorySessionStorage, SessionStore};
use gabarito_core::view::{
    await_result, request_correction, AnswerKeyView, CorrectionState, CorrectionView,
    ExamDetailView, IssuesView, Load, PollPolicy, ReportView,
};

fn credentials(email: &str) -> Credentials {
    Credentials {
        email: email.into(),
        password: "senha123".into(),
    }
}

async fn login(backend: &InMemoryBackend, email: &str) -> Session {
    backend.login(&credentials(email)).await.unwrap()
}

fn question(order: u32, kind: QuestionType, alternatives: &[&str], score: f64) -> QuestionDraft {
    QuestionDraft {
        statement: format!("Questão {order}"),
        kind,
        alternatives: alternatives.iter().map(|a| a.to_string()).collect(),
        score,
        order,
    }
}

fn answers(pairs: &[(&str, &str)]) -> Answers {
    pairs
        .iter()
        .map(|(q, a)| (q.to_string(), a.to_string()))
        .collect()
}

struct Classroom {
    backend: InMemoryBackend,
    professor: Session,
    student: Session,
    exam: Exam,
}

/// A backend with one professor, one student and a published two-question exam.
///
/// Question 1 is objective (answer "b", 2 points), question 2 true/false
/// (answer "V", 1 point).
async fn classroom(backend: InMemoryBackend) -> Classroom {
    backend.add_user("Prof. Lima", "lima@escola.br", "senha123", Role::Professor);
    backend.add_user("Bia", "bia@escola.br", "senha123", Role::Student);
    let professor = login(&backend, "lima@escola.br").await;
    let student = login(&backend, "bia@escola.br").await;

    let controller = ExamController::new(&backend, &professor);
    let mut exam = controller
        .create(&ExamDraft {
            title: "Prova 1".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    for draft in [
        question(1, QuestionType::Objective, &["a", "b", "c"], 2.0),
        question(2, QuestionType::TrueFalse, &["V", "F"], 1.0),
    ] {
        let outcome = controller
            .execute(&exam, ExamCommand::AddQuestion(draft))
            .await
            .unwrap();
        exam = outcome.exam().unwrap().clone();
    }
    let ordered = exam.ordered_questions();
    let key = answers(&[(&ordered[0].id, "b"), (&ordered[1].id, "V")]);
    controller
        .execute(
            &exam,
            ExamCommand::SaveAnswerKey {
                answers: key,
                replace: false,
            },
        )
        .await
        .unwrap();
    let exam = controller
        .execute(&exam, ExamCommand::Publish)
        .await
        .unwrap()
        .exam()
        .unwrap()
        .clone();

    Classroom {
        backend,
        professor,
        student,
        exam,
    }
}

fn question_ids(exam: &Exam) -> (String, String) {
    let ordered = exam.ordered_questions();
    (ordered[0].id.clone(), ordered[1].id.clone())
}

// --- Session ---

#[tokio::test]
async fn login_survives_reload_and_logout_clears_it() {
    let backend = InMemoryBackend::new();
    backend.add_user("Bia", "bia@escola.br", "senha123", Role::Student);
    let storage = MemorySessionStorage::new();

    let mut store = SessionStore::hydrate(storage.clone());
    assert_eq!(
        check(&Route::ExamList, store.current()),
        Access::Redirect(Route::Login)
    );

    let token = store
        .login(&backend, &credentials("bia@escola.br"))
        .await
        .unwrap()
        .token
        .clone();
    drop(store);

    let mut reloaded = SessionStore::hydrate(storage.clone());
    assert!(reloaded.is_authenticated());
    assert_eq!(
        check(&Route::Login, reloaded.current()),
        Access::Redirect(Route::ExamList)
    );
    assert_eq!(
        check(
            &Route::Report {
                exam_id: "e1".into()
            },
            reloaded.current()
        ),
        Access::Redirect(Route::ExamList)
    );
    assert_eq!(reloaded.refresh(&backend).await.unwrap().user.name, "Bia");

    assert_eq!(reloaded.logout(&backend).await.unwrap(), Route::Login);
    assert!(!SessionStore::hydrate(storage).is_authenticated());
    assert!(backend.me(&token).await.is_err());
}

#[tokio::test]
async fn wrong_password_leaves_store_empty() {
    let backend = InMemoryBackend::new();
    backend.add_user("Bia", "bia@escola.br", "senha123", Role::Student);
    let mut store = SessionStore::hydrate(MemorySessionStorage::new());

    let bad = Credentials {
        email: "bia@escola.br".into(),
        password: "errada".into(),
    };
    let err = store.login(&backend, &bad).await.unwrap_err();
    assert!(matches!(err, ClientError::Unauthorized(_)));
    assert!(!store.is_authenticated());
}

// --- Authoring ---

#[tokio::test]
async fn publishing_removes_edit_controls() {
    let backend = InMemoryBackend::new();
    backend.add_user("Prof. Lima", "lima@escola.br", "senha123", Role::Professor);
    let professor = login(&backend, "lima@escola.br").await;
    let controller = ExamController::new(&backend, &professor);

    let exam = controller
        .create(&ExamDraft {
            title: "Prova 1".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(exam.status, ExamStatus::Draft);

    let mut view = ExamDetailView::new(&exam.id);
    assert_eq!(view.load(&backend, &professor).await, Load::Applied);
    assert!(view.detail().unwrap().affordances.can_edit_content());

    let err = view
        .execute(&controller, ExamCommand::Publish)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(Rejection::NoQuestions)));

    view.execute(
        &controller,
        ExamCommand::AddQuestion(question(1, QuestionType::Objective, &["a", "b"], 1.0)),
    )
    .await
    .unwrap();
    view.execute(
        &controller,
        ExamCommand::AddQuestion(question(2, QuestionType::TrueFalse, &["V", "F"], 1.0)),
    )
    .await
    .unwrap();
    let (q1, q2) = question_ids(&view.detail().unwrap().exam);

    // Publishing without a key is refused by the backend.
    let err = view
        .execute(&controller, ExamCommand::Publish)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("ANSWER_KEY_REQUIRED"));
    assert_eq!(view.detail().unwrap().exam.status, ExamStatus::Draft);

    let mut key_view = AnswerKeyView::new(&exam.id);
    key_view.load(&backend, &professor).await;
    assert!(key_view.answer_key().is_none());
    key_view
        .save(&controller, answers(&[(&q1, "a")]))
        .await
        .unwrap();
    let err = view
        .execute(&controller, ExamCommand::Publish)
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some("ANSWER_KEY_INCOMPLETE"));

    // A loaded key is replaced, not created twice.
    key_view
        .save(&controller, answers(&[(&q1, "a"), (&q2, "F")]))
        .await
        .unwrap();
    assert_eq!(key_view.answer_key().unwrap().answers.len(), 2);

    view.execute(&controller, ExamCommand::Publish)
        .await
        .unwrap();
    let detail = view.detail().unwrap();
    assert_eq!(detail.exam.status, ExamStatus::Published);
    assert!(!detail.affordances.can_edit_content());
    assert!(!detail.affordances.allows(ExamAction::Delete));
    assert!(detail.affordances.allows(ExamAction::Close));

    let err = view
        .execute(&controller, ExamCommand::RemoveQuestion { question_id: q1 })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Rejected(Rejection::ActionNotAllowed { .. })
    ));
}

#[tokio::test]
async fn deleted_exam_leaves_nothing_to_act_on() {
    let backend = InMemoryBackend::new();
    backend.add_user("Prof. Lima", "lima@escola.br", "senha123", Role::Professor);
    let professor = login(&backend, "lima@escola.br").await;
    let controller = ExamController::new(&backend, &professor);
    let exam = controller
        .create(&ExamDraft {
            title: "Rascunho".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut view = ExamDetailView::new(&exam.id);
    view.load(&backend, &professor).await;
    assert!(view.detail().unwrap().affordances.allows(ExamAction::Delete));

    let outcome = view
        .execute(&controller, ExamCommand::Delete)
        .await
        .unwrap();
    assert_eq!(outcome, CommandOutcome::Deleted);
    assert!(view.detail().is_none());

    let err = view
        .execute(&controller, ExamCommand::Publish)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(Rejection::NotLoaded)));

    view.load(&backend, &professor).await;
    assert!(view.state().error().is_some());
}

#[tokio::test]
async fn closing_is_final() {
    let room = classroom(InMemoryBackend::new()).await;
    let controller = ExamController::new(&room.backend, &room.professor);

    let closed = controller
        .execute(&room.exam, ExamCommand::Close)
        .await
        .unwrap();
    let closed = closed.exam().unwrap();
    assert_eq!(closed.status, ExamStatus::Closed);

    let err = controller
        .execute(closed, ExamCommand::Publish)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(_)));
}

// --- Submissions ---

#[tokio::test]
async fn student_submits_once_then_sees_result_action() {
    let room = classroom(InMemoryBackend::new()).await;
    let (q1, q2) = question_ids(&room.exam);

    let mut view = ExamDetailView::new(&room.exam.id);
    view.load(&room.backend, &room.student).await;
    let detail = view.detail().unwrap();
    assert!(detail.affordances.allows(ExamAction::Submit));
    assert!(!detail.affordances.allows(ExamAction::ViewResult));

    let submission = view
        .submit(
            &room.backend,
            &room.student,
            answers(&[(&q1, "b"), (&q2, "F")]),
            Utc::now(),
        )
        .await
        .unwrap();
    assert!(!submission.corrected);

    let detail = view.detail().unwrap();
    assert!(detail.already_submitted());
    assert!(!detail.affordances.allows(ExamAction::Submit));
    assert!(detail.affordances.allows(ExamAction::ViewResult));

    // The local check stops a second attempt before it reaches the backend.
    let calls = room.backend.call_count();
    let err = view
        .submit(&room.backend, &room.student, answers(&[]), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(Rejection::AlreadySubmitted)));
    assert_eq!(room.backend.call_count(), calls);

    // A fresh screen sees the same thing after a reload.
    let mut fresh = ExamDetailView::new(&room.exam.id);
    fresh.load(&room.backend, &room.student).await;
    assert!(!fresh
        .detail()
        .unwrap()
        .affordances
        .allows(ExamAction::Submit));
}

#[tokio::test]
async fn invalid_alternative_is_rejected_locally() {
    let room = classroom(InMemoryBackend::new()).await;
    let (q1, _) = question_ids(&room.exam);

    let mut view = ExamDetailView::new(&room.exam.id);
    view.load(&room.backend, &room.student).await;
    let err = view
        .submit(
            &room.backend,
            &room.student,
            answers(&[(&q1, "z")]),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Rejected(Rejection::UnknownAlternative { .. })
    ));
}

#[tokio::test]
async fn students_never_see_drafts() {
    let backend = InMemoryBackend::new();
    backend.add_user("Prof. Lima", "lima@escola.br", "senha123", Role::Professor);
    backend.add_user("Bia", "bia@escola.br", "senha123", Role::Student);
    let professor = login(&backend, "lima@escola.br").await;
    let student = login(&backend, "bia@escola.br").await;
    let draft = ExamController::new(&backend, &professor)
        .create(&ExamDraft {
            title: "Rascunho".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert!(backend.list_exams(&student.token).await.unwrap().is_empty());

    let mut view = ExamDetailView::new(&draft.id);
    view.load(&backend, &student).await;
    assert!(view.detail().is_none());
    assert!(view.state().error().is_some());
}

// --- Correction ---

#[tokio::test]
async fn professor_corrects_and_student_reads_result() {
    let room = classroom(InMemoryBackend::new()).await;
    let (q1, q2) = question_ids(&room.exam);

    let submission = room
        .backend
        .create_submission(
            &room.student.token,
            &room.exam.id,
            &SubmissionDraft {
                answers: answers(&[(&q1, "b"), (&q2, "F")]),
            },
        )
        .await
        .unwrap();

    let mut view = ExamDetailView::new(&room.exam.id);
    view.load(&room.backend, &room.professor).await;
    let listed = &view.detail().unwrap().submissions[0];
    assert_eq!(
        view.detail().unwrap().submission_action(listed),
        Some(ExamAction::Correct)
    );

    let state = view
        .correct(&room.backend, &room.professor, &submission.id)
        .await
        .unwrap();
    let result = state.result().unwrap();
    assert_eq!(result.correct_count, 1);
    assert_eq!(result.incorrect_count, 1);
    assert_eq!(result.final_grade, 2.0);

    let listed = &view.detail().unwrap().submissions[0];
    assert!(listed.corrected);
    assert_eq!(listed.grade, Some(2.0));

    let mut result_view = CorrectionView::new(&submission.id);
    result_view.load(&room.backend, &room.student).await;
    let summary = result_view.summary(Some(&room.exam)).unwrap();
    assert_eq!(summary.rows.len(), 2);
    assert_eq!(summary.rows[0].label, "Questão 1");
    assert!(summary.rows[0].expected_answer.is_none());
    assert_eq!(summary.rows[1].expected_answer.as_deref(), Some("V"));
}

#[tokio::test]
async fn correcting_twice_returns_existing_result() {
    let room = classroom(InMemoryBackend::new()).await;
    let (q1, _) = question_ids(&room.exam);
    let submission = room
        .backend
        .create_submission(
            &room.student.token,
            &room.exam.id,
            &SubmissionDraft {
                answers: answers(&[(&q1, "b")]),
            },
        )
        .await
        .unwrap();

    let first = request_correction(&room.backend, &room.professor, &submission.id)
        .await
        .unwrap();
    let second = request_correction(&room.backend, &room.professor, &submission.id)
        .await
        .unwrap();
    assert_eq!(first, second);
    // A blank answer is neither a hit nor a miss.
    assert_eq!(first.result().unwrap().incorrect_count, 0);
}

#[tokio::test(start_paused = true)]
async fn pending_correction_resolves_while_polling() {
    let room = classroom(InMemoryBackend::new().with_deferred_correction()).await;
    let (q1, q2) = question_ids(&room.exam);

    let mut detail = ExamDetailView::new(&room.exam.id);
    detail.load(&room.backend, &room.student).await;
    let submission = detail
        .submit(
            &room.backend,
            &room.student,
            answers(&[(&q1, "b"), (&q2, "V")]),
            Utc::now(),
        )
        .await
        .unwrap();

    let mut result_view = CorrectionView::new(&submission.id);
    result_view.load(&room.backend, &room.student).await;
    assert!(result_view.state().ready().unwrap().is_pending());
    assert!(result_view.summary(None).is_none());

    let state = request_correction(&room.backend, &room.professor, &submission.id)
        .await
        .unwrap();
    assert_eq!(state, CorrectionState::Pending);

    let policy = PollPolicy {
        attempts: 5,
        interval: Duration::from_secs(2),
    };
    let token = room.student.token.clone();
    let (polled, completed) = tokio::join!(
        await_result(&room.backend, &token, &submission.id, policy),
        async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            room.backend.complete_pending_corrections()
        }
    );
    assert_eq!(completed, 1);
    let polled = polled.unwrap();
    assert_eq!(polled.result().unwrap().final_grade, 3.0);
}

#[tokio::test(start_paused = true)]
async fn polling_gives_up_while_still_pending() {
    let room = classroom(InMemoryBackend::new().with_deferred_correction()).await;
    let (q1, _) = question_ids(&room.exam);
    let submission = room
        .backend
        .create_submission(
            &room.student.token,
            &room.exam.id,
            &SubmissionDraft {
                answers: answers(&[(&q1, "a")]),
            },
        )
        .await
        .unwrap();

    let mut view = CorrectionView::new(&submission.id);
    let load = view
        .wait(
            &room.backend,
            &room.student,
            PollPolicy {
                attempts: 3,
                interval: Duration::from_millis(500),
            },
        )
        .await;
    assert_eq!(load, Load::Applied);
    assert!(view.state().ready().unwrap().is_pending());
}

// --- Unmount ---

#[tokio::test(start_paused = true)]
async fn late_response_after_unmount_is_discarded() {
    let room = classroom(InMemoryBackend::new()).await;
    let slow = room.backend.with_latency(Duration::from_millis(200));

    let mut view = ExamDetailView::new(&room.exam.id);
    let mount = view.mount().clone();
    let (load, ()) = tokio::join!(view.load(&slow, &room.student), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        mount.unmount();
    });

    assert_eq!(load, Load::Discarded);
    assert!(view.detail().is_none());
    assert!(view.state().error().is_none());
}

// --- Partial failures ---

#[tokio::test]
async fn failed_submission_list_shows_exam_anyway() {
    let room = classroom(InMemoryBackend::new()).await;
    room.backend.fail_submission_list(true);

    let mut view = ExamDetailView::new(&room.exam.id);
    assert_eq!(view.load(&room.backend, &room.professor).await, Load::Applied);
    let detail = view.detail().unwrap();
    assert_eq!(detail.exam.id, room.exam.id);
    assert!(detail.submissions.is_empty());
}

#[tokio::test]
async fn report_without_corrections_shows_backend_message() {
    let room = classroom(InMemoryBackend::new()).await;

    let mut view = ReportView::new(&room.exam.id);
    view.load(&room.backend, &room.professor).await;
    let data = view.data().unwrap();
    assert!(data.report.is_none());
    assert_eq!(
        data.error.as_deref(),
        Some("Não há submissões corrigidas para gerar relatório.")
    );
}

#[tokio::test]
async fn report_survives_statistics_failure() {
    let room = classroom(InMemoryBackend::new()).await;
    let (q1, q2) = question_ids(&room.exam);
    let submission = room
        .backend
        .create_submission(
            &room.student.token,
            &room.exam.id,
            &SubmissionDraft {
                answers: answers(&[(&q1, "b"), (&q2, "V")]),
            },
        )
        .await
        .unwrap();
    room.backend
        .correct_submission(&room.professor.token, &submission.id)
        .await
        .unwrap();

    let mut view = ReportView::new(&room.exam.id);
    view.load(&room.backend, &room.professor).await;
    let data = view.data().unwrap();
    let report = data.report.as_ref().unwrap();
    assert_eq!(report.total_submissions, 1);
    assert_eq!(report.average_grade, 3.0);
    let rows = data.distribution_rows();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows.last().unwrap(), &("90-100%".to_string(), 1));
    assert_eq!(data.accuracy_rows(Some(&room.exam)).len(), 2);

    room.backend.fail_statistics(true);
    let mut view = ReportView::new(&room.exam.id);
    view.load(&room.backend, &room.professor).await;
    let data = view.data().unwrap();
    assert!(data.report.is_some());
    assert!(data.error.is_none());
    assert!(data.statistics.is_none());
    assert!(data.accuracy_rows(Some(&room.exam)).is_empty());
}

// --- Issues ---

#[tokio::test]
async fn professor_registers_issue_and_it_is_flagged() {
    let room = classroom(InMemoryBackend::new()).await;
    let (q1, _) = question_ids(&room.exam);

    let mut view = IssuesView::new(&q1);
    view.load(&room.backend, &room.professor).await;
    assert!(view.issues().is_empty());

    let blank = IssueDraft {
        problem_type: "  ".into(),
        severity: Severity::High,
        description: "duas alternativas corretas".into(),
    };
    let err = view
        .create(&room.backend, &room.professor, &blank)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(Rejection::Blank(_))));

    let draft = IssueDraft {
        problem_type: "Ambígua".into(),
        ..blank
    };
    let issue = view
        .create(&room.backend, &room.professor, &draft)
        .await
        .unwrap();
    assert_eq!(issue.origin, IssueOrigin::Manual);
    assert_eq!(issue.exam_id.as_deref(), Some(room.exam.id.as_str()));
    assert_eq!(view.issues().len(), 1);

    let err = view
        .create(&room.backend, &room.student, &draft)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected(Rejection::ProfessorOnly)));
}
