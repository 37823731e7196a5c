/*
[INPUT]:  TaskActionController wired to in-memory doubles
[OUTPUT]: Verification of the lock -> edit -> submit workflow
[POS]:    Integration test layer - controller scenarios
[UPDATE]: When controller operations, routing or dialogs change
*/

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::{
    FakeBackend, Harness, PROJECT_ID, RecordingNavigator, RecordingNotifier, TEST_USER, project,
    task,
};
use tasking_manager_adapter::{
    ContributionMode, Editor, EditorDispatcher, EditorError, LockError, MappingOutcome,
    SubmitError, TaskCategory, ValidationOutcome,
};
use tasking_manager_contributor::{
    ActionState, ContributeAction, ControllerSettings, DialogAction, ErrorKind, NoticeLevel,
    SessionDialogKind, SessionPhase, TaskActionController, WorkflowError,
};
use tokio_test::assert_ok;
use wiremock::MockServer;

#[tokio::test]
async fn test_lock_selected_task_opens_editor_route() {
    let h = Harness::new(
        ContributionMode::Mapping,
        &[(1, "READY"), (2, "READY"), (3, "MAPPED")],
    );
    assert_ok!(h.controller.load().await);

    assert_eq!(h.controller.select(2).await, Ok(ActionState::ReadyToLock));
    assert_eq!(h.controller.next_action().await, ContributeAction::MapSelectedTask);

    let state = h.controller.contribute().await;
    assert_eq!(state, Ok(ActionState::EditingExternally));
    assert_eq!(h.backend.calls(), vec!["lock-for-mapping 2"]);
    assert_eq!(h.navigator.paths(), vec!["/projects/1/map/?editor=ID"]);
    assert_eq!(h.editor.opened(), vec![(Editor::Id, vec![2])]);
    assert_eq!(h.controller.locked_task_ids().await, vec![2]);
    assert_eq!(h.controller.active_editor().await, Some(Editor::Id));
}

#[tokio::test]
async fn test_contribute_without_selection_picks_lowest_ready_task() {
    let h = Harness::new(
        ContributionMode::Mapping,
        &[(4, "READY"), (2, "READY"), (1, "MAPPED")],
    );
    assert_ok!(h.controller.load().await);
    assert_eq!(h.controller.next_action().await, ContributeAction::MapATask);

    assert_eq!(h.controller.contribute().await, Ok(ActionState::EditingExternally));
    assert_eq!(h.backend.calls(), vec!["lock-for-mapping 2"]);
    assert_eq!(h.controller.selection().await, vec![2]);
}

#[tokio::test(start_paused = true)]
async fn test_session_warning_and_expiry() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.lock(&[2]).await;

    tokio::time::advance(Duration::from_millis(6_899_999)).await;
    assert!(h.controller.session_dialog().await.is_none());

    tokio::time::advance(Duration::from_millis(1)).await;
    let warning = h.controller.session_dialog().await.expect("warning dialog");
    assert_eq!(warning.kind, SessionDialogKind::Warning);
    assert!(warning.title.contains("about to expire"));
    assert!(!warning.blocking);
    assert_eq!(warning.actions, vec![DialogAction::Extend, DialogAction::Dismiss]);
    assert_eq!(h.notifier.messages(NoticeLevel::Warning).len(), 1);

    tokio::time::advance(Duration::from_secs(300)).await;
    let expired = h.controller.session_dialog().await.expect("expired dialog");
    assert_eq!(expired.kind, SessionDialogKind::Expired);
    assert!(expired.title.contains("session expired"));
    assert!(expired.blocking);
    assert_eq!(
        h.controller.state().await,
        ActionState::Error(ErrorKind::SessionExpired)
    );
    assert!(!h.controller.has_pending_timers().await);

    assert_eq!(
        h.controller.submit_mapping(MappingOutcome::Mapped, None).await,
        Err(WorkflowError::SessionExpired)
    );
    assert!(!h.backend.calls().iter().any(|c| c.starts_with("unlock")));

    assert_eq!(
        h.controller.dismiss_session_dialog().await,
        ActionState::NoSelection
    );
    assert!(h.controller.session_dialog().await.is_none());
    assert_eq!(
        h.controller.submit_mapping(MappingOutcome::Mapped, None).await,
        Err(WorkflowError::SessionExpired)
    );
}

#[tokio::test(start_paused = true)]
async fn test_extend_restarts_session_timers() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.lock(&[2]).await;

    tokio::time::advance(Duration::from_secs(6_900)).await;
    assert!(h.controller.session_dialog().await.is_some());

    assert_ok!(h.controller.extend_session().await);
    assert!(h.controller.session_dialog().await.is_none());
    assert!(h.backend.calls().contains(&"extend [2]".to_string()));

    tokio::time::advance(Duration::from_secs(6_899)).await;
    assert!(h.controller.session_dialog().await.is_none());
    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(
        h.controller.session_dialog().await.map(|d| d.kind),
        Some(SessionDialogKind::Warning)
    );
}

#[tokio::test(start_paused = true)]
async fn test_dismissed_warning_stays_closed() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.lock(&[2]).await;

    tokio::time::advance(Duration::from_secs(6_950)).await;
    assert!(h.controller.session_dialog().await.is_some());
    h.controller.dismiss_session_dialog().await;
    assert!(h.controller.session_dialog().await.is_none());
    assert_eq!(h.controller.state().await, ActionState::EditingExternally);
}

#[tokio::test]
async fn test_unreachable_josm_shows_close_dialog() {
    let server = MockServer::start().await;
    let josm_url = server.uri();
    drop(server);

    let backend = Arc::new(FakeBackend::new(project(&["JOSM"]), vec![task(2, "READY")]));
    let navigator = Arc::new(RecordingNavigator::default());
    let controller = TaskActionController::new(
        ControllerSettings::new(PROJECT_ID, ContributionMode::Mapping, TEST_USER)
            .with_default_editor("JOSM"),
        backend.clone(),
        Arc::new(
            EditorDispatcher::with_remote_control_url(&josm_url, Duration::from_secs(2)).unwrap(),
        ),
        navigator.clone(),
        Arc::new(RecordingNotifier::default()),
    );
    assert_ok!(controller.load().await);
    controller.select(2).await.unwrap();

    let result = controller.contribute().await;
    assert!(matches!(result, Err(WorkflowError::EditorUnreachable { .. })));
    assert_eq!(
        controller.state().await,
        ActionState::Error(ErrorKind::EditorUnreachable)
    );

    let dialog = controller.error_dialog().await.expect("error dialog");
    assert_eq!(dialog.actions, vec![DialogAction::Close]);
    assert!(dialog.message.contains("remote control"));
    assert!(navigator.paths().is_empty());

    assert_eq!(controller.dismiss_error().await, Ok(ActionState::ReadyToSubmit));
    assert!(controller.error_dialog().await.is_none());
    assert_eq!(controller.locked_task_ids().await, vec![2]);
    assert_eq!(controller.active_editor().await, Some(Editor::Josm));
}

#[tokio::test]
async fn test_invalid_template_then_reopen() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.editor.fail_with(Some(EditorError::InvalidTemplate {
        template: "https://editor.example/?{foo}".to_string(),
        reason: "unknown placeholder {foo}".to_string(),
    }));
    assert_ok!(h.controller.load().await);
    h.controller.select(2).await.unwrap();

    let result = h.controller.contribute().await;
    assert!(matches!(result, Err(WorkflowError::InvalidTemplate { .. })));
    assert_eq!(
        h.controller.state().await,
        ActionState::Error(ErrorKind::InvalidTemplate)
    );
    assert_eq!(
        h.controller.error_dialog().await.map(|d| d.actions),
        Some(vec![DialogAction::Close])
    );
    assert!(h.navigator.paths().is_empty());

    assert_eq!(h.controller.dismiss_error().await, Ok(ActionState::ReadyToSubmit));
    h.editor.fail_with(None);
    assert_eq!(
        h.controller.reopen_editor().await,
        Ok(ActionState::EditingExternally)
    );
    assert_eq!(h.navigator.paths(), vec!["/projects/1/map/?editor=ID"]);
}

#[tokio::test]
async fn test_non_ready_selection_in_mapping_mode() {
    let h = Harness::new(ContributionMode::Mapping, &[(5, "MAPPED"), (6, "READY")]);
    assert_ok!(h.controller.load().await);

    assert_eq!(
        h.controller.select(5).await,
        Err(WorkflowError::NoMappedTasksSelected {
            mode: ContributionMode::Mapping,
            task_ids: vec![5],
        })
    );
    assert_eq!(h.controller.state().await, ActionState::NoSelection);
    assert_eq!(
        h.controller.next_action().await,
        ContributeAction::SelectCompatibleTasks
    );
    assert!(matches!(
        h.controller.contribute().await,
        Err(WorkflowError::NoMappedTasksSelected { .. })
    ));
    assert!(h.backend.calls().is_empty());

    // Mapping selection is single: picking a ready task replaces it.
    assert_eq!(h.controller.select(6).await, Ok(ActionState::ReadyToLock));
    assert_eq!(h.controller.selection().await, vec![6]);
}

#[tokio::test]
async fn test_select_unknown_task() {
    let h = Harness::new(ContributionMode::Mapping, &[(1, "READY")]);
    assert_ok!(h.controller.load().await);
    assert_eq!(
        h.controller.select(42).await,
        Err(WorkflowError::UnknownTask { task_id: 42 })
    );
}

#[tokio::test]
async fn test_partial_validation_batch_continues_with_locked_tasks() {
    let h = Harness::new(
        ContributionMode::Validation,
        &[(1, "MAPPED"), (2, "MAPPED"), (11, "MAPPED")],
    );
    h.backend.fail_lock(
        11,
        LockError::AlreadyLocked {
            task_id: 11,
            message: "locked by someone_else".to_string(),
        },
    );
    h.lock(&[1, 2, 11]).await;

    assert_eq!(h.controller.state().await, ActionState::EditingExternally);
    assert_eq!(h.controller.locked_task_ids().await, vec![1, 2]);
    assert_eq!(h.controller.selection().await, vec![1, 2]);

    let failures = h.controller.lock_failures().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].task_id(), 11);
    assert!(h.notifier.messages(NoticeLevel::Warning)[0].contains("11"));

    assert_eq!(h.navigator.paths(), vec!["/projects/1/validate/?editor=ID"]);
    assert_eq!(h.editor.opened(), vec![(Editor::Id, vec![1, 2])]);
}

#[tokio::test]
async fn test_failed_lock_offers_retry() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.backend.fail_lock(
        2,
        LockError::AlreadyLocked {
            task_id: 2,
            message: "Task in invalid state for mapping".to_string(),
        },
    );
    assert_ok!(h.controller.load().await);
    h.controller.select(2).await.unwrap();

    assert!(matches!(
        h.controller.contribute().await,
        Err(WorkflowError::Lock(LockError::AlreadyLocked { task_id: 2, .. }))
    ));
    assert_eq!(h.controller.state().await, ActionState::Error(ErrorKind::Lock));
    let dialog = h.controller.error_dialog().await.expect("lock dialog");
    assert_eq!(
        dialog.actions,
        vec![DialogAction::Retry, DialogAction::SelectOtherTasks]
    );
    assert!(!h.controller.has_pending_timers().await);

    h.backend.lock_errors.lock().unwrap().clear();
    assert_eq!(
        h.controller.contribute().await,
        Ok(ActionState::EditingExternally)
    );
    assert!(h.controller.error_dialog().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_contribute_while_locking_is_refused() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    *h.backend.lock_delay.lock().unwrap() = Some(Duration::from_secs(1));
    assert_ok!(h.controller.load().await);
    h.controller.select(2).await.unwrap();

    let controller = h.controller.clone();
    let pending = tokio::spawn(async move { controller.contribute().await });
    tokio::task::yield_now().await;

    assert_eq!(h.controller.state().await, ActionState::Locking);
    assert_eq!(h.controller.contribute().await, Err(WorkflowError::Busy));

    assert_eq!(pending.await.unwrap(), Ok(ActionState::EditingExternally));
    assert_eq!(h.backend.calls(), vec!["lock-for-mapping 2"]);
}

#[tokio::test(start_paused = true)]
async fn test_emptying_selection_while_locking_drops_result() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    *h.backend.lock_delay.lock().unwrap() = Some(Duration::from_secs(1));
    assert_ok!(h.controller.load().await);
    h.controller.select(2).await.unwrap();

    let controller = h.controller.clone();
    let pending = tokio::spawn(async move { controller.contribute().await });
    tokio::task::yield_now().await;

    assert_eq!(h.controller.deselect(2).await, Ok(ActionState::NoSelection));
    assert_eq!(pending.await.unwrap(), Err(WorkflowError::Superseded));

    assert_eq!(h.controller.state().await, ActionState::NoSelection);
    assert!(h.navigator.paths().is_empty());
    assert!(h.editor.opened().is_empty());
    assert!(h.controller.locked_task_ids().await.is_empty());
    assert!(!h.controller.has_pending_timers().await);
}

#[tokio::test]
async fn test_submit_mapping_routes_to_task_selection() {
    let h = Harness::new(ContributionMode::Mapping, &[(1, "READY"), (2, "READY")]);
    h.lock(&[2]).await;

    assert_eq!(
        h.controller.finish_editing().await,
        Ok(ActionState::ReadyToSubmit)
    );
    assert_eq!(
        h.controller
            .submit_mapping(MappingOutcome::Mapped, Some("done"))
            .await,
        Ok(ActionState::Complete)
    );

    assert_eq!(h.backend.status_of(2).as_deref(), Some("MAPPED"));
    assert_eq!(
        h.navigator.paths(),
        vec!["/projects/1/map/?editor=ID", "/projects/1/tasks/"]
    );
    assert!(!h.controller.has_pending_timers().await);
    assert!(h.controller.selection().await.is_empty());
    assert_eq!(h.controller.next_action().await, ContributeAction::MapATask);
}

#[tokio::test]
async fn test_last_task_routes_to_explore() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.lock(&[2]).await;
    h.controller.finish_editing().await.unwrap();
    h.controller
        .submit_mapping(MappingOutcome::Mapped, None)
        .await
        .unwrap();

    assert_eq!(h.navigator.paths().last().map(String::as_str), Some("/explore/"));
}

#[tokio::test]
async fn test_remaining_locks_route_back_to_editor() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY"), (3, "READY")]);
    h.lock(&[2]).await;
    h.controller.finish_editing().await.unwrap();

    h.backend.hold_locks(PROJECT_ID, &[3], ContributionMode::Mapping);
    h.controller
        .submit_mapping(MappingOutcome::BadImagery, None)
        .await
        .unwrap();

    assert_eq!(
        h.navigator.paths().last().map(String::as_str),
        Some("/projects/1/map/?editor=ID")
    );
    assert_eq!(h.controller.next_action().await, ContributeAction::ResumeMapping);
}

#[tokio::test]
async fn test_submit_failure_then_retry() {
    let h = Harness::new(ContributionMode::Mapping, &[(1, "READY"), (2, "READY")]);
    h.lock(&[2]).await;
    h.controller.finish_editing().await.unwrap();
    h.backend.fail_releases(Some(SubmitError::Conflict {
        message: "User not permitted to unlock task".to_string(),
    }));

    assert!(matches!(
        h.controller.submit_mapping(MappingOutcome::Mapped, None).await,
        Err(WorkflowError::Submit(SubmitError::Conflict { .. }))
    ));
    assert_eq!(h.controller.state().await, ActionState::Error(ErrorKind::Submit));
    assert_eq!(
        h.controller.error_dialog().await.map(|d| d.actions),
        Some(vec![DialogAction::Retry, DialogAction::StopEditing])
    );
    assert!(h.controller.has_pending_timers().await);

    h.backend.fail_releases(None);
    assert_eq!(h.controller.dismiss_error().await, Ok(ActionState::ReadyToSubmit));
    assert_eq!(
        h.controller.submit_mapping(MappingOutcome::Mapped, None).await,
        Ok(ActionState::Complete)
    );
}

#[tokio::test]
async fn test_submit_validation_records_each_verdict() {
    let h = Harness::new(
        ContributionMode::Validation,
        &[(1, "MAPPED"), (2, "MAPPED"), (3, "MAPPED")],
    );
    h.lock(&[1, 2]).await;
    h.controller.finish_editing().await.unwrap();

    let outcomes = HashMap::from([
        (1, ValidationOutcome::Validated),
        (2, ValidationOutcome::Invalidated),
    ]);
    assert_eq!(
        h.controller.submit_validation(&outcomes, Some("checked")).await,
        Ok(ActionState::Complete)
    );
    assert_eq!(h.backend.status_of(1).as_deref(), Some("VALIDATED"));
    assert_eq!(h.backend.status_of(2).as_deref(), Some("INVALIDATED"));
    assert_eq!(
        h.navigator.paths().last().map(String::as_str),
        Some("/projects/1/tasks/")
    );
}

#[tokio::test]
async fn test_submit_in_wrong_mode_is_refused() {
    let h = Harness::new(ContributionMode::Validation, &[(1, "MAPPED")]);
    h.lock(&[1]).await;
    h.controller.finish_editing().await.unwrap();

    assert_eq!(
        h.controller.submit_mapping(MappingOutcome::Mapped, None).await,
        Err(WorkflowError::WrongMode {
            expected: ContributionMode::Mapping,
            actual: ContributionMode::Validation,
        })
    );
    assert_eq!(h.controller.state().await, ActionState::ReadyToSubmit);
}

#[tokio::test]
async fn test_stop_releases_without_outcome() {
    let h = Harness::new(ContributionMode::Mapping, &[(1, "READY"), (2, "READY")]);
    h.lock(&[2]).await;

    assert_eq!(
        h.controller.stop(Some("no time")).await,
        Ok(ActionState::Complete)
    );
    assert!(h.backend.calls().contains(&"stop-mapping 2".to_string()));
    assert_eq!(h.backend.status_of(2).as_deref(), Some("READY"));
    assert!(!h.controller.has_pending_timers().await);
}

#[tokio::test]
async fn test_split_replaces_task() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.lock(&[2]).await;
    h.controller.finish_editing().await.unwrap();

    assert_eq!(h.controller.split().await, Ok(ActionState::Complete));
    let ids: Vec<u64> = h.controller.tasks().await.iter().map(|t| t.task_id).collect();
    assert_eq!(ids, vec![3, 4, 5, 6]);
    assert_eq!(
        h.navigator.paths().last().map(String::as_str),
        Some("/projects/1/tasks/")
    );
}

#[tokio::test]
async fn test_resume_adopts_own_locks() {
    let h = Harness::new(ContributionMode::Mapping, &[(3, "READY"), (4, "READY")]);
    h.backend.hold_locks(PROJECT_ID, &[3], ContributionMode::Mapping);
    assert_ok!(h.controller.load().await);

    assert_eq!(h.controller.next_action().await, ContributeAction::ResumeMapping);
    assert_eq!(
        h.controller.contribute().await,
        Ok(ActionState::EditingExternally)
    );
    assert!(h.backend.calls().is_empty());
    assert_eq!(h.controller.locked_task_ids().await, vec![3]);
    assert_eq!(h.navigator.paths(), vec!["/projects/1/map/?editor=ID"]);
    assert!(h.controller.has_pending_timers().await);
}

#[tokio::test]
async fn test_locks_in_other_project_navigate_there() {
    let h = Harness::new(ContributionMode::Mapping, &[(3, "READY")]);
    h.backend.hold_locks(9, &[3], ContributionMode::Mapping);
    assert_ok!(h.controller.load().await);

    assert_eq!(
        h.controller.next_action().await,
        ContributeAction::ResumeInOtherProject { project_id: 9 }
    );
    assert_eq!(h.controller.contribute().await, Ok(ActionState::NoSelection));
    assert_eq!(h.navigator.paths(), vec!["/projects/9/map/?editor=ID"]);
}

#[tokio::test]
async fn test_nothing_to_do_navigates_to_explore() {
    let h = Harness::new(ContributionMode::Mapping, &[(1, "MAPPED"), (2, "VALIDATED")]);
    assert_ok!(h.controller.load().await);

    assert_eq!(
        h.controller.next_action().await,
        ContributeAction::SelectAnotherProject
    );
    assert_eq!(h.controller.contribute().await, Ok(ActionState::NoSelection));
    assert_eq!(h.navigator.paths(), vec!["/explore/"]);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_cancels_timers() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.lock(&[2]).await;
    assert!(h.controller.has_pending_timers().await);

    h.controller.teardown().await;
    assert!(!h.controller.has_pending_timers().await);
    assert_eq!(h.controller.state().await, ActionState::NoSelection);

    tokio::time::advance(Duration::from_secs(7_200)).await;
    assert!(h.controller.session_dialog().await.is_none());
    assert!(h.notifier.messages(NoticeLevel::Error).is_empty());
}

#[tokio::test]
async fn test_contribute_before_load() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    assert_eq!(
        h.controller.contribute().await,
        Err(WorkflowError::NotLoaded { project_id: 1 })
    );
}

#[tokio::test(start_paused = true)]
async fn test_extend_after_resume_rearms_full_lock_lifetime() {
    let h = Harness::new(ContributionMode::Mapping, &[(3, "READY")]);
    h.backend.hold_locks(PROJECT_ID, &[3], ContributionMode::Mapping);
    h.backend.age_locks(&[3], Duration::from_secs(7_000));
    assert_ok!(h.controller.load().await);

    assert_eq!(
        h.controller.contribute().await,
        Ok(ActionState::EditingExternally)
    );
    assert_eq!(
        h.controller.session_dialog().await.map(|d| d.kind),
        Some(SessionDialogKind::Warning)
    );

    assert_ok!(h.controller.extend_session().await);
    tokio::time::advance(Duration::from_secs(300)).await;
    assert_eq!(h.controller.state().await, ActionState::EditingExternally);
    assert!(h.controller.session_dialog().await.is_none());
    assert_eq!(h.controller.locked_task_ids().await, vec![3]);

    tokio::time::advance(Duration::from_secs(6_600)).await;
    assert_eq!(
        h.controller.session_dialog().await.map(|d| d.kind),
        Some(SessionDialogKind::Warning)
    );
}

#[tokio::test(start_paused = true)]
async fn test_expiry_during_submit_overrides_submit_error() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.lock(&[2]).await;
    h.controller.finish_editing().await.unwrap();

    tokio::time::advance(Duration::from_secs(7_100)).await;
    h.backend.fail_releases(Some(SubmitError::Conflict {
        message: "Task is not locked".to_string(),
    }));
    h.backend.delay_releases(Some(Duration::from_secs(200)));

    assert_eq!(
        h.controller.submit_mapping(MappingOutcome::Mapped, None).await,
        Err(WorkflowError::SessionExpired)
    );
    assert_eq!(h.backend.calls().last().map(String::as_str), Some("unlock-after-mapping 2"));
    assert_eq!(
        h.controller.state().await,
        ActionState::Error(ErrorKind::SessionExpired)
    );
    assert!(h.controller.error_dialog().await.is_none());
    assert_eq!(
        h.controller.session_dialog().await.map(|d| d.kind),
        Some(SessionDialogKind::Expired)
    );
    assert!(
        h.notifier
            .messages(NoticeLevel::Error)
            .iter()
            .all(|m| !m.contains("not locked"))
    );
}

#[tokio::test(start_paused = true)]
async fn test_session_watch_reports_deadlines_as_they_pass() {
    let h = Harness::new(ContributionMode::Mapping, &[(2, "READY")]);
    h.lock(&[2]).await;
    let started = tokio::time::Instant::now();

    let mut phases = h.controller.watch_session().await;
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Active);

    phases.changed().await.unwrap();
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Warning);
    assert_eq!(started.elapsed().as_secs(), 6_900);

    phases.changed().await.unwrap();
    assert_eq!(*phases.borrow_and_update(), SessionPhase::Expired);
    assert_eq!(started.elapsed().as_secs(), 7_200);
    assert_eq!(
        h.controller.state().await,
        ActionState::Error(ErrorKind::SessionExpired)
    );
}

#[tokio::test]
async fn test_categorized_tasks_follow_configured_user_and_mode() {
    let h = Harness::new(
        ContributionMode::Mapping,
        &[
            (1, "READY"),
            (2, "INVALIDATED"),
            (3, "MAPPED"),
            (4, "READY"),
            (5, "LOCKED_FOR_MAPPING"),
            (6, "ARCHIVED"),
        ],
    );
    h.backend.hold_locks(PROJECT_ID, &[4], ContributionMode::Mapping);
    h.backend.tasks.lock().unwrap().get_mut(&5).unwrap().lock_holder =
        Some("someone_else".to_string());
    assert_ok!(h.controller.load().await);

    let categories: Vec<(u64, Option<TaskCategory>)> = h
        .controller
        .categorized_tasks()
        .await
        .into_iter()
        .map(|(task, category)| (task.task_id, category))
        .collect();
    assert_eq!(
        categories,
        vec![
            (1, Some(TaskCategory::Ready)),
            (2, Some(TaskCategory::Complete)),
            (3, Some(TaskCategory::Complete)),
            (4, Some(TaskCategory::LockedByMe)),
            (5, Some(TaskCategory::LockedByOther)),
            (6, None),
        ]
    );
}
