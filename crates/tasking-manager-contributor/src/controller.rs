/*
[INPUT]:  User actions, TaskingBackend, EditorLauncher, Navigator, Notifier
[OUTPUT]: Driven lock -> edit -> submit workflow with observable state and dialogs
[POS]:    Workflow orchestration - the task action controller
[UPDATE]: When workflow operations or completion routing change
*/

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use tasking_manager_adapter::{
    ContributionMode, Editor, EditorOutcome, LockError, LockedTasks, MappingOutcome,
    ProjectSummary, SubmitResult, Task, TaskCategory, TaskLockOutcome, ValidationOutcome,
    ValidationPermission, categorize, resolve_editor,
};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::action::{ActionContext, ContributeAction, next_action, pick_task};
use crate::backend::{EditorLauncher, TaskingBackend};
use crate::dialog::{ErrorDialog, SessionDialog};
use crate::error::WorkflowError;
use crate::machine::{ActionState, ErrorKind, MachineEvent, StateError, TaskStateMachine};
use crate::navigation::{Navigator, NoticeLevel, Notifier, Route};
use crate::selection::{Selection, incompatible_ids, workable_ids};
use crate::session::{DEFAULT_LOCK_TTL, DEFAULT_WARNING_LEAD, SessionExpiryMonitor, SessionPhase};

/// Per-project settings of a controller
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub project_id: u64,
    pub mode: ContributionMode,
    pub permission: ValidationPermission,
    pub username: String,
    /// Preferred editor key, used when the project allows it
    pub default_editor: String,
    pub warning_lead: Duration,
}

impl ControllerSettings {
    pub fn new(project_id: u64, mode: ContributionMode, username: impl Into<String>) -> Self {
        Self {
            project_id,
            mode,
            permission: ValidationPermission::default(),
            username: username.into(),
            default_editor: Editor::Id.key().to_string(),
            warning_lead: DEFAULT_WARNING_LEAD,
        }
    }

    pub fn with_permission(mut self, permission: ValidationPermission) -> Self {
        self.permission = permission;
        self
    }

    pub fn with_default_editor(mut self, editor: impl Into<String>) -> Self {
        self.default_editor = editor.into();
        self
    }

    pub fn with_warning_lead(mut self, lead: Duration) -> Self {
        self.warning_lead = lead;
        self
    }
}

/// Locks held by this controller and the timers watching them
struct LockSession {
    project_id: u64,
    mode: ContributionMode,
    tasks: Vec<Task>,
    editor: Editor,
    /// Full lock lifetime granted by the server, re-armed on every extend
    ttl: Duration,
    monitor: SessionExpiryMonitor,
    listener: JoinHandle<()>,
    warned: bool,
    warning_dismissed: bool,
}

impl LockSession {
    fn task_ids(&self) -> Vec<u64> {
        self.tasks.iter().map(|task| task.task_id).collect()
    }
}

impl Drop for LockSession {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

struct Inner {
    machine: TaskStateMachine,
    project: Option<ProjectSummary>,
    tasks: BTreeMap<u64, Task>,
    locked: LockedTasks,
    selection: Selection,
    session: Option<LockSession>,
    /// Bumped by every operation that starts an async step
    attempt: u64,
    /// Bumped whenever a lock session starts, restarts or ends
    session_generation: u64,
    session_expired: bool,
    expired_dialog_open: bool,
    error: Option<ErrorDialog>,
    lock_failures: Vec<LockError>,
    /// Session phase as last applied, for prompts waiting on user input
    phase: watch::Sender<SessionPhase>,
}

impl Inner {
    fn new() -> Self {
        Self {
            machine: TaskStateMachine::default(),
            project: None,
            tasks: BTreeMap::new(),
            locked: LockedTasks::default(),
            selection: Selection::new(),
            session: None,
            attempt: 0,
            session_generation: 0,
            session_expired: false,
            expired_dialog_open: false,
            error: None,
            lock_failures: Vec::new(),
            phase: watch::channel(SessionPhase::Cancelled).0,
        }
    }

    fn next_attempt(&mut self) -> u64 {
        self.attempt += 1;
        self.attempt
    }

    /// Apply deadlines that passed since the last look.
    fn sync_session(&mut self, notifier: &dyn Notifier) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.monitor.phase() {
            SessionPhase::Warning if !session.warned => {
                session.warned = true;
                info!(
                    project_id = session.project_id,
                    remaining_secs = session.monitor.remaining().as_secs(),
                    "task session about to expire"
                );
                self.phase.send_replace(SessionPhase::Warning);
                notifier.notify(NoticeLevel::Warning, &SessionDialog::warning().title);
            }
            SessionPhase::Expired => {
                warn!(
                    project_id = session.project_id,
                    task_ids = ?session.task_ids(),
                    "task session expired"
                );
                self.session = None;
                self.session_generation += 1;
                self.session_expired = true;
                self.expired_dialog_open = true;
                self.error = None;
                self.locked = LockedTasks::default();
                let _ = self.machine.transition(MachineEvent::SessionExpired);
                self.phase.send_replace(SessionPhase::Expired);
                notifier.notify(NoticeLevel::Error, &SessionDialog::expired().title);
            }
            _ => {}
        }
    }

    fn end_session(&mut self) {
        if self.session.take().is_some() {
            self.session_generation += 1;
        }
        self.locked = LockedTasks::default();
        self.phase.send_replace(SessionPhase::Cancelled);
    }

    fn editor_for(&self, settings: &ControllerSettings, mode: ContributionMode) -> Editor {
        let allowed: &[String] = self
            .project
            .as_ref()
            .map(|project| project.editors_for(mode))
            .unwrap_or_default();
        resolve_editor(&settings.default_editor, allowed)
    }

    fn next_action(&self, settings: &ControllerSettings) -> ContributeAction {
        next_action(&ActionContext {
            project_id: settings.project_id,
            mode: settings.mode,
            permission: settings.permission,
            selection: &self.selection,
            tasks: &self.tasks,
            locked: &self.locked,
        })
    }

    /// Move the machine to match the selection.
    fn reevaluate_selection(
        &mut self,
        settings: &ControllerSettings,
    ) -> Result<ActionState, WorkflowError> {
        if self.machine.state() == ActionState::Error(ErrorKind::Lock) {
            self.error = None;
        }
        if self.selection.is_empty() {
            return Ok(self.machine.transition(MachineEvent::SelectionCleared)?);
        }

        let incompatible =
            incompatible_ids(&self.selection, &self.tasks, settings.mode, settings.permission);
        if incompatible.is_empty() {
            return Ok(self.machine.transition(MachineEvent::SelectionValid)?);
        }
        self.machine.transition(MachineEvent::SelectionInvalid)?;
        Err(WorkflowError::NoMappedTasksSelected {
            mode: settings.mode,
            task_ids: incompatible,
        })
    }

    fn check_editable(&self) -> Result<(), WorkflowError> {
        if self.session_expired {
            return Err(WorkflowError::SessionExpired);
        }
        if self.machine.state().is_busy() {
            return Err(WorkflowError::Busy);
        }
        Ok(())
    }

    /// Merge server task records; action responses carry no outline, so a
    /// known geometry is kept.
    fn store_tasks(&mut self, project_id: u64, tasks: impl IntoIterator<Item = Task>) {
        for mut task in tasks {
            task.project_id = project_id;
            if task.geometry.is_none() {
                task.geometry = self
                    .tasks
                    .get(&task.task_id)
                    .and_then(|known| known.geometry.clone());
            }
            self.tasks.insert(task.task_id, task);
        }
    }
}

enum ContributePlan {
    Lock { attempt: u64, task_ids: Vec<u64> },
    Resume,
    Navigate(Route),
}

/// Drives one project's contribution flow.
///
/// Cheap to clone; clones share state. State lives behind an async mutex that
/// is never held across a network call. Each async step records the attempt
/// number it started under and its completion is dropped when a newer attempt
/// has begun in the meantime.
#[derive(Clone)]
pub struct TaskActionController {
    settings: Arc<ControllerSettings>,
    backend: Arc<dyn TaskingBackend>,
    editors: Arc<dyn EditorLauncher>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    inner: Arc<Mutex<Inner>>,
}

impl TaskActionController {
    pub fn new(
        settings: ControllerSettings,
        backend: Arc<dyn TaskingBackend>,
        editors: Arc<dyn EditorLauncher>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            backend,
            editors,
            navigator,
            notifier,
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// Fetch the project, its tasks and the user's own locks
    pub async fn load(&self) -> Result<(), WorkflowError> {
        let project_id = self.settings.project_id;
        let project = self
            .backend
            .project(project_id)
            .await
            .map_err(|err| unexpected("load project", err))?;
        let tasks = self
            .backend
            .project_tasks(project_id)
            .await
            .map_err(|err| unexpected("load project tasks", err))?;
        let locked = self.fetch_locked().await;

        let mut inner = self.inner.lock().await;
        inner.project = Some(project);
        inner.tasks.clear();
        inner.store_tasks(project_id, tasks);
        inner.locked = locked;
        info!(
            project_id,
            tasks = inner.tasks.len(),
            own_locks = inner.locked.locked_tasks.len(),
            "project loaded"
        );
        Ok(())
    }

    pub async fn state(&self) -> ActionState {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        inner.machine.state()
    }

    pub async fn selection(&self) -> Vec<u64> {
        self.inner.lock().await.selection.ids().to_vec()
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.inner.lock().await.tasks.values().cloned().collect()
    }

    /// Tasks with their category for the configured user; `None` marks an
    /// unrecognised status
    pub async fn categorized_tasks(&self) -> Vec<(Task, Option<TaskCategory>)> {
        let settings = &self.settings;
        self.inner
            .lock()
            .await
            .tasks
            .values()
            .map(|task| {
                let category =
                    categorize(task, &settings.username, settings.mode, settings.permission)
                        .inspect_err(|err| {
                            debug!(task_id = task.task_id, error = %err, "uncategorized task")
                        })
                        .ok();
                (task.clone(), category)
            })
            .collect()
    }

    pub async fn project(&self) -> Option<ProjectSummary> {
        self.inner.lock().await.project.clone()
    }

    pub async fn next_action(&self) -> ContributeAction {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        inner.next_action(&self.settings)
    }

    /// Ids of the tasks locked by the current session
    pub async fn locked_task_ids(&self) -> Vec<u64> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        inner.session.as_ref().map(LockSession::task_ids).unwrap_or_default()
    }

    pub async fn active_editor(&self) -> Option<Editor> {
        self.inner.lock().await.session.as_ref().map(|s| s.editor)
    }

    /// Per-task failures of the last lock attempt
    pub async fn lock_failures(&self) -> Vec<LockError> {
        self.inner.lock().await.lock_failures.clone()
    }

    pub async fn has_pending_timers(&self) -> bool {
        self.inner
            .lock()
            .await
            .session
            .as_ref()
            .is_some_and(|s| s.monitor.has_pending_timers())
    }

    pub async fn error_dialog(&self) -> Option<ErrorDialog> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        inner.error.clone()
    }

    pub async fn session_dialog(&self) -> Option<SessionDialog> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        if inner.expired_dialog_open {
            return Some(SessionDialog::expired());
        }
        inner
            .session
            .as_ref()
            .filter(|s| s.monitor.phase() == SessionPhase::Warning && !s.warning_dismissed)
            .map(|_| SessionDialog::warning())
    }

    /// Follow session phase changes, e.g. to interrupt a waiting prompt
    pub async fn watch_session(&self) -> watch::Receiver<SessionPhase> {
        self.inner.lock().await.phase.subscribe()
    }

    /// Add a task to the selection; in mapping mode it replaces the selection
    pub async fn select(&self, task_id: u64) -> Result<ActionState, WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        let state = inner.machine.state();
        match state {
            ActionState::NoSelection
            | ActionState::ReadyToLock
            | ActionState::Error(ErrorKind::Lock) => {}
            ActionState::Complete => {
                inner.machine.transition(MachineEvent::Reset)?;
            }
            ActionState::Locking | ActionState::Submitting => return Err(WorkflowError::Busy),
            _ => {
                return Err(StateError::InvalidTransition {
                    from: state,
                    event: MachineEvent::SelectionValid,
                }
                .into());
            }
        }
        if !inner.tasks.contains_key(&task_id) {
            return Err(WorkflowError::UnknownTask { task_id });
        }

        match self.settings.mode {
            ContributionMode::Mapping => inner.selection.replace(task_id),
            ContributionMode::Validation => {
                inner.selection.insert(task_id);
            }
        }
        debug!(task_id, selection = ?inner.selection.ids(), "task selected");
        inner.reevaluate_selection(&self.settings)
    }

    /// Remove a task from the selection.
    ///
    /// Emptying the selection while a lock request is in flight resets the
    /// flow and drops the pending result without unlocking.
    pub async fn deselect(&self, task_id: u64) -> Result<ActionState, WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        match inner.machine.state() {
            ActionState::Locking => {
                if inner.selection.ids() != [task_id] {
                    return Err(WorkflowError::Busy);
                }
                inner.next_attempt();
                inner.selection.clear();
                info!(task_id, "selection emptied while locking, pending lock dropped");
                Ok(inner.machine.transition(MachineEvent::SelectionCleared)?)
            }
            ActionState::NoSelection
            | ActionState::ReadyToLock
            | ActionState::Error(ErrorKind::Lock) => {
                inner.selection.remove(task_id);
                inner.reevaluate_selection(&self.settings)
            }
            state => Err(StateError::InvalidTransition {
                from: state,
                event: MachineEvent::SelectionCleared,
            }
            .into()),
        }
    }

    pub async fn clear_selection(&self) -> Result<ActionState, WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        if inner.machine.state() == ActionState::Locking {
            inner.next_attempt();
        }
        if inner.machine.state() == ActionState::Error(ErrorKind::Lock) {
            inner.error = None;
        }
        inner.machine.transition(MachineEvent::SelectionCleared)?;
        inner.selection.clear();
        Ok(inner.machine.state())
    }

    /// Run the current contribute action: lock and open the editor, resume own
    /// locks, or navigate elsewhere when there is nothing to lock here.
    pub async fn contribute(&self) -> Result<ActionState, WorkflowError> {
        let plan = {
            let mut inner = self.inner.lock().await;
            inner.sync_session(self.notifier.as_ref());
            if inner.machine.state().is_busy() {
                return Err(WorkflowError::Busy);
            }
            if inner.project.is_none() {
                return Err(WorkflowError::NotLoaded {
                    project_id: self.settings.project_id,
                });
            }
            if inner.machine.state() == ActionState::Complete {
                inner.machine.transition(MachineEvent::Reset)?;
            }

            let action = inner.next_action(&self.settings);
            debug!(%action, state = %inner.machine.state(), "contribute");
            match action {
                ContributeAction::ResumeMapping | ContributeAction::ResumeValidation => {
                    ContributePlan::Resume
                }
                ContributeAction::ResumeInOtherProject { project_id } => {
                    let mode = inner.locked.mode().unwrap_or(self.settings.mode);
                    let editor = resolve_editor::<&str>(&self.settings.default_editor, &[]);
                    ContributePlan::Navigate(Route::editing(mode, project_id, editor))
                }
                ContributeAction::SelectAnotherProject => ContributePlan::Navigate(Route::Explore),
                ContributeAction::SelectCompatibleTasks => {
                    return Err(WorkflowError::NoMappedTasksSelected {
                        mode: self.settings.mode,
                        task_ids: incompatible_ids(
                            &inner.selection,
                            &inner.tasks,
                            self.settings.mode,
                            self.settings.permission,
                        ),
                    });
                }
                ContributeAction::MapATask
                | ContributeAction::ValidateATask
                | ContributeAction::MapSelectedTask
                | ContributeAction::ValidateSelectedTask => {
                    if inner.selection.is_empty() {
                        let picked =
                            pick_task(&inner.tasks, self.settings.mode, self.settings.permission)
                                .ok_or(WorkflowError::NoLockSession)?;
                        inner.selection.replace(picked);
                        info!(task_id = picked, "picked task to contribute to");
                    }
                    if inner.machine.state() == ActionState::NoSelection {
                        inner.reevaluate_selection(&self.settings)?;
                    }
                    inner.machine.transition(MachineEvent::Contribute)?;
                    inner.error = None;
                    inner.lock_failures.clear();
                    ContributePlan::Lock {
                        attempt: inner.next_attempt(),
                        task_ids: inner.selection.ids().to_vec(),
                    }
                }
            }
        };

        match plan {
            ContributePlan::Lock { attempt, task_ids } => {
                self.lock_and_open(attempt, task_ids).await
            }
            ContributePlan::Resume => self.resume().await,
            ContributePlan::Navigate(route) => {
                info!(%route, "nothing to lock here");
                self.navigator.navigate(&route);
                Ok(self.state().await)
            }
        }
    }

    async fn lock_and_open(
        &self,
        attempt: u64,
        task_ids: Vec<u64>,
    ) -> Result<ActionState, WorkflowError> {
        let project_id = self.settings.project_id;
        let mode = self.settings.mode;
        info!(project_id, %mode, ?task_ids, "locking tasks");

        let outcomes = match mode {
            ContributionMode::Mapping => {
                let mut outcomes = Vec::with_capacity(task_ids.len());
                for &task_id in &task_ids {
                    let result = self.backend.lock_for_mapping(project_id, task_id).await;
                    outcomes.push(TaskLockOutcome { task_id, result });
                }
                outcomes
            }
            ContributionMode::Validation => {
                self.backend.lock_for_validation(project_id, &task_ids).await
            }
        };

        {
            let mut inner = self.inner.lock().await;
            inner.sync_session(self.notifier.as_ref());
            if inner.attempt != attempt {
                debug!(attempt, current = inner.attempt, "discarding stale lock result");
                return Err(WorkflowError::Superseded);
            }

            let mut locked = Vec::new();
            let mut failures = Vec::new();
            for outcome in outcomes {
                match outcome.result {
                    Ok(task) => locked.push(task),
                    Err(err) => failures.push(err),
                }
            }
            inner.lock_failures = failures.clone();

            if locked.is_empty() {
                let err = failures.into_iter().next().unwrap_or_else(|| LockError::Unexpected {
                    task_id: task_ids.first().copied().unwrap_or_default(),
                    message: "no lock outcome returned".to_string(),
                });
                warn!(project_id, error = %err, "lock failed");
                inner.machine.transition(MachineEvent::LockFailed)?;
                let err = WorkflowError::Lock(err);
                inner.error = ErrorDialog::for_error(&err);
                self.notifier.notify(NoticeLevel::Error, &err.to_string());
                return Err(err);
            }

            let locked_ids: Vec<u64> = locked.iter().map(|t| t.task_id).collect();
            if !failures.is_empty() {
                let failed: Vec<u64> = failures.iter().map(LockError::task_id).collect();
                warn!(project_id, ?failed, "continuing with partially locked batch");
                self.notifier.notify(
                    NoticeLevel::Warning,
                    &format!(
                        "Could not lock task(s) {}; continuing with the {} locked task(s)",
                        join_ids(&failed),
                        locked.len()
                    ),
                );
                inner.selection.retain(|id| locked_ids.contains(&id));
            }

            inner.store_tasks(project_id, locked);
            let locked: Vec<Task> = locked_ids
                .iter()
                .filter_map(|id| inner.tasks.get(id).cloned())
                .collect();
            let ttl = lock_ttl(&locked, false);
            let editor = inner.editor_for(&self.settings, mode);
            self.begin_session(&mut inner, mode, locked, editor, ttl, ttl);
            inner.machine.transition(MachineEvent::LockSucceeded)?;
            info!(project_id, task_ids = ?inner.selection.ids(), %editor, "tasks locked");
        }

        self.open_editor(attempt).await
    }

    /// Adopt locks the user already holds in this project
    async fn resume(&self) -> Result<ActionState, WorkflowError> {
        let attempt = {
            let mut inner = self.inner.lock().await;
            let project_id = self.settings.project_id;
            let mode = inner.locked.mode().unwrap_or(self.settings.mode);
            let tasks: Vec<Task> = inner
                .locked
                .locked_tasks
                .iter()
                .filter_map(|id| inner.tasks.get(id).cloned())
                .collect();
            if tasks.is_empty() {
                return Err(WorkflowError::NoLockSession);
            }

            inner.machine.transition(MachineEvent::Resume)?;
            inner.selection.clear();
            for task in &tasks {
                inner.selection.insert(task.task_id);
            }
            let ttl = lock_ttl(&tasks, false);
            let remaining = lock_ttl(&tasks, true);
            let editor = inner.editor_for(&self.settings, mode);
            info!(
                project_id,
                task_ids = ?inner.selection.ids(),
                remaining_secs = remaining.as_secs(),
                "resuming own locks"
            );
            self.begin_session(&mut inner, mode, tasks, editor, remaining, ttl);
            inner.next_attempt()
        };
        self.open_editor(attempt).await
    }

    fn begin_session(
        &self,
        inner: &mut Inner,
        mode: ContributionMode,
        tasks: Vec<Task>,
        editor: Editor,
        remaining: Duration,
        ttl: Duration,
    ) {
        let project_id = self.settings.project_id;
        let (monitor, listener) = self.start_monitor(remaining);
        inner.locked = LockedTasks {
            locked_tasks: tasks.iter().map(|t| t.task_id).collect(),
            project_id: Some(project_id),
            task_status: Some(mode.locked_status().as_str().to_string()),
        };
        inner.session = Some(LockSession {
            project_id,
            mode,
            tasks,
            editor,
            ttl,
            monitor,
            listener,
            warned: false,
            warning_dismissed: false,
        });
        inner.session_generation += 1;
        inner.session_expired = false;
        inner.expired_dialog_open = false;
        let phase = monitor_phase(inner);
        inner.phase.send_replace(phase);
    }

    fn start_monitor(&self, ttl: Duration) -> (SessionExpiryMonitor, JoinHandle<()>) {
        let monitor = SessionExpiryMonitor::start(ttl, self.settings.warning_lead);
        let listener = spawn_listener(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.notifier),
            monitor.subscribe(),
        );
        (monitor, listener)
    }

    async fn open_editor(&self, attempt: u64) -> Result<ActionState, WorkflowError> {
        let (editor, mode, project, tasks) = {
            let inner = self.inner.lock().await;
            let session = inner.session.as_ref().ok_or(WorkflowError::NoLockSession)?;
            let project = inner.project.clone().ok_or(WorkflowError::NotLoaded {
                project_id: self.settings.project_id,
            })?;
            (session.editor, session.mode, project, session.tasks.clone())
        };

        let result = self.editors.open(editor, &project, &tasks).await;

        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        if inner.session_expired {
            return Err(WorkflowError::SessionExpired);
        }
        if inner.attempt != attempt {
            debug!(attempt, current = inner.attempt, "discarding stale editor result");
            return Err(WorkflowError::Superseded);
        }

        match result {
            Ok(outcome) => {
                let route = Route::editing(mode, project.project_id, editor);
                let state = inner.machine.state();
                drop(inner);
                info!(%route, %editor, "editor opened");
                self.navigator.navigate(&route);
                if let EditorOutcome::OpenWindow { url, .. } = &outcome {
                    self.navigator.open_window(url);
                }
                Ok(state)
            }
            Err(err) => {
                let err = match WorkflowError::from(err) {
                    err @ (WorkflowError::EditorUnreachable { .. }
                    | WorkflowError::InvalidTemplate { .. }) => err,
                    other => WorkflowError::EditorUnreachable {
                        reason: other.to_string(),
                    },
                };
                let kind = err.kind().unwrap_or(ErrorKind::EditorUnreachable);
                warn!(%editor, error = %err, "editor could not be opened");
                inner.machine.transition(MachineEvent::EditorFailed(kind))?;
                inner.error = ErrorDialog::for_error(&err);
                self.notifier.notify(NoticeLevel::Error, &err.to_string());
                Err(err)
            }
        }
    }

    /// The user is back from the editor
    pub async fn finish_editing(&self) -> Result<ActionState, WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        if inner.session_expired {
            return Err(WorkflowError::SessionExpired);
        }
        Ok(inner.machine.transition(MachineEvent::DoneEditing)?)
    }

    /// Open the editor again for the locked tasks
    pub async fn reopen_editor(&self) -> Result<ActionState, WorkflowError> {
        let attempt = {
            let mut inner = self.inner.lock().await;
            inner.sync_session(self.notifier.as_ref());
            inner.check_editable()?;
            inner.machine.transition(MachineEvent::ReopenEditor)?;
            inner.next_attempt()
        };
        self.open_editor(attempt).await
    }

    /// Release the mapping lock recording `outcome`
    pub async fn submit_mapping(
        &self,
        outcome: MappingOutcome,
        comment: Option<&str>,
    ) -> Result<ActionState, WorkflowError> {
        let (attempt, task_ids) = self
            .begin_release(MachineEvent::Submit, Some(ContributionMode::Mapping))
            .await?;
        let project_id = self.settings.project_id;

        let mut returned = Vec::with_capacity(task_ids.len());
        let mut result = Ok(());
        for &task_id in &task_ids {
            match self
                .backend
                .submit_mapping(project_id, task_id, outcome, comment)
                .await
            {
                Ok(task) => returned.push(task),
                Err(err) => {
                    result = Err(err);
                    break;
                }
            }
        }
        self.settle(attempt, result.map(|_| returned), Vec::new(), "mapping submitted")
            .await
    }

    /// Release validation locks, one verdict per locked task
    pub async fn submit_validation(
        &self,
        outcomes: &HashMap<u64, ValidationOutcome>,
        comment: Option<&str>,
    ) -> Result<ActionState, WorkflowError> {
        let (attempt, task_ids) = self
            .begin_release(MachineEvent::Submit, Some(ContributionMode::Validation))
            .await?;
        let result = self
            .backend
            .submit_validation(self.settings.project_id, &task_ids, outcomes, comment)
            .await;
        self.settle(attempt, result, Vec::new(), "validation submitted").await
    }

    /// Give up the locks without recording work
    pub async fn stop(&self, comment: Option<&str>) -> Result<ActionState, WorkflowError> {
        let (attempt, task_ids) = self.begin_release(MachineEvent::Release, None).await?;
        let project_id = self.settings.project_id;
        let mode = self.session_mode().await.unwrap_or(self.settings.mode);

        let result = match mode {
            ContributionMode::Mapping => {
                let mut returned = Vec::with_capacity(task_ids.len());
                let mut result = Ok(());
                for &task_id in &task_ids {
                    match self.backend.stop_mapping(project_id, task_id, comment).await {
                        Ok(task) => returned.push(task),
                        Err(err) => {
                            result = Err(err);
                            break;
                        }
                    }
                }
                result.map(|_| returned)
            }
            ContributionMode::Validation => {
                self.backend
                    .stop_validation(project_id, &task_ids, comment)
                    .await
            }
        };
        self.settle(attempt, result, Vec::new(), "editing stopped").await
    }

    /// Split the task held for mapping into smaller tasks
    pub async fn split(&self) -> Result<ActionState, WorkflowError> {
        let (attempt, task_ids) = self
            .begin_release(MachineEvent::Release, Some(ContributionMode::Mapping))
            .await?;
        let task_id = task_ids.first().copied().ok_or(WorkflowError::NoLockSession)?;
        let result = self
            .backend
            .split_task(self.settings.project_id, task_id)
            .await;
        self.settle(attempt, result, vec![task_id], "task split").await
    }

    async fn session_mode(&self) -> Option<ContributionMode> {
        self.inner.lock().await.session.as_ref().map(|s| s.mode)
    }

    async fn begin_release(
        &self,
        event: MachineEvent,
        required_mode: Option<ContributionMode>,
    ) -> Result<(u64, Vec<u64>), WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        inner.check_editable()?;
        let session = inner.session.as_ref().ok_or(WorkflowError::NoLockSession)?;
        if let Some(expected) = required_mode
            && session.mode != expected
        {
            return Err(WorkflowError::WrongMode {
                expected,
                actual: session.mode,
            });
        }
        let task_ids = session.task_ids();
        inner.machine.transition(event)?;
        inner.error = None;
        Ok((inner.next_attempt(), task_ids))
    }

    async fn settle(
        &self,
        attempt: u64,
        result: SubmitResult<Vec<Task>>,
        removed: Vec<u64>,
        what: &'static str,
    ) -> Result<ActionState, WorkflowError> {
        let project_id = self.settings.project_id;
        {
            let mut inner = self.inner.lock().await;
            inner.sync_session(self.notifier.as_ref());
            if inner.session_expired {
                if let Err(err) = &result {
                    debug!(error = %err, "release failed after the session expired");
                }
                return Err(WorkflowError::SessionExpired);
            }
            if inner.attempt != attempt {
                debug!(attempt, current = inner.attempt, "discarding stale release result");
                return Err(WorkflowError::Superseded);
            }

            match result {
                Ok(tasks) => {
                    for task_id in &removed {
                        inner.tasks.remove(task_id);
                    }
                    inner.store_tasks(project_id, tasks);
                    inner.end_session();
                    inner.selection.clear();
                    inner.machine.transition(MachineEvent::Settled)?;
                    info!(project_id, "{what}");
                }
                Err(err) => {
                    warn!(project_id, error = %err, "{what} failed");
                    inner.machine.transition(MachineEvent::SubmitFailed)?;
                    let err = WorkflowError::Submit(err);
                    inner.error = ErrorDialog::for_error(&err);
                    self.notifier.notify(NoticeLevel::Error, &err.to_string());
                    return Err(err);
                }
            }
        }

        self.route_after_completion(attempt).await;
        Ok(ActionState::Complete)
    }

    /// Resume remaining own locks, or leave for discovery or task selection.
    async fn route_after_completion(&self, attempt: u64) {
        let locked = self.fetch_locked().await;

        let route = {
            let mut inner = self.inner.lock().await;
            if inner.attempt != attempt {
                debug!(attempt, "skipping navigation of a superseded completion");
                return;
            }
            let project_id = self.settings.project_id;
            inner.locked = locked;
            let own_here = !inner.locked.is_empty()
                && inner.locked.project_id.is_none_or(|id| id == project_id);
            if own_here {
                let mode = inner.locked.mode().unwrap_or(self.settings.mode);
                Route::editing(mode, project_id, inner.editor_for(&self.settings, mode))
            } else if workable_ids(&inner.tasks, self.settings.mode, self.settings.permission)
                .is_empty()
            {
                Route::Explore
            } else {
                Route::ProjectTasks { project_id }
            }
        };
        info!(%route, "routing after completion");
        self.navigator.navigate(&route);
    }

    async fn fetch_locked(&self) -> LockedTasks {
        match self.backend.locked_tasks().await {
            Ok(locked) => locked,
            Err(err) => {
                warn!(error = %err, "failed to refresh own locked tasks");
                LockedTasks::default()
            }
        }
    }

    /// Push the lock deadline forward and restart the session timers
    pub async fn extend_session(&self) -> Result<(), WorkflowError> {
        let (generation, task_ids) = {
            let mut inner = self.inner.lock().await;
            inner.sync_session(self.notifier.as_ref());
            if inner.session_expired {
                return Err(WorkflowError::SessionExpired);
            }
            let session = inner.session.as_ref().ok_or(WorkflowError::NoLockSession)?;
            (inner.session_generation, session.task_ids())
        };

        let result = self
            .backend
            .extend_lock(self.settings.project_id, &task_ids)
            .await;

        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        if inner.session_expired {
            return Err(WorkflowError::SessionExpired);
        }
        if inner.session_generation != generation {
            return Err(WorkflowError::Superseded);
        }
        match result {
            Ok(()) => {
                let ttl = inner.session.as_ref().map(|s| s.ttl).unwrap_or(DEFAULT_LOCK_TTL);
                let (monitor, listener) = self.start_monitor(ttl);
                if let Some(session) = inner.session.as_mut() {
                    session.listener.abort();
                    session.monitor = monitor;
                    session.listener = listener;
                    session.warned = false;
                    session.warning_dismissed = false;
                }
                inner.session_generation += 1;
                inner.phase.send_replace(SessionPhase::Active);
                info!(?task_ids, ttl_secs = ttl.as_secs(), "task session extended");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "failed to extend task session");
                self.notifier
                    .notify(NoticeLevel::Warning, &format!("Could not extend the session: {err}"));
                Err(WorkflowError::Submit(err))
            }
        }
    }

    /// Close the current error dialog and take its recovery path
    pub async fn dismiss_error(&self) -> Result<ActionState, WorkflowError> {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        let previous = inner.machine.state();
        let state = inner.machine.transition(MachineEvent::DismissError)?;
        inner.error = None;

        match previous {
            ActionState::Error(ErrorKind::SessionExpired) => {
                inner.expired_dialog_open = false;
                inner.selection.clear();
            }
            ActionState::Error(ErrorKind::Lock) if !inner.selection.is_empty() => {
                // Keep the selection so the user can retry; NoSelection stands
                // when it no longer fits the mode.
                let _ = inner.reevaluate_selection(&self.settings);
            }
            ActionState::Error(ErrorKind::Unexpected) => inner.selection.clear(),
            _ => {}
        }
        debug!(from = %previous, to = %state, "error dismissed");
        Ok(inner.machine.state())
    }

    /// Close the session dialog; the expired dialog also ends the flow
    pub async fn dismiss_session_dialog(&self) -> ActionState {
        let mut inner = self.inner.lock().await;
        inner.sync_session(self.notifier.as_ref());
        if inner.expired_dialog_open {
            inner.expired_dialog_open = false;
            if inner.machine.state() == ActionState::Error(ErrorKind::SessionExpired) {
                let _ = inner.machine.transition(MachineEvent::DismissError);
            }
            inner.selection.clear();
        } else if let Some(session) = inner.session.as_mut() {
            session.warning_dismissed = true;
        }
        inner.machine.state()
    }

    /// Leave the task action view: timers stop and pending results are dropped.
    ///
    /// Server locks are not released; they stay resumable until they expire.
    pub async fn teardown(&self) {
        let mut inner = self.inner.lock().await;
        inner.next_attempt();
        if let Some(session) = inner.session.as_ref() {
            info!(project_id = session.project_id, "tearing down with locks held");
        }
        inner.session = None;
        inner.session_generation += 1;
        inner.selection.clear();
        inner.error = None;
        inner.expired_dialog_open = false;
        inner.phase.send_replace(SessionPhase::Cancelled);
        let _ = inner.machine.transition(MachineEvent::Reset);
    }
}

fn spawn_listener(
    inner: Weak<Mutex<Inner>>,
    notifier: Arc<dyn Notifier>,
    mut phases: watch::Receiver<SessionPhase>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            if phase == SessionPhase::Cancelled {
                break;
            }
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.lock().await.sync_session(notifier.as_ref());
        }
    })
}

/// Shortest lock lifetime among `tasks`; adopted locks lose the time already spent.
fn lock_ttl(tasks: &[Task], adopted: bool) -> Duration {
    let now = Utc::now();
    tasks
        .iter()
        .map(|task| {
            let ttl = task
                .auto_unlock_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_LOCK_TTL);
            match (adopted, task.last_updated) {
                (true, Some(updated)) => {
                    let elapsed = (now - updated).to_std().unwrap_or_default();
                    ttl.saturating_sub(elapsed)
                }
                _ => ttl,
            }
        })
        .min()
        .unwrap_or(DEFAULT_LOCK_TTL)
}

fn monitor_phase(inner: &Inner) -> SessionPhase {
    inner
        .session
        .as_ref()
        .map(|s| s.monitor.phase())
        .unwrap_or(SessionPhase::Cancelled)
}

fn join_ids(ids: &[u64]) -> String {
    ids.iter().map(u64::to_string).collect::<Vec<_>>().join(", ")
}

fn unexpected(context: &str, err: impl std::fmt::Display) -> WorkflowError {
    error!(error = %err, "{context} failed");
    WorkflowError::Unexpected(format!("{context}: {err}"))
}
