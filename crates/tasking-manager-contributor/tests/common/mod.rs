/*
[INPUT]:  Scenario descriptions from the controller tests
[OUTPUT]: In-memory backend, editor and presentation doubles plus a wired controller
[POS]:    Test infrastructure - shared across contributor test modules
[UPDATE]: When backend or collaborator traits change
*/

//! Common test utilities for tasking-manager-contributor tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tasking_manager_adapter::{
    ContributionMode, Editor, EditorError, EditorOutcome, LockError, LockResult, LockedTasks,
    MappingOutcome, ProjectInfo, ProjectSummary, SubmitError, SubmitResult, Task, TaskGeometry,
    TaskLockOutcome, ValidationOutcome,
};
use tasking_manager_contributor::{
    ControllerSettings, EditorLauncher, Navigator, NoticeLevel, Notifier, Route,
    TaskActionController, TaskingBackend,
};
use url::Url;

pub const PROJECT_ID: u64 = 1;
pub const TEST_USER: &str = "mapper_one";

pub fn task(task_id: u64, status: &str) -> Task {
    Task {
        task_id,
        project_id: PROJECT_ID,
        task_status: status.to_string(),
        lock_holder: None,
        auto_unlock_seconds: Some(7200),
        last_updated: None,
        history: Vec::new(),
        per_task_instructions: None,
        geometry: Some(square(36.78 + task_id as f64 * 0.01, -1.31, 0.01)),
    }
}

pub fn square(min_lon: f64, min_lat: f64, size: f64) -> TaskGeometry {
    TaskGeometry::Polygon(vec![vec![
        vec![min_lon, min_lat],
        vec![min_lon + size, min_lat],
        vec![min_lon + size, min_lat + size],
        vec![min_lon, min_lat + size],
        vec![min_lon, min_lat],
    ]])
}

pub fn project(mapping_editors: &[&str]) -> ProjectSummary {
    ProjectSummary {
        project_id: PROJECT_ID,
        project_info: Some(ProjectInfo {
            name: "Roads in Kibera".to_string(),
        }),
        mapping_editors: mapping_editors.iter().map(|e| e.to_string()).collect(),
        validation_editors: vec!["ID".to_string(), "JOSM".to_string()],
        custom_editor: None,
        changeset_comment: Some("#hotosm-project-1".to_string()),
        imagery: None,
    }
}

/// In-memory Tasking Manager that applies lock and release calls to its tasks
pub struct FakeBackend {
    pub project: ProjectSummary,
    pub tasks: Mutex<BTreeMap<u64, Task>>,
    pub locked: Mutex<LockedTasks>,
    /// Tasks whose lock attempts fail with the given error
    pub lock_errors: Mutex<HashMap<u64, LockError>>,
    /// Error returned by the next release calls
    pub release_error: Mutex<Option<SubmitError>>,
    /// Time every lock call takes
    pub lock_delay: Mutex<Option<Duration>>,
    /// Time every submit or stop call takes
    pub release_delay: Mutex<Option<Duration>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new(project: ProjectSummary, tasks: Vec<Task>) -> Self {
        Self {
            project,
            tasks: Mutex::new(tasks.into_iter().map(|t| (t.task_id, t)).collect()),
            locked: Mutex::new(LockedTasks::default()),
            lock_errors: Mutex::new(HashMap::new()),
            release_error: Mutex::new(None),
            lock_delay: Mutex::new(None),
            release_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn status_of(&self, task_id: u64) -> Option<String> {
        self.tasks
            .lock()
            .unwrap()
            .get(&task_id)
            .map(|t| t.task_status.clone())
    }

    pub fn fail_lock(&self, task_id: u64, error: LockError) {
        self.lock_errors.lock().unwrap().insert(task_id, error);
    }

    pub fn fail_releases(&self, error: Option<SubmitError>) {
        *self.release_error.lock().unwrap() = error;
    }

    pub fn delay_releases(&self, delay: Option<Duration>) {
        *self.release_delay.lock().unwrap() = delay;
    }

    /// Move the last update of `task_ids` back by `age`
    pub fn age_locks(&self, task_ids: &[u64], age: Duration) {
        let mut tasks = self.tasks.lock().unwrap();
        for id in task_ids {
            if let Some(task) = tasks.get_mut(id) {
                let age = chrono::Duration::from_std(age).unwrap();
                task.last_updated = Some(task.last_updated.unwrap_or_else(Utc::now) - age);
            }
        }
    }

    /// Pretend the user already holds `task_ids` in `project_id`
    pub fn hold_locks(&self, project_id: u64, task_ids: &[u64], mode: ContributionMode) {
        let mut tasks = self.tasks.lock().unwrap();
        for id in task_ids {
            if let Some(task) = tasks.get_mut(id) {
                task.task_status = mode.locked_status().as_str().to_string();
                task.lock_holder = Some(TEST_USER.to_string());
                task.last_updated = Some(Utc::now());
            }
        }
        *self.locked.lock().unwrap() = LockedTasks {
            locked_tasks: task_ids.to_vec(),
            project_id: Some(project_id),
            task_status: Some(mode.locked_status().as_str().to_string()),
        };
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn lock_one(&self, task_id: u64, mode: ContributionMode) -> LockResult {
        if let Some(error) = self.lock_errors.lock().unwrap().get(&task_id) {
            return Err(error.clone());
        }
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.get_mut(&task_id).ok_or(LockError::NotFound { task_id })?;
        task.task_status = mode.locked_status().as_str().to_string();
        task.lock_holder = Some(TEST_USER.to_string());

        let mut locked = self.locked.lock().unwrap();
        locked.locked_tasks.push(task_id);
        locked.project_id = Some(PROJECT_ID);
        locked.task_status = Some(task.task_status.clone());
        Ok(task.clone())
    }

    async fn delay(&self) {
        let delay = *self.lock_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    async fn release_pause(&self) {
        let delay = *self.release_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn release(&self, task_ids: &[u64], status: &str) -> SubmitResult<Vec<Task>> {
        if let Some(error) = self.release_error.lock().unwrap().clone() {
            return Err(error);
        }
        let mut tasks = self.tasks.lock().unwrap();
        let mut released = Vec::new();
        for task_id in task_ids {
            let task = tasks.get_mut(task_id).ok_or(SubmitError::NotFound {
                message: format!("task {task_id}"),
            })?;
            task.task_status = status.to_string();
            task.lock_holder = None;
            released.push(task.clone());
        }
        self.locked
            .lock()
            .unwrap()
            .locked_tasks
            .retain(|id| !task_ids.contains(id));
        Ok(released)
    }
}

#[async_trait]
impl TaskingBackend for FakeBackend {
    async fn project(&self, _project_id: u64) -> tasking_manager_adapter::Result<ProjectSummary> {
        Ok(self.project.clone())
    }

    async fn project_tasks(&self, _project_id: u64) -> tasking_manager_adapter::Result<Vec<Task>> {
        Ok(self.tasks.lock().unwrap().values().cloned().collect())
    }

    async fn locked_tasks(&self) -> tasking_manager_adapter::Result<LockedTasks> {
        let locked = self.locked.lock().unwrap().clone();
        if locked.is_empty() {
            return Ok(LockedTasks::default());
        }
        Ok(locked)
    }

    async fn lock_for_mapping(&self, _project_id: u64, task_id: u64) -> LockResult {
        self.record(format!("lock-for-mapping {task_id}"));
        self.delay().await;
        self.lock_one(task_id, ContributionMode::Mapping)
    }

    async fn lock_for_validation(&self, _project_id: u64, task_ids: &[u64]) -> Vec<TaskLockOutcome> {
        self.record(format!("lock-for-validation {task_ids:?}"));
        self.delay().await;
        let mut outcomes = Vec::new();
        for &task_id in task_ids {
            let result = self.lock_one(task_id, ContributionMode::Validation);
            outcomes.push(TaskLockOutcome { task_id, result });
        }
        outcomes
    }

    async fn submit_mapping(
        &self,
        _project_id: u64,
        task_id: u64,
        outcome: MappingOutcome,
        _comment: Option<&str>,
    ) -> SubmitResult<Task> {
        self.record(format!("unlock-after-mapping {task_id}"));
        self.release_pause().await;
        let status = match outcome {
            MappingOutcome::Mapped => "MAPPED",
            MappingOutcome::BadImagery => "BADIMAGERY",
            MappingOutcome::NotFinished => "READY",
        };
        let mut released = self.release(&[task_id], status)?;
        Ok(released.remove(0))
    }

    async fn submit_validation(
        &self,
        _project_id: u64,
        task_ids: &[u64],
        outcomes: &HashMap<u64, ValidationOutcome>,
        _comment: Option<&str>,
    ) -> SubmitResult<Vec<Task>> {
        self.record(format!("unlock-after-validation {task_ids:?}"));
        self.release_pause().await;
        let mut released = Vec::new();
        for &task_id in task_ids {
            let status = match outcomes.get(&task_id) {
                Some(ValidationOutcome::Validated) => "VALIDATED",
                Some(ValidationOutcome::Invalidated) => "INVALIDATED",
                None => return Err(SubmitError::MissingOutcome { task_id }),
            };
            released.extend(self.release(&[task_id], status)?);
        }
        Ok(released)
    }

    async fn stop_mapping(
        &self,
        _project_id: u64,
        task_id: u64,
        _comment: Option<&str>,
    ) -> SubmitResult<Task> {
        self.record(format!("stop-mapping {task_id}"));
        self.release_pause().await;
        let mut released = self.release(&[task_id], "READY")?;
        Ok(released.remove(0))
    }

    async fn stop_validation(
        &self,
        _project_id: u64,
        task_ids: &[u64],
        _comment: Option<&str>,
    ) -> SubmitResult<Vec<Task>> {
        self.record(format!("stop-validation {task_ids:?}"));
        self.release_pause().await;
        self.release(task_ids, "MAPPED")
    }

    async fn extend_lock(&self, _project_id: u64, task_ids: &[u64]) -> SubmitResult<()> {
        self.record(format!("extend {task_ids:?}"));
        match self.release_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn split_task(&self, _project_id: u64, task_id: u64) -> SubmitResult<Vec<Task>> {
        self.record(format!("split {task_id}"));
        let mut tasks = self.tasks.lock().unwrap();
        tasks.remove(&task_id).ok_or(SubmitError::NotFound {
            message: format!("task {task_id}"),
        })?;
        let next = tasks.keys().max().copied().unwrap_or(task_id) + 1;
        let children: Vec<Task> = (next..next + 4).map(|id| task(id, "READY")).collect();
        for child in &children {
            tasks.insert(child.task_id, child.clone());
        }
        self.locked.lock().unwrap().locked_tasks.clear();
        Ok(children)
    }
}

/// Editor double that records what it was asked to open
#[derive(Default)]
pub struct FakeEditor {
    pub failure: Mutex<Option<EditorError>>,
    pub opened: Mutex<Vec<(Editor, Vec<u64>)>>,
}

impl FakeEditor {
    pub fn fail_with(&self, error: Option<EditorError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn opened(&self) -> Vec<(Editor, Vec<u64>)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl EditorLauncher for FakeEditor {
    async fn open(
        &self,
        editor: Editor,
        _project: &ProjectSummary,
        tasks: &[Task],
    ) -> Result<EditorOutcome, EditorError> {
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        self.opened
            .lock()
            .unwrap()
            .push((editor, tasks.iter().map(|t| t.task_id).collect()));
        Ok(EditorOutcome::Embedded { editor })
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub routes: Mutex<Vec<Route>>,
    pub windows: Mutex<Vec<Url>>,
}

impl RecordingNavigator {
    pub fn paths(&self) -> Vec<String> {
        self.routes.lock().unwrap().iter().map(Route::to_path).collect()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &Route) {
        self.routes.lock().unwrap().push(route.clone());
    }

    fn open_window(&self, url: &Url) {
        self.windows.lock().unwrap().push(url.clone());
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<(NoticeLevel, String)>>,
}

impl RecordingNotifier {
    pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().unwrap().push((level, message.to_string()));
    }
}

/// Controller wired to the doubles, with handles to inspect them
pub struct Harness {
    pub controller: TaskActionController,
    pub backend: Arc<FakeBackend>,
    pub editor: Arc<FakeEditor>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(mode: ContributionMode, tasks: &[(u64, &str)]) -> Self {
        Self::with_settings(
            ControllerSettings::new(PROJECT_ID, mode, TEST_USER),
            project(&["ID", "JOSM"]),
            tasks,
        )
    }

    pub fn with_settings(
        settings: ControllerSettings,
        project: ProjectSummary,
        tasks: &[(u64, &str)],
    ) -> Self {
        let backend = Arc::new(FakeBackend::new(
            project,
            tasks.iter().map(|(id, status)| task(*id, status)).collect(),
        ));
        let editor = Arc::new(FakeEditor::default());
        let navigator = Arc::new(RecordingNavigator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let controller = TaskActionController::new(
            settings,
            backend.clone(),
            editor.clone(),
            navigator.clone(),
            notifier.clone(),
        );
        Self {
            controller,
            backend,
            editor,
            navigator,
            notifier,
        }
    }

    /// Load the project, then select and lock `task_ids`
    pub async fn lock(&self, task_ids: &[u64]) {
        self.controller.load().await.unwrap();
        for &task_id in task_ids {
            self.controller.select(task_id).await.unwrap();
        }
        self.controller.contribute().await.unwrap();
    }
}
