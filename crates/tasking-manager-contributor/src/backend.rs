/*
[INPUT]:  Adapter client and editor dispatcher
[OUTPUT]: Object-safe async seams the controller drives
[POS]:    Workflow boundary - server and editor access
[UPDATE]: When the controller needs a new server or editor call
*/

use std::collections::HashMap;

use async_trait::async_trait;
use tasking_manager_adapter::{
    Editor, EditorDispatcher, EditorError, EditorOutcome, LockResult, LockedTasks,
    MappingOutcome, ProjectSummary, SubmitResult, Task, TaskLockOutcome, TaskingClient,
    ValidationOutcome,
};

/// Tasking Manager calls used by the contribution flow
#[async_trait]
pub trait TaskingBackend: Send + Sync {
    async fn project(&self, project_id: u64) -> tasking_manager_adapter::Result<ProjectSummary>;

    async fn project_tasks(&self, project_id: u64) -> tasking_manager_adapter::Result<Vec<Task>>;

    async fn locked_tasks(&self) -> tasking_manager_adapter::Result<LockedTasks>;

    async fn lock_for_mapping(&self, project_id: u64, task_id: u64) -> LockResult;

    async fn lock_for_validation(&self, project_id: u64, task_ids: &[u64]) -> Vec<TaskLockOutcome>;

    async fn submit_mapping(
        &self,
        project_id: u64,
        task_id: u64,
        outcome: MappingOutcome,
        comment: Option<&str>,
    ) -> SubmitResult<Task>;

    async fn submit_validation(
        &self,
        project_id: u64,
        task_ids: &[u64],
        outcomes: &HashMap<u64, ValidationOutcome>,
        comment: Option<&str>,
    ) -> SubmitResult<Vec<Task>>;

    async fn stop_mapping(
        &self,
        project_id: u64,
        task_id: u64,
        comment: Option<&str>,
    ) -> SubmitResult<Task>;

    async fn stop_validation(
        &self,
        project_id: u64,
        task_ids: &[u64],
        comment: Option<&str>,
    ) -> SubmitResult<Vec<Task>>;

    async fn extend_lock(&self, project_id: u64, task_ids: &[u64]) -> SubmitResult<()>;

    async fn split_task(&self, project_id: u64, task_id: u64) -> SubmitResult<Vec<Task>>;
}

#[async_trait]
impl TaskingBackend for TaskingClient {
    async fn project(&self, project_id: u64) -> tasking_manager_adapter::Result<ProjectSummary> {
        TaskingClient::project(self, project_id).await
    }

    async fn project_tasks(&self, project_id: u64) -> tasking_manager_adapter::Result<Vec<Task>> {
        TaskingClient::project_tasks(self, project_id).await
    }

    async fn locked_tasks(&self) -> tasking_manager_adapter::Result<LockedTasks> {
        TaskingClient::locked_tasks(self).await
    }

    async fn lock_for_mapping(&self, project_id: u64, task_id: u64) -> LockResult {
        TaskingClient::lock_for_mapping(self, project_id, task_id).await
    }

    async fn lock_for_validation(&self, project_id: u64, task_ids: &[u64]) -> Vec<TaskLockOutcome> {
        TaskingClient::lock_for_validation(self, project_id, task_ids).await
    }

    async fn submit_mapping(
        &self,
        project_id: u64,
        task_id: u64,
        outcome: MappingOutcome,
        comment: Option<&str>,
    ) -> SubmitResult<Task> {
        TaskingClient::submit_mapping(self, project_id, task_id, outcome, comment).await
    }

    async fn submit_validation(
        &self,
        project_id: u64,
        task_ids: &[u64],
        outcomes: &HashMap<u64, ValidationOutcome>,
        comment: Option<&str>,
    ) -> SubmitResult<Vec<Task>> {
        TaskingClient::submit_validation(self, project_id, task_ids, outcomes, comment).await
    }

    async fn stop_mapping(
        &self,
        project_id: u64,
        task_id: u64,
        comment: Option<&str>,
    ) -> SubmitResult<Task> {
        TaskingClient::stop_mapping(self, project_id, task_id, comment).await
    }

    async fn stop_validation(
        &self,
        project_id: u64,
        task_ids: &[u64],
        comment: Option<&str>,
    ) -> SubmitResult<Vec<Task>> {
        TaskingClient::stop_validation(self, project_id, task_ids, comment).await
    }

    async fn extend_lock(&self, project_id: u64, task_ids: &[u64]) -> SubmitResult<()> {
        TaskingClient::extend_lock(self, project_id, task_ids).await
    }

    async fn split_task(&self, project_id: u64, task_id: u64) -> SubmitResult<Vec<Task>> {
        TaskingClient::split_task(self, project_id, task_id).await
    }
}

/// Opens locked tasks in an editor
#[async_trait]
pub trait EditorLauncher: Send + Sync {
    async fn open(
        &self,
        editor: Editor,
        project: &ProjectSummary,
        tasks: &[Task],
    ) -> Result<EditorOutcome, EditorError>;
}

#[async_trait]
impl EditorLauncher for EditorDispatcher {
    async fn open(
        &self,
        editor: Editor,
        project: &ProjectSummary,
        tasks: &[Task],
    ) -> Result<EditorOutcome, EditorError> {
        EditorDispatcher::open(self, editor, project, tasks).await
    }
}
