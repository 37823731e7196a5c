/*
[INPUT]:  Held locks, outcomes and optional comments
[OUTPUT]: Updated task records after unlock/stop/split/extend
[POS]:    HTTP layer - lock release endpoints (require session)
[UPDATE]: When unlock endpoints or request bodies change
*/

use std::collections::HashMap;

use reqwest::Method;
use tracing::info;

use crate::http::{SubmitError, TaskingClient};
use crate::types::{
    MappingOutcome, MappingUnlockRequest, ResetTask, StopMappingRequest, StopValidationRequest,
    Task, TaskIdsRequest, TaskListResponse, ValidatedTask, ValidationOutcome,
    ValidationUnlockRequest,
};

/// Result of a release-side call
pub type SubmitResult<T> = std::result::Result<T, SubmitError>;

impl TaskingClient {
    /// Release a mapping lock, recording the outcome
    ///
    /// POST /projects/{id}/tasks/actions/unlock-after-mapping/{taskId}
    pub async fn submit_mapping(
        &self,
        project_id: u64,
        task_id: u64,
        outcome: MappingOutcome,
        comment: Option<&str>,
    ) -> SubmitResult<Task> {
        let endpoint =
            format!("/projects/{project_id}/tasks/actions/unlock-after-mapping/{task_id}");
        let body = MappingUnlockRequest {
            status: outcome,
            comment: comment.map(str::to_string),
        };
        let builder = self
            .api_request_with_session(Method::POST, &endpoint)?
            .json(&body);
        let task: Task = self.send_json(builder).await?;
        info!(project_id, task_id, ?outcome, "mapping submitted");
        Ok(task)
    }

    /// Release validation locks, one verdict per task
    ///
    /// POST /projects/{id}/tasks/actions/unlock-after-validation/
    pub async fn submit_validation(
        &self,
        project_id: u64,
        task_ids: &[u64],
        outcomes: &HashMap<u64, ValidationOutcome>,
        comment: Option<&str>,
    ) -> SubmitResult<Vec<Task>> {
        let validated_tasks = task_ids
            .iter()
            .map(|&task_id| {
                let status = *outcomes
                    .get(&task_id)
                    .ok_or(SubmitError::MissingOutcome { task_id })?;
                Ok(ValidatedTask {
                    task_id,
                    status,
                    comment: comment.map(str::to_string),
                })
            })
            .collect::<SubmitResult<Vec<_>>>()?;

        let endpoint = format!("/projects/{project_id}/tasks/actions/unlock-after-validation/");
        let builder = self
            .api_request_with_session(Method::POST, &endpoint)?
            .json(&ValidationUnlockRequest { validated_tasks });
        let response: TaskListResponse = self.send_json(builder).await?;
        info!(project_id, ?task_ids, "validation submitted");
        Ok(response.tasks)
    }

    /// Give up a mapping lock without recording work
    ///
    /// POST /projects/{id}/tasks/actions/stop-mapping/{taskId}
    pub async fn stop_mapping(
        &self,
        project_id: u64,
        task_id: u64,
        comment: Option<&str>,
    ) -> SubmitResult<Task> {
        let endpoint = format!("/projects/{project_id}/tasks/actions/stop-mapping/{task_id}");
        let body = StopMappingRequest {
            comment: comment.map(str::to_string),
        };
        let builder = self
            .api_request_with_session(Method::POST, &endpoint)?
            .json(&body);
        let task: Task = self.send_json(builder).await?;
        info!(project_id, task_id, "mapping stopped");
        Ok(task)
    }

    /// Give up validation locks without recording a verdict
    ///
    /// POST /projects/{id}/tasks/actions/stop-validation/
    pub async fn stop_validation(
        &self,
        project_id: u64,
        task_ids: &[u64],
        comment: Option<&str>,
    ) -> SubmitResult<Vec<Task>> {
        let endpoint = format!("/projects/{project_id}/tasks/actions/stop-validation/");
        let body = StopValidationRequest {
            reset_tasks: task_ids
                .iter()
                .map(|&task_id| ResetTask {
                    task_id,
                    comment: comment.map(str::to_string),
                })
                .collect(),
        };
        let builder = self
            .api_request_with_session(Method::POST, &endpoint)?
            .json(&body);
        let response: TaskListResponse = self.send_json(builder).await?;
        info!(project_id, ?task_ids, "validation stopped");
        Ok(response.tasks)
    }

    /// Push the auto-unlock deadline of held locks forward
    ///
    /// POST /projects/{id}/tasks/actions/extend/
    pub async fn extend_lock(&self, project_id: u64, task_ids: &[u64]) -> SubmitResult<()> {
        let endpoint = format!("/projects/{project_id}/tasks/actions/extend/");
        let body = TaskIdsRequest {
            task_ids: task_ids.to_vec(),
        };
        let builder = self
            .api_request_with_session(Method::POST, &endpoint)?
            .json(&body);
        self.send_empty(builder).await?;
        info!(project_id, ?task_ids, "lock extended");
        Ok(())
    }

    /// Split a task held for mapping into smaller tasks
    ///
    /// POST /projects/{id}/tasks/actions/split/{taskId}/
    pub async fn split_task(&self, project_id: u64, task_id: u64) -> SubmitResult<Vec<Task>> {
        let endpoint = format!("/projects/{project_id}/tasks/actions/split/{task_id}/");
        let builder = self.api_request_with_session(Method::POST, &endpoint)?;
        let response: TaskListResponse = self.send_json(builder).await?;
        info!(project_id, task_id, new_tasks = response.tasks.len(), "task split");
        Ok(response.tasks)
    }
}
