/*
[INPUT]:  Project id, task ids and the session token
[OUTPUT]: Locked task records or typed per-task lock failures
[POS]:    HTTP layer - lock acquisition endpoints (require session)
[UPDATE]: When lock endpoints or batch reconciliation rules change
*/

use futures_util::future::join_all;
use reqwest::Method;
use tracing::{debug, info, warn};

use crate::http::{LockError, TaskingClient};
use crate::types::{
    Task, TaskIdsRequest, TaskLockFailure, TaskStatus, ValidationLockResponse,
};

/// Outcome of locking a single task
pub type LockResult = std::result::Result<Task, LockError>;

/// Per-task outcome inside a validation batch
#[derive(Debug, Clone, PartialEq)]
pub struct TaskLockOutcome {
    pub task_id: u64,
    pub result: LockResult,
}

impl TaskLockOutcome {
    pub fn is_locked(&self) -> bool {
        self.result.is_ok()
    }
}

impl TaskingClient {
    /// Lock one task for mapping
    ///
    /// POST /projects/{id}/tasks/actions/lock-for-mapping/{taskId}
    pub async fn lock_for_mapping(&self, project_id: u64, task_id: u64) -> LockResult {
        let endpoint = format!("/projects/{project_id}/tasks/actions/lock-for-mapping/{task_id}");
        let builder = self
            .api_request_with_session(Method::POST, &endpoint)
            .map_err(|err| LockError::from_tasking(task_id, &err))?;
        let task: Task = self
            .send_json(builder)
            .await
            .map_err(|err| LockError::from_tasking(task_id, &err))?;

        let task = expect_locked(task_id, task, TaskStatus::LockedForMapping)?;
        info!(project_id, task_id, "task locked for mapping");
        Ok(task)
    }

    /// Lock a batch of tasks for validation
    ///
    /// POST /projects/{id}/tasks/actions/lock-for-validation/
    ///
    /// Outcomes are returned in the order of `task_ids`. When the server
    /// rejects the whole batch with a conflict, each task is retried on its own
    /// so that the ones still available get locked.
    pub async fn lock_for_validation(
        &self,
        project_id: u64,
        task_ids: &[u64],
    ) -> Vec<TaskLockOutcome> {
        if task_ids.is_empty() {
            return Vec::new();
        }

        match self.request_validation_lock(project_id, task_ids).await {
            Ok(response) => reconcile_batch(task_ids, response),
            Err(err) if task_ids.len() > 1 && err.is_conflict() => {
                warn!(
                    project_id,
                    ?task_ids,
                    error = %err,
                    "batch validation lock rejected, locking tasks individually"
                );
                let attempts = task_ids
                    .iter()
                    .map(|&task_id| self.lock_single_for_validation(project_id, task_id));
                join_all(attempts).await
            }
            Err(err) => task_ids
                .iter()
                .map(|&task_id| TaskLockOutcome {
                    task_id,
                    result: Err(LockError::from_tasking(task_id, &err)),
                })
                .collect(),
        }
    }

    async fn lock_single_for_validation(&self, project_id: u64, task_id: u64) -> TaskLockOutcome {
        let result = match self.request_validation_lock(project_id, &[task_id]).await {
            Ok(response) => reconcile_batch(&[task_id], response)
                .pop()
                .map(|outcome| outcome.result)
                .unwrap_or_else(|| {
                    Err(LockError::Unexpected {
                        task_id,
                        message: "empty validation lock response".to_string(),
                    })
                }),
            Err(err) => Err(LockError::from_tasking(task_id, &err)),
        };
        debug!(project_id, task_id, locked = result.is_ok(), "single validation lock settled");
        TaskLockOutcome { task_id, result }
    }

    async fn request_validation_lock(
        &self,
        project_id: u64,
        task_ids: &[u64],
    ) -> crate::http::Result<ValidationLockResponse> {
        let endpoint = format!("/projects/{project_id}/tasks/actions/lock-for-validation/");
        let body = TaskIdsRequest {
            task_ids: task_ids.to_vec(),
        };
        let builder = self
            .api_request_with_session(Method::POST, &endpoint)?
            .json(&body);
        self.send_json(builder).await
    }
}

fn reconcile_batch(task_ids: &[u64], response: ValidationLockResponse) -> Vec<TaskLockOutcome> {
    let ValidationLockResponse { mut tasks, failed } = response;

    task_ids
        .iter()
        .map(|&task_id| {
            let result = if let Some(pos) = tasks.iter().position(|t| t.task_id == task_id) {
                expect_locked(task_id, tasks.swap_remove(pos), TaskStatus::LockedForValidation)
            } else if let Some(failure) = failed.iter().find(|f| f.task_id == task_id) {
                Err(failure_to_error(failure))
            } else {
                Err(LockError::Unexpected {
                    task_id,
                    message: "task missing from validation lock response".to_string(),
                })
            };
            TaskLockOutcome { task_id, result }
        })
        .collect()
}

fn failure_to_error(failure: &TaskLockFailure) -> LockError {
    let message = failure
        .error
        .clone()
        .unwrap_or_else(|| "task could not be locked".to_string());
    match failure.sub_code.as_deref() {
        Some("TaskNotFound") | Some("NotFound") => LockError::NotFound {
            task_id: failure.task_id,
        },
        Some("UserPermissionError") | Some("UserLicenseError") => LockError::Forbidden {
            task_id: failure.task_id,
            message,
        },
        _ => LockError::AlreadyLocked {
            task_id: failure.task_id,
            message: match &failure.lock_holder {
                Some(holder) => format!("{message} (held by {holder})"),
                None => message,
            },
        },
    }
}

/// A successful lock must come back in exactly the expected locked status.
fn expect_locked(task_id: u64, task: Task, expected: TaskStatus) -> LockResult {
    match task.status() {
        Ok(status) if status == expected => Ok(task),
        Ok(status) => Err(LockError::Unexpected {
            task_id,
            message: format!("server returned status {status}, expected {expected}"),
        }),
        Err(err) => Err(LockError::Unexpected {
            task_id,
            message: err.to_string(),
        }),
    }
}
