/*
[INPUT]:  Project and task identifiers
[OUTPUT]: Project summary, task collection, task detail, own locked tasks
[POS]:    HTTP layer - read endpoints used by the contribution flow
[UPDATE]: When adding new read endpoints or changing query parameters
*/

use reqwest::Method;

use crate::http::{Result, TaskingClient};
use crate::types::{LockedTasks, ProjectSummary, Task, TaskFeatureCollection};

impl TaskingClient {
    /// Tasks the current user holds locks on
    ///
    /// GET /users/queries/tasks/locked/
    pub async fn locked_tasks(&self) -> Result<LockedTasks> {
        let builder = self.api_request_with_session(Method::GET, "/users/queries/tasks/locked/")?;
        self.send_json(builder).await
    }

    /// Project summary including the allowed editors
    ///
    /// GET /projects/{id}/
    pub async fn project(&self, project_id: u64) -> Result<ProjectSummary> {
        let endpoint = format!("/projects/{project_id}/");
        let builder = self.api_request(Method::GET, &endpoint)?;
        self.send_json(builder).await
    }

    /// All tasks of a project with their outlines
    ///
    /// GET /projects/{id}/tasks/
    pub async fn project_tasks(&self, project_id: u64) -> Result<Vec<Task>> {
        let endpoint = format!("/projects/{project_id}/tasks/");
        let builder = self.api_request(Method::GET, &endpoint)?;
        let collection: TaskFeatureCollection = self.send_json(builder).await?;
        Ok(collection.into_tasks(project_id))
    }

    /// Detail record of one task
    ///
    /// GET /projects/{id}/tasks/{taskId}/
    pub async fn task(&self, project_id: u64, task_id: u64) -> Result<Task> {
        let endpoint = format!("/projects/{project_id}/tasks/{task_id}/");
        let builder = self.api_request(Method::GET, &endpoint)?;
        let mut task: Task = self.send_json(builder).await?;
        task.project_id = project_id;
        Ok(task)
    }
}
