/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust response structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

use super::models::Task;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskListResponse {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// Batch validation lock result; the server may lock a subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationLockResponse {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub failed: Vec<TaskLockFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLockFailure {
    pub task_id: u64,
    #[serde(default, alias = "Error", alias = "message")]
    pub error: Option<String>,
    #[serde(default, alias = "SubCode")]
    pub sub_code: Option<String>,
    #[serde(default)]
    pub lock_holder: Option<String>,
}

/// Error body; the API spells the keys inconsistently across endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default, alias = "Error", alias = "message")]
    pub error: Option<String>,
    #[serde(default, rename = "SubCode", alias = "subCode", alias = "sub_code")]
    pub sub_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginUrlResponse {
    pub auth_url: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthCallbackResponse {
    pub username: String,
    pub session_token: String,
    #[serde(default)]
    pub picture: Option<String>,
}
