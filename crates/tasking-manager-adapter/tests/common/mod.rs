/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for tasking-manager-adapter tests

#![allow(dead_code)]

use serde_json::{Value, json};
use tasking_manager_adapter::{ClientConfig, SessionManager, TaskingClient};
use wiremock::MockServer;

pub const TEST_TOKEN: &str = "dGVzdC1zZXNzaW9uLXRva2Vu";
pub const TEST_USER: &str = "mapper_one";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Client pointed at the mock server with an established session
pub fn authed_client(server: &MockServer) -> TaskingClient {
    let session = SessionManager::new();
    session.set_session(TEST_TOKEN.to_string(), TEST_USER.to_string(), Some("en".to_string()));
    TaskingClient::with_config_and_base_url(ClientConfig::default(), &server.uri(), session)
        .expect("client should build")
}

/// Client pointed at the mock server without a session
pub fn anonymous_client(server: &MockServer) -> TaskingClient {
    TaskingClient::with_config_and_base_url(
        ClientConfig::default(),
        &server.uri(),
        SessionManager::new(),
    )
    .expect("client should build")
}

/// Task record as the API returns it
pub fn task_json(task_id: u64, status: &str, holder: Option<&str>) -> Value {
    json!({
        "taskId": task_id,
        "projectId": 1,
        "taskStatus": status,
        "lockHolder": holder,
        "autoUnlockSeconds": 7200,
        "lastUpdated": "2026-10-19T08:00:00.000000Z",
        "taskHistory": [],
    })
}

pub fn square(min_lon: f64, min_lat: f64, size: f64) -> Value {
    json!({
        "type": "Polygon",
        "coordinates": [[
            [min_lon, min_lat],
            [min_lon + size, min_lat],
            [min_lon + size, min_lat + size],
            [min_lon, min_lat + size],
            [min_lon, min_lat],
        ]],
    })
}

/// Project summary allowing the given mapping editors
pub fn project_json(project_id: u64, mapping_editors: &[&str]) -> Value {
    json!({
        "projectId": project_id,
        "projectInfo": { "name": "Roads in Kibera" },
        "mappingEditors": mapping_editors,
        "validationEditors": ["ID", "JOSM"],
        "changesetComment": "#hotosm-project-1",
        "imagery": null,
    })
}
