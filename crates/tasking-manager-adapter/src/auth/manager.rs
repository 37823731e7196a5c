/*
[INPUT]:  HTTP client and the OAuth authorization code from the OSM redirect
[OUTPUT]: Established session in the SessionManager
[POS]:    Auth layer - orchestrates the login/logout flow
[UPDATE]: When auth endpoints or flow steps change
*/

use reqwest::Method;

use crate::http::{Result, TaskingClient, TaskingError};
use crate::types::{AuthCallbackResponse, LoginUrlResponse};

use super::SessionManager;

/// Manages the login flow against the Tasking Manager API
#[derive(Debug, Clone)]
pub struct AuthManager {
    client: TaskingClient,
}

impl AuthManager {
    pub fn new(client: TaskingClient) -> Self {
        Self { client }
    }

    /// Session store the manager writes to
    pub fn session(&self) -> &SessionManager {
        self.client.session()
    }

    /// Step 1: ask the API where to send the user to authorize
    ///
    /// GET /system/authentication/login/?redirect_uri={uri}
    pub async fn login_url(&self, redirect_uri: &str) -> Result<LoginUrlResponse> {
        let mut url = self.client.api_url("/system/authentication/login/")?;
        url.query_pairs_mut().append_pair("redirect_uri", redirect_uri);
        let builder = self.client.api_request(Method::GET, url.as_str())?;
        self.client.send_json(builder).await
    }

    /// Step 2: exchange the authorization code for a session token
    ///
    /// GET /system/authentication/callback/?redirect_uri={uri}&code={code}
    pub async fn complete_login(
        &self,
        redirect_uri: &str,
        code: &str,
        locale: Option<String>,
    ) -> Result<AuthCallbackResponse> {
        if code.trim().is_empty() {
            return Err(TaskingError::Config(
                "authorization code must not be empty".to_string(),
            ));
        }

        let mut url = self.client.api_url("/system/authentication/callback/")?;
        url.query_pairs_mut()
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("code", code.trim());
        let builder = self.client.api_request(Method::GET, url.as_str())?;
        let response: AuthCallbackResponse = self.client.send_json(builder).await?;

        self.session().set_session(
            response.session_token.clone(),
            response.username.clone(),
            locale,
        );
        tracing::info!(username = %response.username, "session established");
        Ok(response)
    }

    /// Forget the current session
    pub fn logout(&self) {
        self.session().clear();
        tracing::info!("session cleared");
    }
}
