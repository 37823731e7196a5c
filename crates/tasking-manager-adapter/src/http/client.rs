/*
[INPUT]:  HTTP configuration (base URL, timeouts) and the injected session store
[OUTPUT]: Configured reqwest client ready for API calls
[POS]:    HTTP layer - core client implementation
[UPDATE]: When adding connection options or changing client behavior
*/

use std::time::Duration;

use reqwest::header::{ACCEPT_LANGUAGE, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::SessionManager;
use crate::http::{Result, TaskingError};
use crate::types::ApiErrorBody;

/// Base URL for the Tasking Manager API
pub const DEFAULT_API_BASE_URL: &str =
    "https://tasking-manager-tm4-production-api.hotosm.org/api/v2/";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Main HTTP client for the Tasking Manager API
#[derive(Debug, Clone)]
pub struct TaskingClient {
    http_client: Client,
    api_base_url: Url,
    session: SessionManager,
    timeout: Duration,
}

impl TaskingClient {
    /// Create a new client against the production API
    pub fn new(session: SessionManager) -> Result<Self> {
        Self::with_config(ClientConfig::default(), session)
    }

    /// Create a new client with custom configuration
    pub fn with_config(config: ClientConfig, session: SessionManager) -> Result<Self> {
        Self::with_config_and_base_url(config, DEFAULT_API_BASE_URL, session)
    }

    /// Create a client against an explicit API base URL (staging, mock servers)
    pub fn with_config_and_base_url(
        config: ClientConfig,
        api_base_url: &str,
        session: SessionManager,
    ) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            api_base_url: normalize_base_url(api_base_url)?,
            session,
            timeout: config.timeout,
        })
    }

    /// Session store the client reads its token and locale from
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    pub fn api_base_url(&self) -> &Url {
        &self.api_base_url
    }

    /// Build full URL for an API endpoint
    pub fn api_url(&self, endpoint: &str) -> std::result::Result<Url, url::ParseError> {
        self.api_base_url.join(endpoint.trim_start_matches('/'))
    }

    /// Build request builder for public endpoints
    pub(crate) fn api_request(&self, method: Method, endpoint: &str) -> Result<RequestBuilder> {
        let url = self.api_url(endpoint)?;
        let mut builder = self.http_client.request(method, url);
        if let Some(locale) = self.session.locale() {
            builder = builder.header(ACCEPT_LANGUAGE, locale);
        }
        Ok(builder)
    }

    /// Build request builder carrying the session token
    pub(crate) fn api_request_with_session(
        &self,
        method: Method,
        endpoint: &str,
    ) -> Result<RequestBuilder> {
        let token = self.session.token().ok_or(TaskingError::Unauthorized)?;
        let builder = self.api_request(method, endpoint)?;
        Ok(builder.header(AUTHORIZATION, format!("Token {token}")))
    }

    /// Send a request and decode the JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(builder).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| {
            TaskingError::InvalidResponse(format!("failed to decode response: {err}"))
        })
    }

    /// Send a request whose response body is irrelevant
    pub(crate) async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        self.send(builder).await.map(|_| ())
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                TaskingError::Timeout {
                    duration: self.timeout.as_secs(),
                }
            } else {
                TaskingError::Http(err)
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let raw = response.text().await.unwrap_or_default();
        let body: ApiErrorBody = serde_json::from_str(&raw).unwrap_or_default();
        let message = body.error.unwrap_or_else(|| {
            if raw.is_empty() {
                status.canonical_reason().unwrap_or("error").to_string()
            } else {
                raw.clone()
            }
        });
        debug!(status = status.as_u16(), sub_code = ?body.sub_code, "API call rejected");
        Err(TaskingError::api_error(status, message, body.sub_code))
    }
}

fn normalize_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
