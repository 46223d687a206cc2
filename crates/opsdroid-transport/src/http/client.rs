//! HTTP API client.
//!
//! A thin wrapper over a shared [`reqwest::Client`] for Slack-style web APIs,
//! where every call is `{base_url}/{method}` and authentication is a bearer
//! token.

use std::time::Duration;

use reqwest::{Client, ClientBuilder, RequestBuilder};
use serde_json::Value;
use tracing::trace;

use crate::error::{TransportError, TransportResult};

/// A raw API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

impl ApiResponse {
    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn json(&self) -> TransportResult<Value> {
        serde_json::from_str(&self.body).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Client for one HTTP API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Creates a client for `base_url` with a request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> TransportResult<Self> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Authenticates every request with a bearer token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves an API method name, or passes an absolute URL through.
    pub fn url(&self, method: &str) -> String {
        if method.starts_with("http://") || method.starts_with("https://") {
            method.to_string()
        } else {
            format!("{}/{}", self.base_url, method.trim_start_matches('/'))
        }
    }

    /// `GET {base_url}/{method}?{query}`.
    pub async fn get(&self, method: &str, query: &[(&str, &str)]) -> TransportResult<ApiResponse> {
        let request = self.client.get(self.url(method)).query(query);
        self.execute(method, request).await
    }

    /// `POST {base_url}/{method}` with a form-encoded body.
    pub async fn post_form(
        &self,
        method: &str,
        form: &[(&str, &str)],
    ) -> TransportResult<ApiResponse> {
        let request = self.client.post(self.url(method)).form(form);
        self.execute(method, request).await
    }

    /// `POST {base_url}/{method}` with a JSON body.
    pub async fn post_json(&self, method: &str, body: &Value) -> TransportResult<ApiResponse> {
        let request = self.client.post(self.url(method)).json(body);
        self.execute(method, request).await
    }

    async fn execute(&self, method: &str, request: RequestBuilder) -> TransportResult<ApiResponse> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        trace!(method = %method, status, len = body.len(), "API call finished");
        Ok(ApiResponse { status, body })
    }
}
