use anyhow::{Context, Result};
use reqwest::cookie::Jar;
use reqwest::header::HeaderValue;
use reqwest::{Client, Request, Response, Url};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::AuthError;

/// HTTP client for the todo web API
/// Carries the session cookie and resolves paths against the backend base URL
pub struct ApiHttpClient {
    /// Shared HTTP client with connection pooling and cookie store
    client: Client,

    /// Backend base URL
    base_url: Url,
}

impl ApiHttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config.base()?;

        // Session cookie is scoped to the backend host, never sent elsewhere
        let jar = Jar::default();
        if let Some(ref cookie) = config.session_cookie {
            HeaderValue::from_str(cookie)
                .context("TODO_SESSION_COOKIE is not a valid header value")?;
            for pair in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                jar.add_cookie_str(&format!("{}; Path=/", pair), &base_url);
            }
        }

        let client = Client::builder()
            .cookie_provider(Arc::new(jar))
            .connect_timeout(Duration::from_secs(config.http_connect_timeout))
            .timeout(Duration::from_secs(config.http_request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, base_url })
    }

    /// Resolve a path (or absolute URL) against the base URL
    pub fn url(&self, path: &str) -> std::result::Result<Url, AuthError> {
        self.base_url
            .join(path)
            .map_err(|e| AuthError::InvalidUrl(format!("{}: {}", path, e)))
    }

    /// Execute a request, logging transport failures by kind
    pub async fn execute(&self, request: Request) -> std::result::Result<Response, reqwest::Error> {
        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(method = %method, url = %url, "Sending HTTP request");

        match self.client.execute(request).await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), url = %url, "Received HTTP response");
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(
                    error_kind = error_kind(&e),
                    error = %e,
                    method = %method,
                    url = %url,
                    "HTTP request error"
                );
                Err(e)
            }
        }
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Categorize a transport error for logging
fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection_failed"
    } else if e.is_request() {
        "request_error"
    } else if e.is_body() {
        "body_error"
    } else if e.is_decode() {
        "decode_error"
    } else {
        "unknown"
    }
}
