// Authentication types

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Method, Response};
use serde::{Deserialize, Serialize};

/// Bearer credential held by the token manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Access token that is present and not yet expired at `now`
    pub fn valid_access_token(&self, now: DateTime<Utc>) -> Option<&str> {
        match (&self.access_token, self.expires_at) {
            (Some(token), Some(exp)) if now < exp => Some(token.as_str()),
            _ => None,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_access_token(now).is_some()
    }

    pub fn clear(&mut self) {
        self.access_token = None;
        self.refresh_token = None;
        self.expires_at = None;
    }
}

/// Token exchange / refresh response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// Refresh request body
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// Error body returned by the backend
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
}

/// Authenticated user as reported by `/api/auth/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct UserEnvelope {
    pub user: User,
}

/// Caller-supplied request options for an authenticated call
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Default::default()
        }
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }
}

/// Signal that the caller must send the user to a login entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub location: String,
}

/// Result of an authenticated request
#[derive(Debug)]
pub enum RequestOutcome {
    /// Request was issued; status is for the caller to interpret
    Response(Response),

    /// No usable credential, request was not issued
    LoginRequired(LoginRedirect),
}

impl RequestOutcome {
    pub fn into_response(self) -> Option<Response> {
        match self {
            RequestOutcome::Response(response) => Some(response),
            RequestOutcome::LoginRequired(_) => None,
        }
    }

    pub fn is_login_required(&self) -> bool {
        matches!(self, RequestOutcome::LoginRequired(_))
    }
}
