use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Request;
use tokio::sync::{Mutex, RwLock};

use super::endpoints;
use super::types::{Credential, LoginRedirect, RequestOptions, RequestOutcome, User, UserEnvelope};
use crate::config::{AuthPaths, Config};
use crate::error::{AuthError, Result};
use crate::http_client::ApiHttpClient;

/// Authentication token manager
/// Holds the bearer credential, decorates requests with it and refreshes it on expiry
pub struct AuthTokenManager {
    /// Current credential
    credential: RwLock<Credential>,

    /// Serializes refreshes so concurrent callers share one refresh
    refresh_gate: Mutex<()>,

    /// HTTP client for the backend
    http: ApiHttpClient,

    /// Backend paths
    paths: AuthPaths,
}

impl AuthTokenManager {
    /// Create a manager with an empty credential
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::with_client(
            ApiHttpClient::new(config)?,
            config.paths.clone(),
        ))
    }

    pub fn with_client(http: ApiHttpClient, paths: AuthPaths) -> Self {
        Self {
            credential: RwLock::new(Credential::default()),
            refresh_gate: Mutex::new(()),
            http,
            paths,
        }
    }

    /// Seed the manager with a previously obtained credential
    pub async fn restore(&self, credential: Credential) {
        *self.credential.write().await = credential;
    }

    /// Snapshot of the current credential
    pub async fn credential(&self) -> Credential {
        self.credential.read().await.clone()
    }

    /// True iff an access token is present and not expired
    pub async fn is_valid(&self) -> bool {
        self.credential.read().await.is_valid_at(Utc::now())
    }

    async fn valid_access_token(&self) -> Option<String> {
        self.credential
            .read()
            .await
            .valid_access_token(Utc::now())
            .map(str::to_string)
    }

    /// Exchange the session cookie for a bearer token
    /// State is left untouched on failure
    pub async fn exchange_session_for_token(&self) -> Result<String> {
        let data = match endpoints::exchange_session(&self.http, &self.paths.token).await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!("Token exchange failed: {}", e);
                return Err(e);
            }
        };

        let mut credential = self.credential.write().await;
        credential.access_token = Some(data.access_token.clone());
        if data.refresh_token.is_some() {
            credential.refresh_token = data.refresh_token;
        }
        credential.expires_at = Some(data.expires_at);

        tracing::info!(
            "Access token obtained ({}...), expires: {}",
            token_preview(&data.access_token),
            data.expires_at.to_rfc3339()
        );

        Ok(data.access_token)
    }

    /// Refresh the access token with the stored refresh token
    /// Does not clear state on failure
    pub async fn refresh(&self) -> Result<String> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_unguarded().await
    }

    /// Refresh after finding the token expired, holding the gate through a
    /// forced sign-out so waiting callers see either the new token or the
    /// cleared credential
    async fn refresh_expired(&self) -> std::result::Result<String, LoginRedirect> {
        let _gate = self.refresh_gate.lock().await;

        let has_refresh_token = {
            let credential = self.credential.read().await;
            if let Some(token) = credential.valid_access_token(Utc::now()) {
                tracing::debug!("Token already refreshed by a concurrent request");
                return Ok(token.to_string());
            }
            credential.refresh_token.is_some()
        };

        if !has_refresh_token {
            tracing::debug!("Credential cleared by a concurrent request");
            return Err(self.login_redirect());
        }

        match self.refresh_unguarded().await {
            Ok(token) => Ok(token),
            Err(e) => {
                tracing::warn!("Signing out after refresh failure: {}", e);
                Err(self.sign_out().await)
            }
        }
    }

    async fn refresh_unguarded(&self) -> Result<String> {
        let refresh_token = self
            .credential
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or(AuthError::NoRefreshToken)?;

        let data =
            match endpoints::refresh_access_token(&self.http, &self.paths.refresh, &refresh_token)
                .await
            {
                Ok(data) => data,
                Err(e) => {
                    tracing::error!("Token refresh failed: {}", e);
                    return Err(e);
                }
            };

        let mut credential = self.credential.write().await;
        credential.access_token = Some(data.access_token.clone());
        credential.expires_at = Some(data.expires_at);

        // Rotate only when the backend issues a new refresh token
        if let Some(new_refresh_token) = data.refresh_token {
            tracing::debug!("Backend rotated the refresh token");
            credential.refresh_token = Some(new_refresh_token);
        }

        tracing::info!(
            "Access token refreshed ({}...), expires: {}",
            token_preview(&data.access_token),
            data.expires_at.to_rfc3339()
        );

        Ok(data.access_token)
    }

    /// Issue a request decorated with the bearer token
    ///
    /// - valid token: request is sent, any status is passed through
    /// - expired token with refresh token: refresh first; on refresh failure
    ///   sign out and return [`RequestOutcome::LoginRequired`]
    /// - no credential: nothing is sent, [`RequestOutcome::LoginRequired`]
    pub async fn authenticated_request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<RequestOutcome> {
        let token = match self.valid_access_token().await {
            Some(token) => token,
            None => {
                let can_refresh = self.credential.read().await.refresh_token.is_some();
                if !can_refresh {
                    tracing::info!("No usable credential, login required");
                    return Ok(RequestOutcome::LoginRequired(self.login_redirect()));
                }

                match self.refresh_expired().await {
                    Ok(token) => token,
                    Err(redirect) => return Ok(RequestOutcome::LoginRequired(redirect)),
                }
            }
        };

        let request = self.build_request(url, options, &token)?;
        let response = self.http.execute(request).await?;

        Ok(RequestOutcome::Response(response))
    }

    /// Merge headers: JSON content type, then caller headers, then Authorization
    fn build_request(&self, url: &str, options: RequestOptions, token: &str) -> Result<Request> {
        let url = self.http.url(url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.extend(options.headers);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|_| {
            tracing::error!("Access token is not a valid header value");
            AuthError::Unauthenticated
        })?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        tracing::debug!(method = %options.method, url = %url, "Decorated authenticated request");

        let mut builder = self
            .http
            .client()
            .request(options.method, url)
            .headers(headers);
        if let Some(ref body) = options.body {
            builder = builder.json(body);
        }

        Ok(builder.build()?)
    }

    /// Sign out: best-effort backend call, then always clear local state
    pub async fn sign_out(&self) -> LoginRedirect {
        if let Err(e) = endpoints::sign_out(&self.http, &self.paths.signout).await {
            tracing::warn!("Sign-out call failed, clearing local credential anyway: {:#}", e);
        }

        self.credential.write().await.clear();
        tracing::info!("Signed out, local credential cleared");

        self.login_redirect()
    }

    /// Fetch the current user through the authenticated request path
    pub async fn current_user(&self) -> Result<User> {
        let outcome = self
            .authenticated_request(&self.paths.me, RequestOptions::default())
            .await?;

        let response = match outcome {
            RequestOutcome::Response(response) => response,
            RequestOutcome::LoginRequired(_) => return Err(AuthError::Unauthenticated),
        };

        let status = response.status();
        if !status.is_success() {
            let message = endpoints::error_message(response, "Failed to get user info").await;
            return Err(AuthError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: UserEnvelope = response.json().await?;
        Ok(envelope.user)
    }

    /// Sign-in page
    pub fn login_redirect(&self) -> LoginRedirect {
        self.entry_point(&self.paths.login)
    }

    /// Google OAuth initiation endpoint
    pub fn initiate_google_login(&self) -> LoginRedirect {
        self.entry_point(&self.paths.google_login)
    }

    fn entry_point(&self, path: &str) -> LoginRedirect {
        let location = self
            .http
            .url(path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| path.to_string());
        LoginRedirect { location }
    }
}

/// First characters of a token, for logs
fn token_preview(token: &str) -> String {
    token.chars().take(8).collect()
}
