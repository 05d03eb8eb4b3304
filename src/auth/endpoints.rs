// Token exchange, refresh and sign-out calls

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use reqwest::Response;

use super::types::{ErrorBody, RefreshRequest, TokenResponse};
use crate::error::{AuthError, Result};
use crate::http_client::ApiHttpClient;

const EXCHANGE_FALLBACK: &str = "Failed to get auth token";
const REFRESH_FALLBACK: &str = "Failed to refresh token";

/// Token data from an exchange or refresh response
#[derive(Debug, Clone)]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Exchange the ambient session cookie for a bearer token
pub async fn exchange_session(http: &ApiHttpClient, path: &str) -> Result<TokenData> {
    tracing::debug!("Exchanging session for access token...");

    let url = http.url(path)?;
    let request = http
        .client()
        .post(url)
        .header("Content-Type", "application/json")
        .build()
        .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

    let response = http
        .execute(request)
        .await
        .map_err(|e| AuthError::ExchangeFailed(e.to_string()))?;

    parse_token_response(response, EXCHANGE_FALLBACK)
        .await
        .map_err(AuthError::ExchangeFailed)
}

/// Obtain a new access token with the refresh token
pub async fn refresh_access_token(
    http: &ApiHttpClient,
    path: &str,
    refresh_token: &str,
) -> Result<TokenData> {
    tracing::debug!("Refreshing access token...");

    let url = http.url(path)?;
    let request = http
        .client()
        .post(url)
        .json(&RefreshRequest { refresh_token })
        .build()
        .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

    let response = http
        .execute(request)
        .await
        .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

    parse_token_response(response, REFRESH_FALLBACK)
        .await
        .map_err(AuthError::RefreshFailed)
}

/// Tell the backend to end the session
pub async fn sign_out(http: &ApiHttpClient, path: &str) -> anyhow::Result<()> {
    let url = http.url(path)?;
    let request = http
        .client()
        .post(url)
        .build()
        .context("Failed to build sign-out request")?;

    let response = http
        .execute(request)
        .await
        .context("Failed to send sign-out request")?;

    let status = response.status();
    if !status.is_success() {
        let message = error_message(response, "Failed to sign out").await;
        anyhow::bail!("Sign-out rejected: {} - {}", status, message);
    }

    Ok(())
}

/// Read the backend `error` field, falling back to `fallback`
pub async fn error_message(response: Response, fallback: &str) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.error)
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

async fn parse_token_response(
    response: Response,
    fallback: &str,
) -> std::result::Result<TokenData, String> {
    let status = response.status();
    if !status.is_success() {
        let message = error_message(response, fallback).await;
        tracing::error!(status = status.as_u16(), error = %message, "Token request rejected");
        return Err(message);
    }

    let data: TokenResponse = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse token response: {}", e))?;

    if data.access_token.is_empty() {
        return Err("Token response does not contain access_token".to_string());
    }

    let expires_at = expiry_from_now(data.expires_in)
        .ok_or_else(|| format!("Invalid expires_in: {}", data.expires_in))?;

    Ok(TokenData {
        access_token: data.access_token,
        refresh_token: data.refresh_token.filter(|t| !t.is_empty()),
        expires_at,
    })
}

/// `now + expires_in` seconds, `None` on overflow
fn expiry_from_now(expires_in: i64) -> Option<DateTime<Utc>> {
    Duration::try_seconds(expires_in).and_then(|d| Utc::now().checked_add_signed(d))
}
