use anyhow::{Context, Result};
use reqwest::Method;

use todo_auth_client::auth::{AuthTokenManager, RequestOptions, RequestOutcome};
use todo_auth_client::config::{Command, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Backend: {}", config.base_url);
    if config.session_cookie.is_none() {
        tracing::debug!("No session cookie configured");
    }

    let manager = AuthTokenManager::new(&config)?;

    match command {
        Command::LoginUrl => {
            println!("{}", manager.initiate_google_login().location);
        }

        Command::Token => {
            exchange(&manager).await?;
            let credential = manager.credential().await;
            println!(
                "Access token obtained (refresh token: {})",
                if credential.refresh_token.is_some() {
                    "yes"
                } else {
                    "no"
                }
            );
            if let Some(expires_at) = credential.expires_at {
                println!("Expires at: {}", expires_at.to_rfc3339());
            }
        }

        Command::Me => {
            exchange(&manager).await?;
            let user = manager.current_user().await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }

        Command::Request { method, path, data } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method: {}", method))?;

            let mut options = RequestOptions::new(method);
            if let Some(data) = data {
                let body: serde_json::Value =
                    serde_json::from_str(&data).context("--data must be valid JSON")?;
                options = options.json(body);
            }

            exchange(&manager).await?;
            match manager.authenticated_request(&path, options).await? {
                RequestOutcome::Response(response) => {
                    let status = response.status();
                    let body = response.text().await?;
                    println!("{}", status);
                    print_body(&body);
                    if !status.is_success() {
                        anyhow::bail!("Request failed with status {}", status);
                    }
                }
                RequestOutcome::LoginRequired(redirect) => {
                    anyhow::bail!("Login required: {}", redirect.location);
                }
            }
        }

        Command::Signout => {
            let redirect = manager.sign_out().await;
            println!("Signed out. Log in again at {}", redirect.location);
        }
    }

    Ok(())
}

/// Exchange the configured session cookie for a bearer token
async fn exchange(manager: &AuthTokenManager) -> Result<()> {
    manager.exchange_session_for_token().await.context(
        "Session was not accepted; sign in through the web app and pass its cookie with -c",
    )?;
    Ok(())
}

/// Pretty-print JSON bodies, pass anything else through
fn print_body(body: &str) {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => println!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| body.to_string())
        ),
        Err(_) if !body.is_empty() => println!("{}", body),
        Err(_) => {}
    }
}
