use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::Url;

/// Todo Auth Client - bearer token helper for the todo web API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Backend base URL
    #[arg(
        short = 'u',
        long,
        env = "TODO_API_BASE_URL",
        default_value = "http://127.0.0.1:5000"
    )]
    pub base_url: String,

    /// Session cookie used for token exchange and sign-out (e.g. "session=abc")
    #[arg(short = 'c', long, env = "TODO_SESSION_COOKIE")]
    pub session_cookie: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "30")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the Google OAuth login URL
    LoginUrl,

    /// Exchange the session cookie for an access token
    Token,

    /// Show the user the session belongs to
    Me,

    /// Issue an authenticated request against the API
    Request {
        /// HTTP method (GET, POST, PUT, DELETE, ...)
        method: String,

        /// Path relative to the base URL, or an absolute URL
        path: String,

        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Sign out and drop local credentials
    Signout,
}

/// Backend paths used by the credential layer
#[derive(Clone, Debug, PartialEq)]
pub struct AuthPaths {
    pub token: String,
    pub refresh: String,
    pub signout: String,
    pub me: String,
    pub login: String,
    pub google_login: String,
}

impl Default for AuthPaths {
    fn default() -> Self {
        Self {
            token: "/api/auth/token".to_string(),
            refresh: "/api/auth/refresh".to_string(),
            signout: "/api/auth/signout".to_string(),
            me: "/api/auth/me".to_string(),
            login: "/login".to_string(),
            google_login: "/login/google".to_string(),
        }
    }
}

impl AuthPaths {
    /// Default paths overridden by AUTH_*_PATH / LOGIN_PATH env vars
    fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            token: env_or("AUTH_TOKEN_PATH", defaults.token),
            refresh: env_or("AUTH_REFRESH_PATH", defaults.refresh),
            signout: env_or("AUTH_SIGNOUT_PATH", defaults.signout),
            me: env_or("AUTH_ME_PATH", defaults.me),
            login: env_or("LOGIN_PATH", defaults.login),
            google_login: env_or("GOOGLE_LOGIN_PATH", defaults.google_login),
        }
    }

    fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("AUTH_TOKEN_PATH", self.token.as_str()),
            ("AUTH_REFRESH_PATH", self.refresh.as_str()),
            ("AUTH_SIGNOUT_PATH", self.signout.as_str()),
            ("AUTH_ME_PATH", self.me.as_str()),
            ("LOGIN_PATH", self.login.as_str()),
            ("GOOGLE_LOGIN_PATH", self.google_login.as_str()),
        ]
        .into_iter()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    // Backend
    pub base_url: String,
    pub paths: AuthPaths,

    // Session
    pub session_cookie: Option<String>,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > .env > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();

        Ok((Self::from_args(args), command))
    }

    /// Build config from parsed CLI arguments
    pub fn from_args(args: CliArgs) -> Self {
        Config {
            base_url: args.base_url,
            paths: AuthPaths::from_env(),
            session_cookie: args.session_cookie.filter(|c| !c.trim().is_empty()),
            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            http_request_timeout: args.http_timeout,
            log_level: args.log_level,
        }
    }

    /// Config pointing at `base_url` with default paths and timeouts
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Config {
            base_url: base_url.into(),
            paths: AuthPaths::default(),
            session_cookie: None,
            http_connect_timeout: 30,
            http_request_timeout: 30,
            log_level: "info".to_string(),
        }
    }

    /// Parsed base URL
    pub fn base(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .with_context(|| format!("TODO_API_BASE_URL is not a valid URL: {}", self.base_url))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base = self.base()?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!(
                "TODO_API_BASE_URL must use http or https, got: {}",
                base.scheme()
            );
        }

        for (name, path) in self.paths.iter() {
            if !path.starts_with('/') {
                anyhow::bail!("{} must start with '/': {}", name, path);
            }
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_default_paths() {
        let paths = AuthPaths::default();
        assert_eq!(paths.token, "/api/auth/token");
        assert_eq!(paths.refresh, "/api/auth/refresh");
        assert_eq!(paths.signout, "/api/auth/signout");
        assert_eq!(paths.me, "/api/auth/me");
        assert_eq!(paths.login, "/login");
        assert_eq!(paths.google_login, "/login/google");
    }

    #[test]
    fn test_parse_subcommands() {
        let args = parse(&["todo-auth", "-u", "http://localhost:8080", "token"]);
        assert_eq!(args.base_url, "http://localhost:8080");
        assert_eq!(args.command, Command::Token);

        let args = parse(&[
            "todo-auth",
            "request",
            "POST",
            "/api/projects",
            "--data",
            r#"{"name":"Home"}"#,
        ]);
        assert_eq!(
            args.command,
            Command::Request {
                method: "POST".to_string(),
                path: "/api/projects".to_string(),
                data: Some(r#"{"name":"Home"}"#.to_string()),
            }
        );
    }

    #[test]
    fn test_missing_subcommand_is_rejected() {
        assert!(CliArgs::try_parse_from(["todo-auth"]).is_err());
    }

    #[test]
    fn test_blank_session_cookie_is_dropped() {
        let args = parse(&["todo-auth", "-c", "  ", "me"]);
        let config = Config::from_args(args);
        assert!(config.session_cookie.is_none());

        let args = parse(&["todo-auth", "-c", "session=abc", "me"]);
        let config = Config::from_args(args);
        assert_eq!(config.session_cookie.as_deref(), Some("session=abc"));
    }

    #[test]
    fn test_validate_accepts_http_and_https() {
        assert!(Config::with_base_url("http://127.0.0.1:5000").validate().is_ok());
        assert!(Config::with_base_url("https://todo.example.com").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_base_url() {
        assert!(Config::with_base_url("not a url").validate().is_err());
        assert!(Config::with_base_url("ftp://todo.example.com").validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_paths() {
        let mut config = Config::with_base_url("http://127.0.0.1:5000");
        config.paths.refresh = "api/auth/refresh".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("AUTH_REFRESH_PATH"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::with_base_url("http://127.0.0.1:5000");
        config.http_request_timeout = 0;
        assert!(config.validate().is_err());
    }
}
