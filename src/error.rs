// Error handling module
// Defines the error taxonomy of the credential layer

use thiserror::Error;

/// Errors surfaced by the token manager and its endpoint wrappers
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token exchange rejected by the backend or transport failure
    #[error("Token exchange failed: {0}")]
    ExchangeFailed(String),

    /// Token refresh rejected by the backend or transport failure
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// Refresh attempted without a refresh token
    #[error("No refresh token available")]
    NoRefreshToken,

    /// No usable credential, the user must log in again
    #[error("Not authenticated")]
    Unauthenticated,

    /// Backend answered an authenticated call with an error status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Target URL could not be resolved against the base URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Transport failure of an authenticated request
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Result type alias for credential operations
pub type Result<T> = std::result::Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = AuthError::ExchangeFailed("Not authenticated".to_string());
        assert_eq!(err.to_string(), "Token exchange failed: Not authenticated");

        let err = AuthError::RefreshFailed("Invalid refresh token".to_string());
        assert_eq!(err.to_string(), "Token refresh failed: Invalid refresh token");

        let err = AuthError::NoRefreshToken;
        assert_eq!(err.to_string(), "No refresh token available");

        let err = AuthError::Api {
            status: 404,
            message: "User not found".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 404 - User not found");
    }
}
