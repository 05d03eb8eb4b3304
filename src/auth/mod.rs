// Authentication module
// Manages the bearer credential lifecycle and authenticated requests

mod endpoints;
mod manager;
mod types;

pub use manager::AuthTokenManager;
pub use types::{Credential, LoginRedirect, RequestOptions, RequestOutcome, User};
