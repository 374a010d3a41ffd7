//! OAuth 2.0 provider seam.
//!
//! [`OAuthProvider`] is the composition point between the token lifecycle in
//! [`crate::session`] and a concrete provider. It covers the four operations
//! the session needs:
//! 1. Build the authorization URL the user is sent to
//! 2. Exchange an authorization code for a credential
//! 3. Exchange a refresh token for a new credential
//! 4. Perform an authenticated GET against the resource API
//!
//! Redirect handling (callback endpoint, CSRF state bookkeeping) belongs to
//! the embedding application.

mod client;
mod exchange;
mod provider;

pub use client::FitbitClient;
pub use provider::{
    OAuthProviderConfig, FITBIT_API_BASE_URL, FITBIT_AUTH_URL, FITBIT_SCOPES, FITBIT_TOKEN_URL,
};

use crate::credentials::Credential;
use async_trait::async_trait;
use thiserror::Error;

/// Failure talking to the provider's token endpoint or resource API.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("token endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),
}

/// An authenticated GET against the resource API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceRequest {
    /// Path below the API base URL, starting with `/`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub access_token: String,
    /// `Accept-Language` value; `None` sends no header (metric units)
    pub accept_language: Option<String>,
}

/// Raw resource API response, classified by the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: String,
}

/// OAuth 2.0 operations the session depends on.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Authorization URL carrying the given CSRF `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Authorization-code grant.
    async fn exchange_code(&self, code: &str) -> Result<Credential, OAuthError>;

    /// Refresh-token grant using `current.refresh_token`.
    ///
    /// Fields the provider omits from the response are carried over from
    /// `current`.
    async fn refresh(&self, current: &Credential) -> Result<Credential, OAuthError>;

    /// Authenticated GET. Any HTTP status is a successful response here;
    /// only transport failures are errors.
    async fn get(&self, request: ResourceRequest) -> Result<ProviderResponse, OAuthError>;
}
