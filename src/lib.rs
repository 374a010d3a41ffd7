//! fitsync - Fitbit OAuth2 token lifecycle and API access.
//!
//! The crate keeps one encrypted credential per local user, refreshes access
//! tokens on demand before each Fitbit Web API call, and classifies every
//! failure into [`session::ApiError`].
//!
//! ```no_run
//! use fitsync::credentials::CredentialStore;
//! use fitsync::oauth::{FitbitClient, OAuthProviderConfig};
//! use fitsync::session::ApiSession;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let store = Arc::new(CredentialStore::new("fitsync.db", &std::env::var("FITSYNC_ENCRYPTION_KEY")?)?);
//! let provider = Arc::new(FitbitClient::new(OAuthProviderConfig::fitbit(
//!     "228XYZ",
//!     "client-secret",
//!     "https://cms.example.com/fitbit/authorize",
//! ))?);
//! let session = ApiSession::new(store, provider);
//!
//! match session.get_profile("42").await {
//!     Ok(profile) => println!("{}", profile["user"]["displayName"]),
//!     Err(e) if e.needs_reauthorization() => println!("re-link required: {e}"),
//!     Err(e) => println!("Fitbit call failed: {e}"),
//! }
//! # Ok(())
//! # }
//! ```

// Configuration (TOML + env)
pub mod config;

// Encrypted per-user token storage
pub mod credentials;

// Endpoint registry and resource paths
pub mod endpoints;

// OAuth provider seam and Fitbit adapter
pub mod oauth;

// Token lifecycle and request layer
pub mod session;

pub use credentials::{AccessWindow, Credential, CredentialStore, TokenStore};
pub use session::{ApiError, ApiResult, ApiSession, UnitSystem};
