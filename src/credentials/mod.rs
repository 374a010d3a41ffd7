//! Encrypted per-user credential storage for Fitbit OAuth tokens.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       TokenStore (trait)                 │
//! │  - load / save / delete / list_users     │
//! │  - one row per local user                │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//!    (seal)               (open)
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       TokenCipher                        │
//! │  - AES-256-GCM                           │
//! │  - Unique nonce per token                │
//! └─────────────────────────────────────────┘
//!          ↓                    ↑
//! ┌─────────────────────────────────────────┐
//! │       SQLite (CredentialStore)           │
//! │  - Upsert keyed by user_id               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use fitsync::credentials::{Credential, CredentialStore, TokenStore};
//! use chrono::{Duration, Utc};
//!
//! # fn main() -> anyhow::Result<()> {
//! let encryption_key = std::env::var("FITSYNC_ENCRYPTION_KEY")?;
//! let store = CredentialStore::new("fitsync.db", &encryption_key)?;
//!
//! let credential = Credential {
//!     access_token: "access".to_string(),
//!     refresh_token: "refresh".to_string(),
//!     expires_at: Utc::now() + Duration::hours(8),
//!     provider_subject_id: "22ABCD".to_string(),
//! };
//! store.save("42", &credential)?;
//!
//! if let Some(credential) = store.load("42")? {
//!     println!("Fitbit user: {}", credential.provider_subject_id);
//! }
//!
//! store.delete("42")?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod encryption;
mod storage;

pub use encryption::{generate_key, validate_key, Sealed, TokenCipher};
pub use storage::CredentialStore;

/// OAuth credentials for one local user.
///
/// A refresh replaces every field together; the store never holds an access
/// token paired with a refresh token from a different grant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer token sent on API requests
    pub access_token: String,

    /// Single-use token exchanged for a new access token
    pub refresh_token: String,

    /// When the access token expires (UTC)
    pub expires_at: DateTime<Utc>,

    /// Fitbit's encoded user id for the resource owner
    pub provider_subject_id: String,
}

impl Credential {
    /// Builds the per-request token view.
    pub fn access_window(&self) -> AccessWindow {
        AccessWindow {
            access_token: self.access_token.clone(),
            expires_at: self.expires_at,
            provider_subject_id: self.provider_subject_id.clone(),
        }
    }
}

/// Token used for exactly one request.
///
/// Rebuilt from the stored [`Credential`] on every call, since a concurrent
/// refresh may have replaced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessWindow {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub provider_subject_id: String,
}

impl AccessWindow {
    /// A token whose expiry equals `now` is already expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Durable key-value storage with one credential per local user.
///
/// Implementations must make each operation atomic for its row. No token
/// validation happens here.
pub trait TokenStore: Send + Sync {
    /// Returns `None` if the user never authorized or has unlinked.
    fn load(&self, user_id: &str) -> Result<Option<Credential>>;

    /// Upserts the credential, replacing every field of an existing row.
    fn save(&self, user_id: &str, credential: &Credential) -> Result<()>;

    /// Removes the row. Returns `false` if nothing was stored.
    fn delete(&self, user_id: &str) -> Result<bool>;

    /// All user ids with a stored credential, ascending.
    fn list_users(&self) -> Result<Vec<String>>;
}
