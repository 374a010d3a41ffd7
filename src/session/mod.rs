//! Access-token lifecycle and authenticated Fitbit requests.
//!
//! Every call reloads the user's credential from the [`TokenStore`],
//! refreshes it through the [`OAuthProvider`] when expired, and then issues a
//! single GET. Failures come back as [`ApiError`] values.
//!
//! ```text
//! fetch(user, path)
//!   └─ resolve_token(user)
//!        ├─ TokenStore::load          absent → Unauthenticated
//!        └─ expired?
//!             ├─ per-user guard, reload (a concurrent call may have refreshed)
//!             ├─ OAuthProvider::refresh   failure → RefreshFailed
//!             └─ TokenStore::save
//!   └─ OAuthProvider::get (Bearer + Accept-Language)
//!   └─ classify                         → Value | Scope | Provider | Transport
//! ```

mod classify;
mod error;
mod units;


pub use error::{ApiError, ApiResult, ProviderErrorDetail};
pub use units::{UnitSystem, UnitSystemError};

use crate::credentials::{AccessWindow, Credential, TokenStore};
use crate::endpoints::{
    activity_time_series_path, daily_activity_summary_path, ActivityDate, BADGES_PATH,
    DEFAULT_PERIOD, PROFILE_PATH,
};
use crate::oauth::{OAuthProvider, ResourceRequest};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Authorization URL plus the CSRF state the caller must check on callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub url: String,
    pub state: String,
}

/// Token lifecycle manager and request layer for one provider.
///
/// Cheap to share behind an `Arc`; holds no per-request state besides the
/// refresh guards.
pub struct ApiSession {
    store: Arc<dyn TokenStore>,
    provider: Arc<dyn OAuthProvider>,
    unit_system: RwLock<UnitSystem>,
    refresh_guards: DashMap<String, Arc<Mutex<()>>>,
}

impl ApiSession {
    pub fn new(store: Arc<dyn TokenStore>, provider: Arc<dyn OAuthProvider>) -> Self {
        Self::with_unit_system(store, provider, UnitSystem::default())
    }

    pub fn with_unit_system(
        store: Arc<dyn TokenStore>,
        provider: Arc<dyn OAuthProvider>,
        unit_system: UnitSystem,
    ) -> Self {
        Self {
            store,
            provider,
            unit_system: RwLock::new(unit_system),
            refresh_guards: DashMap::new(),
        }
    }

    /// Session default used by [`ApiSession::fetch`].
    pub fn unit_system(&self) -> UnitSystem {
        match self.unit_system.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Changes the default for subsequent calls.
    pub fn set_unit_system(&self, unit_system: UnitSystem) {
        match self.unit_system.write() {
            Ok(mut guard) => *guard = unit_system,
            Err(poisoned) => *poisoned.into_inner() = unit_system,
        }
    }

    /// Starts authorization: a provider URL carrying a fresh state token.
    pub fn authorization_request(&self) -> AuthorizationRequest {
        let state = Uuid::new_v4().to_string();
        AuthorizationRequest {
            url: self.provider.authorization_url(&state),
            state,
        }
    }

    /// Exchanges an authorization code and stores the resulting credential,
    /// replacing any earlier authorization for this user.
    pub async fn link_user(&self, user_id: &str, code: &str) -> ApiResult<AccessWindow> {
        let credential = self.provider.exchange_code(code).await.map_err(|e| {
            error!(user_id = %user_id, error = %e, "Authorization code exchange failed");
            ApiError::Unauthenticated {
                user_id: user_id.to_string(),
            }
        })?;

        let guard = self.refresh_guard(user_id);
        let _held = guard.lock().await;
        self.save(user_id, &credential)?;
        info!(
            user_id = %user_id,
            provider_subject_id = %credential.provider_subject_id,
            "Fitbit account linked"
        );
        Ok(credential.access_window())
    }

    /// Removes the user's credential. Returns `false` if none was stored.
    ///
    /// Waits for an in-flight refresh, so its save cannot re-insert the row.
    pub async fn unlink_user(&self, user_id: &str) -> ApiResult<bool> {
        let guard = self.refresh_guard(user_id);
        let _held = guard.lock().await;

        let removed = self.store.delete(user_id).map_err(|e| storage_error(user_id, e))?;
        info!(user_id = %user_id, removed, "Fitbit account unlinked");
        Ok(removed)
    }

    /// Users with a stored credential.
    pub fn linked_users(&self) -> ApiResult<Vec<String>> {
        self.store.list_users().map_err(|e| {
            error!(error = %e, "Failed to list linked users");
            ApiError::Storage(format!("{e:#}"))
        })
    }

    /// Returns a non-expired token for the user, refreshing it if needed.
    pub async fn resolve_token(&self, user_id: &str) -> ApiResult<AccessWindow> {
        let window = self.load(user_id)?.access_window();
        if !window.is_expired() {
            return Ok(window);
        }

        let guard = self.refresh_guard(user_id);
        let _held = guard.lock().await;

        // Reload: whoever held the guard before us may already have refreshed.
        let credential = self.load(user_id)?;
        if !credential.access_window().is_expired() {
            debug!(user_id = %user_id, "Token refreshed by concurrent request");
            return Ok(credential.access_window());
        }

        info!(user_id = %user_id, expired_at = %credential.expires_at, "Refreshing Fitbit access token");
        let refreshed = self.provider.refresh(&credential).await.map_err(|e| {
            error!(user_id = %user_id, error = %e, "Token refresh failed");
            ApiError::RefreshFailed {
                user_id: user_id.to_string(),
                reason: e.to_string(),
            }
        })?;

        // The save is an upsert; never resurrect a row deleted during the refresh.
        if self.store.load(user_id).map_err(|e| storage_error(user_id, e))?.is_none() {
            info!(user_id = %user_id, "Credential removed during refresh, discarding new token");
            return Err(ApiError::Unauthenticated {
                user_id: user_id.to_string(),
            });
        }

        self.save(user_id, &refreshed)?;
        debug!(user_id = %user_id, expires_at = %refreshed.expires_at, "Token refreshed");
        Ok(refreshed.access_window())
    }

    /// GET `resource_path` for the user with the session's unit system.
    pub async fn fetch(
        &self,
        user_id: &str,
        resource_path: &str,
        query: &[(&str, &str)],
    ) -> ApiResult<Value> {
        self.fetch_with_units(user_id, resource_path, query, self.unit_system())
            .await
    }

    /// GET `resource_path` with an explicit unit system for this call only.
    pub async fn fetch_with_units(
        &self,
        user_id: &str,
        resource_path: &str,
        query: &[(&str, &str)],
        unit_system: UnitSystem,
    ) -> ApiResult<Value> {
        let window = self.resolve_token(user_id).await?;

        let request = ResourceRequest {
            path: resource_path.to_string(),
            query: query
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            access_token: window.access_token,
            accept_language: unit_system.accept_language().map(str::to_string),
        };

        let result = match self.provider.get(request).await {
            Ok(response) => classify::classify(resource_path, response),
            Err(e) => Err(ApiError::Transport {
                path: resource_path.to_string(),
                reason: e.to_string(),
            }),
        };

        if let Err(err) = &result {
            log_failure(user_id, err);
        }
        result
    }

    pub async fn get_profile(&self, user_id: &str) -> ApiResult<Value> {
        self.fetch(user_id, PROFILE_PATH, &[]).await
    }

    pub async fn get_badges(&self, user_id: &str) -> ApiResult<Value> {
        self.fetch(user_id, BADGES_PATH, &[]).await
    }

    /// Defaults to today.
    pub async fn get_daily_activity_summary(
        &self,
        user_id: &str,
        date: Option<ActivityDate>,
    ) -> ApiResult<Value> {
        let path = daily_activity_summary_path(date.unwrap_or_default());
        self.fetch(user_id, &path, &[]).await
    }

    /// Defaults to today and a `7d` period. The period is not validated.
    pub async fn get_activity_time_series(
        &self,
        user_id: &str,
        resource_path: &str,
        date: Option<ActivityDate>,
        period: Option<&str>,
    ) -> ApiResult<Value> {
        let path = activity_time_series_path(
            resource_path,
            date.unwrap_or_default(),
            period.unwrap_or(DEFAULT_PERIOD),
        );
        self.fetch(user_id, &path, &[]).await
    }

    fn load(&self, user_id: &str) -> ApiResult<Credential> {
        match self.store.load(user_id) {
            Ok(Some(credential)) => Ok(credential),
            Ok(None) => {
                debug!(user_id = %user_id, "No stored Fitbit credential");
                Err(ApiError::Unauthenticated {
                    user_id: user_id.to_string(),
                })
            }
            Err(e) => Err(storage_error(user_id, e)),
        }
    }

    fn save(&self, user_id: &str, credential: &Credential) -> ApiResult<()> {
        self.store
            .save(user_id, credential)
            .map_err(|e| storage_error(user_id, e))
    }

    fn refresh_guard(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.refresh_guards
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }
}

fn storage_error(user_id: &str, e: anyhow::Error) -> ApiError {
    error!(user_id = %user_id, error = %e, "Credential store failure");
    ApiError::Storage(format!("{e:#}"))
}

fn log_failure(user_id: &str, err: &ApiError) {
    match err {
        ApiError::Scope { path, .. } => {
            info!(user_id = %user_id, path = %path, "Fitbit scope not granted");
        }
        ApiError::Provider { .. } | ApiError::Transport { .. } => {
            error!(user_id = %user_id, kind = err.kind(), error = %err, "Fitbit request failed");
        }
        // Logged where they are raised
        ApiError::Unauthenticated { .. } | ApiError::RefreshFailed { .. } | ApiError::Storage(_) => {}
    }
}
