use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// One entry of a Fitbit error body: `{"errors":[{"errorType":...}]}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderErrorDetail {
    #[serde(rename = "errorType")]
    pub error_type: String,

    #[serde(default, rename = "fieldName", skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Every way a session call can fail. Nothing escapes the session as a panic.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No stored credential. The user must go through authorization.
    #[error("user {user_id} has not authorized Fitbit access")]
    Unauthenticated { user_id: String },

    /// The provider rejected the refresh token. The stale credential is
    /// left in the store.
    #[error("token refresh for user {user_id} failed: {reason}")]
    RefreshFailed { user_id: String, reason: String },

    /// The user did not grant the scope this resource needs.
    #[error("scope not granted for {path}")]
    Scope {
        path: String,
        status: u16,
        errors: Vec<ProviderErrorDetail>,
    },

    /// Any other rejection from the provider.
    #[error("Fitbit rejected {path} with status {status}{}", describe(.errors))]
    Provider {
        path: String,
        status: u16,
        errors: Vec<ProviderErrorDetail>,
    },

    /// Network failure or an unparseable response body.
    #[error("transport failure for {path}: {reason}")]
    Transport { path: String, reason: String },

    /// The credential store itself failed.
    #[error("credential store failure: {0}")]
    Storage(String),
}

impl ApiError {
    /// Short machine-readable name of the failure class.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Unauthenticated { .. } => "unauthenticated",
            ApiError::RefreshFailed { .. } => "refresh_failed",
            ApiError::Scope { .. } => "scope",
            ApiError::Provider { .. } => "provider",
            ApiError::Transport { .. } => "transport",
            ApiError::Storage(_) => "storage",
        }
    }

    /// Expected failures that callers usually skip rather than report.
    pub fn is_benign(&self) -> bool {
        matches!(self, ApiError::Scope { .. })
    }

    /// Only re-authorization can clear these.
    pub fn needs_reauthorization(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthenticated { .. } | ApiError::RefreshFailed { .. }
        )
    }
}

fn describe(errors: &[ProviderErrorDetail]) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = errors
        .iter()
        .map(|e| match &e.message {
            Some(message) => format!("{}: {}", e.error_type, message),
            None => e.error_type.clone(),
        })
        .collect();
    format!(" ({})", parts.join("; "))
}
