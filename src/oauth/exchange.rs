//! Token endpoint calls: authorization-code and refresh-token grants.

use super::{OAuthError, OAuthProviderConfig};
use crate::credentials::Credential;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;

/// Grant sent to the token endpoint.
pub(crate) enum Grant<'a> {
    AuthorizationCode { code: &'a str },
    RefreshToken { refresh_token: &'a str },
}

impl Grant<'_> {
    fn name(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
        }
    }
}

/// Fitbit token response
#[derive(Deserialize, Debug)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
    /// Fitbit's id for the resource owner
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    /// Converts to a credential, computing the absolute expiry from
    /// `issued_at`. Missing fields fall back to `previous` (refresh responses
    /// may omit the subject id).
    pub(crate) fn into_credential(
        self,
        issued_at: DateTime<Utc>,
        previous: Option<&Credential>,
    ) -> Result<Credential, OAuthError> {
        let refresh_token = self
            .refresh_token
            .or_else(|| previous.map(|c| c.refresh_token.clone()))
            .ok_or_else(|| OAuthError::InvalidResponse("missing refresh_token".to_string()))?;
        let provider_subject_id = self
            .user_id
            .or_else(|| previous.map(|c| c.provider_subject_id.clone()))
            .ok_or_else(|| OAuthError::InvalidResponse("missing user_id".to_string()))?;

        let expires_at = Duration::try_seconds(self.expires_in)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| OAuthError::InvalidResponse("expires_in out of range".to_string()))?;

        Ok(Credential {
            access_token: self.access_token,
            refresh_token,
            expires_at,
            provider_subject_id,
        })
    }
}

/// POSTs a grant to the token endpoint with HTTP Basic client authentication.
pub(crate) async fn request_token(
    http: &Client,
    config: &OAuthProviderConfig,
    grant: Grant<'_>,
) -> Result<TokenResponse, OAuthError> {
    let mut form: Vec<(&str, &str)> = vec![
        ("grant_type", grant.name()),
        ("client_id", config.client_id.as_str()),
    ];
    match &grant {
        Grant::AuthorizationCode { code } => {
            form.push(("code", *code));
            form.push(("redirect_uri", config.redirect_uri.as_str()));
        }
        Grant::RefreshToken { refresh_token } => {
            form.push(("refresh_token", *refresh_token));
        }
    }

    tracing::debug!(grant = grant.name(), "Requesting token from {}", config.token_url);

    let response = http
        .post(&config.token_url)
        .basic_auth(&config.client_id, Some(&config.client_secret))
        .header("Accept", "application/json")
        .form(&form)
        .send()
        .await
        .map_err(|source| OAuthError::Http {
            url: config.token_url.clone(),
            source,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(OAuthError::Rejected {
            status: status.as_u16(),
            body,
        });
    }

    let token_response: TokenResponse = response
        .json()
        .await
        .map_err(|e| OAuthError::InvalidResponse(e.to_string()))?;

    tracing::debug!(
        grant = grant.name(),
        has_refresh_token = token_response.refresh_token.is_some(),
        expires_in = token_response.expires_in,
        token_type = ?token_response.token_type,
        "Token request successful"
    );

    Ok(token_response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_deserialization() {
        let json = r#"{
            "access_token": "eyJhbGciOiJIUzI1NiJ9",
            "expires_in": 28800,
            "refresh_token": "c643a63c072f0f05478e9d18b991db80",
            "scope": "activity profile",
            "token_type": "Bearer",
            "user_id": "26FWFL"
        }"#;

        let response: TokenResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.access_token, "eyJhbGciOiJIUzI1NiJ9");
        assert_eq!(response.expires_in, 28800);
        assert_eq!(response.user_id.as_deref(), Some("26FWFL"));
        assert_eq!(response.token_type.as_deref(), Some("Bearer"));
    }

    #[test]
    fn test_into_credential_computes_expiry() {
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token": "A", "refresh_token": "R", "expires_in": 3600, "user_id": "U"}"#,
        )
        .unwrap();
        let issued_at = Utc::now();

        let credential = response.into_credential(issued_at, None).unwrap();
        assert_eq!(credential.access_token, "A");
        assert_eq!(credential.refresh_token, "R");
        assert_eq!(credential.provider_subject_id, "U");
        assert_eq!(credential.expires_at, issued_at + Duration::seconds(3600));
    }

    #[test]
    fn test_into_credential_rejects_out_of_range_expiry() {
        for expires_in in [i64::MAX, i64::MIN, 9_000_000_000_000_000] {
            let response: TokenResponse = serde_json::from_str(&format!(
                r#"{{"access_token": "A", "refresh_token": "R", "expires_in": {expires_in}, "user_id": "U"}}"#
            ))
            .unwrap();

            let err = response.into_credential(Utc::now(), None).unwrap_err();
            assert!(
                matches!(&err, OAuthError::InvalidResponse(msg) if msg.contains("expires_in")),
                "unexpected error for {expires_in}: {err}"
            );
        }
    }

    #[test]
    fn test_refresh_keeps_previous_subject() {
        let previous = Credential {
            access_token: "A1".to_string(),
            refresh_token: "R1".to_string(),
            expires_at: Utc::now(),
            provider_subject_id: "26FWFL".to_string(),
        };
        let response: TokenResponse = serde_json::from_str(
            r#"{"access_token": "A2", "refresh_token": "R2", "expires_in": 3600}"#,
        )
        .unwrap();

        let credential = response
            .into_credential(Utc::now(), Some(&previous))
            .unwrap();
        assert_eq!(credential.access_token, "A2");
        assert_eq!(credential.refresh_token, "R2");
        assert_eq!(credential.provider_subject_id, "26FWFL");
    }

    #[test]
    fn test_code_exchange_requires_refresh_token() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token": "A", "expires_in": 3600, "user_id": "U"}"#)
                .unwrap();

        let err = response.into_credential(Utc::now(), None).unwrap_err();
        assert!(matches!(err, OAuthError::InvalidResponse(_)));
    }
}
