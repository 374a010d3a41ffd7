//! OAuth provider configuration for Fitbit.

use serde::{Deserialize, Serialize};

pub const FITBIT_AUTH_URL: &str = "https://www.fitbit.com/oauth2/authorize";
pub const FITBIT_TOKEN_URL: &str = "https://api.fitbit.com/oauth2/token";
pub const FITBIT_API_BASE_URL: &str = "https://api.fitbit.com/1";
pub const FITBIT_SCOPES: &[&str] = &["activity", "profile", "settings", "social"];

/// OAuth 2.0 endpoints and client registration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OAuthProviderConfig {
    /// Authorization endpoint URL
    pub auth_url: String,

    /// Token endpoint URL (code exchange and refresh)
    pub token_url: String,

    /// Requested scopes
    pub scopes: Vec<String>,

    pub client_id: String,

    pub client_secret: String,

    /// Redirect URI registered with the provider
    pub redirect_uri: String,
}

impl OAuthProviderConfig {
    /// Fitbit endpoints and default scopes for the given client registration.
    pub fn fitbit(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            auth_url: FITBIT_AUTH_URL.to_string(),
            token_url: FITBIT_TOKEN_URL.to_string(),
            scopes: FITBIT_SCOPES.iter().map(|s| s.to_string()).collect(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
        }
    }

    /// Build authorization URL with state and the configured redirect URI
    pub fn build_auth_url(&self, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&scope={}&state={}&response_type=code",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes),
            urlencoding::encode(state)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fitbit_defaults() {
        let config = OAuthProviderConfig::fitbit("id", "secret", "http://localhost/cb");
        assert_eq!(config.auth_url, FITBIT_AUTH_URL);
        assert_eq!(config.token_url, FITBIT_TOKEN_URL);
        assert!(config.scopes.contains(&"activity".to_string()));
        assert!(config.scopes.contains(&"profile".to_string()));
    }

    #[test]
    fn test_build_auth_url() {
        let config = OAuthProviderConfig {
            auth_url: "https://example.com/oauth2/authorize".to_string(),
            token_url: "https://example.com/oauth2/token".to_string(),
            scopes: vec!["activity".to_string(), "profile".to_string()],
            client_id: "228XYZ".to_string(),
            client_secret: "secret".to_string(),
            redirect_uri: "http://localhost:3000/fitbit/authorize".to_string(),
        };

        let url = config.build_auth_url("random_state");

        assert!(url.starts_with("https://example.com/oauth2/authorize?"));
        assert!(url.contains("client_id=228XYZ"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Ffitbit%2Fauthorize"));
        assert!(url.contains("scope=activity%20profile"));
        assert!(url.contains("state=random_state"));
        assert!(url.contains("response_type=code"));
        assert!(!url.contains("secret"));
    }
}
