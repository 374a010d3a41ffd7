use super::exchange::{request_token, Grant};
use super::{OAuthError, OAuthProvider, OAuthProviderConfig, ProviderResponse, ResourceRequest};
use crate::credentials::Credential;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;

use super::provider::FITBIT_API_BASE_URL;

const USER_AGENT: &str = concat!("fitsync/", env!("CARGO_PKG_VERSION"));

/// [`OAuthProvider`] for the Fitbit Web API over `reqwest`.
pub struct FitbitClient {
    config: OAuthProviderConfig,
    http_client: Client,
    api_base_url: String,
}

impl FitbitClient {
    /// Create a client using the default Fitbit API base URL.
    pub fn new(config: OAuthProviderConfig) -> Result<Self, OAuthError> {
        Self::with_base_url(config, FITBIT_API_BASE_URL.to_string())
    }

    /// Create a client with a custom API base URL (for testing with a mock server).
    pub fn with_base_url(
        config: OAuthProviderConfig,
        api_base_url: String,
    ) -> Result<Self, OAuthError> {
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| OAuthError::Http {
                url: api_base_url.clone(),
                source,
            })?;
        Ok(Self {
            config,
            http_client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn config(&self) -> &OAuthProviderConfig {
        &self.config
    }
}

#[async_trait]
impl OAuthProvider for FitbitClient {
    fn authorization_url(&self, state: &str) -> String {
        self.config.build_auth_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<Credential, OAuthError> {
        let issued_at = Utc::now();
        request_token(&self.http_client, &self.config, Grant::AuthorizationCode { code })
            .await?
            .into_credential(issued_at, None)
    }

    async fn refresh(&self, current: &Credential) -> Result<Credential, OAuthError> {
        let issued_at = Utc::now();
        request_token(
            &self.http_client,
            &self.config,
            Grant::RefreshToken {
                refresh_token: &current.refresh_token,
            },
        )
        .await?
        .into_credential(issued_at, Some(current))
    }

    async fn get(&self, request: ResourceRequest) -> Result<ProviderResponse, OAuthError> {
        let url = format!("{}{}", self.api_base_url, request.path);
        tracing::debug!(url = %url, "Fitbit API GET");

        let mut builder = self
            .http_client
            .get(&url)
            .bearer_auth(&request.access_token);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(lang) = &request.accept_language {
            builder = builder.header("Accept-Language", lang);
        }

        let response = builder.send().await.map_err(|source| OAuthError::Http {
            url: url.clone(),
            source,
        })?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|source| OAuthError::Http { url, source })?;

        Ok(ProviderResponse { status, body })
    }
}
