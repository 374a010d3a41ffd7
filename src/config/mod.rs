use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::oauth::{
    OAuthProviderConfig, FITBIT_API_BASE_URL, FITBIT_AUTH_URL, FITBIT_SCOPES, FITBIT_TOKEN_URL,
};
use crate::session::UnitSystem;

pub const ENCRYPTION_KEY_ENV: &str = "FITSYNC_ENCRYPTION_KEY";

/// Complete fitsync configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FitsyncConfig {
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Fitbit application registration
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_redirect_uri() -> String {
    "http://localhost:8080/fitbit/authorize".to_string()
}

fn default_auth_url() -> String {
    FITBIT_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    FITBIT_TOKEN_URL.to_string()
}

fn default_scopes() -> Vec<String> {
    FITBIT_SCOPES.iter().map(|s| s.to_string()).collect()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: default_redirect_uri(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            scopes: default_scopes(),
        }
    }
}

/// Resource API settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// `""` (metric), `"en_US"` or `"en_GB"`
    #[serde(default)]
    pub unit_system: UnitSystem,
}

fn default_base_url() -> String {
    FITBIT_API_BASE_URL.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            unit_system: UnitSystem::default(),
        }
    }
}

/// Credential database location
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database")]
    pub database: String,
}

fn default_database() -> String {
    "fitsync.db".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

impl FitsyncConfig {
    /// Defaults overridden by environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Overrides fields from `FITSYNC_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("FITSYNC_CLIENT_ID") {
            self.oauth.client_id = v;
        }
        if let Ok(v) = std::env::var("FITSYNC_CLIENT_SECRET") {
            self.oauth.client_secret = v;
        }
        if let Ok(v) = std::env::var("FITSYNC_REDIRECT_URI") {
            self.oauth.redirect_uri = v;
        }
        if let Ok(v) = std::env::var("FITSYNC_API_BASE_URL") {
            self.api.base_url = v;
        }
        if let Ok(v) = std::env::var("FITSYNC_UNIT_SYSTEM") {
            self.api.unit_system = v.parse().context("Invalid FITSYNC_UNIT_SYSTEM")?;
        }
        if let Ok(v) = std::env::var("FITSYNC_DATABASE") {
            self.storage.database = v;
        }
        Ok(())
    }

    /// Provider config; fails if the client registration is missing.
    pub fn provider_config(&self) -> Result<OAuthProviderConfig> {
        if self.oauth.client_id.is_empty() || self.oauth.client_secret.is_empty() {
            return Err(anyhow!(
                "Fitbit client registration missing. Set [oauth] client_id/client_secret or FITSYNC_CLIENT_ID and FITSYNC_CLIENT_SECRET."
            ));
        }
        Ok(OAuthProviderConfig {
            auth_url: self.oauth.auth_url.clone(),
            token_url: self.oauth.token_url.clone(),
            scopes: self.oauth.scopes.clone(),
            client_id: self.oauth.client_id.clone(),
            client_secret: self.oauth.client_secret.clone(),
            redirect_uri: self.oauth.redirect_uri.clone(),
        })
    }
}

/// Load configuration from a TOML file, then apply environment overrides.
pub fn load_config(path: &str) -> Result<FitsyncConfig> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config {path}"))?;
    let mut config: FitsyncConfig =
        toml::from_str(&contents).with_context(|| format!("Failed to parse config {path}"))?;
    config.apply_env()?;
    Ok(config)
}

/// The master key is never read from the config file.
pub fn encryption_key_from_env() -> Result<String> {
    std::env::var(ENCRYPTION_KEY_ENV)
        .with_context(|| format!("{ENCRYPTION_KEY_ENV} is required (base64-encoded 32-byte key)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env-mutating tests share the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "FITSYNC_CLIENT_ID",
        "FITSYNC_CLIENT_SECRET",
        "FITSYNC_REDIRECT_URI",
        "FITSYNC_API_BASE_URL",
        "FITSYNC_UNIT_SYSTEM",
        "FITSYNC_DATABASE",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_default_config() {
        let config = FitsyncConfig::default();
        assert_eq!(config.oauth.token_url, FITBIT_TOKEN_URL);
        assert_eq!(config.api.base_url, "https://api.fitbit.com/1");
        assert_eq!(config.api.unit_system, UnitSystem::Metric);
        assert_eq!(config.storage.database, "fitsync.db");
        assert!(config.oauth.scopes.contains(&"activity".to_string()));
    }

    #[test]
    fn test_config_deserialization() {
        let toml = r#"
            [oauth]
            client_id = "228XYZ"
            client_secret = "s3cret"
            redirect_uri = "https://cms.example.com/fitbit/authorize"
            scopes = ["activity", "profile"]

            [api]
            unit_system = "en_GB"

            [storage]
            database = "/var/lib/fitsync/tokens.db"
        "#;

        let config: FitsyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.oauth.client_id, "228XYZ");
        assert_eq!(config.oauth.scopes, vec!["activity", "profile"]);
        assert_eq!(config.oauth.auth_url, FITBIT_AUTH_URL);
        assert_eq!(config.api.unit_system, UnitSystem::UnitedKingdom);
        assert_eq!(config.storage.database, "/var/lib/fitsync/tokens.db");
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
            [api]
            base_url = "http://localhost:9999/1"
        "#;

        let config: FitsyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:9999/1");
        assert_eq!(config.api.unit_system, UnitSystem::Metric);
        assert_eq!(config.storage.database, "fitsync.db");
    }

    #[test]
    fn test_invalid_unit_system_rejected() {
        let toml = r#"
            [api]
            unit_system = "imperial"
        "#;
        assert!(toml::from_str::<FitsyncConfig>(toml).is_err());
    }

    #[test]
    fn test_provider_config_requires_client() {
        let config = FitsyncConfig::default();
        assert!(config.provider_config().is_err());

        let mut config = FitsyncConfig::default();
        config.oauth.client_id = "id".to_string();
        config.oauth.client_secret = "secret".to_string();
        let provider = config.provider_config().unwrap();
        assert_eq!(provider.client_id, "id");
        assert_eq!(provider.redirect_uri, default_redirect_uri());
    }

    #[test]
    fn test_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("FITSYNC_CLIENT_ID", "env_id");
        std::env::set_var("FITSYNC_CLIENT_SECRET", "env_secret");
        std::env::set_var("FITSYNC_UNIT_SYSTEM", "en_US");
        std::env::set_var("FITSYNC_DATABASE", ":memory:");

        let config = FitsyncConfig::from_env().unwrap();
        assert_eq!(config.oauth.client_id, "env_id");
        assert_eq!(config.oauth.client_secret, "env_secret");
        assert_eq!(config.api.unit_system, UnitSystem::UnitedStates);
        assert_eq!(config.storage.database, ":memory:");

        clear_env();
    }

    #[test]
    fn test_invalid_env_unit_system() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("FITSYNC_UNIT_SYSTEM", "fr_FR");

        let err = FitsyncConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("FITSYNC_UNIT_SYSTEM"));

        clear_env();
    }

    #[test]
    fn test_load_config_from_file() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fitsync.toml");
        std::fs::write(&path, "[oauth]\nclient_id = \"file_id\"\n").unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.oauth.client_id, "file_id");

        assert!(load_config("/nonexistent/fitsync.toml").is_err());
    }
}
