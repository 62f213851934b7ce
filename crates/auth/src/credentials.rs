//! Secure API credential management.
//!
//! Secrets are wrapped in `SecretString` so they never reach Debug output and
//! are zeroed on drop.

use crate::error::AuthError;
use secrecy::{ExposeSecret, SecretString};

/// API credentials for a venue's authenticated REST and websocket paths.
#[derive(Clone)]
pub struct ApiCredentials {
    api_key: String,
    api_secret: SecretString,
    passphrase: Option<SecretString>,
}

impl ApiCredentials {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret: SecretString::from(api_secret),
            passphrase: None,
        }
    }

    /// Credentials for venues that also require a passphrase (Bitget).
    pub fn with_passphrase(api_key: String, api_secret: String, passphrase: String) -> Self {
        Self {
            api_key,
            api_secret: SecretString::from(api_secret),
            passphrase: Some(SecretString::from(passphrase)),
        }
    }

    /// Load credentials from `{PREFIX}_API_KEY`, `{PREFIX}_API_SECRET` and
    /// optionally `{PREFIX}_PASSPHRASE`.
    pub fn from_env(prefix: &str) -> Result<Self, AuthError> {
        dotenvy::dotenv().ok();

        let var = |suffix: &str| -> Result<String, AuthError> {
            let name = format!("{prefix}_{suffix}");
            std::env::var(&name).map_err(|_| AuthError::MissingEnvVar(name))
        };

        let api_key = var("API_KEY")?;
        let api_secret = var("API_SECRET")?;
        let passphrase = std::env::var(format!("{prefix}_PASSPHRASE")).ok();

        let mut creds = Self::new(api_key, api_secret);
        creds.passphrase = passphrase.map(SecretString::from);
        Ok(creds)
    }

    /// The API key (public, safe to log).
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Expose the secret for signing. Never log the return value.
    pub fn expose_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }

    /// Expose the passphrase, when configured.
    pub fn expose_passphrase(&self) -> Option<&str> {
        self.passphrase.as_ref().map(|p| p.expose_secret().as_str())
    }
}

impl std::fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
