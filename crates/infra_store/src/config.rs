//! Store connection configuration

use std::time::Duration;

use crate::error::StoreError;

/// Configuration for the Web API client
///
/// # Example
///
/// ```rust
/// use infra_store::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::new("https://org.crm.dynamics.com")
///     .api_version("v9.2")
///     .request_timeout(Duration::from_secs(60));
/// assert_eq!(config.api_base(), "https://org.crm.dynamics.com/api/data/v9.2");
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Organization URL, without the `/api/data` suffix
    pub base_url: String,
    /// Web API version segment
    pub api_version: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl StoreConfig {
    /// Creates a configuration with default API version and timeout
    ///
    /// # Arguments
    ///
    /// * `base_url` - Organization URL (e.g., "https://org.crm.dynamics.com")
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: "v9.1".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the Web API version (default: v9.1)
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Sets the per-request timeout (default: 30s)
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Root of the Web API, e.g. `https://org.crm.dynamics.com/api/data/v9.1`
    pub fn api_base(&self) -> String {
        format!("{}/api/data/{}", self.base_url.trim_end_matches('/'), self.api_version)
    }

    /// Checks that the base URL is usable
    pub fn validate(&self) -> Result<(), StoreError> {
        let url = self.base_url.trim();
        if url.is_empty() {
            return Err(StoreError::configuration("store base URL is empty"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(StoreError::configuration(format!(
                "store base URL must start with http:// or https://, got '{}'",
                url
            )));
        }
        Ok(())
    }
}

/// OAuth2 client-credentials settings
#[derive(Clone)]
pub struct AuthConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    /// Identity provider root; the token endpoint is
    /// `<authority>/<tenant>/oauth2/v2.0/token`
    pub authority: String,
    /// Requested scope, `<base url>/.default` by default
    pub scope: String,
    /// Tokens are refreshed this long before they expire
    pub expiry_margin: Duration,
}

impl AuthConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        base_url: &str,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authority: "https://login.microsoftonline.com".to_string(),
            scope: format!("{}/.default", base_url.trim_end_matches('/')),
            expiry_margin: Duration::from_secs(5),
        }
    }

    /// Overrides the identity provider root
    pub fn authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }

    pub fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority.trim_end_matches('/'),
            self.tenant_id
        )
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        for (name, value) in [
            ("tenant id", &self.tenant_id),
            ("client id", &self.client_id),
            ("client secret", &self.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(StoreError::configuration(format!("{} is not set", name)));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("authority", &self.authority)
            .field("scope", &self.scope)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_trims_trailing_slash() {
        let config = StoreConfig::new("https://org.example.com/");
        assert_eq!(config.api_base(), "https://org.example.com/api/data/v9.1");
    }

    #[test]
    fn test_validate_rejects_missing_scheme() {
        assert!(StoreConfig::new("org.example.com").validate().is_err());
        assert!(StoreConfig::new("").validate().is_err());
        assert!(StoreConfig::new("http://localhost:8080").validate().is_ok());
    }

    #[test]
    fn test_auth_scope_and_token_url() {
        let auth = AuthConfig::new("tenant-1", "client", "secret", "https://org.example.com/");
        assert_eq!(auth.scope, "https://org.example.com/.default");
        assert_eq!(
            auth.token_url(),
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_auth_debug_redacts_secret() {
        let auth = AuthConfig::new("t", "c", "super-secret", "https://org");
        assert!(!format!("{:?}", auth).contains("super-secret"));
    }

    #[test]
    fn test_auth_validate_requires_credentials() {
        let auth = AuthConfig::new("t", "", "s", "https://org");
        assert!(auth.validate().is_err());
    }
}
