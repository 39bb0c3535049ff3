//! Access token providers

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::AuthConfig;
use crate::error::StoreError;

/// Source of bearer tokens for the Web API
#[async_trait]
pub trait TokenProvider: Send + Sync + 'static {
    /// Returns a token valid for at least the provider's expiry margin
    async fn access_token(&self) -> Result<String, StoreError>;

    /// Drops any cached token so the next call fetches a fresh one
    async fn invalidate(&self) {}
}

/// A fixed, pre-issued token
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, StoreError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_expired(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

/// OAuth2 client-credentials provider with an in-memory cache
#[derive(Debug)]
pub struct ClientCredentialsTokenProvider {
    config: AuthConfig,
    http_client: reqwest::Client,
    cached: RwLock<Option<CachedToken>>,
}

impl ClientCredentialsTokenProvider {
    pub fn new(config: AuthConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            config,
            http_client,
            cached: RwLock::new(None),
        })
    }

    fn margin(&self) -> Duration {
        Duration::from_std(self.config.expiry_margin).unwrap_or_else(|_| Duration::seconds(5))
    }

    #[instrument(skip(self), fields(tenant_id = %self.config.tenant_id))]
    async fn acquire(&self) -> Result<CachedToken, StoreError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("scope", self.config.scope.as_str()),
        ];

        let response = self
            .http_client
            .post(self.config.token_url())
            .form(&params)
            .send()
            .await
            .map_err(|e| StoreError::token(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::token(format!(
                "token request failed with status {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StoreError::token(format!("invalid token response: {}", e)))?;

        let expires_at = Utc::now() + Duration::seconds(token.expires_in);
        debug!(expires_at = %expires_at, "Acquired access token");

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at,
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsTokenProvider {
    async fn access_token(&self) -> Result<String, StoreError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired(self.margin()) {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let fresh = self.acquire().await?;
        let access_token = fresh.access_token.clone();
        *self.cached.write().await = Some(fresh);
        Ok(access_token)
    }

    async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
