//! Application configuration
//!
//! Read from `RECON_`-prefixed environment variables (after `.env` has been
//! loaded by the binary). Command-line flags override these values.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use app_migration::context::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_ROLLBACK_CONCURRENCY};
use app_migration::retry::DEFAULT_MAX_ATTEMPTS;
use app_migration::{MigrationSettings, RetryPolicy};
use domain_reconciliation::{EnginePolicy, ExcessSource, StatsPolicy, TieBreak};
use infra_store::{AuthConfig, StoreConfig};

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Tool configuration
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// Organization URL of the record store
    pub store_url: Option<String>,
    pub api_version: String,
    pub request_timeout_secs: u64,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub authority: Option<String>,
    /// Pre-issued bearer token; skips the client credentials flow
    pub access_token: Option<String>,
    pub reports_dir: PathBuf,
    pub batch_size: usize,
    pub concurrency: usize,
    pub rollback_concurrency: usize,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub tie_break: String,
    pub excess_source: String,
    pub stats: String,
    pub log_level: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("store_url", &self.store_url)
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("reports_dir", &self.reports_dir)
            .field("batch_size", &self.batch_size)
            .field("concurrency", &self.concurrency)
            .field("log_level", &self.log_level)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, AppConfigError> {
        Self::build(None)
    }

    /// Loads configuration from an explicit variable map
    pub fn from_map(vars: HashMap<String, String>) -> Result<Self, AppConfigError> {
        Self::build(Some(vars))
    }

    fn build(vars: Option<HashMap<String, String>>) -> Result<Self, AppConfigError> {
        let config = config::Config::builder()
            .set_default("api_version", "v9.1")?
            .set_default("request_timeout_secs", 30)?
            .set_default("reports_dir", "reports")?
            .set_default("batch_size", DEFAULT_BATCH_SIZE as u64)?
            .set_default("concurrency", DEFAULT_CONCURRENCY as u64)?
            .set_default("rollback_concurrency", DEFAULT_ROLLBACK_CONCURRENCY as u64)?
            .set_default("max_attempts", DEFAULT_MAX_ATTEMPTS as u64)?
            .set_default("retry_base_ms", 500)?
            .set_default("tie_break", "earliest")?
            .set_default("excess_source", "claim")?
            .set_default("stats", "violations")?
            .set_default("log_level", "info")?
            .add_source(config::Environment::with_prefix("RECON").source(vars))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Migration settings before command-line overrides
    pub fn settings(&self) -> Result<MigrationSettings, AppConfigError> {
        let engine = EnginePolicy::default()
            .with_tie_break(parse_policy::<TieBreak>("tie_break", &self.tie_break)?)
            .with_excess_source(parse_policy::<ExcessSource>("excess_source", &self.excess_source)?);

        Ok(MigrationSettings::default()
            .with_reports_dir(self.reports_dir.clone())
            .with_batch_size(self.batch_size)
            .with_concurrency(self.concurrency)
            .with_rollback_concurrency(self.rollback_concurrency)
            .with_retry(RetryPolicy::new(
                self.max_attempts,
                Duration::from_millis(self.retry_base_ms),
            ))
            .with_engine(engine)
            .with_stats(parse_policy::<StatsPolicy>("stats", &self.stats)?))
    }

    pub fn store_config(&self) -> Result<StoreConfig, AppConfigError> {
        let url = self.store_url.as_deref().ok_or(AppConfigError::Missing("RECON_STORE_URL"))?;
        Ok(StoreConfig::new(url)
            .api_version(self.api_version.clone())
            .request_timeout(Duration::from_secs(self.request_timeout_secs)))
    }

    pub fn auth_config(&self) -> Result<AuthConfig, AppConfigError> {
        let url = self.store_url.as_deref().ok_or(AppConfigError::Missing("RECON_STORE_URL"))?;
        let tenant = self.tenant_id.clone().ok_or(AppConfigError::Missing("RECON_TENANT_ID"))?;
        let client = self.client_id.clone().ok_or(AppConfigError::Missing("RECON_CLIENT_ID"))?;
        let secret = self
            .client_secret
            .clone()
            .ok_or(AppConfigError::Missing("RECON_CLIENT_SECRET"))?;

        let auth = AuthConfig::new(tenant, client, secret, url);
        Ok(match &self.authority {
            Some(authority) => auth.authority(authority.clone()),
            None => auth,
        })
    }
}

fn parse_policy<T>(name: &'static str, value: &str) -> Result<T, AppConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| AppConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}
