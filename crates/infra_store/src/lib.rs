//! Record Store Infrastructure Layer
//!
//! This crate connects the reconciliation domain to a Dataverse-style Web
//! API.
//!
//! # Architecture
//!
//! ```text
//! DataverseClaimSource / DataverseAdjustmentStore   (domain ports)
//!            │ typed projection
//!            ▼
//! RecordFetchPort / RecordWritePort                  (core ports)
//!            │
//!            ▼
//! DataverseClient ── FetchXML paging, GET/PATCH, status mapping
//!            │
//!            ▼
//! TokenProvider ── OAuth2 client credentials, cached
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_store::{StoreConfig, AuthConfig, ClientCredentialsTokenProvider, DataverseClient};
//!
//! let auth = ClientCredentialsTokenProvider::new(AuthConfig::new(tenant, client_id, secret, &base_url))?;
//! let client = Arc::new(DataverseClient::new(StoreConfig::new(base_url), Arc::new(auth))?);
//! let claims = DataverseClaimSource::new(client.clone());
//! ```

pub mod config;
pub mod error;
pub mod auth;
pub mod fetchxml;
pub mod client;
pub mod schema;
pub mod projection;
pub mod repository;

pub use config::{AuthConfig, StoreConfig};
pub use error::StoreError;
pub use auth::{ClientCredentialsTokenProvider, StaticTokenProvider, TokenProvider};
pub use client::DataverseClient;
pub use repository::{DataverseAdjustmentStore, DataverseClaimSource};
