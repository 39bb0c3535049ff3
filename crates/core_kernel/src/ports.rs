//! Ports for the remote record store
//!
//! The reconciliation core never talks to the store directly. It sees two
//! narrow ports:
//!
//! ```text
//! ┌────────────────────────┐        ┌────────────────────────┐
//! │    RecordFetchPort     │        │    RecordWritePort     │
//! │ fetch(query, pageSize) │        │ get(resource, select)  │
//! │  (transparent paging)  │        │ patch(resource, body)  │
//! └────────────────────────┘        └────────────────────────┘
//!              ▲                                 ▲
//!              └──────────── adapters ───────────┘
//!          (HTTP Web API adapter, in-memory mocks)
//! ```
//!
//! Rows cross the port as loosely-typed JSON maps; the domain layer projects
//! them into typed entities immediately after fetch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// One record as returned by the store, addressed by attribute name
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Error type for port operations
///
/// Adapters map every remote failure onto one of these variants so that
/// retry classification is decided in exactly one place.
#[derive(Debug, Error)]
pub enum PortError {
    /// The requested record was not found (HTTP 404)
    #[error("Not found: {entity_type} with id {id}")]
    NotFound {
        entity_type: String,
        id: String,
    },

    /// The request was invalid before it reached the store
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Authentication or authorization failed (HTTP 401/403)
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
    },

    /// The store rejected the request with a client error other than 429
    #[error("Rejected with status {status}: {message}")]
    Rejected {
        status: u16,
        message: String,
    },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limited{}", retry_after_ms.map(|ms| format!(": retry after {ms}ms")).unwrap_or_default())]
    RateLimited {
        retry_after_ms: Option<u64>,
    },

    /// The store answered with a server error (HTTP 5xx)
    #[error("Service unavailable: {service}")]
    ServiceUnavailable {
        service: String,
        status: Option<u16>,
    },

    /// Connection to the store failed
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The operation timed out
    #[error("Timeout after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
    },

    /// A row could not be mapped into a typed entity
    #[error("Transformation error: {message}")]
    Transformation {
        message: String,
    },

    /// An internal error occurred
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    /// Creates a NotFound error
    pub fn not_found(entity_type: impl Into<String>, id: impl fmt::Display) -> Self {
        PortError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Creates a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Creates a Connection error
    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a Transformation error
    pub fn transformation(message: impl Into<String>) -> Self {
        PortError::Transformation {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Maps an HTTP error status onto the matching variant
    ///
    /// # Arguments
    ///
    /// * `status` - HTTP status code of the failed response
    /// * `resource` - Path or name of the resource that was addressed
    /// * `message` - Response body or reason phrase
    /// * `retry_after` - Parsed `Retry-After` header, if any
    pub fn from_status(
        status: u16,
        resource: &str,
        message: impl Into<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        let message = message.into();
        match status {
            404 => PortError::not_found("record", resource),
            401 | 403 => PortError::Unauthorized { message },
            429 => PortError::RateLimited {
                retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
            },
            400..=499 => PortError::Rejected { status, message },
            _ => PortError::ServiceUnavailable {
                service: if message.is_empty() { resource.to_string() } else { message },
                status: Some(status),
            },
        }
    }

    /// Returns the HTTP status this error corresponds to, when known
    pub fn status(&self) -> Option<u16> {
        match self {
            PortError::NotFound { .. } => Some(404),
            PortError::Rejected { status, .. } => Some(*status),
            PortError::RateLimited { .. } => Some(429),
            PortError::ServiceUnavailable { status, .. } => *status,
            _ => None,
        }
    }

    /// Returns the delay the remote asked for before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            PortError::RateLimited { retry_after_ms: Some(ms) } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }

    /// Returns true if a retry could succeed
    ///
    /// Client errors (4xx other than 429) and local validation or
    /// transformation failures can never succeed on retry. Everything else,
    /// rate limiting included, is worth another attempt.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PortError::NotFound { .. }
                | PortError::Validation { .. }
                | PortError::Unauthorized { .. }
                | PortError::Rejected { .. }
                | PortError::Transformation { .. }
        )
    }

    /// Returns true if this error indicates the record was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker trait for all ports
///
/// All port traits extend this marker so they can be shared across tokio
/// tasks behind an `Arc`.
pub trait DomainPort: Send + Sync + 'static {}

/// Condition operator supported by [`RecordQuery`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionOperator {
    Eq,
    In,
    Gt,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Eq => "eq",
            ConditionOperator::In => "in",
            ConditionOperator::Gt => "gt",
        }
    }
}

/// A single attribute filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub attribute: String,
    pub operator: ConditionOperator,
    pub values: Vec<String>,
}

impl Condition {
    pub fn eq(attribute: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            attribute: attribute.into(),
            operator: ConditionOperator::Eq,
            values: vec![value.to_string()],
        }
    }

    pub fn is_in<I, V>(attribute: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: fmt::Display,
    {
        Self {
            attribute: attribute.into(),
            operator: ConditionOperator::In,
            values: values.into_iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn gt(attribute: impl Into<String>, value: impl fmt::Display) -> Self {
        Self {
            attribute: attribute.into(),
            operator: ConditionOperator::Gt,
            values: vec![value.to_string()],
        }
    }
}

/// Sort order on one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub attribute: String,
    pub descending: bool,
}

/// A joined child or parent entity
///
/// Attributes of a link come back prefixed with `<alias>.`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntity {
    pub name: String,
    pub from: String,
    pub to: String,
    pub alias: String,
    pub inner: bool,
    pub attributes: Vec<String>,
    pub conditions: Vec<Condition>,
    pub links: Vec<LinkEntity>,
}

impl LinkEntity {
    /// Creates an inner join `name.from = parent.to`
    pub fn inner(
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            alias: alias.into(),
            inner: true,
            attributes: Vec::new(),
            conditions: Vec::new(),
            links: Vec::new(),
        }
    }

    /// Creates an outer join
    pub fn outer(
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        Self {
            inner: false,
            ..Self::inner(name, from, to, alias)
        }
    }

    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn link(mut self, link: LinkEntity) -> Self {
        self.links.push(link);
        self
    }
}

/// A structured query against one entity
///
/// Deliberately narrow: attribute selection, AND-ed conditions, joins and
/// ordering. Adapters render it into their own wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub entity: String,
    pub distinct: bool,
    pub attributes: Vec<String>,
    pub conditions: Vec<Condition>,
    pub links: Vec<LinkEntity>,
    pub orders: Vec<Order>,
}

impl RecordQuery {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            distinct: false,
            attributes: Vec::new(),
            conditions: Vec::new(),
            links: Vec::new(),
            orders: Vec::new(),
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.push(attribute.into());
        self
    }

    pub fn attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes.extend(attributes.into_iter().map(Into::into));
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn link(mut self, link: LinkEntity) -> Self {
        self.links.push(link);
        self
    }

    pub fn order_by(mut self, attribute: impl Into<String>, descending: bool) -> Self {
        self.orders.push(Order {
            attribute: attribute.into(),
            descending,
        });
        self
    }
}

/// Address of one record in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    /// Logical entity name, e.g. `smvs_claim_adjustment_detail`
    pub entity: String,
    pub id: Uuid,
}

impl ResourceRef {
    pub fn new(entity: impl Into<String>, id: impl Into<Uuid>) -> Self {
        Self {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.entity, self.id)
    }
}

/// Paginated read access to the store
#[async_trait]
pub trait RecordFetchPort: DomainPort {
    /// Runs `query`, following pages of `page_size` rows until a page comes
    /// back short, and returns every row.
    async fn fetch(&self, query: &RecordQuery, page_size: u32) -> Result<Vec<Row>, PortError>;
}

/// Single-record read/write access to the store
#[async_trait]
pub trait RecordWritePort: DomainPort {
    /// Reads the selected fields of one record
    async fn get(&self, resource: &ResourceRef, select: &[&str]) -> Result<Row, PortError>;

    /// Updates fields of one record
    async fn patch(&self, resource: &ResourceRef, fields: Row) -> Result<(), PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_error_not_found() {
        let error = PortError::not_found("Adjustment", "123");
        assert!(error.is_not_found());
        assert!(!error.is_retryable());
        assert!(error.to_string().contains("123"));
    }

    #[test]
    fn test_status_classification() {
        assert!(!PortError::from_status(400, "x", "bad", None).is_retryable());
        assert!(!PortError::from_status(404, "x", "", None).is_retryable());
        assert!(!PortError::from_status(403, "x", "", None).is_retryable());
        assert!(PortError::from_status(429, "x", "", None).is_retryable());
        assert!(PortError::from_status(500, "x", "", None).is_retryable());
        assert!(PortError::from_status(503, "x", "", None).is_retryable());
        assert!(PortError::connection("reset").is_retryable());
    }

    #[test]
    fn test_rate_limit_retry_after() {
        let error = PortError::from_status(429, "x", "", Some(Duration::from_secs(3)));
        assert_eq!(error.status(), Some(429));
        assert_eq!(error.retry_after(), Some(Duration::from_millis(3000)));
        assert!(error.to_string().contains("3000ms"));
    }

    #[test]
    fn test_query_builder() {
        let query = RecordQuery::new("smvs_patient_remittance")
            .distinct()
            .attributes(["a", "b"])
            .condition(Condition::is_in("rank", [1, 2]))
            .order_by("a", true);

        assert!(query.distinct);
        assert_eq!(query.attributes, vec!["a", "b"]);
        assert_eq!(query.conditions[0].values, vec!["1", "2"]);
        assert!(query.orders[0].descending);
    }

    #[test]
    fn test_resource_ref_display() {
        let id = Uuid::nil();
        let resource = ResourceRef::new("smvs_claim_adjustment_detail", id);
        assert_eq!(
            resource.to_string(),
            format!("smvs_claim_adjustment_detail({})", id)
        );
    }
}
