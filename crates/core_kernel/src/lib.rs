//! Core Kernel - Foundational types shared by every reconciliation crate
//!
//! This crate provides the fundamental building blocks used across the workspace:
//! - Exact decimal amounts
//! - Strongly-typed record identifiers
//! - Ports to the remote record store and their error classification

pub mod money;
pub mod identifiers;
pub mod error;
pub mod ports;

pub use money::{Amount, MoneyError, FILE_DECIMAL_PLACES};
pub use identifiers::{AdjustmentId, BatchId, ClaimId, RemittanceId};
pub use error::CoreError;
pub use ports::{
    Condition, ConditionOperator, DomainPort, LinkEntity, Order, PortError, RecordFetchPort,
    RecordQuery, RecordWritePort, ResourceRef, Row,
};
