//! crates/portal_core/src/ports.rs
//!
//! Defines the service contracts (traits) the portal client depends on.
//! The core never talks HTTP or touches the filesystem itself; adapters in the
//! service crate implement these ports.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::{Credentials, Document, LoginGrant, VoucherStatusReport};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized(Option<String>),
    #[error("Access forbidden")]
    Forbidden(Option<String>),
    #[error("Backend responded with status {status}")]
    Rejected { status: u16, message: Option<String> },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Validation(String),
    #[error("Session storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl PortError {
    /// The `message` field the backend attached to an error response, if any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            PortError::Unauthorized(message)
            | PortError::Forbidden(message)
            | PortError::Rejected { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable string key-value storage for the client session.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    async fn remove(&self, key: &str) -> PortResult<()>;
}

/// The e-learning backend, as seen by the client.
#[async_trait]
pub trait PortalApi: Send + Sync {
    // --- Auth ---
    async fn login(&self, credentials: &Credentials) -> PortResult<LoginGrant>;

    // --- Documents ---
    async fn list_documents(&self) -> PortResult<Vec<Document>>;

    /// Downloads the raw bytes of a document by its stored filename.
    async fn download_document(&self, filename: &str) -> PortResult<Bytes>;

    // --- Vouchers ---
    async fn voucher_status(&self, email: &str) -> PortResult<VoucherStatusReport>;

    /// Submits a code and returns the backend's `verified` flag.
    async fn submit_voucher(&self, email: &str, code: &str) -> PortResult<bool>;
}
