//! Error taxonomy shared by the sink writer, schema propagator and snapshot
//! engine: every activity converts its raw error into a `(kind, message,
//! retryable)` tuple before the workflow layer sees it.

use connectors::ConnectorError;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection drop, lock timeout, serialization failure.
    TransientIo,
    /// Slot not found or WAL recycled past the slot's restart LSN.
    SlotLost,
    /// Destination type narrower than source, or a column missing after DDL.
    SchemaIncompatible,
    /// A recreated FK failed `VALIDATE CONSTRAINT`.
    ForeignKeyValidation,
    /// An invariant the engine relies on did not hold.
    InvariantViolation,
}

impl ErrorKind {
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::TransientIo)
    }
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct EngineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn retryable(&self) -> bool {
        self.kind.retryable()
    }

    pub fn slot_lost(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SlotLost, message)
    }

    pub fn schema_incompatible(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SchemaIncompatible, message)
    }

    pub fn fk_validation(constraint: &str, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ForeignKeyValidation, format!("{constraint}: {}", message.into()))
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvariantViolation, message)
    }
}

impl From<ConnectorError> for EngineError {
    fn from(err: ConnectorError) -> Self {
        let kind = if err.retryable() { ErrorKind::TransientIo } else { ErrorKind::InvariantViolation };
        Self::new(kind, err.to_string())
    }
}

impl From<catalog::CatalogError> for EngineError {
    fn from(err: catalog::CatalogError) -> Self {
        let kind = if err.retryable() { ErrorKind::TransientIo } else { ErrorKind::InvariantViolation };
        Self::new(kind, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
