use thiserror::Error;

/// Errors surfaced by the catalog store.
///
/// `retryable` callers (the CDC loop, control plane) classify these the same
/// way activities classify connector errors: connection loss is transient,
/// everything else is a programming or data error.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog connection error: {0}")]
    Connection(#[from] tokio_postgres::Error),

    #[error("catalog connection lost and could not be re-established after {attempts} attempts")]
    ReconnectFailed { attempts: usize },

    #[error("mirror not found: {0}")]
    MirrorNotFound(String),

    #[error("peer not found: {0}")]
    PeerNotFound(String),

    #[error("peer {0} is referenced by at least one mirror and cannot be deleted")]
    PeerInUse(String),

    #[error("invalid catalog row for {entity}: {reason}")]
    InvalidRow { entity: &'static str, reason: String },

    #[error("tls error: {0}")]
    Tls(#[from] native_tls::Error),
}

impl CatalogError {
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::Connection(_) | CatalogError::ReconnectFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
