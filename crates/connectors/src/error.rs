use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid connection string: {0}")]
    InvalidUrl(String),

    #[error("TLS configuration error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("unsupported column type '{0}' on {1}.{2}")]
    UnsupportedType(String, String, String),

    #[error("replication protocol error: {0}")]
    Protocol(String),

    #[error("replication slot '{0}' already exists with an incompatible output plugin")]
    SlotConflict(String),
}

impl ConnectorError {
    /// Connection-level failures are safe to retry with backoff; protocol
    /// and schema mismatches require operator intervention.
    pub fn retryable(&self) -> bool {
        matches!(self, ConnectorError::Postgres(_) | ConnectorError::Tls(_))
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;
