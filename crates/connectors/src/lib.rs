//! PostgreSQL connectors: wire-protocol plumbing (`postgres`) and the
//! logical-replication source connector (`replication`).

pub mod error;
pub mod postgres;
pub mod replication;

pub use error::{ConnectorError, Result};
pub use postgres::PgConnector;
