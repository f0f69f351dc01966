//! SQL AST construction and dialect-aware rendering for the connectors that
//! read from and write to Postgres.

pub mod query;

pub use query::{ident, value};
