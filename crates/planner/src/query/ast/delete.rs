//! Defines the AST for a DELETE statement.

use crate::query::ast::{common::TableRef, expr::Expr};

#[derive(Debug, Clone)]
pub struct Delete {
    pub table: TableRef,
    pub where_clause: Option<Expr>,
}
