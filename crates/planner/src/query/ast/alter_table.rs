//! Defines the AST for ALTER TABLE statements used by the schema propagator.

use crate::query::ast::{common::TableRef, create_table::TableConstraint, expr::Expr};
use model::core::data_type::DataType;

#[derive(Debug, Clone)]
pub struct AlterTable {
    pub table: TableRef,
    pub actions: Vec<AlterAction>,
}

#[derive(Debug, Clone)]
pub enum AlterAction {
    AddColumn {
        name: String,
        data_type: DataType,
        nullable: bool,
        max_length: Option<usize>,
        default: Option<Expr>,
    },
    DropColumn {
        name: String,
    },
    AlterColumnType {
        name: String,
        data_type: DataType,
        max_length: Option<usize>,
        using: Option<String>,
    },
    SetDefault {
        name: String,
        default: Expr,
    },
    DropDefault {
        name: String,
    },
    AddConstraint {
        name: Option<String>,
        constraint: TableConstraint,
    },
    DropConstraint {
        name: String,
    },
}
