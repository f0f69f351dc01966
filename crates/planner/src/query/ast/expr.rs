//! Defines the AST for scalar expressions shared across statement types.

use model::core::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub qualifier: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryOp {
    pub left: Expr,
    pub op: BinaryOperator,
    pub right: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A bound parameter, rendered through the dialect's placeholder scheme.
    Value(Value),
    Identifier(Ident),
    /// Raw SQL inserted verbatim, e.g. `EXCLUDED."name"` or `TRUE`.
    Literal(String),
    BinaryOp(Box<BinaryOp>),
    FunctionCall(FunctionCall),
    Alias {
        expr: Box<Expr>,
        alias: String,
    },
}

impl Default for Expr {
    fn default() -> Self {
        Expr::Literal("NULL".to_string())
    }
}
