use crate::query::{
    ast::expr::{BinaryOperator, Expr, FunctionCall, Ident},
    renderer::{Render, Renderer},
};

impl Render for Expr {
    fn render(&self, r: &mut Renderer) {
        match self {
            Expr::Value(value) => r.add_param(value.clone()),
            Expr::Identifier(ident) => ident.render(r),
            Expr::Literal(raw) => r.sql.push_str(raw),
            Expr::BinaryOp(op) => {
                r.sql.push('(');
                op.left.render(r);
                r.sql.push(' ');
                r.sql.push_str(op.op.as_sql());
                r.sql.push(' ');
                op.right.render(r);
                r.sql.push(')');
            }
            Expr::FunctionCall(call) => call.render(r),
            Expr::Alias { expr, alias } => {
                expr.render(r);
                r.sql.push_str(" AS ");
                r.sql.push_str(&r.dialect.quote_identifier(alias));
            }
        }
    }
}

impl Render for Ident {
    fn render(&self, r: &mut Renderer) {
        if let Some(qualifier) = &self.qualifier {
            r.sql.push_str(&r.dialect.quote_identifier(qualifier));
            r.sql.push('.');
        }
        r.sql.push_str(&r.dialect.quote_identifier(&self.name));
    }
}

impl Render for FunctionCall {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str(&self.name);
        r.sql.push('(');
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            arg.render(r);
        }
        r.sql.push(')');
    }
}

impl BinaryOperator {
    fn as_sql(&self) -> &'static str {
        match self {
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ast::expr::BinaryOp, dialect::Postgres};
    use model::core::value::Value;

    #[test]
    fn test_render_binary_op_parenthesized() {
        let expr = Expr::BinaryOp(Box::new(BinaryOp {
            left: Expr::Identifier(Ident {
                qualifier: None,
                name: "id".to_string(),
            }),
            op: BinaryOperator::Gt,
            right: Expr::Value(Value::Uint(5)),
        }));

        let dialect = Postgres;
        let mut renderer = Renderer::new(&dialect);
        expr.render(&mut renderer);
        let (sql, params) = renderer.finish();

        assert_eq!(sql, r#"("id" > $1)"#);
        assert_eq!(params, vec![Value::Uint(5)]);
    }
}
