use crate::query::{ast::delete::Delete, renderer::Render};

impl Render for Delete {
    fn render(&self, r: &mut super::Renderer) {
        r.sql.push_str("DELETE FROM ");
        r.render_table_ref(&self.table);
        if let Some(where_clause) = &self.where_clause {
            r.sql.push_str(" WHERE ");
            where_clause.render(r);
        }
        r.sql.push(';');
    }
}

#[cfg(test)]
mod tests {
    use crate::query::{
        ast::{
            common::TableRef,
            delete::Delete,
            expr::{BinaryOp, BinaryOperator, Expr, Ident},
        },
        dialect::Postgres,
        renderer::{Render, Renderer},
    };

    #[test]
    fn test_render_delete_with_where() {
        let ast = Delete {
            table: TableRef::new("users"),
            where_clause: Some(Expr::BinaryOp(Box::new(BinaryOp {
                left: Expr::Identifier(Ident {
                    qualifier: None,
                    name: "id".to_string(),
                }),
                op: BinaryOperator::Eq,
                right: Expr::Value(model::core::value::Value::Uint(1)),
            }))),
        };

        let dialect = Postgres;
        let mut renderer = Renderer::new(&dialect);
        ast.render(&mut renderer);
        let (sql, params) = renderer.finish();

        assert_eq!(sql, r#"DELETE FROM "users" WHERE ("id" = $1);"#);
        assert_eq!(params, vec![model::core::value::Value::Uint(1)]);
    }
}
