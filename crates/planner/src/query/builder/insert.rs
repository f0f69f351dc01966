use crate::query::ast::{
    common::TableRef,
    expr::Expr,
    insert::{ConflictAction, ConflictAssignment, Insert, OnConflict},
};

#[derive(Debug, Clone)]
pub struct InsertBuilder {
    ast: Insert,
}

impl InsertBuilder {
    pub fn new(table: TableRef) -> Self {
        Self {
            ast: Insert {
                table,
                ..Default::default()
            },
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.ast.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn row(mut self, values: Vec<Expr>) -> Self {
        self.ast.values.push(values);
        self
    }

    /// Upserts on `conflict_columns`, updating every column not in the
    /// conflict key to the incoming value (`EXCLUDED.<col>`).
    pub fn upsert_on(mut self, conflict_columns: &[&str]) -> Self {
        let update_columns: Vec<&str> = self
            .ast
            .columns
            .iter()
            .map(String::as_str)
            .filter(|c| !conflict_columns.contains(c))
            .collect();

        let action = if update_columns.is_empty() {
            ConflictAction::DoNothing
        } else {
            ConflictAction::DoUpdate {
                assignments: update_columns
                    .into_iter()
                    .map(|c| ConflictAssignment {
                        column: c.to_string(),
                        value: Expr::Literal(format!("EXCLUDED.\"{c}\"")),
                    })
                    .collect(),
            }
        };

        self.ast.on_conflict = Some(OnConflict {
            columns: conflict_columns.iter().map(|c| c.to_string()).collect(),
            action,
        });
        self
    }

    pub fn build(self) -> Insert {
        self.ast
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::dialect::Postgres;
    use crate::query::renderer::{Render, Renderer};
    use model::core::value::Value;

    #[test]
    fn test_insert_builder_upsert() {
        let ast = InsertBuilder::new(TableRef::new("users"))
            .columns(&["id", "name"])
            .row(vec![Expr::Value(Value::Uint(1)), Expr::Value(Value::String("a".into()))])
            .upsert_on(&["id"])
            .build();

        let dialect = Postgres;
        let mut renderer = Renderer::new(&dialect);
        ast.render(&mut renderer);
        let (sql, _) = renderer.finish();

        assert!(sql.contains("ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\""));
    }
}
