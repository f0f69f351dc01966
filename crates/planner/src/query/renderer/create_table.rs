use crate::query::{
    ast::create_table::{ColumnDef, CreateTable, TableConstraint},
    renderer::{Render, Renderer},
};

impl Render for CreateTable {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str("CREATE ");
        if self.temp {
            r.sql.push_str("TEMP ");
        }
        r.sql.push_str("TABLE ");
        if self.if_not_exists {
            r.sql.push_str("IF NOT EXISTS ");
        }
        r.render_table_ref(&self.table);
        r.sql.push_str(" (");

        let mut first = true;
        for column in &self.columns {
            if !first {
                r.sql.push_str(", ");
            }
            first = false;
            column.render(r);
        }
        for constraint in &self.constraints {
            if !first {
                r.sql.push_str(", ");
            }
            first = false;
            constraint.render(r);
        }

        r.sql.push_str(");");
    }
}

impl Render for ColumnDef {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str(&r.dialect.quote_identifier(&self.name));
        r.sql.push(' ');
        r.sql
            .push_str(&r.dialect.render_data_type(&self.data_type, self.max_length));
        if self.is_primary_key {
            r.sql.push_str(" PRIMARY KEY");
        }
        if !self.is_nullable {
            r.sql.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            r.sql.push_str(" DEFAULT ");
            default.render(r);
        }
    }
}

impl Render for TableConstraint {
    fn render(&self, r: &mut Renderer) {
        match self {
            TableConstraint::PrimaryKey { columns } => {
                r.sql.push_str("PRIMARY KEY (");
                render_column_list(r, columns);
                r.sql.push(')');
            }
            TableConstraint::ForeignKey {
                columns,
                references,
                referenced_columns,
            } => {
                r.sql.push_str("FOREIGN KEY (");
                render_column_list(r, columns);
                r.sql.push_str(") REFERENCES ");
                r.render_table_ref(references);
                r.sql.push_str(" (");
                render_column_list(r, referenced_columns);
                r.sql.push(')');
            }
        }
    }
}

fn render_column_list(r: &mut Renderer, columns: &[String]) {
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            r.sql.push_str(", ");
        }
        r.sql.push_str(&r.dialect.quote_identifier(column));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ast::common::TableRef, dialect::Postgres};
    use model::core::data_type::DataType;

    #[test]
    fn test_render_create_table_with_primary_key() {
        let ast = CreateTable {
            table: TableRef::new("users"),
            columns: vec![
                ColumnDef {
                    name: "id".to_string(),
                    data_type: DataType::LongLong,
                    is_nullable: false,
                    is_primary_key: false,
                    default_value: None,
                    max_length: None,
                },
                ColumnDef {
                    name: "name".to_string(),
                    data_type: DataType::String,
                    is_nullable: true,
                    is_primary_key: false,
                    default_value: None,
                    max_length: None,
                },
            ],
            constraints: vec![TableConstraint::PrimaryKey {
                columns: vec!["id".to_string()],
            }],
            if_not_exists: true,
            temp: false,
        };

        let dialect = Postgres;
        let mut renderer = Renderer::new(&dialect);
        ast.render(&mut renderer);
        let (sql, _params) = renderer.finish();

        assert!(sql.starts_with(r#"CREATE TABLE IF NOT EXISTS "users" ("#));
        assert!(sql.contains(r#""id" BIGINT NOT NULL"#));
        assert!(sql.ends_with(r#"PRIMARY KEY ("id"));"#));
    }
}
