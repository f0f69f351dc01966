use crate::query::{
    ast::alter_table::{AlterAction, AlterTable},
    renderer::{Render, Renderer},
};

impl Render for AlterTable {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str("ALTER TABLE ");
        r.render_table_ref(&self.table);
        r.sql.push(' ');
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            action.render(r);
        }
        r.sql.push(';');
    }
}

impl Render for AlterAction {
    fn render(&self, r: &mut Renderer) {
        match self {
            AlterAction::AddColumn {
                name,
                data_type,
                nullable,
                max_length,
                default,
            } => {
                r.sql.push_str("ADD COLUMN ");
                r.sql.push_str(&r.dialect.quote_identifier(name));
                r.sql.push(' ');
                r.sql
                    .push_str(&r.dialect.render_data_type(data_type, *max_length));
                if !nullable {
                    r.sql.push_str(" NOT NULL");
                }
                if let Some(default) = default {
                    r.sql.push_str(" DEFAULT ");
                    default.render(r);
                }
            }
            AlterAction::DropColumn { name } => {
                r.sql.push_str("DROP COLUMN ");
                r.sql.push_str(&r.dialect.quote_identifier(name));
            }
            AlterAction::AlterColumnType {
                name,
                data_type,
                max_length,
                using,
            } => {
                r.sql.push_str("ALTER COLUMN ");
                r.sql.push_str(&r.dialect.quote_identifier(name));
                r.sql.push_str(" TYPE ");
                r.sql
                    .push_str(&r.dialect.render_data_type(data_type, *max_length));
                if let Some(using) = using {
                    r.sql.push_str(" USING ");
                    r.sql.push_str(using);
                }
            }
            AlterAction::SetDefault { name, default } => {
                r.sql.push_str("ALTER COLUMN ");
                r.sql.push_str(&r.dialect.quote_identifier(name));
                r.sql.push_str(" SET DEFAULT ");
                default.render(r);
            }
            AlterAction::DropDefault { name } => {
                r.sql.push_str("ALTER COLUMN ");
                r.sql.push_str(&r.dialect.quote_identifier(name));
                r.sql.push_str(" DROP DEFAULT");
            }
            AlterAction::AddConstraint { name, constraint } => {
                r.sql.push_str("ADD ");
                if let Some(name) = name {
                    r.sql.push_str("CONSTRAINT ");
                    r.sql.push_str(&r.dialect.quote_identifier(name));
                    r.sql.push(' ');
                }
                constraint.render(r);
            }
            AlterAction::DropConstraint { name } => {
                r.sql.push_str("DROP CONSTRAINT ");
                r.sql.push_str(&r.dialect.quote_identifier(name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{ast::common::TableRef, dialect::Postgres};
    use model::core::data_type::DataType;

    #[test]
    fn test_render_add_column() {
        let ast = AlterTable {
            table: TableRef::new("users"),
            actions: vec![AlterAction::AddColumn {
                name: "email".to_string(),
                data_type: DataType::String,
                nullable: true,
                max_length: None,
                default: None,
            }],
        };

        let dialect = Postgres;
        let mut renderer = Renderer::new(&dialect);
        ast.render(&mut renderer);
        let (sql, _) = renderer.finish();

        assert_eq!(sql, r#"ALTER TABLE "users" ADD COLUMN "email" TEXT;"#);
    }
}
