//! Schema, index and foreign-key propagation between a mirror's peers.

use crate::error::{EngineError, Result};
use catalog::CatalogStore;
use chrono::Utc;
use connectors::postgres::PgConnector;
use model::core::identifiers::MirrorName;
use model::foreign_key::ForeignKeyDefinition;
use model::schema_delta::{SchemaDelta, SchemaDeltaKind};
use model::table_mapping::TableMapping;
use planner::query::ast::alter_table::{AlterAction, AlterTable};
use planner::query::ast::common::TableRef;
use planner::query::dialect::Postgres;
use planner::query::renderer::{Render, Renderer};
use std::sync::Arc;

pub struct SchemaPropagator {
    source: PgConnector,
    destination: PgConnector,
    catalog: Arc<CatalogStore>,
}

impl SchemaPropagator {
    pub fn new(source: PgConnector, destination: PgConnector, catalog: Arc<CatalogStore>) -> Self {
        Self { source, destination, catalog }
    }

    /// Introspects both sides of one mapped table, applies safe deltas
    /// immediately, and records unsafe ones for operator review.
    pub async fn sync_table(&self, mirror: &MirrorName, mapping: &TableMapping) -> Result<()> {
        let source_columns = self.source.columns(&mapping.source_schema, &mapping.source_table).await?;
        let dest_columns = self
            .destination
            .columns(&mapping.destination_schema, &mapping.destination_table)
            .await?;

        let dialect = Postgres;
        let table_ref =
            TableRef::qualified(mapping.destination_schema.clone(), mapping.destination_table.clone());

        for source_col in &source_columns {
            if mapping.excluded_columns.contains(&source_col.name) {
                continue;
            }
            let existing = dest_columns.iter().find(|c| c.name == source_col.name);
            match existing {
                None => {
                    let delta = SchemaDelta {
                        mirror: mirror.clone(),
                        destination_table: mapping.destination_table.clone(),
                        kind: SchemaDeltaKind::AddColumn,
                        payload: format!("{}:{:?}", source_col.name, source_col.data_type),
                        applied_at: None,
                    };
                    let id = self.catalog.append_schema_delta(&delta).await?;

                    let ast = AlterTable {
                        table: table_ref.clone(),
                        actions: vec![AlterAction::AddColumn {
                            name: source_col.name.clone(),
                            data_type: source_col.data_type.clone(),
                            nullable: true,
                            max_length: source_col.max_length,
                            default: None,
                        }],
                    };
                    let mut renderer = Renderer::new(&dialect);
                    ast.render(&mut renderer);
                    let (sql, _) = renderer.finish();
                    self.destination.batch_exec(&sql).await?;
                    self.catalog.mark_delta_applied(id, Utc::now()).await?;
                }
                Some(dest_col) if dest_col.data_type != source_col.data_type => {
                    let delta = SchemaDelta {
                        mirror: mirror.clone(),
                        destination_table: mapping.destination_table.clone(),
                        kind: SchemaDeltaKind::AlterType,
                        payload: format!(
                            "{} {:?} -> {:?}",
                            source_col.name, dest_col.data_type, source_col.data_type
                        ),
                        applied_at: None,
                    };
                    // Unsafe: recorded for the schema-diff endpoint, not applied.
                    self.catalog.append_schema_delta(&delta).await?;
                }
                Some(_) => {}
            }
        }

        for dest_col in &dest_columns {
            if source_columns.iter().any(|c| c.name == dest_col.name) {
                continue;
            }
            let delta = SchemaDelta {
                mirror: mirror.clone(),
                destination_table: mapping.destination_table.clone(),
                kind: SchemaDeltaKind::DropColumn,
                payload: dest_col.name.clone(),
                applied_at: None,
            };
            self.catalog.append_schema_delta(&delta).await?;
        }

        Ok(())
    }

    /// Fetches source index definitions and creates them on the destination
    /// `CONCURRENTLY`. Must run after the initial snapshot completes, never
    /// during.
    pub async fn replicate_indexes(&self, mirror: &MirrorName, mapping: &TableMapping) -> Result<()> {
        let source_indexes = self.source.indexes(&mapping.source_schema, &mapping.source_table).await?;

        for index in source_indexes.into_iter().filter(|i| !i.is_primary) {
            let rewritten = rewrite_index_definition(
                &index.definition,
                &mapping.source_schema,
                &mapping.source_table,
                &mapping.destination_schema,
                &mapping.destination_table,
            );
            let concurrent = rewritten.replacen("CREATE INDEX", "CREATE INDEX CONCURRENTLY", 1);
            let concurrent = if concurrent == rewritten {
                rewritten.replacen("CREATE UNIQUE INDEX", "CREATE UNIQUE INDEX CONCURRENTLY", 1)
            } else {
                concurrent
            };

            let index_def = model::index_definition::IndexDefinition {
                mirror: mirror.clone(),
                destination_table: mapping.destination_table.clone(),
                index_name: index.index_name.clone(),
                method: model::index_definition::IndexMethod::from_pg_amname(&index.method),
                is_unique: index.is_unique,
                is_primary: index.is_primary,
                definition: concurrent.clone(),
                replicated: false,
            };
            self.catalog.put_index_definition(&index_def).await?;
            self.destination.batch_exec(&concurrent).await?;
            self.catalog
                .mark_index_replicated(mirror, &mapping.destination_table, &index.index_name)
                .await?;
        }
        Ok(())
    }

    /// Drops matching FKs on the destination before a bulk load, recording
    /// the `dropped_at` window (P4). Must be called before
    /// `recreate_foreign_keys` around every initial snapshot or swap resync.
    pub async fn drop_foreign_keys(&self, mirror: &MirrorName, mapping: &TableMapping) -> Result<()> {
        let source_fks = self.source.foreign_keys(&mapping.source_schema, &mapping.source_table).await?;
        let now = Utc::now();

        for fk in source_fks {
            let mut record = ForeignKeyDefinition {
                mirror: mirror.clone(),
                constraint_name: fk.constraint_name.clone(),
                source_table: mapping.source_table.clone(),
                target_table: fk.target_table.clone(),
                definition: fk.definition.clone(),
                on_delete: fk.on_delete.clone(),
                on_update: fk.on_update.clone(),
                dropped_at: None,
                recreated_at: None,
            };
            self.catalog.put_foreign_key(&record).await?;

            self.destination
                .batch_exec(&format!(
                    "ALTER TABLE \"{}\".\"{}\" DROP CONSTRAINT IF EXISTS \"{}\"",
                    mapping.destination_schema, mapping.destination_table, fk.constraint_name
                ))
                .await?;

            record.mark_dropped(now);
            self.catalog.put_foreign_key(&record).await?;
        }
        Ok(())
    }

    /// Recreates dropped FKs `NOT VALID` then validates them, matching the
    /// drop-before-bulk-load/recreate-after-bulk-load cycle. A validation
    /// failure is non-retryable.
    pub async fn recreate_foreign_keys(&self, mirror: &MirrorName, mapping: &TableMapping) -> Result<()> {
        let dropped = self.catalog.list_dropped_foreign_keys(mirror).await?;
        let now = Utc::now();

        for mut fk in dropped.into_iter().filter(|fk| fk.source_table == mapping.source_table) {
            self.destination
                .batch_exec(&format!(
                    "ALTER TABLE \"{}\".\"{}\" ADD CONSTRAINT \"{}\" {} DEFERRABLE INITIALLY DEFERRED NOT VALID",
                    mapping.destination_schema, mapping.destination_table, fk.constraint_name, fk.definition
                ))
                .await?;

            let validate = self
                .destination
                .batch_exec(&format!(
                    "ALTER TABLE \"{}\".\"{}\" VALIDATE CONSTRAINT \"{}\"",
                    mapping.destination_schema, mapping.destination_table, fk.constraint_name
                ))
                .await;

            if let Err(err) = validate {
                return Err(EngineError::fk_validation(&fk.constraint_name, err.to_string()));
            }

            fk.mark_recreated(now);
            self.catalog.put_foreign_key(&fk).await?;
        }
        Ok(())
    }
}

fn rewrite_index_definition(
    definition: &str,
    source_schema: &str,
    source_table: &str,
    dest_schema: &str,
    dest_table: &str,
) -> String {
    definition
        .replace(&format!("\"{source_schema}\".\"{source_table}\""), &format!("\"{dest_schema}\".\"{dest_table}\""))
        .replace(&format!("{source_schema}.{source_table}"), &format!("{dest_schema}.{dest_table}"))
}
