//! Applies a CDC batch to the destination.

use crate::error::{EngineError, Result};
use catalog::CatalogStore;
use connectors::postgres::PgConnector;
use connectors::replication::decoder::DecodedRow;
use model::cdc_batch::CDCBatch;
use model::core::value::Value;
use planner::query::ast::expr::{Expr, Ident};
use planner::query::ast::common::TableRef;
use planner::query::builder::{delete::DeleteBuilder, insert::InsertBuilder};
use planner::query::dialect::Postgres;
use planner::query::renderer::{Render, Renderer};
use std::sync::Arc;

/// One row-level mutation destined for one table, already resolved to
/// destination-schema identifiers.
#[derive(Clone, Debug)]
pub struct PendingChange {
    pub destination_schema: String,
    pub destination_table: String,
    pub kind: ChangeKind,
}

#[derive(Clone, Debug)]
pub enum ChangeKind {
    /// Insert-on-conflict-update. `row` must contain every primary-key
    /// column plus whatever the source sent.
    Upsert(DecodedRow),
    /// `key` carries the primary-key columns identifying the row to remove.
    Delete(DecodedRow),
}

/// Applies batches to one destination peer, persisting the checkpoint in
/// the catalog once the destination transaction commits.
pub struct SinkWriter {
    destination: PgConnector,
    catalog: Arc<CatalogStore>,
}

impl SinkWriter {
    pub fn new(destination: PgConnector, catalog: Arc<CatalogStore>) -> Self {
        Self { destination, catalog }
    }

    /// Applies a replicated `TRUNCATE` immediately rather than buffering it
    /// as a row-level change; idempotent to re-execute after a crash.
    pub async fn truncate_table(&self, schema: &str, table: &str) -> Result<()> {
        self.destination
            .batch_exec(&format!("TRUNCATE TABLE \"{schema}\".\"{table}\""))
            .await?;
        Ok(())
    }

    /// Applies one batch: deletes first, then upserts, commits the
    /// destination transaction, then persists the checkpoint. Skips
    /// entirely if `batch.batch_id` was already applied
    /// (the idempotency rule — batches are the unit, not rows).
    pub async fn apply_batch(
        &self,
        changes: &[PendingChange],
        pk_columns: impl Fn(&str, &str) -> Vec<String>,
        batch: CDCBatch,
    ) -> Result<()> {
        let (last_sync_batch_id, _) = self.catalog.checkpoint(&batch.mirror).await?;
        if batch.batch_id <= last_sync_batch_id {
            return Ok(());
        }

        self.apply_without_checkpoint(changes, &pk_columns).await?;
        self.catalog.append_batch_and_checkpoint(&batch).await?;
        Ok(())
    }

    /// Applies `changes` to the destination without touching the batch
    /// checkpoint. Used by table swap-resync to drain its buffered
    /// catch-up window against the shadow table (spec §4.7 step 3), where
    /// there is no `(mirror, batch_id)` to persist — the shadow table isn't
    /// live until the swap commits.
    pub async fn apply_without_checkpoint(
        &self,
        changes: &[PendingChange],
        pk_columns: &impl Fn(&str, &str) -> Vec<String>,
    ) -> Result<()> {
        let dialect = Postgres;
        let mut statements = Vec::with_capacity(changes.len());

        for change in changes.iter().filter(|c| matches!(c.kind, ChangeKind::Delete(_))) {
            let ChangeKind::Delete(key) = &change.kind else { unreachable!() };
            let keys = pk_columns(&change.destination_schema, &change.destination_table);
            statements.push(render_delete(&dialect, change, &keys, key)?);
        }

        for change in changes.iter().filter(|c| matches!(c.kind, ChangeKind::Upsert(_))) {
            let ChangeKind::Upsert(row) = &change.kind else { unreachable!() };
            let keys = pk_columns(&change.destination_schema, &change.destination_table);
            statements.push(render_upsert(&dialect, change, &keys, row)?);
        }

        if !statements.is_empty() {
            self.destination.apply_in_transaction(&statements).await?;
        }
        Ok(())
    }
}

fn render_delete(
    dialect: &Postgres,
    change: &PendingChange,
    pk_columns: &[String],
    key: &DecodedRow,
) -> Result<(String, Vec<Value>)> {
    if pk_columns.is_empty() {
        return Err(EngineError::invariant(format!(
            "table {}.{} has no primary key; deletes cannot be applied",
            change.destination_schema, change.destination_table
        )));
    }

    let mut condition: Option<Expr> = None;
    for col in pk_columns {
        let value = key.get(col).cloned().ok_or_else(|| {
            EngineError::invariant(format!(
                "delete event for {}.{} is missing primary-key column '{col}'",
                change.destination_schema, change.destination_table
            ))
        })?;
        let eq = Expr::BinaryOp(Box::new(planner::query::ast::expr::BinaryOp {
            left: Expr::Identifier(Ident { qualifier: None, name: col.clone() }),
            op: planner::query::ast::expr::BinaryOperator::Eq,
            right: Expr::Value(value),
        }));
        condition = Some(match condition {
            Some(existing) => Expr::BinaryOp(Box::new(planner::query::ast::expr::BinaryOp {
                left: existing,
                op: planner::query::ast::expr::BinaryOperator::And,
                right: eq,
            })),
            None => eq,
        });
    }

    let ast = DeleteBuilder::new(TableRef::qualified(
        change.destination_schema.clone(),
        change.destination_table.clone(),
    ))
    .where_clause(condition.expect("pk_columns is non-empty"))
    .build();

    let mut renderer = Renderer::new(dialect);
    ast.render(&mut renderer);
    Ok(renderer.finish())
}

fn render_upsert(
    dialect: &Postgres,
    change: &PendingChange,
    pk_columns: &[String],
    row: &DecodedRow,
) -> Result<(String, Vec<Value>)> {
    if pk_columns.is_empty() {
        return Err(EngineError::invariant(format!(
            "table {}.{} has no primary key; upserts cannot be applied",
            change.destination_schema, change.destination_table
        )));
    }

    let mut columns: Vec<&str> = row.keys().map(String::as_str).collect();
    columns.sort_unstable();
    let values: Vec<Expr> = columns
        .iter()
        .map(|c| Expr::Value(row.get(*c).cloned().unwrap_or(Value::Null)))
        .collect();

    let ast = InsertBuilder::new(TableRef::qualified(
        change.destination_schema.clone(),
        change.destination_table.clone(),
    ))
    .columns(&columns)
    .row(values)
    .upsert_on(&pk_columns.iter().map(String::as_str).collect::<Vec<_>>())
    .build();

    let mut renderer = Renderer::new(dialect);
    ast.render(&mut renderer);
    Ok(renderer.finish())
}
