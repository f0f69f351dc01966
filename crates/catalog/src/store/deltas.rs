use super::CatalogStore;
use crate::error::{CatalogError, Result};
use chrono::{DateTime, Utc};
use model::core::identifiers::MirrorName;
use model::schema_delta::{SchemaDelta, SchemaDeltaKind};
use tokio_postgres::Row;

fn kind_to_text(kind: SchemaDeltaKind) -> &'static str {
    use SchemaDeltaKind::*;
    match kind {
        AddColumn => "add_column",
        DropColumn => "drop_column",
        AlterType => "alter_type",
        AddDefault => "add_default",
        DropDefault => "drop_default",
        AddConstraint => "add_constraint",
        DropConstraint => "drop_constraint",
    }
}

fn kind_from_text(text: &str) -> Result<SchemaDeltaKind> {
    use SchemaDeltaKind::*;
    Ok(match text {
        "add_column" => AddColumn,
        "drop_column" => DropColumn,
        "alter_type" => AlterType,
        "add_default" => AddDefault,
        "drop_default" => DropDefault,
        "add_constraint" => AddConstraint,
        "drop_constraint" => DropConstraint,
        other => {
            return Err(CatalogError::InvalidRow {
                entity: "schema_delta.kind",
                reason: format!("unrecognized kind '{other}'"),
            });
        }
    })
}

fn row_to_delta(row: &Row) -> Result<SchemaDelta> {
    Ok(SchemaDelta {
        mirror: MirrorName::new(row.get::<_, String>(0)),
        destination_table: row.get(1),
        kind: kind_from_text(row.get::<_, String>(2).as_str())?,
        payload: row.get(3),
        applied_at: row.get(4),
    })
}

impl CatalogStore {
    /// Appends to the audit log (spec §4.4). Returns the generated row id so
    /// callers can mark it applied later.
    pub async fn append_schema_delta(&self, delta: &SchemaDelta) -> Result<i64> {
        let client = self.pool.client().await?;
        let row = client
            .query_one(
                "INSERT INTO bunny_schema_deltas \
                    (mirror, destination_table, kind, payload, applied_at) \
                 VALUES ($1,$2,$3,$4,$5) RETURNING id",
                &[
                    &delta.mirror.as_str(),
                    &delta.destination_table,
                    &kind_to_text(delta.kind),
                    &delta.payload,
                    &delta.applied_at,
                ],
            )
            .await?;
        Ok(row.get(0))
    }

    pub async fn mark_delta_applied(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                "UPDATE bunny_schema_deltas SET applied_at = $2 WHERE id = $1",
                &[&id, &at],
            )
            .await?;
        Ok(())
    }

    /// Pending (unapplied) deltas, surfaced verbatim by the `schema-diff`
    /// endpoint (spec §6) without applying them.
    pub async fn list_pending_schema_deltas(&self, mirror: &MirrorName) -> Result<Vec<SchemaDelta>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                "SELECT mirror, destination_table, kind, payload, applied_at \
                 FROM bunny_schema_deltas WHERE mirror = $1 AND applied_at IS NULL ORDER BY id",
                &[&mirror.as_str()],
            )
            .await?;
        rows.iter().map(row_to_delta).collect()
    }
}
