use super::CatalogStore;
use crate::error::Result;
use model::core::identifiers::MirrorName;
use model::foreign_key::ForeignKeyDefinition;
use tokio_postgres::Row;

fn row_to_fk(row: &Row) -> ForeignKeyDefinition {
    ForeignKeyDefinition {
        mirror: MirrorName::new(row.get::<_, String>(0)),
        constraint_name: row.get(1),
        source_table: row.get(2),
        target_table: row.get(3),
        definition: row.get(4),
        on_delete: row.get(5),
        on_update: row.get(6),
        dropped_at: row.get(7),
        recreated_at: row.get(8),
    }
}

const FK_COLUMNS: &str = "mirror, constraint_name, source_table, target_table, definition, \
    on_delete, on_update, dropped_at, recreated_at";

impl CatalogStore {
    pub async fn put_foreign_key(&self, fk: &ForeignKeyDefinition) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                &format!(
                    "INSERT INTO bunny_foreign_keys ({FK_COLUMNS}) \
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9) \
                     ON CONFLICT (mirror, constraint_name) DO UPDATE SET \
                        source_table = EXCLUDED.source_table, \
                        target_table = EXCLUDED.target_table, \
                        definition = EXCLUDED.definition, \
                        on_delete = EXCLUDED.on_delete, \
                        on_update = EXCLUDED.on_update, \
                        dropped_at = EXCLUDED.dropped_at, \
                        recreated_at = EXCLUDED.recreated_at"
                ),
                &[
                    &fk.mirror.as_str(),
                    &fk.constraint_name,
                    &fk.source_table,
                    &fk.target_table,
                    &fk.definition,
                    &fk.on_delete,
                    &fk.on_update,
                    &fk.dropped_at,
                    &fk.recreated_at,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn list_foreign_keys(
        &self,
        mirror: &MirrorName,
        source_table: &str,
    ) -> Result<Vec<ForeignKeyDefinition>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {FK_COLUMNS} FROM bunny_foreign_keys \
                     WHERE mirror = $1 AND source_table = $2 ORDER BY constraint_name"
                ),
                &[&mirror.as_str(), &source_table],
            )
            .await?;
        Ok(rows.iter().map(row_to_fk).collect())
    }

    /// FKs currently absent on the destination (P4): dropped, not yet
    /// recreated.
    pub async fn list_dropped_foreign_keys(
        &self,
        mirror: &MirrorName,
    ) -> Result<Vec<ForeignKeyDefinition>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {FK_COLUMNS} FROM bunny_foreign_keys \
                     WHERE mirror = $1 AND dropped_at IS NOT NULL AND recreated_at IS NULL \
                     ORDER BY constraint_name"
                ),
                &[&mirror.as_str()],
            )
            .await?;
        Ok(rows.iter().map(row_to_fk).collect())
    }
}
