use super::CatalogStore;
use crate::error::Result;
use model::core::identifiers::MirrorName;
use model::index_definition::{IndexDefinition, IndexMethod};
use tokio_postgres::Row;

fn method_to_text(method: IndexMethod) -> &'static str {
    match method {
        IndexMethod::BTree => "btree",
        IndexMethod::Hash => "hash",
        IndexMethod::Gin => "gin",
        IndexMethod::Gist => "gist",
        IndexMethod::SpGist => "spgist",
        IndexMethod::Brin => "brin",
    }
}

fn row_to_index(row: &Row) -> IndexDefinition {
    IndexDefinition {
        mirror: MirrorName::new(row.get::<_, String>(0)),
        destination_table: row.get(1),
        index_name: row.get(2),
        method: IndexMethod::from_pg_amname(row.get::<_, String>(3).as_str()),
        is_unique: row.get(4),
        is_primary: row.get(5),
        definition: row.get(6),
        replicated: row.get(7),
    }
}

const INDEX_COLUMNS: &str =
    "mirror, destination_table, index_name, method, is_unique, is_primary, definition, replicated";

impl CatalogStore {
    pub async fn put_index_definition(&self, index: &IndexDefinition) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                &format!(
                    "INSERT INTO bunny_index_definitions ({INDEX_COLUMNS}) \
                     VALUES ($1,$2,$3,$4,$5,$6,$7,$8) \
                     ON CONFLICT (mirror, destination_table, index_name) DO UPDATE SET \
                        method = EXCLUDED.method, is_unique = EXCLUDED.is_unique, \
                        is_primary = EXCLUDED.is_primary, definition = EXCLUDED.definition, \
                        replicated = EXCLUDED.replicated"
                ),
                &[
                    &index.mirror.as_str(),
                    &index.destination_table,
                    &index.index_name,
                    &method_to_text(index.method),
                    &index.is_unique,
                    &index.is_primary,
                    &index.definition,
                    &index.replicated,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn mark_index_replicated(
        &self,
        mirror: &MirrorName,
        destination_table: &str,
        index_name: &str,
    ) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                "UPDATE bunny_index_definitions SET replicated = TRUE \
                 WHERE mirror = $1 AND destination_table = $2 AND index_name = $3",
                &[&mirror.as_str(), &destination_table, &index_name],
            )
            .await?;
        Ok(())
    }

    pub async fn list_index_definitions(
        &self,
        mirror: &MirrorName,
        destination_table: &str,
    ) -> Result<Vec<IndexDefinition>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {INDEX_COLUMNS} FROM bunny_index_definitions \
                     WHERE mirror = $1 AND destination_table = $2 ORDER BY index_name"
                ),
                &[&mirror.as_str(), &destination_table],
            )
            .await?;
        Ok(rows.iter().map(row_to_index).collect())
    }
}
