use super::CatalogStore;
use crate::error::{CatalogError, Result};
use model::core::identifiers::PeerName;
use model::peer::{Peer, SslMode};

fn ssl_mode_to_text(mode: SslMode) -> &'static str {
    match mode {
        SslMode::Disable => "disable",
        SslMode::Prefer => "prefer",
        SslMode::Require => "require",
    }
}

fn ssl_mode_from_text(text: &str) -> Result<SslMode> {
    match text {
        "disable" => Ok(SslMode::Disable),
        "prefer" => Ok(SslMode::Prefer),
        "require" => Ok(SslMode::Require),
        other => Err(CatalogError::InvalidRow {
            entity: "peer.ssl_mode",
            reason: format!("unrecognized ssl_mode '{other}'"),
        }),
    }
}

impl CatalogStore {
    pub async fn put_peer(&self, peer: &Peer) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                r#"INSERT INTO bunny_peers (name, host, port, "user", password, database, ssl_mode)
                   VALUES ($1, $2, $3, $4, $5, $6, $7)
                   ON CONFLICT (name) DO UPDATE SET
                       host = EXCLUDED.host,
                       port = EXCLUDED.port,
                       "user" = EXCLUDED."user",
                       password = EXCLUDED.password,
                       database = EXCLUDED.database,
                       ssl_mode = EXCLUDED.ssl_mode"#,
                &[
                    &peer.name.as_str(),
                    &peer.host,
                    &(peer.port as i32),
                    &peer.user,
                    &peer.password,
                    &peer.database,
                    &ssl_mode_to_text(peer.ssl_mode),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_peer(&self, name: &PeerName) -> Result<Peer> {
        let client = self.pool.client().await?;
        let row = client
            .query_opt(
                r#"SELECT name, host, port, "user", password, database, ssl_mode
                   FROM bunny_peers WHERE name = $1"#,
                &[&name.as_str()],
            )
            .await?
            .ok_or_else(|| CatalogError::PeerNotFound(name.as_str().to_string()))?;

        Ok(Peer {
            name: PeerName::new(row.get::<_, String>(0)),
            host: row.get(1),
            port: row.get::<_, i32>(2) as u16,
            user: row.get(3),
            password: row.get(4),
            database: row.get(5),
            ssl_mode: ssl_mode_from_text(row.get::<_, String>(6).as_str())?,
        })
    }

    pub async fn list_peers(&self) -> Result<Vec<Peer>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                r#"SELECT name, host, port, "user", password, database, ssl_mode
                   FROM bunny_peers ORDER BY name"#,
                &[],
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                Ok(Peer {
                    name: PeerName::new(row.get::<_, String>(0)),
                    host: row.get(1),
                    port: row.get::<_, i32>(2) as u16,
                    user: row.get(3),
                    password: row.get(4),
                    database: row.get(5),
                    ssl_mode: ssl_mode_from_text(row.get::<_, String>(6).as_str())?,
                })
            })
            .collect()
    }

    /// Deletion is forbidden while any mirror references the peer (spec §3.1).
    pub async fn delete_peer(&self, name: &PeerName) -> Result<()> {
        let client = self.pool.client().await?;
        let in_use = client
            .query_opt(
                "SELECT 1 FROM bunny_mirrors WHERE source_peer = $1 OR destination_peer = $1 LIMIT 1",
                &[&name.as_str()],
            )
            .await?;
        if in_use.is_some() {
            return Err(CatalogError::PeerInUse(name.as_str().to_string()));
        }

        client
            .execute("DELETE FROM bunny_peers WHERE name = $1", &[&name.as_str()])
            .await?;
        Ok(())
    }
}
