use super::CatalogStore;
use crate::error::Result;
use model::core::identifiers::{BatchId, MirrorName};
use model::events::{EventCategory, EventLevel, OperatorEvent};
use model::lsn::Lsn;

fn level_to_text(level: EventLevel) -> &'static str {
    match level {
        EventLevel::Info => "info",
        EventLevel::Warn => "warn",
        EventLevel::Error => "error",
    }
}

fn category_to_text(category: EventCategory) -> &'static str {
    use EventCategory::*;
    match category {
        Setup => "setup",
        Replication => "replication",
        Schema => "schema",
        Resync => "resync",
        Snapshot => "snapshot",
        UserAction => "user_action",
        Error => "error",
    }
}

impl CatalogStore {
    /// Persists one operator-visible event (spec §7). The catalog retains the
    /// last N per mirror; callers are expected to call `prune_events`
    /// periodically rather than on every insert.
    pub async fn record_event(&self, event: &OperatorEvent) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                "INSERT INTO bunny_operator_events \
                    (mirror, level, category, message, batch_id, lsn, recorded_at) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7)",
                &[
                    &event.mirror.as_str(),
                    &level_to_text(event.level),
                    &category_to_text(event.category),
                    &event.message,
                    &event.batch_id.map(|b| b.0),
                    &event.lsn.map(|l| l.as_u64() as i64),
                    &event.timestamp,
                ],
            )
            .await?;
        Ok(())
    }

    /// Most recent `limit` events for a mirror, newest first.
    pub async fn list_events(&self, mirror: &MirrorName, limit: i64) -> Result<Vec<OperatorEvent>> {
        let client = self.pool.client().await?;
        let rows = client
            .query(
                "SELECT level, category, message, batch_id, lsn, recorded_at \
                 FROM bunny_operator_events WHERE mirror = $1 \
                 ORDER BY recorded_at DESC LIMIT $2",
                &[&mirror.as_str(), &limit],
            )
            .await?;

        rows.into_iter()
            .map(|row| {
                let level = match row.get::<_, String>(0).as_str() {
                    "warn" => EventLevel::Warn,
                    "error" => EventLevel::Error,
                    _ => EventLevel::Info,
                };
                let category = match row.get::<_, String>(1).as_str() {
                    "setup" => EventCategory::Setup,
                    "schema" => EventCategory::Schema,
                    "resync" => EventCategory::Resync,
                    "snapshot" => EventCategory::Snapshot,
                    "user_action" => EventCategory::UserAction,
                    "error" => EventCategory::Error,
                    _ => EventCategory::Replication,
                };
                Ok(OperatorEvent {
                    level,
                    category,
                    message: row.get(2),
                    mirror: mirror.clone(),
                    batch_id: row.get::<_, Option<i64>>(3).map(BatchId),
                    lsn: row
                        .get::<_, Option<i64>>(4)
                        .map(|v| Lsn::from_u64(v as u64)),
                    timestamp: row.get(5),
                })
            })
            .collect()
    }

    /// Retains only the last `keep` events per mirror (spec §7: "last N per
    /// mirror").
    pub async fn prune_events(&self, mirror: &MirrorName, keep: i64) -> Result<()> {
        let client = self.pool.client().await?;
        client
            .execute(
                "DELETE FROM bunny_operator_events WHERE mirror = $1 AND id NOT IN ( \
                    SELECT id FROM bunny_operator_events WHERE mirror = $1 \
                    ORDER BY recorded_at DESC LIMIT $2)",
                &[&mirror.as_str(), &keep],
            )
            .await?;
        Ok(())
    }
}
