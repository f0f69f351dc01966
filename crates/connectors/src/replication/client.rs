//! Publication and replication-slot lifecycle management for one mirror:
//! `EnsurePublication`/`EnsureSlot`/`StartStream`/`Acknowledge`/`DropSlot`/
//! `DropPublication`.

use crate::error::{ConnectorError, Result};
use crate::postgres::connection;
use crate::replication::decoder::{ChangeEvent, Decoder};
use crate::replication::stream::{ReplicationStream, StreamEvent};
use model::lsn::Lsn;
use tokio_postgres::Client;

/// What `EnsureSlot` returns: the slot is ready to stream from, and, if it
/// was just created, the exported snapshot that the snapshot engine should
/// adopt before the CDC loop starts.
#[derive(Clone, Debug)]
pub struct SlotHandle {
    pub slot_name: String,
    pub consistent_point: Lsn,
    pub export_snapshot_id: Option<String>,
}

/// Owns the control-connection to a source database and issues the
/// replication protocol commands needed to stand up, drive and tear down
/// one mirror's publication/slot pair. A second, dedicated connection
/// carries the actual `START_REPLICATION` stream (tokio-postgres puts a
/// replication-mode connection into `CopyBoth` for its lifetime, so it
/// cannot also run `CREATE_REPLICATION_SLOT`/DDL).
pub struct SourceConnector {
    conninfo: String,
    control: Client,
}

impl SourceConnector {
    pub async fn connect(conninfo: &str) -> Result<Self> {
        let control = connection::connect_replication(conninfo).await?;
        Ok(Self {
            conninfo: conninfo.to_string(),
            control,
        })
    }

    /// Creates or alters the publication so it covers exactly `tables`
    /// (`schema.table` pairs). Idempotent: drops and recreates rather than
    /// diffing, since `ALTER PUBLICATION ... SET TABLE` already replaces
    /// the member list atomically.
    pub async fn ensure_publication(&self, name: &str, tables: &[(String, String)]) -> Result<()> {
        if tables.is_empty() {
            return Err(ConnectorError::Protocol(format!(
                "refusing to create publication '{name}' with no member tables"
            )));
        }

        let members = tables
            .iter()
            .map(|(schema, table)| format!("\"{schema}\".\"{table}\""))
            .collect::<Vec<_>>()
            .join(", ");

        let exists: bool = self
            .control
            .query_one(
                "SELECT EXISTS (SELECT 1 FROM pg_publication WHERE pubname = $1)",
                &[&name],
            )
            .await?
            .get(0);

        if exists {
            self.control
                .batch_execute(&format!("ALTER PUBLICATION \"{name}\" SET TABLE {members}"))
                .await?;
        } else {
            self.control
                .batch_execute(&format!("CREATE PUBLICATION \"{name}\" FOR TABLE {members}"))
                .await?;
        }
        Ok(())
    }

    /// Creates the logical slot if it does not already exist. On creation,
    /// captures the exported snapshot id and consistent-point LSN the
    /// snapshot engine needs to read a transactionally consistent copy of
    /// the source. A pre-existing slot carries no
    /// snapshot — the engine must already have one from a prior run.
    pub async fn ensure_slot(&self, slot_name: &str) -> Result<SlotHandle> {
        let existing = self
            .control
            .query_opt(
                "SELECT restart_lsn FROM pg_replication_slots WHERE slot_name = $1",
                &[&slot_name],
            )
            .await?;

        if let Some(row) = existing {
            let restart_lsn: String = row.get(0);
            let consistent_point = restart_lsn.parse::<Lsn>().map_err(|e| {
                ConnectorError::Protocol(format!("unparseable restart_lsn '{restart_lsn}': {e}"))
            })?;
            return Ok(SlotHandle {
                slot_name: slot_name.to_string(),
                consistent_point,
                export_snapshot_id: None,
            });
        }

        let query = format!("CREATE_REPLICATION_SLOT \"{slot_name}\" LOGICAL \"pgoutput\"");
        let rows = self.control.simple_query(&query).await?;
        let row = rows
            .into_iter()
            .find_map(|msg| match msg {
                tokio_postgres::SimpleQueryMessage::Row(row) => Some(row),
                _ => None,
            })
            .ok_or_else(|| ConnectorError::Protocol("CREATE_REPLICATION_SLOT returned no row".into()))?;

        let consistent_point = row
            .get("consistent_point")
            .ok_or_else(|| ConnectorError::Protocol("CREATE_REPLICATION_SLOT missing consistent_point".into()))?
            .parse::<Lsn>()
            .map_err(|e| ConnectorError::Protocol(format!("unparseable consistent_point: {e}")))?;
        let export_snapshot_id = row.get("snapshot_name").map(str::to_string);

        Ok(SlotHandle {
            slot_name: slot_name.to_string(),
            consistent_point,
            export_snapshot_id,
        })
    }

    /// Begins `START_REPLICATION` from `start_lsn` on a fresh connection
    /// (the control connection stays free for `Acknowledge` bookkeeping
    /// queries and eventual `DropSlot`/`DropPublication` calls).
    pub async fn start_stream(&self, slot_name: &str, start_lsn: Lsn, publication: &str) -> Result<ActiveStream> {
        let stream_client = connection::connect_replication(&self.conninfo).await?;
        let query = format!(
            "START_REPLICATION SLOT \"{slot_name}\" LOGICAL {start_lsn} \
             (proto_version '1', publication_names '{publication}')"
        );
        let duplex = stream_client.copy_both_simple::<bytes::Bytes>(&query).await?;
        let decoder_conn = connection::connect(&self.conninfo).await?;
        Ok(ActiveStream {
            stream: ReplicationStream::new(duplex),
            decoder: Decoder::new(crate::postgres::PgConnector::from_client(decoder_conn)),
        })
    }

    /// Idempotent: `DROP_REPLICATION_SLOT`/`DROP PUBLICATION` on a name
    /// that is already gone is treated as success, not an error, since a
    /// prior teardown attempt may have crashed after the drop committed.
    pub async fn drop_slot(&self, slot_name: &str) -> Result<()> {
        match self
            .control
            .batch_execute(&format!("SELECT pg_drop_replication_slot('{slot_name}')"))
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if is_does_not_exist(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Current WAL insert position on the source, used by table swap-resync
    /// to mark the LSN below which the pre-copy snapshot is guaranteed
    /// consistent (spec §4.7 step 1).
    pub async fn current_wal_lsn(&self) -> Result<Lsn> {
        let row = self.control.query_one("SELECT pg_current_wal_lsn()::text", &[]).await?;
        let text: String = row.get(0);
        text.parse::<Lsn>().map_err(|e| ConnectorError::Protocol(format!("unparseable wal lsn '{text}': {e}")))
    }

    pub async fn drop_publication(&self, name: &str) -> Result<()> {
        match self
            .control
            .batch_execute(&format!("DROP PUBLICATION IF EXISTS \"{name}\""))
            .await
        {
            Ok(()) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn is_does_not_exist(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .map(|db| db.message().contains("does not exist"))
        .unwrap_or(false)
}

/// What `ActiveStream::next` yields: either a decoded row-level change, or
/// a keepalive the CDC loop must answer (immediately if `reply_requested`,
/// otherwise only once its own flush interval elapses).
#[derive(Clone, Debug)]
pub enum StreamItem {
    Change(ChangeEvent),
    KeepAlive { server_lsn: Lsn, reply_requested: bool },
}

/// A live `START_REPLICATION` connection paired with the decoder that turns
/// its raw `pgoutput` messages into `ChangeEvent`s. The CDC loop polls
/// `next()`; `acknowledge` is called separately against the same stream.
pub struct ActiveStream {
    stream: ReplicationStream,
    decoder: Decoder,
}

impl ActiveStream {
    /// Reads and decodes the next item. `Ok(None)` means the source closed
    /// the connection — retryable by re-dialing and resuming from the last
    /// acknowledged LSN.
    pub async fn next(&mut self) -> Result<Option<StreamItem>> {
        loop {
            let Some(event) = self.stream.next_event().await? else {
                return Ok(None);
            };
            match event {
                StreamEvent::Data(message) => {
                    if let Some(change) = self.decoder.decode(message).await? {
                        return Ok(Some(StreamItem::Change(change)));
                    }
                    // Origin/Type messages carry no row-level change; keep reading.
                }
                StreamEvent::KeepAlive { server_lsn, reply_requested } => {
                    return Ok(Some(StreamItem::KeepAlive { server_lsn, reply_requested }));
                }
            }
        }
    }

    pub async fn acknowledge(&mut self, lsn: Lsn, reply_requested: bool) -> Result<()> {
        self.stream.send_standby_status_update(lsn, reply_requested).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_handle_carries_no_snapshot_when_slot_preexisted() {
        let handle = SlotHandle {
            slot_name: "bunny_abcd1234".to_string(),
            consistent_point: Lsn::from_u64(100),
            export_snapshot_id: None,
        };
        assert!(handle.export_snapshot_id.is_none());
    }
}
