//! Frames raw `CopyBoth` bytes into `XLogData`/keepalive records and back
//! into standby status updates (PostgreSQL streaming replication protocol).

use crate::error::{ConnectorError, Result};
use crate::replication::pgoutput::{self, Message};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use model::lsn::Lsn;
use std::pin::Pin;
use tokio_postgres::CopyBothDuplex;

/// Microseconds between the Unix epoch and 2000-01-01, pgoutput's epoch.
const PG_EPOCH_OFFSET_MICROS: i64 = 946_684_800_000_000;

fn now_pg_micros() -> i64 {
    Utc::now().timestamp_micros() - PG_EPOCH_OFFSET_MICROS
}

#[derive(Debug)]
pub enum StreamEvent {
    Data(Message),
    KeepAlive { server_lsn: Lsn, reply_requested: bool },
}

/// A live `START_REPLICATION` connection. Reads deframe the `w`/`k` CopyData
/// tags; writes are standby status updates (`r`).
pub struct ReplicationStream {
    inner: Pin<Box<CopyBothDuplex<Bytes>>>,
}

impl ReplicationStream {
    pub(crate) fn new(inner: CopyBothDuplex<Bytes>) -> Self {
        Self { inner: Box::pin(inner) }
    }

    /// Reads the next framed event. `Ok(None)` means the server closed the
    /// stream (connection drop — retryable per §4.2's failure model).
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>> {
        let Some(frame) = self.inner.next().await else {
            return Ok(None);
        };
        let mut buf = frame?;
        if buf.is_empty() {
            return Err(ConnectorError::Protocol("empty CopyData payload on replication stream".into()));
        }

        match buf.get_u8() {
            b'w' => {
                if buf.remaining() < 24 {
                    return Err(ConnectorError::Protocol("truncated XLogData header".into()));
                }
                buf.advance(24); // wal_start, wal_end, server clock — Begin/Commit carry the LSNs we need
                let message = pgoutput::decode_message(&buf)?;
                Ok(Some(StreamEvent::Data(message)))
            }
            b'k' => {
                if buf.remaining() < 17 {
                    return Err(ConnectorError::Protocol("truncated primary keepalive message".into()));
                }
                let server_lsn = Lsn::from_u64(buf.get_u64());
                buf.advance(8); // server clock
                let reply_requested = buf.get_u8() == 1;
                Ok(Some(StreamEvent::KeepAlive { server_lsn, reply_requested }))
            }
            other => Err(ConnectorError::Protocol(format!(
                "unexpected CopyData tag {other:#x} on replication stream"
            ))),
        }
    }

    /// Sends a standby status update, telling the source it may recycle WAL
    /// up to `lsn` (the `Acknowledge` operation, §4.2). Must follow every
    /// durable checkpoint and must answer every keepalive whose
    /// `reply_requested` flag is set.
    pub async fn send_standby_status_update(&mut self, lsn: Lsn, reply_requested: bool) -> Result<()> {
        let mut body = BytesMut::with_capacity(34);
        body.put_u8(b'r');
        body.put_u64(lsn.as_u64()); // write
        body.put_u64(lsn.as_u64()); // flush
        body.put_u64(lsn.as_u64()); // apply
        body.put_i64(now_pg_micros());
        body.put_u8(if reply_requested { 1 } else { 0 });
        self.inner.send(body.freeze()).await?;
        Ok(())
    }
}
