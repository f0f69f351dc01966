//! Owns the spawned task for one mirror's CDC loop, restarting it under
//! the shared retry policy and mirroring every lifecycle transition into
//! the catalog.

use crate::mirror::signal::{MirrorMsg, MirrorRunState};
use crate::mirror::worker::{WorkerFactory, WorkerOutcome};
use catalog::CatalogStore;
use chrono::Utc;
use engine_core::error::EngineError;
use engine_core::retry::RetryPolicy;
use model::core::identifiers::MirrorName;
use model::mirror::MirrorStatus;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// A handle the control plane holds per running mirror. Cloning shares the
/// same mailbox; dropping every clone lets the worker's mailbox close.
#[derive(Clone)]
pub struct MirrorHandle {
    mirror: MirrorName,
    tx: mpsc::Sender<MirrorMsg>,
}

impl MirrorHandle {
    pub async fn pause(&self) -> Result<(), EngineError> {
        self.send(MirrorMsg::Pause).await
    }

    pub async fn resume(&self) -> Result<(), EngineError> {
        self.send(MirrorMsg::Resume).await
    }

    pub async fn terminate(&self) -> Result<(), EngineError> {
        self.send(MirrorMsg::Terminate).await
    }

    pub async fn resync_table(&self, table: impl Into<String>) -> Result<(), EngineError> {
        self.send(MirrorMsg::ResyncTable(table.into())).await
    }

    pub async fn resync(&self) -> Result<(), EngineError> {
        self.send(MirrorMsg::Resync).await
    }

    pub async fn sync_schema(&self) -> Result<(), EngineError> {
        self.send(MirrorMsg::SyncSchema).await
    }

    pub async fn retry_now(&self) -> Result<(), EngineError> {
        self.send(MirrorMsg::RetryNow).await
    }

    pub async fn status(&self) -> Result<MirrorRunState, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(MirrorMsg::Status(reply_tx)).await?;
        reply_rx.await.map_err(|_| {
            EngineError::invariant(format!("mirror {} closed its mailbox before answering status", self.mirror))
        })
    }

    async fn send(&self, msg: MirrorMsg) -> Result<(), EngineError> {
        self.tx.send(msg).await.map_err(|_| {
            EngineError::invariant(format!("mirror {} is not running (mailbox closed)", self.mirror))
        })
    }
}

/// Supervises one mirror's worker task across transient-error restarts.
/// A `Resync` signal unwinds the worker entirely; the supervisor re-drives
/// the snapshot phase before building a fresh worker.
pub struct MirrorSupervisor {
    mirror: MirrorName,
    catalog: Arc<CatalogStore>,
    join: JoinHandle<()>,
}

impl MirrorSupervisor {
    /// Spawns the supervised task. `factory` opens a fresh connection pair
    /// and reloads table mappings each time the loop restarts (after a
    /// transient failure, a full resync, or a `RetryNow` signal), since a
    /// worker's connections don't survive past one `run`.
    pub fn spawn(
        mirror: MirrorName,
        catalog: Arc<CatalogStore>,
        mailbox_capacity: usize,
        factory: WorkerFactory,
    ) -> (Self, MirrorHandle) {
        let (tx, rx) = mpsc::channel(mailbox_capacity);
        let handle = MirrorHandle { mirror: mirror.clone(), tx };

        let supervised_mirror = mirror.clone();
        let supervised_catalog = catalog.clone();
        let join = tokio::spawn(async move {
            Self::supervise(supervised_mirror, supervised_catalog, rx, factory).await;
        });

        (Self { mirror, catalog, join }, handle)
    }

    async fn supervise(
        mirror: MirrorName,
        catalog: Arc<CatalogStore>,
        mut rx: mpsc::Receiver<MirrorMsg>,
        factory: WorkerFactory,
    ) {
        let retry = RetryPolicy::unlimited_transient();
        let mut attempt = 0usize;

        loop {
            let worker = match factory.build().await {
                Ok(worker) => worker,
                Err(err) => {
                    attempt += 1;
                    warn!(mirror = %mirror, attempt, error = %err, "failed to open mirror connections, retrying");
                    record_failure(&catalog, &mirror, &err).await;
                    tokio::time::sleep(retry.backoff_delay(attempt)).await;
                    continue;
                }
            };
            attempt = 0;
            let (loopback_tx, loopback_rx) = mpsc::channel(1);
            // The worker consumes its mailbox directly; forward signals from
            // the supervisor's own receiver into a fresh channel each run so
            // a restarted worker starts with an empty mailbox.
            let forward = forward_signals(&mut rx, loopback_tx);
            tokio::pin!(forward);

            let run = worker.run(loopback_rx);
            tokio::pin!(run);

            let outcome = tokio::select! {
                result = &mut run => result,
                _ = &mut forward => {
                    // Signal channel closed (all handles dropped); let the
                    // in-flight run finish naturally.
                    run.await
                }
            };

            match outcome {
                Ok(WorkerOutcome::Stopped) => {
                    let _ = catalog.mark_terminated(&mirror, Utc::now()).await;
                    let _ = catalog
                        .record_event(&model::events::OperatorEvent::new(
                            model::events::EventLevel::Info,
                            model::events::EventCategory::UserAction,
                            mirror.clone(),
                            "mirror terminated",
                        ))
                        .await;
                    return;
                }
                Ok(WorkerOutcome::ResyncRequested) => {
                    info!(mirror = %mirror, "full resync copied every table; rebuilding the worker to resume streaming");
                    attempt = 0;
                }
                Err(err) if err.retryable() => {
                    attempt += 1;
                    warn!(mirror = %mirror, attempt, error = %err, "mirror loop failed transiently, retrying");
                    record_failure(&catalog, &mirror, &err).await;
                    tokio::time::sleep(retry.backoff_delay(attempt)).await;
                }
                Err(err) => {
                    error!(mirror = %mirror, error = %err, "mirror loop failed fatally");
                    record_failure(&catalog, &mirror, &err).await;
                    return;
                }
            }
        }
    }

    pub async fn join(self) {
        let _ = self.join.await;
    }

    pub fn mirror(&self) -> &MirrorName {
        &self.mirror
    }
}

async fn forward_signals(rx: &mut mpsc::Receiver<MirrorMsg>, tx: mpsc::Sender<MirrorMsg>) {
    while let Some(msg) = rx.recv().await {
        if tx.send(msg).await.is_err() {
            return;
        }
    }
}

async fn record_failure(catalog: &CatalogStore, mirror: &MirrorName, err: &EngineError) {
    if let Ok(mut row) = catalog.get_mirror(mirror).await {
        if row.status.can_transition_to(MirrorStatus::Failed) {
            row.status = MirrorStatus::Failed;
        }
        row.last_error = Some(err.to_string());
        row.error_count += 1;
        row.updated_at = Utc::now();
        let _ = catalog.put_mirror(&row).await;
    }
    let _ = catalog
        .record_event(&model::events::OperatorEvent::new(
            model::events::EventLevel::Error,
            model::events::EventCategory::Error,
            mirror.clone(),
            err.to_string(),
        ))
        .await;
}
