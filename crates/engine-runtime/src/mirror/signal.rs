//! Signals a control-plane caller can deliver to a running mirror workflow.

use tokio::sync::oneshot;

/// Delivered to the mirror's mailbox and handled between batches, never
/// mid-batch — the worker drains its in-flight batch first.
#[derive(Debug)]
pub enum MirrorMsg {
    Pause,
    Resume,
    Terminate,
    Resync,
    ResyncTable(String),
    SyncSchema,
    /// Cancels a pending retry backoff timer and re-enters the loop now.
    RetryNow,
    /// Synchronous state query, answered once the signal is processed.
    Status(oneshot::Sender<MirrorRunState>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorRunState {
    Running,
    Paused,
    Resyncing,
    Stopped,
}
