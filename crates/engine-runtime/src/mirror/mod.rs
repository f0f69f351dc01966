//! Per-mirror CDC loop, its signal mailbox, and the supervisor that
//! restarts it under the shared retry policy.

pub mod provision;
pub mod signal;
pub mod supervisor;
pub mod worker;

pub use provision::provision_mirror;
pub use signal::{MirrorMsg, MirrorRunState};
pub use supervisor::{MirrorHandle, MirrorSupervisor};
pub use worker::{CdcWorker, MirrorTuning, WorkerFactory, WorkerOutcome};
