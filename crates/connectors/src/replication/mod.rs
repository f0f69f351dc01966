//! The source connector: publication/slot lifecycle and the decoded
//! change-event stream built on top of `pgoutput`/`stream`.

pub mod client;
pub mod decoder;
pub mod pgoutput;
pub mod stream;

pub use client::{SlotHandle, SourceConnector};
pub use decoder::ChangeEvent;
