//! Client for the digest backend REST API.
//!
//! The backend only exposes independent collections, so views that need a
//! bot together with its channels, categories and AI results are assembled
//! here:
//!
//! - [`Aggregator`] fans out the sub-requests and degrades failed branches to
//!   empty lists.
//! - [`EditBuffer`] keeps unsaved edits locally and flushes them in parallel.
//! - [`ResponseGate`] and [`Poller`] drop responses that were overtaken by a
//!   newer one.

pub mod aggregate;
pub mod buffer;
pub mod client;
pub mod config;
pub mod error;
pub mod poll;

pub use aggregate::{Aggregator, BotAggregate, CategoryCatalog};
pub use buffer::{BufferState, EditBuffer, FlushReport, FlushTrigger};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use poll::{CycleOutcome, Failure, Poller, ResponseGate, Snapshot, Ticket};
