//! Coordinator-side monitoring and aggregation for datapolish
//!
//! The coordinator never writes worker-owned files: it tails logs, reads
//! progress records, polls for result files, renders a live dashboard, and
//! once every worker is done, recombines per-worker results into a single
//! output in the original document shape.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod aggregate;
pub mod classifier;
pub mod display;
pub mod monitor;
pub mod status;
pub mod watcher;

pub use aggregate::combine;
pub use monitor::Monitor;
pub use status::{StatusBoard, WorkerState, WorkerStatus};
pub use watcher::WorkerWatcher;
