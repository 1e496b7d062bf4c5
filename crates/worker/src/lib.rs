//! Checkpointed worker processing for datapolish
//!
//! A worker loads its assigned fragment, enhances entries sequentially
//! through the enhancement collaborator, persists checkpoints at a fixed
//! cadence, and resumes from the last valid checkpoint after a crash.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod checkpoint;
mod processor;

pub use checkpoint::Checkpoint;
pub use processor::{ProcessOutcome, Processor};
