//! Core types for the datapolish distributed enhancement pipeline
//!
//! This crate provides the pieces shared between the coordinator and the
//! workers: the error type, layered configuration, the dataset shape model,
//! the filesystem layout and run manifest, and the progress record format.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod dataset;
pub mod error;
pub mod layout;
pub mod progress;

pub use config::Config;
pub use dataset::{detect_shape, extract_entries, rewrap, DatasetShape};
pub use error::{Error, Result};
pub use layout::{FragmentMeta, Layout, RunManifest};
pub use progress::{ProgressRecord, Stage};
