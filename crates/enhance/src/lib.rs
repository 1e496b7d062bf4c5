//! Enhancement service collaborators for datapolish
//!
//! The per-entry text enhancement is an opaque external service. This crate
//! defines the [`Enhancer`] trait the checkpointed processor consumes, an
//! Ollama-compatible HTTP implementation, and mock providers for tests.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod mock;
mod ollama;
mod provider;

pub use mock::{FailingEnhancer, FlakyEnhancer, PassthroughEnhancer, TaggingEnhancer};
pub use ollama::OllamaEnhancer;
pub use provider::Enhancer;
