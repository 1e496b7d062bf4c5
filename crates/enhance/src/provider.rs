//! Trait definition for enhancement providers

use async_trait::async_trait;
use datapolish_core::error::Result;
use serde_json::Value;

/// Trait for enhancement providers
///
/// The enhancement service is an external collaborator reached through this
/// narrow interface. Callers own their own retry and degrade policy: a
/// single `enhance` call is one attempt, and a failure is a transient-error
/// signal, not a reason to abort processing.
#[async_trait]
pub trait Enhancer: Send + Sync {
    /// Verify the service is reachable and the model is available,
    /// performing whatever startup work that requires.
    ///
    /// Called once before a worker enters its processing loop.
    async fn ensure_ready(&self) -> Result<()>;

    /// Enhance a single entry, returning the transformed entry.
    ///
    /// The returned entry carries all fields of the input with the enhanced
    /// text substituted; the input entry itself is never mutated.
    async fn enhance(&self, entry: &Value) -> Result<Value>;
}
