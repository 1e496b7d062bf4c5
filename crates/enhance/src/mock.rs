//! Mock enhancement providers for testing

use crate::provider::Enhancer;
use async_trait::async_trait;
use datapolish_core::error::{Error, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Enhancer that returns every entry unchanged
pub struct PassthroughEnhancer;

#[async_trait]
impl Enhancer for PassthroughEnhancer {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn enhance(&self, entry: &Value) -> Result<Value> {
        Ok(entry.clone())
    }
}

/// Enhancer that tags each entry's `output` field, making transformed
/// entries distinguishable from originals in assertions
pub struct TaggingEnhancer {
    pub tag: String,
}

#[async_trait]
impl Enhancer for TaggingEnhancer {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn enhance(&self, entry: &Value) -> Result<Value> {
        let mut updated = entry.clone();
        if let Value::Object(map) = &mut updated {
            map.insert("output".to_string(), Value::String(self.tag.clone()));
        }
        Ok(updated)
    }
}

/// Enhancer whose every call fails
pub struct FailingEnhancer;

#[async_trait]
impl Enhancer for FailingEnhancer {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn enhance(&self, _entry: &Value) -> Result<Value> {
        Err(Error::enhance("mock failure"))
    }
}

/// Enhancer that fails the first `failures` calls, then passes entries
/// through, counting total attempts
pub struct FlakyEnhancer {
    failures: usize,
    attempts: AtomicUsize,
}

impl FlakyEnhancer {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Enhancer for FlakyEnhancer {
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn enhance(&self, entry: &Value) -> Result<Value> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.failures {
            Err(Error::enhance(format!("mock transient failure {attempt}")))
        } else {
            Ok(entry.clone())
        }
    }
}
