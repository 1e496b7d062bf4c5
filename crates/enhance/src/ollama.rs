//! Ollama-compatible enhancement provider

use crate::provider::Enhancer;
use async_trait::async_trait;
use datapolish_core::config::EnhancerConfig;
use datapolish_core::error::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interval between readiness probes while the service starts up
const READINESS_PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Request payload for the chat endpoint
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f64,
    num_predict: u32,
}

/// Response from the chat endpoint
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Response from the tags (model list) endpoint
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest {
    name: String,
    stream: bool,
}

/// Enhancement provider backed by an Ollama-compatible HTTP API
pub struct OllamaEnhancer {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    num_predict: u32,
    readiness_timeout: Duration,
}

impl OllamaEnhancer {
    /// Create a new provider from configuration
    pub fn new(config: &EnhancerConfig) -> Result<Self> {
        info!("Initializing Ollama enhancement provider");
        info!("  Base URL: {}", config.base_url);
        info!("  Model: {}", config.model);
        info!("  Temperature: {}", config.temperature);
        info!("  Max tokens: {}", config.num_predict);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| Error::enhance(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            num_predict: config.num_predict,
            readiness_timeout: Duration::from_secs(config.readiness_timeout_secs),
        })
    }

    /// List the models the service currently has available
    async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::enhance(format!("Model list request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::enhance(format!(
                "Model list request returned {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::enhance(format!("Failed to parse model list: {e}")))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Pull the configured model into the service
    async fn pull_model(&self) -> Result<()> {
        info!("Pulling model {}", self.model);

        let url = format!("{}/api/pull", self.base_url);
        let request = PullRequest {
            name: self.model.clone(),
            stream: false,
        };

        // Pulls can take far longer than a chat request; no client timeout
        // would be ideal, but a generous fixed one keeps a wedged service
        // from hanging the worker forever.
        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(3600))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::enhance(format!("Model pull request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::enhance(format!(
                "Model pull returned {}",
                response.status()
            )));
        }

        info!("Model {} pulled", self.model);
        Ok(())
    }
}

#[async_trait]
impl Enhancer for OllamaEnhancer {
    async fn ensure_ready(&self) -> Result<()> {
        info!("Starting enhancement service readiness check");

        // The service may still be booting; probe until reachable or the
        // readiness timeout elapses.
        let deadline = tokio::time::Instant::now() + self.readiness_timeout;
        let models = loop {
            match self.list_models().await {
                Ok(models) => break models,
                Err(e) if tokio::time::Instant::now() < deadline => {
                    debug!("Service not reachable yet: {e}");
                    tokio::time::sleep(READINESS_PROBE_INTERVAL).await;
                }
                Err(e) => {
                    warn!("Enhancement service never became reachable: {e}");
                    return Err(Error::enhance(format!(
                        "Service not reachable within {:?}: {e}",
                        self.readiness_timeout
                    )));
                }
            }
        };

        if models.iter().any(|name| name == &self.model) {
            debug!("Model {} already present", self.model);
        } else {
            self.pull_model().await?;
        }

        info!("Enhancement service ready");
        Ok(())
    }

    async fn enhance(&self, entry: &Value) -> Result<Value> {
        let prompt = build_prompt(entry);

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt,
            }],
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
                num_predict: self.num_predict,
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::enhance(format!("Chat request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(Error::enhance(format!(
                "Chat request returned {status}: {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::enhance(format!("Failed to parse chat response: {e}")))?;

        Ok(apply_enhancement(entry, chat.message.content.trim()))
    }
}

/// Build the enhancement prompt from an entry's `input` and `output` fields
fn build_prompt(entry: &Value) -> String {
    let code_sample = entry.get("input").and_then(Value::as_str).unwrap_or("");
    let original_output = entry.get("output").and_then(Value::as_str).unwrap_or("");

    format!(
        "You are a cybersecurity expert. Improve the following vulnerability explanation by:\n\
         1. Fixing grammar and sentence structure\n\
         2. Making the description more clear and descriptive\n\
         3. Ensuring proper technical explanations while keeping the same structure\n\
         4. Maintaining all technical details (CWE numbers, line numbers, function names)\n\
         5. Not deviating from the original description\n\
         6. Provide only the description no fluff or other things like intro\n\
         \n\
         The vulnerability relates to this code:\n\
         ```c/cpp\n\
         {code_sample}\n\
         ```\n\
         \n\
         Original vulnerability description:\n\
         {original_output}\n\
         \n\
         Enhanced description:"
    )
}

/// Return a copy of `entry` with the enhanced text substituted for `output`
fn apply_enhancement(entry: &Value, enhanced: &str) -> Value {
    let mut updated = entry.clone();
    if let Value::Object(map) = &mut updated {
        map.insert("output".to_string(), Value::String(enhanced.to_string()));
    }
    updated
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_build_prompt_includes_entry_fields() {
        let entry = json!({"input": "int main() {}", "output": "buffer overflow"});
        let prompt = build_prompt(&entry);
        assert!(prompt.contains("int main() {}"));
        assert!(prompt.contains("buffer overflow"));
    }

    #[test]
    fn test_build_prompt_tolerates_missing_fields() {
        let prompt = build_prompt(&json!({"other": 1}));
        assert!(prompt.contains("Enhanced description:"));
    }

    #[test]
    fn test_apply_enhancement_preserves_other_fields() {
        let entry = json!({"input": "code", "output": "old", "cwe": "CWE-79"});
        let updated = apply_enhancement(&entry, "new description");
        assert_eq!(updated["output"], json!("new description"));
        assert_eq!(updated["input"], json!("code"));
        assert_eq!(updated["cwe"], json!("CWE-79"));
        // Original untouched
        assert_eq!(entry["output"], json!("old"));
    }
}
