//! OpenAI-compatible HTTP client for embeddings and completions.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{stuff_documents, Completer, Embedder};
use crate::error::LlmError;
use crate::models::config::SemanticConfig;

/// Completion length cap. The completions endpoint otherwise defaults to a
/// handful of tokens, too few for a nine-field JSON object.
const MAX_COMPLETION_TOKENS: u32 = 256;

/// Blocking client for `/embeddings` and `/completions`.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    completion_model: String,
    timeout_secs: u64,
}

impl OpenAiClient {
    /// Create a client from the semantic configuration.
    pub fn from_config(config: &SemanticConfig) -> Result<Self, LlmError> {
        let api_key = config.resolve_api_key()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            embedding_model: config.embedding_model.clone(),
            completion_model: config.completion_model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, LlmError> {
        let url = format!("{}/{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    LlmError::Timeout(self.timeout_secs)
                } else {
                    LlmError::Http(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

impl Embedder for OpenAiClient {
    fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| LlmError::InvalidEmbedding("empty embedding response".into()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
        };
        let parsed: EmbeddingResponse = self
            .post("embeddings", &request)?
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        order_embeddings(parsed.data, texts.len())
    }
}

impl Completer for OpenAiClient {
    fn complete(
        &self,
        instruction: &str,
        documents: &[&str],
        temperature: f32,
    ) -> Result<String, LlmError> {
        let prompt = stuff_documents(instruction, documents);
        let request = CompletionRequest {
            model: &self.completion_model,
            prompt: &prompt,
            temperature,
            max_tokens: MAX_COMPLETION_TOKENS,
        };

        let parsed: CompletionResponse = self
            .post("completions", &request)?
            .json()
            .map_err(|e| LlmError::ResponseParsing(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| LlmError::ResponseParsing("no completion choices".into()))?;

        debug!("Completion returned {} chars", text.len());
        Ok(text)
    }
}

/// Put embeddings back in request order; the API reports each item's index.
fn order_embeddings(items: Vec<EmbeddingItem>, expected: usize) -> Result<Vec<Vec<f32>>, LlmError> {
    if items.len() != expected {
        return Err(LlmError::InvalidEmbedding(format!(
            "expected {} embeddings, got {}",
            expected,
            items.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in items {
        let slot = slots
            .get_mut(item.index)
            .ok_or_else(|| LlmError::InvalidEmbedding(format!("index {} out of range", item.index)))?;
        *slot = Some(item.embedding);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, slot)| {
            slot.ok_or_else(|| LlmError::InvalidEmbedding(format!("missing embedding {}", i)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_embeddings_by_index() {
        let items: Vec<EmbeddingItem> =
            serde_json::from_str::<EmbeddingResponse>(
                r#"{"data":[{"index":1,"embedding":[0.5]},{"index":0,"embedding":[0.25]}]}"#,
            )
            .unwrap()
            .data;

        let ordered = order_embeddings(items, 2).unwrap();
        assert_eq!(ordered, vec![vec![0.25], vec![0.5]]);
    }

    #[test]
    fn test_order_embeddings_rejects_gaps() {
        let items = vec![
            EmbeddingItem { index: 1, embedding: vec![1.0] },
            EmbeddingItem { index: 1, embedding: vec![2.0] },
        ];
        assert!(matches!(
            order_embeddings(items, 2),
            Err(LlmError::InvalidEmbedding(_))
        ));
    }

    #[test]
    fn test_completion_request_shape() {
        let request = CompletionRequest {
            model: "m",
            prompt: "p",
            temperature: 0.0,
            max_tokens: MAX_COMPLETION_TOKENS,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert_eq!(json["max_tokens"], 256);
    }

    #[test]
    fn test_missing_key_fails_construction() {
        let config = SemanticConfig {
            api_key: None,
            api_key_env: "EMID_TEST_KEY_THAT_IS_NEVER_SET".into(),
            ..SemanticConfig::default()
        };
        assert!(matches!(
            OpenAiClient::from_config(&config),
            Err(LlmError::MissingApiKey(_))
        ));
    }
}
