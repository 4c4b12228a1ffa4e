use crate::traits::{InferenceError, LlmClient, LlmResponse, Result};
use async_trait::async_trait;
use gleaner_http::{HttpClient, HttpError, RequestOpts};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const OLLAMA_CONNECTION_ERROR: &str = "No running Ollama server detected. Start it with: `ollama serve` (after installing). Install instructions: https://github.com/ollama/ollama";

/// Pulling a model downloads gigabytes; give it far longer than a generation.
const PULL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Knobs applied when connecting to an Ollama server.
#[derive(Debug, Clone)]
pub struct OllamaOptions {
    /// Timeout for a single `/api/generate` call.
    pub request_timeout: Duration,
    /// Pull the model if `/api/tags` does not list it.
    pub pull_missing: bool,
}

impl Default for OllamaOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            pull_missing: true,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Default, Serialize)]
struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u32>,
}

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
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

/// Ollama client for local model inference.
///
/// Expects a running Ollama server (see https://github.com/ollama/ollama).
pub struct OllamaClient {
    http: HttpClient,
    base_url: String,
    model: String,
    options: OllamaOptions,
}

impl OllamaClient {
    /// Create a new client and verify server/model availability.
    pub async fn connect(base_url: &str, model: &str, options: OllamaOptions) -> Result<Self> {
        let http = HttpClient::new()?.with_timeout(options.request_timeout);
        let client = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            options,
        };

        let models = client.probe_server().await?;
        client.ensure_model_available(&models).await?;

        Ok(client)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// List the server's models, mapping connection failures to a setup hint.
    async fn probe_server(&self) -> Result<Vec<String>> {
        self.list_models().await.map_err(|e| match e {
            InferenceError::Unreachable(_) | InferenceError::Timeout(_) => {
                InferenceError::Unreachable(OLLAMA_CONNECTION_ERROR.to_string())
            }
            other => other,
        })
    }

    async fn ensure_model_available(&self, models: &[String]) -> Result<()> {
        if models.iter().any(|name| model_matches(name, &self.model)) {
            return Ok(());
        }

        if !self.options.pull_missing {
            return Err(InferenceError::ModelNotAvailable(format!(
                "{} (run `ollama pull {}`)",
                self.model, self.model
            )));
        }

        tracing::info!(target: "llm.ollama", model = %self.model, "model not found locally, pulling");
        self.pull_model().await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let tags: TagsResponse = self
            .http
            .get_json(&self.url("/api/tags"), RequestOpts::default())
            .await?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn pull_model(&self) -> Result<()> {
        let payload = PullRequest {
            model: &self.model,
            stream: false,
        };
        let opts = RequestOpts {
            timeout: Some(PULL_TIMEOUT),
            ..Default::default()
        };

        match self
            .http
            .post_json::<_, serde_json::Value>(&self.url("/api/pull"), &payload, opts)
            .await
        {
            Ok(_) => {
                tracing::info!(target: "llm.ollama", model = %self.model, "pulled model");
                Ok(())
            }
            Err(HttpError::Status { message, .. }) => Err(InferenceError::ModelNotAvailable(
                format!("{}: {}", self.model, message),
            )),
            Err(other) => Err(other.into()),
        }
    }
}

/// Ollama reports untagged models with an implicit `:latest` suffix.
fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || (!wanted.contains(':') && listed == format!("{wanted}:latest"))
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            system: system_prompt,
            stream: false,
            options: GenerateOptions {
                temperature,
                num_predict: max_tokens,
            },
        };

        tracing::debug!(
            target: "llm.ollama",
            model = %self.model,
            prompt_len = prompt.len(),
            "generate"
        );

        let resp: GenerateResponse = self
            .http
            .post_json(&self.url("/api/generate"), &payload, RequestOpts::default())
            .await?;

        tracing::debug!(
            target: "llm.ollama",
            response_len = resp.response.len(),
            eval_count = ?resp.eval_count,
            "generate.done"
        );

        Ok(LlmResponse {
            text: resp.response,
            tokens_used: resp.eval_count,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untagged_model_matches_latest() {
        assert!(model_matches("llama3:latest", "llama3"));
        assert!(model_matches("gemma3:1b", "gemma3:1b"));
        assert!(!model_matches("gemma3:4b", "gemma3:1b"));
        assert!(!model_matches("llama3:latest", "llama3:8b"));
    }

    #[test]
    fn generate_request_omits_unset_fields() {
        let req = GenerateRequest {
            model: "m",
            prompt: "p",
            system: None,
            stream: false,
            options: GenerateOptions::default(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"model": "m", "prompt": "p", "stream": false, "options": {}})
        );
    }
}
