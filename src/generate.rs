//! Optional generative answering through a local Ollama server.
//!
//! When a generation backend is configured, the pipeline offers the
//! retrieved context to the model before falling back to rule-based
//! composition. The model's output is never trusted blindly: it is
//! sanitized, length-capped, and discarded entirely when too short, so a
//! misbehaving backend can only ever cost latency, not correctness.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GenerationConfig;
use crate::deadline::run_with_deadline;
use crate::error::{PipelineError, Result};

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// One retry on transport errors; HTTP errors fail straight away.
const GENERATION_ATTEMPTS: u32 = 2;

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct Generator {
    client: Client,
    model: String,
    base_url: String,
    temperature: f32,
    context_chars: usize,
    max_response_chars: usize,
    min_response_chars: usize,
    deadline: Duration,
}

impl Generator {
    /// Builds a generator from config, or `None` when generation is
    /// disabled or misconfigured.
    pub fn from_config(config: &GenerationConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }
        let Some(model) = config.model.clone() else {
            warn!("generation enabled but no model configured, skipping");
            return None;
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;

        Some(Self {
            client,
            model,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            temperature: config.temperature,
            context_chars: config.context_chars,
            max_response_chars: config.max_response_chars,
            min_response_chars: config.min_response_chars,
            deadline: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Probes `GET {base_url}/api/tags`.
    pub async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PipelineError::generation(format!("Ollama unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(PipelineError::generation(format!(
                "Ollama health check failed: HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Asks the model to answer from the retrieved context.
    ///
    /// Returns `None` on any failure or when the sanitized output is too
    /// short to be a usable answer; the caller then composes its own reply.
    pub async fn complete(&self, question: &str, context: &str) -> Option<String> {
        let prompt = self.build_prompt(question, context);

        let client = self.client.clone();
        let url = format!("{}/api/generate", self.base_url);
        let model = self.model.clone();
        let temperature = self.temperature;
        let result = run_with_deadline("generative completion", self.deadline, async move {
            request_completion(&client, &url, model, temperature, prompt).await
        })
        .await;

        match result {
            Ok(Ok(raw)) => self.sanitize(&raw, question),
            Ok(Err(e)) => {
                warn!("generation failed: {}", e);
                None
            }
            Err(_) => None,
        }
    }

    fn build_prompt(&self, question: &str, context: &str) -> String {
        let context: String = context.chars().take(self.context_chars).collect();
        format!(
            "Você é um assistente virtual de uma universidade brasileira. Responda à pergunta do aluno usando apenas as informações do contexto abaixo. Responda em português, de forma curta e objetiva.\n\nContexto:\n{}\n\nPergunta: {}\n\nResposta:",
            context.trim(),
            question.trim()
        )
    }

    /// Strips echoed prompt fragments, caps the length, and rejects
    /// answers too short to mean anything.
    fn sanitize(&self, raw: &str, question: &str) -> Option<String> {
        let mut text = raw.trim();

        for label in ["Resposta:", "resposta:", "RESPOSTA:"] {
            if let Some(rest) = text.strip_prefix(label) {
                text = rest.trim();
            }
        }
        let question = question.trim();
        if !question.is_empty() {
            if let Some(rest) = text.strip_prefix(question) {
                text = rest.trim_start_matches([':', '?', ' ', '\n']);
            }
        }

        let mut text: String = text.chars().take(self.max_response_chars).collect();
        text.truncate(text.trim_end().len());

        if text.chars().count() < self.min_response_chars {
            debug!(
                "discarding generated answer of {} chars (minimum {})",
                text.chars().count(),
                self.min_response_chars
            );
            return None;
        }
        Some(text)
    }
}

async fn request_completion(
    client: &Client,
    url: &str,
    model: String,
    temperature: f32,
    prompt: String,
) -> Result<String> {
    let mut last_error = None;

    for attempt in 0..GENERATION_ATTEMPTS {
        let request = GenerateRequest {
            model: model.clone(),
            prompt: prompt.clone(),
            stream: false,
            options: GenerateOptions { temperature },
        };

        match client.post(url).json(&request).send().await {
            Ok(response) => {
                if !response.status().is_success() {
                    return Err(PipelineError::generation(format!(
                        "generation failed: HTTP {}",
                        response.status()
                    )));
                }
                let parsed: GenerateResponse = response.json().await.map_err(|e| {
                    PipelineError::generation(format!("unparseable generation response: {}", e))
                })?;
                return Ok(parsed.response);
            }
            Err(e) => {
                warn!(
                    "generation request failed (attempt {}/{}): {}",
                    attempt + 1,
                    GENERATION_ATTEMPTS,
                    e
                );
                last_error = Some(e);
                if attempt + 1 < GENERATION_ATTEMPTS {
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    Err(PipelineError::generation(format!(
        "generation request failed after {} attempts: {}",
        GENERATION_ATTEMPTS,
        last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown error".to_string())
    )))
}
