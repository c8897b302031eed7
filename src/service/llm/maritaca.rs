//! Maritaca AI implementation of the LLM client.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use serde_with::skip_serializing_none;
use tracing::{debug, instrument};

use crate::{
    base::{config::Config, types::Res},
    service::trace::{RunType, TraceContext, Tracer, traced},
};

use super::{ChatMessage, GenerateOptions, GenericLlmClient, Generation, LlmClient, TokenUsage};

// Extra methods on `LlmClient` applied by the maritaca implementation.

impl LlmClient {
    pub fn maritaca(config: &Config, tracer: Option<Tracer>) -> Res<Self> {
        let client = MaritacaLlmClient::new(config)?.with_tracer(tracer);
        Ok(Self { inner: Arc::new(client) })
    }
}

// Wire types.

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize)]
struct InferenceRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    repetition_penalty: Option<f32>,
    #[serde(skip_serializing_if = "no_stopping_tokens")]
    stopping_tokens: &'a [String],
    stream: bool,
}

fn no_stopping_tokens(tokens: &&[String]) -> bool {
    tokens.is_empty()
}

#[derive(Debug, Clone, Deserialize)]
struct InferenceResponse {
    answer: String,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

// Specific implementations.

/// Maritaca AI LLM client implementation.
#[derive(Clone)]
pub struct MaritacaLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    tracer: Option<Tracer>,
}

impl MaritacaLlmClient {
    #[instrument(name = "MaritacaLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let api_key = config
            .maritaca_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!("A Maritaca API key is required."))?;

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: config.maritaca_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.maritaca_model.clone(),
            tracer: None,
        })
    }

    pub fn with_tracer(mut self, tracer: Option<Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    async fn infer(&self, request: &InferenceRequest<'_>) -> Res<Generation> {
        let url = format!("{}/chat/inference", self.base_url);
        debug!("POST {url} ({} messages).", request.messages.len());

        let response = self.client.post(&url).header("Authorization", format!("Key {}", self.api_key)).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Maritaca request failed with status {status}: {body}"));
        }

        let response: InferenceResponse = response.json().await?;

        if response.answer.is_empty() {
            return Err(anyhow::anyhow!("Maritaca returned an empty answer."));
        }

        Ok(Generation {
            content: response.answer,
            usage: response.usage,
        })
    }
}

#[async_trait]
impl GenericLlmClient for MaritacaLlmClient {
    #[instrument(name = "MaritacaLlmClient::generate", skip_all)]
    async fn generate(&self, messages: &[ChatMessage], options: &GenerateOptions, trace: &TraceContext) -> Res<Generation> {
        let request = InferenceRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            top_p: options.top_p,
            repetition_penalty: options.repetition_penalty,
            stopping_tokens: &options.stop,
            stream: false,
        };

        traced(
            self.tracer.as_ref(),
            trace,
            "MaritacaAI - GenerateContent",
            RunType::Llm,
            json!({ "payload": request }),
            self.infer(&request),
            |generation| json!({ "output": generation }),
        )
        .await
    }
}

// Tests.
