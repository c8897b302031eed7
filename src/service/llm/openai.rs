//! OpenAI-compatible implementation of the LLM client.

use std::{sync::Arc, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse, Stop,
    },
};
use async_trait::async_trait;
use serde_json::json;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::{
    base::{config::Config, types::Res},
    service::trace::{RunType, TraceContext, Tracer, traced},
};

use super::{ChatMessage, ChatRole, GenerateOptions, GenericLlmClient, Generation, LlmClient, TokenUsage};

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config, tracer: Option<Tracer>) -> Self {
        let client = OpenAiLlmClient::new(config).with_tracer(tracer);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
///
/// Any host that speaks the chat completions API works through `openai_base_url`.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    model: String,
    tracer: Option<Tracer>,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone()).with_api_base(config.openai_base_url.clone());

        Self {
            client: Client::with_config(cfg),
            model: config.chat_model.clone(),
            tracer: None,
        }
    }

    pub fn with_tracer(mut self, tracer: Option<Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Build the completion request.
    #[instrument(name = "OpenAiLlmClient::build_request", skip_all)]
    fn build_request(&self, messages: &[ChatMessage], options: &GenerateOptions) -> Res<CreateChatCompletionRequest> {
        let messages = messages.iter().map(to_request_message).collect::<Res<Vec<_>>>()?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(options.model.as_deref().unwrap_or(&self.model)).messages(messages);

        if let Some(max_tokens) = options.max_tokens {
            request.max_completion_tokens(max_tokens);
        }

        if let Some(temperature) = options.temperature {
            request.temperature(temperature);
        }

        if let Some(top_p) = options.top_p {
            request.top_p(top_p);
        }

        if !options.stop.is_empty() {
            request.stop(Stop::StringArray(options.stop.clone()));
        }

        Ok(request.build()?)
    }

    /// Helper function to make OpenAI API calls with retry logic and timeout handling.
    async fn call_openai_api(&self, request: CreateChatCompletionRequest) -> Res<CreateChatCompletionResponse> {
        const MAX_RETRIES: u32 = 3;
        const TIMEOUT: u64 = 120;
        const RETRY_DELAY_MS: u64 = 1000;

        let mut retries = 0;

        loop {
            let result = timeout(Duration::from_secs(TIMEOUT), self.client.chat().create(request.clone())).await;

            match result {
                Ok(Ok(response)) => {
                    info!("OpenAI API call succeeded after {} attempts", retries + 1);
                    return Ok(response);
                }
                Ok(Err(err)) if !is_transient(&err) => {
                    return Err(anyhow::anyhow!("OpenAI API call failed: {err}"));
                }
                Ok(Err(err)) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("OpenAI API call failed after {MAX_RETRIES} retries: {err}"));
                    }
                    retries += 1;
                    warn!("OpenAI API call failed, retrying {retries}/{MAX_RETRIES}: {err}");

                    let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
                    tokio::time::sleep(delay).await;
                }
                Err(_) => {
                    if retries >= MAX_RETRIES {
                        return Err(anyhow::anyhow!("OpenAI API call timed out after {MAX_RETRIES} attempts"));
                    }
                    retries += 1;
                    warn!("OpenAI API call timed out, retrying {retries}/{MAX_RETRIES}");

                    let delay = Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1));
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn complete(&self, request: CreateChatCompletionRequest) -> Res<Generation> {
        let response = self.call_openai_api(request).await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow::anyhow!("The completion has no content."))?;

        let usage = response.usage.map(|usage| TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        });

        Ok(Generation { content, usage })
    }
}

/// Whether a failed call is worth repeating.
///
/// API errors arrive after `async-openai` has already backed off on 429s and 5xxs,
/// so only connection level failures are retried here.
fn is_transient(err: &OpenAIError) -> bool {
    matches!(err, OpenAIError::Reqwest(_))
}

fn to_request_message(message: &ChatMessage) -> Res<ChatCompletionRequestMessage> {
    let content = message.content.clone();

    Ok(match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default().content(content).build()?.into(),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default().content(content).build()?.into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default().content(content).build()?.into(),
    })
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::generate", skip_all)]
    async fn generate(&self, messages: &[ChatMessage], options: &GenerateOptions, trace: &TraceContext) -> Res<Generation> {
        let request = self.build_request(messages, options)?;
        let inputs = json!({ "payload": request });

        traced(self.tracer.as_ref(), trace, "OpenAI - GenerateContent", RunType::Llm, inputs, self.complete(request), |generation| json!({ "output": generation })).await
    }
}

// Tests.
