//! Chat-style text generation.
//!
//! The [`GenericLlmClient`] trait takes a conversation and returns one
//! completion. [`maritaca`] talks to Maritaca AI, [`openai`] to any
//! OpenAI-compatible chat completions endpoint (OpenAI, NVIDIA NIM, ...).

pub mod maritaca;
pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{base::types::Res, service::trace::TraceContext};

// Types.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: ChatRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: ChatRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-call sampling options. Unset fields fall back to the provider's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOptions {
    /// Overrides the configured model.
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    /// Only honored by providers that support it (Maritaca).
    pub repetition_penalty: Option<f32>,
    pub stop: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

/// A single completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Generation {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

// Traits.

/// Generic LLM client trait that clients must implement.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Generate the next assistant turn of `messages`.
    ///
    /// The call is recorded under `trace` when the client has a tracer.
    async fn generate(&self, messages: &[ChatMessage], options: &GenerateOptions, trace: &TraceContext) -> Res<Generation>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }

    /// Answer a single user prompt with default options.
    pub async fn call(&self, prompt: &str, trace: &TraceContext) -> Res<String> {
        let generation = self.generate(&[ChatMessage::user(prompt)], &GenerateOptions::default(), trace).await?;
        Ok(generation.content)
    }
}

// Tests.
