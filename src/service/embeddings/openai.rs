//! OpenAI-compatible implementation of the embedder.

use std::sync::Arc;

use async_openai::{Client, config::OpenAIConfig, types::CreateEmbeddingRequestArgs};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, instrument};

use crate::{
    base::{config::Config, types::Res},
    service::trace::{RunType, TraceContext, Tracer, traced},
};

use super::{Embedder, GenericEmbedder, embed_in_batches};

// Extra methods on `Embedder` applied by the openai implementation.

impl Embedder {
    pub fn openai(config: &Config, tracer: Option<Tracer>) -> Self {
        let embedder = OpenAiEmbedder::new(config).with_tracer(tracer);
        Self { inner: Arc::new(embedder) }
    }
}

// Specific implementations.

/// OpenAI embedder implementation.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    batch_size: usize,
    strip_new_lines: bool,
    tracer: Option<Tracer>,
}

impl OpenAiEmbedder {
    #[instrument(name = "OpenAiEmbedder::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone()).with_api_base(config.openai_base_url.clone());

        Self {
            client: Client::with_config(cfg),
            model: config.embeddings_model.clone(),
            batch_size: config.embeddings_batch_size,
            strip_new_lines: config.embeddings_strip_new_lines,
            tracer: None,
        }
    }

    pub fn with_tracer(mut self, tracer: Option<Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    #[instrument(name = "OpenAiEmbedder::create_embedding", skip_all)]
    async fn create_embedding(&self, texts: Vec<String>, trace: &TraceContext) -> Res<Vec<Vec<f32>>> {
        let inputs = json!({ "input": texts, "model": self.model });

        traced(self.tracer.as_ref(), trace, "OpenAI - Create Embedding", RunType::Embedding, inputs, self.request(texts), |embeddings| json!({ "output": embeddings })).await
    }

    async fn request(&self, texts: Vec<String>) -> Res<Vec<Vec<f32>>> {
        debug!("Embedding {} text(s) with `{}`.", texts.len(), self.model);

        let request = CreateEmbeddingRequestArgs::default().model(&self.model).input(texts).build()?;
        let mut response = self.client.embeddings().create(request).await?;

        response.data.sort_by_key(|embedding| embedding.index);

        Ok(response.data.into_iter().map(|embedding| embedding.embedding).collect())
    }
}

#[async_trait]
impl GenericEmbedder for OpenAiEmbedder {
    #[instrument(name = "OpenAiEmbedder::embed_documents", skip_all)]
    async fn embed_documents(&self, texts: &[String], trace: &TraceContext) -> Res<Vec<Vec<f32>>> {
        embed_in_batches(texts, self.batch_size, self.strip_new_lines, |batch| {
            let batch_trace = trace.child();
            async move { self.create_embedding(batch, &batch_trace).await }
        })
        .await
    }

    #[instrument(name = "OpenAiEmbedder::embed_query", skip_all)]
    async fn embed_query(&self, text: &str, trace: &TraceContext) -> Res<Vec<f32>> {
        let text = if self.strip_new_lines { text.replace('\n', " ") } else { text.to_string() };

        self.create_embedding(vec![text], trace)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("The embeddings response is empty."))
    }
}

// Tests.
