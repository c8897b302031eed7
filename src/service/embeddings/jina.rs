//! Jina AI implementation of the embedder.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::{
    base::{config::Config, types::Res},
    service::trace::{RunType, TraceContext, Tracer, traced},
};

use super::{Embedder, GenericEmbedder, embed_in_batches};

// Extra methods on `Embedder` applied by the jina implementation.

impl Embedder {
    pub fn jina(config: &Config, tracer: Option<Tracer>) -> Res<Self> {
        let embedder = JinaEmbedder::new(config)?.with_tracer(tracer);
        Ok(Self { inner: Arc::new(embedder) })
    }
}

// Wire types.

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

// Specific implementations.

/// Jina AI embedder implementation.
#[derive(Clone)]
pub struct JinaEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    batch_size: usize,
    strip_new_lines: bool,
    tracer: Option<Tracer>,
}

impl JinaEmbedder {
    #[instrument(name = "JinaEmbedder::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let api_key = config
            .jina_api_key
            .clone()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow::anyhow!("A Jina API key is required."))?;

        Ok(Self {
            client: reqwest::Client::new(),
            url: config.jina_base_url.clone(),
            api_key,
            model: config.jina_model.clone(),
            batch_size: config.embeddings_batch_size,
            strip_new_lines: config.embeddings_strip_new_lines,
            tracer: None,
        })
    }

    pub fn with_tracer(mut self, tracer: Option<Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    /// Embed one batch with one request.
    #[instrument(name = "JinaEmbedder::create_embedding", skip_all)]
    pub async fn create_embedding(&self, texts: &[String], trace: &TraceContext) -> Res<Vec<Vec<f32>>> {
        traced(
            self.tracer.as_ref(),
            trace,
            "Jina - Create Embedding",
            RunType::Embedding,
            json!({ "input": texts, "model": self.model }),
            self.request(texts),
            |embeddings| json!({ "output": embeddings }),
        )
        .await
    }

    async fn request(&self, texts: &[String]) -> Res<Vec<Vec<f32>>> {
        debug!("Embedding {} text(s) with `{}`.", texts.len(), self.model);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { input: texts, model: &self.model })
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(anyhow::anyhow!("Jina request failed with status {status}."));
        }

        let mut response: EmbeddingResponse = response.json().await?;
        response.data.sort_by_key(|data| data.index);

        Ok(response.data.into_iter().map(|data| data.embedding).collect())
    }
}

#[async_trait]
impl GenericEmbedder for JinaEmbedder {
    #[instrument(name = "JinaEmbedder::embed_documents", skip_all)]
    async fn embed_documents(&self, texts: &[String], trace: &TraceContext) -> Res<Vec<Vec<f32>>> {
        embed_in_batches(texts, self.batch_size, self.strip_new_lines, |batch| {
            let batch_trace = trace.child();
            async move { self.create_embedding(&batch, &batch_trace).await }
        })
        .await
    }

    #[instrument(name = "JinaEmbedder::embed_query", skip_all)]
    async fn embed_query(&self, text: &str, trace: &TraceContext) -> Res<Vec<f32>> {
        let text = if self.strip_new_lines { text.replace('\n', " ") } else { text.to_string() };

        self.create_embedding(&[text], trace)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Jina returned no embedding."))
    }
}

// Tests.
