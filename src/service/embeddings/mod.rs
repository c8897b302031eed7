//! Text embeddings.
//!
//! [`GenericEmbedder`] embeds documents in batches and single queries.
//! [`jina`] talks to Jina AI, [`openai`] to any OpenAI-compatible embeddings endpoint.

pub mod jina;
pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{base::types::Res, service::trace::TraceContext};

// Traits.

/// Generic embedder trait that embedding providers must implement.
#[async_trait]
pub trait GenericEmbedder: Send + Sync + 'static {
    /// One vector per text, in input order.
    async fn embed_documents(&self, texts: &[String], trace: &TraceContext) -> Res<Vec<Vec<f32>>>;

    /// The vector of a single text.
    async fn embed_query(&self, text: &str, trace: &TraceContext) -> Res<Vec<f32>>;
}

// Structs.

/// Embedder for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Embedder {
    inner: Arc<dyn GenericEmbedder>,
}

impl Deref for Embedder {
    type Target = dyn GenericEmbedder;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl Embedder {
    pub fn new(inner: Arc<dyn GenericEmbedder>) -> Self {
        Self { inner }
    }
}

// Helpers.

/// Split `texts` into consecutive batches of at most `batch_size` items.
pub fn batch_texts(texts: &[String], batch_size: usize) -> Vec<Vec<String>> {
    texts.chunks(batch_size.max(1)).map(<[String]>::to_vec).collect()
}

/// Replace newlines with spaces when `strip` is set.
pub fn maybe_remove_newlines(texts: &[String], strip: bool) -> Vec<String> {
    if !strip {
        return texts.to_vec();
    }

    texts.iter().map(|text| text.replace('\n', " ")).collect()
}

/// Embed `texts` batch by batch with `embed_batch`, checking every batch is fully embedded.
pub(crate) async fn embed_in_batches<F, Fut>(texts: &[String], batch_size: usize, strip_new_lines: bool, mut embed_batch: F) -> Res<Vec<Vec<f32>>>
where
    F: FnMut(Vec<String>) -> Fut,
    Fut: std::future::Future<Output = Res<Vec<Vec<f32>>>>,
{
    let mut embeddings = Vec::with_capacity(texts.len());

    for batch in batch_texts(&maybe_remove_newlines(texts, strip_new_lines), batch_size) {
        let expected = batch.len();
        let vectors = embed_batch(batch).await?;

        if vectors.len() != expected {
            return Err(anyhow::anyhow!("Expected {expected} embeddings, got {}.", vectors.len()));
        }

        embeddings.extend(vectors);
    }

    Ok(embeddings)
}

// Tests.
