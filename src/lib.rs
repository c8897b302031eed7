//! Library root for `assistkit`.
//!
//! Assistkit is a toolkit for building agents on top of the OpenAI Assistants API:
//! - Typed bindings for assistants, threads, messages, and runs
//! - A run orchestrator that polls runs and dispatches tool calls to local tools
//! - Alternate LLM and embedding providers (Maritaca, Jina, OpenAI-compatible hosts)
//! - Web scraping tools and Whisper transcription
//!
//! Calls can be correlated into LangSmith run trees through an explicit
//! [`TraceContext`](service::trace::TraceContext). The architecture is built around
//! extensible traits that allow for different implementations of each service.

#[deny(missing_docs)]
pub mod base;
pub mod prelude;
pub mod runtime;
pub mod service;

use tokio_util::sync::CancellationToken;

use base::{config::Config, types::Res};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Builds the runtime from `config` and asks the configured (or a newly created)
/// assistant one question, giving up when `cancel` fires.
pub async fn start(config: Config, prompt: &str, cancel: &CancellationToken) -> Res<String> {
    info!("Starting assistkit ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config)?;

    // Run the turn.
    runtime.ask(prompt, cancel).await
}
