//! Correlation of remote calls into a run tree.
//!
//! Every traced call gets its own [`TraceContext`]: a fresh run id whose parent is
//! the run id of the caller. Contexts are plain values passed down the call chain,
//! so concurrent turns never share correlation state.
//!
//! The [`GenericTracer`] trait receives the events; [`langsmith`] ships them to a
//! LangSmith-compatible backend.

pub mod langsmith;

use std::{future::Future, ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::base::types::{Res, Void};

// Types.

/// The (run id, parent id) pair that identifies one traced call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceContext {
    pub run_id: Uuid,
    pub parent_id: Option<Uuid>,
}

impl TraceContext {
    /// Start a new run tree.
    pub fn root() -> Self {
        Self { run_id: Uuid::new_v4(), parent_id: None }
    }

    /// Derive the context of a call made on behalf of this one.
    pub fn child(&self) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            parent_id: Some(self.run_id),
        }
    }
}

impl Default for TraceContext {
    fn default() -> Self {
        Self::root()
    }
}

/// Kind of traced call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunType {
    Chain,
    Llm,
    Tool,
    Embedding,
    Retriever,
    Parser,
}

/// The start event of a traced call.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceRun {
    pub context: TraceContext,
    pub name: String,
    pub run_type: RunType,
    pub inputs: Value,
    pub metadata: Value,
}

impl TraceRun {
    pub fn new(context: TraceContext, name: impl Into<String>, run_type: RunType, inputs: Value) -> Self {
        Self {
            context,
            name: name.into(),
            run_type,
            inputs,
            metadata: json!({
                "crate_version": env!("CARGO_PKG_VERSION"),
                "platform": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
            }),
        }
    }
}

// Traits.

/// Generic tracer trait that tracing backends must implement.
///
/// Both events are fire-and-forget from the caller's perspective, but a failure
/// to record is still reported so that misconfigured tracing does not go unnoticed.
#[async_trait]
pub trait GenericTracer: Send + Sync + 'static {
    /// Record the start of a call.
    async fn start_run(&self, run: &TraceRun) -> Void;

    /// Record the outputs of a previously started call.
    async fn end_run(&self, run_id: Uuid, outputs: &Value) -> Void;
}

// Structs.

/// Tracer for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<dyn GenericTracer>,
}

impl Deref for Tracer {
    type Target = dyn GenericTracer;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl Tracer {
    pub fn new(inner: Arc<dyn GenericTracer>) -> Self {
        Self { inner }
    }
}

// Helpers.

/// Run `call` as the traced call identified by `context`.
///
/// Without a tracer this is just `call.await`. With one, the start event is recorded
/// before the call and the outputs after it; a failing call records nothing further.
pub async fn traced<T, F>(tracer: Option<&Tracer>, context: &TraceContext, name: &str, run_type: RunType, inputs: Value, call: F, outputs: impl FnOnce(&T) -> Value) -> Res<T>
where
    F: Future<Output = Res<T>>,
{
    let Some(tracer) = tracer else {
        return call.await;
    };

    tracer.start_run(&TraceRun::new(*context, name, run_type, inputs)).await?;

    let value = call.await?;

    tracer.end_run(context.run_id, &outputs(&value)).await?;

    Ok(value)
}

// Tests.
