//! Drives one assistant turn to completion.
//!
//! A turn posts the user's input to a thread, starts a run, and polls it. While
//! the run asks for tool outputs, the matching local tools are called one after
//! the other and their outputs submitted in a single request. Once the run
//! completes, the newest assistant message is the reply.
//!
//! Polling backs off exponentially, is bounded by an overall timeout, and stops
//! early when the caller's [`CancellationToken`] fires. In both cases the run is
//! cancelled server side on a best-effort basis.

use std::{future::Future, time::Duration};

use anyhow::Context;
use serde_json::json;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::{
    base::{config::Config, types::Res},
    service::{
        tools::{ToolRegistry, extract_arg1},
        trace::{RunType, TraceContext, Tracer, traced},
    },
};

use super::{
    AssistantsClient,
    types::{CreateMessageRequest, CreateRunRequest, CreateThreadRequest, MessageRole, Run, RunStatus, SubmitToolOutputsRequest, ToolCall, ToolOutput},
};

// Errors.

/// Ways a turn can end without a reply.
///
/// These are wrapped in `anyhow::Error`; callers can `downcast_ref::<RunError>()`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("run `{run_id}` failed: {code}: {message}")]
    Failed { run_id: String, code: String, message: String },
    #[error("run `{run_id}` ended with status `{status}`")]
    Ended { run_id: String, status: RunStatus },
    #[error("tool `{0}` not found")]
    ToolNotFound(String),
    #[error("run `{0}` requires action but lists no tool calls")]
    MissingToolCalls(String),
    #[error("unexpected status from submit tool outputs: `{0}`")]
    UnexpectedSubmitStatus(RunStatus),
    #[error("thread `{0}` has no assistant reply")]
    NoAssistantReply(String),
    #[error("run `{run_id}` did not finish within {timeout:?}")]
    TimedOut { run_id: String, timeout: Duration },
    #[error("run `{0}` was cancelled by the caller")]
    Cancelled(String),
}

// Polling.

/// How often and for how long a run is polled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: f64,
    pub timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(8),
            multiplier: 1.5,
            timeout: Duration::from_secs(300),
        }
    }
}

impl PollConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            initial_interval: config.run_poll_interval(),
            max_interval: config.run_poll_max_interval(),
            multiplier: config.run_poll_multiplier,
            timeout: config.run_timeout(),
        }
    }

    /// The delay to use after `current`, capped at the maximum interval.
    ///
    /// Saturates instead of overflowing, whatever the multiplier.
    pub fn next_interval(&self, current: Duration) -> Duration {
        let next = current.as_secs_f64() * self.multiplier.max(1.0);

        Duration::try_from_secs_f64(next).unwrap_or(self.max_interval).min(self.max_interval)
    }
}

// Runner.

/// Runs assistants against threads, dispatching tool calls to local tools.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct AssistantRunner {
    client: AssistantsClient,
    tools: ToolRegistry,
    tracer: Option<Tracer>,
    poll: PollConfig,
}

impl AssistantRunner {
    pub fn new(client: AssistantsClient, tools: ToolRegistry) -> Self {
        Self {
            client,
            tools,
            tracer: None,
            poll: PollConfig::default(),
        }
    }

    pub fn with_tracer(mut self, tracer: Option<Tracer>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn on a fresh thread and return the assistant's reply.
    pub async fn run(&self, assistant_id: &str, input: &str, trace: &TraceContext) -> Res<String> {
        self.run_with_cancel(assistant_id, input, trace, &CancellationToken::new()).await
    }

    /// Like [`Self::run`], but gives up when `cancel` fires.
    #[instrument(name = "AssistantRunner::run", skip_all)]
    pub async fn run_with_cancel(&self, assistant_id: &str, input: &str, trace: &TraceContext, cancel: &CancellationToken) -> Res<String> {
        let thread = self.client.create_thread(&CreateThreadRequest::default()).await.context("failed to create thread")?;
        debug!("Created thread `{}`.", thread.id);

        self.run_on_thread(&thread.id, assistant_id, input, trace, cancel).await
    }

    /// Run one turn on an existing thread, so earlier turns stay in context.
    #[instrument(name = "AssistantRunner::run_on_thread", skip_all)]
    pub async fn run_on_thread(&self, thread_id: &str, assistant_id: &str, input: &str, trace: &TraceContext, cancel: &CancellationToken) -> Res<String> {
        traced(
            self.tracer.as_ref(),
            trace,
            "AssistantRunner",
            RunType::Chain,
            json!({ "input": input }),
            self.turn(thread_id, assistant_id, input, trace, cancel),
            |output| json!({ "output": output }),
        )
        .await
    }

    async fn turn(&self, thread_id: &str, assistant_id: &str, input: &str, trace: &TraceContext, cancel: &CancellationToken) -> Res<String> {
        self.client.create_message(thread_id, &CreateMessageRequest::user(input)).await.context("failed to create message")?;

        let run = self.client.create_run(thread_id, &CreateRunRequest::new(assistant_id)).await.context("failed to create run")?;
        info!("Started run `{}` of assistant `{assistant_id}`.", run.id);

        self.wait_for_run(thread_id, &run.id, trace, cancel).await?;

        self.latest_reply(thread_id).await
    }

    /// Poll a run until it completes, handling tool calls along the way.
    ///
    /// Every remote call, tool call and sleep in here races the deadline and `cancel`.
    #[instrument(name = "AssistantRunner::wait_for_run", skip(self, trace, cancel))]
    pub async fn wait_for_run(&self, thread_id: &str, run_id: &str, trace: &TraceContext, cancel: &CancellationToken) -> Res<Run> {
        let deadline = Instant::now() + self.poll.timeout;
        let mut interval = self.poll.initial_interval;

        loop {
            let run = self
                .bounded(thread_id, run_id, deadline, cancel, async { self.client.retrieve_run(thread_id, run_id).await.context("failed to retrieve run") })
                .await?;
            debug!("Run `{run_id}` is `{}`.", run.status);

            match run.status {
                RunStatus::Completed => return Ok(run),
                RunStatus::Failed => {
                    let last_error = run.last_error.unwrap_or_default();

                    return Err(RunError::Failed {
                        run_id: run.id,
                        code: last_error.code,
                        message: last_error.message,
                    }
                    .into());
                }
                RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete => {
                    return Err(RunError::Ended { run_id: run.id, status: run.status }.into());
                }
                RunStatus::RequiresAction => {
                    self.bounded(thread_id, run_id, deadline, cancel, self.handle_required_action(thread_id, &run, trace)).await?;
                    interval = self.poll.initial_interval;
                }
                RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling => {}
            }

            self.bounded(thread_id, run_id, deadline, cancel, async {
                tokio::time::sleep(interval).await;
                Ok(())
            })
            .await?;

            interval = self.poll.next_interval(interval);
        }
    }

    /// Run `step` unless `cancel` fires or `deadline` passes first, abandoning the run if so.
    async fn bounded<T>(&self, thread_id: &str, run_id: &str, deadline: Instant, cancel: &CancellationToken, step: impl Future<Output = Res<T>>) -> Res<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(self.abandon(thread_id, run_id, RunError::Cancelled(run_id.to_string())).await),
            _ = tokio::time::sleep_until(deadline) => {
                let timeout = self.poll.timeout;
                Err(self.abandon(thread_id, run_id, RunError::TimedOut { run_id: run_id.to_string(), timeout }).await)
            }
            result = step => result,
        }
    }

    /// Call every requested tool in order and submit all outputs at once.
    #[instrument(name = "AssistantRunner::handle_required_action", skip_all)]
    async fn handle_required_action(&self, thread_id: &str, run: &Run, trace: &TraceContext) -> Res<()> {
        let calls = run.tool_calls();
        if calls.is_empty() {
            return Err(RunError::MissingToolCalls(run.id.clone()).into());
        }

        let mut tool_outputs = Vec::with_capacity(calls.len());
        for call in calls {
            let output = self.call_tool(call, trace).await?;

            tool_outputs.push(ToolOutput {
                tool_call_id: call.id.clone(),
                output,
            });
        }

        info!("Submitting {} tool output(s) to run `{}`.", tool_outputs.len(), run.id);

        let submitted = self
            .client
            .submit_tool_outputs(thread_id, &run.id, &SubmitToolOutputsRequest { tool_outputs })
            .await
            .context("failed to submit tool outputs")?;

        match submitted.status {
            RunStatus::Queued | RunStatus::InProgress => Ok(()),
            status => Err(RunError::UnexpectedSubmitStatus(status).into()),
        }
    }

    async fn call_tool(&self, call: &ToolCall, trace: &TraceContext) -> Res<String> {
        let name = call.function.name.as_str();
        let tool = self.tools.get(name).ok_or_else(|| RunError::ToolNotFound(name.to_string()))?;
        let input = extract_arg1(&call.function.arguments).with_context(|| format!("bad arguments for tool `{name}`"))?;

        debug!("Calling tool `{name}` for call `{}`.", call.id);

        let context = trace.child();
        traced(
            self.tracer.as_ref(),
            &context,
            &format!("Tool-{name}"),
            RunType::Tool,
            json!({ "payload": input }),
            tool.call(&input),
            |output| json!({ "output": output }),
        )
        .await
        .with_context(|| format!("tool `{name}` failed"))
    }

    /// The text of the newest assistant message on a thread.
    #[instrument(name = "AssistantRunner::latest_reply", skip(self))]
    pub async fn latest_reply(&self, thread_id: &str) -> Res<String> {
        let messages = self.client.list_messages(thread_id).await.context("failed to list messages")?;

        messages
            .iter()
            .find(|message| message.role == MessageRole::Assistant)
            .and_then(|message| message.text())
            .map(str::to_string)
            .ok_or_else(|| RunError::NoAssistantReply(thread_id.to_string()).into())
    }

    /// Best-effort server side cancellation before giving up on a run.
    async fn abandon(&self, thread_id: &str, run_id: &str, reason: RunError) -> anyhow::Error {
        warn!("Abandoning run `{run_id}`: {reason}");

        if let Err(e) = self.client.cancel_run(thread_id, run_id).await {
            warn!("Failed to cancel run `{run_id}`: {e}");
        }

        reason.into()
    }
}

// Tests.
