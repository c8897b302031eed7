//! Runtime services and shared state for assistkit.

use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use crate::{
    prelude::*,
    service::{
        assistants::{
            AssistantsClient,
            runner::{AssistantRunner, PollConfig},
            types::{CreateAssistantRequest, CreateThreadRequest},
        },
        tools::{GenericTool, ToolRegistry, echo::EchoTool},
        trace::Tracer,
    },
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the Assistants client, the local tools, the optional tracer,
/// and the configuration. It is designed to be trivially cloneable, allowing it to
/// be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The Assistants API client instance.
    pub assistants: AssistantsClient,
    /// The tools runs may call.
    pub tools: ToolRegistry,
    /// The run tracer, when tracing is enabled.
    pub tracer: Option<Tracer>,
}

impl Runtime {
    /// Create a new runtime instance talking to OpenAI.
    #[instrument(skip_all)]
    pub fn new(config: Config) -> Res<Self> {
        let assistants = AssistantsClient::openai(&config)?;
        let tools = ToolRegistry::new(default_tools(&config)?)?;
        let tracer = Tracer::from_config(&config)?;

        Ok(Self::with_clients(config, assistants, tools, tracer))
    }

    /// Create a runtime from already built clients.
    pub fn with_clients(config: Config, assistants: AssistantsClient, tools: ToolRegistry, tracer: Option<Tracer>) -> Self {
        Self { config, assistants, tools, tracer }
    }

    /// A runner wired to this runtime's clients and poll settings.
    pub fn runner(&self) -> AssistantRunner {
        AssistantRunner::new(self.assistants.clone(), self.tools.clone())
            .with_tracer(self.tracer.clone())
            .with_poll_config(PollConfig::from_config(&self.config))
    }

    /// The configured assistant, or a freshly created one with every local tool enabled.
    #[instrument(skip_all)]
    pub async fn resolve_assistant(&self) -> Res<String> {
        if let Some(id) = self.config.assistant_id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(id.to_string());
        }

        let request = CreateAssistantRequest {
            model: self.config.assistant_model.clone(),
            name: Some(self.config.assistant_name.clone()),
            instructions: Some(self.config.assistant_instructions.clone()),
            tools: self.tools.definitions(),
            temperature: self.config.assistant_temperature,
            ..Default::default()
        };

        let assistant = self.assistants.create_assistant(&request).await.context("failed to create assistant")?;
        info!("Created assistant `{}`. Set `ASSISTKIT_ASSISTANT_ID={}` to reuse it.", assistant.id, assistant.id);

        Ok(assistant.id)
    }

    /// Ask the assistant one question on a fresh thread, deleting the thread afterwards.
    pub async fn ask(&self, prompt: &str, cancel: &CancellationToken) -> Res<String> {
        let assistant_id = self.resolve_assistant().await?;
        let thread = self.assistants.create_thread(&CreateThreadRequest::default()).await.context("failed to create thread")?;

        let reply = self.reply_on_thread(&thread.id, &assistant_id, prompt, cancel).await;

        if let Err(e) = self.assistants.delete_thread(&thread.id).await {
            warn!("Failed to delete thread `{}`: {e}", thread.id);
        }

        reply
    }

    /// One turn on an existing thread, traced as a run tree of its own.
    pub async fn reply_on_thread(&self, thread_id: &str, assistant_id: &str, prompt: &str, cancel: &CancellationToken) -> Res<String> {
        self.runner().run_on_thread(thread_id, assistant_id, prompt, &TraceContext::root(), cancel).await
    }
}

/// The tools every runtime starts with.
pub fn default_tools(config: &Config) -> Res<Vec<Arc<dyn GenericTool>>> {
    Ok(vec![Arc::new(EchoTool), scraper_tool(config)?])
}

#[cfg(feature = "browser")]
fn scraper_tool(config: &Config) -> Res<Arc<dyn GenericTool>> {
    Ok(Arc::new(crate::service::tools::scraper::browser::BrowserScraper::new(config)))
}

#[cfg(not(feature = "browser"))]
fn scraper_tool(config: &Config) -> Res<Arc<dyn GenericTool>> {
    Ok(Arc::new(crate::service::tools::scraper::dom::DomScraper::new(config)?))
}
