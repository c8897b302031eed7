//! OpenAI implementation of the Assistants client.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tracing::instrument;

use crate::base::{config::Config, types::Res};

use super::{
    AssistantsClient, GenericAssistantsClient,
    transport::OpenAiTransport,
    types::{
        Assistant, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest, CreateThreadAndRunRequest, CreateThreadRequest, DeletionStatus, ListResponse, Message, ModifyAssistantRequest,
        ModifyMessageRequest, ModifyThreadRequest, Run, SubmitToolOutputsRequest, Thread,
    },
};

// Extra methods on `AssistantsClient` applied by the openai implementation.

impl AssistantsClient {
    pub fn openai(config: &Config) -> Res<Self> {
        let client = OpenAiAssistantsClient::new(config)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Specific implementations.

/// OpenAI Assistants client implementation.
#[derive(Clone)]
pub struct OpenAiAssistantsClient {
    transport: OpenAiTransport,
}

impl OpenAiAssistantsClient {
    #[instrument(name = "OpenAiAssistantsClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let timeout = Duration::from_secs(config.openai_request_timeout_secs);

        Ok(Self {
            transport: OpenAiTransport::new(&config.openai_base_url, &config.openai_api_key, timeout)?,
        })
    }
}

#[async_trait]
impl GenericAssistantsClient for OpenAiAssistantsClient {
    #[instrument(name = "OpenAiAssistantsClient::create_assistant", skip_all)]
    async fn create_assistant(&self, request: &CreateAssistantRequest) -> Res<Assistant> {
        self.transport.post("/assistants", request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::list_assistants", skip_all)]
    async fn list_assistants(&self) -> Res<Vec<Assistant>> {
        let list: ListResponse<Assistant> = self.transport.get("/assistants").await?;
        Ok(list.data)
    }

    #[instrument(name = "OpenAiAssistantsClient::retrieve_assistant", skip(self))]
    async fn retrieve_assistant(&self, assistant_id: &str) -> Res<Assistant> {
        self.transport.get(&format!("/assistants/{assistant_id}")).await
    }

    #[instrument(name = "OpenAiAssistantsClient::update_assistant", skip(self, request))]
    async fn update_assistant(&self, assistant_id: &str, request: &ModifyAssistantRequest) -> Res<Assistant> {
        self.transport.post(&format!("/assistants/{assistant_id}"), request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::delete_assistant", skip(self))]
    async fn delete_assistant(&self, assistant_id: &str) -> Res<DeletionStatus> {
        self.transport.delete(&format!("/assistants/{assistant_id}")).await
    }

    #[instrument(name = "OpenAiAssistantsClient::create_thread", skip_all)]
    async fn create_thread(&self, request: &CreateThreadRequest) -> Res<Thread> {
        self.transport.post("/threads", request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::retrieve_thread", skip(self))]
    async fn retrieve_thread(&self, thread_id: &str) -> Res<Thread> {
        self.transport.get(&format!("/threads/{thread_id}")).await
    }

    #[instrument(name = "OpenAiAssistantsClient::update_thread", skip(self, request))]
    async fn update_thread(&self, thread_id: &str, request: &ModifyThreadRequest) -> Res<Thread> {
        self.transport.post(&format!("/threads/{thread_id}"), request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::delete_thread", skip(self))]
    async fn delete_thread(&self, thread_id: &str) -> Res<DeletionStatus> {
        self.transport.delete(&format!("/threads/{thread_id}")).await
    }

    #[instrument(name = "OpenAiAssistantsClient::create_message", skip(self, request))]
    async fn create_message(&self, thread_id: &str, request: &CreateMessageRequest) -> Res<Message> {
        self.transport.post(&format!("/threads/{thread_id}/messages"), request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::list_messages", skip(self))]
    async fn list_messages(&self, thread_id: &str) -> Res<Vec<Message>> {
        let list: ListResponse<Message> = self.transport.get(&format!("/threads/{thread_id}/messages")).await?;
        Ok(list.data)
    }

    #[instrument(name = "OpenAiAssistantsClient::retrieve_message", skip(self))]
    async fn retrieve_message(&self, thread_id: &str, message_id: &str) -> Res<Message> {
        self.transport.get(&format!("/threads/{thread_id}/messages/{message_id}")).await
    }

    #[instrument(name = "OpenAiAssistantsClient::update_message", skip(self, request))]
    async fn update_message(&self, thread_id: &str, message_id: &str, request: &ModifyMessageRequest) -> Res<Message> {
        self.transport.post(&format!("/threads/{thread_id}/messages/{message_id}"), request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::delete_message", skip(self))]
    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Res<DeletionStatus> {
        self.transport.delete(&format!("/threads/{thread_id}/messages/{message_id}")).await
    }

    #[instrument(name = "OpenAiAssistantsClient::create_run", skip(self, request))]
    async fn create_run(&self, thread_id: &str, request: &CreateRunRequest) -> Res<Run> {
        self.transport.post(&format!("/threads/{thread_id}/runs"), request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::create_thread_and_run", skip_all)]
    async fn create_thread_and_run(&self, request: &CreateThreadAndRunRequest) -> Res<Run> {
        self.transport.post("/threads/runs", request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::retrieve_run", skip(self))]
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Res<Run> {
        self.transport.get(&format!("/threads/{thread_id}/runs/{run_id}")).await
    }

    #[instrument(name = "OpenAiAssistantsClient::submit_tool_outputs", skip(self, request))]
    async fn submit_tool_outputs(&self, thread_id: &str, run_id: &str, request: &SubmitToolOutputsRequest) -> Res<Run> {
        self.transport.post(&format!("/threads/{thread_id}/runs/{run_id}/submit_tool_outputs"), request).await
    }

    #[instrument(name = "OpenAiAssistantsClient::cancel_run", skip(self))]
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Res<Run> {
        self.transport.post_empty(&format!("/threads/{thread_id}/runs/{run_id}/cancel")).await
    }
}

// Tests.
