//! Bindings to the OpenAI Assistants API.
//!
//! [`GenericAssistantsClient`] has one method per REST operation on assistants,
//! threads, messages, and runs. [`runner::AssistantRunner`] combines them into a
//! full assistant turn, including local tool dispatch.

pub mod openai;
pub mod runner;
pub mod transport;
pub mod types;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::Res;

use types::{
    Assistant, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest, CreateThreadAndRunRequest, CreateThreadRequest, DeletionStatus, Message, ModifyAssistantRequest, ModifyMessageRequest,
    ModifyThreadRequest, Run, SubmitToolOutputsRequest, Thread,
};

// Traits.

/// Generic Assistants API client trait that clients must implement.
///
/// Each method performs exactly one remote call. Implementations hold no state
/// about the remote resources beyond what they need to authenticate.
#[async_trait]
pub trait GenericAssistantsClient: Send + Sync + 'static {
    /// Create an assistant.
    async fn create_assistant(&self, request: &CreateAssistantRequest) -> Res<Assistant>;

    /// List the assistants of the organization.
    async fn list_assistants(&self) -> Res<Vec<Assistant>>;

    /// Retrieve an assistant by ID.
    async fn retrieve_assistant(&self, assistant_id: &str) -> Res<Assistant>;

    /// Modify an assistant.
    async fn update_assistant(&self, assistant_id: &str, request: &ModifyAssistantRequest) -> Res<Assistant>;

    /// Delete an assistant.
    async fn delete_assistant(&self, assistant_id: &str) -> Res<DeletionStatus>;

    /// Create a thread, optionally seeded with messages.
    async fn create_thread(&self, request: &CreateThreadRequest) -> Res<Thread>;

    /// Retrieve a thread by ID.
    async fn retrieve_thread(&self, thread_id: &str) -> Res<Thread>;

    /// Modify a thread.
    async fn update_thread(&self, thread_id: &str, request: &ModifyThreadRequest) -> Res<Thread>;

    /// Delete a thread.
    async fn delete_thread(&self, thread_id: &str) -> Res<DeletionStatus>;

    /// Post a message to a thread.
    async fn create_message(&self, thread_id: &str, request: &CreateMessageRequest) -> Res<Message>;

    /// List the messages of a thread, newest first.
    async fn list_messages(&self, thread_id: &str) -> Res<Vec<Message>>;

    /// Retrieve a message by ID.
    async fn retrieve_message(&self, thread_id: &str, message_id: &str) -> Res<Message>;

    /// Modify a message.
    async fn update_message(&self, thread_id: &str, message_id: &str, request: &ModifyMessageRequest) -> Res<Message>;

    /// Delete a message.
    async fn delete_message(&self, thread_id: &str, message_id: &str) -> Res<DeletionStatus>;

    /// Start a run of an assistant on a thread.
    async fn create_run(&self, thread_id: &str, request: &CreateRunRequest) -> Res<Run>;

    /// Create a thread and start a run on it in one call.
    async fn create_thread_and_run(&self, request: &CreateThreadAndRunRequest) -> Res<Run>;

    /// Retrieve the current state of a run.
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Res<Run>;

    /// Submit the outputs of the tool calls a run is waiting on.
    async fn submit_tool_outputs(&self, thread_id: &str, run_id: &str, request: &SubmitToolOutputsRequest) -> Res<Run>;

    /// Ask the server to cancel an in-flight run.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Res<Run>;
}

// Structs.

/// Assistants API client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct AssistantsClient {
    inner: Arc<dyn GenericAssistantsClient>,
}

impl Deref for AssistantsClient {
    type Target = dyn GenericAssistantsClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl AssistantsClient {
    pub fn new(inner: Arc<dyn GenericAssistantsClient>) -> Self {
        Self { inner }
    }
}
