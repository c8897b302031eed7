#![cfg(test)]

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use assistkit::{
    base::{
        config::{Config, ConfigInner},
        types::{Res, Void},
    },
    runtime::Runtime,
    service::{
        assistants::{
            AssistantsClient, GenericAssistantsClient,
            runner::{AssistantRunner, PollConfig, RunError},
            types::{
                Assistant, AssistantTool, CreateAssistantRequest, CreateMessageRequest, CreateRunRequest, CreateThreadAndRunRequest, CreateThreadRequest, DeletionStatus, FunctionCall, Message,
                MessageContent, MessageRole, ModifyAssistantRequest, ModifyMessageRequest, ModifyThreadRequest, RequiredAction, Run, RunLastError, RunStatus, SubmitToolOutputs,
                SubmitToolOutputsRequest, TextContent, Thread, ToolCall,
            },
        },
        tools::{GenericTool, ToolRegistry, echo::EchoTool, wrap_arg1},
        trace::{GenericTracer, RunType, TraceContext, TraceRun, Tracer},
    },
};
use async_trait::async_trait;
use mockall::{Sequence, mock};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// Mocks.

mock! {
    pub Assistants {}

    #[async_trait]
    impl GenericAssistantsClient for Assistants {
        async fn create_assistant(&self, request: &CreateAssistantRequest) -> Res<Assistant>;
        async fn list_assistants(&self) -> Res<Vec<Assistant>>;
        async fn retrieve_assistant(&self, assistant_id: &str) -> Res<Assistant>;
        async fn update_assistant(&self, assistant_id: &str, request: &ModifyAssistantRequest) -> Res<Assistant>;
        async fn delete_assistant(&self, assistant_id: &str) -> Res<DeletionStatus>;
        async fn create_thread(&self, request: &CreateThreadRequest) -> Res<Thread>;
        async fn retrieve_thread(&self, thread_id: &str) -> Res<Thread>;
        async fn update_thread(&self, thread_id: &str, request: &ModifyThreadRequest) -> Res<Thread>;
        async fn delete_thread(&self, thread_id: &str) -> Res<DeletionStatus>;
        async fn create_message(&self, thread_id: &str, request: &CreateMessageRequest) -> Res<Message>;
        async fn list_messages(&self, thread_id: &str) -> Res<Vec<Message>>;
        async fn retrieve_message(&self, thread_id: &str, message_id: &str) -> Res<Message>;
        async fn update_message(&self, thread_id: &str, message_id: &str, request: &ModifyMessageRequest) -> Res<Message>;
        async fn delete_message(&self, thread_id: &str, message_id: &str) -> Res<DeletionStatus>;
        async fn create_run(&self, thread_id: &str, request: &CreateRunRequest) -> Res<Run>;
        async fn create_thread_and_run(&self, request: &CreateThreadAndRunRequest) -> Res<Run>;
        async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Res<Run>;
        async fn submit_tool_outputs(&self, thread_id: &str, run_id: &str, request: &SubmitToolOutputsRequest) -> Res<Run>;
        async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Res<Run>;
    }
}

mock! {
    pub Tool {}

    #[async_trait]
    impl GenericTool for Tool {
        fn name(&self) -> &str;
        fn description(&self) -> &str;
        async fn call(&self, input: &str) -> Res<String>;
    }
}

mock! {
    pub Tracer {}

    #[async_trait]
    impl GenericTracer for Tracer {
        async fn start_run(&self, run: &TraceRun) -> Void;
        async fn end_run(&self, run_id: Uuid, outputs: &Value) -> Void;
    }
}

// Tools.

/// A tool whose call never finishes.
struct StalledTool;

#[async_trait]
impl GenericTool for StalledTool {
    fn name(&self) -> &str {
        "stalled"
    }

    fn description(&self) -> &str {
        "Never answers."
    }

    async fn call(&self, _input: &str) -> Res<String> {
        std::future::pending().await
    }
}

// Fixtures.

const THREAD_ID: &str = "thread_1";
const RUN_ID: &str = "run_1";
const ASSISTANT_ID: &str = "asst_1";

fn run_with_status(status: RunStatus) -> Run {
    Run {
        id: RUN_ID.to_string(),
        thread_id: THREAD_ID.to_string(),
        assistant_id: ASSISTANT_ID.to_string(),
        status,
        ..Default::default()
    }
}

fn run_requiring(calls: &[(&str, &str, &str)]) -> Run {
    let tool_calls = calls
        .iter()
        .map(|(id, name, input)| ToolCall {
            id: id.to_string(),
            kind: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: wrap_arg1(input),
            },
        })
        .collect();

    Run {
        required_action: Some(RequiredAction {
            kind: "submit_tool_outputs".to_string(),
            submit_tool_outputs: SubmitToolOutputs { tool_calls },
        }),
        ..run_with_status(RunStatus::RequiresAction)
    }
}

fn message(id: &str, role: MessageRole, text: &str) -> Message {
    Message {
        id: id.to_string(),
        thread_id: THREAD_ID.to_string(),
        role,
        content: vec![MessageContent::Text {
            text: TextContent {
                value: text.to_string(),
                annotations: vec![],
            },
        }],
        ..Default::default()
    }
}

fn fast_poll() -> PollConfig {
    PollConfig {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(400),
        multiplier: 2.0,
        timeout: Duration::from_secs(5),
    }
}

/// A client that accepts the message and run creation every turn starts with.
fn mock_turn_start() -> MockAssistants {
    let mut mock = MockAssistants::new();

    mock.expect_create_message()
        .withf(|thread_id, request| thread_id == THREAD_ID && request.role == MessageRole::User)
        .times(1)
        .returning(|_, request| Ok(message("msg_user", MessageRole::User, &request.content)));
    mock.expect_create_run()
        .withf(|thread_id, request| thread_id == THREAD_ID && request.assistant_id == ASSISTANT_ID)
        .times(1)
        .returning(|_, _| Ok(run_with_status(RunStatus::Queued)));

    mock
}

fn expect_reply(mock: &mut MockAssistants, reply: &'static str) {
    mock.expect_list_messages().times(1).returning(move |_| {
        Ok(vec![
            message("msg_3", MessageRole::Assistant, reply),
            message("msg_2", MessageRole::User, "hello"),
            message("msg_1", MessageRole::Assistant, "an older reply"),
        ])
    });
}

fn runner(mock: MockAssistants, tools: Vec<Arc<dyn GenericTool>>) -> AssistantRunner {
    let client = AssistantsClient::new(Arc::new(mock));
    let registry = ToolRegistry::new(tools).unwrap();

    AssistantRunner::new(client, registry).with_poll_config(fast_poll())
}

async fn run_turn(runner: &AssistantRunner, cancel: &CancellationToken) -> Res<String> {
    runner.run_on_thread(THREAD_ID, ASSISTANT_ID, "hello", &TraceContext::root(), cancel).await
}

fn run_error(err: &anyhow::Error) -> RunError {
    err.downcast_ref::<RunError>().cloned().unwrap_or_else(|| panic!("not a run error: {err:#}"))
}

// Tests.

#[tokio::test(start_paused = true)]
async fn test_completed_run_returns_newest_assistant_message() {
    let mut mock = mock_turn_start();
    let mut seq = Sequence::new();

    mock.expect_retrieve_run().times(2).in_sequence(&mut seq).returning(|_, _| Ok(run_with_status(RunStatus::InProgress)));
    mock.expect_retrieve_run()
        .withf(|thread_id, run_id| thread_id == THREAD_ID && run_id == RUN_ID)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(run_with_status(RunStatus::Completed)));
    expect_reply(&mut mock, "hi there");
    mock.expect_cancel_run().times(0);

    let reply = run_turn(&runner(mock, vec![]), &CancellationToken::new()).await.unwrap();

    assert_eq!(reply, "hi there");
}

#[tokio::test(start_paused = true)]
async fn test_run_creates_a_fresh_thread() {
    let mut mock = mock_turn_start();

    mock.expect_create_thread().times(1).returning(|_| {
        Ok(Thread {
            id: THREAD_ID.to_string(),
            ..Default::default()
        })
    });
    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::Completed)));
    expect_reply(&mut mock, "fresh");

    let reply = runner(mock, vec![]).run(ASSISTANT_ID, "hello", &TraceContext::root()).await.unwrap();

    assert_eq!(reply, "fresh");
}

#[tokio::test(start_paused = true)]
async fn test_tool_calls_are_submitted_together_in_order() {
    let mut mock = mock_turn_start();
    let mut seq = Sequence::new();

    mock.expect_retrieve_run()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(run_requiring(&[("call_a", "echo", "first"), ("call_b", "echo", "second"), ("call_c", "echo", "third")])));
    mock.expect_submit_tool_outputs()
        .withf(|thread_id, run_id, request| {
            let pairs: Vec<(&str, &str)> = request.tool_outputs.iter().map(|o| (o.tool_call_id.as_str(), o.output.as_str())).collect();

            thread_id == THREAD_ID && run_id == RUN_ID && pairs == [("call_a", "first"), ("call_b", "second"), ("call_c", "third")]
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(run_with_status(RunStatus::Queued)));
    mock.expect_retrieve_run().times(1).in_sequence(&mut seq).returning(|_, _| Ok(run_with_status(RunStatus::Completed)));
    expect_reply(&mut mock, "done");

    let reply = run_turn(&runner(mock, vec![Arc::new(EchoTool)]), &CancellationToken::new()).await.unwrap();

    assert_eq!(reply, "done");
}

#[tokio::test(start_paused = true)]
async fn test_tool_receives_unwrapped_argument() {
    let mut mock = mock_turn_start();
    let mut seq = Sequence::new();

    mock.expect_retrieve_run()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(run_requiring(&[("call_1", "Web_Scraper", "read https://example.com/ \"please\"")])));
    mock.expect_submit_tool_outputs()
        .withf(|_, _, request| request.tool_outputs.len() == 1 && request.tool_outputs[0].output == "Page Title: Example")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(run_with_status(RunStatus::InProgress)));
    mock.expect_retrieve_run().times(1).in_sequence(&mut seq).returning(|_, _| Ok(run_with_status(RunStatus::Completed)));
    expect_reply(&mut mock, "It is the example page.");

    let mut tool = MockTool::new();
    tool.expect_name().return_const("Web Scraper".to_string());
    tool.expect_description().return_const("Scrapes a page.".to_string());
    tool.expect_call()
        .withf(|input| input == "read https://example.com/ \"please\"")
        .times(1)
        .returning(|_| Ok("Page Title: Example".to_string()));

    let reply = run_turn(&runner(mock, vec![Arc::new(tool)]), &CancellationToken::new()).await.unwrap();

    assert_eq!(reply, "It is the example page.");
}

#[tokio::test(start_paused = true)]
async fn test_failed_run_reports_last_error() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| {
        Ok(Run {
            last_error: Some(RunLastError {
                code: "rate_limit_exceeded".to_string(),
                message: "slow down".to_string(),
            }),
            ..run_with_status(RunStatus::Failed)
        })
    });
    mock.expect_list_messages().times(0);
    mock.expect_cancel_run().times(0);

    let err = run_turn(&runner(mock, vec![]), &CancellationToken::new()).await.unwrap_err();

    assert_eq!(
        run_error(&err),
        RunError::Failed {
            run_id: RUN_ID.to_string(),
            code: "rate_limit_exceeded".to_string(),
            message: "slow down".to_string(),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_expired_run_ends_the_turn() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::Expired)));
    mock.expect_list_messages().times(0);

    let err = run_turn(&runner(mock, vec![]), &CancellationToken::new()).await.unwrap_err();

    assert_eq!(
        run_error(&err),
        RunError::Ended {
            run_id: RUN_ID.to_string(),
            status: RunStatus::Expired,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_unknown_tool_aborts_without_submitting() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_requiring(&[("call_1", "calculator", "1 + 1")])));
    mock.expect_submit_tool_outputs().times(0);
    mock.expect_list_messages().times(0);

    let err = run_turn(&runner(mock, vec![Arc::new(EchoTool)]), &CancellationToken::new()).await.unwrap_err();

    assert_eq!(run_error(&err), RunError::ToolNotFound("calculator".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_requires_action_without_calls_is_an_error() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::RequiresAction)));
    mock.expect_submit_tool_outputs().times(0);

    let err = run_turn(&runner(mock, vec![Arc::new(EchoTool)]), &CancellationToken::new()).await.unwrap_err();

    assert_eq!(run_error(&err), RunError::MissingToolCalls(RUN_ID.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_unexpected_submit_status_is_an_error() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_requiring(&[("call_1", "echo", "x")])));
    mock.expect_submit_tool_outputs().times(1).returning(|_, _, _| Ok(run_with_status(RunStatus::Completed)));
    mock.expect_list_messages().times(0);

    let err = run_turn(&runner(mock, vec![Arc::new(EchoTool)]), &CancellationToken::new()).await.unwrap_err();

    assert_eq!(run_error(&err), RunError::UnexpectedSubmitStatus(RunStatus::Completed));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_cancels_the_run() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().returning(|_, _| Ok(run_with_status(RunStatus::InProgress)));
    mock.expect_cancel_run()
        .withf(|thread_id, run_id| thread_id == THREAD_ID && run_id == RUN_ID)
        .times(1)
        .returning(|_, _| Ok(run_with_status(RunStatus::Cancelling)));
    mock.expect_list_messages().times(0);

    let err = run_turn(&runner(mock, vec![]), &CancellationToken::new()).await.unwrap_err();

    assert_eq!(
        run_error(&err),
        RunError::TimedOut {
            run_id: RUN_ID.to_string(),
            timeout: Duration::from_secs(5),
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_token_stops_before_polling() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(0);
    mock.expect_cancel_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::Cancelling)));

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = run_turn(&runner(mock, vec![]), &cancel).await.unwrap_err();

    assert_eq!(run_error(&err), RunError::Cancelled(RUN_ID.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_sleep_stops_polling() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::InProgress)));
    mock.expect_cancel_run().times(1).returning(|_, _| Err(anyhow::anyhow!("already gone")));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = run_turn(&runner(mock, vec![]), &cancel).await.unwrap_err();

    assert_eq!(run_error(&err), RunError::Cancelled(RUN_ID.to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_turn_and_tool_calls_are_traced_as_a_tree() {
    let mut mock = mock_turn_start();
    let mut seq = Sequence::new();

    mock.expect_retrieve_run().times(1).in_sequence(&mut seq).returning(|_, _| Ok(run_requiring(&[("call_1", "echo", "ping")])));
    mock.expect_submit_tool_outputs().times(1).in_sequence(&mut seq).returning(|_, _, _| Ok(run_with_status(RunStatus::Queued)));
    mock.expect_retrieve_run().times(1).in_sequence(&mut seq).returning(|_, _| Ok(run_with_status(RunStatus::Completed)));
    expect_reply(&mut mock, "pong");

    let started = Arc::new(Mutex::new(Vec::<TraceRun>::new()));
    let ended = Arc::new(Mutex::new(Vec::<Uuid>::new()));

    let mut tracer = MockTracer::new();
    let sink = started.clone();
    tracer.expect_start_run().times(2).returning(move |run| {
        sink.lock().unwrap().push(run.clone());
        Ok(())
    });
    let sink = ended.clone();
    tracer.expect_end_run().times(2).returning(move |run_id, _| {
        sink.lock().unwrap().push(run_id);
        Ok(())
    });

    let runner = runner(mock, vec![Arc::new(EchoTool)]).with_tracer(Some(Tracer::new(Arc::new(tracer))));
    let root = TraceContext::root();

    let reply = runner.run_on_thread(THREAD_ID, ASSISTANT_ID, "hello", &root, &CancellationToken::new()).await.unwrap();
    assert_eq!(reply, "pong");

    let started = started.lock().unwrap();
    let (turn, tool) = (&started[0], &started[1]);

    assert_eq!(turn.name, "AssistantRunner");
    assert_eq!(turn.run_type, RunType::Chain);
    assert_eq!(turn.context, root);

    assert_eq!(tool.name, "Tool-echo");
    assert_eq!(tool.run_type, RunType::Tool);
    assert_eq!(tool.context.parent_id, Some(root.run_id));
    assert_eq!(tool.inputs["payload"], "ping");

    // The tool call ends before the turn does.
    assert_eq!(*ended.lock().unwrap(), vec![tool.context.run_id, root.run_id]);
}

#[tokio::test(start_paused = true)]
async fn test_tool_error_aborts_without_submitting() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_requiring(&[("call_1", "broken", "x"), ("call_2", "echo", "y")])));
    mock.expect_submit_tool_outputs().times(0);
    mock.expect_list_messages().times(0);
    mock.expect_cancel_run().times(0);

    let mut tool = MockTool::new();
    tool.expect_name().return_const("broken".to_string());
    tool.expect_description().return_const("Always fails.".to_string());
    tool.expect_call().times(1).returning(|_| Err(anyhow::anyhow!("disk on fire")));

    let err = run_turn(&runner(mock, vec![Arc::new(tool), Arc::new(EchoTool)]), &CancellationToken::new()).await.unwrap_err();

    assert!(format!("{err:#}").contains("disk on fire"));
    assert!(err.downcast_ref::<RunError>().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_poll_backs_off_and_resets_after_submission() {
    let mut mock = mock_turn_start();
    let seen = Arc::new(Mutex::new(Vec::<Instant>::new()));

    let sink = seen.clone();
    mock.expect_retrieve_run().times(5).returning(move |_, _| {
        let mut seen = sink.lock().unwrap();
        seen.push(Instant::now());

        Ok(match seen.len() {
            1 | 2 | 4 => run_with_status(RunStatus::InProgress),
            3 => run_requiring(&[("call_1", "echo", "ping")]),
            _ => run_with_status(RunStatus::Completed),
        })
    });
    mock.expect_submit_tool_outputs().times(1).returning(|_, _, _| Ok(run_with_status(RunStatus::Queued)));
    expect_reply(&mut mock, "pong");

    run_turn(&runner(mock, vec![Arc::new(EchoTool)]), &CancellationToken::new()).await.unwrap();

    let seen = seen.lock().unwrap();
    let gaps: Vec<Duration> = seen.windows(2).map(|pair| pair[1] - pair[0]).collect();

    // 100ms doubling, back to 100ms once the outputs are in.
    assert_eq!(gaps, [100, 200, 100, 200].map(Duration::from_millis));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_tool_is_bounded_by_timeout() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_requiring(&[("call_1", "stalled", "x")])));
    mock.expect_submit_tool_outputs().times(0);
    mock.expect_cancel_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::Cancelling)));

    let started = Instant::now();
    let err = run_turn(&runner(mock, vec![Arc::new(StalledTool)]), &CancellationToken::new()).await.unwrap_err();

    assert_eq!(
        run_error(&err),
        RunError::TimedOut {
            run_id: RUN_ID.to_string(),
            timeout: Duration::from_secs(5),
        }
    );
    assert!(started.elapsed() < Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_stalled_tool_stops_the_turn() {
    let mut mock = mock_turn_start();

    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_requiring(&[("call_1", "stalled", "x")])));
    mock.expect_submit_tool_outputs().times(0);
    mock.expect_cancel_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::Cancelling)));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = run_turn(&runner(mock, vec![Arc::new(StalledTool)]), &cancel).await.unwrap_err();

    assert_eq!(run_error(&err), RunError::Cancelled(RUN_ID.to_string()));
    assert!(started.elapsed() < Duration::from_secs(1));
}

fn runtime_config() -> Config {
    Config {
        inner: Arc::new(ConfigInner {
            assistant_id: Some(ASSISTANT_ID.to_string()),
            run_poll_interval_ms: 100,
            run_poll_max_interval_ms: 400,
            run_poll_multiplier: 2.0,
            run_timeout_secs: 5,
            ..Default::default()
        }),
    }
}

fn expect_thread_lifecycle(mock: &mut MockAssistants) {
    mock.expect_create_thread().times(1).returning(|_| {
        Ok(Thread {
            id: THREAD_ID.to_string(),
            ..Default::default()
        })
    });
    mock.expect_delete_thread().withf(|thread_id| thread_id == THREAD_ID).times(1).returning(|thread_id| {
        Ok(DeletionStatus {
            id: thread_id.to_string(),
            object: "thread.deleted".to_string(),
            deleted: true,
        })
    });
}

#[tokio::test(start_paused = true)]
async fn test_ask_deletes_its_thread() {
    let mut mock = mock_turn_start();
    expect_thread_lifecycle(&mut mock);
    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::Completed)));
    expect_reply(&mut mock, "answer");

    let runtime = Runtime::with_clients(runtime_config(), AssistantsClient::new(Arc::new(mock)), ToolRegistry::default(), None);

    assert_eq!(runtime.ask("hello", &CancellationToken::new()).await.unwrap(), "answer");
}

#[tokio::test(start_paused = true)]
async fn test_ask_deletes_its_thread_when_the_run_fails() {
    let mut mock = mock_turn_start();
    expect_thread_lifecycle(&mut mock);
    mock.expect_retrieve_run().times(1).returning(|_, _| Ok(run_with_status(RunStatus::Expired)));

    let runtime = Runtime::with_clients(runtime_config(), AssistantsClient::new(Arc::new(mock)), ToolRegistry::default(), None);
    let err = runtime.ask("hello", &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(run_error(&err), RunError::Ended { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_each_thread_turn_is_a_root_trace() {
    let mut mock = MockAssistants::new();
    mock.expect_create_message().times(2).returning(|_, request| Ok(message("msg_user", MessageRole::User, &request.content)));
    mock.expect_create_run().times(2).returning(|_, _| Ok(run_with_status(RunStatus::Queued)));
    mock.expect_retrieve_run().times(2).returning(|_, _| Ok(run_with_status(RunStatus::Completed)));
    mock.expect_list_messages().times(2).returning(|_| Ok(vec![message("msg_2", MessageRole::Assistant, "sure")]));

    let started = Arc::new(Mutex::new(Vec::<TraceRun>::new()));

    let mut tracer = MockTracer::new();
    let sink = started.clone();
    tracer.expect_start_run().times(2).returning(move |run| {
        sink.lock().unwrap().push(run.clone());
        Ok(())
    });
    tracer.expect_end_run().times(2).returning(|_, _| Ok(()));

    let runtime = Runtime::with_clients(runtime_config(), AssistantsClient::new(Arc::new(mock)), ToolRegistry::default(), Some(Tracer::new(Arc::new(tracer))));
    let cancel = CancellationToken::new();

    for prompt in ["first", "second"] {
        assert_eq!(runtime.reply_on_thread(THREAD_ID, ASSISTANT_ID, prompt, &cancel).await.unwrap(), "sure");
    }

    let started = started.lock().unwrap();
    assert!(started.iter().all(|run| run.context.parent_id.is_none()));
    assert_ne!(started[0].context.run_id, started[1].context.run_id);
}

#[tokio::test]
async fn test_runtime_creates_assistant_with_tool_definitions() {
    let config = Config {
        inner: Arc::new(ConfigInner {
            assistant_name: "helper".to_string(),
            assistant_model: "gpt-4o-mini".to_string(),
            assistant_instructions: "Be brief.".to_string(),
            ..Default::default()
        }),
    };

    let mut mock = MockAssistants::new();
    mock.expect_create_assistant()
        .withf(|request| {
            let names: Vec<&str> = request
                .tools
                .iter()
                .filter_map(|tool| match tool {
                    AssistantTool::Function { function } => Some(function.name.as_str()),
                    _ => None,
                })
                .collect();

            request.model == "gpt-4o-mini" && request.name.as_deref() == Some("helper") && names == ["echo"]
        })
        .times(1)
        .returning(|request| {
            Ok(Assistant {
                id: "asst_new".to_string(),
                model: request.model.clone(),
                ..Default::default()
            })
        });

    let tools = ToolRegistry::new(vec![Arc::new(EchoTool)]).unwrap();
    let runtime = Runtime::with_clients(config, AssistantsClient::new(Arc::new(mock)), tools, None);

    assert_eq!(runtime.resolve_assistant().await.unwrap(), "asst_new");
}

#[tokio::test]
async fn test_runtime_prefers_configured_assistant() {
    let config = Config {
        inner: Arc::new(ConfigInner {
            assistant_id: Some("asst_configured".to_string()),
            ..Default::default()
        }),
    };

    let mut mock = MockAssistants::new();
    mock.expect_create_assistant().times(0);

    let runtime = Runtime::with_clients(config, AssistantsClient::new(Arc::new(mock)), ToolRegistry::default(), None);

    assert_eq!(runtime.resolve_assistant().await.unwrap(), "asst_configured");
}
