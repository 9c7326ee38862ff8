//! `/agents/{id}/execute`, `/execute/stream`, `/execute/upload`, `/chat`
//! (spec §6.2, §6.3).

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use skein::adl::{Agent, Trigger};
use skein::executor::{ExecutionContext, ExecutionStatus, InputFiles, StepResult};
use skein::message::Role;
use skein::safety::GateOutcome;
use skein::session::Session;
use skein::tool_manager::ToolFile;
use skein_event::{to_json, EnvelopeState, RuntimeEvent};

use crate::app::AppState;
use crate::response::{ErrorBody, ExecuteResponse};

fn not_found(id_or_slug: &str) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new(format!("agent not found: {id_or_slug}"))))
}

/// Body of `POST /agents/{id}/execute` and `/execute/stream` (spec §6.2).
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Body of `POST /agents/{id}/chat` (spec §6.2): a thin `execute` wrapper
/// that always drives the `user_message` trigger.
#[derive(Clone, Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl From<ChatRequest> for ExecuteRequest {
    fn from(chat: ChatRequest) -> Self {
        Self {
            inputs: Value::Object(Default::default()),
            message: Some(chat.message),
            session_id: chat.session_id,
            workflow_id: None,
            trigger: Some(Trigger::UserMessage),
            user_id: chat.user_id,
        }
    }
}

/// `POST /agents/{id_or_slug}/execute`.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
    Json(req): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let Some(agent) = state.registry.get_by_id_or_slug(&id_or_slug) else {
        return not_found(&id_or_slug).into_response();
    };
    let response = run_execution(&state, &agent, req, &[], None).await;
    Json(response).into_response()
}

/// `POST /agents/{id_or_slug}/chat`.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let Some(agent) = state.registry.get_by_id_or_slug(&id_or_slug) else {
        return not_found(&id_or_slug).into_response();
    };
    let response = run_execution(&state, &agent, req.into(), &[], None).await;
    Json(response).into_response()
}

/// `POST /agents/{id_or_slug}/execute/upload` — multipart variant of
/// `execute`: fields with a filename become [`ToolFile`]s passed through to
/// `tool_call` steps; every other field is folded into `inputs` (or read as
/// one of the named control fields `message`/`session_id`/`workflow_id`/
/// `trigger`/`user_id`), by analogy with the JSON body (spec §6.2).
pub async fn execute_upload(
    State(state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let Some(agent) = state.registry.get_by_id_or_slug(&id_or_slug) else {
        return not_found(&id_or_slug).into_response();
    };

    let mut req = ExecuteRequest {
        inputs: Value::Object(Default::default()),
        ..Default::default()
    };
    let mut files: InputFiles = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response();
            }
        };

        let field_name = field.name().unwrap_or_default().to_string();
        if let Some(filename) = field.file_name().map(str::to_string) {
            let bytes = match field.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(e) => return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response(),
            };
            files.push(ToolFile {
                field_name,
                filename,
                bytes,
            });
            continue;
        }

        let text = match field.text().await {
            Ok(text) => text,
            Err(e) => return (StatusCode::BAD_REQUEST, Json(ErrorBody::new(e.to_string()))).into_response(),
        };

        match field_name.as_str() {
            "message" => req.message = Some(text),
            "session_id" => req.session_id = Some(text),
            "workflow_id" => req.workflow_id = Some(text),
            "user_id" => req.user_id = Some(text),
            "trigger" => {
                req.trigger = serde_json::from_value(Value::String(text)).ok();
            }
            _ => {
                let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
                if let Value::Object(map) = &mut req.inputs {
                    map.insert(field_name, value);
                }
            }
        }
    }

    let response = run_execution(&state, &agent, req, &files, None).await;
    Json(response).into_response()
}

/// `POST /agents/{id_or_slug}/execute/stream` — Server-Sent Events: `start`,
/// then one `step`/`tool` pair per completed step, then a terminal
/// `complete` or `error` (spec §6.2, §6.3). Token-by-token streaming of an
/// in-progress `llm_call` is not implemented: the executor's step walker
/// calls the LLM Manager's non-streaming `chat`, so there is no per-token
/// hook to forward as `RuntimeEvent::Token` — see DESIGN.md.
pub async fn execute_stream(
    State(state): State<Arc<AppState>>,
    Path(id_or_slug): Path<String>,
    Json(req): Json<ExecuteRequest>,
) -> impl IntoResponse {
    let Some(agent) = state.registry.get_by_id_or_slug(&id_or_slug) else {
        return not_found(&id_or_slug).into_response();
    };

    let (out_tx, out_rx) = mpsc::unbounded_channel::<Event>();
    let execution_id = uuid::Uuid::new_v4().to_string();
    let mut envelope_state = EnvelopeState::new(execution_id.clone());

    send_event(
        &out_tx,
        &mut envelope_state,
        RuntimeEvent::Start {
            agent_id: agent.id().to_string(),
            agent_name: agent.identity.name.clone(),
            session_id: req.session_id.clone(),
        },
    );

    let state = Arc::clone(&state);
    let agent = Arc::clone(&agent);
    tokio::spawn(async move {
        let (step_tx, mut step_rx) = mpsc::unbounded_channel::<StepResult>();
        let forward_state = state.clone();
        let out_tx_steps = out_tx.clone();
        let mut forward_envelope = envelope_state.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(result) = step_rx.recv().await {
                emit_step_events(&out_tx_steps, &mut forward_envelope, &result);
            }
            let _ = forward_state;
        });

        let response = run_execution(&state, &agent, req, &[], Some(step_tx)).await;
        let _ = forwarder.await;

        let event = match &response.error {
            Some(message) if !response.success && response.blocked_reason.is_none() => {
                RuntimeEvent::Error { message: message.clone() }
            }
            _ => RuntimeEvent::Complete {
                response: serde_json::to_value(&response).unwrap_or(Value::Null),
            },
        };
        send_event(&out_tx, &mut envelope_state, event);
    });

    let stream = UnboundedReceiverStream::new(out_rx).map(Ok::<_, Infallible>);
    Sse::new(stream).keep_alive(KeepAlive::default()).into_response()
}

fn send_event(tx: &mpsc::UnboundedSender<Event>, state: &mut EnvelopeState, event: RuntimeEvent) {
    if let Ok(value) = to_json(&event, state) {
        let name = value["event"].as_str().unwrap_or("message").to_string();
        let _ = tx.send(Event::default().event(name).data(value.to_string()));
    }
}

fn emit_step_events(tx: &mpsc::UnboundedSender<Event>, state: &mut EnvelopeState, result: &StepResult) {
    if result.step_type == "tool_call" {
        send_event(
            tx,
            state,
            RuntimeEvent::Tool {
                step_id: result.step_id.clone(),
                tool_id: result.step_name.clone(),
                success: result.status == ExecutionStatus::Completed,
                output: result.output.clone(),
                error: result.error.clone(),
            },
        );
    }
    send_event(
        tx,
        state,
        RuntimeEvent::Step {
            step_id: result.step_id.clone(),
            result: serde_json::to_value(result).unwrap_or(Value::Null),
        },
    );
}

/// Drives the Safety Gate, then the Workflow Executor, then records the
/// resulting turn back into the session — the shared body behind `execute`,
/// `chat`, `execute_upload`, and `execute_stream` (spec §4.1 entry contract,
/// §4.6 "short-circuits before any step executes").
async fn run_execution(
    state: &AppState,
    agent: &Agent,
    req: ExecuteRequest,
    files: &InputFiles,
    sink: Option<mpsc::UnboundedSender<StepResult>>,
) -> ExecuteResponse {
    let started = Instant::now();
    let session = state.sessions.get_or_create(
        req.session_id.as_deref(),
        agent.id(),
        agent.identity.name.clone(),
        req.user_id.clone(),
    );

    if let Some(text) = &req.message {
        let outcome = state
            .safety
            .check(text, agent.id(), req.user_id.as_deref(), &state.moderation_rules, &state.guardrails)
            .await;
        if let GateOutcome::Blocked { reason } = outcome {
            return blocked_response(agent, &session, reason, started.elapsed());
        }
        state.sessions.add_message(&session.session_id, Role::User, text.clone());
    }

    let Some(workflow) = agent.select_workflow(req.workflow_id.as_deref(), req.trigger.unwrap_or(Trigger::UserMessage)) else {
        return no_workflow_response(agent, &session, started.elapsed());
    };

    let mut inputs = req.inputs;
    if !matches!(inputs, Value::Object(_)) {
        inputs = Value::Object(Default::default());
    }
    if let (Some(text), Value::Object(map)) = (&req.message, &mut inputs) {
        map.entry("message".to_string()).or_insert_with(|| Value::from(text.clone()));
    }

    let context = state
        .executor
        .execute_with_sink(agent, workflow, inputs, files, Some(&session), sink)
        .await;

    if let Some(reply) = final_text_output(&context) {
        state.sessions.add_message(&session.session_id, Role::Assistant, reply);
    }

    response_from_context(agent, &session, workflow.id.clone(), &context, started.elapsed())
}

fn final_text_output(context: &ExecutionContext) -> Option<String> {
    context
        .step_results
        .last()
        .and_then(|r| r.output.as_ref())
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn status_name(status: ExecutionStatus) -> String {
    serde_json::to_value(status)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn response_from_context(
    agent: &Agent,
    session: &Session,
    workflow_id: String,
    context: &ExecutionContext,
    duration: Duration,
) -> ExecuteResponse {
    let output = context.step_results.last().and_then(|r| r.output.clone());
    let message = output.as_ref().and_then(|v| v.as_str()).map(str::to_string);
    ExecuteResponse {
        success: context.status == ExecutionStatus::Completed,
        agent_id: agent.id().to_string(),
        agent_name: agent.identity.name.clone(),
        execution_id: uuid::Uuid::new_v4().to_string(),
        status: status_name(context.status),
        output,
        outputs: context.variables.clone(),
        files: Vec::new(),
        message,
        session_id: Some(session.session_id.clone()),
        workflow_executed: Some(workflow_id),
        steps_executed: context.step_results.len(),
        duration_ms: duration.as_millis() as u64,
        usage: serde_json::to_value(&context.usage).ok(),
        error: context.error.clone(),
        blocked_reason: None,
        warnings: Vec::new(),
    }
}

fn blocked_response(agent: &Agent, session: &Session, reason: String, duration: Duration) -> ExecuteResponse {
    ExecuteResponse {
        success: false,
        agent_id: agent.id().to_string(),
        agent_name: agent.identity.name.clone(),
        execution_id: uuid::Uuid::new_v4().to_string(),
        status: "blocked".to_string(),
        output: None,
        outputs: Value::Object(Default::default()),
        files: Vec::new(),
        message: None,
        session_id: Some(session.session_id.clone()),
        workflow_executed: None,
        steps_executed: 0,
        duration_ms: duration.as_millis() as u64,
        usage: None,
        error: None,
        blocked_reason: Some(reason),
        warnings: Vec::new(),
    }
}

fn no_workflow_response(agent: &Agent, session: &Session, duration: Duration) -> ExecuteResponse {
    ExecuteResponse {
        success: false,
        agent_id: agent.id().to_string(),
        agent_name: agent.identity.name.clone(),
        execution_id: uuid::Uuid::new_v4().to_string(),
        status: "failed".to_string(),
        output: None,
        outputs: Value::Object(Default::default()),
        files: Vec::new(),
        message: None,
        session_id: Some(session.session_id.clone()),
        workflow_executed: None,
        steps_executed: 0,
        duration_ms: duration.as_millis() as u64,
        usage: None,
        error: Some("no workflow matched the request".to_string()),
        blocked_reason: None,
        warnings: Vec::new(),
    }
}
